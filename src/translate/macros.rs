//! 转换宏
//!
//! - `net_name!`: 以 `@@@` 拼接库所/变迁名
//! - `silent_step!`: 创建静默迁移并连接 输入库所 -> t -> 输出库所

/// 以 [`NAME_SEP`](crate::net::NAME_SEP) 拼接各段: `net_name!("t", node, process)`.
#[macro_export]
macro_rules! net_name {
    ($first:expr $(, $rest:expr)* $(,)?) => {{
        let mut name = ::std::string::String::from($first);
        $(
            name.push_str($crate::net::NAME_SEP);
            name.push_str(&$rest);
        )*
        name
    }};
}

/// 创建静默迁移, 连接 `inputs -> t -> outputs` 并返回其 `TransitionId`.
/// 只能在错误类型实现了 `From<NetError>` 的函数内使用.
#[macro_export]
macro_rules! silent_step {
    ($net:expr, $name:expr, $process:expr, $inputs:expr, $outputs:expr) => {{
        let inputs: ::std::vec::Vec<$crate::net::PlaceId> = $inputs.into_iter().collect();
        let outputs: ::std::vec::Vec<$crate::net::PlaceId> = $outputs.into_iter().collect();
        let t = $net.add_transition($crate::net::Transition::new($name, None, $process))?;
        for place in inputs {
            $net.add_input_arc(place, t)?;
        }
        for place in outputs {
            $net.add_output_arc(t, place)?;
        }
        t
    }};
}
