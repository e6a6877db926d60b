//! 通用工具: 日志初始化.

/// Environment variable holding the `env_logger` filter, e.g. `RINET_LOG=debug`.
pub const LOG_ENV: &str = "RINET_LOG";
pub const LOG_STYLE_ENV: &str = "RINET_LOG_STYLE";

/// Installs `env_logger` when `RINET_LOG` is set. Calling it again, or after another
/// logger was installed, is a no-op.
pub fn init_logger() {
    if std::env::var(LOG_ENV).is_ok() {
        let env = env_logger::Env::new()
            .filter(LOG_ENV)
            .write_style(LOG_STYLE_ENV);
        let _ = env_logger::Builder::from_env(env).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logger_is_idempotent() {
        init_logger();
        init_logger();
    }
}
