//! BPMN 流程图到复位/抑制网的转换.
//!
//! 转换分为以下阶段, 全部在图的副本上进行, 调用者的图不会被修改:
//!
//! 1. 网关规范化 ([`normalize_gateways`]);
//! 2. 每条流生成一个库所, 库所角色由流的端点决定;
//! 3. 任务/中间事件/网关生成迁移;
//! 4. 子流程按嵌套深度由内向外粘合, 处理其边界事件与终止事件;
//! 5. 根流程上的终止事件.
//!
//! 节点与流均按字符串标识升序处理, 因此同一输入总得到同一个网.
use log::info;
use thiserror::Error;

use crate::bpmn::{GatewayKind, GraphError, NodeKind, ProcessGraph};
use crate::net::{Marking, Net, NetError};

pub mod bpmn_to_pn;
pub mod macros;
pub mod normalize;

pub use bpmn_to_pn::BpmnToPetriNet;
pub use normalize::normalize_gateways;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("`{node}` uses a construct the converter does not support")]
    UnsupportedConstruct { node: String },
    #[error("`{node}`: {reason}")]
    StructuralPrecondition { node: String, reason: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Net(#[from] NetError),
}

/// Converts `graph` into an accepting reset/inhibitor net `(net, initial, final)`.
///
/// `include_events` labels boundary-event transitions with the event name; when it is
/// unset they are silent.
pub fn convert(
    graph: &ProcessGraph,
    include_events: bool,
) -> Result<(Net, Marking, Marking), ConvertError> {
    reject_inclusive_gateways(graph)?;

    let mut normalized = graph.clone();
    normalize_gateways(&mut normalized)?;

    let mut translator = BpmnToPetriNet::new(&normalized, include_events);
    translator.construct()?;
    let (net, initial, final_marking) = translator.into_parts();
    net.check_consistency()?;

    info!(
        "converted `{}`: {} place(s), {} transition(s), {} arc(s)",
        graph.process_id(),
        net.places_len(),
        net.transitions_len(),
        net.arcs_len()
    );
    Ok((net, initial, final_marking))
}

fn reject_inclusive_gateways(graph: &ProcessGraph) -> Result<(), ConvertError> {
    let inclusive = graph.nodes_sorted().into_iter().find(|id| {
        matches!(
            graph.node(*id).kind,
            NodeKind::Gateway {
                kind: GatewayKind::Inclusive,
                ..
            }
        )
    });
    match inclusive {
        Some(id) => Err(ConvertError::UnsupportedConstruct {
            node: graph.node(id).id.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpmn::{EventTrigger, GatewayDirection, ProcessGraphBuilder};

    #[test]
    fn inclusive_gateway_fails_before_anything_is_built() {
        let mut builder = ProcessGraphBuilder::new("proc", "or");
        builder
            .start_event("start", EventTrigger::Normal, "proc")
            .gateway("or", GatewayKind::Inclusive, GatewayDirection::Diverging, "proc")
            .task("a", "A", "proc")
            .task("b", "B", "proc")
            .sequence_flow("f0", "start", "or")
            .sequence_flow("f1", "or", "a")
            .sequence_flow("f2", "or", "b");
        let graph = builder.build().unwrap();
        assert_eq!(
            convert(&graph, true).unwrap_err(),
            ConvertError::UnsupportedConstruct {
                node: "or".to_string()
            }
        );
    }

    #[test]
    fn caller_graph_is_left_untouched() {
        let mut builder = ProcessGraphBuilder::new("proc", "join");
        builder
            .start_event("s1", EventTrigger::Normal, "proc")
            .start_event("s2", EventTrigger::Normal, "proc")
            .task("a", "A", "proc")
            .end_event("end", None, EventTrigger::Normal, "proc")
            .sequence_flow("f1", "s1", "a")
            .sequence_flow("f2", "s2", "a")
            .sequence_flow("f3", "a", "end");
        let graph = builder.build().unwrap();
        let (net, initial, _) = convert(&graph, true).unwrap();

        assert_eq!(graph.nodes_len(), 4);
        assert!(graph.node_by_id("XOR-input-a").is_none());
        assert_eq!(initial.len(), 2);
        assert!(net.transition_by_name("t@@@XOR-input-a#0@@@proc").is_some());
        assert!(net.transition_by_name("t@@@XOR-input-a#1@@@proc").is_some());
    }
}
