//! 网关规范化：非网关节点的多条入流(出流)汇入新建的汇聚(分支)排他网关.
use log::debug;

use crate::bpmn::{
    FlowId, GatewayDirection, GatewayKind, Node, NodeId, NodeKind, ProcessGraph,
};

use super::ConvertError;

/// Rewrites `graph` so that every non-gateway node has at most one incoming and one
/// outgoing flow. Nodes are visited in ascending id order. A node with several
/// incoming flows gets a converging exclusive gateway `XOR-input-<id>` in front of it,
/// a node with several outgoing flows a diverging one `XOR-output-<id>` behind it.
pub fn normalize_gateways(graph: &mut ProcessGraph) -> Result<(), ConvertError> {
    let mut inserted = 0;
    for node in graph.nodes_sorted() {
        if graph.node(node).kind.is_gateway() {
            continue;
        }
        if graph.node(node).incoming.len() > 1 {
            split_incoming(graph, node)?;
            inserted += 1;
        }
        if graph.node(node).outgoing.len() > 1 {
            split_outgoing(graph, node)?;
            inserted += 1;
        }
    }
    if inserted > 0 {
        debug!("gateway normalisation inserted {inserted} exclusive gateway(s)");
    }
    Ok(())
}

fn split_incoming(graph: &mut ProcessGraph, node: NodeId) -> Result<(), ConvertError> {
    let gateway = insert_gateway(graph, node, "XOR-input-", GatewayDirection::Converging)?;
    let flows: Vec<FlowId> = graph.node(node).incoming.clone();
    for flow in flows {
        graph.redirect_target(flow, gateway);
    }
    let flow_id = format!("{}-flow", graph.node(gateway).id);
    let process = graph.node(node).process.clone();
    graph.insert_flow(flow_id, gateway, node, process)?;
    Ok(())
}

fn split_outgoing(graph: &mut ProcessGraph, node: NodeId) -> Result<(), ConvertError> {
    let gateway = insert_gateway(graph, node, "XOR-output-", GatewayDirection::Diverging)?;
    let flows: Vec<FlowId> = graph.node(node).outgoing.clone();
    for flow in flows {
        graph.redirect_source(flow, gateway);
    }
    let flow_id = format!("{}-flow", graph.node(gateway).id);
    let process = graph.node(node).process.clone();
    graph.insert_flow(flow_id, node, gateway, process)?;
    Ok(())
}

fn insert_gateway(
    graph: &mut ProcessGraph,
    node: NodeId,
    prefix: &str,
    direction: GatewayDirection,
) -> Result<NodeId, ConvertError> {
    let owner = graph.node(node);
    let id = format!("{prefix}{}", owner.id);
    if graph.node_by_id(&id).is_some() {
        return Err(ConvertError::StructuralPrecondition {
            node: owner.id.clone(),
            reason: format!("generated gateway id `{id}` is already taken"),
        });
    }
    let gateway = Node {
        id: id.clone(),
        name: Some(id),
        kind: NodeKind::Gateway {
            kind: GatewayKind::Exclusive,
            direction,
        },
        incoming: Vec::new(),
        outgoing: Vec::new(),
        process: owner.process.clone(),
    };
    Ok(graph.insert_node(gateway)?)
}
