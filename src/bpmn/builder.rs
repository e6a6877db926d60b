use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{
    BoundaryTrigger, EventTrigger, Flow, FlowId, FlowKind, GatewayDirection, GatewayKind,
    GraphError, Node, NodeId, NodeKind, ProcessGraph,
};
use crate::net::index_vec::IndexVec;

struct NodeDraft {
    id: String,
    name: Option<String>,
    kind: NodeKind,
    process: String,
}

struct FlowDraft {
    id: String,
    name: Option<String>,
    kind: FlowKind,
    source: String,
    target: String,
    process: Option<String>,
}

/// Collects nodes and flows in declaration order and validates them all at once in
/// [`build`](Self::build). A flow without an explicit process belongs to the process
/// of its source node.
pub struct ProcessGraphBuilder {
    process_id: String,
    name: String,
    nodes: Vec<NodeDraft>,
    flows: Vec<FlowDraft>,
}

impl ProcessGraphBuilder {
    pub fn new(process_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            name: name.into(),
            nodes: Vec::new(),
            flows: Vec::new(),
        }
    }

    pub fn node(
        &mut self,
        id: impl Into<String>,
        name: Option<&str>,
        kind: NodeKind,
        process: impl Into<String>,
    ) -> &mut Self {
        self.nodes.push(NodeDraft {
            id: id.into(),
            name: name.map(str::to_string),
            kind,
            process: process.into(),
        });
        self
    }

    pub fn task(&mut self, id: &str, name: &str, process: &str) -> &mut Self {
        self.node(id, Some(name), NodeKind::Task, process)
    }

    pub fn subprocess(&mut self, id: &str, name: &str, process: &str) -> &mut Self {
        self.node(id, Some(name), NodeKind::SubProcess { depth: 0 }, process)
    }

    pub fn start_event(&mut self, id: &str, trigger: EventTrigger, process: &str) -> &mut Self {
        self.node(id, None, NodeKind::StartEvent(trigger), process)
    }

    pub fn end_event(
        &mut self,
        id: &str,
        name: Option<&str>,
        trigger: EventTrigger,
        process: &str,
    ) -> &mut Self {
        self.node(id, name, NodeKind::EndEvent(trigger), process)
    }

    pub fn intermediate_catch(
        &mut self,
        id: &str,
        name: &str,
        trigger: EventTrigger,
        process: &str,
    ) -> &mut Self {
        self.node(id, Some(name), NodeKind::IntermediateCatchEvent(trigger), process)
    }

    pub fn intermediate_throw(
        &mut self,
        id: &str,
        name: &str,
        trigger: EventTrigger,
        process: &str,
    ) -> &mut Self {
        self.node(id, Some(name), NodeKind::IntermediateThrowEvent(trigger), process)
    }

    pub fn boundary_event(
        &mut self,
        id: &str,
        name: &str,
        trigger: BoundaryTrigger,
        activity: &str,
        process: &str,
    ) -> &mut Self {
        let kind = NodeKind::BoundaryEvent {
            trigger,
            activity: activity.to_string(),
        };
        self.node(id, Some(name), kind, process)
    }

    pub fn gateway(
        &mut self,
        id: &str,
        kind: GatewayKind,
        direction: GatewayDirection,
        process: &str,
    ) -> &mut Self {
        self.node(id, None, NodeKind::Gateway { kind, direction }, process)
    }

    pub fn sequence_flow(&mut self, id: &str, source: &str, target: &str) -> &mut Self {
        self.flow(id, None, FlowKind::Sequence, source, target, None)
    }

    pub fn message_flow(&mut self, id: &str, source: &str, target: &str) -> &mut Self {
        self.flow(id, None, FlowKind::Message, source, target, None)
    }

    pub fn flow(
        &mut self,
        id: &str,
        name: Option<&str>,
        kind: FlowKind,
        source: &str,
        target: &str,
        process: Option<&str>,
    ) -> &mut Self {
        self.flows.push(FlowDraft {
            id: id.to_string(),
            name: name.map(str::to_string),
            kind,
            source: source.to_string(),
            target: target.to_string(),
            process: process.map(str::to_string),
        });
        self
    }

    pub fn build(self) -> Result<ProcessGraph, GraphError> {
        let mut index = HashMap::new();
        let mut nodes: IndexVec<NodeId, Node> = IndexVec::with_capacity(self.nodes.len());
        for draft in self.nodes {
            if draft.id == self.process_id || index.contains_key(&draft.id) {
                return Err(GraphError::DuplicateNode(draft.id));
            }
            if draft.process == draft.id {
                return Err(GraphError::SelfContainment(draft.id));
            }
            let id = nodes.push(Node {
                id: draft.id.clone(),
                name: draft.name,
                kind: draft.kind,
                incoming: Vec::new(),
                outgoing: Vec::new(),
                process: draft.process,
            });
            index.insert(draft.id, id);
        }

        let subprocesses = nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::SubProcess { .. }))
            .map(|node| (node.id.clone(), node.process.clone()))
            .collect::<HashMap<_, _>>();

        for node in nodes.iter() {
            if node.process != self.process_id && !subprocesses.contains_key(&node.process) {
                return Err(GraphError::UnknownProcess {
                    element: node.id.clone(),
                    process: node.process.clone(),
                });
            }
            if let NodeKind::BoundaryEvent { activity, .. } = &node.kind {
                let attached = index
                    .get(activity)
                    .is_some_and(|target| nodes[*target].kind.is_activity());
                if !attached {
                    return Err(GraphError::InvalidBoundaryAttachment {
                        event: node.id.clone(),
                        activity: activity.clone(),
                    });
                }
            }
        }

        let depths = nesting_depths(&self.process_id, &subprocesses)?;
        for node in nodes.iter_enumerated_mut().map(|(_, node)| node) {
            if let NodeKind::SubProcess { depth } = &mut node.kind {
                *depth = depths.get(&node.id).copied().unwrap_or(1);
            }
        }

        let mut flows: IndexVec<FlowId, Flow> = IndexVec::with_capacity(self.flows.len());
        let mut seen_flows = HashSet::new();
        for draft in self.flows {
            if !seen_flows.insert(draft.id.clone()) {
                return Err(GraphError::DuplicateFlow(draft.id));
            }
            let resolve = |node: &str| {
                index.get(node).copied().ok_or_else(|| GraphError::UnknownNode {
                    flow: draft.id.clone(),
                    node: node.to_string(),
                })
            };
            let source = resolve(&draft.source)?;
            let target = resolve(&draft.target)?;
            let process = draft
                .process
                .unwrap_or_else(|| nodes[source].process.clone());
            if process != self.process_id && !subprocesses.contains_key(&process) {
                return Err(GraphError::UnknownProcess {
                    element: draft.id,
                    process,
                });
            }
            let flow_id = flows.push(Flow {
                id: draft.id,
                name: draft.name,
                kind: draft.kind,
                source,
                target,
                process,
            });
            nodes[source].outgoing.push(flow_id);
            nodes[target].incoming.push(flow_id);
        }

        debug!(
            "built process graph `{}` with {} node(s), {} flow(s), {} subprocess(es)",
            self.process_id,
            nodes.len(),
            flows.len(),
            subprocesses.len()
        );
        Ok(ProcessGraph::from_parts(self.process_id, self.name, nodes, flows))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    id: String,
    #[serde(default)]
    name: Option<String>,
    kind: NodeKind,
    process: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDocument {
    id: String,
    #[serde(default)]
    name: Option<String>,
    kind: FlowKind,
    source: String,
    target: String,
    process: String,
}

/// Wire form of a [`ProcessGraph`]: endpoints by string id, no derived indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    process_id: String,
    name: String,
    nodes: Vec<NodeDocument>,
    flows: Vec<FlowDocument>,
}

impl From<ProcessGraph> for GraphDocument {
    fn from(graph: ProcessGraph) -> Self {
        let nodes = graph
            .nodes()
            .map(|(_, node)| NodeDocument {
                id: node.id.clone(),
                name: node.name.clone(),
                kind: node.kind.clone(),
                process: node.process.clone(),
            })
            .collect();
        let flows = graph
            .flows()
            .map(|(_, flow)| FlowDocument {
                id: flow.id.clone(),
                name: flow.name.clone(),
                kind: flow.kind,
                source: graph.node(flow.source).id.clone(),
                target: graph.node(flow.target).id.clone(),
                process: flow.process.clone(),
            })
            .collect();
        Self {
            process_id: graph.process_id().to_string(),
            name: graph.name().to_string(),
            nodes,
            flows,
        }
    }
}

impl TryFrom<GraphDocument> for ProcessGraph {
    type Error = GraphError;

    fn try_from(document: GraphDocument) -> Result<Self, Self::Error> {
        let mut builder = ProcessGraphBuilder::new(document.process_id, document.name);
        for node in document.nodes {
            builder.node(node.id, node.name.as_deref(), node.kind, node.process);
        }
        for flow in &document.flows {
            builder.flow(
                &flow.id,
                flow.name.as_deref(),
                flow.kind,
                &flow.source,
                &flow.target,
                Some(&flow.process),
            );
        }
        builder.build()
    }
}

/// Depth of every subprocess, failing when a containment chain never reaches the root.
fn nesting_depths(
    root: &str,
    parents: &HashMap<String, String>,
) -> Result<HashMap<String, u32>, GraphError> {
    let mut depths = HashMap::new();
    for start in parents.keys() {
        let mut chain = Vec::new();
        let mut current = start.as_str();
        let base = loop {
            if let Some(depth) = depths.get(current) {
                break *depth;
            }
            if current == root {
                break 0;
            }
            if chain.iter().any(|seen: &&str| *seen == current) {
                return Err(GraphError::ContainmentCycle(start.clone()));
            }
            chain.push(current);
            match parents.get(current) {
                Some(parent) => current = parent.as_str(),
                None => {
                    return Err(GraphError::UnknownProcess {
                        element: start.clone(),
                        process: current.to_string(),
                    });
                }
            }
        };
        for (offset, id) in chain.iter().rev().enumerate() {
            depths.insert((*id).to_string(), base + offset as u32 + 1);
        }
    }
    Ok(depths)
}
