//! BPMN 流程图数据模型：节点、顺序流/消息流与（嵌套）子流程.
//!
//! 图只能通过 [`ProcessGraphBuilder`] 构造，构造时校验标识唯一、流端点存在、
//! 子流程嵌套无环以及边界事件的挂载目标.
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::ids::define_id;
use crate::net::index_vec::{Idx, IndexVec};

pub mod builder;
pub mod query;

pub use builder::ProcessGraphBuilder;

define_id!(NodeId, "n");
define_id!(FlowId, "f");

/// Trigger of start, end and intermediate events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTrigger {
    Normal,
    Message,
    Error,
    Cancel,
    Terminate,
}

/// Trigger of an event attached to the boundary of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryTrigger {
    Message,
    Error,
    Cancel,
}

impl BoundaryTrigger {
    /// Error and cancel boundaries are raised from inside the subprocess they
    /// interrupt; message boundaries come from outside.
    pub fn is_internal(self) -> bool {
        matches!(self, BoundaryTrigger::Error | BoundaryTrigger::Cancel)
    }

    /// End-event trigger that raises this boundary from inside a subprocess.
    pub fn end_trigger(self) -> EventTrigger {
        match self {
            BoundaryTrigger::Message => EventTrigger::Message,
            BoundaryTrigger::Error => EventTrigger::Error,
            BoundaryTrigger::Cancel => EventTrigger::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayKind {
    Parallel,
    Exclusive,
    Inclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GatewayDirection {
    #[default]
    Unspecified,
    Diverging,
    Converging,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Task,
    /// `depth` is 1 for a subprocess of the root process and grows by one per
    /// level of nesting. The builder computes it.
    SubProcess { depth: u32 },
    StartEvent(EventTrigger),
    EndEvent(EventTrigger),
    IntermediateCatchEvent(EventTrigger),
    IntermediateThrowEvent(EventTrigger),
    BoundaryEvent {
        trigger: BoundaryTrigger,
        /// Id of the task or subprocess the event is attached to.
        activity: String,
    },
    Gateway {
        kind: GatewayKind,
        direction: GatewayDirection,
    },
}

impl NodeKind {
    pub fn is_gateway(&self) -> bool {
        matches!(self, NodeKind::Gateway { .. })
    }

    pub fn is_activity(&self) -> bool {
        matches!(self, NodeKind::Task | NodeKind::SubProcess { .. })
    }

    pub fn is_start_event(&self) -> bool {
        matches!(self, NodeKind::StartEvent(_))
    }

    pub fn is_end_event(&self) -> bool {
        matches!(self, NodeKind::EndEvent(_))
    }

    pub fn depth(&self) -> Option<u32> {
        match self {
            NodeKind::SubProcess { depth } => Some(*depth),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: Option<String>,
    pub kind: NodeKind,
    pub incoming: Vec<FlowId>,
    pub outgoing: Vec<FlowId>,
    /// Root process id, or the id of the enclosing subprocess node.
    pub process: String,
}

impl Node {
    /// Display name, treating an empty string like a missing one.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Name used to pair boundary events with the end events that raise them.
    pub fn event_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.event_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    Sequence,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub name: Option<String>,
    pub kind: FlowKind,
    pub source: NodeId,
    pub target: NodeId,
    pub process: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node id `{0}` is used more than once")]
    DuplicateNode(String),
    #[error("flow id `{0}` is used more than once")]
    DuplicateFlow(String),
    #[error("flow `{flow}` references unknown node `{node}`")]
    UnknownNode { flow: String, node: String },
    #[error("`{element}` belongs to `{process}`, which is neither the root process nor a subprocess")]
    UnknownProcess { element: String, process: String },
    #[error("node `{0}` is declared to contain itself")]
    SelfContainment(String),
    #[error("subprocess nesting of `{0}` does not lead back to the root process")]
    ContainmentCycle(String),
    #[error("boundary event `{event}` is attached to `{activity}`, which is not a task or subprocess")]
    InvalidBoundaryAttachment { event: String, activity: String },
}

/// A BPMN process with its nodes and flows. Lookups by string id go through the
/// indices; structural queries live in [`query`].
///
/// Serialised as a flat node/flow document; decoding replays it through
/// [`ProcessGraphBuilder`], so a decoded graph passes the same validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "builder::GraphDocument", into = "builder::GraphDocument")]
pub struct ProcessGraph {
    process_id: String,
    name: String,
    nodes: IndexVec<NodeId, Node>,
    flows: IndexVec<FlowId, Flow>,
    node_index: IndexMap<String, NodeId>,
    flow_index: IndexMap<String, FlowId>,
}

impl ProcessGraph {
    pub(crate) fn from_parts(
        process_id: String,
        name: String,
        nodes: IndexVec<NodeId, Node>,
        flows: IndexVec<FlowId, Flow>,
    ) -> Self {
        let node_index = nodes
            .iter_enumerated()
            .map(|(id, node)| (node.id.clone(), id))
            .collect();
        let flow_index = flows
            .iter_enumerated()
            .map(|(id, flow)| (flow.id.clone(), id))
            .collect();
        Self {
            process_id,
            name,
            nodes,
            flows,
            node_index,
            flow_index,
        }
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn flow(&self, id: FlowId) -> &Flow {
        &self.flows[id]
    }

    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.node_index.get(id).copied()
    }

    pub fn flow_by_id(&self, id: &str) -> Option<FlowId> {
        self.flow_index.get(id).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter_enumerated()
    }

    pub fn flows(&self) -> impl Iterator<Item = (FlowId, &Flow)> {
        self.flows.iter_enumerated()
    }

    pub fn nodes_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn flows_len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_root(&self, process: &str) -> bool {
        process == self.process_id
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.node_index.contains_key(&node.id) || node.id == self.process_id {
            return Err(GraphError::DuplicateNode(node.id));
        }
        self.node_index.insert(node.id.clone(), self.nodes.next_index());
        Ok(self.nodes.push(node))
    }

    pub(crate) fn insert_flow(
        &mut self,
        id: String,
        source: NodeId,
        target: NodeId,
        process: String,
    ) -> Result<FlowId, GraphError> {
        if self.flow_index.contains_key(&id) {
            return Err(GraphError::DuplicateFlow(id));
        }
        let flow_id = self.flows.next_index();
        self.flow_index.insert(id.clone(), flow_id);
        self.flows.push(Flow {
            id,
            name: None,
            kind: FlowKind::Sequence,
            source,
            target,
            process,
        });
        self.nodes[source].outgoing.push(flow_id);
        self.nodes[target].incoming.push(flow_id);
        Ok(flow_id)
    }

    /// Moves the head of `flow` to `target`, keeping incoming lists in sync.
    pub(crate) fn redirect_target(&mut self, flow: FlowId, target: NodeId) {
        let old = self.flows[flow].target;
        self.nodes[old].incoming.retain(|f| *f != flow);
        self.flows[flow].target = target;
        self.nodes[target].incoming.push(flow);
    }

    /// Moves the tail of `flow` to `source`, keeping outgoing lists in sync.
    pub(crate) fn redirect_source(&mut self, flow: FlowId, source: NodeId) {
        let old = self.flows[flow].source;
        self.nodes[old].outgoing.retain(|f| *f != flow);
        self.flows[flow].source = source;
        self.nodes[source].outgoing.push(flow);
    }
}
