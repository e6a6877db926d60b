//! 流程图上的结构查询. 所有返回的节点/流列表都按字符串标识升序排列，
//! 从而使转换结果与插入顺序无关.
use itertools::Itertools;

use super::{EventTrigger, FlowId, NodeId, NodeKind, ProcessGraph};

impl ProcessGraph {
    /// All nodes in ascending id order.
    pub fn nodes_sorted(&self) -> Vec<NodeId> {
        self.nodes()
            .sorted_by(|(_, a), (_, b)| a.id.cmp(&b.id))
            .map(|(id, _)| id)
            .collect()
    }

    /// All flows in ascending id order.
    pub fn flows_sorted(&self) -> Vec<FlowId> {
        self.flows()
            .sorted_by(|(_, a), (_, b)| a.id.cmp(&b.id))
            .map(|(id, _)| id)
            .collect()
    }

    fn select(&self, keep: impl Fn(&super::Node) -> bool) -> Vec<NodeId> {
        self.nodes_sorted()
            .into_iter()
            .filter(|id| keep(self.node(*id)))
            .collect()
    }

    /// Subprocesses, innermost first (depth descending, ties by id).
    pub fn subprocesses_by_depth(&self) -> Vec<NodeId> {
        self.select(|node| matches!(node.kind, NodeKind::SubProcess { .. }))
            .into_iter()
            .sorted_by_key(|id| std::cmp::Reverse(self.node(*id).kind.depth().unwrap_or(0)))
            .collect()
    }

    pub fn boundary_events_of(&self, activity_id: &str) -> Vec<NodeId> {
        self.select(|node| {
            matches!(&node.kind, NodeKind::BoundaryEvent { activity, .. } if activity == activity_id)
        })
    }

    /// Terminate end events placed directly in `process`.
    pub fn termination_events_of(&self, process: &str) -> Vec<NodeId> {
        self.select(|node| {
            node.process == process && node.kind == NodeKind::EndEvent(EventTrigger::Terminate)
        })
    }

    pub fn start_events_of(&self, process: &str) -> Vec<NodeId> {
        self.select(|node| node.process == process && node.kind.is_start_event())
    }

    pub fn end_events_of(&self, process: &str) -> Vec<NodeId> {
        self.select(|node| node.process == process && node.kind.is_end_event())
    }

    /// Start events of the root process.
    pub fn global_start_events(&self) -> Vec<NodeId> {
        self.start_events_of(self.process_id())
    }

    /// Processes enclosing `node`, innermost first, ending with the root process.
    pub fn process_chain(&self, node: NodeId) -> Vec<String> {
        let mut chain = Vec::new();
        let mut process = self.node(node).process.clone();
        loop {
            chain.push(process.clone());
            if self.is_root(&process) {
                break;
            }
            match self.node_by_id(&process) {
                // bounded walk: deserialised graphs skip the builder's cycle check
                Some(parent) if chain.len() <= self.nodes_len() => {
                    process = self.node(parent).process.clone();
                }
                _ => break,
            }
        }
        chain
    }

    /// Nodes placed directly in `process`, or anywhere below it when `deep` is set.
    pub fn nodes_inside(&self, process: &str, deep: bool) -> Vec<NodeId> {
        self.nodes_sorted()
            .into_iter()
            .filter(|id| {
                if deep {
                    self.process_chain(*id).iter().any(|p| p == process)
                } else {
                    self.node(*id).process == process
                }
            })
            .collect()
    }
}
