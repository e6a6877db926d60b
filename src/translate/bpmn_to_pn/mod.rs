//! 规范化后的流程图到网的构造器.

mod elements;
mod subprocess;
mod termination;

use std::collections::HashMap;

use log::debug;

use crate::bpmn::{FlowId, NodeId, ProcessGraph};
use crate::net::{Arc, Marking, Net, PlaceId, TransitionId};

use super::ConvertError;

/// Builds the accepting net of one normalised process graph. Every flow owns exactly
/// one place, recorded in `flow_places`, except that all flows entering normal end
/// events of the root process share `root_sink`. Gateway normalisation guarantees
/// that non-gateway nodes have at most one incoming and one outgoing flow.
pub struct BpmnToPetriNet<'graph> {
    graph: &'graph ProcessGraph,
    include_events: bool,
    pub net: Net,
    pub initial: Marking,
    pub final_marking: Marking,
    flow_places: HashMap<FlowId, PlaceId>,
    root_sink: Option<PlaceId>,
}

impl<'graph> BpmnToPetriNet<'graph> {
    pub fn new(graph: &'graph ProcessGraph, include_events: bool) -> Self {
        Self {
            graph,
            include_events,
            net: Net::named(graph.name()),
            initial: Marking::new(),
            final_marking: Marking::new(),
            flow_places: HashMap::with_capacity(graph.flows_len()),
            root_sink: None,
        }
    }

    pub fn construct(&mut self) -> Result<(), ConvertError> {
        self.translate_flows()?;
        self.translate_nodes()?;
        let frames = self.glue_subprocesses()?;
        self.translate_task_boundaries()?;
        for frame in &frames {
            self.translate_subprocess_boundaries(frame)?;
            self.terminate_subprocess(frame)?;
            self.retag(frame);
        }
        self.terminate_root()?;
        debug!(
            "`{}`: {} subprocess(es) glued, initial {:?}, final {:?}",
            self.graph.process_id(),
            frames.len(),
            self.initial,
            self.final_marking
        );
        Ok(())
    }

    pub fn into_parts(self) -> (Net, Marking, Marking) {
        (self.net, self.initial, self.final_marking)
    }

    fn flow_place(&self, flow: FlowId) -> PlaceId {
        self.flow_places[&flow]
    }

    /// Place of the single incoming flow of `node`.
    fn in_place(&self, node: NodeId) -> Result<PlaceId, ConvertError> {
        self.graph
            .node(node)
            .incoming
            .first()
            .map(|flow| self.flow_place(*flow))
            .ok_or_else(|| self.precondition(node, "has no incoming flow"))
    }

    /// Place of the single outgoing flow of `node`.
    fn out_place(&self, node: NodeId) -> Result<PlaceId, ConvertError> {
        self.graph
            .node(node)
            .outgoing
            .first()
            .map(|flow| self.flow_place(*flow))
            .ok_or_else(|| self.precondition(node, "has no outgoing flow"))
    }

    /// Places of `flows`, in ascending flow id order.
    fn sorted_places(&self, flows: &[FlowId]) -> Vec<PlaceId> {
        let mut flows = flows.to_vec();
        flows.sort_by(|a, b| self.graph.flow(*a).id.cmp(&self.graph.flow(*b).id));
        flows.into_iter().map(|flow| self.flow_place(flow)).collect()
    }

    fn precondition(&self, node: NodeId, reason: impl Into<String>) -> ConvertError {
        ConvertError::StructuralPrecondition {
            node: self.graph.node(node).id.clone(),
            reason: reason.into(),
        }
    }

    /// Live places currently tagged with `process`; every place for the root process.
    fn scope_places(&self, process: &str) -> Vec<PlaceId> {
        let root = self.graph.is_root(process);
        self.net
            .places()
            .filter(|(_, place)| root || place.process == process)
            .map(|(id, _)| id)
            .collect()
    }

    /// Adds a reset arc from each of `places` to `transition`, skipping places that
    /// already feed it through a normal arc.
    fn add_resets(
        &mut self,
        places: impl IntoIterator<Item = PlaceId>,
        transition: TransitionId,
    ) -> Result<usize, ConvertError> {
        let mut added = 0;
        for place in places {
            if self.net.has_arc(&Arc::input(place, transition)) {
                continue;
            }
            if self.net.add_reset_arc(place, transition)? {
                added += 1;
            }
        }
        Ok(added)
    }
}
