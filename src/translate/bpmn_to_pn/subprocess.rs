//! 子流程粘合与子流程边界事件.
//!
//! 子流程由一个静默的进入迁移和每个内部 sink 一个的静默退出迁移与外部相连.
//! 边界事件分两类:
//!
//! * 内部事件 (error/cancel): 同名同类的内部结束库所合并为一个, 其所有生产者复位
//!   子流程内的其他库所, 然后由边界迁移消费;
//! * 外部事件 (message): 进入迁移额外向门控库所放入托肯, 退出迁移与边界迁移都消费它,
//!   边界迁移复位子流程内的全部库所 (包括兄弟边界事件的门控库所).
//!
//! 复位弧在所有边界结构建立之后统一添加, 这样内部事件的复位也覆盖门控库所.
use log::{debug, warn};

use super::BpmnToPetriNet;
use crate::bpmn::{BoundaryTrigger, EventTrigger, Node, NodeId, NodeKind};
use crate::net::{Place, PlaceId, PlaceRole, Transition, TransitionId};
use crate::translate::ConvertError;
use crate::{net_name, silent_step};

/// Where a subprocess is spliced into its parent.
#[derive(Debug, Clone)]
pub(super) struct SubprocessFrame {
    pub node: NodeId,
    pub id: String,
    pub parent: String,
    pub out_place: PlaceId,
    pub enter: TransitionId,
    pub exits: Vec<TransitionId>,
}

impl BpmnToPetriNet<'_> {
    /// Creates enter and exit transitions for every subprocess, innermost first.
    pub(super) fn glue_subprocesses(&mut self) -> Result<Vec<SubprocessFrame>, ConvertError> {
        let graph = self.graph;
        let mut frames = Vec::new();
        for node in graph.subprocesses_by_depth() {
            let subprocess = graph.node(node);
            let id = subprocess.id.clone();
            let parent = subprocess.process.clone();
            let in_place = self.in_place(node)?;
            let out_place = self.out_place(node)?;

            let sources = graph
                .start_events_of(&id)
                .into_iter()
                .map(|start| self.out_place(start))
                .collect::<Result<Vec<_>, _>>()?;
            if sources.is_empty() {
                return Err(self.precondition(node, "subprocess has no start event"));
            }
            let sinks = self.normal_end_places(&id)?;
            if sinks.is_empty() {
                return Err(self.precondition(node, "subprocess has no normal end event"));
            }

            let enter = silent_step!(
                self.net,
                net_name!("t-start-subprocess", id, parent),
                &parent,
                [in_place],
                sources
            );
            let mut exits = Vec::with_capacity(sinks.len());
            for (k, sink) in sinks.iter().enumerate() {
                let name = if sinks.len() == 1 {
                    net_name!("t-end-subprocess", id, parent)
                } else {
                    net_name!("t-end-subprocess", format!("{id}#{k}"), parent)
                };
                exits.push(silent_step!(self.net, name, &parent, [*sink], [out_place]));
            }

            debug!(
                "glued subprocess `{id}` (depth {:?}) into `{parent}` with {} exit(s)",
                subprocess.kind.depth(),
                exits.len()
            );
            frames.push(SubprocessFrame {
                node,
                id,
                parent,
                out_place,
                enter,
                exits,
            });
        }
        Ok(frames)
    }

    /// Places of the flows entering normal end events placed directly in `process`.
    fn normal_end_places(&self, process: &str) -> Result<Vec<PlaceId>, ConvertError> {
        let graph = self.graph;
        graph
            .end_events_of(process)
            .into_iter()
            .filter(|end| graph.node(*end).kind == NodeKind::EndEvent(EventTrigger::Normal))
            .map(|end| self.in_place(end))
            .collect()
    }

    pub(super) fn translate_subprocess_boundaries(
        &mut self,
        frame: &SubprocessFrame,
    ) -> Result<(), ConvertError> {
        let graph = self.graph;
        let events = graph.boundary_events_of(&frame.id);
        if events.is_empty() {
            return Ok(());
        }

        let mut internal_ends = Vec::new();
        let mut external = Vec::new();
        for event in events {
            let node = graph.node(event);
            let NodeKind::BoundaryEvent { trigger, .. } = &node.kind else {
                continue;
            };
            let output = self.out_place(event)?;
            let transition = Transition::new(
                net_name!("t-boundary", node.id, frame.parent),
                self.boundary_label(node),
                &frame.parent,
            );
            let t = self.net.add_transition(transition)?;
            self.net.add_output_arc(t, output)?;

            if trigger.is_internal() {
                let end = self.merge_internal_ends(frame, node, *trigger)?;
                self.net.add_input_arc(end, t)?;
                if !internal_ends.contains(&end) {
                    internal_ends.push(end);
                }
            } else {
                let gate = self.net.add_place(Place::new(
                    net_name!("boundary", node.id, frame.id),
                    PlaceRole::BoundaryGate,
                    &frame.id,
                ))?;
                self.net.add_output_arc(frame.enter, gate)?;
                for exit in &frame.exits {
                    self.net.add_input_arc(gate, *exit)?;
                }
                self.net.add_input_arc(gate, t)?;
                external.push(t);
            }
        }

        let scope = self.scope_places(&frame.id);
        for end in &internal_ends {
            let targets = scope
                .iter()
                .copied()
                .filter(|place| !internal_ends.contains(place))
                .collect::<Vec<_>>();
            for producer in self.net.producers(*end) {
                self.add_resets(targets.iter().copied(), producer)?;
            }
        }
        for t in &external {
            self.add_resets(scope.iter().copied(), *t)?;
        }
        debug!(
            "subprocess `{}`: {} internal end place(s), {} external boundary event(s)",
            frame.id,
            internal_ends.len(),
            external.len()
        );
        Ok(())
    }

    /// Merges the places of all end events inside the subprocess that raise `boundary`
    /// into the first of them and returns it.
    fn merge_internal_ends(
        &mut self,
        frame: &SubprocessFrame,
        boundary: &Node,
        trigger: BoundaryTrigger,
    ) -> Result<PlaceId, ConvertError> {
        let graph = self.graph;
        let raised_by = NodeKind::EndEvent(trigger.end_trigger());
        let mut candidates = Vec::new();
        for end in graph.end_events_of(&frame.id) {
            let node = graph.node(end);
            if node.kind != raised_by || node.event_name() != boundary.event_name() {
                continue;
            }
            let place = self.in_place(end)?;
            if self.net.contains_place(place) && !candidates.contains(&place) {
                candidates.push(place);
            }
        }

        let Some((&main, duplicates)) = candidates.split_first() else {
            return Err(ConvertError::StructuralPrecondition {
                node: boundary.id.clone(),
                reason: format!(
                    "no {trigger:?} end event named `{}` inside `{}`",
                    boundary.event_name(),
                    frame.id
                ),
            });
        };
        for duplicate in duplicates {
            for producer in self.net.producers(*duplicate) {
                self.net.add_output_arc(producer, main)?;
            }
            self.net.remove_place(*duplicate)?;
        }
        if !duplicates.is_empty() {
            debug!(
                "merged {} end place(s) raising `{}` into {:?}",
                duplicates.len(),
                boundary.id,
                main
            );
        }
        Ok(main)
    }

    /// Hands the places and transitions of an absorbed subprocess to its parent.
    pub(super) fn retag(&mut self, frame: &SubprocessFrame) {
        let graph = self.graph;
        if !graph.is_root(&frame.parent) && graph.node_by_id(&frame.parent).is_none() {
            warn!(
                "subprocess `{}` ({:?}) refers to unknown parent process `{}`",
                frame.id, frame.node, frame.parent
            );
        }
        for (_, place) in self.net.places_mut() {
            if place.process == frame.id {
                place.process = frame.parent.clone();
            }
        }
        for (_, transition) in self.net.transitions_mut() {
            if transition.process == frame.id {
                transition.process = frame.parent.clone();
            }
        }
    }
}
