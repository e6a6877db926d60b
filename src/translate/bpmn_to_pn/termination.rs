//! 终止结束事件: 产生终止库所托肯的迁移复位作用域内的其他库所, 再由静默的 skip
//! 迁移把托肯送到作用域的出口 (子流程的出流库所, 或根流程共享的 sink 库所).
use log::debug;

use super::BpmnToPetriNet;
use super::subprocess::SubprocessFrame;
use crate::bpmn::NodeId;
use crate::net::PlaceId;
use crate::translate::ConvertError;
use crate::{net_name, silent_step};

impl BpmnToPetriNet<'_> {
    pub(super) fn terminate_subprocess(
        &mut self,
        frame: &SubprocessFrame,
    ) -> Result<(), ConvertError> {
        let graph = self.graph;
        let events = graph.termination_events_of(&frame.id);
        let own = self.terminate_places(&events)?;
        for (event, place) in events.into_iter().zip(own.iter().copied()) {
            self.clear_scope(&frame.id, place, &own)?;
            let skip = silent_step!(
                self.net,
                net_name!("t-terminate-end", graph.node(event).id, frame.id, frame.parent),
                &frame.parent,
                [place],
                [frame.out_place]
            );
            debug!("terminate `{}` exits `{}` via {:?}", graph.node(event).id, frame.id, skip);
        }
        Ok(())
    }

    pub(super) fn terminate_root(&mut self) -> Result<(), ConvertError> {
        let graph = self.graph;
        let root = graph.process_id();
        let events = graph.termination_events_of(root);
        if events.is_empty() {
            return Ok(());
        }
        let own = self.terminate_places(&events)?;
        for (event, place) in events.into_iter().zip(own.iter().copied()) {
            let Some(sink) = self.root_sink else {
                return Err(self.precondition(event, "root process has no normal end event"));
            };
            self.clear_scope(root, place, &own)?;
            silent_step!(
                self.net,
                net_name!("t-terminate-end", graph.node(event).id, root),
                root,
                [place],
                [sink]
            );
        }
        debug!("{} root terminate event(s) wired", own.len());
        Ok(())
    }

    fn terminate_places(
        &self,
        events: &[NodeId],
    ) -> Result<Vec<PlaceId>, ConvertError> {
        events.iter().map(|event| self.in_place(*event)).collect()
    }

    /// Every producer of `place` resets the scope of `process`, except the terminate
    /// places of that scope and its own normal inputs.
    fn clear_scope(
        &mut self,
        process: &str,
        place: PlaceId,
        exempt: &[PlaceId],
    ) -> Result<(), ConvertError> {
        let targets = self
            .scope_places(process)
            .into_iter()
            .filter(|p| !exempt.contains(p))
            .collect::<Vec<_>>();
        for producer in self.net.producers(place) {
            let added = self.add_resets(targets.iter().copied(), producer)?;
            debug!("{:?} resets {added} place(s) of `{process}` on termination", producer);
        }
        Ok(())
    }
}
