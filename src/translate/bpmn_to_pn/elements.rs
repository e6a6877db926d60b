//! 流 -> 库所, 节点 -> 迁移, 以及原子任务上的边界事件.
use itertools::Itertools;
use log::debug;

use super::BpmnToPetriNet;
use crate::bpmn::{EventTrigger, GatewayDirection, GatewayKind, Node, NodeId, NodeKind};
use crate::net::{Place, PlaceRole, Transition};
use crate::translate::ConvertError;
use crate::{net_name, silent_step};

fn end_role(trigger: EventTrigger, event: &str) -> PlaceRole {
    match trigger {
        EventTrigger::Normal => PlaceRole::Sink,
        EventTrigger::Error => PlaceRole::Error(event.to_string()),
        EventTrigger::Cancel => PlaceRole::Cancel(event.to_string()),
        EventTrigger::Message => PlaceRole::Message(event.to_string()),
        EventTrigger::Terminate => PlaceRole::Terminate(event.to_string()),
    }
}

impl BpmnToPetriNet<'_> {
    pub(super) fn translate_flows(&mut self) -> Result<(), ConvertError> {
        let graph = self.graph;
        for flow_id in graph.flows_sorted() {
            let flow = graph.flow(flow_id);
            let source = graph.node(flow.source);
            let target = graph.node(flow.target);

            let root_end = !source.kind.is_start_event()
                && target.kind == NodeKind::EndEvent(EventTrigger::Normal)
                && graph.is_root(&target.process);
            if let (true, Some(sink)) = (root_end, self.root_sink) {
                debug!("flow `{}` enters the shared root sink {:?}", flow.id, sink);
                self.flow_places.insert(flow_id, sink);
                continue;
            }

            let place = if source.kind.is_start_event() {
                Place::new(
                    net_name!("source", flow.id, flow.process),
                    PlaceRole::Source,
                    &flow.process,
                )
            } else if let NodeKind::EndEvent(trigger) = target.kind {
                let role = end_role(trigger, target.event_name());
                let name = match (role.prefix(), role.event_name()) {
                    (Some(prefix), Some(event)) => net_name!(prefix, event, flow.id, flow.process),
                    (Some(prefix), None) => net_name!(prefix, flow.id, flow.process),
                    (None, _) => net_name!(&flow.id, flow.process),
                };
                Place::new(name, role, &flow.process)
            } else {
                Place::new(net_name!(&flow.id, flow.process), PlaceRole::Flow, &flow.process)
            };

            let place = self.net.add_place(place)?;
            self.flow_places.insert(flow_id, place);
            if root_end {
                self.root_sink = Some(place);
            }
        }
        Ok(())
    }

    pub(super) fn translate_nodes(&mut self) -> Result<(), ConvertError> {
        let graph = self.graph;
        for id in graph.nodes_sorted() {
            let node = graph.node(id);
            match &node.kind {
                NodeKind::StartEvent(_) => {
                    let place = self.out_place(id)?;
                    if graph.is_root(&node.process) {
                        self.initial.add_tokens(place, 1);
                    }
                }
                NodeKind::EndEvent(trigger) => {
                    let place = self.in_place(id)?;
                    if *trigger == EventTrigger::Normal && graph.is_root(&node.process) {
                        self.final_marking.set(place, 1);
                    }
                }
                NodeKind::Task
                | NodeKind::IntermediateCatchEvent(_)
                | NodeKind::IntermediateThrowEvent(_) => {
                    let label = node.display_name().map(str::to_string);
                    self.translate_step(id, label)?;
                }
                NodeKind::Gateway { kind, direction } => {
                    self.translate_gateway(id, *kind, *direction)?;
                }
                NodeKind::SubProcess { .. } | NodeKind::BoundaryEvent { .. } => {}
            }
        }
        Ok(())
    }

    /// `in -> t -> out` for a node with one incoming and one outgoing flow.
    fn translate_step(&mut self, id: NodeId, label: Option<String>) -> Result<(), ConvertError> {
        let node = self.graph.node(id);
        let input = self.in_place(id)?;
        let output = self.out_place(id)?;
        let transition = Transition::new(net_name!("t", node.id, node.process), label, &node.process);
        let t = self.net.add_transition(transition)?;
        self.net.add_input_arc(input, t)?;
        self.net.add_output_arc(t, output)?;
        Ok(())
    }

    fn translate_gateway(
        &mut self,
        id: NodeId,
        kind: GatewayKind,
        direction: GatewayDirection,
    ) -> Result<(), ConvertError> {
        let graph = self.graph;
        let node: &Node = graph.node(id);
        if direction == GatewayDirection::Unspecified
            && node.incoming.len() == 1
            && node.outgoing.len() == 1
        {
            return self.translate_step(id, None);
        }
        if node.incoming.is_empty() {
            return Err(self.precondition(id, "gateway has no incoming flow"));
        }
        if node.outgoing.is_empty() {
            return Err(self.precondition(id, "gateway has no outgoing flow"));
        }
        let inputs = self.sorted_places(&node.incoming);
        let outputs = self.sorted_places(&node.outgoing);

        match kind {
            GatewayKind::Parallel => {
                silent_step!(
                    self.net,
                    net_name!("t", node.id, node.process),
                    &node.process,
                    inputs,
                    outputs
                );
            }
            GatewayKind::Exclusive => {
                let branches = inputs.iter().cartesian_product(outputs.iter());
                for (k, (input, output)) in branches.enumerate() {
                    silent_step!(
                        self.net,
                        net_name!("t", format!("{}#{k}", node.id), node.process),
                        &node.process,
                        [*input],
                        [*output]
                    );
                }
            }
            GatewayKind::Inclusive => {
                return Err(ConvertError::UnsupportedConstruct {
                    node: node.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// An atomic task is interrupted by firing the boundary transition straight from
    /// the task's incoming place.
    pub(super) fn translate_task_boundaries(&mut self) -> Result<(), ConvertError> {
        let graph = self.graph;
        for task in graph.nodes_sorted() {
            let node = graph.node(task);
            if node.kind != NodeKind::Task {
                continue;
            }
            for event in graph.boundary_events_of(&node.id) {
                let input = self.in_place(task)?;
                let output = self.out_place(event)?;
                let event = graph.node(event);
                let transition = Transition::new(
                    net_name!("t-boundary", event.id, node.process),
                    self.boundary_label(event),
                    &node.process,
                );
                let t = self.net.add_transition(transition)?;
                self.net.add_input_arc(input, t)?;
                self.net.add_output_arc(t, output)?;
                debug!("boundary event `{}` interrupts task `{}`", event.id, node.id);
            }
        }
        Ok(())
    }

    pub(super) fn boundary_label(&self, event: &Node) -> Option<String> {
        if !self.include_events {
            return None;
        }
        event.display_name().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use crate::bpmn::{
        BoundaryTrigger, EventTrigger, GatewayDirection, GatewayKind, ProcessGraph,
        ProcessGraphBuilder,
    };
    use crate::net::PlaceRole;
    use crate::translate::{ConvertError, convert};

    fn sequence() -> ProcessGraph {
        let mut builder = ProcessGraphBuilder::new("proc", "sequence");
        builder
            .start_event("start", EventTrigger::Normal, "proc")
            .task("a", "A", "proc")
            .task("b", "B", "proc")
            .end_event("end", None, EventTrigger::Normal, "proc")
            .sequence_flow("f1", "start", "a")
            .sequence_flow("f2", "a", "b")
            .sequence_flow("f3", "b", "end");
        builder.build().unwrap()
    }

    #[test]
    fn sequence_maps_flows_to_places_and_tasks_to_labelled_transitions() {
        let (net, initial, final_marking) = convert(&sequence(), true).unwrap();
        assert_eq!(net.places_len(), 3);
        assert_eq!(net.transitions_len(), 2);

        let source = net.place_by_name("source@@@f1@@@proc").unwrap();
        let middle = net.place_by_name("f2@@@proc").unwrap();
        let sink = net.place_by_name("sink@@@f3@@@proc").unwrap();
        assert_eq!(net.place(source).unwrap().role, PlaceRole::Source);
        assert_eq!(net.place(middle).unwrap().role, PlaceRole::Flow);
        assert_eq!(net.place(sink).unwrap().role, PlaceRole::Sink);

        let a = net.transition_by_name("t@@@a@@@proc").unwrap();
        assert_eq!(net.transition(a).unwrap().label.as_deref(), Some("A"));
        assert_eq!(initial.to_sorted_string(&net), "[source@@@f1@@@proc:1]");
        assert_eq!(final_marking.to_sorted_string(&net), "[sink@@@f3@@@proc:1]");
    }

    #[test]
    fn exclusive_split_yields_one_silent_transition_per_branch() {
        let mut builder = ProcessGraphBuilder::new("proc", "xor");
        builder
            .start_event("start", EventTrigger::Normal, "proc")
            .gateway("x", GatewayKind::Exclusive, GatewayDirection::Diverging, "proc")
            .task("a", "A", "proc")
            .task("b", "B", "proc")
            .end_event("ea", None, EventTrigger::Normal, "proc")
            .end_event("eb", None, EventTrigger::Normal, "proc")
            .sequence_flow("f0", "start", "x")
            .sequence_flow("f1", "x", "a")
            .sequence_flow("f2", "x", "b")
            .sequence_flow("f3", "a", "ea")
            .sequence_flow("f4", "b", "eb");
        let graph = builder.build().unwrap();
        let (net, _, _) = convert(&graph, true).unwrap();

        let branches = ["t@@@x#0@@@proc", "t@@@x#1@@@proc"];
        for name in branches {
            let t = net.transition_by_name(name).unwrap();
            assert!(net.transition(t).unwrap().is_silent());
            assert_eq!(net.normal_pre_set(t).len(), 1);
            assert_eq!(net.normal_post_set(t).len(), 1);
        }
        let x0 = net.transition_by_name(branches[0]).unwrap();
        let x1 = net.transition_by_name(branches[1]).unwrap();
        assert_eq!(net.normal_pre_set(x0), net.normal_pre_set(x1));
        assert_ne!(net.normal_post_set(x0), net.normal_post_set(x1));
    }

    #[test]
    fn root_normal_ends_share_one_sink() {
        let mut builder = ProcessGraphBuilder::new("proc", "two ends");
        builder
            .start_event("start", EventTrigger::Normal, "proc")
            .gateway("x", GatewayKind::Exclusive, GatewayDirection::Diverging, "proc")
            .task("a", "A", "proc")
            .task("b", "B", "proc")
            .end_event("ea", None, EventTrigger::Normal, "proc")
            .end_event("eb", None, EventTrigger::Normal, "proc")
            .sequence_flow("f0", "start", "x")
            .sequence_flow("f1", "x", "a")
            .sequence_flow("f2", "x", "b")
            .sequence_flow("f3", "a", "ea")
            .sequence_flow("f4", "b", "eb");
        let graph = builder.build().unwrap();
        let (net, _, final_marking) = convert(&graph, true).unwrap();

        let sink = net.place_by_name("sink@@@f3@@@proc").unwrap();
        assert!(net.place_by_name("sink@@@f4@@@proc").is_none());
        let a = net.transition_by_name("t@@@a@@@proc").unwrap();
        let b = net.transition_by_name("t@@@b@@@proc").unwrap();
        assert_eq!(net.producers(sink), std::collections::BTreeSet::from([a, b]));
        assert_eq!(final_marking.to_sorted_string(&net), "[sink@@@f3@@@proc:1]");
        assert!(net.check_consistency().is_ok());
    }

    #[test]
    fn parallel_gateway_is_a_single_silent_transition() {
        let mut builder = ProcessGraphBuilder::new("proc", "and");
        builder
            .start_event("start", EventTrigger::Normal, "proc")
            .gateway("and", GatewayKind::Parallel, GatewayDirection::Diverging, "proc")
            .task("a", "A", "proc")
            .task("b", "B", "proc")
            .end_event("ea", None, EventTrigger::Normal, "proc")
            .end_event("eb", None, EventTrigger::Normal, "proc")
            .sequence_flow("f0", "start", "and")
            .sequence_flow("f1", "and", "a")
            .sequence_flow("f2", "and", "b")
            .sequence_flow("f3", "a", "ea")
            .sequence_flow("f4", "b", "eb");
        let graph = builder.build().unwrap();
        let (net, _, _) = convert(&graph, true).unwrap();

        let t = net.transition_by_name("t@@@and@@@proc").unwrap();
        assert!(net.transition(t).unwrap().is_silent());
        assert_eq!(net.normal_post_set(t).len(), 2);
    }

    #[test]
    fn unspecified_pass_through_gateway_is_silent_even_when_named() {
        let mut builder = ProcessGraphBuilder::new("proc", "pass");
        builder
            .start_event("start", EventTrigger::Normal, "proc")
            .node(
                "g",
                Some("Gate"),
                crate::bpmn::NodeKind::Gateway {
                    kind: GatewayKind::Exclusive,
                    direction: GatewayDirection::Unspecified,
                },
                "proc",
            )
            .end_event("end", None, EventTrigger::Normal, "proc")
            .sequence_flow("f1", "start", "g")
            .sequence_flow("f2", "g", "end");
        let graph = builder.build().unwrap();
        let (net, _, _) = convert(&graph, true).unwrap();
        let t = net.transition_by_name("t@@@g@@@proc").unwrap();
        assert!(net.transition(t).unwrap().is_silent());
    }

    #[test]
    fn end_places_carry_trigger_and_event_name() {
        let mut builder = ProcessGraphBuilder::new("proc", "ends");
        builder
            .start_event("start", EventTrigger::Normal, "proc")
            .task("a", "A", "proc")
            .end_event("boom", Some("Boom"), EventTrigger::Error, "proc")
            .sequence_flow("f1", "start", "a")
            .sequence_flow("f2", "a", "boom");
        let graph = builder.build().unwrap();
        let (net, _, final_marking) = convert(&graph, true).unwrap();

        let place = net.place_by_name("error@@@Boom@@@f2@@@proc").unwrap();
        assert_eq!(
            net.place(place).unwrap().role,
            PlaceRole::Error("Boom".to_string())
        );
        assert!(final_marking.is_empty());
    }

    #[test]
    fn task_boundary_fires_from_the_task_pre_place() {
        let build = |include_events| {
            let mut builder = ProcessGraphBuilder::new("proc", "task-boundary");
            builder
                .start_event("start", EventTrigger::Normal, "proc")
                .task("a", "A", "proc")
                .boundary_event("late", "Late", BoundaryTrigger::Message, "a", "proc")
                .end_event("end", None, EventTrigger::Normal, "proc")
                .end_event("escalated", None, EventTrigger::Normal, "proc")
                .sequence_flow("f1", "start", "a")
                .sequence_flow("f2", "a", "end")
                .sequence_flow("f3", "late", "escalated");
            convert(&builder.build().unwrap(), include_events).unwrap()
        };

        let (net, _, _) = build(true);
        let boundary = net.transition_by_name("t-boundary@@@late@@@proc").unwrap();
        let task = net.transition_by_name("t@@@a@@@proc").unwrap();
        assert_eq!(net.normal_pre_set(boundary), net.normal_pre_set(task));
        assert_eq!(net.transition(boundary).unwrap().label.as_deref(), Some("Late"));

        let (net, _, _) = build(false);
        let boundary = net.transition_by_name("t-boundary@@@late@@@proc").unwrap();
        assert!(net.transition(boundary).unwrap().is_silent());
    }

    #[test]
    fn task_without_outgoing_flow_is_a_precondition_error() {
        let mut builder = ProcessGraphBuilder::new("proc", "dangling");
        builder
            .start_event("start", EventTrigger::Normal, "proc")
            .task("a", "A", "proc")
            .sequence_flow("f1", "start", "a");
        let graph = builder.build().unwrap();
        assert!(matches!(
            convert(&graph, true),
            Err(ConvertError::StructuralPrecondition { node, .. }) if node == "a"
        ));
    }
}
