//! 化简的端到端测试: 行为保持, 幂等性, 以及化简结果的序列化交接.
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bpmn_rinet::analysis::{StateGraph, is_easy_sound};
use bpmn_rinet::bpmn::{
    EventTrigger, GatewayDirection, GatewayKind, ProcessGraph, ProcessGraphBuilder,
};
use bpmn_rinet::net::reduce::{ReductionError, ReductionOptions, Reducer, Rule};
use bpmn_rinet::net::{AcceptingNet, Marking, Net, Place, Transition};
use bpmn_rinet::translate::convert;
use bpmn_rinet::{PipelineConfig, translate_and_reduce};

/// start -> AND(a -> b, c) -> XOR(d | e) -> end
fn order_process() -> ProcessGraph {
    let mut builder = ProcessGraphBuilder::new("order", "order handling");
    builder
        .start_event("start", EventTrigger::Normal, "order")
        .gateway("split", GatewayKind::Parallel, GatewayDirection::Diverging, "order")
        .task("a", "A", "order")
        .task("b", "B", "order")
        .task("c", "C", "order")
        .gateway("join", GatewayKind::Parallel, GatewayDirection::Converging, "order")
        .gateway("x", GatewayKind::Exclusive, GatewayDirection::Diverging, "order")
        .task("d", "D", "order")
        .task("e", "E", "order")
        .gateway("m", GatewayKind::Exclusive, GatewayDirection::Converging, "order")
        .end_event("end", None, EventTrigger::Normal, "order")
        .sequence_flow("f00", "start", "split")
        .sequence_flow("f01", "split", "a")
        .sequence_flow("f02", "a", "b")
        .sequence_flow("f03", "b", "join")
        .sequence_flow("f04", "split", "c")
        .sequence_flow("f05", "c", "join")
        .sequence_flow("f06", "join", "x")
        .sequence_flow("f07", "x", "d")
        .sequence_flow("f08", "x", "e")
        .sequence_flow("f09", "d", "m")
        .sequence_flow("f10", "e", "m")
        .sequence_flow("f11", "m", "end");
    builder.build().unwrap()
}

fn language(net: &Net, initial: &Marking, final_marking: &Marking) -> BTreeSet<Vec<String>> {
    StateGraph::from_net(net, initial).visible_language(final_marking, 4)
}

#[test]
fn reduction_preserves_the_visible_language() {
    let (mut net, mut initial, mut final_marking) = convert(&order_process(), true).unwrap();
    let before = language(&net, &initial, &final_marking);
    assert_eq!(before.len(), 6);

    let report = Reducer::new(ReductionOptions::default())
        .reduce(&mut net, &mut initial, &mut final_marking)
        .unwrap();
    assert_eq!(report.count(Rule::Fst), 2);
    assert_eq!(language(&net, &initial, &final_marking), before);
    assert!(is_easy_sound(&net, &initial, &final_marking, None));
    assert!(net.check_consistency().is_ok());
}

#[test]
fn exhaustive_reduction_preserves_the_visible_language() {
    let (mut net, mut initial, mut final_marking) = convert(&order_process(), true).unwrap();
    let before = language(&net, &initial, &final_marking);

    Reducer::new(ReductionOptions::exhaustive())
        .reduce(&mut net, &mut initial, &mut final_marking)
        .unwrap();
    assert_eq!(language(&net, &initial, &final_marking), before);
}

#[test]
fn every_rewrite_keeps_arc_mirrors_consistent() {
    let (mut net, mut initial, mut final_marking) = convert(&order_process(), true).unwrap();
    let checks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&checks);
    let options = ReductionOptions::exhaustive().with_invariant_checker(Arc::new(
        move |net: &Net| -> Result<(), ReductionError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(net.check_consistency()?)
        },
    ));

    let report = Reducer::new(options)
        .reduce(&mut net, &mut initial, &mut final_marking)
        .unwrap();
    assert!(!report.is_empty());
    assert_eq!(checks.load(Ordering::SeqCst), report.total());
}

/// Final markings of all maximal runs, rendered by place name.
fn dead_markings(net: &Net, initial: &Marking) -> BTreeSet<String> {
    let states = StateGraph::from_net(net, initial);
    states
        .deadlocks
        .iter()
        .map(|state| states.node(*state).marking.to_sorted_string(net))
        .collect()
}

#[test]
fn series_fusion_keeps_reachable_final_markings() {
    // p0 -tau0-> p1 -A-> p2 -tau1-> p3 -B-> p4
    let mut net = Net::named("series");
    let places = (0..5)
        .map(|i| net.add_place(Place::plain(format!("p{i}"))).unwrap())
        .collect::<Vec<_>>();
    let steps = [
        Transition::silent("tau0"),
        Transition::labelled("a", "A"),
        Transition::silent("tau1"),
        Transition::labelled("b", "B"),
    ];
    for (i, step) in steps.into_iter().enumerate() {
        let t = net.add_transition(step).unwrap();
        net.add_input_arc(places[i], t).unwrap();
        net.add_output_arc(t, places[i + 1]).unwrap();
    }
    let mut initial: Marking = [(places[0], 1)].into_iter().collect();
    let mut final_marking: Marking = [(places[4], 1)].into_iter().collect();
    let before = dead_markings(&net, &initial);

    let report = Reducer::new(ReductionOptions::default())
        .reduce(&mut net, &mut initial, &mut final_marking)
        .unwrap();
    assert_eq!(report.count(Rule::Fst), 1);
    assert_eq!(report.count(Rule::Fsp), 1);
    assert_eq!(net.places_len(), 3);
    assert_eq!(initial.to_sorted_string(&net), "[p1:1]");
    assert_eq!(dead_markings(&net, &initial), before);
    assert_eq!(before, BTreeSet::from(["[p4:1]".to_string()]));
}

#[test]
fn reduction_is_idempotent() {
    for options in [ReductionOptions::default(), ReductionOptions::exhaustive()] {
        let (mut net, mut initial, mut final_marking) = convert(&order_process(), true).unwrap();
        let reducer = Reducer::new(options);
        let first = reducer.reduce(&mut net, &mut initial, &mut final_marking).unwrap();
        assert!(!first.is_empty());

        let size = (net.places_len(), net.transitions_len(), net.arcs_len());
        let second = reducer.reduce(&mut net, &mut initial, &mut final_marking).unwrap();
        assert!(second.is_empty());
        assert_eq!(second.passes, 1);
        assert_eq!(size, (net.places_len(), net.transitions_len(), net.arcs_len()));
    }
}

#[test]
fn sequence_is_already_minimal() {
    let mut builder = ProcessGraphBuilder::new("proc", "sequence");
    builder
        .start_event("start", EventTrigger::Normal, "proc")
        .task("a", "A", "proc")
        .task("b", "B", "proc")
        .end_event("end", None, EventTrigger::Normal, "proc")
        .sequence_flow("f1", "start", "a")
        .sequence_flow("f2", "a", "b")
        .sequence_flow("f3", "b", "end");
    let graph = builder.build().unwrap();
    let output = translate_and_reduce(&graph, &PipelineConfig::default()).unwrap();

    assert!(output.reduction.is_empty());
    assert_eq!(output.reduction.passes, 1);
    assert_eq!(output.net.net.places_len(), 3);
    assert_eq!(output.net.net.transitions_len(), 2);
}

#[test]
fn reduced_net_survives_json_and_ron_hand_off() {
    let config = PipelineConfig {
        check_soundness: true,
        ..PipelineConfig::default()
    };
    let output = translate_and_reduce(&order_process(), &config).unwrap();
    let original = &output.net;

    let from_json = AcceptingNet::from_json(&original.to_json().unwrap()).unwrap();
    let from_ron = AcceptingNet::from_ron(&original.to_ron().unwrap()).unwrap();
    for decoded in [from_json, from_ron] {
        assert_eq!(decoded.net.places_len(), original.net.places_len());
        assert_eq!(decoded.net.transitions_len(), original.net.transitions_len());
        assert_eq!(decoded.net.arcs_len(), original.net.arcs_len());
        assert_eq!(
            decoded.initial_marking.to_sorted_string(&decoded.net),
            original.initial_marking.to_sorted_string(&original.net)
        );
        assert_eq!(
            decoded.final_marking.to_sorted_string(&decoded.net),
            original.final_marking.to_sorted_string(&original.net)
        );
        assert_eq!(
            language(&decoded.net, &decoded.initial_marking, &decoded.final_marking),
            language(&original.net, &original.initial_marking, &original.final_marking)
        );
    }
}
