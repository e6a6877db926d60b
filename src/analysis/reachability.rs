use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::Path;

use log::{debug, warn};
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::net::{Marking, Net, TransitionId};

/// marking 保留完整标识, enabled 仅用于可视化与调试.
#[derive(Debug, Clone)]
pub struct StateNode {
    pub index: usize,
    pub marking: Marking,
    pub enabled: Vec<TransitionId>,
}

#[derive(Debug, Clone)]
pub struct StateEdge {
    pub transition: TransitionId,
    pub name: String,
    /// `None` for silent transitions.
    pub label: Option<String>,
}

impl StateEdge {
    fn new(net: &Net, transition: TransitionId) -> Self {
        let (name, label) = net
            .transition(transition)
            .map(|t| (t.name.clone(), t.label.clone()))
            .unwrap_or_default();
        Self {
            transition,
            name,
            label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateGraphStats {
    pub state_count: usize,
    pub edge_count: usize,
    pub deadlock_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StateGraphConfig {
    /// 最多探索的状态数量. None 表示不设上限.
    pub state_limit: Option<usize>,
}

/// 从初始标识出发按广度优先构建的可达图.
#[derive(Debug)]
pub struct StateGraph {
    pub graph: StableGraph<StateNode, StateEdge>,
    pub initial: NodeIndex,
    pub deadlocks: FxHashSet<NodeIndex>,
    pub truncated: bool,
    pub markings: FxHashMap<Marking, NodeIndex>,
}

impl StateGraph {
    pub fn from_net(net: &Net, initial: &Marking) -> Self {
        Self::with_config(net, initial, StateGraphConfig::default())
    }

    pub fn with_config(net: &Net, initial: &Marking, config: StateGraphConfig) -> Self {
        let mut graph = StableGraph::new();
        let mut markings: FxHashMap<Marking, NodeIndex> = FxHashMap::default();
        let mut queue = VecDeque::new();
        let mut deadlocks = FxHashSet::default();
        let mut truncated = false;

        let initial_index = graph.add_node(StateNode {
            index: 0,
            marking: initial.clone(),
            enabled: Vec::new(),
        });
        markings.insert(initial.clone(), initial_index);
        queue.push_back(initial_index);

        while let Some(state_index) = queue.pop_front() {
            let current = graph[state_index].marking.clone();
            let enabled = net.enabled_transitions(&current);
            graph[state_index].enabled = enabled.clone();

            if enabled.is_empty() {
                deadlocks.insert(state_index);
                continue;
            }

            for transition in enabled {
                let next = match net.fire_transition(&current, transition) {
                    Ok(next) => next,
                    Err(err) => {
                        warn!("state s{}: {err}", graph[state_index].index);
                        continue;
                    }
                };
                let target = match markings.entry(next) {
                    Entry::Occupied(entry) => *entry.get(),
                    Entry::Vacant(entry) => {
                        if config.state_limit.is_some_and(|limit| graph.node_count() >= limit) {
                            truncated = true;
                            continue;
                        }
                        let index = graph.add_node(StateNode {
                            index: graph.node_count(),
                            marking: entry.key().clone(),
                            enabled: Vec::new(),
                        });
                        entry.insert(index);
                        queue.push_back(index);
                        index
                    }
                };
                graph.add_edge(state_index, target, StateEdge::new(net, transition));
            }
        }

        debug!(
            "state graph: {} state(s), {} edge(s), {} deadlock(s){}",
            graph.node_count(),
            graph.edge_count(),
            deadlocks.len(),
            if truncated { ", truncated" } else { "" }
        );
        Self {
            graph,
            initial: initial_index,
            deadlocks,
            truncated,
            markings,
        }
    }

    pub fn stats(&self) -> StateGraphStats {
        StateGraphStats {
            state_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            deadlock_count: self.deadlocks.len(),
            truncated: self.truncated,
        }
    }

    pub fn node(&self, index: NodeIndex) -> &StateNode {
        &self.graph[index]
    }

    pub fn contains_marking(&self, marking: &Marking) -> bool {
        self.markings.contains_key(marking)
    }

    /// Every explored state that enables all of `transitions` at once.
    pub fn states_enabling_all(&self, transitions: &[TransitionId]) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|index| {
                let enabled = &self.graph[*index].enabled;
                transitions.iter().all(|t| enabled.contains(t))
            })
            .collect()
    }

    /// Label sequences of the runs from the initial state to `target`, silent steps
    /// contracted, with at most `max_visible` labelled steps.
    pub fn visible_language(&self, target: &Marking, max_visible: usize) -> BTreeSet<Vec<String>> {
        let mut language = BTreeSet::new();
        let Some(&goal) = self.markings.get(target) else {
            return language;
        };
        let mut seen: FxHashSet<(NodeIndex, Vec<String>)> = FxHashSet::default();
        let mut queue = VecDeque::from([(self.initial, Vec::new())]);
        while let Some((state, trace)) = queue.pop_front() {
            if !seen.insert((state, trace.clone())) {
                continue;
            }
            if state == goal {
                language.insert(trace.clone());
            }
            for edge in self.graph.edges(state) {
                let mut next = trace.clone();
                if let Some(label) = &edge.weight().label {
                    if next.len() == max_visible {
                        continue;
                    }
                    next.push(label.clone());
                }
                queue.push_back((edge.target(), next));
            }
        }
        language
    }

    pub fn dot(&self, net: &Net) -> String {
        fn escape(s: &str) -> String {
            s.replace('\\', "\\\\").replace('"', "\\\"")
        }

        let edge_attr = |_, edge: petgraph::stable_graph::EdgeReference<StateEdge>| -> String {
            let weight = edge.weight();
            let text = weight.label.as_deref().unwrap_or(&weight.name);
            format!("label=\"{}\"", escape(text))
        };
        let node_attr = |_, (_, node): (NodeIndex, &StateNode)| -> String {
            format!(
                "label=\"s{}\\n{}\"",
                node.index,
                escape(&node.marking.to_sorted_string(net))
            )
        };

        format!(
            "{:?}",
            Dot::with_attr_getters(&self.graph, &[Config::EdgeNoLabel], &edge_attr, &node_attr)
        )
    }

    pub fn write_dot<P: AsRef<Path>>(&self, net: &Net, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.dot(net))
    }
}

/// Whether `final_marking` is reachable from `initial` within `state_limit` states.
pub fn is_easy_sound(
    net: &Net,
    initial: &Marking,
    final_marking: &Marking,
    state_limit: Option<usize>,
) -> bool {
    let state_graph = StateGraph::with_config(net, initial, StateGraphConfig { state_limit });
    let sound = state_graph.contains_marking(final_marking);
    if !sound && state_graph.truncated {
        warn!(
            "final marking not found within {} explored state(s); exploration was truncated",
            state_graph.graph.node_count()
        );
    }
    sound
}
