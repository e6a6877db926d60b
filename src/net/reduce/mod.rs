//! 复位/抑制网化简：串行融合、自环消除、复位弧约简，以及可选的并行融合与抽象规则.
//!
//! 每条规则都是带附加条件的局部重写. 调度器按固定顺序 FST, FSP, [FPT], [FPP], ELT,
//! ELP, [A], R 依次运行各规则，直到一整轮没有任何规则生效. 规则内部以工作表驱动：
//! 初始放入全部锚点，每次重写后只把受影响的邻域重新入队.
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::core::NetError;
use crate::net::ids::{PlaceId, TransitionId};
use crate::net::Net;
use crate::net::index_vec::Idx;
use crate::net::structure::Marking;

mod abstraction;
mod parallel;
mod reset;
mod self_loop;
mod series;

pub type ReductionValidator = dyn Fn(&Net) -> Result<(), ReductionError> + Send + Sync;

/// The rule catalogue, in scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rule {
    /// Fusion of series transitions.
    Fst,
    /// Fusion of series places.
    Fsp,
    /// Fusion of parallel transitions.
    Fpt,
    /// Fusion of parallel places.
    Fpp,
    /// Elimination of self-loop transitions.
    Elt,
    /// Elimination of self-loop places.
    Elp,
    /// Abstraction.
    A,
    /// Reset arc reduction.
    R,
}

impl Rule {
    pub const ORDER: [Rule; 8] = [
        Rule::Fst,
        Rule::Fsp,
        Rule::Fpt,
        Rule::Fpp,
        Rule::Elt,
        Rule::Elp,
        Rule::A,
        Rule::R,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Rule::Fst => "FST",
            Rule::Fsp => "FSP",
            Rule::Fpt => "FPT",
            Rule::Fpp => "FPP",
            Rule::Elt => "ELT",
            Rule::Elp => "ELP",
            Rule::A => "A",
            Rule::R => "R",
        }
    }

    /// Rules whose matching is combinatorial in the worst case.
    pub fn is_exhaustive(self) -> bool {
        matches!(self, Rule::Fpt | Rule::Fpp | Rule::A)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Clone)]
pub struct ReductionOptions {
    pub parallel_transitions: bool,
    pub parallel_places: bool,
    pub abstraction: bool,
    /// 可选规则仅在 `|P| + |T|` 不超过该值时运行
    pub exhaustive_limit: usize,
    /// 每次重写之后执行的不变量校验
    pub invariant_checker: Option<Arc<ReductionValidator>>,
}

impl Default for ReductionOptions {
    fn default() -> Self {
        Self {
            parallel_transitions: false,
            parallel_places: false,
            abstraction: false,
            exhaustive_limit: 64,
            invariant_checker: None,
        }
    }
}

impl fmt::Debug for ReductionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReductionOptions")
            .field("parallel_transitions", &self.parallel_transitions)
            .field("parallel_places", &self.parallel_places)
            .field("abstraction", &self.abstraction)
            .field("exhaustive_limit", &self.exhaustive_limit)
            .field("invariant_checker", &self.invariant_checker.is_some())
            .finish()
    }
}

impl ReductionOptions {
    /// Enables every optional rule.
    pub fn exhaustive() -> Self {
        Self {
            parallel_transitions: true,
            parallel_places: true,
            abstraction: true,
            ..Self::default()
        }
    }

    pub fn with_invariant_checker(mut self, checker: Arc<ReductionValidator>) -> Self {
        self.invariant_checker = Some(checker);
        self
    }

    fn enables(&self, rule: Rule) -> bool {
        match rule {
            Rule::Fpt => self.parallel_transitions,
            Rule::Fpp => self.parallel_places,
            Rule::A => self.abstraction,
            _ => true,
        }
    }
}

/// One applied rewrite, named by the places and transitions it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReductionStep {
    SeriesTransitionsFused {
        place: String,
        transition: String,
        into: String,
    },
    SeriesPlacesFused {
        place: String,
        transition: String,
        into: String,
    },
    ParallelTransitionsFused {
        kept: String,
        removed: Vec<String>,
    },
    ParallelPlacesFused {
        kept: String,
        removed: Vec<String>,
    },
    SelfLoopTransitionRemoved {
        transition: String,
        place: String,
    },
    SelfLoopPlaceRemoved {
        place: String,
    },
    Abstracted {
        place: String,
        transition: String,
    },
    ResetArcRemoved {
        place: String,
        transition: String,
    },
}

impl ReductionStep {
    pub fn rule(&self) -> Rule {
        match self {
            ReductionStep::SeriesTransitionsFused { .. } => Rule::Fst,
            ReductionStep::SeriesPlacesFused { .. } => Rule::Fsp,
            ReductionStep::ParallelTransitionsFused { .. } => Rule::Fpt,
            ReductionStep::ParallelPlacesFused { .. } => Rule::Fpp,
            ReductionStep::SelfLoopTransitionRemoved { .. } => Rule::Elt,
            ReductionStep::SelfLoopPlaceRemoved { .. } => Rule::Elp,
            ReductionStep::Abstracted { .. } => Rule::A,
            ReductionStep::ResetArcRemoved { .. } => Rule::R,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReductionReport {
    pub steps: Vec<ReductionStep>,
    pub passes: usize,
    pub applied: BTreeMap<Rule, usize>,
}

impl ReductionReport {
    pub fn count(&self, rule: Rule) -> usize {
        self.applied.get(&rule).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// `(places, transitions, arcs)`, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetSize {
    pub places: usize,
    pub transitions: usize,
    pub arcs: usize,
}

impl NetSize {
    pub fn of(net: &Net) -> Self {
        Self {
            places: net.places_len(),
            transitions: net.transitions_len(),
            arcs: net.arcs_len(),
        }
    }
}

impl fmt::Display for NetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|P|={} |T|={} |F|={}", self.places, self.transitions, self.arcs)
    }
}

#[derive(Debug, Error)]
pub enum ReductionError {
    #[error("{rule} rewrite did not shrink the net ({before} -> {after})")]
    NonTermination {
        rule: Rule,
        before: NetSize,
        after: NetSize,
    },
    #[error("validator rejected reduced net: {0}")]
    ValidationFailed(String),
    #[error(transparent)]
    Net(#[from] NetError),
}

/// FIFO of anchors that deduplicates pending entries.
pub(crate) struct Worklist<I> {
    queue: VecDeque<I>,
    pending: BTreeSet<I>,
}

impl<I: Idx> Worklist<I> {
    pub(crate) fn seeded(anchors: impl IntoIterator<Item = I>) -> Self {
        let mut worklist = Self {
            queue: VecDeque::new(),
            pending: BTreeSet::new(),
        };
        worklist.extend(anchors);
        worklist
    }

    pub(crate) fn push(&mut self, anchor: I) {
        if self.pending.insert(anchor) {
            self.queue.push_back(anchor);
        }
    }

    pub(crate) fn extend(&mut self, anchors: impl IntoIterator<Item = I>) {
        for anchor in anchors {
            self.push(anchor);
        }
    }

    pub(crate) fn pop(&mut self) -> Option<I> {
        let anchor = self.queue.pop_front()?;
        self.pending.remove(&anchor);
        Some(anchor)
    }
}

/// Mutable view the rules operate on.
pub(crate) struct ReductionContext<'a> {
    pub(crate) net: &'a mut Net,
    pub(crate) initial: &'a mut Marking,
    pub(crate) final_marking: &'a mut Marking,
    pub(crate) steps: Vec<ReductionStep>,
    checker: Option<Arc<ReductionValidator>>,
}

impl ReductionContext<'_> {
    pub(crate) fn size(&self) -> NetSize {
        NetSize::of(self.net)
    }

    pub(crate) fn is_marked(&self, place: PlaceId) -> bool {
        self.initial.contains(place) || self.final_marking.contains(place)
    }

    pub(crate) fn place_name(&self, place: PlaceId) -> String {
        self.net
            .place(place)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| place.to_string())
    }

    pub(crate) fn transition_name(&self, transition: TransitionId) -> String {
        self.net
            .transition(transition)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| transition.to_string())
    }

    /// Records an applied rewrite after checking it shrank the net and passes the
    /// invariant checker.
    pub(crate) fn commit(&mut self, before: NetSize, step: ReductionStep) -> Result<(), ReductionError> {
        let after = self.size();
        if after >= before {
            return Err(ReductionError::NonTermination {
                rule: step.rule(),
                before,
                after,
            });
        }
        debug!("[{}] {:?} ({} -> {})", step.rule(), step, before, after);
        if let Some(checker) = &self.checker {
            checker(&*self.net).map_err(|err| {
                ReductionError::ValidationFailed(format!("after {}: {err}", step.rule()))
            })?;
        }
        self.steps.push(step);
        Ok(())
    }

    fn run(&mut self, rule: Rule) -> Result<usize, ReductionError> {
        match rule {
            Rule::Fst => self.fuse_series_transitions(),
            Rule::Fsp => self.fuse_series_places(),
            Rule::Fpt => self.fuse_parallel_transitions(),
            Rule::Fpp => self.fuse_parallel_places(),
            Rule::Elt => self.eliminate_self_loop_transitions(),
            Rule::Elp => self.eliminate_self_loop_places(),
            Rule::A => self.abstract_silent_steps(),
            Rule::R => self.reduce_reset_arcs(),
        }
    }
}

pub struct Reducer {
    options: ReductionOptions,
}

impl Reducer {
    pub fn new(options: ReductionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReductionOptions {
        &self.options
    }

    /// Rewrites `net` and both markings in place until no enabled rule applies.
    pub fn reduce(
        &self,
        net: &mut Net,
        initial: &mut Marking,
        final_marking: &mut Marking,
    ) -> Result<ReductionReport, ReductionError> {
        let start = NetSize::of(net);
        let mut context = ReductionContext {
            net,
            initial,
            final_marking,
            steps: Vec::new(),
            checker: self.options.invariant_checker.clone(),
        };
        let mut report = ReductionReport::default();

        loop {
            report.passes += 1;
            let mut pass_applied = 0;
            for rule in Rule::ORDER {
                if !self.options.enables(rule) {
                    continue;
                }
                if rule.is_exhaustive() {
                    let size = context.size();
                    if size.places + size.transitions > self.options.exhaustive_limit {
                        debug!(
                            "skipping {rule}: net size {size} exceeds exhaustive limit {}",
                            self.options.exhaustive_limit
                        );
                        continue;
                    }
                }
                let applied = context.run(rule)?;
                if applied > 0 {
                    *report.applied.entry(rule).or_default() += applied;
                    pass_applied += applied;
                }
            }
            if pass_applied == 0 {
                break;
            }
        }

        context.net.check_consistency()?;
        report.steps = std::mem::take(&mut context.steps);
        info!(
            "reduction finished after {} pass(es): {} -> {}, {} rewrite(s)",
            report.passes,
            start,
            NetSize::of(context.net),
            report.total()
        );
        Ok(report)
    }
}

pub fn reduce_in_place(
    net: &mut Net,
    initial: &mut Marking,
    final_marking: &mut Marking,
    options: ReductionOptions,
) -> Result<ReductionReport, ReductionError> {
    Reducer::new(options).reduce(net, initial, final_marking)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::net::{Place, Transition};

    /// Small builder for hand-written nets in rule tests.
    pub(crate) struct NetFixture {
        pub(crate) net: Net,
        pub(crate) initial: Marking,
        pub(crate) final_marking: Marking,
    }

    impl NetFixture {
        pub(crate) fn new() -> Self {
            Self {
                net: Net::empty(),
                initial: Marking::new(),
                final_marking: Marking::new(),
            }
        }

        pub(crate) fn place(&mut self, name: &str) -> PlaceId {
            self.net.add_place(Place::plain(name)).unwrap()
        }

        pub(crate) fn silent(&mut self, name: &str) -> TransitionId {
            self.net.add_transition(Transition::silent(name)).unwrap()
        }

        pub(crate) fn labelled(&mut self, name: &str) -> TransitionId {
            self.net
                .add_transition(Transition::labelled(name, name.to_uppercase()))
                .unwrap()
        }

        pub(crate) fn flow(&mut self, from: PlaceId, via: TransitionId, to: PlaceId) {
            self.net.add_input_arc(from, via).unwrap();
            self.net.add_output_arc(via, to).unwrap();
        }

        pub(crate) fn reduce(&mut self, options: ReductionOptions) -> ReductionReport {
            Reducer::new(options)
                .reduce(&mut self.net, &mut self.initial, &mut self.final_marking)
                .unwrap()
        }
    }

    #[test]
    fn worklist_deduplicates_pending_anchors() {
        let mut worklist = Worklist::seeded([PlaceId::new(1), PlaceId::new(0), PlaceId::new(1)]);
        worklist.push(PlaceId::new(0));
        assert_eq!(worklist.pop(), Some(PlaceId::new(1)));
        worklist.push(PlaceId::new(1));
        assert_eq!(worklist.pop(), Some(PlaceId::new(0)));
        assert_eq!(worklist.pop(), Some(PlaceId::new(1)));
        assert_eq!(worklist.pop(), None);
    }

    #[test]
    fn minimal_sequence_is_left_untouched() {
        let mut fx = NetFixture::new();
        let source = fx.place("source");
        let mid = fx.place("mid");
        let sink = fx.place("sink");
        let a = fx.labelled("a");
        let b = fx.labelled("b");
        fx.flow(source, a, mid);
        fx.flow(mid, b, sink);
        fx.initial.set(source, 1);
        fx.final_marking.set(sink, 1);

        let report = fx.reduce(ReductionOptions::default());
        assert!(report.is_empty());
        assert_eq!(report.passes, 1);
        assert_eq!(NetSize::of(&fx.net), NetSize { places: 3, transitions: 2, arcs: 4 });
    }

    #[test]
    fn silent_chain_collapses_and_second_run_is_a_no_op() {
        let mut fx = NetFixture::new();
        let source = fx.place("source");
        let p1 = fx.place("p1");
        let p2 = fx.place("p2");
        let sink = fx.place("sink");
        let a = fx.labelled("a");
        let tau1 = fx.silent("tau1");
        let tau2 = fx.silent("tau2");
        fx.flow(source, a, p1);
        fx.flow(p1, tau1, p2);
        fx.flow(p2, tau2, sink);
        fx.initial.set(source, 1);
        fx.final_marking.set(sink, 1);

        let report = fx.reduce(ReductionOptions::default());
        assert_eq!(report.count(Rule::Fst), 2);
        assert_eq!(fx.net.places_len(), 2);
        assert_eq!(fx.net.transitions_len(), 1);
        assert_eq!(fx.net.producers(sink), BTreeSet::from([a]));

        let again = fx.reduce(ReductionOptions::default());
        assert!(again.is_empty());
    }

    #[test]
    fn invariant_checker_rejection_aborts_reduction() {
        let mut fx = NetFixture::new();
        let p = fx.place("p");
        let q = fx.place("q");
        let r = fx.place("r");
        let a = fx.labelled("a");
        let tau = fx.silent("tau");
        fx.flow(p, a, q);
        fx.flow(q, tau, r);

        let options = ReductionOptions::default().with_invariant_checker(Arc::new(|_net: &Net| {
            Err(ReductionError::ValidationFailed("rejected".to_string()))
        }));
        let err = Reducer::new(options)
            .reduce(&mut fx.net, &mut fx.initial, &mut fx.final_marking)
            .unwrap_err();
        assert!(matches!(err, ReductionError::ValidationFailed(_)));
    }

    #[test]
    fn invariant_checker_runs_after_every_rewrite() {
        let mut fx = NetFixture::new();
        let source = fx.place("source");
        let p1 = fx.place("p1");
        let p2 = fx.place("p2");
        let sink = fx.place("sink");
        let a = fx.labelled("a");
        let tau1 = fx.silent("tau1");
        let tau2 = fx.silent("tau2");
        fx.flow(source, a, p1);
        fx.flow(p1, tau1, p2);
        fx.flow(p2, tau2, sink);

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let options = ReductionOptions::default().with_invariant_checker(Arc::new(
            move |net: &Net| -> Result<(), ReductionError> {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(net.check_consistency()?)
            },
        ));
        let report = Reducer::new(options)
            .reduce(&mut fx.net, &mut fx.initial, &mut fx.final_marking)
            .unwrap();
        assert_eq!(report.total(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), report.total());
    }
}
