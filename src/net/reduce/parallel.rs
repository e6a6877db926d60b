use std::collections::{BTreeMap, BTreeSet, HashMap};

use itertools::Itertools;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::structure::Weight;

use super::{ReductionContext, ReductionError, ReductionStep};

/// `(•t, t•, R(t), I(t))` of a transition.
type TransitionSignature = (
    BTreeSet<PlaceId>,
    BTreeSet<PlaceId>,
    BTreeSet<PlaceId>,
    BTreeSet<PlaceId>,
);

/// `(•p, p•, reset successors, inhibitor successors, initial tokens, final tokens)`.
type PlaceSignature = (
    BTreeSet<TransitionId>,
    BTreeSet<TransitionId>,
    BTreeSet<TransitionId>,
    BTreeSet<TransitionId>,
    Weight,
    Weight,
);

impl ReductionContext<'_> {
    /// # 约简规则:并行迁移融合(FPT)
    ///
    /// 普通前集、普通后集、复位前集与抑制前集都相同的静默迁移互为副本, 每组仅保留编号最小者.
    /// 以签名分组代替对迁移子集的穷举.
    pub(crate) fn fuse_parallel_transitions(&mut self) -> Result<usize, ReductionError> {
        let groups = self
            .net
            .transitions()
            .filter(|(_, transition)| transition.is_silent())
            .map(|(id, _)| (self.transition_signature(id), id))
            .into_group_map();
        let mut applied = 0;

        for group in duplicate_groups(groups) {
            let Some((&kept, removed)) = group.split_first() else {
                continue;
            };
            let before = self.size();
            let step = ReductionStep::ParallelTransitionsFused {
                kept: self.transition_name(kept),
                removed: removed.iter().map(|t| self.transition_name(*t)).collect(),
            };
            for transition in removed {
                self.net.remove_transition(*transition)?;
            }
            self.commit(before, step)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn transition_signature(&self, t: TransitionId) -> TransitionSignature {
        (
            self.net.normal_pre_set(t),
            self.net.normal_post_set(t),
            self.net.reset_pre_set(t),
            self.net.inhibitor_pre_set(t),
        )
    }

    /// # 约简规则:并行库所融合(FPP)
    ///
    /// 普通前集、普通后集、复位后继与抑制后继都相同, 且初始/终止托肯数也相同的库所互为副本,
    /// 每组仅保留编号最小者, 其余库所从网和两个标识中删除.
    pub(crate) fn fuse_parallel_places(&mut self) -> Result<usize, ReductionError> {
        let groups = self
            .net
            .place_ids()
            .into_iter()
            .map(|id| (self.place_signature(id), id))
            .into_group_map();
        let mut applied = 0;

        for group in duplicate_groups(groups) {
            let Some((&kept, removed)) = group.split_first() else {
                continue;
            };
            let before = self.size();
            let step = ReductionStep::ParallelPlacesFused {
                kept: self.place_name(kept),
                removed: removed.iter().map(|p| self.place_name(*p)).collect(),
            };
            for place in removed {
                self.net.remove_place(*place)?;
                self.initial.take(*place);
                self.final_marking.take(*place);
            }
            self.commit(before, step)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn place_signature(&self, p: PlaceId) -> PlaceSignature {
        (
            self.net.producers(p),
            self.net.consumers(p),
            self.net.reset_post_set(p),
            self.net.inhibitor_post_set(p),
            self.initial.tokens(p),
            self.final_marking.tokens(p),
        )
    }
}

/// Groups with at least two members, each sorted by id, in order of their smallest id.
fn duplicate_groups<K, I: Ord + Copy>(groups: HashMap<K, Vec<I>>) -> Vec<Vec<I>> {
    let by_first = groups
        .into_values()
        .filter(|members| members.len() > 1)
        .filter_map(|mut members| {
            members.sort();
            members.first().copied().map(|first| (first, members))
        })
        .collect::<BTreeMap<_, _>>();
    by_first.into_values().collect()
}

#[cfg(test)]
mod tests {
    use crate::net::reduce::tests::NetFixture;
    use crate::net::reduce::{ReductionOptions, ReductionStep, Rule};

    fn only_parallel(transitions: bool, places: bool) -> ReductionOptions {
        ReductionOptions {
            parallel_transitions: transitions,
            parallel_places: places,
            ..ReductionOptions::default()
        }
    }

    #[test]
    fn fpt_merges_duplicate_silent_transitions() {
        let mut fx = NetFixture::new();
        let p = fx.place("p");
        let q = fx.place("q");
        let r = fx.place("r");
        let t1 = fx.silent("t1");
        let t2 = fx.silent("t2");
        let a = fx.labelled("a");
        let b = fx.labelled("b");
        fx.flow(p, t1, q);
        fx.flow(p, t2, q);
        fx.flow(q, a, r);
        fx.flow(r, b, p);
        fx.initial.set(p, 1);
        fx.final_marking.set(r, 1);

        let report = fx.reduce(only_parallel(true, false));
        assert_eq!(report.count(Rule::Fpt), 1);
        assert_eq!(
            report.steps.first(),
            Some(&ReductionStep::ParallelTransitionsFused {
                kept: "t1".to_string(),
                removed: vec!["t2".to_string()],
            })
        );
        assert!(!fx.net.contains_transition(t2));
        assert!(fx.net.check_consistency().is_ok());
    }

    #[test]
    fn fpt_is_skipped_when_disabled_or_over_limit() {
        let build = || {
            let mut fx = NetFixture::new();
            let p = fx.place("p");
            let q = fx.place("q");
            let t1 = fx.silent("t1");
            let t2 = fx.silent("t2");
            fx.flow(p, t1, q);
            fx.flow(p, t2, q);
            fx.initial.set(p, 1);
            fx.final_marking.set(q, 1);
            fx
        };

        let mut disabled = build();
        assert_eq!(disabled.reduce(ReductionOptions::default()).count(Rule::Fpt), 0);

        let mut too_large = build();
        let options = ReductionOptions {
            exhaustive_limit: 3,
            ..only_parallel(true, false)
        };
        assert_eq!(too_large.reduce(options).count(Rule::Fpt), 0);
        assert_eq!(too_large.net.transitions_len(), 2);
    }

    #[test]
    fn fpp_merges_places_with_equal_tokens_only() {
        let mut fx = NetFixture::new();
        let start = fx.place("start");
        let x = fx.place("x");
        let y = fx.place("y");
        let end = fx.place("end");
        let split = fx.labelled("split");
        let join = fx.labelled("join");
        fx.net.add_input_arc(start, split).unwrap();
        fx.net.add_output_arc(split, x).unwrap();
        fx.net.add_output_arc(split, y).unwrap();
        fx.net.add_input_arc(x, join).unwrap();
        fx.net.add_input_arc(y, join).unwrap();
        fx.net.add_output_arc(join, end).unwrap();
        fx.initial.set(start, 1);
        fx.final_marking.set(end, 1);

        let report = fx.reduce(only_parallel(false, true));
        assert_eq!(report.count(Rule::Fpp), 1);
        assert!(fx.net.contains_place(x));
        assert!(!fx.net.contains_place(y));

        let mut marked = NetFixture::new();
        let x = marked.place("x");
        let y = marked.place("y");
        let t = marked.labelled("t");
        marked.net.add_input_arc(x, t).unwrap();
        marked.net.add_input_arc(y, t).unwrap();
        marked.initial.set(x, 1);
        let report = marked.reduce(only_parallel(false, true));
        assert_eq!(report.count(Rule::Fpp), 0);
    }
}
