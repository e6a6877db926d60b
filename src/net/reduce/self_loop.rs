use std::collections::BTreeSet;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::structure::ArcKind;

use super::{ReductionContext, ReductionError, ReductionStep, Worklist};

impl ReductionContext<'_> {
    /// # 约简规则:自环迁移消除(ELT)
    ///
    /// 静默迁移 t 仅有普通弧 p → t → p, 无复位/抑制前驱, 且 p 另有至少两个生产者.
    /// 发射 t 不改变任何标识, 直接删除 t.
    pub(crate) fn eliminate_self_loop_transitions(&mut self) -> Result<usize, ReductionError> {
        let mut worklist = Worklist::seeded(self.net.transition_ids());
        let mut applied = 0;

        while let Some(t) = worklist.pop() {
            let Some(p) = self.self_loop_transition_match(t) else {
                continue;
            };

            let before = self.size();
            let step = ReductionStep::SelfLoopTransitionRemoved {
                transition: self.transition_name(t),
                place: self.place_name(p),
            };
            self.net.remove_transition(t)?;
            self.commit(before, step)?;
            applied += 1;

            worklist.extend(self.net.producers(p));
        }
        Ok(applied)
    }

    fn self_loop_transition_match(&self, t: TransitionId) -> Option<PlaceId> {
        let net = &*self.net;
        if !net.transition(t)?.is_silent() {
            return None;
        }
        let &[(p, ArcKind::Input)] = net.transition_in_arcs(t).collect::<Vec<_>>().as_slice()
        else {
            return None;
        };
        let &[q] = net.transition_out_arcs(t).collect::<Vec<_>>().as_slice() else {
            return None;
        };
        if p != q {
            return None;
        }
        let other_producers = net.producers(p).into_iter().filter(|u| *u != t).count();
        (other_producers >= 2).then_some(p)
    }

    /// # 约简规则:自环库所消除(ELP)
    ///
    /// 库所 p 初始至少有一个托肯且不在终止标识中, 没有抑制后继, 且每个从 p 取托肯或
    /// 被 p 复位的迁移都会把托肯放回 p (`p• ∪ R(p) = •p`). p 恒非空, 对行为没有约束,
    /// 删除 p 并将其移出初始标识.
    pub(crate) fn eliminate_self_loop_places(&mut self) -> Result<usize, ReductionError> {
        let mut worklist = Worklist::seeded(self.net.place_ids());
        let mut applied = 0;

        while let Some(p) = worklist.pop() {
            if !self.self_loop_place_match(p) {
                continue;
            }

            let before = self.size();
            let step = ReductionStep::SelfLoopPlaceRemoved {
                place: self.place_name(p),
            };
            self.net.remove_place(p)?;
            self.initial.take(p);
            self.commit(before, step)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn self_loop_place_match(&self, p: PlaceId) -> bool {
        let net = &*self.net;
        if !net.contains_place(p) {
            return false;
        }
        if self.initial.tokens(p) == 0 || self.final_marking.contains(p) {
            return false;
        }
        if !net.inhibitor_post_set(p).is_empty() {
            return false;
        }
        let targets = net
            .place_out_arcs(p)
            .map(|(transition, _)| transition)
            .collect::<BTreeSet<_>>();
        let sources = net.producers(p);
        if !targets.is_subset(&sources) {
            return false;
        }
        let mut covered = net.reset_post_set(p);
        covered.extend(targets);
        covered == sources
    }
}
