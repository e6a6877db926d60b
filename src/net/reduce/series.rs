use crate::net::ids::{PlaceId, TransitionId};
use crate::net::structure::ArcKind;

use super::{ReductionContext, ReductionError, ReductionStep, Worklist};

impl ReductionContext<'_> {
    /// # 约简规则:串行迁移融合(FST)
    ///
    /// - 库所 p 满足 `•p = {t}`, `p• = {u}`, 且 p 上没有复位/抑制弧.
    /// - u 为静默迁移, `•u = {p}` 且 u 无复位/抑制前驱.
    /// - `t• ∩ u• = ∅`, u• 中各库所没有复位/抑制后继 (与 p 一致).
    /// - p 不属于初始或终止标识.
    /// - 删除 p 与 u, 并为每个 `q ∈ u•` 添加弧 t → q.
    pub(crate) fn fuse_series_transitions(&mut self) -> Result<usize, ReductionError> {
        let mut worklist = Worklist::seeded(self.net.place_ids());
        let mut applied = 0;

        while let Some(p) = worklist.pop() {
            let Some((t, u)) = self.series_transition_match(p) else {
                continue;
            };

            let before = self.size();
            let step = ReductionStep::SeriesTransitionsFused {
                place: self.place_name(p),
                transition: self.transition_name(u),
                into: self.transition_name(t),
            };
            let targets = self.net.normal_post_set(u);
            self.net.remove_place(p)?;
            self.net.remove_transition(u)?;
            for target in &targets {
                self.net.add_output_arc(t, *target)?;
            }
            self.commit(before, step)?;
            applied += 1;

            worklist.extend(self.net.transition_arcs(t).iter().map(|(place, _)| *place));
        }
        Ok(applied)
    }

    fn series_transition_match(&self, p: PlaceId) -> Option<(TransitionId, TransitionId)> {
        let net = &*self.net;
        if !net.contains_place(p) || self.is_marked(p) {
            return None;
        }
        let producers = net.place_in_arcs(p).collect::<Vec<_>>();
        let outgoing = net.place_out_arcs(p).collect::<Vec<_>>();
        let (&[t], &[(u, ArcKind::Input)]) = (producers.as_slice(), outgoing.as_slice()) else {
            return None;
        };
        if t == u || !net.transition(u)?.is_silent() {
            return None;
        }
        if net.transition_in_arcs(u).count() != 1 {
            return None;
        }
        let u_post = net.normal_post_set(u);
        if !net.normal_post_set(t).is_disjoint(&u_post) {
            return None;
        }
        let quiet_targets = u_post.iter().all(|q| {
            net.reset_post_set(*q).is_empty() && net.inhibitor_post_set(*q).is_empty()
        });
        quiet_targets.then_some((t, u))
    }

    /// # 约简规则:串行库所融合(FSP)
    ///
    /// - 静默迁移 t 满足 `•t = {p}`, `t• = {q}`, 且 t 无复位/抑制前驱.
    /// - p 的普通后继仅为 t, `•p ∩ •q = ∅`.
    /// - p 与 q 的复位后继集合、抑制后继集合分别相等.
    /// - p 不属于终止标识.
    /// - 删除 t 与 p, 将 p 的生产者改接到 q, p 的初始托肯转移到 q.
    pub(crate) fn fuse_series_places(&mut self) -> Result<usize, ReductionError> {
        let mut worklist = Worklist::seeded(self.net.transition_ids());
        let mut applied = 0;

        while let Some(t) = worklist.pop() {
            let Some((p, q)) = self.series_place_match(t) else {
                continue;
            };

            let before = self.size();
            let step = ReductionStep::SeriesPlacesFused {
                place: self.place_name(p),
                transition: self.transition_name(t),
                into: self.place_name(q),
            };
            let sources = self.net.producers(p);
            self.net.remove_transition(t)?;
            self.net.remove_place(p)?;
            for source in &sources {
                self.net.add_output_arc(*source, q)?;
            }
            let tokens = self.initial.take(p);
            if tokens > 0 {
                self.initial.add_tokens(q, tokens);
            }
            self.commit(before, step)?;
            applied += 1;

            worklist.extend(
                self.net
                    .place_arcs(q)
                    .iter()
                    .map(|(transition, _)| *transition),
            );
        }
        Ok(applied)
    }

    fn series_place_match(&self, t: TransitionId) -> Option<(PlaceId, PlaceId)> {
        let net = &*self.net;
        if !net.transition(t)?.is_silent() {
            return None;
        }
        let incoming = net.transition_in_arcs(t).collect::<Vec<_>>();
        let outgoing = net.transition_out_arcs(t).collect::<Vec<_>>();
        let (&[(p, ArcKind::Input)], &[q]) = (incoming.as_slice(), outgoing.as_slice()) else {
            return None;
        };
        if p == q || self.final_marking.contains(p) {
            return None;
        }
        if net.consumers(p).into_iter().ne([t]) {
            return None;
        }
        if !net.producers(p).is_disjoint(&net.producers(q)) {
            return None;
        }
        let same_guards = net.reset_post_set(p) == net.reset_post_set(q)
            && net.inhibitor_post_set(p) == net.inhibitor_post_set(q);
        same_guards.then_some((p, q))
    }
}
