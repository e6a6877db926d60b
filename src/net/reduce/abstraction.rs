use std::collections::BTreeSet;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::structure::{Arc, ArcKind};

use super::{ReductionContext, ReductionError, ReductionStep, Worklist};

struct AbstractionMatch {
    place: PlaceId,
    producers: BTreeSet<TransitionId>,
    targets: BTreeSet<PlaceId>,
}

impl ReductionContext<'_> {
    /// # 约简规则:抽象(A)
    ///
    /// - 静默迁移 t 满足 `•t = {s}` 且无复位/抑制前驱, s 的普通后继仅为 t.
    /// - `U = •s` 与 `Q = t•` 均非空, 且 `t ∉ U`, `s ∉ Q`.
    /// - 对任意 `u ∈ U`, `q ∈ Q`, 网中尚无普通弧 u → q.
    /// - 每个 `q ∈ Q` 的复位后继与抑制后继分别与 s 相同, s 不在任何标识中.
    /// - 删除 s 与 t, 并为每对 (u, q) 添加弧 u → q.
    pub(crate) fn abstract_silent_steps(&mut self) -> Result<usize, ReductionError> {
        let mut worklist = Worklist::seeded(self.net.transition_ids());
        let mut applied = 0;

        while let Some(t) = worklist.pop() {
            let Some(found) = self.abstraction_match(t) else {
                continue;
            };

            let before = self.size();
            let step = ReductionStep::Abstracted {
                place: self.place_name(found.place),
                transition: self.transition_name(t),
            };
            self.net.remove_transition(t)?;
            self.net.remove_place(found.place)?;
            for u in &found.producers {
                for q in &found.targets {
                    self.net.add_output_arc(*u, *q)?;
                }
            }
            self.commit(before, step)?;
            applied += 1;

            for q in &found.targets {
                worklist.extend(self.net.consumers(*q));
            }
        }
        Ok(applied)
    }

    fn abstraction_match(&self, t: TransitionId) -> Option<AbstractionMatch> {
        let net = &*self.net;
        if !net.transition(t)?.is_silent() {
            return None;
        }
        let &[(s, ArcKind::Input)] = net.transition_in_arcs(t).collect::<Vec<_>>().as_slice()
        else {
            return None;
        };
        if self.is_marked(s) || net.consumers(s).into_iter().ne([t]) {
            return None;
        }
        let producers = net.producers(s);
        let targets = net.normal_post_set(t);
        if producers.is_empty() || targets.is_empty() {
            return None;
        }
        if producers.contains(&t) || targets.contains(&s) {
            return None;
        }
        let shortcut_exists = producers
            .iter()
            .any(|u| targets.iter().any(|q| net.has_arc(&Arc::output(*u, *q))));
        if shortcut_exists {
            return None;
        }
        let s_resets = net.reset_post_set(s);
        let s_inhibitors = net.inhibitor_post_set(s);
        let same_guards = targets.iter().all(|q| {
            net.reset_post_set(*q) == s_resets && net.inhibitor_post_set(*q) == s_inhibitors
        });
        same_guards.then_some(AbstractionMatch {
            place: s,
            producers,
            targets,
        })
    }
}
