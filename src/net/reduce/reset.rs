use crate::net::ids::{PlaceId, TransitionId};
use crate::net::structure::Arc;

use super::{ReductionContext, ReductionError, ReductionStep, Worklist};

impl ReductionContext<'_> {
    /// # 约简规则:复位弧约简(R)
    ///
    /// 若 p 同时经复位弧与抑制弧连向 t, 则 t 发射时 p 必为空, 复位弧是冗余的, 将其删除.
    pub(crate) fn reduce_reset_arcs(&mut self) -> Result<usize, ReductionError> {
        let mut worklist = Worklist::seeded(self.net.transition_ids());
        let mut applied = 0;

        while let Some(t) = worklist.pop() {
            for p in self.redundant_resets(t) {
                let before = self.size();
                let step = ReductionStep::ResetArcRemoved {
                    place: self.place_name(p),
                    transition: self.transition_name(t),
                };
                self.net.remove_arc(&Arc::reset(p, t));
                self.commit(before, step)?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn redundant_resets(&self, t: TransitionId) -> Vec<PlaceId> {
        let inhibitors = self.net.inhibitor_pre_set(t);
        self.net
            .reset_pre_set(t)
            .intersection(&inhibitors)
            .copied()
            .collect()
    }
}
