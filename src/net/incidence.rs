//! 弧集合：以三元组 (库所, 迁移, 类型) 存储，并维护按端点划分的邻接镜像.
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::IndexVec;
use crate::net::structure::{Arc, ArcKind};

type SmallRow<T> = SmallVec<[T; 4]>;

/// All arcs of a net. `arcs` is the authoritative collection; `by_place` and
/// `by_transition` mirror it so pre/post-set queries do not scan every arc.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Incidence {
    arcs: IndexSet<Arc>,
    by_place: IndexVec<PlaceId, SmallRow<(TransitionId, ArcKind)>>,
    by_transition: IndexVec<TransitionId, SmallRow<(PlaceId, ArcKind)>>,
}

impl Incidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_place(&mut self) -> PlaceId {
        self.by_place.push(SmallRow::new())
    }

    pub fn push_transition(&mut self) -> TransitionId {
        self.by_transition.push(SmallRow::new())
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn contains(&self, arc: &Arc) -> bool {
        self.arcs.contains(arc)
    }

    /// Inserts the arc; returns `false` when it was already present.
    pub fn insert(&mut self, arc: Arc) -> bool {
        if !self.arcs.insert(arc) {
            return false;
        }
        self.by_place[arc.place].push((arc.transition, arc.kind));
        self.by_transition[arc.transition].push((arc.place, arc.kind));
        true
    }

    pub fn remove(&mut self, arc: &Arc) -> bool {
        if !self.arcs.shift_remove(arc) {
            return false;
        }
        self.by_place[arc.place].retain(|(t, kind)| !(*t == arc.transition && *kind == arc.kind));
        self.by_transition[arc.transition]
            .retain(|(p, kind)| !(*p == arc.place && *kind == arc.kind));
        true
    }

    /// Removes every arc touching `place` and returns them.
    pub fn detach_place(&mut self, place: PlaceId) -> Vec<Arc> {
        let arcs = self
            .place_arcs(place)
            .iter()
            .map(|(transition, kind)| Arc::new(place, *transition, *kind))
            .collect::<Vec<_>>();
        for arc in &arcs {
            self.remove(arc);
        }
        arcs
    }

    pub fn detach_transition(&mut self, transition: TransitionId) -> Vec<Arc> {
        let arcs = self
            .transition_arcs(transition)
            .iter()
            .map(|(place, kind)| Arc::new(*place, transition, *kind))
            .collect::<Vec<_>>();
        for arc in &arcs {
            self.remove(arc);
        }
        arcs
    }

    pub fn place_arcs(&self, place: PlaceId) -> &[(TransitionId, ArcKind)] {
        self.by_place.get(place).map(|row| row.as_slice()).unwrap_or(&[])
    }

    pub fn transition_arcs(&self, transition: TransitionId) -> &[(PlaceId, ArcKind)] {
        self.by_transition
            .get(transition)
            .map(|row| row.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc> {
        self.arcs.iter()
    }

    /// Checks that the adjacency mirrors agree with the arc collection. Returns a
    /// description of the first disagreement.
    pub fn verify_mirrors(&self) -> Result<(), String> {
        for arc in &self.arcs {
            if !self.place_arcs(arc.place).contains(&(arc.transition, arc.kind)) {
                return Err(format!("{arc:?} missing from place adjacency"));
            }
            if !self
                .transition_arcs(arc.transition)
                .contains(&(arc.place, arc.kind))
            {
                return Err(format!("{arc:?} missing from transition adjacency"));
            }
        }
        let mirrored_by_place: usize = self.by_place.iter().map(|row| row.len()).sum();
        let mirrored_by_transition: usize = self.by_transition.iter().map(|row| row.len()).sum();
        if mirrored_by_place != self.arcs.len() || mirrored_by_transition != self.arcs.len() {
            return Err(format!(
                "adjacency holds {mirrored_by_place}/{mirrored_by_transition} entries for {} arcs",
                self.arcs.len()
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Incidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.arcs.iter()).finish()
    }
}
