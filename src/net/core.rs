//! 网的存储与运行时语义：库所/迁移竞技场、前后集查询、可发生与发生规则.
use std::collections::BTreeSet;
use std::fmt::{self, Write as FmtWrite};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::Incidence;
use crate::net::index_vec::IndexVec;
use crate::net::structure::{Arc, ArcKind, Marking, Place, Transition};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("a place named `{0}` already exists")]
    DuplicatePlace(String),
    #[error("a transition named `{0}` already exists")]
    DuplicateTransition(String),
    #[error("place {0:?} does not exist or was removed")]
    UnknownPlace(PlaceId),
    #[error("transition {0:?} does not exist or was removed")]
    UnknownTransition(TransitionId),
    #[error("inconsistent arc structure: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FireError {
    #[error("transition {0:?} does not exist or was removed")]
    Unknown(TransitionId),
    #[error("transition {0:?} is not enabled under the supplied marking")]
    NotEnabled(TransitionId),
}

/// Reset/inhibitor net. Places and transitions live in tombstoned arenas: deleting a
/// node leaves its slot empty, so ids handed out earlier never change meaning and
/// markings keyed by [`PlaceId`] stay valid across reductions.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Net {
    pub name: String,
    places: IndexVec<PlaceId, Option<Place>>,
    transitions: IndexVec<TransitionId, Option<Transition>>,
    arcs: Incidence,
    place_names: IndexMap<String, PlaceId>,
    transition_names: IndexMap<String, TransitionId>,
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("name", &self.name)
            .field("places", &self.places().collect::<Vec<_>>())
            .field("transitions", &self.transitions().collect::<Vec<_>>())
            .field("arcs", &self.arcs)
            .finish()
    }
}

impl Net {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_place(&mut self, place: Place) -> Result<PlaceId, NetError> {
        if self.place_names.contains_key(&place.name) {
            return Err(NetError::DuplicatePlace(place.name));
        }
        let id = self.arcs.push_place();
        debug_assert_eq!(id, self.places.next_index());
        self.place_names.insert(place.name.clone(), id);
        self.places.push(Some(place));
        Ok(id)
    }

    pub fn add_transition(&mut self, transition: Transition) -> Result<TransitionId, NetError> {
        if self.transition_names.contains_key(&transition.name) {
            return Err(NetError::DuplicateTransition(transition.name));
        }
        let id = self.arcs.push_transition();
        debug_assert_eq!(id, self.transitions.next_index());
        self.transition_names.insert(transition.name.clone(), id);
        self.transitions.push(Some(transition));
        Ok(id)
    }

    /// Adds an arc between two live nodes. Returns `false` if it already existed.
    pub fn add_arc(&mut self, arc: Arc) -> Result<bool, NetError> {
        self.require_place(arc.place)?;
        self.require_transition(arc.transition)?;
        Ok(self.arcs.insert(arc))
    }

    /// Normal arc place → transition.
    pub fn add_input_arc(&mut self, place: PlaceId, transition: TransitionId) -> Result<bool, NetError> {
        self.add_arc(Arc::input(place, transition))
    }

    /// Normal arc transition → place.
    pub fn add_output_arc(&mut self, transition: TransitionId, place: PlaceId) -> Result<bool, NetError> {
        self.add_arc(Arc::output(transition, place))
    }

    pub fn add_reset_arc(&mut self, place: PlaceId, transition: TransitionId) -> Result<bool, NetError> {
        self.add_arc(Arc::reset(place, transition))
    }

    pub fn add_inhibitor_arc(&mut self, place: PlaceId, transition: TransitionId) -> Result<bool, NetError> {
        self.add_arc(Arc::inhibitor(place, transition))
    }

    pub fn remove_arc(&mut self, arc: &Arc) -> bool {
        self.arcs.remove(arc)
    }

    /// Deletes the place together with every arc touching it.
    pub fn remove_place(&mut self, place: PlaceId) -> Result<Place, NetError> {
        let removed = self
            .places
            .get_mut(place)
            .and_then(Option::take)
            .ok_or(NetError::UnknownPlace(place))?;
        self.arcs.detach_place(place);
        self.place_names.shift_remove(&removed.name);
        Ok(removed)
    }

    pub fn remove_transition(&mut self, transition: TransitionId) -> Result<Transition, NetError> {
        let removed = self
            .transitions
            .get_mut(transition)
            .and_then(Option::take)
            .ok_or(NetError::UnknownTransition(transition))?;
        self.arcs.detach_transition(transition);
        self.transition_names.shift_remove(&removed.name);
        Ok(removed)
    }

    pub fn place(&self, place: PlaceId) -> Option<&Place> {
        self.places.get(place).and_then(Option::as_ref)
    }

    pub fn place_mut(&mut self, place: PlaceId) -> Option<&mut Place> {
        self.places.get_mut(place).and_then(Option::as_mut)
    }

    pub fn transition(&self, transition: TransitionId) -> Option<&Transition> {
        self.transitions.get(transition).and_then(Option::as_ref)
    }

    pub fn transition_mut(&mut self, transition: TransitionId) -> Option<&mut Transition> {
        self.transitions.get_mut(transition).and_then(Option::as_mut)
    }

    pub fn place_by_name(&self, name: &str) -> Option<PlaceId> {
        self.place_names.get(name).copied()
    }

    pub fn transition_by_name(&self, name: &str) -> Option<TransitionId> {
        self.transition_names.get(name).copied()
    }

    /// Live places in id order.
    pub fn places(&self) -> impl Iterator<Item = (PlaceId, &Place)> {
        self.places
            .iter_enumerated()
            .filter_map(|(id, slot)| slot.as_ref().map(|place| (id, place)))
    }

    pub fn transitions(&self) -> impl Iterator<Item = (TransitionId, &Transition)> {
        self.transitions
            .iter_enumerated()
            .filter_map(|(id, slot)| slot.as_ref().map(|transition| (id, transition)))
    }

    pub fn place_ids(&self) -> Vec<PlaceId> {
        self.places().map(|(id, _)| id).collect()
    }

    pub fn transition_ids(&self) -> Vec<TransitionId> {
        self.transitions().map(|(id, _)| id).collect()
    }

    pub fn places_mut(&mut self) -> impl Iterator<Item = (PlaceId, &mut Place)> {
        self.places
            .iter_enumerated_mut()
            .filter_map(|(id, slot)| slot.as_mut().map(|place| (id, place)))
    }

    pub fn transitions_mut(&mut self) -> impl Iterator<Item = (TransitionId, &mut Transition)> {
        self.transitions
            .iter_enumerated_mut()
            .filter_map(|(id, slot)| slot.as_mut().map(|transition| (id, transition)))
    }

    pub fn places_len(&self) -> usize {
        self.place_names.len()
    }

    pub fn transitions_len(&self) -> usize {
        self.transition_names.len()
    }

    pub fn arcs_len(&self) -> usize {
        self.arcs.len()
    }

    pub fn arcs(&self) -> impl Iterator<Item = &Arc> {
        self.arcs.iter()
    }

    pub fn has_arc(&self, arc: &Arc) -> bool {
        self.arcs.contains(arc)
    }

    pub fn contains_place(&self, place: PlaceId) -> bool {
        self.place(place).is_some()
    }

    pub fn contains_transition(&self, transition: TransitionId) -> bool {
        self.transition(transition).is_some()
    }

    /// All arcs incident to the place as `(transition, kind)`.
    pub fn place_arcs(&self, place: PlaceId) -> &[(TransitionId, ArcKind)] {
        self.arcs.place_arcs(place)
    }

    pub fn transition_arcs(&self, transition: TransitionId) -> &[(PlaceId, ArcKind)] {
        self.arcs.transition_arcs(transition)
    }

    /// Arcs ending in the place (normal arcs from producers).
    pub fn place_in_arcs(&self, place: PlaceId) -> impl Iterator<Item = TransitionId> + '_ {
        self.place_arcs(place)
            .iter()
            .filter(|(_, kind)| !kind.is_place_to_transition())
            .map(|(transition, _)| *transition)
    }

    /// Arcs leaving the place, whatever their kind.
    pub fn place_out_arcs(&self, place: PlaceId) -> impl Iterator<Item = (TransitionId, ArcKind)> + '_ {
        self.place_arcs(place)
            .iter()
            .filter(|(_, kind)| kind.is_place_to_transition())
            .copied()
    }

    /// Arcs ending in the transition, whatever their kind.
    pub fn transition_in_arcs(&self, transition: TransitionId) -> impl Iterator<Item = (PlaceId, ArcKind)> + '_ {
        self.transition_arcs(transition)
            .iter()
            .filter(|(_, kind)| kind.is_place_to_transition())
            .copied()
    }

    pub fn transition_out_arcs(&self, transition: TransitionId) -> impl Iterator<Item = PlaceId> + '_ {
        self.transition_arcs(transition)
            .iter()
            .filter(|(_, kind)| *kind == ArcKind::Output)
            .map(|(place, _)| *place)
    }

    fn transition_set(&self, transition: TransitionId, wanted: ArcKind) -> BTreeSet<PlaceId> {
        self.transition_arcs(transition)
            .iter()
            .filter(|(_, kind)| *kind == wanted)
            .map(|(place, _)| *place)
            .collect()
    }

    fn place_set(&self, place: PlaceId, wanted: ArcKind) -> BTreeSet<TransitionId> {
        self.place_arcs(place)
            .iter()
            .filter(|(_, kind)| *kind == wanted)
            .map(|(transition, _)| *transition)
            .collect()
    }

    pub fn normal_pre_set(&self, transition: TransitionId) -> BTreeSet<PlaceId> {
        self.transition_set(transition, ArcKind::Input)
    }

    pub fn normal_post_set(&self, transition: TransitionId) -> BTreeSet<PlaceId> {
        self.transition_set(transition, ArcKind::Output)
    }

    pub fn reset_pre_set(&self, transition: TransitionId) -> BTreeSet<PlaceId> {
        self.transition_set(transition, ArcKind::Reset)
    }

    pub fn inhibitor_pre_set(&self, transition: TransitionId) -> BTreeSet<PlaceId> {
        self.transition_set(transition, ArcKind::Inhibitor)
    }

    /// Transitions producing into the place.
    pub fn producers(&self, place: PlaceId) -> BTreeSet<TransitionId> {
        self.place_set(place, ArcKind::Output)
    }

    /// Transitions consuming from the place through a normal arc.
    pub fn consumers(&self, place: PlaceId) -> BTreeSet<TransitionId> {
        self.place_set(place, ArcKind::Input)
    }

    pub fn reset_post_set(&self, place: PlaceId) -> BTreeSet<TransitionId> {
        self.place_set(place, ArcKind::Reset)
    }

    pub fn inhibitor_post_set(&self, place: PlaceId) -> BTreeSet<TransitionId> {
        self.place_set(place, ArcKind::Inhibitor)
    }

    /// Round-trip structural soundness: every arc is mirrored at both endpoints,
    /// no arc touches a removed node, and the name index matches the arenas.
    pub fn check_consistency(&self) -> Result<(), NetError> {
        self.arcs.verify_mirrors().map_err(NetError::Inconsistent)?;
        for arc in self.arcs.iter() {
            if !self.contains_place(arc.place) {
                return Err(NetError::Inconsistent(format!(
                    "{arc:?} references removed place {:?}",
                    arc.place
                )));
            }
            if !self.contains_transition(arc.transition) {
                return Err(NetError::Inconsistent(format!(
                    "{arc:?} references removed transition {:?}",
                    arc.transition
                )));
            }
        }
        for (id, place) in self.places() {
            if self.place_by_name(&place.name) != Some(id) {
                return Err(NetError::Inconsistent(format!(
                    "name index does not resolve `{}` to {id:?}",
                    place.name
                )));
            }
        }
        for (id, transition) in self.transitions() {
            if self.transition_by_name(&transition.name) != Some(id) {
                return Err(NetError::Inconsistent(format!(
                    "name index does not resolve `{}` to {id:?}",
                    transition.name
                )));
            }
        }
        if self.place_names.len() != self.places().count()
            || self.transition_names.len() != self.transitions().count()
        {
            return Err(NetError::Inconsistent(
                "name index holds entries for removed nodes".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        if !self.contains_transition(transition) {
            return false;
        }
        self.transition_in_arcs(transition)
            .all(|(place, kind)| match kind {
                ArcKind::Input => marking.tokens(place) >= 1,
                ArcKind::Inhibitor => marking.tokens(place) == 0,
                ArcKind::Reset | ArcKind::Output => true,
            })
    }

    pub fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        self.transitions()
            .map(|(id, _)| id)
            .filter(|id| self.is_enabled(*id, marking))
            .collect()
    }

    /// Fires the transition: consume inputs, clear reset places, then produce outputs.
    pub fn fire_transition(
        &self,
        marking: &Marking,
        transition: TransitionId,
    ) -> Result<Marking, FireError> {
        if !self.contains_transition(transition) {
            return Err(FireError::Unknown(transition));
        }
        if !self.is_enabled(transition, marking) {
            return Err(FireError::NotEnabled(transition));
        }

        let mut next = marking.clone();
        for (place, kind) in self.transition_in_arcs(transition) {
            if kind == ArcKind::Input {
                next.remove_tokens(place, 1);
            }
        }
        for (place, kind) in self.transition_in_arcs(transition) {
            if kind == ArcKind::Reset {
                next.set(place, 0);
            }
        }
        for place in self.transition_out_arcs(transition) {
            next.add_tokens(place, 1);
        }
        Ok(next)
    }

    pub fn to_dot(&self, initial: &Marking, final_marking: &Marking) -> String {
        let mut dot = String::new();
        let _ = writeln!(&mut dot, "digraph ResetNet {{");
        let _ = writeln!(&mut dot, "    rankdir=LR;");
        let _ = writeln!(&mut dot, "    node [fontname=\"Helvetica\"];");

        for (place_id, place) in self.places() {
            let tokens = initial.tokens(place_id);
            let label = if tokens > 0 {
                format!("{}\\n{}", escape_label(&place.name), "\u{25CF}".repeat(tokens as usize))
            } else {
                escape_label(&place.name)
            };
            let peripheries = if final_marking.contains(place_id) { 2 } else { 1 };
            let _ = writeln!(
                &mut dot,
                "    place_{} [label=\"{}\", shape=circle, peripheries={}];",
                place_id.raw(),
                label,
                peripheries
            );
        }

        for (transition_id, transition) in self.transitions() {
            let (label, fill) = match &transition.label {
                Some(label) => (escape_label(label), "#ffffff"),
                None => (String::new(), "#000000"),
            };
            let _ = writeln!(
                &mut dot,
                "    trans_{} [label=\"{}\", shape=box, style=filled, fillcolor=\"{}\"];",
                transition_id.raw(),
                label,
                fill
            );
        }

        for arc in self.arcs() {
            let place = format!("place_{}", arc.place.raw());
            let transition = format!("trans_{}", arc.transition.raw());
            let line = match arc.kind {
                ArcKind::Input => format!("    {place} -> {transition};"),
                ArcKind::Output => format!("    {transition} -> {place};"),
                ArcKind::Reset => {
                    format!("    {place} -> {transition} [style=dashed, arrowhead=normalnormal];")
                }
                ArcKind::Inhibitor => format!("    {place} -> {transition} [arrowhead=odot];"),
            };
            let _ = writeln!(&mut dot, "{line}");
        }

        let _ = writeln!(&mut dot, "}}");
        dot
    }

    fn require_place(&self, place: PlaceId) -> Result<(), NetError> {
        if self.contains_place(place) {
            Ok(())
        } else {
            Err(NetError::UnknownPlace(place))
        }
    }

    fn require_transition(&self, transition: TransitionId) -> Result<(), NetError> {
        if self.contains_transition(transition) {
            Ok(())
        } else {
            Err(NetError::UnknownTransition(transition))
        }
    }
}

fn escape_label(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
