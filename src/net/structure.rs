//! 网的静态结构元素：库所、迁移、弧与标识。
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::net::Net;
use crate::net::ids::{PlaceId, TransitionId};

pub type Weight = u64;

/// Separator used inside generated place and transition names.
pub const NAME_SEP: &str = "@@@";

/// Semantic role a place plays for the later conversion stages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlaceRole {
    /// Flow leaving a start event.
    Source,
    /// Flow entering a normal end event.
    Sink,
    Error(String),
    Cancel(String),
    Message(String),
    Terminate(String),
    /// Plain sequence or message flow.
    Flow,
    /// Synthetic place gating an external boundary event of a subprocess.
    BoundaryGate,
}

impl PlaceRole {
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            PlaceRole::Source => Some("source"),
            PlaceRole::Sink => Some("sink"),
            PlaceRole::Error(_) => Some("error"),
            PlaceRole::Cancel(_) => Some("cancel"),
            PlaceRole::Message(_) => Some("message"),
            PlaceRole::Terminate(_) => Some("terminate"),
            PlaceRole::Flow => None,
            PlaceRole::BoundaryGate => Some("boundary"),
        }
    }

    /// Name of the end event that produced this role, if any.
    pub fn event_name(&self) -> Option<&str> {
        match self {
            PlaceRole::Error(name)
            | PlaceRole::Cancel(name)
            | PlaceRole::Message(name)
            | PlaceRole::Terminate(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, PlaceRole::Terminate(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub role: PlaceRole,
    /// Owning (sub)process; bookkeeping for the converter only.
    pub process: String,
}

impl Place {
    pub fn new(name: impl Into<String>, role: PlaceRole, process: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            process: process.into(),
        }
    }

    /// A place with no converter bookkeeping attached.
    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(name, PlaceRole::Flow, String::new())
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub name: String,
    /// Observable activity; `None` marks a silent step.
    pub label: Option<String>,
    pub process: String,
}

impl Transition {
    pub fn new(
        name: impl Into<String>,
        label: Option<String>,
        process: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label,
            process: process.into(),
        }
    }

    pub fn silent(name: impl Into<String>) -> Self {
        Self::new(name, None, String::new())
    }

    pub fn labelled(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, Some(label.into()), String::new())
    }

    pub fn is_silent(&self) -> bool {
        self.label.is_none()
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => f.debug_tuple("Transition").field(&self.name).field(label).finish(),
            None => f.debug_tuple("Transition").field(&self.name).finish(),
        }
    }
}

/// Arc kinds. `Input`/`Output` are the two directions of a normal arc; reset and
/// inhibitor arcs always lead from a place to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArcKind {
    Input,
    Output,
    Reset,
    Inhibitor,
}

impl ArcKind {
    pub fn is_normal(self) -> bool {
        matches!(self, ArcKind::Input | ArcKind::Output)
    }

    /// Whether the arc leads from the place to the transition.
    pub fn is_place_to_transition(self) -> bool {
        !matches!(self, ArcKind::Output)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Arc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub kind: ArcKind,
}

impl Arc {
    pub fn new(place: PlaceId, transition: TransitionId, kind: ArcKind) -> Self {
        Self {
            place,
            transition,
            kind,
        }
    }

    pub fn input(place: PlaceId, transition: TransitionId) -> Self {
        Self::new(place, transition, ArcKind::Input)
    }

    pub fn output(transition: TransitionId, place: PlaceId) -> Self {
        Self::new(place, transition, ArcKind::Output)
    }

    pub fn reset(place: PlaceId, transition: TransitionId) -> Self {
        Self::new(place, transition, ArcKind::Reset)
    }

    pub fn inhibitor(place: PlaceId, transition: TransitionId) -> Self {
        Self::new(place, transition, ArcKind::Inhibitor)
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ArcKind::Output => write!(f, "{:?}->{:?}", self.transition, self.place),
            ArcKind::Input => write!(f, "{:?}->{:?}", self.place, self.transition),
            ArcKind::Reset => write!(f, "{:?}-R->{:?}", self.place, self.transition),
            ArcKind::Inhibitor => write!(f, "{:?}-o{:?}", self.place, self.transition),
        }
    }
}

/// Multiset of places. Zero counts are never stored, so structural equality and
/// hashing coincide with multiset equality.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marking(BTreeMap<PlaceId, Weight>);

impl Marking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, Weight)> + '_ {
        self.0.iter().map(|(place, tokens)| (*place, *tokens))
    }

    pub fn places(&self) -> impl Iterator<Item = PlaceId> + '_ {
        self.0.keys().copied()
    }

    pub fn tokens(&self, place: PlaceId) -> Weight {
        self.0.get(&place).copied().unwrap_or(0)
    }

    pub fn contains(&self, place: PlaceId) -> bool {
        self.0.contains_key(&place)
    }

    pub fn set(&mut self, place: PlaceId, tokens: Weight) {
        if tokens == 0 {
            self.0.remove(&place);
        } else {
            self.0.insert(place, tokens);
        }
    }

    pub fn add_tokens(&mut self, place: PlaceId, tokens: Weight) {
        let current = self.tokens(place);
        self.set(place, current + tokens);
    }

    /// Removes up to `tokens` tokens, saturating at zero.
    pub fn remove_tokens(&mut self, place: PlaceId, tokens: Weight) {
        let current = self.tokens(place);
        self.set(place, current.saturating_sub(tokens));
    }

    /// Drops the place entirely and returns the tokens it held.
    pub fn take(&mut self, place: PlaceId) -> Weight {
        self.0.remove(&place).unwrap_or(0)
    }

    /// Renders the marking as `[name:count, ...]` sorted by place name, so two markings
    /// print identically regardless of the ids the places were given.
    pub fn to_sorted_string(&self, net: &Net) -> String {
        let mut entries = self
            .iter()
            .map(|(place, tokens)| {
                let name = net
                    .place(place)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| format!("{place:?}"));
                (name, tokens)
            })
            .collect::<Vec<_>>();
        entries.sort();
        let body = entries
            .iter()
            .map(|(name, tokens)| format!("{name}:{tokens}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("[{body}]")
    }
}

impl FromIterator<(PlaceId, Weight)> for Marking {
    fn from_iter<I: IntoIterator<Item = (PlaceId, Weight)>>(iter: I) -> Self {
        let mut marking = Marking::new();
        for (place, tokens) in iter {
            marking.add_tokens(place, tokens);
        }
        marking
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl Add for &Marking {
    type Output = Marking;

    fn add(self, other: &Marking) -> Marking {
        let mut sum = self.clone();
        for (place, tokens) in other.iter() {
            sum.add_tokens(place, tokens);
        }
        sum
    }
}

impl Sub for &Marking {
    type Output = Marking;

    fn sub(self, other: &Marking) -> Marking {
        let mut difference = self.clone();
        for (place, tokens) in other.iter() {
            difference.remove_tokens(place, tokens);
        }
        difference
    }
}

impl PartialOrd for Marking {
    /// `a <= b` iff every place of `a` is present in `b` with at least as many tokens.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let covered_by = |small: &Marking, large: &Marking| {
            small
                .iter()
                .all(|(place, tokens)| large.tokens(place) >= tokens)
        };
        match (covered_by(self, other), covered_by(other, self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marking(entries: &[(u32, Weight)]) -> Marking {
        entries
            .iter()
            .map(|(place, tokens)| (PlaceId::new(*place), *tokens))
            .collect()
    }

    #[test]
    fn union_and_difference_drop_zero_entries() {
        let a = marking(&[(0, 1), (1, 2)]);
        let b = marking(&[(1, 2), (2, 1)]);

        assert_eq!(&a + &b, marking(&[(0, 1), (1, 4), (2, 1)]));
        let diff = &a - &b;
        assert_eq!(diff, marking(&[(0, 1)]));
        assert!(!diff.contains(PlaceId::new(1)));
    }

    #[test]
    fn partial_order_is_subset_and_dominance() {
        let small = marking(&[(0, 1)]);
        let large = marking(&[(0, 2), (1, 1)]);
        let other = marking(&[(3, 1)]);

        assert!(small <= large);
        assert!(large > small);
        assert!(small.partial_cmp(&other).is_none());
        assert_eq!(small.partial_cmp(&small.clone()), Some(Ordering::Equal));
    }

    #[test]
    fn equal_markings_hash_equally() {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        seen.insert(marking(&[(1, 1), (0, 1)]));
        assert!(seen.contains(&marking(&[(0, 1), (1, 1)])));
        let mut emptied = marking(&[(0, 1)]);
        emptied.remove_tokens(PlaceId::new(0), 5);
        assert_eq!(emptied, Marking::new());
    }
}
