use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::index_vec::Idx;

/// Declares a `u32`-backed arena index usable with [`IndexVec`](crate::net::IndexVec).
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }

        impl Idx for $name {
            fn index(self) -> usize {
                self.0 as usize
            }

            fn from_usize(idx: usize) -> Self {
                Self(idx as u32)
            }
        }
    };
}

pub(crate) use define_id;

define_id!(PlaceId, "p");
define_id!(TransitionId, "t");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_render_with_kind_prefix() {
        assert_eq!(format!("{:?}", PlaceId::new(3)), "p3");
        assert_eq!(TransitionId::from_usize(7).to_string(), "t7");
        assert_eq!(TransitionId::new(7).index(), 7);
    }
}
