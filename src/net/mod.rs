//! # 复位/抑制 Petri 网（Reset/Inhibitor Net）
//!
//! 设库所集合 `P`、迁移集合 `T`，弧 `F ⊆ (P×T) ∪ (T×P)` 皆为单位权重，另有复位弧
//! `R ⊆ P×T` 与抑制弧 `I ⊆ P×T`。对任意标识 `M ∈ ℕ^{|P|}`：
//!
//! * 迁移 `t` **可激发** 当且仅当 `∀p ∈ •t: M[p] ≥ 1` 且 `∀p: (p, t) ∈ I ⇒ M[p] = 0`；
//! * 迁移 **发射** 时先从 `•t` 各取一个托肯，再将所有 `(p, t) ∈ R` 的库所清零，
//!   最后向 `t•` 各放入一个托肯。
//!
//! 库所与迁移存放于带墓碑的竞技场中：删除节点后标识不再复用，化简规则可以在
//! 遍历途中安全删除节点。
//!
//! ## 示例
//!
//! ```rust
//! use bpmn_rinet::net::*;
//!
//! let mut net = Net::empty();
//! let p0 = net.add_place(Place::plain("p0")).unwrap();
//! let p1 = net.add_place(Place::plain("p1")).unwrap();
//! let t0 = net.add_transition(Transition::labelled("t0", "A")).unwrap();
//!
//! net.add_input_arc(p0, t0).unwrap();
//! net.add_output_arc(t0, p1).unwrap();
//!
//! let marking: Marking = [(p0, 1)].into_iter().collect();
//! assert_eq!(net.enabled_transitions(&marking), vec![t0]);
//! let next = net.fire_transition(&marking, t0).unwrap();
//! assert_eq!(next.tokens(p0), 0);
//! assert_eq!(next.tokens(p1), 1);
//! ```

pub mod core;
pub mod ids;
pub mod incidence;
pub mod index_vec;
pub mod io;
pub mod reduce;
pub mod structure;

pub use core::{FireError, Net, NetError};
pub use ids::{PlaceId, TransitionId};
pub use incidence::Incidence;
pub use index_vec::{Idx, IndexVec};
pub use io::{AcceptingNet, IoError};
pub use structure::{Arc, ArcKind, Marking, NAME_SEP, Place, PlaceRole, Transition, Weight};
