//! 网的行为分析: 有界可达图与 easy soundness 检查.
pub mod reachability;

pub use reachability::{StateGraph, StateGraphConfig, StateGraphStats, is_easy_sound};
