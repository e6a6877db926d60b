//! BPMN 流程图到复位/抑制 Petri 网的转换与化简.
//!
//! [`translate::convert`] 把 [`bpmn::ProcessGraph`] 编译为带初始/终止标识的网,
//! [`net::reduce`] 在保持可达行为的前提下化简该网, [`pipeline::translate_and_reduce`]
//! 把两者串起来并在需要时检查 easy soundness.
#![warn(non_snake_case)]

pub mod analysis;
pub mod bpmn;
pub mod config;
pub mod net;
pub mod pipeline;
pub mod translate;
pub mod util;

pub use config::PipelineConfig;
pub use pipeline::{PipelineError, PipelineOutput, translate_and_reduce};
