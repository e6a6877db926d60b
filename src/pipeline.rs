//! 转换流水线: 转换 -> 化简 -> 一致性检查 -> (可选) easy soundness 检查.
use log::info;
use thiserror::Error;

use crate::analysis::is_easy_sound;
use crate::bpmn::ProcessGraph;
use crate::config::PipelineConfig;
use crate::net::reduce::{ReductionError, ReductionOptions, ReductionReport, Reducer};
use crate::net::{AcceptingNet, NetError};
use crate::translate::{ConvertError, convert};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Reduction(#[from] ReductionError),
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("final marking of `{0}` is not reachable from its initial marking")]
    NotEasySound(String),
}

/// Result of [`translate_and_reduce`]: the net handed to the analysis collaborators and
/// what the reduction did to it. `reduction` is empty when reduction is disabled.
#[derive(Debug)]
pub struct PipelineOutput {
    pub net: AcceptingNet,
    pub reduction: ReductionReport,
}

pub fn translate_and_reduce(
    graph: &ProcessGraph,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    let (mut net, mut initial, mut final_marking) = convert(graph, config.include_events)?;

    let reduction = if config.reduce {
        let options = ReductionOptions::from(&config.reduction);
        Reducer::new(options).reduce(&mut net, &mut initial, &mut final_marking)?
    } else {
        ReductionReport::default()
    };
    net.check_consistency()?;

    if config.check_soundness
        && !is_easy_sound(&net, &initial, &final_marking, config.state_limit)
    {
        return Err(PipelineError::NotEasySound(graph.process_id().to_string()));
    }

    info!(
        "`{}` ready: {} place(s), {} transition(s), {} rewrite(s)",
        graph.process_id(),
        net.places_len(),
        net.transitions_len(),
        reduction.total()
    );
    Ok(PipelineOutput {
        net: AcceptingNet::new(net, initial, final_marking),
        reduction,
    })
}
