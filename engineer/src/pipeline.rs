//! Pipeline runner: runs a preset's steps in order and persists each transcript.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::preset::{Preset, StepId};
use crate::core::types::Transcript;
use crate::io::transcript_log::save_transcript;
use crate::steps::{StepContext, run_step};

/// Reported after a step's transcript has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: StepId,
    /// Zero-based position within the run.
    pub index: usize,
    pub total: usize,
    /// Messages in the persisted transcript.
    pub messages: usize,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub preset: Preset,
    pub steps_executed: usize,
    /// Transcript returned by the final step.
    pub transcript: Transcript,
}

/// Resolve `name` to a preset and run it.
///
/// An unknown name fails with `InvalidConfiguration` before any step runs.
pub fn run_pipeline<F: FnMut(&StepOutcome)>(
    name: &str,
    ctx: &StepContext<'_>,
    on_step: F,
) -> Result<PipelineOutcome> {
    let preset: Preset = name.parse()?;
    run_preset(preset, ctx, on_step)
}

#[instrument(skip_all, fields(preset = %preset))]
pub fn run_preset<F: FnMut(&StepOutcome)>(
    preset: Preset,
    ctx: &StepContext<'_>,
    on_step: F,
) -> Result<PipelineOutcome> {
    info!(steps = preset.steps().len(), "starting pipeline");
    let (steps_executed, transcript) = run_steps(preset.steps(), ctx, on_step)?;
    Ok(PipelineOutcome {
        preset,
        steps_executed,
        transcript,
    })
}

/// Run `steps` strictly in order, stopping at the first failure.
///
/// Each transcript is written to `logs` under the step's name before the next
/// step starts, so later steps can replay it.
pub fn run_steps<F: FnMut(&StepOutcome)>(
    steps: &[StepId],
    ctx: &StepContext<'_>,
    mut on_step: F,
) -> Result<(usize, Transcript)> {
    let mut last = Transcript::new();
    for (index, &step) in steps.iter().enumerate() {
        debug!(step = %step, index, "running step");
        let transcript = run_step(step, ctx).with_context(|| format!("step {step} failed"))?;
        save_transcript(&ctx.stores.logs, step, &transcript)
            .with_context(|| format!("persist transcript for {step}"))?;
        on_step(&StepOutcome {
            step,
            index,
            total: steps.len(),
            messages: transcript.len(),
        });
        last = transcript;
    }
    Ok((steps.len(), last))
}
