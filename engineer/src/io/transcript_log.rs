//! Step transcripts persisted in the `logs` store and replayed by later steps.

use anyhow::{Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::preset::StepId;
use crate::core::types::Transcript;
use crate::error::PipelineError;
use crate::io::store::Store;

const TRANSCRIPT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/transcript.schema.json"
));

/// Write `transcript` under the step's name, pretty-printed with a trailing newline.
pub fn save_transcript(logs: &Store, step: StepId, transcript: &Transcript) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(transcript)?;
    buf.push('\n');
    debug!(step = %step, messages = transcript.len(), "persisting transcript");
    logs.set(step.as_str(), &buf)
}

/// Load the transcript a previous step persisted.
///
/// Anything short of a non-empty, well-formed transcript is reported as
/// [`PipelineError::NotFound`] for the step's key.
pub fn load_transcript(logs: &Store, step: StepId) -> Result<Transcript> {
    let key = step.as_str();
    let raw = logs.get(key)?;
    parse_transcript(&raw).map_err(|err| {
        warn!(step = %step, err = %err, "persisted transcript is unusable");
        PipelineError::not_found(logs.name(), key).into()
    })
}

fn parse_transcript(raw: &str) -> Result<Transcript> {
    let value: Value = serde_json::from_str(raw)?;
    validate_schema(&value)?;
    let transcript: Transcript = serde_json::from_value(value)?;
    Ok(transcript)
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(TRANSCRIPT_SCHEMA)?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "transcript schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
