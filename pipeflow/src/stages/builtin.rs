//! Built-in stages.

use super::{Stage, StageContext};
use crate::core::{Payload, StageOutput, TypeTag};
use crate::registry::{StageRegistry, StageType};
use anyhow::bail;
use async_trait::async_trait;
use tracing::{info, warn};

/// Name of [`Uppercase`].
pub const UPPERCASE: &str = "uppercase";
/// Name of [`Lowercase`].
pub const LOWERCASE: &str = "lowercase";
/// Name of [`LogString`].
pub const LOG_STRING: &str = "log_string";
/// Name of [`BytesToString`].
pub const BYTES_TO_STRING: &str = "bytes_to_string";
/// Name of [`SplitWords`].
pub const SPLIT_WORDS: &str = "split_words";
/// Name of [`LogFailure`].
pub const LOG_FAILURE: &str = "log_failure";

fn expect_text(input: Payload) -> anyhow::Result<String> {
    match input {
        Payload::Text(text) => Ok(text),
        other => bail!("expected a text payload, got '{}'", other.type_tag()),
    }
}

/// Uppercases text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uppercase;

#[async_trait]
impl Stage for Uppercase {
    async fn ingest(&mut self, _ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        Ok(StageOutput::single(expect_text(input)?.to_uppercase()))
    }
}

/// Lowercases text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lowercase;

#[async_trait]
impl Stage for Lowercase {
    async fn ingest(&mut self, _ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        Ok(StageOutput::single(expect_text(input)?.to_lowercase()))
    }
}

/// Logs text at `info` and passes it on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogString;

#[async_trait]
impl Stage for LogString {
    async fn ingest(&mut self, ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        match &input {
            Payload::Text(text) => info!(
                stage_id = %ctx.stage_id(),
                instance = %ctx.instance_id(),
                text = %text,
                "log_string"
            ),
            other => bail!("expected a text payload, got '{}'", other.type_tag()),
        }
        Ok(StageOutput::Single(input))
    }
}

/// Decodes bytes as UTF-8, replacing invalid sequences.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesToString;

#[async_trait]
impl Stage for BytesToString {
    async fn ingest(&mut self, _ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        match input {
            Payload::Bytes(bytes) => Ok(StageOutput::single(String::from_utf8_lossy(&bytes).into_owned())),
            other => bail!("expected a bytes payload, got '{}'", other.type_tag()),
        }
    }
}

/// Splits text on whitespace, one item per word.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitWords;

#[async_trait]
impl Stage for SplitWords {
    async fn ingest(&mut self, _ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        let text = expect_text(input)?;
        Ok(StageOutput::many(text.split_whitespace()))
    }
}

/// Logs failure notices at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFailure;

#[async_trait]
impl Stage for LogFailure {
    async fn ingest(&mut self, _ctx: &StageContext, input: Payload) -> anyhow::Result<StageOutput> {
        match input.as_failure() {
            Some(notice) => warn!(
                stage_id = %notice.stage_id,
                stage_type = %notice.stage_type,
                instance = %notice.instance_id,
                message = %notice.message,
                "stage failure"
            ),
            None => bail!("expected a failure payload, got '{}'", input.type_tag()),
        }
        Ok(StageOutput::Empty)
    }
}

/// Registers every built-in stage type.
pub fn register_builtins(registry: &StageRegistry) {
    registry.register_stage(StageType::transform(UPPERCASE, TypeTag::TEXT, TypeTag::TEXT, || Uppercase));
    registry.register_stage(StageType::transform(LOWERCASE, TypeTag::TEXT, TypeTag::TEXT, || Lowercase));
    registry.register_stage(StageType::side_effect(LOG_STRING, TypeTag::TEXT, || LogString));
    registry.register_stage(StageType::transform(
        BYTES_TO_STRING,
        TypeTag::BYTES,
        TypeTag::TEXT,
        || BytesToString,
    ));
    registry.register_stage(StageType::multi(SPLIT_WORDS, TypeTag::TEXT, TypeTag::TEXT, || SplitWords));
    registry.register_stage(StageType::error_handler(LOG_FAILURE, || LogFailure));
}
