//! Diagnostic analyzer: snapshot in, diagnosis out.
//!
//! The snapshot is rendered into a fixed instruction, sent to the text
//! generator in a single round under a deadline, and the reply is interpreted
//! by the layered parser in [`parse`]. Only remote-call failures surface as
//! errors; anything the model returns is turned into a [`Diagnosis`].

use std::time::Duration;

use thiserror::Error;

use crate::models::{Diagnosis, Snapshot};

pub mod client;
pub mod parse;
pub mod rules;

pub use client::{OpenAiClient, TextGenerator};
pub use parse::Analysis;

// ---

/// Failures of the remote text-generation call.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("request to text-generation service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text-generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("text-generation service returned no content")]
    EmptyCompletion,

    #[error("text-generation call timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to render snapshot for prompt: {0}")]
    Prompt(#[from] serde_json::Error),
}

const PROMPT_TEMPLATE: &str = r#"You are a diagnostic assistant for a building automation system.
Current equipment readings for the site, as JSON:
{data}

Review the readings and reply with a single JSON object containing exactly these keys:
- "summary": a short plain-text description of the overall equipment status
- "abnormalities": a list of objects with "component", "issue", "value" and "normal_range"
- "recommendations": a list of objects with "action" and "priority" ("high", "medium" or "low")
Reply with the JSON object only. Do not wrap it in a code block."#;

/// Render the fixed instruction for one snapshot.
pub fn render_prompt(snapshot: &Snapshot) -> Result<String, AnalyzeError> {
    let data = serde_json::to_string_pretty(snapshot)?;
    Ok(PROMPT_TEMPLATE.replace("{data}", &data))
}

/// Turn a raw model reply into a diagnosis for `snapshot`.
///
/// Never fails. A reply with no usable JSON becomes the placeholder diagnosis;
/// a parsed reply with neither abnormalities nor recommendations gets both
/// derived from the snapshot's readings by the threshold rules.
pub fn interpret(raw: &str, snapshot: &Snapshot) -> Diagnosis {
    // ---
    let analysis = parse::parse_response(raw);
    if let Analysis::Fallback { reason } = &analysis {
        tracing::warn!("Error parsing model response: {}", reason);
        return analysis.into_diagnosis();
    }

    let mut diagnosis = analysis.into_diagnosis();
    if diagnosis.abnormalities.is_empty() && diagnosis.recommendations.is_empty() {
        let (abnormalities, recommendations) = rules::derive(snapshot);
        if !abnormalities.is_empty() {
            tracing::info!(
                count = abnormalities.len(),
                "Model reported no findings, using threshold rules"
            );
        }
        diagnosis.abnormalities = abnormalities;
        diagnosis.recommendations = recommendations;
    }
    diagnosis
}

/// Sends snapshots to a [`TextGenerator`] and interprets the replies.
pub struct Analyzer {
    generator: Box<dyn TextGenerator>,
    timeout: Duration,
}

impl Analyzer {
    pub fn new(generator: Box<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Analyze one snapshot.
    ///
    /// Returns `Err` only when the remote call itself fails or exceeds the
    /// deadline; the caller records those as failed cycles.
    pub async fn analyze(&self, snapshot: &Snapshot) -> Result<Diagnosis, AnalyzeError> {
        // ---
        let prompt = render_prompt(snapshot)?;

        let raw = tokio::time::timeout(self.timeout, self.generator.complete(&prompt))
            .await
            .map_err(|_| AnalyzeError::Timeout(self.timeout))??;

        tracing::debug!("Model reply: {}", raw);
        Ok(interpret(&raw, snapshot))
    }
}
