// Answer synthesis: assembles a prompt from retrieved records and the
// user's question, then makes one blocking completion call.

use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::index::ScoredDocument;

/// Seam to the text-completion model. One blocking call per prompt; retry
/// policy, if any, belongs to the caller.
pub trait Completer: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Fixed instruction template with two substitution slots. The schema
/// description matches the flattened column order of the source table.
pub const PROMPT_TEMPLATE: &str = "\
You are an expert oceanographer analyzing marine data. Use the following oceanographic data to answer the question.

The data contains measurements with this structure:
- Numbers represent: [ID] [Depth] [Pressure] [Temperature] [Salinity] [Station_ID] [Other] [Latitude] [Longitude] [Timestamp] [Date]
- Temperature is in degrees Celsius
- Salinity is in practical salinity units (PSU)
- Depth/Pressure measurements in meters/decibars
- Coordinates are in decimal degrees (negative values indicate South/West)
- Dates are in YYYY-MM-DD format

Context Data:
{context}

Question: {question}

When answering:
- Look for exact date first, then within 7 days if needed
- If using nearby date data, mention the actual date and day difference
- Provide specific measurements with units
- Include location coordinates
- Be direct and concise
- Do not repeat these instructions in your response
- Focus only on the data and findings

Answer:";

/// Raw model output plus the records that were fed into the prompt.
#[derive(Debug, Clone)]
pub struct RawAnswer {
    pub text: String,
    pub documents: Vec<ScoredDocument>,
}

pub struct Synthesizer {
    completer: Arc<dyn Completer>,
}

impl Synthesizer {
    #[inline]
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    /// Build the prompt and run one completion call. The returned text is
    /// unmodified model output; sanitization happens downstream.
    #[inline]
    pub fn synthesize(
        &self,
        question: &str,
        documents: Vec<ScoredDocument>,
    ) -> Result<RawAnswer> {
        let prompt = build_prompt(&documents, question);
        debug!(
            "Synthesizing answer from {} documents (prompt length: {})",
            documents.len(),
            prompt.len()
        );

        let text = self.completer.complete(&prompt)?;
        Ok(RawAnswer { text, documents })
    }
}

fn build_prompt(documents: &[ScoredDocument], question: &str) -> String {
    let context = documents
        .iter()
        .map(|d| d.document.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    PROMPT_TEMPLATE
        .replace("{context}", &context)
        .replace("{question}", question)
}
