// The query path as one stateless pipeline: retrieve, synthesize,
// sanitize. Sessions hold an append-only list of completed turns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::retriever::Retriever;
use crate::sanitizer::Sanitizer;
use crate::synthesis::Synthesizer;
use crate::{FloatError, Result};

/// One completed exchange in a session.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub supporting_documents: usize,
    pub asked_at: DateTime<Utc>,
}

/// Stateless per-query pipeline over immutable inputs; safe to share
/// across concurrent in-flight questions.
pub struct QueryPipeline {
    retriever: Retriever,
    synthesizer: Synthesizer,
    sanitizer: Sanitizer,
    top_k: usize,
}

impl QueryPipeline {
    #[inline]
    pub fn new(
        retriever: Retriever,
        synthesizer: Synthesizer,
        sanitizer: Sanitizer,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            sanitizer,
            top_k: top_k.max(1),
        }
    }

    /// Answer one question. Returns the sanitized answer text and the
    /// number of supporting documents fed to the model.
    #[inline]
    pub fn answer(&self, question: &str) -> Result<(String, usize)> {
        let documents = self.retriever.retrieve(question, self.top_k)?;
        let raw = self.synthesizer.synthesize(question, documents)?;
        let supporting = raw.documents.len();
        let text = self.sanitizer.sanitize(question, &raw.text);

        info!(
            "Answered question with {} supporting documents ({} chars)",
            supporting,
            text.len()
        );
        Ok((text, supporting))
    }

    /// Run the blocking embed/search/complete chain on the blocking pool
    /// so concurrent questions do not stall the async runtime. There is
    /// no cancellation once the completion call is in flight.
    #[inline]
    pub async fn answer_task(self: Arc<Self>, question: String) -> Result<(String, usize)> {
        tokio::task::spawn_blocking(move || self.answer(&question))
            .await
            .map_err(|e| FloatError::Synthesis(format!("query task failed: {e}")))?
    }
}

/// Ordered, append-only question/answer history for one session. Not
/// persisted across runs.
pub struct ChatSession {
    pipeline: Arc<QueryPipeline>,
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    #[inline]
    pub fn new(pipeline: Arc<QueryPipeline>) -> Self {
        Self {
            pipeline,
            turns: Vec::new(),
        }
    }

    /// Ask one question and record the completed turn.
    #[inline]
    pub async fn ask(&mut self, question: &str) -> Result<(String, usize)> {
        let (answer, supporting) = Arc::clone(&self.pipeline)
            .answer_task(question.to_string())
            .await?;

        self.turns.push(ChatTurn {
            question: question.to_string(),
            answer: answer.clone(),
            supporting_documents: supporting,
            asked_at: Utc::now(),
        });

        Ok((answer, supporting))
    }

    #[inline]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }
}

/// Collapse internal error detail into the single message shown to end
/// users. Pure mapping; the caller that swallows the error is
/// responsible for logging the detail.
#[inline]
pub fn user_facing_message(error: &FloatError) -> &'static str {
    match error {
        FloatError::IndexUnavailable(_) => {
            "The data index is not available. Run `floatchat ingest` to build it first."
        }
        FloatError::Synthesis(_) => "Answer generation failed. Please try again.",
        _ => "Something went wrong while answering your question.",
    }
}
