//! The model-execution engine seam.
//!
//! This module contains:
//! - `Engine` / `EngineSession` traits behind which the tensor-execution
//!   engine lives
//! - `TopPSampler` for token selection
//! - `BenchmarkInfo` timing counters and `FinishReason`

pub mod sampler;

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::Result;

pub use sampler::TopPSampler;

/// Input modalities an engine can consume natively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modalities {
    /// Image parts accepted without a placeholder substitution.
    pub vision: bool,
    /// Audio parts accepted without a placeholder substitution.
    pub audio: bool,
}

/// The tensor-execution engine that runs the model.
///
/// The engine is an external collaborator: it loads model assets, owns the
/// tokenizer vocabulary, and exposes per-step inference through sessions.
/// The conversation layer only drives it.
pub trait Engine: Send + Sync {
    /// Vocabulary size of the loaded model.
    fn vocab_size(&self) -> usize;

    /// Maximum number of context tokens one session can hold.
    fn max_context_tokens(&self) -> usize;

    /// Modalities the engine consumes natively. Text is always supported.
    fn modalities(&self) -> Modalities {
        Modalities::default()
    }

    /// Open one execution session bound to the given configuration.
    fn open_session(&self, config: &SessionConfig) -> Result<Box<dyn EngineSession>>;
}

/// One execution session: "logits out, token in" plus prefill and
/// incremental detokenization.
pub trait EngineSession: Send {
    /// Feed already-rendered context text to the session. Returns the number
    /// of tokens consumed.
    fn prefill(&mut self, text: &str) -> Result<usize>;

    /// Logits for the next position, shaped `[1, vocab_size]` (f32).
    fn step_logits(&mut self) -> Result<Tensor>;

    /// Append a sampled token and return the decoded text fragment it
    /// contributes.
    fn accept_token(&mut self, id: u32) -> Result<String>;

    /// End-of-sequence token id.
    fn eos_id(&self) -> u32;
}

/// Reason a decode loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// End-of-sequence token generated.
    EndOfSequence,
    /// Maximum token limit reached.
    MaxTokens,
    /// Stop sequence encountered.
    StopSequence,
    /// The active constraint rejected all remaining candidates.
    ConstraintExhausted,
}

/// Timing counters recorded while driving the engine.
///
/// All fields are zero/empty before the first successful turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkInfo {
    /// Seconds from the start of the first prefill to the first decoded
    /// token.
    pub time_to_first_token: f64,
    /// Prefill throughput per completed turn, in tokens per second.
    pub prefill_tokens_per_sec: Vec<f64>,
    /// Decode throughput per completed turn, in tokens per second.
    pub decode_tokens_per_sec: Vec<f64>,
}

impl BenchmarkInfo {
    /// Number of completed turns recorded so far.
    pub fn num_turns(&self) -> usize {
        self.decode_tokens_per_sec.len()
    }
}
