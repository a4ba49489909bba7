//! Configuration types for nano-chat.

use serde::{Deserialize, Serialize};

use crate::conversation::template::PromptTemplate;
use crate::tooluse::ToolDefinition;

/// Sampler configuration.
///
/// Validated by [`TopPSampler::new`](crate::engine::TopPSampler::new):
/// `k > 0`, `p` in `[0, 1]`, `temperature >= 0`, `batch_size > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Number of highest-logit candidates kept before nucleus truncation.
    pub k: usize,
    /// Nucleus (top-p) cumulative probability threshold.
    pub p: f32,
    /// Temperature for scaling logits (0 = deterministic argmax).
    pub temperature: f32,
    /// Number of independent rows sampled per call.
    pub batch_size: usize,
    /// Seed for the sampler-owned random generator.
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            k: 40,
            p: 0.95,
            temperature: 0.8,
            batch_size: 1,
            seed: 0,
        }
    }
}

/// Per-session decoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sampler parameters used for token selection.
    pub sampler: SamplerConfig,
    /// Maximum tokens to generate per turn.
    pub max_tokens: usize,
    /// Stop sequences that end decoding (stripped from the response).
    pub stop_sequences: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig::default(),
            max_tokens: 256,
            stop_sequences: Vec::new(),
        }
    }
}

/// Initial background for a conversation: optional system instructions plus
/// tool definitions surfaced to the model. Non-empty tool definitions cause
/// a [`ToolConstraint`](crate::tooluse::ToolConstraint) to be built once at
/// conversation creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preface {
    /// Instructions prefilled before the first user turn.
    pub system_instructions: Option<String>,
    /// Tool definitions available to the model.
    pub tools: Vec<ToolDefinition>,
}

impl Preface {
    /// Check whether the preface carries neither instructions nor tools.
    pub fn is_empty(&self) -> bool {
        self.system_instructions.is_none() && self.tools.is_empty()
    }
}

/// Configuration for turning non-text message parts into engine input.
///
/// A `None` placeholder means the corresponding modality is rejected unless
/// the engine reports native support for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Marker substituted for image parts.
    pub image_placeholder: Option<String>,
    /// Marker substituted for audio parts.
    pub audio_placeholder: Option<String>,
}

/// Immutable configuration bundle for one [`Conversation`].
///
/// [`Conversation`]: crate::conversation::Conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Session parameters (sampling, token budget, stop sequences).
    pub session: SessionConfig,
    /// Initial context and tool definitions.
    pub preface: Preface,
    /// Template used to render role-tagged turns.
    pub template: PromptTemplate,
    /// Data-processor configuration for multimodal parts.
    pub processor: ProcessorConfig,
}

impl ConversationConfig {
    /// Create a configuration from session parameters, with an empty preface
    /// and default template and processor.
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            ..Self::default()
        }
    }

    /// Set the preface.
    pub fn with_preface(mut self, preface: Preface) -> Self {
        self.preface = preface;
        self
    }

    /// Overwrite the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Overwrite the data-processor configuration.
    pub fn with_processor(mut self, processor: ProcessorConfig) -> Self {
        self.processor = processor;
        self
    }
}
