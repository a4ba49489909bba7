//! nano-chat: a minimalistic multi-turn conversation runtime for on-device
//! LLM inference.
//!
//! This crate implements the decode–sample–parse–respond pipeline sitting
//! atop a model-execution engine:
//! - Stateful conversations with synchronous and asynchronous turn APIs,
//!   concurrency-safe history, and cooperative cancellation
//! - Top-k / nucleus / temperature token sampling over raw logits
//! - Grammar-driven recovery of structured tool calls from generated text,
//!   with error-tolerant plain-text fallback
//!
//! The tensor-execution engine itself is an external collaborator behind
//! the [`Engine`] and [`EngineSession`] traits.

pub mod config;
pub mod error;

pub mod conversation;
pub mod engine;
pub mod tooluse;

pub use config::{ConversationConfig, Preface, ProcessorConfig, SamplerConfig, SessionConfig};
pub use conversation::{
    Content, Conversation, Media, Message, MessageInput, ProcessorArgs, PromptTemplate, TurnOutput,
};
pub use engine::{
    BenchmarkInfo, Engine, EngineSession, FinishReason, Modalities, TopPSampler,
};
pub use error::{Error, Result};
pub use tooluse::{
    parse_calls, strip_quotes, ArgValue, Call, ParseFailure, ToolConstraint, ToolDefinition,
};
