//! Multi-turn conversation orchestration.
//!
//! A [`Conversation`] owns the per-conversation state (history, preface,
//! template, constraint) and drives the engine through a decode loop using
//! the sampler:
//!
//! ```text
//! send_message(s)
//!     │
//!     ▼ render via PromptTemplate + processor
//! prefill engine
//!     │
//!     ▼ repeat: logits → sampler → token → decoded fragment
//! stop (EOS / max tokens / stop sequence / constraint)
//!     │
//!     ▼ call parser (when tools are active)
//! commit turn to history, return response
//! ```

pub mod message;
pub mod template;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::{ConversationConfig, SessionConfig};
use crate::conversation::message::role;
use crate::conversation::template::render_body;
use crate::engine::{BenchmarkInfo, Engine, EngineSession, FinishReason, Modalities, TopPSampler};
use crate::error::{Error, Result};
use crate::tooluse::{parse_calls, Call, ToolConstraint};

pub use message::{Content, Media, Message};
pub use template::{ProcessorArgs, PromptTemplate};

/// Input to one turn: a single message, or a sequence whose leading
/// elements are prefilled before the final element triggers generation.
#[derive(Debug, Clone)]
pub enum MessageInput {
    Single(Message),
    Sequence(Vec<Message>),
}

impl MessageInput {
    fn into_vec(self) -> Vec<Message> {
        match self {
            Self::Single(message) => vec![message],
            Self::Sequence(messages) => messages,
        }
    }
}

impl From<Message> for MessageInput {
    fn from(message: Message) -> Self {
        Self::Single(message)
    }
}

impl From<Vec<Message>> for MessageInput {
    fn from(messages: Vec<Message>) -> Self {
        Self::Sequence(messages)
    }
}

/// Result of one completed synchronous turn.
///
/// The parsed calls are ephemeral: history receives only the message.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    /// The complete response message.
    pub message: Message,
    /// Calls recovered from the response when a tool constraint was active;
    /// empty on plain-text fallback.
    pub calls: Vec<Call>,
    /// Why decoding stopped.
    pub finish_reason: FinishReason,
}

/// A stateful multi-turn conversation bound to one engine session.
///
/// Exactly one turn may be generating at a time; starting a second turn
/// while one is in flight fails with `FailedPrecondition`. The conversation
/// returns to idle after every terminal outcome (completion, cancellation,
/// or error), permitting a subsequent turn.
pub struct Conversation {
    inner: Arc<Inner>,
    config: ConversationConfig,
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct Inner {
    session: Mutex<SessionState>,
    history: Mutex<Vec<Message>>,
    benchmark: Mutex<BenchmarkInfo>,
    busy: AtomicBool,
    cancel: AtomicBool,
    constraint: Option<ToolConstraint>,
    template: PromptTemplate,
    processor: crate::config::ProcessorConfig,
    session_config: SessionConfig,
    modalities: Modalities,
    vocab_size: usize,
}

struct SessionState {
    session: Box<dyn EngineSession>,
    sampler: TopPSampler,
}

/// RAII guard for the single Generating slot; the busy flag is released on
/// every exit path, including panics in the generation thread.
struct TurnGuard {
    inner: Arc<Inner>,
}

impl TurnGuard {
    fn acquire(inner: &Arc<Inner>) -> Result<Self> {
        if inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::FailedPrecondition(
                "a turn is already in flight for this conversation".to_string(),
            ));
        }
        // The cancel flag only applies to the turn being started.
        inner.cancel.store(false, Ordering::SeqCst);
        Ok(Self {
            inner: Arc::clone(inner),
        })
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.inner.busy.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Conversation {
    /// Create a conversation from an engine and an immutable configuration.
    ///
    /// Validates the configuration against the engine capabilities, builds
    /// the tool constraint from the preface (if tools are defined), opens
    /// one execution session, and prefills the preface. Any failure here
    /// propagates; no partially-initialized conversation is returned.
    pub fn new(engine: &dyn Engine, config: ConversationConfig) -> Result<Self> {
        let session_config = &config.session;
        if session_config.sampler.batch_size != 1 {
            return Err(Error::InvalidArgument(format!(
                "sampler batch_size must be 1 for conversation decoding, but got {}",
                session_config.sampler.batch_size
            )));
        }
        if session_config.max_tokens > engine.max_context_tokens() {
            return Err(Error::InvalidArgument(format!(
                "max_tokens must not exceed the engine context size, but got {} vs {}",
                session_config.max_tokens,
                engine.max_context_tokens()
            )));
        }

        let sampler = TopPSampler::new(session_config.sampler.clone())?;
        let mut session = engine.open_session(session_config)?;

        let constraint = ToolConstraint::from_tools(&config.preface.tools);
        if let Some(preface_text) = render_preface(&config)? {
            session.prefill(&config.template.render(role::SYSTEM, &preface_text))?;
        }
        tracing::debug!(
            tools = config.preface.tools.len(),
            "conversation session opened"
        );

        let inner = Inner {
            session: Mutex::new(SessionState { session, sampler }),
            history: Mutex::new(Vec::new()),
            benchmark: Mutex::new(BenchmarkInfo::default()),
            busy: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            constraint,
            template: config.template.clone(),
            processor: config.processor.clone(),
            session_config: config.session.clone(),
            modalities: engine.modalities(),
            vocab_size: engine.vocab_size(),
        };
        Ok(Self {
            inner: Arc::new(inner),
            config,
        })
    }

    /// Send a message (or sequence) and block until the complete response.
    ///
    /// Leading elements of a sequence are prefilled in order; the final
    /// element triggers generation. On success the input and response are
    /// committed to history atomically; any failure leaves history
    /// unchanged.
    pub fn send_message(&self, input: impl Into<MessageInput>) -> Result<TurnOutput> {
        self.send_message_with_args(input, None)
    }

    /// [`send_message`](Self::send_message) with per-turn processor
    /// arguments substituted into text parts.
    pub fn send_message_with_args(
        &self,
        input: impl Into<MessageInput>,
        args: Option<&ProcessorArgs>,
    ) -> Result<TurnOutput> {
        let _guard = TurnGuard::acquire(&self.inner)?;
        let messages = input.into().into_vec();
        self.inner.run_turn(&messages, args, &mut |_| {})
    }

    /// Send a message and deliver results incrementally via `callback`.
    ///
    /// The callback is invoked once per decoded fragment with an
    /// incremental message, then exactly once more with a terminal event:
    /// the empty message on completion, `Err(Cancelled)` after
    /// [`cancel_process`](Self::cancel_process), or the propagated error on
    /// failure. No deliveries follow a terminal event. The call itself
    /// returns immediately and fails synchronously only if the turn could
    /// not be launched.
    ///
    /// The callback runs on the generation thread; it must be short,
    /// non-blocking, and must not re-enter this conversation.
    pub fn send_message_async<F>(&self, input: impl Into<MessageInput>, callback: F) -> Result<()>
    where
        F: FnMut(Result<Message>) + Send + 'static,
    {
        self.send_message_async_with_args(input, callback, None)
    }

    /// [`send_message_async`](Self::send_message_async) with per-turn
    /// processor arguments.
    pub fn send_message_async_with_args<F>(
        &self,
        input: impl Into<MessageInput>,
        mut callback: F,
        args: Option<ProcessorArgs>,
    ) -> Result<()>
    where
        F: FnMut(Result<Message>) + Send + 'static,
    {
        let guard = TurnGuard::acquire(&self.inner)?;
        let inner = Arc::clone(&self.inner);
        let messages = input.into().into_vec();
        std::thread::spawn(move || {
            let _guard = guard;
            let result = {
                let sink = &mut callback;
                inner.run_turn(&messages, args.as_ref(), &mut |fragment| {
                    sink(Ok(Message::text(role::MODEL, fragment)))
                })
            };
            match result {
                Ok(_) => callback(Ok(Message::empty())),
                Err(e) => callback(Err(e)),
            }
        });
        Ok(())
    }

    /// Full copy of the history, taken under the history lock. Cost scales
    /// with history size; prefer [`access_history`](Self::access_history)
    /// for large histories.
    pub fn get_history(&self) -> Vec<Message> {
        lock(&self.inner.history).clone()
    }

    /// Run `visitor` against the history while holding the lock, avoiding a
    /// copy. The visitor must not re-enter this conversation (no nested
    /// send or cancel calls), or it will deadlock on the history lock.
    pub fn access_history<R>(&self, visitor: impl FnOnce(&[Message]) -> R) -> R {
        visitor(&lock(&self.inner.history))
    }

    /// Cooperatively cancel the in-flight asynchronous turn. The signal is
    /// checked between decode steps; already-consumed prefill is not rolled
    /// back.
    pub fn cancel_process(&self) {
        self.inner.cancel.store(true, Ordering::SeqCst);
    }

    /// Snapshot of the timing counters. Zero/empty before the first
    /// successful turn.
    pub fn get_benchmark_info(&self) -> BenchmarkInfo {
        lock(&self.inner.benchmark).clone()
    }

    /// The configuration this conversation was created with.
    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }
}

impl Inner {
    /// Drive one full turn: render, prefill, decode, parse, commit.
    ///
    /// `on_fragment` receives each decoded fragment as it is produced.
    fn run_turn(
        &self,
        messages: &[Message],
        args: Option<&ProcessorArgs>,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<TurnOutput> {
        if messages.is_empty() {
            return Err(Error::InvalidArgument(
                "message sequence must be non-empty".to_string(),
            ));
        }
        // Render everything before touching the engine, so template and
        // processor failures abort without consuming context.
        let mut rendered = Vec::with_capacity(messages.len() + 1);
        for message in messages {
            let body = render_body(message, &self.processor, self.modalities, args)?;
            rendered.push(self.template.render(&message.role, &body));
        }
        rendered.push(self.template.generation_prefix());

        let mut state = lock(&self.session);
        let prefill_start = Instant::now();
        let mut prefill_tokens = 0;
        for text in &rendered {
            prefill_tokens += state.session.prefill(text)?;
        }
        let prefill_secs = prefill_start.elapsed().as_secs_f64();

        let decode_start = Instant::now();
        let mut time_to_first_token = 0.0;
        let mut accumulated = String::new();
        let mut ids = [0u32; 1];
        let mut tokens_generated = 0usize;
        let finish_reason = loop {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::debug!(tokens_generated, "cancellation observed between decode steps");
                return Err(Error::Cancelled);
            }
            if let Some(constraint) = &self.constraint {
                if constraint.remaining_candidates(&accumulated, self.vocab_size) == 0 {
                    break FinishReason::ConstraintExhausted;
                }
            }
            if tokens_generated >= self.session_config.max_tokens {
                break FinishReason::MaxTokens;
            }
            let logits = state.session.step_logits()?;
            state.sampler.sample_to_id_and_score(&logits, &mut ids, None)?;
            if ids[0] == state.session.eos_id() {
                break FinishReason::EndOfSequence;
            }
            let fragment = state.session.accept_token(ids[0])?;
            tokens_generated += 1;
            if tokens_generated == 1 {
                time_to_first_token = prefill_start.elapsed().as_secs_f64();
            }
            accumulated.push_str(&fragment);
            on_fragment(&fragment);
            if let Some(stop) = self
                .session_config
                .stop_sequences
                .iter()
                .find(|s| accumulated.ends_with(s.as_str()))
            {
                accumulated.truncate(accumulated.len() - stop.len());
                break FinishReason::StopSequence;
            }
        };
        let decode_secs = decode_start.elapsed().as_secs_f64();
        drop(state);

        let calls = if self.constraint.is_some() {
            match parse_calls(&accumulated) {
                Ok(calls) => calls,
                Err(failure) => {
                    tracing::debug!(%failure, "response is not a call span, keeping plain text");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let response = Message::text(role::MODEL, accumulated);
        {
            // One lock acquisition for the whole commit: concurrent readers
            // see either none or all of this turn.
            let mut history = lock(&self.history);
            history.extend(messages.iter().cloned());
            history.push(response.clone());
        }
        {
            let mut benchmark = lock(&self.benchmark);
            if benchmark.time_to_first_token == 0.0 && time_to_first_token > 0.0 {
                benchmark.time_to_first_token = time_to_first_token;
            }
            benchmark
                .prefill_tokens_per_sec
                .push(rate(prefill_tokens, prefill_secs));
            benchmark
                .decode_tokens_per_sec
                .push(rate(tokens_generated, decode_secs));
        }
        tracing::debug!(tokens_generated, ?finish_reason, "turn committed");

        Ok(TurnOutput {
            message: response,
            calls,
            finish_reason,
        })
    }
}

/// System text prefilled at creation: instructions plus tool descriptions.
fn render_preface(config: &ConversationConfig) -> Result<Option<String>> {
    let preface = &config.preface;
    if preface.is_empty() {
        return Ok(None);
    }
    let mut body = preface.system_instructions.clone().unwrap_or_default();
    if !preface.tools.is_empty() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str("You may call the following tools:\n");
        body.push_str(&serde_json::to_string_pretty(&preface.tools)?);
    }
    Ok(Some(body))
}

fn rate(tokens: usize, secs: f64) -> f64 {
    if secs > 0.0 {
        tokens as f64 / secs
    } else {
        0.0
    }
}
