//! Prompt rendering: role-tagged turn markers and content-part processing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ProcessorConfig;
use crate::conversation::message::{role, Content, Message};
use crate::engine::Modalities;
use crate::error::{Error, Result};

/// Optional per-turn arguments substituted into text parts as `{name}`.
pub type ProcessorArgs = HashMap<String, String>;

/// Turn markers wrapped around each rendered message.
///
/// `{role}` in the prefix is replaced with the message role. The default
/// template follows the common `<start_of_turn>` convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub turn_prefix: String,
    pub turn_suffix: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            turn_prefix: "<start_of_turn>{role}\n".to_string(),
            turn_suffix: "<end_of_turn>\n".to_string(),
        }
    }
}

impl PromptTemplate {
    /// Render one complete turn for `role` with the given body.
    pub fn render(&self, role: &str, body: &str) -> String {
        let mut out = self.turn_prefix.replace("{role}", role);
        out.push_str(body);
        out.push_str(&self.turn_suffix);
        out
    }

    /// Opening marker of the model turn, prefilled before decoding starts.
    pub fn generation_prefix(&self) -> String {
        self.turn_prefix.replace("{role}", role::MODEL)
    }
}

/// Turn a message's content parts into engine input text.
///
/// Text parts pass through (with `{name}` argument substitution when args
/// are provided); image and audio parts become the configured placeholder
/// marker. A part with neither a placeholder nor native engine support
/// fails with `InvalidArgument` before any engine interaction.
pub fn render_body(
    message: &Message,
    processor: &ProcessorConfig,
    modalities: Modalities,
    args: Option<&ProcessorArgs>,
) -> Result<String> {
    if message.content.is_empty() {
        return Err(Error::InvalidArgument(
            "message content must be non-empty".to_string(),
        ));
    }
    let mut body = String::new();
    for part in &message.content {
        match part {
            Content::Text(text) => body.push_str(&substitute(text, args)),
            Content::Image(_) => match (&processor.image_placeholder, modalities.vision) {
                (Some(marker), _) => body.push_str(marker),
                (None, true) => {}
                (None, false) => {
                    return Err(Error::InvalidArgument(
                        "message contains an image part, but the engine supports \
                         neither vision input nor an image placeholder"
                            .to_string(),
                    ))
                }
            },
            Content::Audio(_) => match (&processor.audio_placeholder, modalities.audio) {
                (Some(marker), _) => body.push_str(marker),
                (None, true) => {}
                (None, false) => {
                    return Err(Error::InvalidArgument(
                        "message contains an audio part, but the engine supports \
                         neither audio input nor an audio placeholder"
                            .to_string(),
                    ))
                }
            },
        }
    }
    Ok(body)
}

fn substitute(text: &str, args: Option<&ProcessorArgs>) -> String {
    let Some(args) = args else {
        return text.to_string();
    };
    let mut out = text.to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
