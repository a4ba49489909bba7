//! Role-tagged messages and their JSON wire shape.
//!
//! Wire shape:
//!
//! ```text
//! {"role": string, "content": string | [part, ...]}
//! part := {"type": "text",  "text": string}
//!       | {"type": "image", "blob": base64} | {"type": "image", "path": string}
//!       | {"type": "audio", "blob": base64} | {"type": "audio", "path": string}
//! ```
//!
//! A bare string deserializes as a single text part; serialization always
//! emits the array form.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Well-known conversation roles.
pub mod role {
    pub const USER: &str = "user";
    pub const MODEL: &str = "model";
    pub const SYSTEM: &str = "system";
}

/// Media payload: inline bytes or a file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Blob(Vec<u8>),
    Path(PathBuf),
}

/// One content part of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Image(Media),
    Audio(Media),
}

/// One conversation message: a role plus an ordered sequence of content
/// parts. The content is non-empty for any message crossing the wire or
/// entering a turn; the only exception is the empty message that marks
/// asynchronous completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: Vec<Content>,
}

impl Message {
    /// Message with arbitrary parts.
    pub fn new(role: impl Into<String>, content: Vec<Content>) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }

    /// Message with a single text part.
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(role, vec![Content::Text(text.into())])
    }

    /// The empty message delivered as the terminal event of a completed
    /// asynchronous turn.
    pub fn empty() -> Self {
        Self {
            role: String::new(),
            content: Vec::new(),
        }
    }

    /// Whether this is the terminal empty message.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Concatenation of all text parts.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for part in &self.content {
            if let Content::Text(t) = part {
                out.push_str(t);
            }
        }
        out
    }
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: WireContent,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WirePart {
    Text { text: String },
    Image(WireMedia),
    Audio(WireMedia),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireMedia {
    Blob { blob: String },
    Path { path: PathBuf },
}

impl From<&Media> for WireMedia {
    fn from(media: &Media) -> Self {
        match media {
            Media::Blob(bytes) => WireMedia::Blob {
                blob: BASE64.encode(bytes),
            },
            Media::Path(path) => WireMedia::Path { path: path.clone() },
        }
    }
}

impl WireMedia {
    fn into_media<E: serde::de::Error>(self) -> Result<Media, E> {
        match self {
            WireMedia::Blob { blob } => BASE64
                .decode(blob.as_bytes())
                .map(Media::Blob)
                .map_err(|e| E::custom(format!("invalid base64 blob: {e}"))),
            WireMedia::Path { path } => Ok(Media::Path(path)),
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let parts = self
            .content
            .iter()
            .map(|part| match part {
                Content::Text(text) => WirePart::Text { text: text.clone() },
                Content::Image(media) => WirePart::Image(media.into()),
                Content::Audio(media) => WirePart::Audio(media.into()),
            })
            .collect();
        WireMessage {
            role: self.role.clone(),
            content: WireContent::Parts(parts),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireMessage::deserialize(deserializer)?;
        let content = match wire.content {
            WireContent::Text(text) => vec![Content::Text(text)],
            WireContent::Parts(parts) => parts
                .into_iter()
                .map(|part| {
                    Ok(match part {
                        WirePart::Text { text } => Content::Text(text),
                        WirePart::Image(media) => Content::Image(media.into_media()?),
                        WirePart::Audio(media) => Content::Audio(media.into_media()?),
                    })
                })
                .collect::<Result<_, D::Error>>()?,
        };
        if content.is_empty() {
            return Err(D::Error::custom("message content must be non-empty"));
        }
        Ok(Message {
            role: wire.role,
            content,
        })
    }
}
