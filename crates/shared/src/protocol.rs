use serde::{Deserialize, Serialize};

use crate::{
    domain::{BodyEncoding, Method},
    error::MalformedEnvelope,
};

/// Uniform `{type, message}` response contract shared by every server
/// operation. The tag is kept as the raw wire string so an unrecognized value
/// stays representable; [`ResponseEnvelope::outcome`] is the single place it
/// gets interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// Recognized outcome tags, matched exhaustively by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Error,
}

impl ResponseEnvelope {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            kind: "OK".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: "ERROR".to_string(),
            message: message.into(),
        }
    }

    /// Interpret the wire tag. Tags are matched case-sensitively; anything
    /// other than `OK` or `ERROR` is a [`MalformedEnvelope`].
    pub fn outcome(&self) -> Result<Outcome, MalformedEnvelope> {
        match self.kind.as_str() {
            "OK" => Ok(Outcome::Ok),
            "ERROR" => Ok(Outcome::Error),
            other => Err(MalformedEnvelope::new(other)),
        }
    }
}

/// One file carried by a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Caller-supplied form content; the trigger wiring collects it, the
/// transport encodes it per [`BodyEncoding`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }
}

/// Fully described request handed to the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub encoding: BodyEncoding,
    pub form: FormData,
    pub headers: Vec<(String, String)>,
}
