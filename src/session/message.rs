//! JSON messages exchanged with the recognition service.

use crate::audio::AudioFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Recognized session options, merged into the start message alongside any
/// pass-through extras the service may accept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interim_results: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_timeout: Option<i64>,
    /// Options forwarded verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The first text frame sent after the connection opens. The service replies
/// with a `listening` state message once it is ready for audio.
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    pub action: &'static str,
    #[serde(rename = "content-type")]
    pub content_type: String,
    #[serde(flatten)]
    pub options: SessionOptions,
}

impl StartMessage {
    pub fn new(format: &AudioFormat, options: SessionOptions) -> Self {
        Self {
            action: "start",
            content_type: format.content_type(),
            options,
        }
    }
}

/// One inbound text frame. The service mixes state transitions, recognition
/// results, and errors over the same channel; unknown fields are tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerMessage {
    pub state: Option<String>,
    pub results: Option<Vec<RecognitionResult>>,
    pub error: Option<String>,
}

impl ServerMessage {
    /// Decodes one inbound text frame.
    pub fn parse(text: &str) -> crate::error::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::error::VoxlineError::Protocol {
            message: format!("undecodable frame: {e}"),
        })
    }

    /// True for the state message that opens the session for audio.
    pub fn is_ready(&self) -> bool {
        self.state.as_deref() == Some(crate::defaults::READY_STATE)
    }

    /// The first alternative of the first result, if any, with its final
    /// flag. Interim results may be superseded by later messages; no
    /// deduplication happens here.
    pub fn first_transcript(&self) -> Option<(&str, bool)> {
        let result = self.results.as_ref()?.first()?;
        let alternative = result.alternatives.first()?;
        Some((alternative.transcript.as_str(), result.is_final))
    }
}

/// One hypothesis group; ordered best-first by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Alternative {
    pub transcript: String,
    pub confidence: Option<f64>,
}
