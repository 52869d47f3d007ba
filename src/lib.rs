//! voxline - Streaming speech-to-text over a node-based pipeline
//!
//! Audio flows from a source node (WAV file or microphone) through a
//! transcription session node to a sink, each stage in its own thread,
//! connected by ordered channels.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod sink;

// Core types (source → session → sink)
pub use audio::{AudioChunk, AudioFormat, FileAudioGen};
#[cfg(feature = "cpal-audio")]
pub use audio::MicAudioGen;
pub use session::{Credentials, SessionConfig, SessionOptions, Transcriber};
pub use sink::{CollectorSink, Printer, StdoutSink, TranscriptSink};

// Pipeline framework
pub use pipeline::{
    Emitter, ErrorReporter, Flow, Node, NodeError, Pipeline, PipelineBuilder, PipelineHandle,
    Signal,
};

// Error handling
pub use error::{Result, VoxlineError};

// Config
pub use config::Config;
