//! Streaming session protocol: authentication, wire messages, readiness
//! gating, and the transcriber node.

pub mod auth;
pub mod message;
pub mod ready;
pub mod transcriber;
pub mod wire;

pub use auth::{Credentials, IamTokenProvider, ResolvedCredentials, StaticTokenProvider, TokenProvider};
pub use message::{Alternative, RecognitionResult, ServerMessage, SessionOptions, StartMessage};
pub use ready::ReadyGate;
pub use transcriber::{SessionConfig, Transcriber};
pub use wire::{Backoff, Connector, WireEvent, WireStream, WsConnector, connect_with_retry};
