//! The streaming transcription node.
//!
//! Owns the session lifecycle: token acquisition at construction, connect +
//! handshake in `enter`, gated audio upload in `consume`, and teardown in
//! `exit`. A dedicated receive loop decodes inbound frames and emits them
//! downstream; it shares only the wire handle and the readiness gate with
//! the node thread.

use crate::audio::{AudioChunk, AudioFormat};
use crate::defaults;
use crate::error::Result;
use crate::pipeline::{Emitter, Flow, Node, NodeError};
use crate::session::auth::{Credentials, IamTokenProvider, TokenProvider};
use crate::session::message::{ServerMessage, SessionOptions, StartMessage};
use crate::session::ready::ReadyGate;
use crate::session::wire::{Backoff, Connector, WireEvent, WireStream, WsConnector, connect_with_retry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Session parameters. Everything the connection needs is explicit here;
/// nothing reaches for globals.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Recognition endpoint path on the service host.
    pub recognize_path: String,
    /// Optional model identifier, passed as a URL query parameter.
    pub model: Option<String>,
    pub options: SessionOptions,
    pub audio: AudioFormat,
    /// Bound on waiting for the service's readiness signal.
    pub ready_timeout: Duration,
    pub backoff: Backoff,
    /// Poll interval of the wire read, and of the receive loop with it.
    pub read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recognize_path: defaults::RECOGNIZE_PATH.to_string(),
            model: None,
            options: SessionOptions::default(),
            audio: AudioFormat::default(),
            ready_timeout: defaults::READY_TIMEOUT,
            backoff: Backoff::default(),
            read_timeout: defaults::READ_TIMEOUT,
        }
    }
}

/// Pipeline node that uploads audio chunks and emits server messages.
pub struct Transcriber {
    config: SessionConfig,
    hostname: String,
    token: String,
    connector: Box<dyn Connector>,
    gate: Arc<ReadyGate>,
    stream: Option<Arc<dyn WireStream>>,
    receiver: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    /// First terminal fault seen by the receive loop. The node thread turns
    /// it into a fatal error on its next call.
    fault: Arc<Mutex<Option<String>>>,
}

impl Transcriber {
    /// Resolves credentials and fetches a bearer token, synchronously. The
    /// session itself is not dialed until the node enters its thread.
    pub fn new(config: SessionConfig, credentials: &Credentials) -> Result<Self> {
        let read_timeout = config.read_timeout;
        Self::with_parts(
            config,
            credentials,
            &IamTokenProvider::default(),
            Box::new(WsConnector::new(read_timeout)),
        )
    }

    /// Constructor with injectable token provider and connector.
    pub fn with_parts(
        config: SessionConfig,
        credentials: &Credentials,
        token_provider: &dyn TokenProvider,
        connector: Box<dyn Connector>,
    ) -> Result<Self> {
        let resolved = credentials.resolve()?;
        let token = token_provider.fetch(&resolved.apikey)?;
        Ok(Self {
            config,
            hostname: resolved.hostname,
            token,
            connector,
            gate: Arc::new(ReadyGate::new()),
            stream: None,
            receiver: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            fault: Arc::new(Mutex::new(None)),
        })
    }

    fn recognize_url(&self) -> String {
        let mut url = format!(
            "wss://{}{}?access_token={}",
            self.hostname, self.config.recognize_path, self.token
        );
        if let Some(model) = &self.config.model {
            url.push_str("&model=");
            url.push_str(model);
        }
        url
    }

    fn take_fault(&self) -> Option<String> {
        self.fault.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Blocks until the service has signaled readiness, bounded by the
    /// configured timeout. Expiry is starvation, not a drop: no chunk is
    /// ever transmitted or discarded before the gate opens.
    fn await_ready(&self) -> std::result::Result<(), NodeError> {
        if self.gate.is_ready() {
            return Ok(());
        }
        if self.gate.wait_timeout(self.config.ready_timeout) {
            Ok(())
        } else {
            Err(NodeError::Fatal(
                crate::error::VoxlineError::Starvation {
                    message: format!(
                        "service did not become ready within {:?}",
                        self.config.ready_timeout
                    ),
                }
                .to_string(),
            ))
        }
    }
}

/// Little-endian byte stream of 16-bit samples, the service's raw PCM shape.
fn encode_pcm(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

impl Node for Transcriber {
    type Input = AudioChunk;
    type Output = ServerMessage;

    fn name(&self) -> &'static str {
        "transcriber"
    }

    fn enter(&mut self, out: &Emitter<ServerMessage>) -> std::result::Result<(), NodeError> {
        let url = self.recognize_url();
        let stream = connect_with_retry(self.connector.as_ref(), &url, &self.config.backoff)
            .map_err(|e| NodeError::Fatal(e.to_string()))?;

        let start = StartMessage::new(&self.config.audio, self.config.options.clone());
        let payload = serde_json::to_string(&start)
            .map_err(|e| NodeError::Fatal(format!("start message: {e}")))?;
        stream
            .send_text(&payload)
            .map_err(|e| NodeError::Fatal(e.to_string()))?;

        let receiver = {
            let stream = stream.clone();
            let gate = self.gate.clone();
            let out = out.clone();
            let shutdown = self.shutdown.clone();
            let fault = self.fault.clone();
            thread::spawn(move || receive_loop(&*stream, &gate, &out, &shutdown, &fault))
        };

        self.stream = Some(stream);
        self.receiver = Some(receiver);
        Ok(())
    }

    fn consume(
        &mut self,
        chunk: AudioChunk,
        _out: &Emitter<ServerMessage>,
    ) -> std::result::Result<Flow, NodeError> {
        if let Some(fault) = self.take_fault() {
            return Err(NodeError::Fatal(fault));
        }
        self.await_ready()?;
        if let Some(fault) = self.take_fault() {
            return Err(NodeError::Fatal(fault));
        }

        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| NodeError::Fatal("session not connected".to_string()))?;
        stream
            .send_binary(&encode_pcm(&chunk.samples))
            .map_err(|e| NodeError::Fatal(e.to_string()))?;
        Ok(Flow::Continue)
    }

    fn generate(&mut self, _out: &Emitter<ServerMessage>) -> std::result::Result<Flow, NodeError> {
        if let Some(fault) = self.take_fault() {
            return Err(NodeError::Fatal(fault));
        }
        Ok(Flow::Continue)
    }

    fn exit(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.gate.reset();
        if let Some(receiver) = self.receiver.take()
            && receiver.join().is_err()
        {
            eprintln!("voxline: session receive loop panicked");
        }
    }
}

/// Decodes inbound frames until the connection ends or shutdown is flagged.
///
/// A `listening` state opens the gate. Frames that fail to decode are
/// skipped per message; the session keeps running. A close or read error
/// outside shutdown is latched for the node thread to report.
fn receive_loop(
    stream: &dyn WireStream,
    gate: &ReadyGate,
    out: &Emitter<ServerMessage>,
    shutdown: &AtomicBool,
    fault: &Mutex<Option<String>>,
) {
    let latch = |message: String| {
        let mut slot = fault.lock().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert(message);
    };

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match stream.recv() {
            Ok(None) => {}
            Ok(Some(WireEvent::Text(text))) => match ServerMessage::parse(&text) {
                Ok(message) => {
                    if message.is_ready() {
                        gate.signal();
                    }
                    if let Some(error) = &message.error {
                        latch(format!("service error: {error}"));
                    }
                    out.emit(message);
                }
                // Unknown frame shapes are skipped per message; the
                // session keeps running.
                Err(e) => eprintln!("voxline: {e}"),
            },
            // The service never sends binary; ignore.
            Ok(Some(WireEvent::Binary(_))) => {}
            Ok(Some(WireEvent::Closed)) => {
                if !shutdown.load(Ordering::SeqCst) {
                    latch("connection closed by service".to_string());
                }
                break;
            }
            Err(e) => {
                if !shutdown.load(Ordering::SeqCst) {
                    latch(e.to_string());
                }
                break;
            }
        }
    }
}
