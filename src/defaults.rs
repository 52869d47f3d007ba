//! Default configuration constants for voxline.
//!
//! Shared constants used across configuration types to ensure consistency
//! and eliminate duplication.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// The recognition service expects raw linear PCM at 44.1kHz by default
/// (`audio/l16;rate=44100`), so both audio sources and the session declare
/// this rate unless configured otherwise.
pub const SAMPLE_RATE: u32 = 44100;

/// Default channel count. The wire format is mono.
pub const CHANNELS: u16 = 1;

/// Default number of frames per audio chunk.
///
/// 2048 frames at 44.1kHz is ~46ms of audio per chunk — small enough for
/// low-latency interim results, large enough to keep frame overhead down.
pub const CHUNK_FRAMES: usize = 2048;

/// State value the service sends once it is ready to accept audio.
pub const READY_STATE: &str = "listening";

/// Path of the streaming recognition endpoint, relative to the service host.
pub const RECOGNIZE_PATH: &str = "/v1/recognize";

/// Token endpoint for exchanging an API key for a bearer token.
pub const TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// OAuth grant type for the API-key token exchange.
pub const TOKEN_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// How long to wait for the token endpoint before giving up.
pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `consume` may wait for the service's readiness signal before
/// the session is considered starved.
pub const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of connection attempts before the session gives up.
pub const CONNECT_ATTEMPTS: u32 = 3;

/// Initial delay between connection attempts. Doubles per retry.
pub const CONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// Upper bound on the per-retry connection delay.
pub const CONNECT_BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Socket read timeout.
///
/// Bounds how long the receive loop holds the socket while polling for an
/// inbound frame, which in turn bounds how long an outbound send can be
/// delayed behind a read.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// How long a node waits on its input channel before calling `generate`.
///
/// This is the polling cadence of an idle node; it bounds both transcript
/// latency and the CPU cost of an empty pipeline.
pub const NODE_POLL: Duration = Duration::from_millis(10);
