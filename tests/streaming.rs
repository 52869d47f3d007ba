//! End-to-end pipeline test: WAV file source → transcription session over a
//! scripted wire → transcript collector. No network, no audio hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use voxline::audio::{AudioFormat, FileAudioGen};
use voxline::pipeline::Pipeline;
use voxline::session::{
    Backoff, Connector, Credentials, SessionConfig, StaticTokenProvider, Transcriber, WireEvent,
    WireStream,
};
use voxline::sink::{CollectorSink, Printer};
use voxline::{Result, VoxlineError};

struct MockStream {
    inbound: Mutex<VecDeque<WireEvent>>,
    sent_text: Mutex<Vec<String>>,
    sent_binary: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl MockStream {
    fn new(events: Vec<WireEvent>) -> Arc<Self> {
        Arc::new(Self {
            inbound: Mutex::new(events.into()),
            sent_text: Mutex::new(Vec::new()),
            sent_binary: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }
}

impl WireStream for MockStream {
    fn send_text(&self, text: &str) -> Result<()> {
        self.sent_text.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn send_binary(&self, data: &[u8]) -> Result<()> {
        self.sent_binary.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn recv(&self) -> Result<Option<WireEvent>> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(Some(WireEvent::Closed));
        }
        // Hold results back until some audio has been uploaded, like a real
        // service would.
        let release_results = !self.sent_binary.lock().unwrap().is_empty();
        let mut inbound = self.inbound.lock().unwrap();
        let next_is_result = inbound
            .front()
            .is_some_and(|event| matches!(event, WireEvent::Text(t) if t.contains("results")));
        if next_is_result && !release_results {
            drop(inbound);
            std::thread::sleep(Duration::from_millis(2));
            return Ok(None);
        }
        match inbound.pop_front() {
            Some(event) => Ok(Some(event)),
            None => {
                drop(inbound);
                std::thread::sleep(Duration::from_millis(2));
                Ok(None)
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct MockConnector {
    stream: Arc<MockStream>,
    fail_first: Mutex<u32>,
}

impl Connector for MockConnector {
    fn connect(&self, _url: &str) -> Result<Arc<dyn WireStream>> {
        let mut failures = self.fail_first.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(VoxlineError::Connection {
                message: "connection refused".to_string(),
            });
        }
        Ok(self.stream.clone())
    }
}

fn write_wav(path: &std::path::Path, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

fn session_config() -> SessionConfig {
    SessionConfig {
        ready_timeout: Duration::from_secs(2),
        backoff: Backoff {
            attempts: 3,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(1),
        },
        ..Default::default()
    }
}

fn build_transcriber(stream: Arc<MockStream>, fail_first: u32) -> Transcriber {
    let credentials = Credentials::new().api_key("test-key", "stream.example.com");
    Transcriber::with_parts(
        session_config(),
        &credentials,
        &StaticTokenProvider::new("test-token"),
        Box::new(MockConnector {
            stream,
            fail_first: Mutex::new(fail_first),
        }),
    )
    .unwrap()
}

fn wait_for(mut condition: impl FnMut() -> bool, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn file_is_streamed_and_transcript_collected() {
    let dir = tempfile::tempdir().unwrap();
    let wav_path = dir.path().join("speech.wav");
    let samples: Vec<i16> = (0..10).map(|i| i * 100).collect();
    write_wav(&wav_path, &samples);

    let result_frame = concat!(
        r#"{"results": [{"alternatives": "#,
        r#"[{"transcript": "several tornadoes and ", "confidence": 0.93}], "#,
        r#""final": true}], "result_index": 0}"#,
    );
    let stream = MockStream::new(vec![
        WireEvent::Text(r#"{"state": "listening"}"#.to_string()),
        WireEvent::Text(result_frame.to_string()),
    ]);

    // The first connect attempt fails; backoff retries and succeeds.
    let transcriber = build_transcriber(stream.clone(), 1);

    let format = AudioFormat {
        sample_rate: 44100,
        channels: 1,
    };
    let collector = CollectorSink::new();
    let entries = collector.entries();

    let handle = Pipeline::source(FileAudioGen::new(&wav_path, format, 4))
        .then(transcriber)
        .then(Printer::new(Box::new(collector)))
        .with_poll_interval(Duration::from_millis(1))
        .start();

    wait_for(
        || !entries.lock().unwrap().is_empty(),
        "the transcript to arrive",
    );
    handle.shutdown(Duration::from_secs(5));

    assert_eq!(*entries.lock().unwrap(), vec!["several tornadoes and "]);

    // The handshake happened exactly once, before any audio.
    let sent_text = stream.sent_text.lock().unwrap();
    assert_eq!(sent_text.len(), 1);
    let start: serde_json::Value = serde_json::from_str(&sent_text[0]).unwrap();
    assert_eq!(start["action"], "start");
    assert_eq!(start["content-type"], "audio/l16;rate=44100");

    // 10 samples at 4 per chunk: three binary frames, in order, LE-encoded.
    let sent_binary = stream.sent_binary.lock().unwrap();
    assert_eq!(sent_binary.len(), 3);
    let expected: Vec<Vec<u8>> = samples
        .chunks(4)
        .map(|chunk| chunk.iter().flat_map(|s| s.to_le_bytes()).collect())
        .collect();
    assert_eq!(*sent_binary, expected);

    // Teardown closed the wire.
    assert!(stream.closed.load(Ordering::SeqCst));
}

#[test]
fn session_that_never_becomes_ready_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let wav_path = dir.path().join("speech.wav");
    write_wav(&wav_path, &[1, 2, 3, 4]);

    // No listening frame: the gate never opens and consume times out.
    let stream = MockStream::new(vec![]);
    let mut config = session_config();
    config.ready_timeout = Duration::from_millis(100);

    let credentials = Credentials::new().api_key("test-key", "stream.example.com");
    let transcriber = Transcriber::with_parts(
        config,
        &credentials,
        &StaticTokenProvider::new("test-token"),
        Box::new(MockConnector {
            stream: stream.clone(),
            fail_first: Mutex::new(0),
        }),
    )
    .unwrap();

    let format = AudioFormat {
        sample_rate: 44100,
        channels: 1,
    };
    let collector = CollectorSink::new();
    let entries = collector.entries();

    let handle = Pipeline::source(FileAudioGen::new(&wav_path, format, 4))
        .then(transcriber)
        .then(Printer::new(Box::new(collector)))
        .with_poll_interval(Duration::from_millis(1))
        .start();

    // Give the session ample time past its ready timeout: it must starve
    // out rather than transmit or deliver anything downstream.
    std::thread::sleep(Duration::from_millis(500));
    handle.shutdown(Duration::from_secs(5));

    assert!(stream.sent_binary.lock().unwrap().is_empty());
    assert!(entries.lock().unwrap().is_empty());
}
