//! Transcript delivery: the `Printer` node and the sinks behind it.

use crate::error::Result;
use crate::pipeline::{Emitter, Flow, Node, NodeError};
use crate::session::ServerMessage;
use std::sync::{Arc, Mutex};

/// Destination for recognized text. The sink receives every transcript the
/// service produced, interim and final alike, in arrival order; it never
/// sees session diagnostics.
pub trait TranscriptSink: Send {
    fn handle(&mut self, transcript: &str, is_final: bool) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Prints transcripts to stdout, final ones marked.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl TranscriptSink for StdoutSink {
    fn handle(&mut self, transcript: &str, is_final: bool) -> Result<()> {
        if is_final {
            println!("{transcript}");
        } else {
            println!("... {transcript}");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// Accumulates transcripts in shared memory, for tests and drivers that
/// collect results instead of streaming them out.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of everything collected so far.
    pub fn entries(&self) -> Arc<Mutex<Vec<String>>> {
        self.entries.clone()
    }
}

impl TranscriptSink for CollectorSink {
    fn handle(&mut self, transcript: &str, _is_final: bool) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(transcript.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Terminal node extracting the best transcript from each server message.
///
/// Messages without results (state transitions, keepalives) produce no
/// output and no error. A failing sink is reported but does not stop the
/// pipeline.
pub struct Printer {
    sink: Box<dyn TranscriptSink>,
}

impl Printer {
    pub fn new(sink: Box<dyn TranscriptSink>) -> Self {
        Self { sink }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(StdoutSink))
    }
}

impl Node for Printer {
    type Input = ServerMessage;
    type Output = ();

    fn name(&self) -> &'static str {
        "printer"
    }

    fn consume(
        &mut self,
        message: ServerMessage,
        _out: &Emitter<()>,
    ) -> std::result::Result<Flow, NodeError> {
        if let Some((transcript, is_final)) = message.first_transcript() {
            self.sink
                .handle(transcript, is_final)
                .map_err(|e| NodeError::Recoverable(format!("sink {}: {e}", self.sink.name())))?;
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoxlineError;
    use crossbeam_channel::unbounded;

    fn message(json: &str) -> ServerMessage {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_printer_extracts_first_alternative() {
        let collector = CollectorSink::new();
        let entries = collector.entries();
        let mut printer = Printer::new(Box::new(collector));
        let (tx, _rx) = unbounded();
        let out = Emitter::new(tx);

        let msg = message(
            r#"{"results": [{"alternatives": [
                {"transcript": "several tornadoes and ", "confidence": 0.9},
                {"transcript": "several tomatoes and "}
            ], "final": false}]}"#,
        );
        printer.consume(msg, &out).unwrap();

        assert_eq!(*entries.lock().unwrap(), vec!["several tornadoes and "]);
    }

    #[test]
    fn test_message_without_results_is_silent() {
        let collector = CollectorSink::new();
        let entries = collector.entries();
        let mut printer = Printer::new(Box::new(collector));
        let (tx, _rx) = unbounded();
        let out = Emitter::new(tx);

        printer
            .consume(message(r#"{"state": "listening"}"#), &out)
            .unwrap();
        printer.consume(message(r#"{"results": []}"#), &out).unwrap();

        assert!(entries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_interim_results_are_kept_separately() {
        let collector = CollectorSink::new();
        let entries = collector.entries();
        let mut printer = Printer::new(Box::new(collector));
        let (tx, _rx) = unbounded();
        let out = Emitter::new(tx);

        for json in [
            r#"{"results": [{"alternatives": [{"transcript": "several "}], "final": false}]}"#,
            r#"{"results": [{"alternatives": [{"transcript": "several tornadoes"}], "final": true}]}"#,
        ] {
            printer.consume(message(json), &out).unwrap();
        }

        // No deduplication: interim and final both delivered, in order.
        assert_eq!(
            *entries.lock().unwrap(),
            vec!["several ", "several tornadoes"]
        );
    }

    #[test]
    fn test_sink_failure_is_recoverable() {
        struct FailingSink;

        impl TranscriptSink for FailingSink {
            fn handle(&mut self, _transcript: &str, _is_final: bool) -> Result<()> {
                Err(VoxlineError::Other("disk full".to_string()))
            }
            fn name(&self) -> &'static str {
                "failing"
            }
        }

        let mut printer = Printer::new(Box::new(FailingSink));
        let (tx, _rx) = unbounded();
        let out = Emitter::new(tx);

        let err = printer
            .consume(
                message(r#"{"results": [{"alternatives": [{"transcript": "x"}]}]}"#),
                &out,
            )
            .unwrap_err();
        assert!(matches!(err, NodeError::Recoverable(_)));
    }
}
