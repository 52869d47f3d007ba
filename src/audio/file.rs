//! WAV file audio source.

use crate::audio::{AudioChunk, AudioFormat};
use crate::pipeline::{Emitter, Flow, Node, NodeError};
use std::path::PathBuf;

/// Producer node that replays a 16-bit PCM WAV file as fixed-size chunks.
///
/// The file is read eagerly when the node enters, so a bad path or format
/// mismatch surfaces before any audio flows. The only node that self-stops:
/// it emits exactly the file's chunks, in order, then ends.
pub struct FileAudioGen {
    path: PathBuf,
    format: AudioFormat,
    chunk_frames: usize,
    samples: Vec<i16>,
    position: usize,
    sequence: u64,
}

impl FileAudioGen {
    pub fn new(path: impl Into<PathBuf>, format: AudioFormat, chunk_frames: usize) -> Self {
        Self {
            path: path.into(),
            format,
            chunk_frames: chunk_frames.max(1),
            samples: Vec::new(),
            position: 0,
            sequence: 0,
        }
    }
}

impl Node for FileAudioGen {
    type Input = ();
    type Output = AudioChunk;

    fn name(&self) -> &'static str {
        "file-audio"
    }

    fn enter(&mut self, _out: &Emitter<AudioChunk>) -> Result<(), NodeError> {
        let mut reader = hound::WavReader::open(&self.path)
            .map_err(|e| NodeError::Fatal(format!("cannot open {}: {e}", self.path.display())))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(NodeError::Fatal(format!(
                "{}: expected 16-bit integer PCM, got {}-bit {:?}",
                self.path.display(),
                spec.bits_per_sample,
                spec.sample_format
            )));
        }
        if spec.channels != self.format.channels || spec.sample_rate != self.format.sample_rate {
            let mismatch = crate::error::VoxlineError::AudioFormatMismatch {
                expected: format!(
                    "{} Hz / {} channel(s)",
                    self.format.sample_rate, self.format.channels
                ),
                actual: format!("{} Hz / {}", spec.sample_rate, spec.channels),
            };
            return Err(NodeError::Fatal(format!(
                "{}: {mismatch}",
                self.path.display()
            )));
        }

        self.samples = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| NodeError::Fatal(format!("cannot read {}: {e}", self.path.display())))?;
        Ok(())
    }

    fn generate(&mut self, out: &Emitter<AudioChunk>) -> Result<Flow, NodeError> {
        if self.position >= self.samples.len() {
            return Ok(Flow::Stop);
        }
        let end = (self.position + self.chunk_frames).min(self.samples.len());
        let chunk = AudioChunk::new(self.samples[self.position..end].to_vec(), self.sequence);
        self.position = end;
        self.sequence += 1;
        out.emit(chunk);
        Ok(Flow::Continue)
    }
}
