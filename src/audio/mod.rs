//! Audio types and capture sources.

pub mod file;
#[cfg(feature = "cpal-audio")]
pub mod mic;

pub use file::FileAudioGen;
#[cfg(feature = "cpal-audio")]
pub use mic::MicAudioGen;

/// PCM format the service expects: signed 16-bit little-endian samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: crate::defaults::SAMPLE_RATE,
            channels: crate::defaults::CHANNELS,
        }
    }
}

impl AudioFormat {
    /// MIME content type for the start message. The channel count is only
    /// spelled out when it differs from the mono default.
    pub fn content_type(&self) -> String {
        if self.channels > 1 {
            format!("audio/l16;rate={};channels={}", self.sample_rate, self.channels)
        } else {
            format!("audio/l16;rate={}", self.sample_rate)
        }
    }
}

/// One block of PCM samples flowing through the pipeline.
///
/// `sequence` is assigned by the source in emission order; the session
/// transmits chunks in exactly this order.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    pub sequence: u64,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>, sequence: u64) -> Self {
        Self { samples, sequence }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
