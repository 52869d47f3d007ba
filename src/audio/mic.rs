//! Microphone audio source (feature `cpal-audio`).

use crate::audio::{AudioChunk, AudioFormat};
use crate::error::VoxlineError;
use crate::pipeline::{Emitter, Flow, Node, NodeError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is owned by the node and only touched from the node's
/// own thread (`enter`/`exit`); it never crosses threads after creation.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Producer node that captures live audio at the session's fixed format.
///
/// The capture callback appends into a shared buffer; `generate` drains it
/// in fixed-size chunks. The node never self-stops — live capture ends only
/// with an external stop.
pub struct MicAudioGen {
    device_name: Option<String>,
    format: AudioFormat,
    chunk_frames: usize,
    buffer: Arc<Mutex<Vec<i16>>>,
    stream: Option<SendableStream>,
    sequence: u64,
}

impl MicAudioGen {
    pub fn new(device_name: Option<String>, format: AudioFormat, chunk_frames: usize) -> Self {
        Self {
            device_name,
            format,
            chunk_frames: chunk_frames.max(1),
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            sequence: 0,
        }
    }

    fn find_device(&self) -> Result<cpal::Device, NodeError> {
        let host = cpal::default_host();
        match &self.device_name {
            Some(name) => {
                let devices = host.input_devices().map_err(|e| {
                    NodeError::Fatal(
                        VoxlineError::AudioCapture {
                            message: format!("cannot enumerate input devices: {e}"),
                        }
                        .to_string(),
                    )
                })?;
                for device in devices {
                    if device.name().as_deref() == Ok(name.as_str()) {
                        return Ok(device);
                    }
                }
                Err(NodeError::Fatal(
                    VoxlineError::AudioDeviceNotFound {
                        device: name.clone(),
                    }
                    .to_string(),
                ))
            }
            None => host.default_input_device().ok_or_else(|| {
                NodeError::Fatal(
                    VoxlineError::AudioDeviceNotFound {
                        device: "default".to_string(),
                    }
                    .to_string(),
                )
            }),
        }
    }

    fn build_stream(&self, device: &cpal::Device) -> Result<cpal::Stream, NodeError> {
        let config = cpal::StreamConfig {
            channels: self.format.channels,
            sample_rate: cpal::SampleRate(self.format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln!("voxline: audio stream error: {err}");
        };

        // Prefer native i16 capture; PipeWire/PulseAudio convert transparently.
        let buffer = Arc::clone(&self.buffer);
        if let Ok(stream) = device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Some devices only expose float formats.
        let buffer = Arc::clone(&self.buffer);
        device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend(
                            data.iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                        );
                    }
                },
                err_callback,
                None,
            )
            .map_err(|e| NodeError::Fatal(format!("cannot open capture stream: {e}")))
    }
}

impl Node for MicAudioGen {
    type Input = ();
    type Output = AudioChunk;

    fn name(&self) -> &'static str {
        "mic-audio"
    }

    fn enter(&mut self, _out: &Emitter<AudioChunk>) -> Result<(), NodeError> {
        let device = self.find_device()?;
        let stream = self.build_stream(&device)?;
        stream
            .play()
            .map_err(|e| NodeError::Fatal(format!("cannot start capture: {e}")))?;
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn generate(&mut self, out: &Emitter<AudioChunk>) -> Result<Flow, NodeError> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        while buffer.len() >= self.chunk_frames {
            let samples: Vec<i16> = buffer.drain(..self.chunk_frames).collect();
            out.emit(AudioChunk::new(samples, self.sequence));
            self.sequence += 1;
        }
        Ok(Flow::Continue)
    }

    fn exit(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.0.pause();
        }
    }
}
