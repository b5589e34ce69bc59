//! Microphone capture and frame fan-out via `cpal`.
//!
//! [`AudioSource`] wraps the cpal host/device/stream lifecycle and delivers
//! fixed-size [`AudioFrame`]s to a list of [`FrameConsumer`]s registered at
//! construction.  Fan-out happens synchronously on the capture thread: every
//! consumer sees the *same* frame, in registration order, as a shared
//! read-only borrow.
//!
//! Synchronous fan-out is only safe because consumers are required to be
//! cheap: anything that does real work (transcription) must enqueue the
//! frame to its own worker internally and return immediately.  A consumer
//! that returns an error is logged and skipped for that frame — it never
//! stops delivery to later consumers or tears down the stream.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::convert::mono_16k;

/// Samples per [`AudioFrame`] — 32 ms at 16 kHz, matching the VAD chunk size.
pub const FRAME_SIZE: usize = 512;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One fixed-length buffer of normalized mono audio at 16 kHz.
///
/// Frames are immutable once produced; all consumers of a capture tick
/// observe identical sample data.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
}

impl AudioFrame {
    pub(crate) fn new(samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len(), FRAME_SIZE);
        Self { samples }
    }

    /// Samples in `[-1.0, 1.0]`, always exactly [`FRAME_SIZE`] long.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

// ---------------------------------------------------------------------------
// FrameConsumer
// ---------------------------------------------------------------------------

/// A sink for captured audio frames.
///
/// Implementations run on the capture thread and must not block; queue
/// internally if the work is heavier than a few arithmetic passes over the
/// frame.
pub trait FrameConsumer: Send {
    /// Short name used when logging a failed delivery.
    fn name(&self) -> &'static str;

    /// Handle one captured frame.  Errors are logged by the fan-out and do
    /// not affect other consumers.
    fn on_frame(&mut self, frame: &AudioFrame) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// FrameFanout
// ---------------------------------------------------------------------------

/// Accumulates converted samples and fans complete frames out to consumers.
///
/// Split out of [`AudioSource`] so the framing/fan-out contract is testable
/// without audio hardware.
pub(crate) struct FrameFanout {
    consumers: Vec<Box<dyn FrameConsumer>>,
    pending: Vec<f32>,
}

impl FrameFanout {
    pub(crate) fn new(consumers: Vec<Box<dyn FrameConsumer>>) -> Self {
        Self {
            consumers,
            pending: Vec::with_capacity(FRAME_SIZE * 2),
        }
    }

    /// Buffer `samples` (16 kHz mono) and deliver every complete
    /// [`FRAME_SIZE`] frame to all consumers in registration order.
    pub(crate) fn push(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);

        while self.pending.len() >= FRAME_SIZE {
            let rest = self.pending.split_off(FRAME_SIZE);
            let frame = AudioFrame::new(std::mem::replace(&mut self.pending, rest));

            for consumer in &mut self.consumers {
                if let Err(e) = consumer.on_frame(&frame) {
                    log::warn!("audio consumer '{}' failed: {e:#}", consumer.name());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while setting up or running microphone capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device '{0}' not found")]
    NamedDeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// InputDevice
// ---------------------------------------------------------------------------

/// One available input device, for diagnostics (`--list-devices`).
#[derive(Debug, Clone)]
pub struct InputDevice {
    pub index: usize,
    pub name: String,
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// Microphone capture with synchronous frame fan-out.
///
/// Consumers are fixed at construction; [`AudioSource::start`] moves them
/// into the cpal callback, so the set cannot change while capturing.
/// [`AudioSource::stop`] (or drop) releases the stream.
pub struct AudioSource {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
    /// Taken by `start()`; `None` once the stream owns them.
    consumers: Option<Vec<Box<dyn FrameConsumer>>>,
    stream: Option<cpal::Stream>,
}

impl AudioSource {
    /// Create a source on the default input device (or the named one) with a
    /// fixed consumer list.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] when the host has no input device,
    /// [`CaptureError::NamedDeviceNotFound`] when `device_name` matches
    /// nothing, or a config query failure.
    pub fn new(
        device_name: Option<&str>,
        consumers: Vec<Box<dyn FrameConsumer>>,
    ) -> Result<Self, CaptureError> {
        let host = cpal::default_host();

        let device = match device_name {
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::NamedDeviceNotFound(name.to_string()))?,
        };

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
            consumers: Some(consumers),
            stream: None,
        })
    }

    /// List available input devices as `{index, name}` pairs.
    pub fn list_devices() -> Result<Vec<InputDevice>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()?
            .enumerate()
            .map(|(index, d)| InputDevice {
                index,
                name: d.name().unwrap_or_else(|_| "<unknown>".into()),
            })
            .collect();
        Ok(devices)
    }

    /// Begin delivering frames to the registered consumers.
    ///
    /// The cpal callback converts each hardware buffer to 16 kHz mono and
    /// pushes it through the [`FrameFanout`].  Calling `start` twice is a
    /// no-op while a stream is live.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let consumers = self.consumers.take().unwrap_or_default();
        let mut fanout = FrameFanout::new(consumers);
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted = mono_16k(data, sample_rate, channels);
                fanout.push(&converted);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        log::info!("audio capture started ({sample_rate} Hz, {channels} ch)");
        self.stream = Some(stream);
        Ok(())
    }

    /// Halt delivery and release capture resources.  Idempotent.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::info!("audio capture stopped");
        }
    }

    /// Native sample rate reported by the device, in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every frame it sees; optionally fails each delivery.
    struct Recorder {
        label: &'static str,
        frames: Arc<Mutex<Vec<Vec<f32>>>>,
        fail: bool,
    }

    impl FrameConsumer for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn on_frame(&mut self, frame: &AudioFrame) -> anyhow::Result<()> {
            self.frames.lock().unwrap().push(frame.samples().to_vec());
            if self.fail {
                anyhow::bail!("simulated consumer failure");
            }
            Ok(())
        }
    }

    fn recorder(
        label: &'static str,
        fail: bool,
    ) -> (Box<dyn FrameConsumer>, Arc<Mutex<Vec<Vec<f32>>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let consumer = Recorder {
            label,
            frames: Arc::clone(&frames),
            fail,
        };
        (Box::new(consumer), frames)
    }

    #[test]
    fn all_consumers_see_identical_frame_exactly_once() {
        let (a, a_frames) = recorder("a", false);
        let (b, b_frames) = recorder("b", false);
        let (c, c_frames) = recorder("c", false);
        let mut fanout = FrameFanout::new(vec![a, b, c]);

        let samples: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| i as f32 / FRAME_SIZE as f32)
            .collect();
        fanout.push(&samples);

        for frames in [&a_frames, &b_frames, &c_frames] {
            let got = frames.lock().unwrap();
            assert_eq!(got.len(), 1);
            assert_eq!(got[0], samples);
        }
    }

    #[test]
    fn partial_buffers_accumulate_into_one_frame() {
        let (a, frames) = recorder("a", false);
        let mut fanout = FrameFanout::new(vec![a]);

        fanout.push(&vec![0.1; 300]);
        assert!(frames.lock().unwrap().is_empty());

        fanout.push(&vec![0.1; 212]);
        assert_eq!(frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn oversized_buffer_yields_multiple_frames() {
        let (a, frames) = recorder("a", false);
        let mut fanout = FrameFanout::new(vec![a]);

        fanout.push(&vec![0.0; FRAME_SIZE * 3 + 17]);
        let got = frames.lock().unwrap();
        assert_eq!(got.len(), 3);
        assert!(got.iter().all(|f| f.len() == FRAME_SIZE));
    }

    #[test]
    fn failing_consumer_does_not_block_later_consumers() {
        let (bad, bad_frames) = recorder("bad", true);
        let (good, good_frames) = recorder("good", false);
        let mut fanout = FrameFanout::new(vec![bad, good]);

        fanout.push(&vec![0.0; FRAME_SIZE * 2]);

        // Both consumers keep receiving every frame despite the failures.
        assert_eq!(bad_frames.lock().unwrap().len(), 2);
        assert_eq!(good_frames.lock().unwrap().len(), 2);
    }

    #[test]
    fn frames_preserve_sample_order_across_boundary() {
        let (a, frames) = recorder("a", false);
        let mut fanout = FrameFanout::new(vec![a]);

        let samples: Vec<f32> = (0..FRAME_SIZE * 2).map(|i| i as f32).collect();
        fanout.push(&samples);

        let got = frames.lock().unwrap();
        assert_eq!(got[0][FRAME_SIZE - 1], (FRAME_SIZE - 1) as f32);
        assert_eq!(got[1][0], FRAME_SIZE as f32);
    }
}
