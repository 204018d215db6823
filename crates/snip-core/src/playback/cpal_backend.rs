//! CPAL output backend
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control Thread  │───push()───────────►│   Command Queue     │
//! │ (PlaybackSched.) │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ pop()
//!         │ atomics                                   ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ TransportAtomics │◄────────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │     stores          │ (owns Transport-    │
//! └──────────────────┘                     │   Processor)        │
//!                                          └─────────────────────┘
//! ```
//!
//! The processor moves into the stream callback; no lock is shared with
//! the control thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use super::transport::TransportProcessor;
use super::{AudioError, AudioResult};

/// Running output stream on the default device
///
/// Dropping it stops the stream.
pub struct CpalOutput {
    _stream: Stream,
    sample_rate: u32,
    channels: usize,
}

impl CpalOutput {
    /// Open the default output device and start rendering `processor`
    pub fn start(mut processor: TransportProcessor) -> AudioResult<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevices)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?}",
                supported.sample_format()
            )));
        }

        let config: StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels as usize;
        processor.prepare(sample_rate);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    processor.process(data, channels);
                },
                move |err| {
                    log::error!("Playback stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        log::info!(
            "Playback stream started on {} ({} Hz, {} channels)",
            device_name,
            sample_rate,
            channels
        );

        Ok(Self {
            _stream: stream,
            sample_rate,
            channels,
        })
    }

    /// Device sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Device channel count
    pub fn channels(&self) -> usize {
        self.channels
    }
}
