mod symphonia_loader;

use std::time::Duration;

pub use symphonia_loader::probe_audio_file;

/// Format facts of an audio file on disk, gathered without decoding it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFileData {
    sample_rate: u32,
    channels: u16,
    total_frames: u64,
    duration: Duration,
}

impl AudioFileData {
    pub(crate) fn new(sample_rate: u32, channels: u16, total_frames: u64) -> Self {
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(total_frames as f64 / sample_rate as f64)
        };
        Self {
            sample_rate,
            channels,
            total_frames,
            duration,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Duration in seconds, the unit hosts report file lengths in.
    pub fn duration_secs(&self) -> f32 {
        self.duration.as_secs_f32()
    }
}
