//! Host-neutral decoded audio.

/// A decoded, ready-to-play block of audio.
///
/// Loading and decoding happen outside the core; callers hand over the
/// finished sample data.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: f32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Wrap per-channel sample data. Channels shorter than the first are
    /// treated as silent past their end.
    pub fn new(sample_rate: f32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// A silent buffer of the given length, mostly useful for tests and
    /// simulations where only timing matters.
    pub fn silent(sample_rate: f32, channel_count: usize, duration_secs: f64) -> Self {
        let frames = (duration_secs * f64::from(sample_rate)).round().max(0.0) as usize;
        Self::new(sample_rate, vec![vec![0.0; frames]; channel_count.max(1)])
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames in the longest channel.
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Samples of one channel.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }
}
