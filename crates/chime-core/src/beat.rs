//! Step sequencing on top of a [`Sampler`].
//!
//! A [`BeatTrack`] is a sampler plus an ordered row of [`Beat`]s. Each beat is
//! either active (plays the next sample) or a rest. Playing a beat always
//! marks it as the current step for one beat duration so a UI can follow the
//! playhead; only active beats make sound.
//!
//! Shrinking the row hides beats instead of dropping them, so growing it back
//! restores their state.

use std::cell::Cell;
use std::rc::Rc;

use crate::composite::Sampler;
use crate::context::AudioContext;
use crate::error::{CompositeError, Result};
use crate::lifecycle::{Playable, SharedPlayable};

#[derive(Default)]
struct BeatFlags {
    is_playing: Cell<bool>,
    current_time_is_playing: Cell<bool>,
    generation: Cell<u64>,
}

/// One step of a [`BeatTrack`].
#[derive(Default)]
pub struct Beat {
    active: bool,
    flags: Rc<BeatFlags>,
}

impl Beat {
    /// Whether this step plays a sample.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Make this step play or rest.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Flip between playing and resting.
    pub fn toggle(&mut self) {
        self.active = !self.active;
    }

    /// Whether this step is sounding right now.
    pub fn is_playing(&self) -> bool {
        self.flags.is_playing.get()
    }

    /// Whether the playhead is on this step, active or not.
    pub fn current_time_is_playing(&self) -> bool {
        self.flags.current_time_is_playing.get()
    }

    /// Set the transient flags after `delay`, clear them `duration` later.
    /// A newer mark supersedes pending transitions of an older one.
    fn mark(&self, context: &AudioContext, delay: f64, duration: f64) -> Result<()> {
        let generation = self.flags.generation.get() + 1;
        self.flags.generation.set(generation);
        let sounding = self.active;

        let raise = {
            let flags = self.flags.clone();
            move || {
                if flags.generation.get() == generation {
                    flags.current_time_is_playing.set(true);
                    flags.is_playing.set(sounding);
                }
            }
        };
        if delay <= 0.0 {
            raise();
        } else {
            context.schedule_after(delay, raise)?;
        }

        let flags = self.flags.clone();
        context.schedule_after(delay.max(0.0) + duration, move || {
            if flags.generation.get() == generation {
                flags.current_time_is_playing.set(false);
                flags.is_playing.set(false);
            }
        })?;
        Ok(())
    }
}

impl core::fmt::Debug for Beat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Beat")
            .field("active", &self.active)
            .field("is_playing", &self.is_playing())
            .field("current_time_is_playing", &self.current_time_is_playing())
            .finish()
    }
}

/// A sampler driven by a fixed-length row of beats.
pub struct BeatTrack {
    context: AudioContext,
    sampler: Sampler,
    beats: Vec<Beat>,
    num_beats: usize,
    beat_duration: f64,
}

impl BeatTrack {
    /// `num_beats` inactive beats of `beat_duration` seconds over `sounds`.
    pub fn new(
        context: &AudioContext,
        sounds: Vec<SharedPlayable>,
        num_beats: usize,
        beat_duration: f64,
    ) -> Result<Self, CompositeError> {
        let sampler = Sampler::new(context, sounds)?;
        Ok(Self::from_sampler(context, sampler, num_beats, beat_duration))
    }

    /// Drive an existing sampler.
    pub fn from_sampler(
        context: &AudioContext,
        sampler: Sampler,
        num_beats: usize,
        beat_duration: f64,
    ) -> Self {
        Self {
            context: context.clone(),
            sampler,
            beats: (0..num_beats).map(|_| Beat::default()).collect(),
            num_beats,
            beat_duration,
        }
    }

    /// Visible beats.
    pub fn beats(&self) -> &[Beat] {
        &self.beats[..self.num_beats]
    }

    /// Number of visible beats.
    pub fn num_beats(&self) -> usize {
        self.num_beats
    }

    /// Resize the row. Beats beyond the old storage start inactive; beats
    /// hidden by an earlier shrink come back as they were.
    pub fn set_num_beats(&mut self, num_beats: usize) {
        if num_beats > self.beats.len() {
            self.beats.resize_with(num_beats, Beat::default);
        }
        tracing::debug!(from = self.num_beats, to = num_beats, "beat track resized");
        self.num_beats = num_beats;
    }

    /// Seconds per beat.
    pub fn beat_duration(&self) -> f64 {
        self.beat_duration
    }

    /// Change the beat length for later plays.
    pub fn set_beat_duration(&mut self, seconds: f64) {
        self.beat_duration = seconds;
    }

    fn check(&self, index: usize) -> Result<(), CompositeError> {
        if index < self.num_beats {
            Ok(())
        } else {
            Err(CompositeError::BeatOutOfRange {
                index,
                len: self.num_beats,
            })
        }
    }

    /// A visible beat.
    pub fn beat(&self, index: usize) -> Result<&Beat, CompositeError> {
        self.check(index)?;
        Ok(&self.beats[index])
    }

    /// A visible beat, for editing.
    pub fn beat_mut(&mut self, index: usize) -> Result<&mut Beat, CompositeError> {
        self.check(index)?;
        Ok(&mut self.beats[index])
    }

    /// Make a beat play or rest.
    pub fn set_active(&mut self, index: usize, active: bool) -> Result<(), CompositeError> {
        self.beat_mut(index)?.set_active(active);
        Ok(())
    }

    /// Activate beats from `pattern`; beats past its end become rests.
    pub fn set_pattern(&mut self, pattern: &[bool]) -> Result<(), CompositeError> {
        if pattern.len() > self.num_beats {
            return Err(CompositeError::BeatOutOfRange {
                index: pattern.len() - 1,
                len: self.num_beats,
            });
        }
        for (i, beat) in self.beats[..self.num_beats].iter_mut().enumerate() {
            beat.active = pattern.get(i).copied().unwrap_or(false);
        }
        Ok(())
    }

    /// Active flags of the visible beats.
    pub fn pattern(&self) -> Vec<bool> {
        self.beats().iter().map(Beat::is_active).collect()
    }

    /// Mark beat `index` as current and play the next sample if it is active.
    pub fn play_if_active(&mut self, index: usize) -> Result<()> {
        self.check(index)?;
        self.beats[index].mark(&self.context, 0.0, self.beat_duration)?;
        if self.beats[index].active {
            self.sampler.play()?;
        }
        Ok(())
    }

    /// [`play_if_active`](Self::play_if_active), `delay` seconds from now.
    pub fn if_active_play_in(&mut self, index: usize, delay: f64) -> Result<()> {
        self.check(index)?;
        self.beats[index].mark(&self.context, delay, self.beat_duration)?;
        if self.beats[index].active {
            self.sampler.play_in(delay)?;
        }
        Ok(())
    }

    /// Schedule one pass over the row, beat `i` at `start_in + i * beat_duration`.
    pub fn schedule_pass(&mut self, start_in: f64) -> Result<()> {
        for index in 0..self.num_beats {
            let delay = start_in + index as f64 * self.beat_duration;
            self.if_active_play_in(index, delay)?;
        }
        tracing::debug!(beats = self.num_beats, start_in, "beat pass scheduled");
        Ok(())
    }

    /// Seconds one pass lasts.
    pub fn pass_duration(&self) -> f64 {
        self.num_beats as f64 * self.beat_duration
    }

    /// The underlying sampler.
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// The underlying sampler, for gain and pan settings.
    pub fn sampler_mut(&mut self) -> &mut Sampler {
        &mut self.sampler
    }
}

impl Playable for BeatTrack {
    fn current_time(&self) -> Result<f64> {
        self.sampler.current_time()
    }

    fn play_at(&mut self, time: f64) -> Result<()> {
        self.sampler.play_at(time)
    }

    fn stop_at(&mut self, time: f64) -> Result<()> {
        self.sampler.stop_at(time)
    }

    fn is_playing(&self) -> bool {
        self.sampler.is_playing()
    }

    fn set_gain(&mut self, gain: f32) -> Result<()> {
        self.sampler.set_gain(gain)
    }

    fn set_pan(&mut self, pan: f32) -> Result<()> {
        self.sampler.set_pan(pan)
    }
}
