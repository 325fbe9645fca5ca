//! Seekable buffer playback with a tracked position.
//!
//! A [`Track`] is a [`Sound`] that remembers where it is. While a play is
//! pending or sounding, a tick scheduled through the context's deferred calls
//! recomputes the position every [`tick_interval`](Track::tick_interval)
//! seconds; once nothing is playing the tick stops rescheduling itself, and
//! stopping or pausing the track cancels the pending tick.
//!
//! Reaching the end of a non-looping buffer rewinds the position to 0.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::buffer::AudioBuffer;
use crate::context::AudioContext;
use crate::error::Result;
use crate::host::TimerId;
use crate::lifecycle::{Playable, Sounding};
use crate::param::{OnPlayRamp, OnPlaySet, ParamType, RampKind, RatioKind, Update};
use crate::sound::Sound;

/// Default seconds between position updates.
pub const DEFAULT_TICK_INTERVAL: f64 = 0.05;

/// Position state shared with the tick callback.
struct TrackClock {
    position: Cell<f64>,
    /// `(context time, buffer offset)` of the play the position follows.
    anchor: Cell<Option<(f64, f64)>>,
    ticking: Cell<bool>,
    next_tick: Cell<Option<TimerId>>,
    duration: f64,
    looping: Cell<bool>,
    rate: Cell<f64>,
    sounding: Rc<RefCell<Sounding>>,
}

impl TrackClock {
    fn position_at(&self, now: f64) -> Option<f64> {
        let (start, offset) = self.anchor.get()?;
        if now < start {
            return Some(offset);
        }
        let position = offset + (now - start) * self.rate.get();
        if self.looping.get() && self.duration > 0.0 {
            Some(position.rem_euclid(self.duration))
        } else {
            Some(position)
        }
    }

    /// Recompute the position. Returns whether ticking should continue.
    fn tick(&self, now: f64) -> bool {
        let active = !self.sounding.borrow().is_empty();
        let keep = match self.position_at(now) {
            Some(position) if active && position < self.duration => {
                self.position.set(position);
                true
            }
            Some(_) => {
                self.position.set(0.0);
                self.anchor.set(None);
                false
            }
            None => false,
        };
        if !keep {
            self.ticking.set(false);
        }
        keep
    }
}

fn schedule_tick(context: &AudioContext, clock: Rc<TrackClock>, interval: f64) -> Result<()> {
    let ctx = context.clone();
    let due = context.current_time()? + interval;
    let pending = clock.clone();
    let id = context.schedule_at(due, move || {
        clock.next_tick.set(None);
        let Ok(now) = ctx.current_time() else {
            return;
        };
        if clock.tick(now)
            && let Err(err) = schedule_tick(&ctx, clock, interval)
        {
            tracing::warn!(%err, "track tick could not be rescheduled");
        }
    })?;
    pending.next_tick.set(Some(id));
    Ok(())
}

fn cancel_tick(context: &AudioContext, clock: &TrackClock) -> Result<()> {
    if let Some(id) = clock.next_tick.take() {
        context.cancel(id)?;
    }
    clock.ticking.set(false);
    Ok(())
}

/// A sound with pause, resume and seek.
pub struct Track {
    sound: Sound,
    clock: Rc<TrackClock>,
    tick_interval: f64,
}

impl Track {
    /// A track over `buffer`, positioned at 0.
    pub fn new(context: &AudioContext, buffer: Rc<AudioBuffer>) -> Self {
        let duration = buffer.duration();
        let sound = Sound::new(context, buffer);
        let clock = Rc::new(TrackClock {
            position: Cell::new(0.0),
            anchor: Cell::new(None),
            ticking: Cell::new(false),
            next_tick: Cell::new(None),
            duration,
            looping: Cell::new(false),
            rate: Cell::new(1.0),
            sounding: sound.playback().sounding_handle(),
        });
        Self {
            sound,
            clock,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Use a different tick interval. Non-positive values keep the default.
    pub fn with_tick_interval(mut self, seconds: f64) -> Self {
        if seconds > 0.0 {
            self.tick_interval = seconds;
        }
        self
    }

    /// Seconds between position updates.
    pub fn tick_interval(&self) -> f64 {
        self.tick_interval
    }

    /// Position in seconds as of the last tick or transport change.
    pub fn position(&self) -> f64 {
        self.clock.position.get()
    }

    /// Buffer length in seconds.
    pub fn duration(&self) -> f64 {
        self.clock.duration
    }

    /// Loop the buffer on later plays.
    pub fn set_loop(&mut self, looping: bool) {
        self.sound.set_loop(looping);
        self.clock.looping.set(looping);
    }

    /// Playback speed for later plays.
    pub fn set_playback_rate(&mut self, rate: f32) -> Result<()> {
        self.sound.set_playback_rate(rate)?;
        self.clock.rate.set(f64::from(rate));
        Ok(())
    }

    /// Stop now and keep the position.
    pub fn pause(&mut self) -> Result<()> {
        let now = self.sound.current_time()?;
        if let Some(position) = self.clock.position_at(now) {
            self.clock.position.set(position.min(self.clock.duration));
        }
        self.clock.anchor.set(None);
        self.sound.stop_at(now)?;
        if self.sound.playback().sounding().is_empty() {
            cancel_tick(self.sound.playback().context(), &self.clock)?;
        }
        tracing::debug!(position = self.position(), "track paused");
        Ok(())
    }

    /// Play from the current position.
    pub fn resume(&mut self) -> Result<()> {
        self.play()
    }

    /// Move the position. Interpret the value with [`Seek::from`].
    pub fn seek(&mut self, value: f64) -> Seek<'_> {
        Seek { track: self, value }
    }

    fn seek_to(&mut self, position: f64) -> Result<f64> {
        let position = position.clamp(0.0, self.clock.duration);
        let now = self.sound.current_time()?;
        let was_playing = self.sound.is_playing();
        if was_playing {
            self.clock.anchor.set(None);
            self.sound.stop_at(now)?;
        }
        self.clock.position.set(position);
        if was_playing {
            self.play_at(now)?;
        }
        tracing::debug!(position, restarted = was_playing, "track seek");
        Ok(position)
    }

    /// See [`Sound::on_play_set`].
    pub fn on_play_set(&mut self, param: ParamType) -> OnPlaySet<'_> {
        self.sound.on_play_set(param)
    }

    /// See [`Sound::on_play_ramp`].
    pub fn on_play_ramp(&mut self, param: ParamType, kind: RampKind) -> OnPlayRamp<'_> {
        self.sound.on_play_ramp(param, kind)
    }

    /// See [`Sound::update`].
    pub fn update(&mut self, param: ParamType) -> Update<'_> {
        self.sound.update(param)
    }

    /// The wrapped sound.
    pub fn sound(&self) -> &Sound {
        &self.sound
    }
}

/// Builder returned by [`Track::seek`].
pub struct Seek<'a> {
    track: &'a mut Track,
    value: f64,
}

impl Seek<'_> {
    /// Seek to `kind.apply(value) * duration`, clamped to the buffer.
    /// Returns the new position in seconds.
    pub fn from(self, kind: RatioKind) -> Result<f64> {
        let ratio = match kind {
            RatioKind::Ratio => self.value,
            RatioKind::InverseRatio => 1.0 - self.value,
            RatioKind::Percent => self.value / 100.0,
        };
        let duration = self.track.clock.duration;
        self.track.seek_to(ratio * duration)
    }

    /// Seek to an absolute position in seconds.
    pub fn seconds(self) -> Result<f64> {
        self.track.seek_to(self.value)
    }
}

impl Playable for Track {
    fn current_time(&self) -> Result<f64> {
        self.sound.current_time()
    }

    fn play_at(&mut self, time: f64) -> Result<()> {
        if self.sound.playback().registry().contains(time) {
            return Ok(());
        }
        let offset = self.clock.position.get();
        self.sound.set_start_offset(offset);
        self.sound.play_at(time)?;
        self.clock.anchor.set(Some((time, offset)));
        if !self.clock.ticking.replace(true) {
            schedule_tick(
                self.sound.playback().context(),
                self.clock.clone(),
                self.tick_interval,
            )?;
        }
        Ok(())
    }

    fn stop_at(&mut self, time: f64) -> Result<()> {
        let now = self.sound.current_time()?;
        if !self.sound.playback().registry().has_started_by(time) {
            return Ok(());
        }
        self.sound.stop_at(time)?;
        let context = self.sound.playback().context();
        if time <= now {
            self.clock.anchor.set(None);
            self.clock.position.set(0.0);
            if self.sound.playback().sounding().is_empty() {
                cancel_tick(context, &self.clock)?;
            }
        } else {
            let clock = self.clock.clone();
            context.schedule_at(time, move || {
                clock.anchor.set(None);
                clock.position.set(0.0);
            })?;
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.sound.is_playing()
    }

    fn set_gain(&mut self, gain: f32) -> Result<()> {
        self.sound.set_gain(gain)
    }

    fn set_pan(&mut self, pan: f32) -> Result<()> {
        self.sound.set_pan(pan)
    }
}
