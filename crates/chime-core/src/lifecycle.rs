//! Play/stop lifecycle shared by every sound.
//!
//! A sound moves through `Idle → Scheduled(t) → Playing → Idle`, once per
//! accepted play. [`Playback`] implements that state machine on top of a
//! [`ConnectionGraph`] and a [`ParamController`]:
//!
//! - `play_at(t)` is accepted once per distinct `t`; repeats are no-ops
//! - every accepted play rewires the graph, which recreates single-use
//!   sources, then applies queued parameter events and starts the new source
//! - `stop_at(t)` stops every play registered at or before `t`; with nothing
//!   registered it does nothing
//! - `is_playing` flips true when a play's start time is reached and false
//!   once every started play has ended on its own or been stopped
//!
//! Flag flips that lie in the future go through the context's deferred calls,
//! so they fire in issue order on the playback clock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::context::AudioContext;
use crate::error::Result;
use crate::graph::{ConnectionGraph, SoundSettings};
use crate::host::NodeHandle;
use crate::param::{OnPlayRamp, OnPlaySet, ParamController, ParamType, RampKind, Update};

/// Anything that can be played and stopped on the playback clock.
///
/// Implementors provide the scheduled primitives; the convenience methods are
/// defined in terms of them and [`current_time`](Self::current_time).
pub trait Playable {
    /// Current playback-clock time.
    fn current_time(&self) -> Result<f64>;

    /// Schedule a play at `time`. A repeat for an already registered time
    /// does nothing.
    fn play_at(&mut self, time: f64) -> Result<()>;

    /// Stop every play registered at or before `time`. Does nothing when
    /// none is registered.
    fn stop_at(&mut self, time: f64) -> Result<()>;

    /// Whether a started play is sounding.
    fn is_playing(&self) -> bool;

    /// Live output gain, kept for later plays.
    fn set_gain(&mut self, gain: f32) -> Result<()>;

    /// Live stereo position, kept for later plays.
    fn set_pan(&mut self, pan: f32) -> Result<()>;

    /// Play now.
    fn play(&mut self) -> Result<()> {
        let now = self.current_time()?;
        self.play_at(now)
    }

    /// Play `delay` seconds from now.
    fn play_in(&mut self, delay: f64) -> Result<()> {
        let now = self.current_time()?;
        self.play_at(now + delay)
    }

    /// Play now and stop after `duration` seconds.
    fn play_for(&mut self, duration: f64) -> Result<()> {
        let now = self.current_time()?;
        self.play_at(now)?;
        self.stop_at(now + duration)
    }

    /// Play `delay` seconds from now for `duration` seconds.
    fn play_in_and_stop_after(&mut self, delay: f64, duration: f64) -> Result<()> {
        let now = self.current_time()?;
        self.play_at(now + delay)?;
        self.stop_at(now + delay + duration)
    }

    /// Stop now.
    fn stop(&mut self) -> Result<()> {
        let now = self.current_time()?;
        self.stop_at(now)
    }

    /// Wrap in a shared handle for composites.
    fn into_shared(self) -> SharedPlayable
    where
        Self: Sized + 'static,
    {
        Rc::new(RefCell::new(self))
    }
}

/// Shared handle used by composite players.
pub type SharedPlayable = Rc<RefCell<dyn Playable>>;

struct ScheduledPlay {
    id: u64,
    time: f64,
    source: NodeHandle,
}

/// Accepted play timestamps of one sound, with the source each one started.
///
/// Entries leave the registry when a stop covers them or when the play ends
/// on its own. Whether a play is still audible is tracked by [`Sounding`].
#[derive(Default)]
pub struct PlayRegistry {
    plays: Vec<ScheduledPlay>,
    next_id: u64,
}

impl PlayRegistry {
    /// Whether a play at exactly `time` is registered.
    pub fn contains(&self, time: f64) -> bool {
        self.plays.iter().any(|p| p.time == time)
    }

    fn register(&mut self, time: f64, source: NodeHandle) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.plays.push(ScheduledPlay { id, time, source });
        id
    }

    fn remove_play(&mut self, id: u64) {
        self.plays.retain(|p| p.id != id);
    }

    fn take_started_by(&mut self, time: f64) -> Vec<ScheduledPlay> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.plays)
            .into_iter()
            .partition(|p| p.time <= time);
        self.plays = kept;
        taken
    }

    /// Whether any registered play starts at or before `time`.
    pub fn has_started_by(&self, time: f64) -> bool {
        self.plays.iter().any(|p| p.time <= time)
    }

    /// Registered timestamps in registration order.
    pub fn times(&self) -> Vec<f64> {
        self.plays.iter().map(|p| p.time).collect()
    }

    /// Number of registered plays.
    pub fn len(&self) -> usize {
        self.plays.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}

/// Plays that are pending or audible: accepted, not yet ended on their own
/// and not yet reached by a stop.
#[derive(Default)]
pub struct Sounding {
    plays: Vec<(u64, f64)>,
}

impl Sounding {
    fn insert(&mut self, id: u64, start: f64) {
        self.plays.push((id, start));
    }

    /// Drop `ids`. Returns whether any was present.
    fn remove(&mut self, ids: &[u64]) -> bool {
        let before = self.plays.len();
        self.plays.retain(|(id, _)| !ids.contains(id));
        self.plays.len() != before
    }

    /// Whether a play in the set starts at or before `time`.
    pub fn started_by(&self, time: f64) -> bool {
        self.plays.iter().any(|&(_, start)| start <= time)
    }

    /// Number of pending or audible plays.
    pub fn len(&self) -> usize {
        self.plays.len()
    }

    /// Whether nothing is pending or audible.
    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}

/// Lifecycle engine owned by a single-source sound.
pub struct Playback {
    context: AudioContext,
    graph: ConnectionGraph,
    params: ParamController,
    settings: SoundSettings,
    registry: Rc<RefCell<PlayRegistry>>,
    sounding: Rc<RefCell<Sounding>>,
    playing: Rc<Cell<bool>>,
    start_offset: f64,
    rate: f64,
}

impl Playback {
    /// Lifecycle over `graph`.
    pub fn new(context: &AudioContext, graph: ConnectionGraph, settings: SoundSettings) -> Self {
        Self {
            context: context.clone(),
            graph,
            params: ParamController::new(),
            settings,
            registry: Rc::new(RefCell::new(PlayRegistry::default())),
            sounding: Rc::new(RefCell::new(Sounding::default())),
            playing: Rc::new(Cell::new(false)),
            start_offset: 0.0,
            rate: 1.0,
        }
    }

    /// The context this sound plays on.
    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    /// Connection graph.
    pub fn graph(&self) -> &ConnectionGraph {
        &self.graph
    }

    /// Connection graph, for adding or removing stages.
    pub fn graph_mut(&mut self) -> &mut ConnectionGraph {
        &mut self.graph
    }

    /// Queued automation.
    pub fn params(&self) -> &ParamController {
        &self.params
    }

    /// Queued automation, for direct editing.
    pub fn params_mut(&mut self) -> &mut ParamController {
        &mut self.params
    }

    /// Values attribute rules read.
    pub fn settings(&self) -> &SoundSettings {
        &self.settings
    }

    /// Values attribute rules read. Changes apply on the next play.
    pub fn settings_mut(&mut self) -> &mut SoundSettings {
        &mut self.settings
    }

    /// See [`ParamController::on_play_set`].
    pub fn on_play_set(&mut self, param: ParamType) -> OnPlaySet<'_> {
        self.params.on_play_set(param)
    }

    /// See [`ParamController::on_play_ramp`].
    pub fn on_play_ramp(&mut self, param: ParamType, kind: RampKind) -> OnPlayRamp<'_> {
        self.params.on_play_ramp(param, kind)
    }

    /// See [`ParamController::update`].
    pub fn update(&mut self, param: ParamType) -> Update<'_> {
        self.params.update(&self.graph, param)
    }

    /// Seconds into the source material each play starts from.
    pub fn start_offset(&self) -> f64 {
        self.start_offset
    }

    /// Set the start offset for later plays.
    pub fn set_start_offset(&mut self, offset: f64) {
        self.start_offset = offset.max(0.0);
    }

    /// Playback speed used to compute the natural duration.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    /// Seconds a play lasts on its own, `None` if it runs until stopped.
    pub fn natural_duration(&self) -> Option<f64> {
        if self.settings.looping || self.rate <= 0.0 {
            return None;
        }
        let buffer = self.settings.buffer.as_ref()?;
        Some((buffer.duration() - self.start_offset).max(0.0) / self.rate)
    }

    pub(crate) fn sounding_handle(&self) -> Rc<RefCell<Sounding>> {
        self.sounding.clone()
    }

    /// Play registrations, for inspection.
    pub fn registry(&self) -> std::cell::Ref<'_, PlayRegistry> {
        self.registry.borrow()
    }

    /// Pending or audible plays, for inspection.
    pub fn sounding(&self) -> std::cell::Ref<'_, Sounding> {
        self.sounding.borrow()
    }
}

impl Playable for Playback {
    fn current_time(&self) -> Result<f64> {
        Ok(self.context.current_time()?)
    }

    fn play_at(&mut self, time: f64) -> Result<()> {
        let now = self.context.current_time()?;
        if self.registry.borrow().contains(time) {
            tracing::trace!(time, "play already registered");
            return Ok(());
        }
        self.context.resume()?;
        self.graph.wire(&self.context, &self.settings, time)?;
        self.params.apply(&self.graph, time)?;
        let source = self.graph.source_node()?;
        source.start(time, self.start_offset)?;
        tracing::debug!(node = %source.id(), time, offset = self.start_offset, "play scheduled");
        let id = self.registry.borrow_mut().register(time, source);
        self.sounding.borrow_mut().insert(id, time);

        if time <= now {
            self.playing.set(true);
        } else {
            let sounding = self.sounding.clone();
            let playing = self.playing.clone();
            self.context.schedule_after(time - now, move || {
                playing.set(sounding.borrow().started_by(time));
            })?;
        }

        if let Some(duration) = self.natural_duration() {
            let end = time.max(now) + duration;
            let registry = self.registry.clone();
            let sounding = self.sounding.clone();
            let playing = self.playing.clone();
            self.context.schedule_after(end - now, move || {
                registry.borrow_mut().remove_play(id);
                let mut sounding = sounding.borrow_mut();
                if sounding.remove(&[id]) {
                    playing.set(sounding.started_by(end));
                    tracing::trace!(time, "play ended");
                }
            })?;
        }
        Ok(())
    }

    fn stop_at(&mut self, time: f64) -> Result<()> {
        let now = self.context.current_time()?;
        let taken = self.registry.borrow_mut().take_started_by(time);
        if taken.is_empty() {
            tracing::trace!(time, "stop with nothing registered");
            return Ok(());
        }
        let when = time.max(now);
        for play in &taken {
            play.source.stop(when)?;
        }
        tracing::debug!(stopped = taken.len(), when, "stop scheduled");

        let ids: Vec<u64> = taken.iter().map(|p| p.id).collect();
        if time <= now {
            let mut sounding = self.sounding.borrow_mut();
            sounding.remove(&ids);
            self.playing.set(sounding.started_by(now));
        } else {
            let sounding = self.sounding.clone();
            let playing = self.playing.clone();
            self.context.schedule_after(time - now, move || {
                let mut sounding = sounding.borrow_mut();
                sounding.remove(&ids);
                playing.set(sounding.started_by(time));
            })?;
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.get()
    }

    fn set_gain(&mut self, gain: f32) -> Result<()> {
        self.update(ParamType::Gain).to(gain).apply().map(|_| ())
    }

    fn set_pan(&mut self, pan: f32) -> Result<()> {
        self.update(ParamType::Pan).to(pan).apply().map(|_| ())
    }
}
