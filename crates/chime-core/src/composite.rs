//! Playables built from other playables.
//!
//! - [`LayeredSound`]: every call goes to every layer, so several sounds act as one
//! - [`Sampler`]: each play goes to the next sound in turn, wrapping around
//!
//! Composites hold [`SharedPlayable`] handles and only forward calls; the
//! inner sounds keep their own lifecycle state.

use std::rc::Rc;

use crate::buffer::AudioBuffer;
use crate::context::AudioContext;
use crate::error::{CompositeError, Error, Result};
use crate::lifecycle::{Playable, SharedPlayable};
use crate::sound::Sound;

/// Call `f` on every playable. All are attempted; the first error is returned.
fn fan_out(
    playables: &[SharedPlayable],
    mut f: impl FnMut(&mut dyn Playable) -> Result<()>,
) -> Result<()> {
    let mut first: Option<Error> = None;
    for playable in playables {
        if let Err(err) = f(&mut *playable.borrow_mut()) {
            tracing::debug!(%err, "composite member failed");
            first.get_or_insert(err);
        }
    }
    first.map_or(Ok(()), Err)
}

/// Several playables started and stopped together.
pub struct LayeredSound {
    context: AudioContext,
    layers: Vec<SharedPlayable>,
}

impl LayeredSound {
    /// Layer `layers`. At least one is required.
    pub fn new(
        context: &AudioContext,
        layers: Vec<SharedPlayable>,
    ) -> Result<Self, CompositeError> {
        if layers.is_empty() {
            return Err(CompositeError::Empty("layered sound"));
        }
        Ok(Self {
            context: context.clone(),
            layers,
        })
    }

    /// The layers, in call order.
    pub fn layers(&self) -> &[SharedPlayable] {
        &self.layers
    }

    /// Add a layer.
    pub fn push(&mut self, layer: SharedPlayable) {
        self.layers.push(layer);
    }
}

impl Playable for LayeredSound {
    fn current_time(&self) -> Result<f64> {
        Ok(self.context.current_time()?)
    }

    fn play_at(&mut self, time: f64) -> Result<()> {
        fan_out(&self.layers, |layer| layer.play_at(time))
    }

    fn stop_at(&mut self, time: f64) -> Result<()> {
        fan_out(&self.layers, |layer| layer.stop_at(time))
    }

    fn is_playing(&self) -> bool {
        self.layers.iter().any(|layer| layer.borrow().is_playing())
    }

    fn set_gain(&mut self, gain: f32) -> Result<()> {
        fan_out(&self.layers, |layer| layer.set_gain(gain))
    }

    fn set_pan(&mut self, pan: f32) -> Result<()> {
        fan_out(&self.layers, |layer| layer.set_pan(pan))
    }

    fn play(&mut self) -> Result<()> {
        fan_out(&self.layers, |layer| layer.play())
    }

    fn play_in(&mut self, delay: f64) -> Result<()> {
        fan_out(&self.layers, |layer| layer.play_in(delay))
    }

    fn play_for(&mut self, duration: f64) -> Result<()> {
        fan_out(&self.layers, |layer| layer.play_for(duration))
    }

    fn play_in_and_stop_after(&mut self, delay: f64, duration: f64) -> Result<()> {
        fan_out(&self.layers, |layer| {
            layer.play_in_and_stop_after(delay, duration)
        })
    }

    fn stop(&mut self) -> Result<()> {
        fan_out(&self.layers, |layer| layer.stop())
    }
}

/// Round-robin over a set of playables.
///
/// The sampler's pan is applied to each sound as it is chosen. Its gain is
/// only applied when [`set_apply_gain`](Self::set_apply_gain) is enabled, so
/// per-sample levels survive by default.
pub struct Sampler {
    context: AudioContext,
    sounds: Vec<SharedPlayable>,
    cursor: usize,
    gain: Option<f32>,
    pan: Option<f32>,
    apply_gain: bool,
}

impl Sampler {
    /// A sampler cycling through `sounds`. At least one is required.
    pub fn new(
        context: &AudioContext,
        sounds: Vec<SharedPlayable>,
    ) -> Result<Self, CompositeError> {
        if sounds.is_empty() {
            return Err(CompositeError::Empty("sampler"));
        }
        Ok(Self {
            context: context.clone(),
            sounds,
            cursor: 0,
            gain: None,
            pan: None,
            apply_gain: false,
        })
    }

    /// A sampler with one [`Sound`] per buffer.
    pub fn from_buffers(
        context: &AudioContext,
        buffers: impl IntoIterator<Item = Rc<AudioBuffer>>,
    ) -> Result<Self, CompositeError> {
        let sounds = buffers
            .into_iter()
            .map(|buffer| Sound::new(context, buffer).into_shared())
            .collect();
        Self::new(context, sounds)
    }

    /// Sounds in rotation order.
    pub fn sounds(&self) -> &[SharedPlayable] {
        &self.sounds
    }

    /// Number of sounds.
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    /// Always `false`; construction requires a sound.
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Index the next play will use.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the sampler's gain overrides each sound's own.
    pub fn applies_gain(&self) -> bool {
        self.apply_gain
    }

    /// Opt in to applying the sampler's gain to each chosen sound.
    pub fn set_apply_gain(&mut self, apply: bool) {
        self.apply_gain = apply;
    }

    /// Pick the next sound, advance the cursor and apply the sampler's
    /// pan (and gain, if enabled) to it.
    pub fn next_sound(&mut self) -> Result<SharedPlayable> {
        let index = self.cursor % self.sounds.len();
        self.cursor = (index + 1) % self.sounds.len();
        let sound = self.sounds[index].clone();
        {
            let mut chosen = sound.borrow_mut();
            if let Some(pan) = self.pan {
                chosen.set_pan(pan)?;
            }
            if let (true, Some(gain)) = (self.apply_gain, self.gain) {
                chosen.set_gain(gain)?;
            }
        }
        tracing::trace!(index, "sampler selected sound");
        Ok(sound)
    }
}

impl Playable for Sampler {
    fn current_time(&self) -> Result<f64> {
        Ok(self.context.current_time()?)
    }

    fn play_at(&mut self, time: f64) -> Result<()> {
        self.next_sound()?.borrow_mut().play_at(time)
    }

    fn stop_at(&mut self, time: f64) -> Result<()> {
        fan_out(&self.sounds, |sound| sound.stop_at(time))
    }

    fn is_playing(&self) -> bool {
        self.sounds.iter().any(|sound| sound.borrow().is_playing())
    }

    fn set_gain(&mut self, gain: f32) -> Result<()> {
        self.gain = Some(gain);
        Ok(())
    }

    fn set_pan(&mut self, pan: f32) -> Result<()> {
        self.pan = Some(pan);
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.next_sound()?.borrow_mut().play()
    }

    fn play_in(&mut self, delay: f64) -> Result<()> {
        self.next_sound()?.borrow_mut().play_in(delay)
    }

    fn play_for(&mut self, duration: f64) -> Result<()> {
        self.next_sound()?.borrow_mut().play_for(duration)
    }

    fn play_in_and_stop_after(&mut self, delay: f64, duration: f64) -> Result<()> {
        self.next_sound()?
            .borrow_mut()
            .play_in_and_stop_after(delay, duration)
    }

    fn stop(&mut self) -> Result<()> {
        fan_out(&self.sounds, |sound| sound.stop())
    }
}
