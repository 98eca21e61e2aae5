use serde::{Deserialize, Serialize};

use crate::{config::LightLayout, ChannelBuffer};

/// Highest velocity a note trigger can carry.
pub const MAX_VELOCITY: u8 = 127;

/// Linear RGB triple. Components are nominally in `[0, 1]` but are only
/// clamped when a light is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0);
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Average of the three channels, used as a brightness estimate.
    pub fn mean(&self) -> f32 {
        (self.r + self.g + self.b) / 3.0
    }
}

/// The four channel values a light contributes to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightBytes {
    pub intensity: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Maps a float to a channel byte. Values are clamped to `[0, 1]` and then
/// truncated, so `1.0` is the only value producing 255.
pub fn to_channel(value: f32) -> u8 {
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    (255.0 * clamped) as u8
}

/// One animated fixture light.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub layout: LightLayout,
    pub intensity: f32,
    pub color: Color,
}

impl Light {
    pub fn new(layout: LightLayout) -> Self {
        Self {
            layout,
            intensity: 0.0,
            color: Color::BLACK,
        }
    }

    /// A harder hit keeps more of the current brightness; the flash always
    /// restarts at pure red.
    pub fn trigger(&mut self, velocity: u8) {
        let velocity = velocity.min(MAX_VELOCITY);
        let attenuation = f32::from(MAX_VELOCITY - velocity) / f32::from(MAX_VELOCITY);
        self.intensity *= attenuation;
        self.color = Color::RED;
    }

    /// Single-pole low-pass step toward the target. `decay` is expressed in
    /// frames and must be at least 1.
    pub fn decay_step(&mut self, target_intensity: f32, target: Color, decay: f32) {
        let decay = decay.max(1.0);
        self.intensity += (target_intensity - self.intensity) / decay;
        self.color.r += (target.r - self.color.r) / decay;
        self.color.g += (target.g - self.color.g) / decay;
        self.color.b += (target.b - self.color.b) / decay;
    }

    pub fn render(&self, gain: f32) -> LightBytes {
        LightBytes {
            intensity: to_channel(self.intensity * gain),
            r: to_channel(self.color.r),
            g: to_channel(self.color.g),
            b: to_channel(self.color.b),
        }
    }

    /// Renders the light straight into its configured channels.
    pub fn write_into(&self, gain: f32, buffer: &mut ChannelBuffer) {
        let bytes = self.render(gain);
        let layout = &self.layout;
        buffer[usize::from(layout.intensity)] = bytes.intensity;
        buffer[usize::from(layout.red)] = bytes.r;
        buffer[usize::from(layout.green)] = bytes.g;
        buffer[usize::from(layout.blue)] = bytes.b;
    }
}

/// The full set of animated lights, indexed in configuration order.
#[derive(Debug, Clone, Default)]
pub struct LightBank {
    lights: Vec<Light>,
}

impl LightBank {
    pub fn new(layouts: &[LightLayout]) -> Self {
        Self {
            lights: layouts.iter().copied().map(Light::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Light> {
        self.lights.iter_mut()
    }

    /// Fires the light at `index`. Returns `false` when no such light exists.
    pub fn trigger(&mut self, index: usize, velocity: u8) -> bool {
        match self.lights.get_mut(index) {
            Some(light) => {
                light.trigger(velocity);
                true
            }
            None => false,
        }
    }

    pub fn decay_step(&mut self, index: usize, target_intensity: f32, target: Color, decay: f32) {
        if let Some(light) = self.lights.get_mut(index) {
            light.decay_step(target_intensity, target, decay);
        }
    }

    pub fn render(&self, index: usize, gain: f32) -> Option<LightBytes> {
        self.lights.get(index).map(|light| light.render(gain))
    }
}
