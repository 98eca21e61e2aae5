use serde::{Deserialize, Serialize};

/// Largest raw value a controller can send.
pub const MAX_RAW_VALUE: u8 = 127;

/// Live-tweakable render parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Time constant of the light filter, in frames.
    Decay,
    LightGain,
    SpotGain,
    /// How far the image sampler jumps per frame.
    SampleSpeed,
}

impl Parameter {
    /// Converts a raw 7-bit controller value into the parameter's range:
    /// decay spans `1..=128` frames, everything else `0..=1`.
    pub fn normalize(self, raw: u8) -> f32 {
        let raw = raw.min(MAX_RAW_VALUE);
        match self {
            Parameter::Decay => f32::from(raw) + 1.0,
            _ => f32::from(raw) / f32::from(MAX_RAW_VALUE),
        }
    }
}

/// Process-wide parameter store written by the control loop and read by
/// every render.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSurface {
    decay: f32,
    light_gain: f32,
    spot_gain: f32,
    sample_speed: f32,
}

impl Default for ControlSurface {
    fn default() -> Self {
        Self {
            decay: 3.0,
            light_gain: 0.0,
            spot_gain: 0.0,
            sample_speed: 0.0,
        }
    }
}

impl ControlSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn light_gain(&self) -> f32 {
        self.light_gain
    }

    pub fn spot_gain(&self) -> f32 {
        self.spot_gain
    }

    pub fn sample_speed(&self) -> f32 {
        self.sample_speed
    }

    pub fn get(&self, parameter: Parameter) -> f32 {
        match parameter {
            Parameter::Decay => self.decay,
            Parameter::LightGain => self.light_gain,
            Parameter::SpotGain => self.spot_gain,
            Parameter::SampleSpeed => self.sample_speed,
        }
    }

    /// Decay never drops below one frame, the filter would overshoot.
    pub fn set_decay(&mut self, value: f32) {
        self.decay = if value.is_nan() { 1.0 } else { value.max(1.0) };
    }

    pub fn set_light_gain(&mut self, value: f32) {
        self.light_gain = finite_or_zero(value).max(0.0);
    }

    /// Spot gain is stored as given and clamped when rendered.
    pub fn set_spot_gain(&mut self, value: f32) {
        self.spot_gain = finite_or_zero(value);
    }

    pub fn set_sample_speed(&mut self, value: f32) {
        self.sample_speed = finite_or_zero(value).clamp(0.0, 1.0);
    }

    pub fn set(&mut self, parameter: Parameter, value: f32) {
        match parameter {
            Parameter::Decay => self.set_decay(value),
            Parameter::LightGain => self.set_light_gain(value),
            Parameter::SpotGain => self.set_spot_gain(value),
            Parameter::SampleSpeed => self.set_sample_speed(value),
        }
    }

    /// Applies a raw controller value and returns the stored result.
    pub fn apply_raw(&mut self, parameter: Parameter, raw: u8) -> f32 {
        self.set(parameter, parameter.normalize(raw));
        self.get(parameter)
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}
