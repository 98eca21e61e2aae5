use crate::{
    config::{AppConfig, LightMode, SpotRange},
    control::ControlSurface,
    lights::{to_channel, Color, LightBank},
    sampler::ImageSampler,
    ChannelBuffer, LightDeckError, Result, CHANNELS,
};

/// Where the lights get their per-frame target from.
#[derive(Debug)]
pub enum LightSource {
    /// Light channels are left dark and the filter is not stepped.
    Hidden,
    /// Lights relax toward a fixed colour at full intensity.
    Rest(Color),
    /// Lights relax toward colours picked from a walking image cursor.
    Image(ImageSampler),
}

impl LightSource {
    /// Builds the source selected by the configuration, loading the
    /// sampler image from disk when needed.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match config.render.light_mode {
            LightMode::Hidden => Ok(Self::Hidden),
            LightMode::Rest => Ok(Self::Rest(config.render.rest_color)),
            LightMode::Image => {
                let path = config
                    .image
                    .as_ref()
                    .ok_or_else(|| LightDeckError::config("light mode `image` needs an image path"))?;
                Ok(Self::Image(ImageSampler::open(path)?))
            }
        }
    }

    pub fn mode(&self) -> LightMode {
        match self {
            Self::Hidden => LightMode::Hidden,
            Self::Rest(_) => LightMode::Rest,
            Self::Image(_) => LightMode::Image,
        }
    }

    pub fn sampler(&self) -> Option<&ImageSampler> {
        match self {
            Self::Image(sampler) => Some(sampler),
            _ => None,
        }
    }

    pub fn sampler_mut(&mut self) -> Option<&mut ImageSampler> {
        match self {
            Self::Image(sampler) => Some(sampler),
            _ => None,
        }
    }
}

/// Composes the animation state into a flat channel buffer once per frame.
#[derive(Debug, Clone)]
pub struct Renderer {
    spots: SpotRange,
}

impl Renderer {
    pub fn new(spots: SpotRange) -> Self {
        Self { spots }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.fixture.spot_channels)
    }

    /// Produces a fresh buffer. Cannot fail: every parameter is clamped on
    /// the way to the channel bytes.
    pub fn render(
        &self,
        lights: &mut LightBank,
        controls: &ControlSurface,
        source: &LightSource,
    ) -> ChannelBuffer {
        let mut buffer = [0u8; CHANNELS];

        let spot = to_channel(controls.spot_gain());
        let start = usize::from(self.spots.start).min(CHANNELS);
        let end = usize::from(self.spots.end).min(CHANNELS);
        if start < end {
            buffer[start..end].fill(spot);
        }

        let decay = controls.decay();
        let gain = controls.light_gain();
        match source {
            LightSource::Hidden => {}
            LightSource::Rest(color) => {
                for light in lights.iter_mut() {
                    light.decay_step(1.0, *color, decay);
                    light.write_into(gain, &mut buffer);
                }
            }
            LightSource::Image(sampler) => {
                for (index, light) in lights.iter_mut().enumerate() {
                    let target = sampler.sample(index);
                    light.decay_step(target.mean(), target, decay);
                    light.write_into(gain, &mut buffer);
                }
            }
        }

        buffer
    }
}
