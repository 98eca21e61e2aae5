use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    config::AppConfig,
    control::{ControlSurface, Parameter},
    lights::LightBank,
    render::{LightSource, Renderer},
    ChannelBuffer, LightDeckError, Result,
};

/// Everything the control loop and the frame pump share. Always accessed
/// through [`Engine`], which guards it with a single mutex so a frame sees
/// every earlier trigger and parameter change or none of it.
#[derive(Debug)]
pub struct AnimationState {
    pub lights: LightBank,
    pub controls: ControlSurface,
    pub source: LightSource,
}

impl AnimationState {
    pub fn new(config: &AppConfig, source: LightSource) -> Self {
        Self {
            lights: LightBank::new(&config.fixture.lights),
            controls: ControlSurface::new(),
            source,
        }
    }

    pub fn trigger(&mut self, light: usize, velocity: u8) -> bool {
        self.lights.trigger(light, velocity)
    }

    /// Stores a raw controller value. A new sample speed takes effect
    /// immediately by re-rolling the sampler stride.
    pub fn set_parameter(&mut self, parameter: Parameter, raw: u8) -> f32 {
        let value = self.controls.apply_raw(parameter, raw);
        if parameter == Parameter::SampleSpeed {
            self.refresh_stride();
        }
        value
    }

    pub fn refresh_stride(&mut self) {
        let speed = self.controls.sample_speed();
        if let Some(sampler) = self.source.sampler_mut() {
            sampler.recompute_stride(speed);
        }
    }

    pub fn advance_sampler(&mut self) {
        if let Some(sampler) = self.source.sampler_mut() {
            sampler.advance();
        }
    }
}

/// Cloneable handle over the shared animation state plus the render step.
#[derive(Clone)]
pub struct Engine {
    renderer: Renderer,
    state: Arc<Mutex<AnimationState>>,
}

impl Engine {
    pub fn new(config: &AppConfig, source: LightSource) -> Self {
        Self {
            renderer: Renderer::from_config(config),
            state: Arc::new(Mutex::new(AnimationState::new(config, source))),
        }
    }

    /// Builds the engine and its light source from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = LightSource::from_config(config)?;
        tracing::info!(mode = ?source.mode(), lights = config.fixture.lights.len(), "engine ready");
        Ok(Self::new(config, source))
    }

    /// Runs the render step against one consistent snapshot of the state.
    pub fn render_frame(&self) -> Result<ChannelBuffer> {
        let mut state = self.lock()?;
        let state = &mut *state;
        Ok(self
            .renderer
            .render(&mut state.lights, &state.controls, &state.source))
    }

    /// Bookkeeping after a frame went out: move the sampler cursor and,
    /// when due, pick a new stride.
    pub fn finish_frame(&self, refresh_stride: bool) -> Result<()> {
        let mut state = self.lock()?;
        state.advance_sampler();
        if refresh_stride {
            state.refresh_stride();
        }
        Ok(())
    }

    /// Applies `f` under the state lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut AnimationState) -> R) -> Result<R> {
        let mut state = self.lock()?;
        Ok(f(&mut state))
    }

    fn lock(&self) -> Result<MutexGuard<'_, AnimationState>> {
        self.state
            .lock()
            .map_err(|_| LightDeckError::StatePoisoned("animation state"))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("renderer", &self.renderer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{lights::Color, sampler::ImageSampler};

    fn engine(source: LightSource) -> Engine {
        Engine::new(&AppConfig::default(), source)
    }

    #[test]
    fn trigger_then_render_shows_red_flash() {
        let engine = engine(LightSource::Rest(Color::RED));
        engine
            .with_state(|state| {
                state.set_parameter(Parameter::LightGain, 127);
                state.trigger(0, 0)
            })
            .unwrap();

        let buffer = engine.render_frame().unwrap();

        let light = engine.with_state(|state| state.lights.get(0).cloned()).unwrap().unwrap();
        assert_eq!(light.color, Color::RED);
        let layout = light.layout;
        assert_eq!(buffer[usize::from(layout.red)], 255);
        assert_eq!(buffer[usize::from(layout.green)], 0);
        assert_eq!(buffer[usize::from(layout.blue)], 0);
        // Intensity 0 moved a third of the way to 1 with the default decay.
        assert_eq!(buffer[usize::from(layout.intensity)], 85);
    }

    #[test]
    fn sample_speed_change_rerolls_stride() {
        let pixels = vec![128; 64 * 64 * 4];
        let sampler = ImageSampler::with_seed(64, 64, pixels, 11).unwrap();
        let engine = engine(LightSource::Image(sampler));

        let stride = |engine: &Engine| {
            engine
                .with_state(|state| state.source.sampler().map(|s| s.stride()))
                .unwrap()
                .unwrap()
        };
        assert_eq!(stride(&engine), 0);

        let changed = (0..8).any(|_| {
            engine
                .with_state(|state| state.set_parameter(Parameter::SampleSpeed, 127))
                .unwrap();
            stride(&engine) != 0
        });
        assert!(changed);

        engine
            .with_state(|state| state.set_parameter(Parameter::SampleSpeed, 0))
            .unwrap();
        assert_eq!(stride(&engine), 0);
    }

    #[test]
    fn finish_frame_advances_cursor() {
        let pixels = vec![0; 10 * 10 * 4];
        let mut sampler = ImageSampler::with_seed(10, 10, pixels, 2).unwrap();
        sampler.recompute_stride(1.0);
        let stride = sampler.stride();
        let len = sampler.byte_len();
        let engine = engine(LightSource::Image(sampler));

        for _ in 0..3 {
            engine.finish_frame(false).unwrap();
        }

        let cursor = engine
            .with_state(|state| state.source.sampler().map(|s| s.cursor()))
            .unwrap()
            .unwrap();
        assert_eq!(cursor, (3 * stride) % len);
    }

    #[test]
    fn concurrent_triggers_and_renders_stay_consistent() {
        let engine = engine(LightSource::Rest(Color::WHITE));
        engine
            .with_state(|state| state.set_parameter(Parameter::Decay, 0))
            .unwrap();

        let control = engine.clone();
        let handle = thread::spawn(move || {
            for i in 0..2_000u32 {
                control
                    .with_state(|state| {
                        state.trigger((i % 8) as usize, (i % 128) as u8);
                    })
                    .unwrap();
            }
        });

        for _ in 0..500 {
            engine.render_frame().unwrap();
        }
        handle.join().unwrap();

        // Decay 1 snaps every light to its target on the next frame.
        engine.render_frame().unwrap();
        engine
            .with_state(|state| {
                for light in state.lights.iter() {
                    assert_eq!(light.color, Color::WHITE);
                    assert!((light.intensity - 1.0).abs() < 1e-6);
                }
            })
            .unwrap();
    }

    #[test]
    fn poisoned_state_is_reported() {
        let engine = engine(LightSource::Hidden);
        let poisoner = engine.clone();
        let result = thread::spawn(move || {
            let _ = poisoner.with_state(|_| panic!("boom"));
        })
        .join();
        assert!(result.is_err());

        let err = engine.render_frame().unwrap_err();
        assert!(matches!(err, LightDeckError::StatePoisoned(_)));
    }
}
