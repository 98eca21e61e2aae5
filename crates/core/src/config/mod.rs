use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{control::Parameter, lights::Color, LightDeckError, Result, CHANNELS};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fixture: FixtureConfig,
    pub render: RenderConfig,
    pub control: ControlConfig,
    /// Picture feeding the image sampler when `render.light_mode` is `image`.
    pub image: Option<PathBuf>,
}

impl AppConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the invariants the engine relies on: every channel offset fits
    /// in the frame, light channels are disjoint from each other and from the
    /// spot range, and every mapping points at something that exists.
    pub fn validate(&self) -> Result<()> {
        self.fixture.validate()?;
        self.render.validate()?;
        self.control.validate(self.fixture.lights.len())?;

        if self.render.light_mode == LightMode::Image && self.image.is_none() {
            return Err(LightDeckError::config(
                "light mode `image` needs an image path",
            ));
        }
        Ok(())
    }
}

/// Channel layout and timing of the fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub fps: u32,
    pub spot_channels: SpotRange,
    pub lights: Vec<LightLayout>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            spot_channels: SpotRange { start: 0, end: 20 },
            lights: (0..8).map(|light| LightLayout::at(99 + 9 * light)).collect(),
        }
    }
}

impl FixtureConfig {
    /// Time between two frames at the configured rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(LightDeckError::config("fps must be positive"));
        }

        let spots = self.spot_channels;
        if spots.start >= spots.end || usize::from(spots.end) > CHANNELS {
            return Err(LightDeckError::config(format!(
                "spot channels {}..{} are not a valid range",
                spots.start, spots.end
            )));
        }

        let mut taken = HashSet::new();
        for (index, layout) in self.lights.iter().enumerate() {
            for channel in layout.channels() {
                if usize::from(channel) >= CHANNELS {
                    return Err(LightDeckError::config(format!(
                        "light {index} uses channel {channel} outside the frame"
                    )));
                }
                if spots.contains(channel) {
                    return Err(LightDeckError::config(format!(
                        "light {index} channel {channel} overlaps the spot range"
                    )));
                }
                if !taken.insert(channel) {
                    return Err(LightDeckError::config(format!(
                        "light {index} channel {channel} is already in use"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Half-open channel range driven uniformly by the spot gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotRange {
    pub start: u16,
    pub end: u16,
}

impl SpotRange {
    pub fn contains(&self, channel: u16) -> bool {
        (self.start..self.end).contains(&channel)
    }
}

/// Channel offsets of one light inside the 512 channel universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightLayout {
    pub intensity: u16,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl LightLayout {
    /// Standard fixture block: colour at `base..base + 3`, dimmer at `base + 7`.
    pub const fn at(base: u16) -> Self {
        Self {
            intensity: base + 7,
            red: base,
            green: base + 1,
            blue: base + 2,
        }
    }

    pub fn channels(&self) -> [u16; 4] {
        [self.intensity, self.red, self.green, self.blue]
    }
}

/// How the light channels are produced each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightMode {
    /// Light channels stay dark; triggers only change internal state.
    Hidden,
    /// Lights relax toward `rest_color` at full intensity.
    #[default]
    Rest,
    /// Lights relax toward colours sampled from the configured image.
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub light_mode: LightMode,
    pub rest_color: Color,
    /// Period of the sampler stride refresh, in seconds of render time.
    pub stride_refresh_secs: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            light_mode: LightMode::default(),
            rest_color: Color::WHITE,
            stride_refresh_secs: 30,
        }
    }
}

impl RenderConfig {
    /// Number of frames between two stride refreshes at the given rate.
    pub fn frames_per_refresh(&self, fps: u32) -> u64 {
        u64::from(self.stride_refresh_secs) * u64::from(fps)
    }

    fn validate(&self) -> Result<()> {
        if self.stride_refresh_secs == 0 {
            return Err(LightDeckError::config(
                "stride_refresh_secs must be positive",
            ));
        }
        Ok(())
    }
}

// Keyboard layout from C5: F..B of each octave carry lights 0..6 (white keys
// 0..3, black keys 4..6), D flat drives light 7. C and D..E are dead keys.
const DEFAULT_NOTE_MAP: [Option<u8>; 26] = [
    // C5 .. B5
    None,
    None,
    None,
    None,
    None,
    Some(0),
    Some(4),
    Some(1),
    Some(5),
    Some(2),
    Some(6),
    Some(3),
    // C6 .. B6
    None,
    Some(7),
    None,
    None,
    None,
    Some(0),
    Some(4),
    Some(1),
    Some(5),
    Some(2),
    Some(6),
    Some(3),
    // C7, D flat 7
    None,
    Some(7),
];

/// Binds a controller number to the parameter it drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerBinding {
    pub id: u8,
    pub parameter: Parameter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// MIDI channel (0-based) accepted for note triggers.
    pub channel: u8,
    /// Note number of the first slot in `note_map`.
    pub note_base: u8,
    /// Light index per note, starting at `note_base`. `null` slots are dead keys.
    pub note_map: Vec<Option<u8>>,
    pub controllers: Vec<ControllerBinding>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            note_base: 5 * 12,
            note_map: DEFAULT_NOTE_MAP.to_vec(),
            controllers: vec![
                ControllerBinding {
                    id: 113,
                    parameter: Parameter::Decay,
                },
                ControllerBinding {
                    id: 114,
                    parameter: Parameter::LightGain,
                },
                ControllerBinding {
                    id: 116,
                    parameter: Parameter::SampleSpeed,
                },
                ControllerBinding {
                    id: 117,
                    parameter: Parameter::SpotGain,
                },
            ],
        }
    }
}

impl ControlConfig {
    fn validate(&self, light_count: usize) -> Result<()> {
        if self.channel > 15 {
            return Err(LightDeckError::config(format!(
                "MIDI channel {} is out of range",
                self.channel
            )));
        }
        if usize::from(self.note_base) + self.note_map.len() > 128 {
            return Err(LightDeckError::config("note map runs past note 127"));
        }
        for (slot, light) in self.note_map.iter().enumerate() {
            if let Some(light) = light {
                if usize::from(*light) >= light_count {
                    return Err(LightDeckError::config(format!(
                        "note slot {slot} targets missing light {light}"
                    )));
                }
            }
        }

        let mut ids = HashSet::new();
        for binding in &self.controllers {
            if binding.id > 127 {
                return Err(LightDeckError::config(format!(
                    "controller {} is out of range",
                    binding.id
                )));
            }
            if !ids.insert(binding.id) {
                return Err(LightDeckError::config(format!(
                    "controller {} is bound twice",
                    binding.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();

        assert_eq!(config.fixture.lights.len(), 8);
        assert_eq!(config.fixture.lights[0], LightLayout::at(99));
        assert_eq!(config.fixture.lights[7].intensity, 162 + 7);
        assert_eq!(config.control.note_map.len(), 26);
        assert_eq!(config.render.frames_per_refresh(config.fixture.fps), 300);
    }

    #[test]
    fn default_note_map_matches_keyboard_layout() {
        let map = ControlConfig::default().note_map;
        let expected = [
            None,
            None,
            None,
            None,
            None,
            Some(0),
            Some(4),
            Some(1),
            Some(5),
            Some(2),
            Some(6),
            Some(3),
            None,
            Some(7),
            None,
            None,
            None,
            Some(0),
            Some(4),
            Some(1),
            Some(5),
            Some(2),
            Some(6),
            Some(3),
            None,
            Some(7),
        ];
        assert_eq!(map, expected);
    }

    #[test]
    fn json_round_trip_keeps_values() {
        let mut config = AppConfig::default();
        config.fixture.fps = 25;
        config.render.light_mode = LightMode::Hidden;

        let text = config.to_json_pretty().unwrap();
        assert!(text.contains("\"hidden\""));
        let parsed = AppConfig::from_json_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let parsed = AppConfig::from_json_str(r#"{ "fixture": { "fps": 40 } }"#).unwrap();

        assert_eq!(parsed.fixture.fps, 40);
        assert_eq!(parsed.fixture.lights.len(), 8);
        assert_eq!(parsed.control, ControlConfig::default());
    }

    #[test]
    fn rejects_overlapping_lights() {
        let mut config = AppConfig::default();
        config.fixture.lights[1] = LightLayout::at(100);

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("already in use"));
    }

    #[test]
    fn rejects_lights_inside_spot_range() {
        let mut config = AppConfig::default();
        config.fixture.lights[0] = LightLayout::at(10);

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("spot range"));
    }

    #[test]
    fn rejects_channels_past_the_frame() {
        let mut config = AppConfig::default();
        config.fixture.lights[7] = LightLayout::at(506);

        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_fps_and_bad_spot_range() {
        let mut config = AppConfig::default();
        config.fixture.fps = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fixture.spot_channels = SpotRange { start: 20, end: 20 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_note_map_targeting_missing_light() {
        let mut config = AppConfig::default();
        config.control.note_map[5] = Some(8);

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("missing light 8"));
    }

    #[test]
    fn rejects_duplicate_controllers() {
        let mut config = AppConfig::default();
        config.control.controllers.push(ControllerBinding {
            id: 113,
            parameter: Parameter::SpotGain,
        });

        assert!(config.validate().is_err());
    }

    #[test]
    fn image_mode_requires_path() {
        let mut config = AppConfig::default();
        config.render.light_mode = LightMode::Image;
        assert!(config.validate().is_err());

        config.image = Some(PathBuf::from("picture.png"));
        config.validate().unwrap();
    }

    #[test]
    fn frame_interval_follows_fps() {
        let fixture = FixtureConfig::default();
        assert_eq!(fixture.frame_interval(), Duration::from_millis(100));
    }
}
