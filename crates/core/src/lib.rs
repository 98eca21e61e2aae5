//! Core library for the LightDeck fixture driver.
//!
//! The crate owns the real-time part of the system: the animated light bank,
//! the control surface mutated by live MIDI input, the optional image
//! sampler, the per-frame render step and the 530-byte wire encoder, plus the
//! three loops (frame pump, drain, control) that tie them to a transport.
//! Device discovery and process setup live in the application crate.

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod frame;
pub mod lights;
pub mod mapping;
pub mod midi;
pub mod render;
pub mod sampler;
pub mod timeline;
pub mod transport;

pub use config::{
    AppConfig, ControlConfig, ControllerBinding, FixtureConfig, LightLayout, LightMode,
    RenderConfig, SpotRange,
};
pub use control::{ControlSurface, Parameter};
pub use engine::{AnimationState, Engine};
pub use error::{LightDeckError, Result};
pub use frame::{encode, ChannelBuffer, WireFrame, CHANNELS, FRAME_LEN};
pub use lights::{Color, Light, LightBank, LightBytes};
pub use mapping::{ControlDispatcher, ControlEvent, ControlSource, ControllerMap, Dispatch, NoteMap};
pub use midi::{MidiParser, MidiSource};
pub use render::{LightSource, Renderer};
pub use sampler::ImageSampler;
pub use timeline::{
    run_control_loop, DrainLoop, FramePump, LoopReport, LoopState, StrikeCounter, STRIKE_BUDGET,
};
pub use transport::{DrainSource, FrameSink, NullTransport, ReaderSource, WriterSink};
