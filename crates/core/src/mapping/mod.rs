use std::sync::mpsc::Receiver;

use crate::{config::ControlConfig, control::Parameter, engine::Engine, Result};

/// Typed performance event as delivered by a control source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    Controller { channel: u8, id: u8, value: u8 },
    /// Anything else the source understood but the engine has no use for.
    Other,
}

/// Blocking pull of control events. `None` means the source is closed.
pub trait ControlSource: Send {
    fn next_event(&mut self) -> Option<ControlEvent>;
}

impl ControlSource for Receiver<ControlEvent> {
    fn next_event(&mut self) -> Option<ControlEvent> {
        self.recv().ok()
    }
}

impl<T: ControlSource + ?Sized> ControlSource for Box<T> {
    fn next_event(&mut self) -> Option<ControlEvent> {
        (**self).next_event()
    }
}

/// Note number to light index table covering a contiguous key range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteMap {
    base: u8,
    slots: Vec<Option<usize>>,
}

impl NoteMap {
    pub fn new(base: u8, slots: impl IntoIterator<Item = Option<usize>>) -> Self {
        Self {
            base,
            slots: slots.into_iter().collect(),
        }
    }

    pub fn light_for(&self, note: u8) -> Option<usize> {
        let slot = note.checked_sub(self.base)?;
        self.slots.get(usize::from(slot)).copied().flatten()
    }
}

/// Controller number to parameter table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerMap {
    table: [Option<Parameter>; 128],
}

impl ControllerMap {
    pub fn new(bindings: impl IntoIterator<Item = (u8, Parameter)>) -> Self {
        let mut table = [None; 128];
        for (id, parameter) in bindings {
            if let Some(slot) = table.get_mut(usize::from(id)) {
                *slot = Some(parameter);
            }
        }
        Self { table }
    }

    pub fn parameter_for(&self, id: u8) -> Option<Parameter> {
        self.table.get(usize::from(id)).copied().flatten()
    }
}

/// What a dispatched event did to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dispatch {
    Triggered { light: usize, velocity: u8 },
    ParameterSet { parameter: Parameter, value: f32 },
    Ignored,
}

/// Routes control events to light triggers and parameter changes.
#[derive(Debug, Clone)]
pub struct ControlDispatcher {
    channel: u8,
    notes: NoteMap,
    controllers: ControllerMap,
}

impl ControlDispatcher {
    pub fn new(channel: u8, notes: NoteMap, controllers: ControllerMap) -> Self {
        Self {
            channel,
            notes,
            controllers,
        }
    }

    pub fn from_config(config: &ControlConfig) -> Self {
        let notes = NoteMap::new(
            config.note_base,
            config.note_map.iter().map(|slot| slot.map(usize::from)),
        );
        let controllers = ControllerMap::new(
            config
                .controllers
                .iter()
                .map(|binding| (binding.id, binding.parameter)),
        );
        Self::new(config.channel, notes, controllers)
    }

    /// Applies one event under a single state lock.
    pub fn dispatch(&self, event: ControlEvent, engine: &Engine) -> Result<Dispatch> {
        let outcome = match event {
            ControlEvent::NoteOn {
                channel,
                note,
                velocity,
            } => match self.notes.light_for(note) {
                Some(light) if channel == self.channel => {
                    if engine.with_state(|state| state.trigger(light, velocity))? {
                        Dispatch::Triggered { light, velocity }
                    } else {
                        Dispatch::Ignored
                    }
                }
                _ => Dispatch::Ignored,
            },
            ControlEvent::Controller { id, value, .. } => match self.controllers.parameter_for(id) {
                Some(parameter) => {
                    let value = engine.with_state(|state| state.set_parameter(parameter, value))?;
                    Dispatch::ParameterSet { parameter, value }
                }
                None => Dispatch::Ignored,
            },
            ControlEvent::Other => Dispatch::Ignored,
        };

        match outcome {
            Dispatch::Ignored => tracing::debug!(?event, "ignored control event"),
            _ => tracing::debug!(?event, ?outcome, "control event"),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        lights::Color,
        render::LightSource,
    };

    fn setup() -> (ControlDispatcher, Engine) {
        let config = AppConfig::default();
        (
            ControlDispatcher::from_config(&config.control),
            Engine::new(&config, LightSource::Hidden),
        )
    }

    fn note(note: u8, velocity: u8) -> ControlEvent {
        ControlEvent::NoteOn {
            channel: 0,
            note,
            velocity,
        }
    }

    #[test]
    fn note_map_resolves_keyboard_slots() {
        let notes = ControlDispatcher::from_config(&ControlConfig::default()).notes;

        assert_eq!(notes.light_for(60), None);
        assert_eq!(notes.light_for(65), Some(0));
        assert_eq!(notes.light_for(66), Some(4));
        assert_eq!(notes.light_for(71), Some(3));
        assert_eq!(notes.light_for(73), Some(7));
        assert_eq!(notes.light_for(85), Some(7));
        assert_eq!(notes.light_for(86), None);
        assert_eq!(notes.light_for(59), None);
        assert_eq!(notes.light_for(0), None);
    }

    #[test]
    fn mapped_note_triggers_light() {
        let (dispatcher, engine) = setup();

        let outcome = dispatcher.dispatch(note(65, 100), &engine).unwrap();

        assert_eq!(
            outcome,
            Dispatch::Triggered {
                light: 0,
                velocity: 100
            }
        );
        let color = engine
            .with_state(|state| state.lights.get(0).map(|light| light.color))
            .unwrap();
        assert_eq!(color, Some(Color::RED));
    }

    #[test]
    fn unmapped_or_foreign_notes_are_ignored() {
        let (dispatcher, engine) = setup();

        assert_eq!(dispatcher.dispatch(note(60, 100), &engine).unwrap(), Dispatch::Ignored);
        assert_eq!(dispatcher.dispatch(note(127, 100), &engine).unwrap(), Dispatch::Ignored);
        let other_channel = ControlEvent::NoteOn {
            channel: 3,
            note: 65,
            velocity: 100,
        };
        assert_eq!(dispatcher.dispatch(other_channel, &engine).unwrap(), Dispatch::Ignored);
        assert_eq!(dispatcher.dispatch(ControlEvent::Other, &engine).unwrap(), Dispatch::Ignored);

        let untouched = engine
            .with_state(|state| state.lights.iter().all(|light| light.color == Color::BLACK))
            .unwrap();
        assert!(untouched);
    }

    #[test]
    fn decay_controller_sets_offset_value() {
        let (dispatcher, engine) = setup();
        let event = ControlEvent::Controller {
            channel: 0,
            id: 113,
            value: 10,
        };

        let outcome = dispatcher.dispatch(event, &engine).unwrap();

        assert_eq!(
            outcome,
            Dispatch::ParameterSet {
                parameter: Parameter::Decay,
                value: 11.0
            }
        );
        assert_eq!(engine.with_state(|state| state.controls.decay()).unwrap(), 11.0);
    }

    #[test]
    fn gain_controllers_are_unit_scaled() {
        let (dispatcher, engine) = setup();
        for (id, value) in [(114, 127), (117, 0), (116, 127)] {
            dispatcher
                .dispatch(ControlEvent::Controller { channel: 9, id, value }, &engine)
                .unwrap();
        }

        engine
            .with_state(|state| {
                assert_eq!(state.controls.light_gain(), 1.0);
                assert_eq!(state.controls.spot_gain(), 0.0);
                assert_eq!(state.controls.sample_speed(), 1.0);
            })
            .unwrap();
    }

    #[test]
    fn unknown_controllers_are_ignored() {
        let (dispatcher, engine) = setup();
        let event = ControlEvent::Controller {
            channel: 0,
            id: 1,
            value: 64,
        };

        assert_eq!(dispatcher.dispatch(event, &engine).unwrap(), Dispatch::Ignored);
        assert_eq!(engine.with_state(|state| state.controls.clone()).unwrap(), Default::default());
    }

    #[test]
    fn receiver_acts_as_control_source() {
        let (tx, mut rx) = std::sync::mpsc::channel();
        tx.send(ControlEvent::Other).unwrap();
        drop(tx);

        assert_eq!(rx.next_event(), Some(ControlEvent::Other));
        assert_eq!(rx.next_event(), None);
    }
}
