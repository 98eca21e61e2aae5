//! Decoder for raw MIDI 1.0 byte streams, as produced by a rawmidi device
//! node or a pipe.

use std::{
    collections::VecDeque,
    io::{ErrorKind, Read},
};

use crate::mapping::{ControlEvent, ControlSource};

const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const PROGRAM_CHANGE: u8 = 0xC0;
const CHANNEL_PRESSURE: u8 = 0xD0;
const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;
const REALTIME: u8 = 0xF8;

/// Incremental parser with running-status support.
#[derive(Debug, Clone, Default)]
pub struct MidiParser {
    running: Option<u8>,
    data: [u8; 2],
    len: usize,
    in_sysex: bool,
}

impl MidiParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte; returns an event once a channel message is complete.
    pub fn push(&mut self, byte: u8) -> Option<ControlEvent> {
        if byte >= REALTIME {
            // Real-time bytes may appear anywhere and carry no state.
            return None;
        }

        if byte & 0x80 != 0 {
            self.len = 0;
            match byte {
                SYSEX_START => {
                    self.in_sysex = true;
                    self.running = None;
                }
                SYSEX_END => self.in_sysex = false,
                0xF1..=0xF6 => {
                    self.in_sysex = false;
                    self.running = None;
                }
                _ => {
                    self.in_sysex = false;
                    self.running = Some(byte);
                }
            }
            return None;
        }

        if self.in_sysex {
            return None;
        }
        let status = self.running?;

        self.data[self.len] = byte;
        self.len += 1;
        if self.len < data_len(status) {
            return None;
        }
        self.len = 0;

        let channel = status & 0x0F;
        let event = match status & 0xF0 {
            NOTE_ON => ControlEvent::NoteOn {
                channel,
                note: self.data[0],
                velocity: self.data[1],
            },
            CONTROL_CHANGE => ControlEvent::Controller {
                channel,
                id: self.data[0],
                value: self.data[1],
            },
            _ => ControlEvent::Other,
        };
        Some(event)
    }
}

fn data_len(status: u8) -> usize {
    match status & 0xF0 {
        PROGRAM_CHANGE | CHANNEL_PRESSURE => 1,
        _ => 2,
    }
}

/// Control source decoding MIDI from any byte reader.
pub struct MidiSource<R> {
    reader: R,
    parser: MidiParser,
    pending: VecDeque<ControlEvent>,
}

impl<R: Read + Send> MidiSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: MidiParser::new(),
            pending: VecDeque::new(),
        }
    }
}

impl<R: Read + Send> ControlSource for MidiSource<R> {
    fn next_event(&mut self) -> Option<ControlEvent> {
        let mut buffer = [0u8; 64];
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            let read = match self.reader.read(&mut buffer) {
                Ok(0) => return None,
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(%err, "MIDI input failed");
                    return None;
                }
            };

            for &byte in &buffer[..read] {
                if let Some(event) = self.parser.push(byte) {
                    self.pending.push_back(event);
                }
            }
        }
    }
}

impl<R> std::fmt::Debug for MidiSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiSource")
            .field("parser", &self.parser)
            .field("pending", &self.pending.len())
            .finish()
    }
}
