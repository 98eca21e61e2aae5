use std::{
    thread,
    time::{Duration, Instant},
};

use crate::{
    config::AppConfig,
    engine::Engine,
    frame::encode,
    mapping::{ControlDispatcher, ControlSource},
    transport::{DrainSource, FrameSink},
    LightDeckError, Result,
};

/// Consecutive transport failures tolerated before a loop gives up.
pub const STRIKE_BUDGET: u8 = 3;
/// Receive buffer of the drain loop.
pub const DRAIN_BUFFER: usize = 1024;

/// Health of a transport loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Retrying { strikes_left: u8 },
    /// Terminal: the loop stops touching the transport.
    Failed,
}

/// Counts consecutive failures; any success restores the full budget.
#[derive(Debug, Clone)]
pub struct StrikeCounter {
    budget: u8,
    left: u8,
}

impl StrikeCounter {
    pub fn new(budget: u8) -> Self {
        let budget = budget.max(1);
        Self {
            budget,
            left: budget,
        }
    }

    pub fn state(&self) -> LoopState {
        if self.left == 0 {
            LoopState::Failed
        } else if self.left < self.budget {
            LoopState::Retrying {
                strikes_left: self.left,
            }
        } else {
            LoopState::Running
        }
    }

    pub fn record_success(&mut self) -> LoopState {
        if self.left > 0 {
            self.left = self.budget;
        }
        self.state()
    }

    pub fn record_failure(&mut self) -> LoopState {
        self.left = self.left.saturating_sub(1);
        self.state()
    }
}

impl Default for StrikeCounter {
    fn default() -> Self {
        Self::new(STRIKE_BUDGET)
    }
}

/// Summary returned when a loop terminates.
#[derive(Debug)]
pub struct LoopReport {
    pub name: &'static str,
    pub iterations: u64,
    pub last_error: Option<LightDeckError>,
}

/// Renders, encodes and sends one frame per tick.
pub struct FramePump<S> {
    engine: Engine,
    sink: S,
    strikes: StrikeCounter,
    interval: Duration,
    frames_per_refresh: u64,
    iterations: u64,
    last_error: Option<LightDeckError>,
}

impl<S: FrameSink> FramePump<S> {
    pub fn new(engine: Engine, sink: S, config: &AppConfig) -> Self {
        Self {
            engine,
            sink,
            strikes: StrikeCounter::default(),
            interval: config.fixture.frame_interval(),
            frames_per_refresh: config.render.frames_per_refresh(config.fixture.fps),
            iterations: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.strikes.state()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// One cycle without pacing. Does nothing once the pump has failed.
    pub fn step(&mut self) -> LoopState {
        if self.state() == LoopState::Failed {
            return LoopState::Failed;
        }
        self.iterations += 1;

        let buffer = match self.engine.render_frame() {
            Ok(buffer) => buffer,
            Err(err) => return self.abort(err),
        };
        let frame = encode(&buffer);

        let state = match self.sink.send(&frame) {
            Ok(()) => {
                tracing::trace!(frame = self.iterations, "frame sent");
                self.strikes.record_success()
            }
            Err(err) => {
                let state = self.strikes.record_failure();
                tracing::warn!(%err, ?state, "frame send failed");
                self.last_error = Some(err);
                state
            }
        };
        if state == LoopState::Failed {
            return state;
        }

        let refresh = self.frames_per_refresh > 0 && self.iterations % self.frames_per_refresh == 0;
        if let Err(err) = self.engine.finish_frame(refresh) {
            return self.abort(err);
        }
        state
    }

    /// Steps at the configured frame rate until the pump fails.
    pub fn run(mut self) -> LoopReport {
        tracing::info!(interval = ?self.interval, "frame pump started");
        let mut deadline = Instant::now();

        while self.step() != LoopState::Failed {
            deadline += self.interval;
            let now = Instant::now();
            match deadline.checked_duration_since(now) {
                Some(wait) => thread::sleep(wait),
                // Running late: resynchronise instead of bursting.
                None => deadline = now,
            }
        }

        let report = LoopReport {
            name: "frame pump",
            iterations: self.iterations,
            last_error: self.last_error,
        };
        tracing::error!(iterations = report.iterations, error = ?report.last_error, "frame pump failed");
        report
    }

    fn abort(&mut self, err: LightDeckError) -> LoopState {
        tracing::error!(%err, "frame pump cannot render");
        self.last_error = Some(err);
        self.strikes = StrikeCounter {
            budget: self.strikes.budget,
            left: 0,
        };
        LoopState::Failed
    }
}

/// Keeps the inbound side of the fixture channel empty.
pub struct DrainLoop<S> {
    source: S,
    strikes: StrikeCounter,
    iterations: u64,
    received: u64,
    last_error: Option<LightDeckError>,
}

impl<S: DrainSource> DrainLoop<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            strikes: StrikeCounter::default(),
            iterations: 0,
            received: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.strikes.state()
    }

    /// Total bytes discarded so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn step(&mut self) -> LoopState {
        if self.state() == LoopState::Failed {
            return LoopState::Failed;
        }
        self.iterations += 1;

        let mut buffer = [0u8; DRAIN_BUFFER];
        match self.source.receive(&mut buffer) {
            Ok(read) => {
                self.received += read as u64;
                self.strikes.record_success()
            }
            Err(err) => {
                let state = self.strikes.record_failure();
                tracing::warn!(%err, ?state, "drain receive failed");
                self.last_error = Some(err);
                state
            }
        }
    }

    pub fn run(mut self) -> LoopReport {
        tracing::info!("drain loop started");
        while self.step() != LoopState::Failed {}

        let report = LoopReport {
            name: "drain loop",
            iterations: self.iterations,
            last_error: self.last_error,
        };
        tracing::error!(iterations = report.iterations, error = ?report.last_error, "drain loop failed");
        report
    }
}

/// Dispatches events until the source closes; returns how many were handled.
pub fn run_control_loop<C: ControlSource + ?Sized>(
    source: &mut C,
    dispatcher: &ControlDispatcher,
    engine: &Engine,
) -> Result<u64> {
    tracing::info!("control loop started");
    let mut handled = 0;
    while let Some(event) = source.next_event() {
        dispatcher.dispatch(event, engine)?;
        handled += 1;
    }
    tracing::info!(handled, "control source closed");
    Ok(handled)
}
