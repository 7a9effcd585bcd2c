//! Frame loop state machine and time stepping.
//!
//! ```text
//!   Uninitialized ──start()──▶ Running ◀──resume()── Suspended
//!                                 │  └────suspend()────▶ │
//!                                 └──────stop()──────────┴──▶ Stopped
//! ```
//!
//! Commands arrive through a [`LoopHandle`] and are applied at the next
//! frame boundary, so a tick is never interrupted half way.

use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::backend::Backend;
use crate::error::FluidError;
use crate::simulation::{FluidSimulation, FrameOutcome};
use crate::types::{TimeStep, FIXED_TIME_STEP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Running,
    Suspended,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopCommand {
    Suspend,
    Resume,
    Stop,
}

/// Cloneable, thread-safe control over a [`FrameLoop`].
#[derive(Debug, Clone)]
pub struct LoopHandle {
    sender: Sender<LoopCommand>,
}

impl LoopHandle {
    pub fn suspend(&self) {
        self.send(LoopCommand::Suspend);
    }

    pub fn resume(&self) {
        self.send(LoopCommand::Resume);
    }

    pub fn stop(&self) {
        self.send(LoopCommand::Stop);
    }

    fn send(&self, command: LoopCommand) {
        if self.sender.send(command).is_err() {
            tracing::debug!(?command, "frame loop already dropped");
        }
    }
}

/// What a call to [`FrameLoop::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Simulated, but the surface could not be drawn this time.
    Skipped,
    /// Not running (uninitialised or suspended); nothing happened.
    Idle,
    Stopped,
}

/// Turns wall-clock frame times into simulation steps.
#[derive(Debug, Clone)]
pub struct FrameClock {
    step: TimeStep,
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new(step: TimeStep) -> Self {
        Self { step, last: None }
    }

    /// Forgets the previous frame so the next interval is not measured
    /// across a pause.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn next_dt(&mut self, now: Instant) -> f32 {
        let previous = self.last.replace(now);
        match self.step {
            TimeStep::Fixed { dt } => dt,
            TimeStep::Measured { max } => match previous {
                Some(previous) => now.saturating_duration_since(previous).min(max).as_secs_f32(),
                None => FIXED_TIME_STEP.min(max.as_secs_f32()),
            },
        }
    }
}

pub struct FrameLoop {
    state: LoopState,
    clock: FrameClock,
    sender: Sender<LoopCommand>,
    commands: Receiver<LoopCommand>,
    frames: u64,
}

impl FrameLoop {
    pub fn new(step: TimeStep) -> Self {
        let (sender, commands) = unbounded();
        Self {
            state: LoopState::Uninitialized,
            clock: FrameClock::new(step),
            sender,
            commands,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of frames that ran the simulation.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
        }
    }

    /// Initialises `simulation` (if needed) and starts running.
    pub fn start<B: Backend>(
        &mut self,
        simulation: &mut FluidSimulation<B>,
    ) -> Result<LoopHandle, FluidError> {
        if self.state == LoopState::Uninitialized {
            if !simulation.is_initialized() {
                simulation.initialize()?;
            }
            self.clock.reset();
            self.state = LoopState::Running;
            tracing::debug!("frame loop started");
        }
        Ok(self.handle())
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            let next = match (self.state, command) {
                (LoopState::Stopped, _) => LoopState::Stopped,
                (_, LoopCommand::Stop) => LoopState::Stopped,
                (LoopState::Running, LoopCommand::Suspend) => LoopState::Suspended,
                (LoopState::Suspended, LoopCommand::Resume) => {
                    self.clock.reset();
                    LoopState::Running
                }
                (state, _) => state,
            };
            if next != self.state {
                tracing::debug!(from = ?self.state, to = ?next, "frame loop state change");
                self.state = next;
            }
        }
    }

    /// Runs one frame if the loop is running.
    ///
    /// A frame that fails with a non-transient error stops the loop.
    pub fn tick<B: Backend>(
        &mut self,
        simulation: &mut FluidSimulation<B>,
        now: Instant,
    ) -> Result<FrameStatus, FluidError> {
        self.apply_commands();
        match self.state {
            LoopState::Uninitialized | LoopState::Suspended => return Ok(FrameStatus::Idle),
            LoopState::Stopped => return Ok(FrameStatus::Stopped),
            LoopState::Running => {}
        }

        let dt = self.clock.next_dt(now);
        match simulation.frame(dt) {
            Ok(outcome) => {
                self.frames += 1;
                Ok(match outcome {
                    FrameOutcome::Presented => FrameStatus::Presented,
                    FrameOutcome::Skipped => FrameStatus::Skipped,
                })
            }
            Err(err) => {
                tracing::error!(error = %err, "frame failed; stopping the loop");
                self.state = LoopState::Stopped;
                Err(err)
            }
        }
    }
}
