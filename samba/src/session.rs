//! A replay session: one trace, one navigation state and the observers that render it.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    entity::{self, Communication, Participant},
    message::{self, EncryptedMessage, SecurityOptions},
    replay::{Chapter, CumulativeStep, PerArmDisplay, Position, Progress, ReplayState, Step},
    timing::TimeEstimator,
    trace::{Trace, Turn},
    Error,
};

/// Read-only view of a session, handed to observers after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The current chapter.
    pub chapter: Chapter,
    /// The current step, if the chapter has steps.
    pub step: Option<Step>,
    /// The absolute turn index, if defined.
    pub turn_index: Option<usize>,
    /// The turn addressed by `turn_index`.
    pub current_turn: Option<Turn>,
    /// Reward sum and pull count per arm.
    pub display: PerArmDisplay,
    /// The explanation of the current position.
    pub narration: String,
    /// `true` once the final step has been reached.
    pub terminal: bool,
}

/// Receives a [`Snapshot`] whenever the session changes.
pub trait ReplayObserver {
    /// Called after each state change.
    fn on_change(&mut self, snapshot: &Snapshot);
}

impl<F: FnMut(&Snapshot)> ReplayObserver for F {
    fn on_change(&mut self, snapshot: &Snapshot) {
        self(snapshot)
    }
}

/// Why a jump request did not move the replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoredInput {
    /// The input was blank.
    Empty,
    /// The input was not an integer.
    NotANumber(String),
    /// The turn lies outside `[1, budget - 1]`.
    OutOfRange(i64),
}

/// The result of a jump request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpOutcome {
    /// The replay walked `steps` positions to reach the requested turn.
    Moved {
        /// Number of single transitions performed.
        steps: usize,
    },
    /// The request was dropped without touching the state.
    Ignored(IgnoredInput),
}

/// Owns a validated trace and the replay state navigating it.
pub struct ReplaySession {
    trace: Trace,
    state: ReplayState,
    observers: Vec<Box<dyn ReplayObserver>>,
}

impl fmt::Debug for ReplaySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplaySession")
            .field("algorithm", &self.trace.algorithm)
            .field("position", &self.state.position())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ReplaySession {
    /// Validates `trace` and starts a session at the beginning of the replay.
    pub fn new(trace: Trace) -> Result<Self, Error> {
        trace.validate()?;
        let state = ReplayState::begin(&trace);
        Ok(Self {
            trace,
            state,
            observers: vec![],
        })
    }

    /// The trace being replayed.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// The current navigation state.
    pub fn state(&self) -> &ReplayState {
        &self.state
    }

    /// Registers an observer, notified after every subsequent change.
    pub fn subscribe(&mut self, observer: impl ReplayObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// The current state as seen by renderers.
    pub fn snapshot(&self) -> Snapshot {
        let position = self.state.position();
        Snapshot {
            chapter: self.state.chapter(),
            step: self.state.step(),
            turn_index: self.state.turn_index(&self.trace),
            current_turn: self.state.current_turn(&self.trace).cloned(),
            display: self.state.display().clone(),
            narration: position.narration().to_string(),
            terminal: self.state.is_terminal(),
        }
    }

    /// Moves one position forward. [`Progress::AtBoundary`] marks the end of the trace.
    pub fn advance(&mut self) -> Result<Progress, Error> {
        let (state, progress) = self.state.clone().advance(&self.trace)?;
        self.commit(state, progress);
        Ok(progress)
    }

    /// Moves one position backward.
    pub fn retreat(&mut self) -> Result<Progress, Error> {
        let (state, progress) = self.state.clone().retreat(&self.trace)?;
        self.commit(state, progress);
        Ok(progress)
    }

    /// Jumps to the turn typed by a user.
    ///
    /// The input is read like a typed number field: leading whitespace is skipped and the longest
    /// integer prefix is used, so `"4abc"` and `"3.0"` jump to turns 4 and 3. Input without a
    /// leading integer and out-of-range turns are ignored and leave the state untouched.
    pub fn jump_to(&mut self, input: &str) -> Result<JumpOutcome, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(JumpOutcome::Ignored(IgnoredInput::Empty));
        }
        match leading_integer(input) {
            Some(target) => self.jump_to_turn(target),
            None => {
                warn!(input, "ignoring jump to a non-numeric turn");
                Ok(JumpOutcome::Ignored(IgnoredInput::NotANumber(
                    input.to_string(),
                )))
            }
        }
    }

    /// Walks to the turn `target`, visiting every position in between.
    ///
    /// Targets outside `[1, budget - 1]` are ignored. The walk is computed before anything
    /// changes: a walk that cannot reach the target is an error and leaves the state where it
    /// was, a successful one notifies the observers once for every position visited.
    pub fn jump_to_turn(&mut self, target: i64) -> Result<JumpOutcome, Error> {
        let upper = self.trace.budget as i64 - 1;
        if target < 1 || target > upper {
            warn!(target, budget = self.trace.budget, "ignoring jump out of range");
            return Ok(JumpOutcome::Ignored(IgnoredInput::OutOfRange(target)));
        }
        let path = self
            .state
            .clone()
            .path_to(target as usize, &self.trace)?;
        let steps = path.len();
        debug!(target, steps, "jumped");
        for state in path {
            self.commit(state, Progress::Moved);
        }
        Ok(JumpOutcome::Moved { steps })
    }

    /// Skips straight to the start of the aggregation, without visiting the positions between.
    pub fn jump_to_cumulative_reward_phase(&mut self) -> Result<(), Error> {
        let position = Position::Cumulative {
            step: CumulativeStep::Step6,
        };
        let state = ReplayState::at(position, &self.trace)?;
        self.commit(state, Progress::Moved);
        Ok(())
    }

    /// Returns to the beginning of the replay, as done before presenting a trace.
    pub fn initialize_for_presentation(&mut self) {
        let state = ReplayState::begin(&self.trace);
        self.commit(state, Progress::Moved);
    }

    /// Replaces the trace and restarts the replay. On error the old session stays intact.
    pub fn reset(&mut self, trace: Trace) -> Result<(), Error> {
        trace.validate()?;
        self.state = ReplayState::begin(&trace);
        self.trace = trace;
        self.notify();
        Ok(())
    }

    /// Renders the message exchanged at `step` from the current state.
    pub fn render_message(
        &self,
        step: Step,
        focused_arm: usize,
        secure: bool,
        options: SecurityOptions,
    ) -> Result<EncryptedMessage, Error> {
        message::render_message(
            &self.state,
            &self.trace,
            step,
            focused_arm,
            secure,
            options,
        )
    }

    /// The exchanges to list at the current chapter.
    pub fn communications(&self, focused_arm: usize) -> Vec<Communication> {
        entity::visible_communications(self.state.chapter(), focused_arm)
    }

    /// The architecture links active at the current position.
    pub fn edges(&self) -> Vec<(Participant, Participant)> {
        entity::edges(&self.state.position(), self.trace.arm_count)
    }

    /// Time estimates for the replayed trace.
    pub fn estimator(&self) -> TimeEstimator<'_> {
        TimeEstimator::new(&self.trace)
    }

    fn commit(&mut self, state: ReplayState, progress: Progress) {
        if progress == Progress::AtBoundary {
            return;
        }
        self.state = state;
        self.notify();
    }

    fn notify(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for observer in self.observers.iter_mut() {
            observer.on_change(&snapshot);
        }
    }
}

/// The integer at the start of `input`, with an optional sign. Saturates on overflow.
fn leading_integer(input: &str) -> Option<i64> {
    let (negative, digits) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    let digits: Vec<i64> = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .map(|d| i64::from(d - b'0'))
        .collect();
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits
        .into_iter()
        .fold(0i64, |n, d| n.saturating_mul(10).saturating_add(d));
    Some(if negative { -magnitude } else { magnitude })
}

#[test]
fn test_leading_integer() {
    assert_eq!(leading_integer("4"), Some(4));
    assert_eq!(leading_integer("4abc"), Some(4));
    assert_eq!(leading_integer("3.0"), Some(3));
    assert_eq!(leading_integer("-2"), Some(-2));
    assert_eq!(leading_integer("+7 turns"), Some(7));
    assert_eq!(leading_integer("99999999999999999999"), Some(i64::MAX));
    assert_eq!(leading_integer("abc"), None);
    assert_eq!(leading_integer("-"), None);
    assert_eq!(leading_integer(".5"), None);
}
