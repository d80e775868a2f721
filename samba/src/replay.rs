//! The replay state machine.
//!
//! A replay walks a total order of protocol positions:
//!
//! ```text
//! Begin < InitialExploration
//!       < Core(arm_count, Step2) < ... < Core(arm_count, Step5)
//!       < Core(arm_count + 1, Step2) < ... < Core(budget, Step5)
//!       < Cumulative(Step6) < Cumulative(Step7)
//! ```
//!
//! Every transition consumes a [`ReplayState`] and returns a fresh one. The per-arm display is
//! derived from the position and the trace on every transition and is never edited on its own.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    trace::{Trace, TraceError, Turn},
    Error,
};

/// Coarse phase of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Chapter {
    /// Nothing has happened yet.
    Begin,
    /// Every arm is pulled once.
    InitialExploration,
    /// The main loop: score upload, selection and notification.
    CoreOfProtocol,
    /// Aggregation of the final cumulative reward.
    CumulativeRewardComputation,
}

impl fmt::Display for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Chapter::Begin => "BEGIN",
            Chapter::InitialExploration => "INITIAL_EXPLORATION",
            Chapter::CoreOfProtocol => "CORE_OF_PROTOCOL",
            Chapter::CumulativeRewardComputation => "CUMULATIVE_REWARD_COMPUTATION",
        })
    }
}

/// A single simulated message exchange, ordered `Step2 < ... < Step7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    /// Each data owner sends its score to the Controller.
    Step2,
    /// The Controller forwards all scores to Comp.
    Step3,
    /// Comp returns the selection bits to the Controller.
    Step4,
    /// The Controller notifies every data owner.
    Step5,
    /// Each data owner sends its partial cumulative reward to the Controller.
    Step6,
    /// The Controller sends the cumulative reward to the data customer.
    Step7,
}

impl Step {
    /// All steps in protocol order.
    pub const ALL: [Step; 6] = [
        Step::Step2,
        Step::Step3,
        Step::Step4,
        Step::Step5,
        Step::Step6,
        Step::Step7,
    ];

    /// The chapter this step belongs to.
    pub fn chapter(&self) -> Chapter {
        match self {
            Step::Step2 | Step::Step3 | Step::Step4 | Step::Step5 => Chapter::CoreOfProtocol,
            Step::Step6 | Step::Step7 => Chapter::CumulativeRewardComputation,
        }
    }

    /// The step number used in the protocol description.
    pub fn number(&self) -> u8 {
        match self {
            Step::Step2 => 2,
            Step::Step3 => 3,
            Step::Step4 => 4,
            Step::Step5 => 5,
            Step::Step6 => 6,
            Step::Step7 => 7,
        }
    }

    /// The step with the given number, e.g. `Step::Step3` for 3.
    pub fn from_number(number: u8) -> Option<Step> {
        Step::ALL.iter().copied().find(|s| s.number() == number)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STEP_{}", self.number())
    }
}

/// Steps of the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoreStep {
    /// See [`Step::Step2`].
    Step2,
    /// See [`Step::Step3`].
    Step3,
    /// See [`Step::Step4`].
    Step4,
    /// See [`Step::Step5`].
    Step5,
}

impl CoreStep {
    fn next(self) -> Option<CoreStep> {
        match self {
            CoreStep::Step2 => Some(CoreStep::Step3),
            CoreStep::Step3 => Some(CoreStep::Step4),
            CoreStep::Step4 => Some(CoreStep::Step5),
            CoreStep::Step5 => None,
        }
    }

    fn previous(self) -> Option<CoreStep> {
        match self {
            CoreStep::Step2 => None,
            CoreStep::Step3 => Some(CoreStep::Step2),
            CoreStep::Step4 => Some(CoreStep::Step3),
            CoreStep::Step5 => Some(CoreStep::Step4),
        }
    }
}

/// Steps of the final aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CumulativeStep {
    /// See [`Step::Step6`].
    Step6,
    /// See [`Step::Step7`].
    Step7,
}

impl From<CoreStep> for Step {
    fn from(s: CoreStep) -> Step {
        match s {
            CoreStep::Step2 => Step::Step2,
            CoreStep::Step3 => Step::Step3,
            CoreStep::Step4 => Step::Step4,
            CoreStep::Step5 => Step::Step5,
        }
    }
}

impl From<CumulativeStep> for Step {
    fn from(s: CumulativeStep) -> Step {
        match s {
            CumulativeStep::Step6 => Step::Step6,
            CumulativeStep::Step7 => Step::Step7,
        }
    }
}

/// A reachable point of the replay.
///
/// Only legal `(chapter, step, turn_index)` combinations can be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    /// Before the protocol starts.
    Begin,
    /// During the one-pull-per-arm warm-up.
    InitialExploration,
    /// Inside the main loop, at the turn addressed by `turn_index`.
    Core {
        /// Absolute turn index in `[arm_count, budget]`.
        turn_index: usize,
        /// The exchange being shown.
        step: CoreStep,
    },
    /// During the final aggregation.
    Cumulative {
        /// The exchange being shown.
        step: CumulativeStep,
    },
}

impl Position {
    /// The coarse phase of this position.
    pub fn chapter(&self) -> Chapter {
        match self {
            Position::Begin => Chapter::Begin,
            Position::InitialExploration => Chapter::InitialExploration,
            Position::Core { .. } => Chapter::CoreOfProtocol,
            Position::Cumulative { .. } => Chapter::CumulativeRewardComputation,
        }
    }

    /// The fine-grained step, if the chapter has one.
    pub fn step(&self) -> Option<Step> {
        match self {
            Position::Begin | Position::InitialExploration => None,
            Position::Core { step, .. } => Some((*step).into()),
            Position::Cumulative { step } => Some((*step).into()),
        }
    }

    /// The absolute turn index. The aggregation chapter refers to the last turn, `budget`.
    pub fn turn_index(&self, trace: &Trace) -> Option<usize> {
        match self {
            Position::Begin | Position::InitialExploration => None,
            Position::Core { turn_index, .. } => Some(*turn_index),
            Position::Cumulative { .. } => Some(trace.budget),
        }
    }

    /// The explanation shown alongside this position.
    pub fn narration(&self) -> &'static str {
        match self {
            Position::Begin => "",
            Position::InitialExploration => "Each node is pulled one time",
            Position::Core { step, .. } => match step {
                CoreStep::Step2 => "Each node sends his score to Controller",
                CoreStep::Step3 => "Controller sends scores to Comp",
                CoreStep::Step4 => "Comp sends selection bits to Controller",
                CoreStep::Step5 => "Controller sends selection bit to each Node",
            },
            Position::Cumulative { step } => match step {
                CumulativeStep::Step6 => {
                    "Each node sends his partial cumulative reward to Controller"
                }
                CumulativeStep::Step7 => "Controller sends cumulative reward to Customer",
            },
        }
    }

    /// The next position, or `None` at the end of the replay.
    pub fn next(&self, trace: &Trace) -> Option<Position> {
        let next = match *self {
            Position::Begin => Position::InitialExploration,
            Position::InitialExploration => Position::Core {
                turn_index: trace.arm_count,
                step: CoreStep::Step2,
            },
            Position::Core { turn_index, step } => match step.next() {
                Some(step) => Position::Core { turn_index, step },
                None if turn_index < trace.budget => Position::Core {
                    turn_index: turn_index + 1,
                    step: CoreStep::Step2,
                },
                None => Position::Cumulative {
                    step: CumulativeStep::Step6,
                },
            },
            Position::Cumulative {
                step: CumulativeStep::Step6,
            } => Position::Cumulative {
                step: CumulativeStep::Step7,
            },
            Position::Cumulative {
                step: CumulativeStep::Step7,
            } => return None,
        };
        Some(next)
    }

    /// The previous position, or `None` at the start of the replay.
    pub fn previous(&self, trace: &Trace) -> Option<Position> {
        let previous = match *self {
            Position::Begin => return None,
            Position::InitialExploration => Position::Begin,
            Position::Core { turn_index, step } => match step.previous() {
                Some(step) => Position::Core { turn_index, step },
                None if turn_index == trace.arm_count => Position::InitialExploration,
                None => Position::Core {
                    turn_index: turn_index - 1,
                    step: CoreStep::Step5,
                },
            },
            Position::Cumulative {
                step: CumulativeStep::Step6,
            } => Position::Core {
                turn_index: trace.budget,
                step: CoreStep::Step5,
            },
            Position::Cumulative {
                step: CumulativeStep::Step7,
            } => Position::Cumulative {
                step: CumulativeStep::Step6,
            },
        };
        Some(previous)
    }
}

/// The reward sum and pull count shown for every arm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerArmDisplay {
    /// Reward sum per arm.
    pub rewards: Vec<f64>,
    /// Pull count per arm.
    pub pulls: Vec<u32>,
}

impl PerArmDisplay {
    /// Derives the display of `position` from the trace.
    ///
    /// Steps 2 to 4 show the state before the turn's pull, step 5 the state after it.
    pub fn derive(position: &Position, trace: &Trace) -> Result<PerArmDisplay, Error> {
        let display = match position {
            Position::Begin => PerArmDisplay {
                rewards: vec![0.0; trace.arm_count],
                pulls: vec![0; trace.arm_count],
            },
            Position::InitialExploration => PerArmDisplay {
                rewards: trace.initial_exploration.rewards.clone(),
                pulls: trace.initial_exploration.pulls.clone(),
            },
            Position::Core {
                turn_index,
                step: CoreStep::Step5,
            } => {
                let turn = turn_at(trace, *turn_index)?;
                PerArmDisplay::after(turn)
            }
            Position::Core { turn_index, .. } => {
                let turn = turn_at(trace, *turn_index)?;
                PerArmDisplay::before(turn).ok_or(TraceError::InconsistentPulls {
                    turn_index: *turn_index,
                })?
            }
            Position::Cumulative { .. } => {
                let turn = turn_at(trace, trace.budget)?;
                PerArmDisplay::after(turn)
            }
        };
        Ok(display)
    }

    fn after(turn: &Turn) -> PerArmDisplay {
        PerArmDisplay {
            rewards: turn.cumulative_rewards.clone(),
            pulls: turn.cumulative_pulls.clone(),
        }
    }

    /// The state before the turn's pull, or `None` if the turn's vectors cannot contain it.
    fn before(turn: &Turn) -> Option<PerArmDisplay> {
        let selected = turn.selected_arm;
        let rewards = turn
            .cumulative_rewards
            .iter()
            .enumerate()
            .map(|(arm, &r)| if arm == selected { r - turn.reward } else { r })
            .collect();
        let pulls = turn
            .cumulative_pulls
            .iter()
            .enumerate()
            .map(|(arm, &p)| if arm == selected { p.checked_sub(1) } else { Some(p) })
            .collect::<Option<Vec<u32>>>()?;
        if selected >= pulls.len() {
            return None;
        }
        Some(PerArmDisplay { rewards, pulls })
    }

    /// The sum of all displayed rewards.
    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }
}

fn turn_at(trace: &Trace, turn_index: usize) -> Result<&Turn, Error> {
    trace
        .turn(turn_index)
        .ok_or(Error::MissingTurn { turn_index })
}

/// Whether a transition moved the replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The replay moved to a new position.
    Moved,
    /// The replay was already at the boundary; nothing changed.
    AtBoundary,
}

/// The navigation state of one replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayState {
    position: Position,
    display: PerArmDisplay,
}

impl ReplayState {
    /// The state before the protocol starts.
    pub fn begin(trace: &Trace) -> ReplayState {
        ReplayState {
            position: Position::Begin,
            display: PerArmDisplay {
                rewards: vec![0.0; trace.arm_count],
                pulls: vec![0; trace.arm_count],
            },
        }
    }

    /// Builds the state at an arbitrary position.
    ///
    /// This bypasses the stepwise traversal and is reserved for explicit shortcuts.
    pub fn at(position: Position, trace: &Trace) -> Result<ReplayState, Error> {
        if let Position::Core { turn_index, .. } = position {
            if turn_index < trace.arm_count || turn_index > trace.budget {
                return Err(Error::MissingTurn { turn_index });
            }
        }
        let display = PerArmDisplay::derive(&position, trace)?;
        Ok(ReplayState { position, display })
    }

    /// The current position.
    pub fn position(&self) -> Position {
        self.position
    }

    /// The current chapter.
    pub fn chapter(&self) -> Chapter {
        self.position.chapter()
    }

    /// The current step, if any.
    pub fn step(&self) -> Option<Step> {
        self.position.step()
    }

    /// The current absolute turn index, if any.
    pub fn turn_index(&self, trace: &Trace) -> Option<usize> {
        self.position.turn_index(trace)
    }

    /// The turn referenced by the current turn index.
    pub fn current_turn<'t>(&self, trace: &'t Trace) -> Option<&'t Turn> {
        self.turn_index(trace).and_then(|i| trace.turn(i))
    }

    /// The per-arm display of the current position.
    pub fn display(&self) -> &PerArmDisplay {
        &self.display
    }

    /// Returns `true` once the final step has been reached.
    pub fn is_terminal(&self) -> bool {
        self.position
            == Position::Cumulative {
                step: CumulativeStep::Step7,
            }
    }

    /// Moves one position forward.
    ///
    /// At the final step the state is returned unchanged with [`Progress::AtBoundary`], which is
    /// the signal for auto-play to stop.
    pub fn advance(self, trace: &Trace) -> Result<(ReplayState, Progress), Error> {
        match self.position.next(trace) {
            Some(position) => Ok((self.move_to(position, trace)?, Progress::Moved)),
            None => Ok((self, Progress::AtBoundary)),
        }
    }

    /// Moves one position backward. Retreating from [`Position::Begin`] changes nothing.
    pub fn retreat(self, trace: &Trace) -> Result<(ReplayState, Progress), Error> {
        match self.position.previous(trace) {
            Some(position) => Ok((self.move_to(position, trace)?, Progress::Moved)),
            None => Ok((self, Progress::AtBoundary)),
        }
    }

    fn move_to(self, position: Position, trace: &Trace) -> Result<ReplayState, Error> {
        debug!(from = ?self.position, to = ?position, "replay transition");
        ReplayState::at(position, trace)
    }

    /// Steps forward or backward until the turn index equals `target`.
    ///
    /// Every intermediate position is visited. The state must already have a turn index, and the
    /// walk fails once it exceeds the number of positions in the trace.
    pub fn walk_to(self, target: usize, trace: &Trace) -> Result<(ReplayState, usize), Error> {
        let start = self.clone();
        let mut path = self.path_to(target, trace)?;
        let steps = path.len();
        Ok((path.pop().unwrap_or(start), steps))
    }

    /// Like [`ReplayState::walk_to`], but returns every state visited after `self`, in order.
    ///
    /// The path is empty if `self` is already at `target`.
    pub fn path_to(self, target: usize, trace: &Trace) -> Result<Vec<ReplayState>, Error> {
        let limit = position_count(trace);
        let mut path = vec![];
        let mut state = self;
        loop {
            let current = state
                .turn_index(trace)
                .ok_or(Error::InvalidNavigation)?;
            if current == target {
                return Ok(path);
            }
            let steps = path.len();
            if steps >= limit {
                return Err(Error::JumpLimitExceeded { target, steps });
            }
            let (next, progress) = if current < target {
                state.advance(trace)?
            } else {
                state.retreat(trace)?
            };
            if progress == Progress::AtBoundary {
                return Err(Error::JumpLimitExceeded { target, steps });
            }
            path.push(next.clone());
            state = next;
        }
    }
}

/// The number of positions in a replay of `trace`, bounding any walk between two of them.
pub fn position_count(trace: &Trace) -> usize {
    // Begin, InitialExploration, four steps per turn, Step6 and Step7.
    2 + 4 * trace.turn_count() + 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Algorithm, ExecutionTime, InitialExploration, Timing};

    fn trace() -> Trace {
        // 2 arms, budget 3: turns at indices 2 and 3.
        Trace {
            algorithm: Algorithm::Ucb,
            params: vec![],
            budget: 3,
            execution_time: ExecutionTime::default(),
            initial_exploration: InitialExploration {
                pulls: vec![1, 1],
                rewards: vec![1.0, 0.0],
            },
            arm_count: 2,
            probabilities: vec![0.7, 0.2],
            timing: Timing::default(),
            turns: vec![
                Turn {
                    turn_number: 3,
                    selected_arm: 0,
                    reward: 1.0,
                    scores: vec![0.9, 0.4],
                    cumulative_pulls: vec![2, 1],
                    cumulative_rewards: vec![2.0, 0.0],
                    cumulative_reward: 2.0,
                },
                Turn {
                    turn_number: 4,
                    selected_arm: 1,
                    reward: 0.0,
                    scores: vec![0.8, 0.6],
                    cumulative_pulls: vec![2, 2],
                    cumulative_rewards: vec![2.0, 0.0],
                    cumulative_reward: 2.0,
                },
            ],
        }
    }

    #[test]
    fn test_display_of_unvalidated_trace_fails() {
        let mut trace = trace();
        trace.turns[0].cumulative_pulls = vec![0, 1];
        let position = Position::Core {
            turn_index: 2,
            step: CoreStep::Step3,
        };
        assert_eq!(
            PerArmDisplay::derive(&position, &trace),
            Err(Error::InvalidTrace(TraceError::InconsistentPulls { turn_index: 2 }))
        );
        assert_eq!(
            ReplayState::at(position, &trace),
            Err(Error::InvalidTrace(TraceError::InconsistentPulls { turn_index: 2 }))
        );

        trace.turns[0].selected_arm = 5;
        assert!(PerArmDisplay::derive(&position, &trace).is_err());
    }

    #[test]
    fn test_path_lists_every_visited_state() -> Result<(), Error> {
        let trace = trace();
        let start = ReplayState::at(
            Position::Core {
                turn_index: 2,
                step: CoreStep::Step4,
            },
            &trace,
        )?;
        let path = start.clone().path_to(3, &trace)?;
        let positions: Vec<Position> = path.iter().map(ReplayState::position).collect();
        assert_eq!(
            positions,
            vec![
                Position::Core {
                    turn_index: 2,
                    step: CoreStep::Step5
                },
                Position::Core {
                    turn_index: 3,
                    step: CoreStep::Step2
                },
            ]
        );
        assert_eq!(start.clone().walk_to(3, &trace)?, (path[1].clone(), 2));
        assert!(start.clone().path_to(2, &trace)?.is_empty());
        assert_eq!(start.clone().walk_to(2, &trace)?, (start, 0));
        Ok(())
    }

    #[test]
    fn test_step_numbers() {
        for step in Step::ALL {
            assert_eq!(Step::from_number(step.number()), Some(step));
        }
        assert_eq!(Step::from_number(1), None);
        assert_eq!(Step::Step4.to_string(), "STEP_4");
        assert_eq!(Chapter::CoreOfProtocol.to_string(), "CORE_OF_PROTOCOL");
    }

    #[test]
    fn test_positions_in_order() {
        let trace = trace();
        let mut position = Position::Begin;
        let mut visited = vec![position];
        while let Some(next) = position.next(&trace) {
            visited.push(next);
            position = next;
        }
        assert_eq!(visited.len(), position_count(&trace));
        assert_eq!(visited[1], Position::InitialExploration);
        assert_eq!(
            visited[6],
            Position::Core {
                turn_index: 3,
                step: CoreStep::Step2
            }
        );
        assert_eq!(
            visited.last(),
            Some(&Position::Cumulative {
                step: CumulativeStep::Step7
            })
        );
    }

    #[test]
    fn test_display_before_and_after_pull() -> Result<(), Error> {
        let trace = trace();
        let before = PerArmDisplay::derive(
            &Position::Core {
                turn_index: 2,
                step: CoreStep::Step4,
            },
            &trace,
        )?;
        assert_eq!(before.pulls, vec![1, 1]);
        assert_eq!(before.rewards, vec![1.0, 0.0]);

        let after = PerArmDisplay::derive(
            &Position::Core {
                turn_index: 2,
                step: CoreStep::Step5,
            },
            &trace,
        )?;
        assert_eq!(after.pulls, vec![2, 1]);
        assert_eq!(after.total_reward(), 2.0);
        Ok(())
    }

    #[test]
    fn test_boundaries_are_no_ops() -> Result<(), Error> {
        let trace = trace();
        let (state, progress) = ReplayState::begin(&trace).retreat(&trace)?;
        assert_eq!(progress, Progress::AtBoundary);
        assert_eq!(state.position(), Position::Begin);

        let end = ReplayState::at(
            Position::Cumulative {
                step: CumulativeStep::Step7,
            },
            &trace,
        )?;
        assert!(end.is_terminal());
        let (state, progress) = end.clone().advance(&trace)?;
        assert_eq!(progress, Progress::AtBoundary);
        assert_eq!(state, end);
        Ok(())
    }

    #[test]
    fn test_walk_requires_turn_index() {
        let trace = trace();
        assert_eq!(
            ReplayState::begin(&trace).walk_to(2, &trace),
            Err(Error::InvalidNavigation)
        );
    }

    #[test]
    fn test_walk_below_arm_count_fails_loudly() -> Result<(), Error> {
        let trace = trace();
        let state = ReplayState::at(
            Position::Core {
                turn_index: 3,
                step: CoreStep::Step3,
            },
            &trace,
        )?;
        // Turn 1 lies inside the warm-up, the walk runs into a position without turn index.
        assert_eq!(state.walk_to(1, &trace), Err(Error::InvalidNavigation));
        Ok(())
    }

    #[test]
    fn test_at_rejects_out_of_range_turns() {
        let trace = trace();
        assert_eq!(
            ReplayState::at(
                Position::Core {
                    turn_index: 4,
                    step: CoreStep::Step2
                },
                &trace
            ),
            Err(Error::MissingTurn { turn_index: 4 })
        );
    }
}
