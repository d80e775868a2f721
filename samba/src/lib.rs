//! Replay engine for SAMBA, a secure multi-party protocol for multi-armed bandits.
//!
//! In SAMBA every arm of the bandit belongs to a different data owner. A Controller and a Comp
//! server pick the arm to pull in every turn without learning the owners' scores, and a data
//! customer finally receives the cumulative reward without learning the per-arm rewards.
//!
//! This crate does not run the bandit or the cryptography. It takes a pre-computed [`Trace`] of
//! one execution and replays it step by step: the [`ReplayState`] walks the protocol positions
//! forward and backward, and [`render_message`] shows the message exchanged at each step with the
//! protections (AES, Paillier, masking, permutation) projected onto the plaintext values.
//!
//! # Examples
//!
//! ```
//! use samba::{Chapter, Error, Progress, ReplaySession, SecurityOptions, Step, Trace};
//!
//! fn main() -> Result<(), Error> {
//!     // Two arms and a budget of 2: a single turn after the warm-up, at turn index 2.
//!     let trace = Trace::from_json(
//!         r#"{
//!             "algorithm": "ucb",
//!             "budget": 2,
//!             "nb_arms": 2,
//!             "probs": [0.2, 0.8],
//!             "initial_exploration": { "pulls": [1, 1], "rewards": [0.0, 1.0] },
//!             "turns": [{
//!                 "turn": 3,
//!                 "selected_arm": 1,
//!                 "reward": 1.0,
//!                 "scores": [0.25, 1.5],
//!                 "nb_pulls": [1, 2],
//!                 "nb_rewards": [0.0, 2.0],
//!                 "cumulative_reward": 2.0
//!             }]
//!         }"#,
//!     )?;
//!
//!     let mut session = ReplaySession::new(trace)?;
//!     session.subscribe(|snapshot: &samba::Snapshot| println!("{}", snapshot.narration));
//!
//!     // Begin -> initial exploration -> step 2 -> step 3 of turn 2:
//!     for _ in 0..3 {
//!         session.advance()?;
//!     }
//!     assert_eq!(session.state().chapter(), Chapter::CoreOfProtocol);
//!
//!     let options = SecurityOptions {
//!         mask: false,
//!         permutation: false,
//!         ..SecurityOptions::all()
//!     };
//!     let message = session.render_message(Step::Step3, 0, true, options)?;
//!     assert_eq!(message.to_string(), "AES(0.25) AES(1.50)");
//!
//!     // Run to the end; advancing past the last step is a no-op.
//!     while session.advance()? == Progress::Moved {}
//!     assert!(session.state().is_terminal());
//!     assert_eq!(session.state().display().total_reward(), 2.0);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod entity;
mod message;
mod permutation;
mod replay;
mod session;
pub mod timing;
mod trace;

pub use message::*;
pub use permutation::*;
pub use replay::*;
pub use session::*;
pub use trace::*;

/// Errors occurring while navigating a replay or rendering its messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A permutation was applied to a list of a different length.
    SizeMismatch {
        /// The length of the permutation.
        expected: usize,
        /// The length of the list.
        got: usize,
    },
    /// The operation needs a turn index, but the replay is not inside a turn.
    InvalidNavigation,
    /// The trace has no turn at this index.
    MissingTurn {
        /// The absolute turn index.
        turn_index: usize,
    },
    /// A message was requested for an arm that does not exist.
    UnknownArm {
        /// The requested arm.
        arm: usize,
        /// The number of arms in the trace.
        arm_count: usize,
    },
    /// A jump walked more positions than the trace contains without reaching its target.
    JumpLimitExceeded {
        /// The requested turn index.
        target: usize,
        /// The number of transitions performed before giving up.
        steps: usize,
    },
    /// The trace violates a structural invariant.
    InvalidTrace(TraceError),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidTrace(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SizeMismatch { expected, got } => write!(
                f,
                "A permutation of length {expected} cannot reorder a list of length {got}"
            ),
            Error::InvalidNavigation => {
                f.write_str("The replay has no current turn, navigation by turn is impossible")
            }
            Error::MissingTurn { turn_index } => {
                write!(f, "The trace contains no turn with index {turn_index}")
            }
            Error::UnknownArm { arm, arm_count } => {
                write!(f, "Arm {arm} does not exist, the trace has {arm_count} arms")
            }
            Error::JumpLimitExceeded { target, steps } => write!(
                f,
                "Turn {target} was not reached after {steps} steps, the jump was aborted"
            ),
            Error::InvalidTrace(e) => write!(f, "Invalid trace: {e}"),
        }
    }
}

impl From<TraceError> for Error {
    fn from(e: TraceError) -> Self {
        Self::InvalidTrace(e)
    }
}
