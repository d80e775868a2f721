//! The pre-computed execution trace that a replay walks through.
//!
//! A [`Trace`] is fetched once per execution and is read-only afterwards. Its JSON representation
//! is the wire format of the trace service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The bandit strategy that produced a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Thompson sampling over Beta posteriors.
    ThompsonSampling,
    /// Upper confidence bound.
    Ucb,
    /// Epsilon-greedy exploration.
    EpsilonGreedy,
    /// Epsilon-greedy with a decreasing epsilon.
    EpsilonDecreasingGreedy,
    /// Boltzmann exploration.
    Softmax,
}

impl Algorithm {
    /// All supported strategies, in the order they are offered to users.
    pub const ALL: [Algorithm; 5] = [
        Algorithm::ThompsonSampling,
        Algorithm::Ucb,
        Algorithm::EpsilonGreedy,
        Algorithm::EpsilonDecreasingGreedy,
        Algorithm::Softmax,
    ];

    /// The identifier used on the wire and in data file names.
    pub fn id(&self) -> &'static str {
        match self {
            Algorithm::ThompsonSampling => "thompson-sampling",
            Algorithm::Ucb => "ucb",
            Algorithm::EpsilonGreedy => "epsilon-greedy",
            Algorithm::EpsilonDecreasingGreedy => "epsilon-decreasing-greedy",
            Algorithm::Softmax => "softmax",
        }
    }

    /// A human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Algorithm::ThompsonSampling => "Thompson Sampling",
            Algorithm::Ucb => "UCB",
            Algorithm::EpsilonGreedy => "Epsilon Greedy",
            Algorithm::EpsilonDecreasingGreedy => "Epsilon Decreasing Greedy",
            Algorithm::Softmax => "Softmax",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Algorithm {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .iter()
            .find(|a| a.id() == s)
            .copied()
            .ok_or_else(|| TraceError::UnknownAlgorithm(s.to_string()))
    }
}

/// A named hyper-parameter of the strategy, e.g. epsilon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: f64,
}

/// Measured wall-clock time of the (unsecure) execution that produced the trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTime {
    /// Seconds spent.
    pub time: f64,
    /// The budget the measurement was taken for.
    pub budget: u32,
}

/// Per-arm state accumulated by the one-pull-per-arm warm-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialExploration {
    /// Number of pulls per arm.
    pub pulls: Vec<u32>,
    /// Reward sum per arm.
    pub rewards: Vec<f64>,
}

/// One iteration of the main protocol loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The turn number as recorded by the producer of the trace.
    #[serde(rename = "turn")]
    pub turn_number: u32,
    /// The arm pulled during this turn.
    pub selected_arm: usize,
    /// Reward obtained by the selected arm.
    pub reward: f64,
    /// Score of every arm, computed before the selection.
    pub scores: Vec<f64>,
    /// Pulls per arm, including this turn.
    #[serde(rename = "nb_pulls")]
    pub cumulative_pulls: Vec<u32>,
    /// Reward sum per arm, including this turn.
    #[serde(rename = "nb_rewards")]
    pub cumulative_rewards: Vec<f64>,
    /// Total reward so far, including this turn.
    pub cumulative_reward: f64,
}

/// Base execution time of every protocol component, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentTimes {
    /// One entry per data owner.
    pub arms: Vec<f64>,
    /// The Comp server.
    pub comp: f64,
    /// The Controller.
    pub controller: f64,
    /// The data customer.
    pub customer: f64,
}

/// Cost of an AES-like primitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AesTimes {
    /// Cost of one encryption.
    pub encryption: f64,
    /// Cost of one decryption.
    pub decryption: f64,
}

/// Cost of a Paillier-like primitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaillierTimes {
    /// Cost of one homomorphic addition.
    pub addition: f64,
    /// Cost of one decryption.
    pub decryption: f64,
    /// Cost of one encryption.
    pub encryption: f64,
}

/// Overhead of every security primitive, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityTimes {
    /// AES-like encryption.
    pub aes: AesTimes,
    /// Additive masking of a single value.
    pub mask: f64,
    /// Additively homomorphic encryption.
    pub paillier: PaillierTimes,
    /// Shuffling a vector of arm values.
    pub permutation: f64,
}

/// Display-only timing constants attached to a trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Base times of the protocol components.
    pub components: ComponentTimes,
    /// Overheads of the security primitives.
    pub security: SecurityTimes,
}

/// The complete record of one bandit execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// The strategy used to generate the trace.
    pub algorithm: Algorithm,
    /// Hyper-parameters of the strategy.
    #[serde(default)]
    pub params: Vec<Param>,
    /// Total number of pulls, including the initial exploration.
    pub budget: usize,
    /// Wall-clock measurement of the unsecure run.
    #[serde(default)]
    pub execution_time: ExecutionTime,
    /// Warm-up state.
    pub initial_exploration: InitialExploration,
    /// Number of arms (data owners).
    #[serde(rename = "nb_arms")]
    pub arm_count: usize,
    /// Reward probability of every arm.
    #[serde(rename = "probs")]
    pub probabilities: Vec<f64>,
    /// Timing estimates.
    #[serde(default, rename = "time")]
    pub timing: Timing,
    /// The turns after the warm-up, addressed by `turn_index - arm_count`.
    pub turns: Vec<Turn>,
}

impl Trace {
    /// Decodes and validates a trace from its JSON wire format.
    pub fn from_json(json: &str) -> Result<Trace, TraceError> {
        let trace: Trace =
            serde_json::from_str(json).map_err(|e| TraceError::Json(e.to_string()))?;
        trace.validate()?;
        Ok(trace)
    }

    /// Encodes the trace in its JSON wire format.
    pub fn to_json(&self) -> Result<String, TraceError> {
        serde_json::to_string(self).map_err(|e| TraceError::Json(e.to_string()))
    }

    /// The number of turns a trace with this arm count and budget must contain, or `None` if the
    /// budget does not even cover the initial exploration.
    pub fn expected_turn_count(arm_count: usize, budget: usize) -> Option<usize> {
        (budget + 1).checked_sub(arm_count)
    }

    /// Number of turns after the warm-up.
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// The turn addressed by an absolute turn index in `[arm_count, budget]`.
    pub fn turn(&self, turn_index: usize) -> Option<&Turn> {
        turn_index
            .checked_sub(self.arm_count)
            .and_then(|offset| self.turns.get(offset))
    }

    /// The turn at `turn_index == budget`.
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turn(self.budget)
    }

    /// A blake3 hash of the trace contents, identifying identical traces.
    pub fn digest(&self) -> Result<TraceDigest, TraceError> {
        let bytes = bincode::serialize(self).map_err(|_| TraceError::Bincode)?;
        Ok(*blake3::hash(&bytes).as_bytes())
    }

    /// Checks every structural invariant the replay relies on.
    pub fn validate(&self) -> Result<(), TraceError> {
        use TraceError::*;

        let arm_count = self.arm_count;
        if arm_count == 0 {
            return Err(NoArms);
        }
        let expected = match Self::expected_turn_count(arm_count, self.budget) {
            Some(expected) if self.budget >= arm_count => expected,
            _ => {
                return Err(BudgetBelowArmCount {
                    budget: self.budget,
                    arm_count,
                })
            }
        };
        if self.turns.len() != expected {
            return Err(TurnCountMismatch {
                expected,
                got: self.turns.len(),
            });
        }
        check_len("probs", self.probabilities.len(), arm_count)?;
        check_len(
            "initial_exploration.pulls",
            self.initial_exploration.pulls.len(),
            arm_count,
        )?;
        check_len(
            "initial_exploration.rewards",
            self.initial_exploration.rewards.len(),
            arm_count,
        )?;

        let mut previous_pulls = &self.initial_exploration.pulls;
        for (offset, turn) in self.turns.iter().enumerate() {
            let turn_index = arm_count + offset;
            check_len("scores", turn.scores.len(), arm_count)?;
            check_len("nb_pulls", turn.cumulative_pulls.len(), arm_count)?;
            check_len("nb_rewards", turn.cumulative_rewards.len(), arm_count)?;
            if turn.selected_arm >= arm_count {
                return Err(SelectedArmOutOfRange {
                    turn_index,
                    arm: turn.selected_arm,
                });
            }
            let consistent = previous_pulls
                .iter()
                .zip(&turn.cumulative_pulls)
                .enumerate()
                .all(|(arm, (&before, &after))| {
                    let increment = u32::from(arm == turn.selected_arm);
                    before.checked_add(increment) == Some(after)
                });
            if !consistent {
                return Err(InconsistentPulls { turn_index });
            }
            previous_pulls = &turn.cumulative_pulls;
        }
        Ok(())
    }
}

fn check_len(field: &'static str, got: usize, expected: usize) -> Result<(), TraceError> {
    if got == expected {
        Ok(())
    } else {
        Err(TraceError::ArmVectorMismatch {
            field,
            expected,
            got,
        })
    }
}

/// A blake3 hash that can be used to compare traces for equality.
pub type TraceDigest = [u8; 32];

/// Reasons a trace is rejected before a replay is built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// The trace has zero arms.
    NoArms,
    /// The budget does not even cover the initial exploration.
    BudgetBelowArmCount {
        /// The trace's budget.
        budget: usize,
        /// The trace's arm count.
        arm_count: usize,
    },
    /// The number of turns does not match `budget - arm_count + 1`.
    TurnCountMismatch {
        /// The required number of turns.
        expected: usize,
        /// The number of turns in the trace.
        got: usize,
    },
    /// A per-arm vector does not have one entry per arm.
    ArmVectorMismatch {
        /// The offending field.
        field: &'static str,
        /// The arm count.
        expected: usize,
        /// The vector length.
        got: usize,
    },
    /// A turn selected an arm that does not exist.
    SelectedArmOutOfRange {
        /// The absolute index of the turn.
        turn_index: usize,
        /// The selected arm.
        arm: usize,
    },
    /// The cumulative pulls do not increase by exactly one for the selected arm.
    InconsistentPulls {
        /// The absolute index of the turn.
        turn_index: usize,
    },
    /// The algorithm identifier is not known.
    UnknownAlgorithm(String),
    /// The JSON could not be decoded.
    Json(String),
    /// The trace could not be serialized to bincode.
    Bincode,
}

impl std::error::Error for TraceError {}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceError::NoArms => f.write_str("The trace must contain at least one arm"),
            TraceError::BudgetBelowArmCount { budget, arm_count } => write!(
                f,
                "The budget {budget} does not cover the initial exploration of {arm_count} arms"
            ),
            TraceError::TurnCountMismatch { expected, got } => {
                write!(f, "Expected {expected} turns but the trace contains {got}")
            }
            TraceError::ArmVectorMismatch {
                field,
                expected,
                got,
            } => write!(
                f,
                "Expected {expected} entries in `{field}` (one per arm) but got {got}"
            ),
            TraceError::SelectedArmOutOfRange { turn_index, arm } => {
                write!(f, "Turn {turn_index} selects the unknown arm {arm}")
            }
            TraceError::InconsistentPulls { turn_index } => write!(
                f,
                "The cumulative pulls of turn {turn_index} do not follow from the previous turn"
            ),
            TraceError::UnknownAlgorithm(a) => write!(f, "Unknown algorithm '{a}'"),
            TraceError::Json(e) => write!(f, "The trace is not valid JSON: {e}"),
            TraceError::Bincode => f.write_str("The trace could not be serialized to bincode"),
        }
    }
}
