//! Pre-computed executions stored on disk.
//!
//! The data directory is laid out as follows:
//!
//! ```text
//! {root}/security.json
//! {root}/{dataset}_{k}_{threshold}/execution_time_by_components.json
//! {root}/{dataset}_{k}_{threshold}/execution_{algorithm}_{iteration}.json
//! ```

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use rocket::serde::{Deserialize, DeserializeOwned};
use samba::{
    ComponentTimes, ExecutionTime, InitialExploration, Param, SecurityTimes, Timing, Trace,
    TraceError, Turn,
};

use crate::types::TraceRequest;

/// Errors occurring while loading a trace from the data directory.
#[derive(Debug)]
pub enum DatasetError {
    /// The dataset name could escape the data directory.
    InvalidDatasetName(String),
    /// A file could not be read.
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The underlying error.
        error: std::io::Error,
    },
    /// A file does not contain the expected JSON.
    Json {
        /// The file that was parsed.
        path: PathBuf,
        /// The underlying error.
        error: serde_json::Error,
    },
    /// The file does not contain a single turn within the requested budget.
    NoTurns {
        /// The requested budget.
        budget: usize,
    },
    /// The assembled trace is inconsistent.
    InvalidTrace(TraceError),
}

impl std::error::Error for DatasetError {}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::InvalidDatasetName(name) => write!(f, "Invalid dataset name '{name}'"),
            DatasetError::Io { path, error } => {
                write!(f, "Could not read {}: {error}", path.display())
            }
            DatasetError::Json { path, error } => {
                write!(f, "{} is not a valid data file: {error}", path.display())
            }
            DatasetError::NoTurns { budget } => {
                write!(f, "The execution contains no turn within the budget {budget}")
            }
            DatasetError::InvalidTrace(e) => write!(f, "The execution is inconsistent: {e}"),
        }
    }
}

impl From<TraceError> for DatasetError {
    fn from(e: TraceError) -> Self {
        DatasetError::InvalidTrace(e)
    }
}

#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
struct Execution {
    #[serde(default)]
    params: Vec<Param>,
    probs: Vec<f64>,
    initial_exploration: InitialExploration,
    turns: Vec<Turn>,
    #[serde(default)]
    execution_time: ExecutionTime,
}

/// A directory of pre-computed executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    /// Uses the executions stored below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding the executions.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder(&self, request: &TraceRequest) -> Result<PathBuf, DatasetError> {
        let dataset = &request.dataset;
        let escapes = |c: char| c == '/' || c == '\\';
        if dataset.is_empty() || dataset.contains(escapes) || dataset.starts_with('.') {
            return Err(DatasetError::InvalidDatasetName(dataset.clone()));
        }
        Ok(self.root.join(format!(
            "{dataset}_{}_{}",
            request.k, request.threshold
        )))
    }

    /// Loads the iteration `iteration` of the requested execution, cut to the requested budget.
    ///
    /// The budget of the returned trace is the largest one its turns can cover, which may be
    /// smaller than the requested one.
    pub fn load(&self, request: &TraceRequest, iteration: u32) -> Result<Trace, DatasetError> {
        let folder = self.folder(request)?;
        let execution: Execution = read_json(&folder.join(format!(
            "execution_{}_{iteration}.json",
            request.algorithm.id()
        )))?;
        let components: ComponentTimes =
            read_json(&folder.join("execution_time_by_components.json"))?;
        let security: SecurityTimes = read_json(&self.root.join("security.json"))?;

        let mut turns: Vec<Turn> = execution
            .turns
            .into_iter()
            .filter(|t| t.turn_number as usize <= request.budget)
            .collect();
        if turns.is_empty() {
            return Err(DatasetError::NoTurns {
                budget: request.budget,
            });
        }
        let arm_count = execution.probs.len();
        let budget = request.budget.min(arm_count + turns.len() - 1);
        if let Some(count) = Trace::expected_turn_count(arm_count, budget) {
            turns.truncate(count);
        }
        let trace = Trace {
            algorithm: request.algorithm,
            params: execution.params,
            budget,
            execution_time: execution.execution_time,
            initial_exploration: execution.initial_exploration,
            arm_count,
            probabilities: execution.probs,
            timing: Timing {
                components,
                security,
            },
            turns,
        };
        trace.validate()?;
        Ok(trace)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DatasetError> {
    let contents = fs::read_to_string(path).map_err(|error| DatasetError::Io {
        path: path.to_path_buf(),
        error,
    })?;
    serde_json::from_str(&contents).map_err(|error| DatasetError::Json {
        path: path.to_path_buf(),
        error,
    })
}
