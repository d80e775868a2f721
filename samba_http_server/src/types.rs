use rocket::serde::{Deserialize, Serialize};
use samba::{Algorithm, Trace};

pub type TraceId = String;

/// Custom logic to produce the trace for a request.
pub type HandleTraceRequestFn = Box<dyn Fn(TraceRequest) -> Result<Trace, String> + Send + Sync>;

/// A request by a client for the trace of one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRequest {
    /// The bandit strategy to replay.
    pub algorithm: Algorithm,
    /// The number of arms.
    pub k: usize,
    /// The number of pulls, including the initial exploration.
    pub budget: usize,
    /// The dataset the arm probabilities were drawn from.
    pub dataset: String,
    /// The probability threshold used to pick the arms from the dataset.
    pub threshold: f64,
}

/// A trace kept in the history, as returned to clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(crate = "rocket::serde")]
pub struct StoredTrace {
    /// The identifier used to delete the trace.
    pub id: TraceId,
    /// The trace itself, flattened into the same JSON object.
    #[serde(flatten)]
    pub trace: Trace,
}
