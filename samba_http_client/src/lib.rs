//! HTTP client for the SAMBA trace service.
//!
//! This crate fetches pre-computed execution traces from a `samba_http_server`, lists and deletes
//! the entries of the server's history, and replays traces with the `samba` engine.
//!
//! This crate provides a CLI client, which replays a trace in the terminal, as well as bindings
//! targeting WebAssembly to drive a replay session from JavaScript.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
// otherwise wasm_bindgen causes a clippy warning, see
// https://github.com/rustwasm/wasm-bindgen/issues/2774
#![allow(clippy::unused_unit)]

use reqwest::Response;
use samba::{Algorithm, Trace};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future};
use tracing::{info, warn};
use url::Url;

/// A failed request is retried once before the errors are surfaced.
const MAX_ATTEMPTS: usize = 2;

#[cfg(not(target_arch = "wasm32"))]
mod player;
pub mod report;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(not(target_arch = "wasm32"))]
pub use player::{autoplay, until_signal, AutoplayEnd};
#[cfg(target_arch = "wasm32")]
pub use wasm::*;

/// The parameters of an execution to fetch the trace for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceParameters {
    /// The bandit strategy.
    pub algorithm: Algorithm,
    /// The number of arms.
    pub k: usize,
    /// The number of pulls, including the initial exploration.
    pub budget: usize,
    /// The dataset the arm probabilities were drawn from.
    pub dataset: String,
    /// The probability threshold used to pick the arms.
    pub threshold: f64,
}

/// A trace as stored in the server's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrace {
    /// The identifier of the history entry.
    pub id: String,
    /// The trace.
    #[serde(flatten)]
    pub trace: Trace,
}

/// Talks to a SAMBA trace server.
#[derive(Debug, Clone)]
pub struct SambaClient {
    url: Url,
}

impl SambaClient {
    /// Creates a client for the server at `url`, e.g. `http://localhost:8000/samba`.
    pub fn new(url: &Url) -> Self {
        let mut url = url.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Self { url }
    }

    /// Parses `url` and creates a client for it.
    pub fn parse(url: &str) -> Result<Self, Error> {
        Ok(Self::new(&Url::parse(url)?))
    }

    /// The base URL of the trace service.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Asks the server for the trace of an execution and validates it.
    pub async fn create_trace(&self, parameters: &TraceParameters) -> Result<RemoteTrace, Error> {
        let url = self.url.join("create")?;
        let created = with_retries(|| send_create(url.clone(), parameters)).await?;
        created.trace.validate()?;
        info!(id = %created.id, budget = created.trace.budget, "trace fetched");
        Ok(created)
    }

    /// Lists the traces stored on the server.
    pub async fn history(&self) -> Result<Vec<RemoteTrace>, Error> {
        let url = self.url.join("history")?;
        with_retries(|| send_history(url.clone())).await
    }

    /// Deletes a trace from the server's history.
    pub async fn delete_history(&self, id: &str) -> Result<(), Error> {
        let url = self.url.join("history/")?.join(id)?;
        let client = reqwest::Client::new();
        let resp = client.delete(url).send().await?;
        resp_or_err(resp).await?;
        info!(id, "trace deleted");
        Ok(())
    }
}

async fn with_retries<T, F, Fut>(mut request: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut errors = vec![];
    for attempt in 1..=MAX_ATTEMPTS {
        match request().await {
            Ok(resp) => return Ok(resp),
            Err(e) => {
                warn!(attempt, "request failed: {e}");
                errors.push(e);
            }
        }
    }
    Err(Error::MaxRetriesExceeded(errors))
}

async fn send_create(url: Url, parameters: &TraceParameters) -> Result<RemoteTrace, Error> {
    let client = reqwest::Client::new();
    let resp = client.post(url).json(parameters).send().await?;
    let resp = resp_or_err(resp).await?;
    Ok(resp.json::<RemoteTrace>().await?)
}

async fn send_history(url: Url) -> Result<Vec<RemoteTrace>, Error> {
    let client = reqwest::Client::new();
    let resp = client.get(url).send().await?;
    let resp = resp_or_err(resp).await?;
    Ok(resp.json::<Vec<RemoteTrace>>().await?)
}

async fn resp_or_err(resp: Response) -> Result<Response, Error> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        let e = resp.text().await?;
        let e = match serde_json::from_str::<ErrorJson>(&e) {
            Ok(ErrorJson { error, args }) => format!("{error}: {args}"),
            Err(_) => e,
        };
        Err(Error::ServerError(e))
    }
}

#[derive(Deserialize)]
struct ErrorJson {
    error: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Errors occurring while fetching or replaying a trace.
#[derive(Debug)]
pub enum Error {
    /// An error occurred on the server side.
    ServerError(String),
    /// An error occurred while trying to send a request to the server.
    ReqwestError(reqwest::Error),
    /// The provided JSON is not a valid trace or option set.
    JsonError(String),
    /// The provided URL is invalid.
    ParseError(url::ParseError),
    /// The replay engine rejected the trace or the navigation.
    ReplayError(samba::Error),
    /// The request failed after exceeding the maximum number of attempts.
    MaxRetriesExceeded(Vec<Error>),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::ReqwestError(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::ParseError(e)
    }
}

impl From<samba::Error> for Error {
    fn from(e: samba::Error) -> Self {
        Self::ReplayError(e)
    }
}

impl From<samba::TraceError> for Error {
    fn from(e: samba::TraceError) -> Self {
        Self::ReplayError(e.into())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ServerError(e) => write!(f, "An error occurred on the server side: {e}"),
            Error::ReqwestError(e) => write!(
                f,
                "An error occurred while trying to send a request to the server: {e}"
            ),
            Error::JsonError(e) => write!(f, "The provided JSON is invalid: {e}"),
            Error::ParseError(e) => write!(f, "The provided URL is invalid: {e}"),
            Error::ReplayError(e) => write!(f, "The trace cannot be replayed: {e}"),
            Error::MaxRetriesExceeded(errs) => {
                write!(f, "The request failed after {MAX_ATTEMPTS} attempts: ")?;
                for e in errs {
                    e.fmt(f)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(target_arch = "wasm32")]
impl From<Error> for wasm_bindgen::JsValue {
    fn from(e: Error) -> Self {
        wasm_bindgen::JsValue::from_str(&format!("{e}"))
    }
}

#[test]
fn test_base_url_gets_trailing_slash() -> Result<(), Error> {
    let client = SambaClient::parse("http://localhost:8000/samba")?;
    assert_eq!(client.url().as_str(), "http://localhost:8000/samba/");
    assert_eq!(
        client.url().join("history/")?.join("abc")?.as_str(),
        "http://localhost:8000/samba/history/abc"
    );
    Ok(())
}
