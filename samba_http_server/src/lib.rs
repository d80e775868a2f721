//! HTTP server for pre-computed SAMBA execution traces.
//!
//! This crate provides the trace service replayed by the `samba` engine: clients request the trace
//! of one execution (algorithm, number of arms, budget, dataset and probability threshold), the
//! server stores every trace it hands out in a history, and clients can list and delete the
//! entries of that history.
//!
//! This crate can be used as either a library or a binary.
//!
//! As a library, it provides a [`build`] function, which can be used to construct a server with
//! custom logic for producing traces, and a [`DataDirectory`] reading the pre-computed executions
//! from disk.
//!
//! In order to use this crate as a binary, the crate must be compiled with the `bin` feature. The
//! binary serves the executions of a data directory, configured as `data_dir` in `Samba.json` or
//! `Samba.toml` (or through the env var `SAMBA_DATA_DIR`) and defaulting to `/data`. Each request
//! is answered with a random iteration out of the range `iterations` (default `[0, 19]`).
//!
//! As the sample server is based on the [Rocket](https://rocket.rs) framework, it is possible to
//! configure it according to the official [Rocket
//! documentation](https://rocket.rs/v0.5-rc/guide/configuration/#configuration).
//!
//! Example configuration through env vars:
//!
//! ```sh
//! # make the server listen at port 8080
//! ROCKET_PORT=8080 samba_http_server
//!
//! # serve the executions stored in ./data
//! SAMBA_DATA_DIR=./data samba_http_server
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use engine::{stage, Cors};
use rocket::{Build, Rocket};
pub use dataset::{DataDirectory, DatasetError};
pub use types::{HandleTraceRequestFn, StoredTrace, TraceRequest};

#[macro_use]
extern crate rocket;

mod dataset;
mod engine;
mod requests;
mod responses;
mod state;
mod types;


/// Starts a SAMBA trace server, producing traces using the specified custom handler logic.
pub fn build(handler: HandleTraceRequestFn) -> Rocket<Build> {
    rocket::build().attach(stage(handler)).attach(Cors)
}
