#![allow(clippy::let_unit_value)]

use crate::{
    requests::NewTrace,
    responses::Error::{self, *},
    state::HistoryRegistry,
    types::{HandleTraceRequestFn, StoredTrace, TraceRequest},
};
use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};
use rocket::{
    fairing::{AdHoc, Fairing, Info, Kind},
    http::Header,
    response::status::Created,
    serde::{json, json::Json, Deserialize},
    Request, Response, State,
};
use samba::Algorithm;
use std::collections::HashSet;
use tracing::info;
use url::{Host, Url};

#[options("/create")]
pub(crate) fn preflight_response_create_trace() {}

#[post("/create", format = "application/json", data = "<request>")]
pub(crate) fn create_trace(
    r: &State<HistoryRegistry>,
    request: Result<Json<NewTrace>, json::Error<'_>>,
) -> Result<Created<Json<StoredTrace>>, Error> {
    let request = match request {
        Ok(request) => request.into_inner(),
        Err(json::Error::Parse(_, e)) => return Err(UnexpectedWireFormat(e.to_string())),
        Err(json::Error::Io(e)) => return Err(UnexpectedWireFormat(e.to_string())),
    };
    let algorithm: Algorithm = request
        .algorithm
        .parse()
        .map_err(|_| UnknownAlgorithm(request.algorithm.clone()))?;
    let invocation = TraceRequest {
        algorithm,
        k: request.k,
        budget: request.budget,
        dataset: request.dataset,
        threshold: request.threshold,
    };
    let trace = r
        .handle_request(invocation)
        .map_err(Error::TraceRequestRejected)?;
    trace.validate()?;

    let mut rng = ChaCha20Rng::from_entropy();
    let trace_id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
    let stored = r.insert_trace(trace_id.to_string(), trace)?;
    info!(trace_id = %stored.id, budget = stored.trace.budget, "trace created");

    let location = uri!("/samba", history_entry(stored.id.clone())).to_string();
    Ok(Created::new(location).body(Json(stored)))
}

#[options("/history")]
pub(crate) fn preflight_response_history() {}

#[get("/history")]
pub(crate) fn history(r: &State<HistoryRegistry>) -> Result<Json<Vec<StoredTrace>>, Error> {
    let traces = r.list()?;
    info!(count = traces.len(), "history listed");
    Ok(Json(traces))
}

#[options("/history/<_trace_id>")]
pub(crate) fn preflight_response_history_entry(_trace_id: String) {}

#[get("/history/<trace_id>")]
pub(crate) fn history_entry(
    trace_id: String,
    r: &State<HistoryRegistry>,
) -> Result<Json<StoredTrace>, Error> {
    Ok(Json(r.lookup(&trace_id)?))
}

#[delete("/history/<trace_id>")]
pub(crate) fn delete_trace(trace_id: String, r: &State<HistoryRegistry>) -> Result<(), Error> {
    let removed = r.drop_trace(&trace_id)?;
    if removed {
        info!(trace_id = %trace_id, "trace deleted from history");
        Ok(())
    } else {
        Err(NoSuchTraceId { trace_id })
    }
}

pub fn stage(handle_request: HandleTraceRequestFn) -> AdHoc {
    AdHoc::on_ignite("Trace History", |rocket| async {
        rocket
            .mount(
                "/samba",
                routes![
                    preflight_response_create_trace,
                    preflight_response_history,
                    preflight_response_history_entry,
                    create_trace,
                    history,
                    history_entry,
                    delete_trace
                ],
            )
            .manage(HistoryRegistry::new(handle_request))
    })
}

pub(crate) struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        #[derive(Debug, Deserialize)]
        #[serde(crate = "rocket::serde")]
        struct CorsConfig {
            origins: HashSet<String>,
        }

        let config = request.rocket().figment().extract::<CorsConfig>();
        if let Ok(config) = config {
            let request_origin = request.headers().get_one("origin");

            if let Some(origin) = request_origin {
                if let Ok(url) = Url::parse(origin) {
                    if config.origins.contains(url.as_str())
                        || url.host() == Some(Host::Domain("127.0.0.1"))
                        || url.host() == Some(Host::Domain("localhost"))
                    {
                        response.set_header(Header::new("Access-Control-Allow-Origin", origin));
                    }
                }
            }
        } else {
            response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}
