use std::{env, path::PathBuf};

use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use rand::Rng;
use samba::Trace;
use samba_http_server::{build, DataDirectory, TraceRequest};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[macro_use]
extern crate rocket;

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
    data_dir: PathBuf,
    iterations: (u32, u32),
}

fn config() -> Result<ServerConfig, figment::Error> {
    Figment::from(("data_dir", "/data"))
        .merge(("iterations", [0, 19]))
        .merge(Json::file("Samba.json"))
        .merge(Toml::file("Samba.toml"))
        .merge(Env::prefixed("SAMBA_"))
        .extract()
}

#[launch]
fn rocket() -> _ {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,samba_http_server=info")),
        )
        .init();

    if let Ok(dir) = env::current_dir() {
        info!("Starting server in {}...", dir.display());
    }

    let config = config().unwrap_or_else(|e| panic!("invalid server configuration: {e}"));
    let (first, last) = config.iterations;
    if first > last {
        panic!("the iteration range [{first}, {last}] is empty");
    }
    let data = DataDirectory::new(config.data_dir);
    info!(data_dir = %data.root().display(), first, last, "serving pre-computed executions");

    let handler = move |r: TraceRequest| -> Result<Trace, String> {
        let iteration = rand::thread_rng().gen_range(first..=last);
        info!(algorithm = %r.algorithm, iteration, "loading execution");
        data.load(&r, iteration).map_err(|e| {
            warn!("could not load execution: {e}");
            e.to_string()
        })
    };
    build(Box::new(handler))
}

#[test]
fn test_default_config() {
    let config = config().unwrap();
    assert_eq!(config.iterations, (0, 19));
}
