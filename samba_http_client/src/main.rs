#![cfg(not(target_arch = "wasm32"))]

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use samba::{Algorithm, JumpOutcome, Progress, ReplaySession, SecurityOptions, Trace};
use samba_http_client::{
    autoplay, report, until_signal, AutoplayEnd, SambaClient, TraceParameters,
};
use std::{io::Read, path::PathBuf, time::Duration};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "http://localhost:8000/samba",
        help = "Base URL of a remote samba http server"
    )]
    url: url::Url,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the trace of an execution from the server
    Create {
        #[arg(long, value_parser = parse_algorithm, help = "Bandit strategy, e.g. ucb")]
        algorithm: Algorithm,

        #[arg(long, help = "Number of arms")]
        k: usize,

        #[arg(long, help = "Number of pulls, including the initial exploration")]
        budget: usize,

        #[arg(long, default_value = "jester", help = "Dataset of the arm probabilities")]
        dataset: String,

        #[arg(long, default_value_t = 0.2, help = "Probability threshold of the arms")]
        threshold: f64,

        #[arg(long, value_parser, help = "Write the trace to this file")]
        out: Option<PathBuf>,
    },
    /// List the traces stored on the server
    History,
    /// Delete a trace from the server's history
    Delete {
        #[arg(help = "Identifier of the history entry")]
        id: String,
    },
    /// Replay a trace file in the terminal
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct ReplayArgs {
    #[arg(value_parser, help = "Path to a trace in JSON format")]
    file: PathBuf,

    #[arg(long, value_name = "MS", help = "Play the whole trace, one step every MS milliseconds")]
    play: Option<u64>,

    #[arg(long, value_name = "TURN", help = "Jump to a turn after the initial exploration")]
    jump: Option<String>,

    #[arg(long, help = "Skip to the cumulative reward computation")]
    cumulative: bool,

    #[arg(long, default_value_t = 0, help = "Data owner whose messages are shown")]
    focus: usize,

    #[arg(long, help = "Show the messages without any security layer")]
    insecure: bool,

    #[arg(long, help = "Hide the AES encryption")]
    no_aes: bool,

    #[arg(long, help = "Hide the Paillier encryption")]
    no_paillier: bool,

    #[arg(long, help = "Hide the masking of the scores")]
    no_mask: bool,

    #[arg(long, help = "Hide the permutation of the scores")]
    no_permutation: bool,
}

impl ReplayArgs {
    fn options(&self) -> SecurityOptions {
        SecurityOptions {
            aes: !self.no_aes,
            paillier: !self.no_paillier,
            mask: !self.no_mask,
            permutation: !self.no_permutation,
        }
    }
}

fn parse_algorithm(s: &str) -> Result<Algorithm, String> {
    s.parse::<Algorithm>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,samba_http_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = SambaClient::new(&cli.url);

    match cli.command {
        Command::Create {
            algorithm,
            k,
            budget,
            dataset,
            threshold,
            out,
        } => {
            let parameters = TraceParameters {
                algorithm,
                k,
                budget,
                dataset,
                threshold,
            };
            let created = client.create_trace(&parameters).await?;
            println!("{}", report::history_line(&created));
            if let Some(path) = out {
                let json = created.trace.to_json()?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Could not write file `{}`", path.display()))?;
            }
        }
        Command::History => {
            for entry in client.history().await? {
                println!("{}", report::history_line(&entry));
            }
        }
        Command::Delete { id } => {
            client.delete_history(&id).await?;
            println!("deleted {id}");
        }
        Command::Replay(args) => replay(args).await?,
    }
    Ok(())
}

async fn replay(args: ReplayArgs) -> anyhow::Result<()> {
    let path = &args.file;
    let mut json = String::new();
    std::fs::File::open(path)
        .with_context(|| format!("Could not open file `{}`", path.display()))?
        .read_to_string(&mut json)
        .with_context(|| format!("Could not read file `{}`", path.display()))?;

    let trace = Trace::from_json(&json).context("Not a valid SAMBA trace")?;
    let options = args.options();
    let secure = !args.insecure;
    println!("{}", report::timing_line(&trace, options));
    for line in report::key_lines(trace.arm_count, secure, options) {
        println!("{line}");
    }

    let mut session = ReplaySession::new(trace)?;

    if let Some(period) = args.play {
        let end = autoplay(
            &mut session,
            Duration::from_millis(period),
            until_signal(tokio::signal::ctrl_c()),
        )
        .await?;
        if let AutoplayEnd::Stopped { steps } = end {
            println!("stopped after {steps} steps");
        }
    } else if let Some(input) = &args.jump {
        // jumps are only possible from inside a turn
        while session.state().turn_index(session.trace()).is_none() {
            if session.advance()? == Progress::AtBoundary {
                break;
            }
        }
        if let JumpOutcome::Ignored(reason) = session.jump_to(input)? {
            println!("jump to '{}' ignored: {reason:?}", input.trim());
        }
    } else if args.cumulative {
        session.jump_to_cumulative_reward_phase()?;
    }

    for line in report::session_lines(&session, args.focus, secure, options)? {
        println!("{line}");
    }
    Ok(())
}
