//! Replay a scenario against a descriptor and print the transcript digest.
//!
//! Usage:
//!   `uad_replay <descriptor.uad> <scenario.json> [--out DIR]`
//!   `uad_replay --demo [--out DIR]`
//!
//! Output: `key=value` lines on stdout:
//!   `descriptor_digest`=sha256:...
//!   `transcript_digest`=sha256:...
//!   `steps`=N
//!   `effects`=N
//!   `failures`=N
//!
//! Logging goes to stderr and is filtered by `RUST_LOG` (default `warn`).

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use uad_harness::capabilities::standard_registry;
use uad_harness::fixtures::{demo_descriptor, DEMO_SCENARIO};
use uad_harness::scenario::parse_scenario;
use uad_harness::session::{replay, replay_files, write_transcript, ReplayError};
use uad_harness::transcript::Transcript;

const USAGE: &str = "usage: uad_replay (<descriptor> <scenario> | --demo) [--out DIR]";

enum Input {
    Files { descriptor: PathBuf, scenario: PathBuf },
    Demo,
}

struct Args {
    input: Input,
    out: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut demo = false;
    let mut out = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--demo" => demo = true,
            "--out" => out = Some(PathBuf::from(args.next().ok_or("--out needs a directory")?)),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}")),
            _ => positional.push(PathBuf::from(arg)),
        }
    }
    let input = match (demo, positional.len()) {
        (true, 0) => Input::Demo,
        (false, 2) => {
            let scenario = positional.pop().ok_or(USAGE)?;
            let descriptor = positional.pop().ok_or(USAGE)?;
            Input::Files { descriptor, scenario }
        }
        _ => return Err(USAGE.into()),
    };
    Ok(Args { input, out })
}

fn run_demo() -> Result<Transcript, String> {
    let bytes = demo_descriptor().map_err(|e| e.to_string())?;
    let scenario = parse_scenario(DEMO_SCENARIO.as_bytes()).map_err(|e| e.to_string())?;
    let registry = standard_registry().map_err(|e| e.to_string())?;
    replay(&bytes, &scenario, &registry).map_err(|e| e.to_string())
}

fn run(args: Args) -> Result<(), String> {
    let transcript = match args.input {
        Input::Demo => run_demo()?,
        Input::Files { descriptor, scenario } => {
            replay_files(&descriptor, &scenario).map_err(|e| e.to_string())?
        }
    };
    let digest = match &args.out {
        Some(dir) => write_transcript(dir, &transcript),
        None => transcript.digest().map_err(ReplayError::from),
    }
    .map_err(|e| e.to_string())?;

    let failures: usize = transcript.entries.iter().map(|e| e.failures.len()).sum();
    println!("descriptor_digest={}", transcript.descriptor.digest);
    println!("transcript_digest={digest}");
    println!("steps={}", transcript.entries.len());
    println!("effects={}", transcript.effects().count());
    println!("failures={failures}");
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match parse_args(std::env::args().skip(1)).and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("uad_replay: {message}");
            ExitCode::FAILURE
        }
    }
}
