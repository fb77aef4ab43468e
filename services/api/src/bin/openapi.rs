//! services/api/src/bin/openapi.rs
//!
//! Writes the live classroom OpenAPI document to disk for client generation.
//!
//! ```text
//! openapi [PATH]           write the document (default: openapi.json)
//! openapi --check [PATH]   fail if PATH differs from the current document
//! ```

use api_lib::{error::ApiError, web::ApiDoc};
use std::process::ExitCode;
use tracing::{error, info};

const DEFAULT_PATH: &str = "openapi.json";

enum Mode {
    Write(String),
    Check(String),
}

impl Mode {
    fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, ApiError> {
        let mode = match args.next() {
            Some(flag) if flag == "--check" => {
                Mode::Check(args.next().unwrap_or_else(|| DEFAULT_PATH.to_string()))
            }
            Some(flag) if flag.starts_with("--") => {
                return Err(ApiError::Internal(format!("unknown flag {}", flag)));
            }
            Some(path) => Mode::Write(path),
            None => Mode::Write(DEFAULT_PATH.to_string()),
        };
        if let Some(extra) = args.next() {
            return Err(ApiError::Internal(format!("unexpected argument {}", extra)));
        }
        Ok(mode)
    }
}

/// Returns whether the document on disk is current. Writing always succeeds
/// with `true`.
fn run(mode: &Mode) -> Result<bool, ApiError> {
    let document = ApiDoc::to_pretty_json()?;
    match mode {
        Mode::Write(path) => {
            std::fs::write(path, &document)?;
            info!("Wrote the live classroom OpenAPI document to {}", path);
            Ok(true)
        }
        Mode::Check(path) => {
            let on_disk = std::fs::read_to_string(path)?;
            if on_disk.trim_end() == document.trim_end() {
                info!("{} is up to date", path);
                Ok(true)
            } else {
                error!("{} is stale; rerun without --check to regenerate it", path);
                Ok(false)
            }
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_target(false).init();

    let outcome = Mode::from_args(std::env::args().skip(1)).and_then(|mode| run(&mode));
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("OpenAPI generation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
