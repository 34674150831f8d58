// ── Demonstration binary ──────────────────────────────────────────────────────
//
// Prints a Unicode sample before and after enabling UTF-8 output, so the
// effect is visible in a console whose code page starts out as a legacy
// default.  `--report` instead emits a JSON diagnostics report for bug
// reports and scripted checks.

#![deny(unsafe_code)]

use serde::Serialize;
use unicon::{enable, is_supported_platform, EnableOutcome};

const SAMPLE: &str = "🚀 ñ ü 中文 Привет こんにちは ┌─┐";

fn main() {
    if std::env::args().skip(1).any(|a| a == "--report") {
        let outcome = enable();
        match serde_json::to_string_pretty(&Report::new(&outcome)) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("failed to serialize report: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("=== unicon demo ===");
    println!("OS: {}", std::env::consts::OS);
    println!("Supported platform: {}", is_supported_platform());
    println!();
    println!("Before: {SAMPLE}");

    let outcome = enable();
    println!("Enable: {outcome}");

    if outcome.is_enabled() {
        println!("After:  {SAMPLE}");
    }
}

// ── JSON report ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Report {
    os: &'static str,
    supported_platform: bool,
    outcome: &'static str,
    reason: Option<String>,
    cause: Option<String>,
}

impl Report {
    fn new(outcome: &EnableOutcome) -> Self {
        let label = match outcome {
            EnableOutcome::Success => "success",
            EnableOutcome::AlreadyEnabled => "already-enabled",
            EnableOutcome::Failure { .. } => "failure",
        };
        Self {
            os: std::env::consts::OS,
            supported_platform: is_supported_platform(),
            outcome: label,
            reason: outcome.reason().map(|r| r.to_string()),
            cause: outcome.cause().map(|c| c.to_string()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
