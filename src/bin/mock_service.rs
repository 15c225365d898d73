//! Mock line-oriented service for integration tests
//!
//! Speaks a tiny stdin/stdout protocol so the harness can be exercised
//! without real network services. The mode is chosen by the first
//! argument:
//!
//! - `server`: announces readiness, answers single-letter commands with
//!   fixed byte sequences (including non-UTF-8 ones)
//! - `client`: the peer side of the same conversation
//! - `router`: long-lived; emits the success line on demand and keeps
//!   running until told to shut down
//! - `chatter N`: floods N lines as fast as possible, then succeeds

use std::env;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(String::as_str).unwrap_or("");

    let result = match mode {
        "server" => run_server(),
        "client" => run_client(),
        "router" => run_router(),
        "chatter" => {
            let count = args
                .get(2)
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(1000);
            run_chatter(count)
        }
        other => {
            eprintln!("mock_service: unknown mode '{}'", other);
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("mock_service: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_server() -> io::Result<ExitCode> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    stdout.write_all(b"mock server ready\n")?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        match line.as_str() {
            // "Bonne journee" with an e-acute, as raw Latin-1
            "u" => stdout.write_all(b"Received (UTF-8): \"Bonne journ\xE9e\"\n")?,
            // The same string as UTF-8
            "t" => stdout.write_all(b"Received (UTF-8): \"Bonne journ\xC3\xA9e\"\n")?,
            "s" => {
                stdout.write_all(b"test succeeded\n")?;
                stdout.flush()?;
                return Ok(ExitCode::SUCCESS);
            }
            other => {
                stdout.write_all(format!("echo: {}\n", other).as_bytes())?;
            }
        }
        stdout.flush()?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run_client() -> io::Result<ExitCode> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    stdout.write_all(b"usage ==> press u, t or x\n")?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        match line.as_str() {
            "u" => stdout.write_all(b"Received: \"Bonne journ\xC3\xA9e\"\n")?,
            "t" => stdout.write_all(b"Received: \"Bonne journ\xE9e\"\n")?,
            "x" => {
                stdout.write_all(b"test succeeded\n")?;
                stdout.flush()?;
                return Ok(ExitCode::SUCCESS);
            }
            other => {
                stdout.write_all(format!("echo: {}\n", other).as_bytes())?;
            }
        }
        stdout.flush()?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run_router() -> io::Result<ExitCode> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    stdout.write_all(b"router ready\n")?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        match line.as_str() {
            "done" => stdout.write_all(b"test succeeded\n")?,
            "shutdown" => {
                stdout.write_all(b"test succeeded\n")?;
                stdout.flush()?;
                return Ok(ExitCode::SUCCESS);
            }
            other => {
                stdout.write_all(format!("routed: {}\n", other).as_bytes())?;
            }
        }
        stdout.flush()?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run_chatter(count: usize) -> io::Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for i in 0..count {
        writeln!(out, "chatter line {}", i)?;
    }
    writeln!(out, "listening on port 45678")?;
    writeln!(out, "test succeeded")?;
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}
