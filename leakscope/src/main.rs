//! # leakscope - Main Entry Point
//!
//! Supports three dump sources:
//! - **File** (`leakscope dump.txt`): re-read on every attempt
//! - **Stdin** (`leakscope -`): read once, so retries see the same dump
//! - **Command** (`--command CMD`): run on every attempt
//!
//! Logging is controlled with `RUST_LOG`, e.g. `RUST_LOG=leakscope=debug`.

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use std::io::Read;

use leakscope::cli::Args;
use leakscope::domain::{DetectError, ScanError};
use leakscope::dump::{CommandDump, DumpSource, FileDump, StaticDump};
use leakscope::export::export_to_file;
use leakscope::report::Palette;
use leakscope::LeakDetector;

// Exit codes
const EXIT_CLEAN: i32 = 0;
const EXIT_LEAKS: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_SCAN: i32 = 3;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(code) => code,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DetectError>() {
        Some(DetectError::Config(_)) => EXIT_USAGE,
        Some(DetectError::Scan(_)) => EXIT_SCAN,
        Some(_) => EXIT_LEAKS,
        None if err.downcast_ref::<ScanError>().is_some() => EXIT_SCAN,
        None => EXIT_LEAKS,
    }
}

fn run() -> Result<i32> {
    let args = Args::parse();
    let palette = if args.no_color { Palette::plain() } else { Palette::detect() };

    if let Some(ref command) = args.command {
        return check(CommandDump::new(command.as_str()), &args, palette);
    }

    match args.dump.as_deref() {
        None | Some("-") => {
            let mut dump = Vec::new();
            std::io::stdin()
                .read_to_end(&mut dump)
                .map_err(ScanError::from)
                .context("Failed to read dump from stdin")?;
            debug!("read {} bytes from stdin", dump.len());
            check(StaticDump::new(dump), &args, palette)
        }
        Some(path) => check(FileDump::new(path), &args, palette),
    }
}

fn check<S: DumpSource>(source: S, args: &Args, palette: Palette) -> Result<i32> {
    let mut detector = LeakDetector::new(source).with_palette(palette);
    let options = args.leak_options();
    let result = if args.pretty { detector.find_pretty(options) } else { detector.find(options) };

    match result {
        Ok(()) => {
            if !args.quiet {
                println!("no unexpected goroutines");
            }
            Ok(EXIT_CLEAN)
        }
        Err(DetectError::Leak(report)) => {
            print!("{report}");
            if let Some(ref path) = args.export {
                export_to_file(&report, path)
                    .with_context(|| format!("Failed to export report to {}", path.display()))?;
                if !args.quiet {
                    println!("saved: {}", path.display());
                }
            }
            Ok(EXIT_LEAKS)
        }
        Err(e) => Err(anyhow::Error::new(e).context("Leak check failed")),
    }
}
