// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use colorful::Colorful;
use std::process::ExitCode;

use frequencipher::cli::{format_summary, write_json, write_report, Args};
use frequencipher::analyze_file;

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args
        .analysis_config()
        .context("Failed to load analysis configuration")?;
    let options = args.load_options();

    let (_, result) = analyze_file(&args.input, &options, &config)
        .with_context(|| format!("Failed to analyze {}", args.input.display()))?;

    print!("{}", format_summary(&args.input, &result));

    let failed = result.failed_stages();
    if !failed.is_empty() {
        log::warn!("Stages reported placeholders: {}", failed.join(", "));
    }

    if let Some(path) = &args.dump {
        write_json(&result, path)
            .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
        println!("JSON written to {}", path.display().to_string().cyan());
    }
    if let Some(path) = &args.report {
        write_report(&result, Some(&args.input), path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display().to_string().cyan());
    }

    Ok(())
}
