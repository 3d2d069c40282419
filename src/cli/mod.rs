// src/cli/mod.rs
//
// Command-line interface module

mod args;
mod output;

pub use args::{Args, DEFAULT_SAMPLE_RATE};
pub use output::{file_md5, format_summary, render_report, write_json, write_report};
