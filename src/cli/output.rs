//! Output formatting for CLI results

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};
use colorful::Colorful;

use crate::config::Stage;
use crate::detection::{AnalysisResult, ResultValue, STAGE_FAILED_KEY};
use crate::error::Result;

/// Anomaly scores above this are highlighted in the terminal summary
const ANOMALY_HIGHLIGHT: f64 = 0.6;

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else if value != 0.0 && (value.abs() >= 1e5 || value.abs() < 1e-3) {
        format!("{:.4e}", value)
    } else {
        format!("{:.4}", value)
    }
}

/// Colored summary for the terminal: metadata, every detector metric and the anomaly score
pub fn format_summary(source: &Path, result: &AnalysisResult) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Analyzing: {}", source.display().to_string().cyan());

    if let Some(meta) = result.get("metadata") {
        let field = |key: &str| meta.get(key).and_then(ResultValue::as_scalar).unwrap_or(f64::NAN);
        let _ = writeln!(output, "  Sample Rate: {} Hz", field("sample_rate"));
        let _ = writeln!(output, "  Channels: {}", field("channels"));
        let _ = writeln!(output, "  Duration: {:.2}s", field("duration_seconds"));
    }

    if let Some(summaries) = result
        .stage(Stage::Spectral)
        .and_then(|s| s.get("summaries"))
        .and_then(ResultValue::as_map)
    {
        let _ = writeln!(output, "  Spectral matrices: {}", summaries.len());
    }

    for stage in Stage::detectors() {
        let Some(metrics) = result.stage(stage).and_then(ResultValue::as_map) else {
            continue;
        };
        if metrics.contains_key(STAGE_FAILED_KEY) {
            let _ = writeln!(output, "  {}: {}", stage.name(), "FAILED".red());
            continue;
        }
        let _ = writeln!(output, "  {}:", stage.name().bold());
        for (key, value) in metrics {
            if let Some(v) = value.as_scalar() {
                let _ = writeln!(output, "    {:<28} {}", key, format_value(v));
            }
        }
    }

    if let Some(score) = result
        .stage(Stage::Anomaly)
        .and_then(|a| a.get("anomaly_score"))
        .and_then(ResultValue::as_scalar)
    {
        let text = format_value(score);
        let colored = if score > ANOMALY_HIGHLIGHT {
            text.red()
        } else {
            text.green()
        };
        let _ = writeln!(output, "  Anomaly score: {}", colored);
    }

    output
}

/// Write the full result tree as pretty JSON
pub fn write_json(result: &AnalysisResult, path: &Path) -> Result<()> {
    std::fs::write(path, result.to_json_pretty()?)?;
    Ok(())
}

/// Hex MD5 digest of a file's bytes
pub fn file_md5(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", md5::compute(bytes)))
}

/// Plain-text forensic report: header with timestamp and input digest, then every stage
pub fn render_report(
    result: &AnalysisResult,
    source: Option<&Path>,
    generated: DateTime<Local>,
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "FREQUENCIPHER FORENSIC REPORT");
    let _ = writeln!(output, "Generated: {}", generated.format("%Y-%m-%d %H:%M:%S %z"));
    if let Some(path) = source {
        let _ = writeln!(output, "Input: {}", path.display());
        let digest = file_md5(path).unwrap_or_else(|_| "unavailable".to_string());
        let _ = writeln!(output, "MD5: {}", digest);
    }
    let _ = writeln!(output);

    for (stage, value) in result.iter() {
        let _ = writeln!(output, "[{}]", stage);
        write_node(&mut output, value, 1);
        let _ = writeln!(output);
    }
    output
}

fn write_node(output: &mut String, node: &ResultValue, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        ResultValue::Scalar(v) => {
            let _ = writeln!(output, "{}{}", indent, format_value(*v));
        }
        ResultValue::List(items) => {
            let scalars: Option<Vec<String>> = items
                .iter()
                .map(|i| i.as_scalar().map(format_value))
                .collect();
            match scalars {
                Some(values) => {
                    let _ = writeln!(output, "{}[{}]", indent, values.join(", "));
                }
                None => items.iter().for_each(|i| write_node(output, i, depth + 1)),
            }
        }
        ResultValue::Map(map) => {
            for (key, child) in map {
                match child.as_scalar() {
                    Some(v) => {
                        let _ = writeln!(output, "{}{}: {}", indent, key, format_value(v));
                    }
                    None => {
                        let _ = writeln!(output, "{}{}:", indent, key);
                        write_node(output, child, depth + 1);
                    }
                }
            }
        }
    }
}

pub fn write_report(result: &AnalysisResult, source: Option<&Path>, path: &Path) -> Result<()> {
    std::fs::write(path, render_report(result, source, Local::now()))?;
    Ok(())
}
