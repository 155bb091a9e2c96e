//! probeブロックのパース

use crate::error::{GroupError, Result};
use crate::model::{HealthProbeSpec, Probe};
use kdl::KdlDocument;

/// probeブロックをパース
///
/// `http "/path"` か `command "CMD-SHELL" "..."` のどちらかが必須。
pub fn parse_probe(process: &str, doc: &KdlDocument) -> Result<HealthProbeSpec> {
    let mut kind = None;
    let mut interval = 30;
    let mut timeout = 5;
    let mut failure_threshold = 3;
    let mut success_threshold = 3;
    let mut grace_period = 10;

    for node in doc.nodes() {
        match node.name().value() {
            "http" => {
                if let Some(path) = node.entries().first().and_then(|e| e.value().as_string()) {
                    kind = Some(Probe::HttpGet {
                        path: path.to_string(),
                    });
                }
            }
            "command" => {
                let command: Vec<String> = node
                    .entries()
                    .iter()
                    .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
                    .collect();
                kind = Some(Probe::Command { command });
            }
            "interval" => {
                if let Some(entry) = node.entries().first()
                    && let Some(value) = entry.value().as_integer()
                {
                    interval = value as u64;
                }
            }
            "timeout" => {
                if let Some(entry) = node.entries().first()
                    && let Some(value) = entry.value().as_integer()
                {
                    timeout = value as u64;
                }
            }
            "failure_threshold" => {
                if let Some(entry) = node.entries().first()
                    && let Some(value) = entry.value().as_integer()
                {
                    failure_threshold = value as u32;
                }
            }
            "success_threshold" => {
                if let Some(entry) = node.entries().first()
                    && let Some(value) = entry.value().as_integer()
                {
                    success_threshold = value as u32;
                }
            }
            "grace_period" => {
                if let Some(entry) = node.entries().first()
                    && let Some(value) = entry.value().as_integer()
                {
                    grace_period = value as u64;
                }
            }
            _ => {}
        }
    }

    let probe = kind.ok_or_else(|| GroupError::InvalidProbe {
        process: process.to_string(),
        message: "http または command を指定してください".to_string(),
    })?;

    Ok(HealthProbeSpec {
        probe,
        interval_secs: interval,
        timeout_secs: timeout,
        failure_threshold,
        success_threshold,
        grace_period_secs: grace_period,
    })
}
