//! processノードのパース

use super::probe::parse_probe;
use crate::error::{GroupError, Result};
use crate::model::{ProcessSpec, RestartPolicy};
use kdl::KdlNode;

/// process ノードをパース
pub fn parse_process(node: &KdlNode) -> Result<ProcessSpec> {
    let name = node
        .entries()
        .first()
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| GroupError::InvalidConfig("process には名前が必要です".to_string()))?
        .to_string();

    let mut image = None;
    let mut probe = None;
    let mut process = ProcessSpec::new(&name, "", crate::model::HealthProbeSpec::command(["true"]));

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "image" => {
                    image = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_string())
                        .map(|s| s.to_string());
                }
                "cpu" => {
                    if let Some(entry) = child.entries().first()
                        && let Some(value) = entry.value().as_integer()
                    {
                        process.cpu = value as u64;
                    }
                }
                "memory" => {
                    if let Some(entry) = child.entries().first()
                        && let Some(value) = entry.value().as_integer()
                    {
                        process.memory_mib = value as u64;
                    }
                }
                "port" => {
                    if let Some(entry) = child.entries().first()
                        && let Some(value) = entry.value().as_integer()
                    {
                        process.port = Some(value as u16);
                    }
                }
                "essential" => {
                    // 引数なしの `essential` はtrue扱い
                    process.essential = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_bool())
                        .unwrap_or(true);
                }
                "restart" => {
                    if let Some(policy_str) =
                        child.entries().first().and_then(|e| e.value().as_string())
                    {
                        process.restart =
                            RestartPolicy::parse(policy_str).ok_or_else(|| {
                                GroupError::InvalidConfig(format!(
                                    "不明な再起動ポリシー: {}",
                                    policy_str
                                ))
                            })?;
                    }
                }
                "log_prefix" => {
                    process.log_prefix = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_string())
                        .map(|s| s.to_string());
                }
                "depends_on" => {
                    process.depends_on = child
                        .entries()
                        .iter()
                        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
                        .collect();
                }
                // env と environment 両方をサポート
                "environment" | "env" => {
                    if let Some(envs) = child.children() {
                        for env_node in envs.nodes() {
                            let key = env_node.name().value().to_string();
                            let value = env_node
                                .entries()
                                .first()
                                .and_then(|e| e.value().as_string())
                                .unwrap_or("")
                                .to_string();
                            process.environment.insert(key, value);
                        }
                    } else if let Some(val) =
                        child.entries().first().and_then(|e| e.value().as_string())
                    {
                        // フラットな env "KEY=VALUE" 形式
                        if let Some((k, v)) = val.split_once('=') {
                            process
                                .environment
                                .insert(k.trim().to_string(), v.trim().to_string());
                        }
                    }
                }
                "probe" => {
                    if let Some(probe_children) = child.children() {
                        probe = Some(parse_probe(&name, probe_children)?);
                    }
                }
                _ => {}
            }
        }
    }

    process.image = image.ok_or_else(|| {
        GroupError::InvalidConfig(format!("プロセス '{}' に image が指定されていません", name))
    })?;
    process.probe = probe.ok_or_else(|| GroupError::InvalidProbe {
        process: name.clone(),
        message: "probe が定義されていません".to_string(),
    })?;

    Ok(process)
}
