//! KDLパーサー
//!
//! taskpodのグループ定義ファイルをパースします。
//! パースに成功した時点で構築時バリデーション済みのProcessGroupが得られます。

mod probe;
mod process;

use crate::error::{GroupError, Result};
use crate::model::ProcessGroup;
use kdl::KdlDocument;
use process::parse_process;
use std::fs;
use std::path::Path;

/// KDLファイルをパースしてProcessGroupを生成
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<ProcessGroup> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, name)
}

/// KDL文字列をパース
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<ProcessGroup> {
    let doc: KdlDocument = content.parse()?;

    let group_node = doc
        .nodes()
        .iter()
        .find(|n| n.name().value() == "group")
        .ok_or_else(|| GroupError::InvalidConfig("group ノードが見つかりません".to_string()))?;

    let name = group_node
        .entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
        .unwrap_or(default_name);

    let mut group = ProcessGroup {
        name,
        cpu: 0,
        memory_mib: 0,
        processes: Vec::new(),
        public: String::new(),
        ready_deadline_secs: 600,
    };

    if let Some(children) = group_node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "cpu" => {
                    if let Some(entry) = child.entries().first()
                        && let Some(value) = entry.value().as_integer()
                    {
                        group.cpu = value as u64;
                    }
                }
                "memory" => {
                    if let Some(entry) = child.entries().first()
                        && let Some(value) = entry.value().as_integer()
                    {
                        group.memory_mib = value as u64;
                    }
                }
                "ready_deadline" => {
                    if let Some(entry) = child.entries().first()
                        && let Some(value) = entry.value().as_integer()
                    {
                        group.ready_deadline_secs = value as u64;
                    }
                }
                "public" => {
                    if let Some(name) = child.entries().first().and_then(|e| e.value().as_string())
                    {
                        group.public = name.to_string();
                    }
                }
                "process" => {
                    group.processes.push(parse_process(child)?);
                }
                _ => {}
            }
        }
    }

    // 構築時バリデーション（起動前に確定的に失敗させる）
    group.validate()?;

    Ok(group)
}

#[cfg(test)]
mod tests;
