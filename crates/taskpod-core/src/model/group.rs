//! プロセスグループ定義

use super::process::ProcessSpec;
use crate::error::{GroupError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

fn default_ready_deadline() -> u64 {
    600
}

/// ProcessGroup - 同一ホスト/ユニット上に同時配置されるプロセスの集合
///
/// 起動順序の依存関係（DAG）と集約リソース予約を持ちます。
/// `ProcessGroup::new` 以外での構築は想定していません。
/// バリデーション（リソース合計・循環依存・名前重複）は構築時に
/// 一度だけ行い、実行時には強制しません。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessGroup {
    /// グループ名
    pub name: String,
    /// グループ全体のCPU予約（整数ユニット）
    pub cpu: u64,
    /// グループ全体のメモリ予約（MiB）
    pub memory_mib: u64,
    /// 所属プロセス（定義順を保持）
    pub processes: Vec<ProcessSpec>,
    /// 外部トラフィック許可の判定対象となる公開プロセス名
    pub public: String,
    /// 依存待機の最大時間（秒）。超過した依存元は
    /// dependency-timeout で停止扱いになる
    #[serde(default = "default_ready_deadline")]
    pub ready_deadline_secs: u64,
}

impl ProcessGroup {
    /// バリデーション済みのProcessGroupを構築
    ///
    /// 構築時エラー（リソース超過・循環依存・名前重複など）は
    /// プロセス起動前に確定的に失敗します。
    pub fn new(
        name: impl Into<String>,
        cpu: u64,
        memory_mib: u64,
        processes: Vec<ProcessSpec>,
        public: impl Into<String>,
    ) -> Result<Self> {
        let group = Self {
            name: name.into(),
            cpu,
            memory_mib,
            processes,
            public: public.into(),
            ready_deadline_secs: default_ready_deadline(),
        };
        group.validate()?;
        Ok(group)
    }

    /// 構築時バリデーション一式
    pub fn validate(&self) -> Result<()> {
        // 名前の重複
        let mut seen = HashSet::new();
        for process in &self.processes {
            if !seen.insert(process.name.as_str()) {
                return Err(GroupError::DuplicateProcessName(process.name.clone()));
            }
        }

        // 公開プロセスの存在
        if self.public.is_empty() {
            return Err(GroupError::PublicProcessMissing);
        }
        if !seen.contains(self.public.as_str()) {
            return Err(GroupError::PublicProcessNotFound(self.public.clone()));
        }

        // 依存先の存在
        for process in &self.processes {
            for dependency in &process.depends_on {
                if !seen.contains(dependency.as_str()) {
                    return Err(GroupError::UnknownDependency {
                        process: process.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        // 循環依存（トポロジカルソートで検出）
        self.topological_order()?;

        // リソース予約の合計 ≤ グループ上限
        let cpu_total: u64 = self.processes.iter().map(|p| p.cpu).sum();
        if cpu_total > self.cpu {
            return Err(GroupError::ResourceBudgetExceeded {
                kind: "cpu",
                requested: cpu_total,
                budget: self.cpu,
            });
        }
        let memory_total: u64 = self.processes.iter().map(|p| p.memory_mib).sum();
        if memory_total > self.memory_mib {
            return Err(GroupError::ResourceBudgetExceeded {
                kind: "memory",
                requested: memory_total,
                budget: self.memory_mib,
            });
        }

        // プローブ設定
        for process in &self.processes {
            process.probe.validate(&process.name, process.port.is_some())?;
        }

        Ok(())
    }

    /// 依存関係DAGのトポロジカル順（依存先が先）を計算
    ///
    /// 循環があれば `CircularDependency` を返します。
    pub fn topological_order(&self) -> Result<Vec<String>> {
        // Kahn法。in-degree = 未充足の依存数
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for process in &self.processes {
            in_degree.insert(&process.name, process.depends_on.len());
            for dependency in &process.depends_on {
                dependents
                    .entry(dependency.as_str())
                    .or_default()
                    .push(&process.name);
            }
        }

        // 定義順を保って安定した順序にする
        let mut queue: Vec<&str> = self
            .processes
            .iter()
            .filter(|p| p.depends_on.is_empty())
            .map(|p| p.name.as_str())
            .collect();

        let mut order = Vec::with_capacity(self.processes.len());
        while !queue.is_empty() {
            let name = queue.remove(0);
            order.push(name.to_string());
            if let Some(children) = dependents.get(name) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push(child);
                        }
                    }
                }
            }
        }

        if order.len() != self.processes.len() {
            let remaining: Vec<&str> = self
                .processes
                .iter()
                .map(|p| p.name.as_str())
                .filter(|name| !order.iter().any(|o| o == name))
                .collect();
            return Err(GroupError::CircularDependency(remaining.join(" -> ")));
        }

        Ok(order)
    }

    /// 名前でプロセスを取得
    pub fn process(&self, name: &str) -> Option<&ProcessSpec> {
        self.processes.iter().find(|p| p.name == name)
    }

    /// 公開プロセスのspecを取得（validate済みなら必ず存在する）
    pub fn public_process(&self) -> Option<&ProcessSpec> {
        self.process(&self.public)
    }
}
