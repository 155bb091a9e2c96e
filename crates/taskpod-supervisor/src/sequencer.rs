//! 依存順のreadyゲート
//!
//! プロセスの「起動」は並行で行い順序制約を持ちませんが、
//! 「ready（提供可能）」シグナルは依存先がhealthyになるまで保留します。
//! 依存グラフの循環は構築時バリデーションで弾かれるため、
//! ここでは検出済みのDAGだけを扱います。

use std::collections::HashMap;
use taskpod_core::{GroupError, HealthState, ProcessGroup};

/// StartupSequencer - readyシグナルの依存ゲート
///
/// トポロジカル順を構築時に一度だけ計算し、以降は
/// スナップショットへの純粋な適用だけを行います。
#[derive(Debug)]
pub struct StartupSequencer {
    order: Vec<String>,
    dependencies: HashMap<String, Vec<String>>,
}

impl StartupSequencer {
    pub fn new(group: &ProcessGroup) -> Result<Self, GroupError> {
        let order = group.topological_order()?;
        let dependencies = group
            .processes
            .iter()
            .map(|p| (p.name.clone(), p.depends_on.clone()))
            .collect();
        Ok(Self {
            order,
            dependencies,
        })
    }

    /// 依存先が先に来るトポロジカル順
    pub fn startup_order(&self) -> &[String] {
        &self.order
    }

    /// プロセスの依存先がすべてhealthyか
    pub fn dependencies_met(&self, process: &str, health: &HashMap<String, HealthState>) -> bool {
        self.dependencies
            .get(process)
            .map(|deps| {
                deps.iter()
                    .all(|dep| health.get(dep).is_some_and(HealthState::is_healthy))
            })
            .unwrap_or(true)
    }

    /// モニターの生の状態にreadyゲートを適用した実効状態を計算
    ///
    /// 自身のプローブがhealthyでも、依存先が実効的にhealthyでなければ
    /// starting に保留されます。トポロジカル順に評価するため、
    /// ゲートは依存の連鎖を通じて伝播します。
    pub fn apply_ready_gates(
        &self,
        raw: &HashMap<String, HealthState>,
    ) -> HashMap<String, HealthState> {
        let mut effective = HashMap::with_capacity(self.order.len());
        for name in &self.order {
            let state = raw.get(name).cloned().unwrap_or(HealthState::Starting);
            let gated = if state.is_healthy() && !self.dependencies_met(name, &effective) {
                // readyシグナルを保留
                HealthState::Starting
            } else {
                state
            };
            effective.insert(name.clone(), gated);
        }
        effective
    }

    /// 依存待機がまだ解決していないプロセス
    ///
    /// 依存待機タイムアウト時、ここで返るプロセスが
    /// dependency-timeout で停止扱いになります。
    pub fn blocked_processes(&self, effective: &HashMap<String, HealthState>) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| {
                let state = effective
                    .get(name.as_str())
                    .cloned()
                    .unwrap_or(HealthState::Starting);
                !state.is_stopped() && !self.dependencies_met(name, effective)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpod_core::{HealthProbeSpec, ProcessSpec, StopCause};

    fn spec(name: &str, deps: &[&str]) -> ProcessSpec {
        let mut process = ProcessSpec::new(
            name,
            format!("{}:latest", name),
            HealthProbeSpec::command(vec!["CMD-SHELL", "true"]),
        );
        process.depends_on = deps.iter().map(|d| d.to_string()).collect();
        process
    }

    fn group() -> ProcessGroup {
        ProcessGroup::new(
            "stt",
            0,
            0,
            vec![spec("api", &["whisper"]), spec("whisper", &[])],
            "api",
        )
        .unwrap()
    }

    #[test]
    fn test_startup_order() {
        let sequencer = StartupSequencer::new(&group()).unwrap();
        assert_eq!(sequencer.startup_order(), ["whisper", "api"]);
    }

    #[test]
    fn test_ready_gate_held_while_dependency_unhealthy() {
        let sequencer = StartupSequencer::new(&group()).unwrap();

        // apiのプローブ自体は成功していても、whisperがhealthyでない限り
        // readyシグナルは保留される
        let raw = HashMap::from([
            ("api".to_string(), HealthState::Healthy),
            ("whisper".to_string(), HealthState::Starting),
        ]);
        let effective = sequencer.apply_ready_gates(&raw);
        assert_eq!(effective.get("api"), Some(&HealthState::Starting));

        let raw = HashMap::from([
            ("api".to_string(), HealthState::Healthy),
            ("whisper".to_string(), HealthState::Unhealthy),
        ]);
        let effective = sequencer.apply_ready_gates(&raw);
        assert_eq!(effective.get("api"), Some(&HealthState::Starting));
    }

    #[test]
    fn test_ready_gate_opens_when_dependency_healthy() {
        let sequencer = StartupSequencer::new(&group()).unwrap();
        let raw = HashMap::from([
            ("api".to_string(), HealthState::Healthy),
            ("whisper".to_string(), HealthState::Healthy),
        ]);
        let effective = sequencer.apply_ready_gates(&raw);
        assert_eq!(effective.get("api"), Some(&HealthState::Healthy));
        assert_eq!(effective.get("whisper"), Some(&HealthState::Healthy));
    }

    #[test]
    fn test_gate_propagates_through_chain() {
        let chain = ProcessGroup::new(
            "chain",
            0,
            0,
            vec![spec("a", &["b"]), spec("b", &["c"]), spec("c", &[])],
            "a",
        )
        .unwrap();
        let sequencer = StartupSequencer::new(&chain).unwrap();

        // cが不健全なら、bのhealthyが保留され、aも連鎖的に保留される
        let raw = HashMap::from([
            ("a".to_string(), HealthState::Healthy),
            ("b".to_string(), HealthState::Healthy),
            ("c".to_string(), HealthState::Unhealthy),
        ]);
        let effective = sequencer.apply_ready_gates(&raw);
        assert_eq!(effective.get("b"), Some(&HealthState::Starting));
        assert_eq!(effective.get("a"), Some(&HealthState::Starting));
    }

    #[test]
    fn test_unhealthy_state_is_not_masked_by_gate() {
        let sequencer = StartupSequencer::new(&group()).unwrap();
        // ゲートが保留するのはhealthyだけ。unhealthyはそのまま見える
        let raw = HashMap::from([
            ("api".to_string(), HealthState::Unhealthy),
            ("whisper".to_string(), HealthState::Starting),
        ]);
        let effective = sequencer.apply_ready_gates(&raw);
        assert_eq!(effective.get("api"), Some(&HealthState::Unhealthy));
    }

    #[test]
    fn test_blocked_processes() {
        let sequencer = StartupSequencer::new(&group()).unwrap();

        let effective = HashMap::from([
            ("api".to_string(), HealthState::Starting),
            ("whisper".to_string(), HealthState::Starting),
        ]);
        assert_eq!(sequencer.blocked_processes(&effective), vec!["api"]);

        // 停止済みプロセスは対象外
        let effective = HashMap::from([
            (
                "api".to_string(),
                HealthState::Stopped(StopCause::DependencyTimeout),
            ),
            ("whisper".to_string(), HealthState::Starting),
        ]);
        assert!(sequencer.blocked_processes(&effective).is_empty());

        // 依存が満たされていれば空
        let effective = HashMap::from([
            ("api".to_string(), HealthState::Starting),
            ("whisper".to_string(), HealthState::Healthy),
        ]);
        assert!(sequencer.blocked_processes(&effective).is_empty());
    }
}
