//! ヘルス状態とグループ状態

use super::group::ProcessGroup;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// プロセスごとのヘルス状態
///
/// `starting` が唯一の初期状態。`stopped` はそのインスタンスにとって
/// 終端状態で、以降の扱い（置き換え）はスーパーバイザが決めます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// 起動中（猶予期間を含む）
    Starting,
    /// 健全
    Healthy,
    /// 不健全（連続失敗がしきい値に達した）
    Unhealthy,
    /// 停止（終端）
    Stopped(StopCause),
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, HealthState::Stopped(_))
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Starting => write!(f, "starting"),
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
            HealthState::Stopped(cause) => write!(f, "stopped ({})", cause),
        }
    }
}

/// 停止理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopCause {
    /// プロセス自体が終了した
    Exited,
    /// 依存先が最大待機時間内にhealthyにならなかった
    DependencyTimeout,
    /// グループ解体に伴う停止
    GroupTeardown,
}

impl fmt::Display for StopCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCause::Exited => write!(f, "exited"),
            StopCause::DependencyTimeout => write!(f, "dependency-timeout"),
            StopCause::GroupTeardown => write!(f, "group-teardown"),
        }
    }
}

/// グループの集約状態
///
/// 常にプロセス状態のスナップショットから導出され、独立に保存されません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupState {
    /// 依存関係が未充足（公開プロセスが未ready）
    Initializing,
    /// 公開プロセスがhealthyで全プロセス健全
    Ready,
    /// 非essentialプロセスが不健全だが提供は継続
    Degraded,
    /// essentialプロセスが停止（終端）
    Failed,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupState::Initializing => write!(f, "initializing"),
            GroupState::Ready => write!(f, "ready"),
            GroupState::Degraded => write!(f, "degraded"),
            GroupState::Failed => write!(f, "failed"),
        }
    }
}

/// プロセス状態のスナップショットからグループ状態を導出する純粋関数
///
/// スナップショットに存在しないプロセスは `starting` として扱います。
pub fn derive_group_state(group: &ProcessGroup, health: &HashMap<String, HealthState>) -> GroupState {
    let state_of = |name: &str| health.get(name).cloned().unwrap_or(HealthState::Starting);

    // essentialプロセスの停止は終端
    for process in &group.processes {
        if process.essential && state_of(&process.name).is_stopped() {
            return GroupState::Failed;
        }
    }

    if !state_of(&group.public).is_healthy() {
        return GroupState::Initializing;
    }

    // 公開プロセスはhealthy。非essentialの不調はdegraded
    let all_healthy = group
        .processes
        .iter()
        .all(|p| state_of(&p.name).is_healthy());

    if all_healthy {
        GroupState::Ready
    } else {
        GroupState::Degraded
    }
}
