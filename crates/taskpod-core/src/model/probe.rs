//! ヘルスプローブ定義

use crate::error::{GroupError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// プローブの実行方法
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Probe {
    /// プロセス内でシェルコマンドを実行（exit 0 = 成功）
    Command { command: Vec<String> },
    /// HTTP GET（2xx = 成功）。ポートはProcessSpecのportを使用する
    HttpGet { path: String },
}

/// ヘルスプローブ設定
///
/// KDL形式：
/// ```kdl
/// probe {
///     http "/management/health"
///     interval 30
///     timeout 5
///     failure_threshold 3
///     success_threshold 3
///     grace_period 300
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthProbeSpec {
    /// プローブの実行方法
    pub probe: Probe,
    /// チェック間隔（秒）
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// タイムアウト（秒）。interval より短いこと
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// healthy → unhealthy に遷移する連続失敗回数
    #[serde(default = "default_threshold")]
    pub failure_threshold: u32,
    /// unhealthy/starting → healthy に遷移する連続成功回数
    #[serde(default = "default_threshold")]
    pub success_threshold: u32,
    /// 起動猶予期間（秒）。この間はプローブ結果で状態遷移しない
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
}

fn default_interval() -> u64 {
    30
}
fn default_timeout() -> u64 {
    5
}
fn default_threshold() -> u32 {
    3
}
fn default_grace_period() -> u64 {
    10
}

impl HealthProbeSpec {
    /// コマンドプローブを生成（しきい値はデフォルト）
    pub fn command<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            probe: Probe::Command {
                command: command.into_iter().map(Into::into).collect(),
            },
            ..Self::defaults()
        }
    }

    /// HTTP GETプローブを生成（しきい値はデフォルト）
    pub fn http_get(path: impl Into<String>) -> Self {
        Self {
            probe: Probe::HttpGet { path: path.into() },
            ..Self::defaults()
        }
    }

    fn defaults() -> Self {
        Self {
            probe: Probe::HttpGet {
                path: "/".to_string(),
            },
            interval_secs: default_interval(),
            timeout_secs: default_timeout(),
            failure_threshold: default_threshold(),
            success_threshold: default_threshold(),
            grace_period_secs: default_grace_period(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// プローブ設定の妥当性を検証
    ///
    /// タイムアウトが interval を超えるとモニターのスケジュールが
    /// 維持できないため、構築時に拒否する。
    pub fn validate(&self, process: &str, has_port: bool) -> Result<()> {
        if self.timeout_secs >= self.interval_secs {
            return Err(GroupError::InvalidProbe {
                process: process.to_string(),
                message: format!(
                    "timeout ({}秒) は interval ({}秒) より短くしてください",
                    self.timeout_secs, self.interval_secs
                ),
            });
        }
        if self.failure_threshold == 0 || self.success_threshold == 0 {
            return Err(GroupError::InvalidProbe {
                process: process.to_string(),
                message: "しきい値は1以上を指定してください".to_string(),
            });
        }
        match &self.probe {
            Probe::Command { command } => {
                if command.is_empty() {
                    return Err(GroupError::InvalidProbe {
                        process: process.to_string(),
                        message: "コマンドプローブにコマンドが指定されていません".to_string(),
                    });
                }
            }
            Probe::HttpGet { path } => {
                if !path.starts_with('/') {
                    return Err(GroupError::InvalidProbe {
                        process: process.to_string(),
                        message: format!("HTTPプローブのパスは '/' で始めてください: {}", path),
                    });
                }
                if !has_port {
                    return Err(GroupError::InvalidProbe {
                        process: process.to_string(),
                        message: "HTTPプローブにはプロセスのport指定が必要です".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
