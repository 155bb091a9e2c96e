//! スケジューラAPIの抽象
//!
//! グループスーパーバイザはこのトレイト越しにプロセスを起動・終了し、
//! コマンド型プローブを実行します。実装はDocker（docker.rs）のほか、
//! systemdユニットや独自スーパーバイザでも構いません。

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskpod_core::ProcessSpec;

/// 起動済みプロセスへのハンドル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    /// スケジューラ固有のID（DockerならコンテナID）
    pub id: String,
    /// プロセス名
    pub process: String,
}

/// exec の実行結果
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// 外部スケジューラの抽象トレイト
///
/// すべての実装は配置・リソース制限を自身の流儀で扱ってよい。
/// taskpodはここで宣言された予約値を実行時に強制しません。
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// ProcessSpecを起動してハンドルを返す
    async fn launch(&self, group_instance: &str, spec: &ProcessSpec) -> Result<ProcessHandle>;

    /// プロセスを終了する
    async fn terminate(&self, handle: &ProcessHandle) -> Result<()>;

    /// プロセス内でコマンドを実行する（コマンド型プローブ用）
    async fn exec(&self, handle: &ProcessHandle, command: &[String]) -> Result<ExecOutput>;

    /// プロセスが実行中かどうか
    async fn is_running(&self, handle: &ProcessHandle) -> Result<bool>;
}
