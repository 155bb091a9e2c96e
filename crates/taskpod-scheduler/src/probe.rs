//! ヘルスプローブの実行
//!
//! プローブの実行は常にブール値の結果（成功/失敗）に畳み込まれます。
//! タイムアウト・非2xx・非ゼロ終了・実行自体の失敗（プロセス到達不能など）は
//! すべて「失敗した結果」であり、致命的エラーとして区別しません。

use crate::scheduler::{ProcessHandle, Scheduler};
use reqwest::Client;
use taskpod_core::{HealthProbeSpec, Probe};
use tracing::debug;

/// プローブの実行器
///
/// HTTPクライアントを共有するため、モニターごとに1つ生成して使い回します。
#[derive(Clone, Default)]
pub struct ProbeRunner {
    client: Client,
}

impl ProbeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// プローブを1回実行して結果を返す
    ///
    /// 実行時間はspecのtimeoutで必ず抑えられます。interval より短いため、
    /// ブロックしたプローブが次の実行スケジュールを遅らせることはありません。
    pub async fn run(
        &self,
        scheduler: &dyn Scheduler,
        handle: &ProcessHandle,
        port: Option<u16>,
        spec: &HealthProbeSpec,
    ) -> bool {
        match &spec.probe {
            Probe::Command { command } => {
                let argv = shell_command(command);
                let result =
                    tokio::time::timeout(spec.timeout(), scheduler.exec(handle, &argv)).await;
                match result {
                    Ok(Ok(output)) => output.success(),
                    Ok(Err(e)) => {
                        // 実行失敗もプローブ失敗として扱う
                        debug!("プローブ実行エラー ({}): {}", handle.process, e);
                        false
                    }
                    Err(_) => {
                        debug!("プローブタイムアウト ({})", handle.process);
                        false
                    }
                }
            }
            Probe::HttpGet { path } => {
                let Some(port) = port else {
                    // 構築時バリデーションで弾かれるが、念のため失敗扱い
                    return false;
                };
                let url = format!("http://127.0.0.1:{}{}", port, path);
                match self
                    .client
                    .get(&url)
                    .timeout(spec.timeout())
                    .send()
                    .await
                {
                    Ok(response) => response.status().is_success(),
                    Err(e) => {
                        debug!("HTTPプローブ失敗 ({}): {}", handle.process, e);
                        false
                    }
                }
            }
        }
    }
}

/// プローブコマンドをexec用のargvへ変換
///
/// ECS流の "CMD-SHELL" / "CMD" プレフィックスを解釈します。
pub fn shell_command(command: &[String]) -> Vec<String> {
    match command.first().map(String::as_str) {
        Some("CMD-SHELL") => vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            command[1..].join(" "),
        ],
        Some("CMD") => command[1..].to_vec(),
        _ => command.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_shell_wraps_in_sh() {
        let command = vec![
            "CMD-SHELL".to_string(),
            "curl -f http://localhost:8000/health || exit 1".to_string(),
        ];
        assert_eq!(
            shell_command(&command),
            vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "curl -f http://localhost:8000/health || exit 1".to_string(),
            ]
        );
    }

    #[test]
    fn test_cmd_strips_prefix() {
        let command = vec![
            "CMD".to_string(),
            "python".to_string(),
            "healthcheck.py".to_string(),
        ];
        assert_eq!(
            shell_command(&command),
            vec!["python".to_string(), "healthcheck.py".to_string()]
        );
    }

    #[test]
    fn test_bare_argv_passes_through() {
        let command = vec!["true".to_string()];
        assert_eq!(shell_command(&command), vec!["true".to_string()]);
    }
}
