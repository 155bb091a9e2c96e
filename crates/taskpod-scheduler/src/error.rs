use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • OrbStackまたはDocker Desktopがインストールされているか確認してください"
    )]
    DockerConnectionFailed(String),

    #[error("プロセス '{process}' が見つかりません")]
    ProcessNotFound { process: String },

    #[error("プロセス '{process}' の起動に失敗しました: {message}")]
    LaunchFailed { process: String, message: String },

    #[error("プロセス '{process}' でのコマンド実行に失敗しました: {message}")]
    ExecFailed { process: String, message: String },

    #[error("Docker APIエラー: {0}")]
    DockerApiError(String),
}

impl From<bollard::errors::Error> for SchedulerError {
    fn from(err: bollard::errors::Error) -> Self {
        // 接続エラーの可能性をチェック
        let err_str = err.to_string();
        if err_str.contains("Connection refused") || err_str.contains("No such file or directory")
        {
            SchedulerError::DockerConnectionFailed(err_str)
        } else {
            SchedulerError::DockerApiError(err_str)
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
