use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroupError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("プロセス名 '{0}' がグループ内で重複しています")]
    DuplicateProcessName(String),

    #[error("プロセス '{process}' の依存先 '{dependency}' がグループ内に見つかりません")]
    UnknownDependency { process: String, dependency: String },

    #[error("循環依存が検出されました: {0}")]
    CircularDependency(String),

    #[error(
        "{kind} の予約合計がグループ上限を超えています: 合計 {requested} > 上限 {budget}\n\nヒント:\n  • 各プロセスの予約値を見直してください\n  • グループの {kind} 上限を引き上げてください"
    )]
    ResourceBudgetExceeded {
        kind: &'static str,
        requested: u64,
        budget: u64,
    },

    #[error("公開プロセス '{0}' がグループ内に定義されていません")]
    PublicProcessNotFound(String),

    #[error("グループに公開プロセスが指定されていません")]
    PublicProcessMissing,

    #[error("プロセス '{process}' のプローブ設定が不正です: {message}")]
    InvalidProbe { process: String, message: String },
}

pub type Result<T> = std::result::Result<T, GroupError>;
