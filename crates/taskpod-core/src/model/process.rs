//! プロセス定義

use super::probe::HealthProbeSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ProcessSpec - グループ内の1プロセスの宣言的な定義
///
/// グループ構築後は不変。変更はグループごとの置き換えで行います。
/// CPU/メモリ予約はプロセスごとの第一級フィールドであり、
/// 外部スケジューラが配置時に消費する静的な宣言です。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSpec {
    /// プロセス名（グループ内で一意）
    pub name: String,
    /// イメージ/アーティファクト参照（不透明な文字列）
    pub image: String,
    /// CPU予約（1024 = 1 vCPU相当の整数ユニット）
    pub cpu: u64,
    /// メモリ予約（MiB）
    pub memory_mib: u64,
    /// 公開ポート（HTTPプローブにも使用）
    pub port: Option<u16>,
    /// 環境変数
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// ヘルスプローブ設定
    pub probe: HealthProbeSpec,
    /// essentialフラグ。trueのプロセスが停止するとグループ全体が失敗する
    #[serde(default)]
    pub essential: bool,
    /// 再起動ポリシー
    #[serde(default)]
    pub restart: RestartPolicy,
    /// readyゲートの依存先プロセス名
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// ログストリームのプレフィックス（ログドライバーに渡すラベル）
    pub log_prefix: Option<String>,
}

impl ProcessSpec {
    /// 最小構成のProcessSpecを生成
    pub fn new(name: impl Into<String>, image: impl Into<String>, probe: HealthProbeSpec) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            cpu: 0,
            memory_mib: 0,
            port: None,
            environment: HashMap::new(),
            probe,
            essential: false,
            restart: RestartPolicy::default(),
            depends_on: Vec::new(),
            log_prefix: None,
        }
    }
}

/// 再起動ポリシー
///
/// essentialプロセスの停止でグループが失敗したとき、
/// 置き換え要求を発行するかどうかを決めます。
/// 実際の置き換え・バックオフは外部のスケーリングコントローラが担います。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// グループ失敗時に置き換え要求を発行（デフォルト）
    #[default]
    Enabled,
    /// 置き換え要求を発行しない
    Disabled,
}

impl RestartPolicy {
    /// 文字列からパース
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "enabled" | "on" => Some(Self::Enabled),
            "disabled" | "off" | "no" => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}
