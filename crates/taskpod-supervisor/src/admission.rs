//! トラフィック許可ゲート
//!
//! 公開プロセスの実効ヘルス状態だけを根拠に、グループインスタンスを
//! ルーティング対象集合に出し入れします。しきい値の判断はヘルス
//! モニターの状態機械に一本化されており、ここで独自のしきい値は
//! 持ちません（二重のヒステリシスによるフラッピングを避けるため）。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use taskpod_core::HealthState;
use tracing::info;

/// TrafficAdmissionController - ルーティング可否のゲート
///
/// 実際のルーティングと接続のドレインは外部ロードバランサの責務で、
/// ここは対象集合の増減を報告するだけです。
#[derive(Clone, Default)]
pub struct TrafficAdmissionController {
    routable: Arc<Mutex<HashSet<String>>>,
}

impl TrafficAdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// 公開プロセスの実効ヘルスを観測して集合を更新
    ///
    /// 可否が反転したときのみ `Some(新しい可否)` を返します。
    pub fn observe(&self, instance: &str, public_health: &HealthState) -> Option<bool> {
        let mut routable = self
            .routable
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if public_health.is_healthy() {
            if routable.insert(instance.to_string()) {
                info!("トラフィック許可: {}", instance);
                return Some(true);
            }
        } else if routable.remove(instance) {
            // 即時に除外する。in-flightリクエストのドレインは外部LBが行う
            info!("トラフィック除外: {}", instance);
            return Some(false);
        }
        None
    }

    /// インスタンスが現在ルーティング対象か
    pub fn is_routable(&self, instance: &str) -> bool {
        self.routable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(instance)
    }

    /// 現在のルーティング対象一覧
    pub fn routable_instances(&self) -> Vec<String> {
        self.routable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
