//! プロセスごとのヘルスモニター
//!
//! しきい値ベースのヒステリシスを明示的な有限状態機械として実装します。
//! カウンターと猶予期間のエッジケースを実プローブなしで単体テストできる
//! よう、状態機械（ProbeStateMachine）と実行ループ（spawn_monitor）を
//! 分離しています。

use std::sync::Arc;
use taskpod_core::{HealthProbeSpec, HealthState, StopCause};
use taskpod_scheduler::{ProbeRunner, ProcessHandle, Scheduler};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// ヘルス状態の遷移イベント
///
/// モニターは遷移が起きたときだけイベントを発行します。
#[derive(Debug, Clone)]
pub struct HealthEvent {
    pub process: String,
    pub state: HealthState,
}

/// 連続プローブ結果から状態を導く有限状態機械
///
/// 遷移規則:
/// - 連続失敗が failure_threshold に達すると healthy → unhealthy
/// - 連続成功が success_threshold に達すると starting/unhealthy → healthy
/// - 猶予期間中は結果を記録するが、どの向きにも遷移しない
/// - stopped は終端
#[derive(Debug)]
pub struct ProbeStateMachine {
    state: HealthState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    failure_threshold: u32,
    success_threshold: u32,
    grace_until: Instant,
}

impl ProbeStateMachine {
    pub fn new(spec: &HealthProbeSpec, now: Instant) -> Self {
        Self {
            state: HealthState::Starting,
            consecutive_failures: 0,
            consecutive_successes: 0,
            failure_threshold: spec.failure_threshold,
            success_threshold: spec.success_threshold,
            grace_until: now + spec.grace_period(),
        }
    }

    pub fn state(&self) -> &HealthState {
        &self.state
    }

    /// プローブ結果を1件記録し、遷移が起きた場合のみ新しい状態を返す
    pub fn record(&mut self, success: bool, now: Instant) -> Option<HealthState> {
        if self.state.is_stopped() {
            return None;
        }

        if success {
            self.consecutive_successes += 1;
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            self.consecutive_successes = 0;
        }

        // 猶予期間中は状態を変えない（カウンターは進む）
        if now < self.grace_until {
            return None;
        }

        match self.state {
            HealthState::Starting | HealthState::Unhealthy
                if self.consecutive_successes >= self.success_threshold =>
            {
                self.state = HealthState::Healthy;
                self.consecutive_successes = 0;
                Some(HealthState::Healthy)
            }
            HealthState::Healthy if self.consecutive_failures >= self.failure_threshold => {
                self.state = HealthState::Unhealthy;
                self.consecutive_failures = 0;
                Some(HealthState::Unhealthy)
            }
            _ => None,
        }
    }

    /// 終端状態へ遷移させる
    pub fn mark_stopped(&mut self, cause: StopCause) -> Option<HealthState> {
        if self.state.is_stopped() {
            return None;
        }
        self.state = HealthState::Stopped(cause);
        Some(self.state.clone())
    }
}

/// プロセス1つ分のモニタータスクを起動
///
/// モニターごとに独立したタイマーを持ち、他プロセスのプローブに
/// ブロックされません。プローブ実行はtimeout（< interval）で必ず
/// 抑えられるため、次のintervalは常に予定どおり発火します。
pub fn spawn_monitor(
    scheduler: Arc<dyn Scheduler>,
    handle: ProcessHandle,
    port: Option<u16>,
    probe: HealthProbeSpec,
    tx: mpsc::UnboundedSender<HealthEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let runner = ProbeRunner::new();
        let mut fsm = ProbeStateMachine::new(&probe, Instant::now());
        let mut interval = tokio::time::interval(probe.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            // 生存確認。プロセス終了はそのインスタンスの終端
            let outcome = match scheduler.is_running(&handle).await {
                Ok(true) => runner.run(scheduler.as_ref(), &handle, port, &probe).await,
                Ok(false) => {
                    if let Some(state) = fsm.mark_stopped(StopCause::Exited) {
                        info!("プロセス終了を検出: {}", handle.process);
                        let _ = tx.send(HealthEvent {
                            process: handle.process.clone(),
                            state,
                        });
                    }
                    return;
                }
                // 到達不能はプローブ失敗と同じ扱い
                Err(e) => {
                    debug!("生存確認エラー ({}): {}", handle.process, e);
                    false
                }
            };

            if let Some(state) = fsm.record(outcome, Instant::now()) {
                debug!("ヘルス遷移: {} -> {}", handle.process, state);
                if tx
                    .send(HealthEvent {
                        process: handle.process.clone(),
                        state,
                    })
                    .is_err()
                {
                    // スーパーバイザが終了している
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn probe(failure: u32, success: u32, grace_secs: u64) -> HealthProbeSpec {
        let mut spec = HealthProbeSpec::command(vec!["CMD-SHELL", "true"]);
        spec.failure_threshold = failure;
        spec.success_threshold = success;
        spec.grace_period_secs = grace_secs;
        spec
    }

    #[test]
    fn test_initial_state_is_starting() {
        let fsm = ProbeStateMachine::new(&probe(3, 3, 0), Instant::now());
        assert_eq!(*fsm.state(), HealthState::Starting);
    }

    #[test]
    fn test_exactly_s_successes_flip_to_healthy() {
        let now = Instant::now();
        let mut fsm = ProbeStateMachine::new(&probe(3, 3, 0), now);

        assert_eq!(fsm.record(true, now), None);
        assert_eq!(fsm.record(true, now), None);
        // ちょうど3回目で遷移（早すぎず遅すぎず）
        assert_eq!(fsm.record(true, now), Some(HealthState::Healthy));
    }

    #[test]
    fn test_exactly_f_failures_flip_to_unhealthy() {
        let now = Instant::now();
        let mut fsm = ProbeStateMachine::new(&probe(3, 1, 0), now);
        assert_eq!(fsm.record(true, now), Some(HealthState::Healthy));

        assert_eq!(fsm.record(false, now), None);
        assert_eq!(fsm.record(false, now), None);
        assert_eq!(fsm.record(false, now), Some(HealthState::Unhealthy));
    }

    #[test]
    fn test_intervening_success_resets_failure_count() {
        let now = Instant::now();
        let mut fsm = ProbeStateMachine::new(&probe(3, 1, 0), now);
        assert_eq!(fsm.record(true, now), Some(HealthState::Healthy));

        assert_eq!(fsm.record(false, now), None);
        assert_eq!(fsm.record(false, now), None);
        // 成功で連続カウントがリセットされる
        assert_eq!(fsm.record(true, now), None);
        assert_eq!(fsm.record(false, now), None);
        assert_eq!(fsm.record(false, now), None);
        assert_eq!(fsm.record(false, now), Some(HealthState::Unhealthy));
    }

    #[test]
    fn test_failures_never_flip_starting() {
        let now = Instant::now();
        let mut fsm = ProbeStateMachine::new(&probe(1, 1, 0), now);

        // startingからの遷移は成功しきい値のみ。失敗では動かない
        for _ in 0..10 {
            assert_eq!(fsm.record(false, now), None);
        }
        assert_eq!(*fsm.state(), HealthState::Starting);
    }

    #[test]
    fn test_grace_period_blocks_all_transitions() {
        let start = Instant::now();
        let mut fsm = ProbeStateMachine::new(&probe(1, 1, 300), start);

        // 猶予期間内は成功してもstartingのまま
        let during = start + Duration::from_secs(299);
        assert_eq!(fsm.record(true, during), None);
        assert_eq!(*fsm.state(), HealthState::Starting);

        // 猶予明けの最初の記録で遷移できる
        let after = start + Duration::from_secs(300);
        assert_eq!(fsm.record(true, after), Some(HealthState::Healthy));
    }

    #[test]
    fn test_successes_during_grace_count_toward_threshold() {
        let start = Instant::now();
        let mut fsm = ProbeStateMachine::new(&probe(3, 3, 300), start);

        // 猶予内の2回 + 猶予明けの1回で合計3連続
        assert_eq!(fsm.record(true, start + Duration::from_secs(260)), None);
        assert_eq!(fsm.record(true, start + Duration::from_secs(290)), None);
        assert_eq!(
            fsm.record(true, start + Duration::from_secs(320)),
            Some(HealthState::Healthy)
        );
    }

    #[test]
    fn test_unhealthy_recovers_after_s_successes() {
        let now = Instant::now();
        let mut fsm = ProbeStateMachine::new(&probe(1, 2, 0), now);
        fsm.record(true, now);
        fsm.record(true, now);
        assert_eq!(*fsm.state(), HealthState::Healthy);
        assert_eq!(fsm.record(false, now), Some(HealthState::Unhealthy));

        assert_eq!(fsm.record(true, now), None);
        assert_eq!(fsm.record(true, now), Some(HealthState::Healthy));
    }

    #[test]
    fn test_stopped_is_terminal() {
        let now = Instant::now();
        let mut fsm = ProbeStateMachine::new(&probe(1, 1, 0), now);
        assert_eq!(
            fsm.mark_stopped(StopCause::Exited),
            Some(HealthState::Stopped(StopCause::Exited))
        );

        // 以降はどんな結果でも動かない
        assert_eq!(fsm.record(true, now), None);
        assert_eq!(fsm.mark_stopped(StopCause::GroupTeardown), None);
        assert_eq!(*fsm.state(), HealthState::Stopped(StopCause::Exited));
    }
}
