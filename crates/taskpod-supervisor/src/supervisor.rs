//! グループスーパーバイザ
//!
//! ProcessGroupを起動し、プロセスごとのヘルスモニターを束ね、
//! スナップショットから集約状態を導出して公開します。
//! 集約状態の再計算は単一ライター（イベントループ）に閉じているため、
//! 複数モニターからの並行更新でも一貫性が保たれます。

use crate::admission::TrafficAdmissionController;
use crate::error::Result;
use crate::monitor::{HealthEvent, spawn_monitor};
use crate::sequencer::StartupSequencer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskpod_core::{
    GroupState, HealthState, ProcessGroup, RestartPolicy, StopCause, derive_group_state,
};
use taskpod_scheduler::{ProcessHandle, Scheduler};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 置き換え要求
///
/// essentialプロセスの停止でグループが失敗したときに発行されます。
/// 実際の置き換えとバックオフは外部のスケーリングコントローラの責務です。
#[derive(Debug, Clone)]
pub struct ReplacementRequest {
    pub group: String,
    pub instance: String,
    /// 停止したessentialプロセス
    pub process: String,
    pub cause: StopCause,
}

/// GroupSupervisor - グループのライフサイクル管理
pub struct GroupSupervisor {
    scheduler: Arc<dyn Scheduler>,
    admission: TrafficAdmissionController,
}

impl GroupSupervisor {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            admission: TrafficAdmissionController::new(),
        }
    }

    /// 既存のアドミッションコントローラを共有する
    pub fn with_admission(
        scheduler: Arc<dyn Scheduler>,
        admission: TrafficAdmissionController,
    ) -> Self {
        Self {
            scheduler,
            admission,
        }
    }

    pub fn admission(&self) -> &TrafficAdmissionController {
        &self.admission
    }

    /// グループを起動してハンドルを返す
    ///
    /// 全プロセスを並行起動します（コールドスタート短縮のため、
    /// 起動自体に順序制約はありません）。起動に失敗した場合は
    /// 起動済みのプロセスを巻き戻してからエラーを返します。
    pub async fn start(&self, group: ProcessGroup) -> Result<GroupHandle> {
        group.validate()?;
        let sequencer = StartupSequencer::new(&group)?;

        let instance = format!("{}-{}", group.name, chrono::Utc::now().timestamp_millis());
        info!(
            "グループ起動: {} ({}プロセス, 順序 {:?})",
            instance,
            group.processes.len(),
            sequencer.startup_order()
        );

        let launches = group
            .processes
            .iter()
            .map(|spec| self.scheduler.launch(&instance, spec));
        let results = futures_util::future::join_all(launches).await;

        let mut handles: HashMap<String, ProcessHandle> = HashMap::new();
        let mut launch_error = None;
        for (spec, result) in group.processes.iter().zip(results) {
            match result {
                Ok(handle) => {
                    handles.insert(spec.name.clone(), handle);
                }
                Err(e) => {
                    error!("プロセス起動失敗: {}: {}", spec.name, e);
                    launch_error = Some(e);
                }
            }
        }
        if let Some(e) = launch_error {
            // 起動済みのプロセスを巻き戻す
            for handle in handles.values() {
                if let Err(te) = self.scheduler.terminate(handle).await {
                    warn!("巻き戻しエラー ({}): {}", handle.process, te);
                }
            }
            return Err(e.into());
        }

        // プロセスごとに独立したモニターを起動
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut monitors = HashMap::new();
        for spec in &group.processes {
            if let Some(handle) = handles.get(&spec.name) {
                monitors.insert(
                    spec.name.clone(),
                    spawn_monitor(
                        self.scheduler.clone(),
                        handle.clone(),
                        spec.port,
                        spec.probe.clone(),
                        event_tx.clone(),
                    ),
                );
            }
        }
        drop(event_tx);

        let initial_health: HashMap<String, HealthState> = group
            .processes
            .iter()
            .map(|p| (p.name.clone(), HealthState::Starting))
            .collect();

        let (state_tx, state_rx) = watch::channel(GroupState::Initializing);
        let (health_tx, health_rx) = watch::channel(initial_health.clone());
        let (replace_tx, replace_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let runtime = GroupRuntime {
            group,
            instance: instance.clone(),
            scheduler: self.scheduler.clone(),
            admission: self.admission.clone(),
            sequencer,
            handles,
            monitors,
            raw: initial_health,
            state_tx,
            health_tx,
            replace_tx,
        };
        let task = tokio::spawn(runtime.run(event_rx, shutdown_rx));

        Ok(GroupHandle {
            instance,
            state: state_rx,
            health: health_rx,
            replacements: replace_rx,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// 起動済みグループへのハンドル
pub struct GroupHandle {
    pub instance: String,
    state: watch::Receiver<GroupState>,
    health: watch::Receiver<HashMap<String, HealthState>>,
    replacements: mpsc::UnboundedReceiver<ReplacementRequest>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl GroupHandle {
    /// 現在の集約状態
    pub fn state(&self) -> GroupState {
        *self.state.borrow()
    }

    /// 全プロセスの実効ヘルス状態のスナップショット
    pub fn health(&self) -> HashMap<String, HealthState> {
        self.health.borrow().clone()
    }

    /// 特定プロセスの実効ヘルス状態
    pub fn process_health(&self, process: &str) -> Option<HealthState> {
        self.health.borrow().get(process).cloned()
    }

    /// 集約状態が変わるまで待つ。スーパーバイザ終了後はNone
    pub async fn state_changed(&mut self) -> Option<GroupState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow())
    }

    /// 指定の集約状態になるまで待つ
    pub async fn wait_for(&mut self, target: GroupState) -> bool {
        self.state.wait_for(|s| *s == target).await.is_ok()
    }

    /// 置き換え要求を受信する
    pub async fn next_replacement(&mut self) -> Option<ReplacementRequest> {
        self.replacements.recv().await
    }

    /// 置き換え要求をノンブロッキングで確認する
    pub fn try_replacement(&mut self) -> Option<ReplacementRequest> {
        self.replacements.try_recv().ok()
    }

    /// グループを解体して終了を待つ
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

/// イベントループ本体（集約状態の単一ライター）
struct GroupRuntime {
    group: ProcessGroup,
    instance: String,
    scheduler: Arc<dyn Scheduler>,
    admission: TrafficAdmissionController,
    sequencer: StartupSequencer,
    handles: HashMap<String, ProcessHandle>,
    monitors: HashMap<String, JoinHandle<()>>,
    raw: HashMap<String, HealthState>,
    state_tx: watch::Sender<GroupState>,
    health_tx: watch::Sender<HashMap<String, HealthState>>,
    replace_tx: mpsc::UnboundedSender<ReplacementRequest>,
}

impl GroupRuntime {
    async fn run(
        mut self,
        mut event_rx: mpsc::UnboundedReceiver<HealthEvent>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        // 依存待機はシステム内で唯一の有界待機
        let deadline = tokio::time::sleep(Duration::from_secs(self.group.ready_deadline_secs));
        tokio::pin!(deadline);
        let mut deadline_armed = true;

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(event) => {
                            debug!("ヘルスイベント: {} -> {}", event.process, event.state);
                            self.raw.insert(event.process, event.state);
                        }
                        // 全モニターが終了
                        None => break,
                    }
                }
                _ = &mut deadline, if deadline_armed => {
                    deadline_armed = false;
                    self.expire_dependency_waits();
                }
                _ = &mut shutdown_rx => {
                    info!("シャットダウン要求: {}", self.instance);
                    self.teardown().await;
                    return;
                }
            }

            // スナップショットに対する純粋な再計算（readyゲート → 集約状態）
            let effective = self.sequencer.apply_ready_gates(&self.raw);
            let group_state = derive_group_state(&self.group, &effective);

            let _ = self.health_tx.send(effective.clone());
            if *self.state_tx.borrow() != group_state {
                info!("グループ状態: {} -> {}", self.instance, group_state);
                let _ = self.state_tx.send(group_state);
            }

            if group_state == GroupState::Failed {
                self.fail(&effective).await;
                return;
            }

            let public_health = effective
                .get(&self.group.public)
                .cloned()
                .unwrap_or(HealthState::Starting);
            self.admission.observe(&self.instance, &public_health);

            if group_state == GroupState::Ready {
                // 起動完了。以降の依存待機タイムアウトは適用しない
                deadline_armed = false;
            }
        }

        self.teardown().await;
    }

    /// 依存待機タイムアウト
    ///
    /// 依存先がhealthyにならないままのプロセスをdependency-timeoutで
    /// 停止扱いにします。静かに再試行は行いません。
    fn expire_dependency_waits(&mut self) {
        let effective = self.sequencer.apply_ready_gates(&self.raw);
        for name in self.sequencer.blocked_processes(&effective) {
            warn!(
                "依存待機タイムアウト: {} ({}秒以内に依存先がhealthyになりませんでした)",
                name, self.group.ready_deadline_secs
            );
            self.raw.insert(
                name.clone(),
                HealthState::Stopped(StopCause::DependencyTimeout),
            );
            if let Some(monitor) = self.monitors.remove(&name) {
                monitor.abort();
            }
        }
    }

    /// essentialプロセス停止によるグループ失敗
    async fn fail(&mut self, effective: &HashMap<String, HealthState>) {
        let culprit = self
            .group
            .processes
            .iter()
            .find(|p| {
                p.essential
                    && effective
                        .get(&p.name)
                        .is_some_and(HealthState::is_stopped)
            })
            .cloned();

        self.teardown().await;

        if let Some(process) = culprit {
            let cause = match effective.get(&process.name) {
                Some(HealthState::Stopped(cause)) => *cause,
                _ => StopCause::Exited,
            };
            error!(
                "グループ失敗: {} (essentialプロセス '{}' が停止: {})",
                self.instance, process.name, cause
            );
            // インプレース回復は行わない。置き換えの実施は外部の
            // スケーリングコントローラの責務で、ここでは要求を報告するだけ
            if process.restart == RestartPolicy::Enabled {
                let _ = self.replace_tx.send(ReplacementRequest {
                    group: self.group.name.clone(),
                    instance: self.instance.clone(),
                    process: process.name.clone(),
                    cause,
                });
            }
        }
    }

    /// グループ全体の解体
    async fn teardown(&mut self) {
        for (_, monitor) in self.monitors.drain() {
            monitor.abort();
        }
        for (name, handle) in &self.handles {
            // 既に終了したプロセスにterminateは不要
            if matches!(
                self.raw.get(name),
                Some(HealthState::Stopped(StopCause::Exited))
            ) {
                continue;
            }
            if let Err(e) = self.scheduler.terminate(handle).await {
                warn!("終了処理エラー ({}): {}", name, e);
            }
        }
        for name in self.handles.keys() {
            self.raw
                .entry(name.clone())
                .and_modify(|state| {
                    if !state.is_stopped() {
                        *state = HealthState::Stopped(StopCause::GroupTeardown);
                    }
                });
        }
        // 解体したインスタンスは即座にルーティング対象から外す
        self.admission
            .observe(&self.instance, &HealthState::Stopped(StopCause::GroupTeardown));
        let _ = self.health_tx.send(self.raw.clone());
    }
}
