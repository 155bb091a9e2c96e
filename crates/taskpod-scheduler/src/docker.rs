//! Dockerバックエンドのスケジューラ実装

// Bollard 0.19.4 の非推奨APIを一時的に使用
#![allow(deprecated)]

use crate::converter::{get_network_name, process_to_container_config};
use crate::error::{Result, SchedulerError};
use crate::scheduler::{ExecOutput, ProcessHandle, Scheduler};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::InspectContainerOptions;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use futures_util::stream::StreamExt;
use taskpod_core::ProcessSpec;
use tracing::{debug, info, warn};

/// Docker接続を初期化して疎通確認する
pub async fn connect() -> Result<Docker> {
    let docker = Docker::connect_with_local_defaults()
        .map_err(|e| SchedulerError::DockerConnectionFailed(e.to_string()))?;
    docker
        .ping()
        .await
        .map_err(|e| SchedulerError::DockerConnectionFailed(e.to_string()))?;
    Ok(docker)
}

/// Dockerをスケジューラとして使う実装
///
/// グループインスタンスごとに専用ブリッジネットワークを作り、
/// プロセス名のエイリアスでコンテナ同士を接続します。
#[derive(Clone)]
pub struct DockerScheduler {
    docker: Docker,
}

impl DockerScheduler {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// グループ用ネットワークを作成（既存なら何もしない）
    async fn ensure_network(&self, group_instance: &str) -> Result<()> {
        let network_name = get_network_name(group_instance);
        let request = bollard::models::NetworkCreateRequest {
            name: network_name.clone(),
            driver: Some("bridge".to_string()),
            ..Default::default()
        };

        match self.docker.create_network(request).await {
            Ok(_) => {
                debug!("ネットワーク作成: {}", network_name);
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 409, ..
            }) => {
                // 既に存在する
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Scheduler for DockerScheduler {
    async fn launch(&self, group_instance: &str, spec: &ProcessSpec) -> Result<ProcessHandle> {
        self.ensure_network(group_instance).await?;

        let (config, options) = process_to_container_config(group_instance, spec);

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| SchedulerError::LaunchFailed {
                process: spec.name.clone(),
                message: e.to_string(),
            })?;

        self.docker
            .start_container(
                &response.id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(|e| SchedulerError::LaunchFailed {
                process: spec.name.clone(),
                message: e.to_string(),
            })?;

        info!("プロセス起動: {} ({})", spec.name, response.id);

        Ok(ProcessHandle {
            id: response.id,
            process: spec.name.clone(),
        })
    }

    async fn terminate(&self, handle: &ProcessHandle) -> Result<()> {
        match self
            .docker
            .stop_container(
                &handle.id,
                None::<bollard::query_parameters::StopContainerOptions>,
            )
            .await
        {
            Ok(_) => {}
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                // 既に停止している
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                return Err(SchedulerError::ProcessNotFound {
                    process: handle.process.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self
            .docker
            .remove_container(
                &handle.id,
                None::<bollard::query_parameters::RemoveContainerOptions>,
            )
            .await
        {
            warn!("コンテナ削除エラー ({}): {}", handle.process, e);
        }

        info!("プロセス終了: {}", handle.process);
        Ok(())
    }

    async fn exec(&self, handle: &ProcessHandle, command: &[String]) -> Result<ExecOutput> {
        let exec_config = CreateExecOptions {
            cmd: Some(command.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let message = self
            .docker
            .create_exec(&handle.id, exec_config)
            .await
            .map_err(|e| SchedulerError::ExecFailed {
                process: handle.process.clone(),
                message: e.to_string(),
            })?;

        let mut collected = String::new();
        match self
            .docker
            .start_exec(&message.id, Some(StartExecOptions::default()))
            .await
            .map_err(|e| SchedulerError::ExecFailed {
                process: handle.process.clone(),
                message: e.to_string(),
            })? {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(msg) = output.next().await {
                    if let Ok(log_output) = msg {
                        collected.push_str(&String::from_utf8_lossy(&log_output.into_bytes()));
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self
            .docker
            .inspect_exec(&message.id)
            .await
            .map_err(|e| SchedulerError::ExecFailed {
                process: handle.process.clone(),
                message: e.to_string(),
            })?;

        Ok(ExecOutput {
            exit_code: inspect.exit_code.unwrap_or(-1),
            output: collected,
        })
    }

    async fn is_running(&self, handle: &ProcessHandle) -> Result<bool> {
        let inspect = self
            .docker
            .inspect_container(&handle.id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| SchedulerError::DockerApiError(e.to_string()))?;

        let state = inspect
            .state
            .ok_or_else(|| SchedulerError::ProcessNotFound {
                process: handle.process.clone(),
            })?;

        Ok(state.running.unwrap_or(false))
    }
}
