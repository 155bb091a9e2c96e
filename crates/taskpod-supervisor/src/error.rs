use taskpod_core::GroupError;
use taskpod_scheduler::SchedulerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("グループ定義エラー: {0}")]
    Group(#[from] GroupError),

    #[error("スケジューラエラー: {0}")]
    Scheduler(#[from] SchedulerError),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
