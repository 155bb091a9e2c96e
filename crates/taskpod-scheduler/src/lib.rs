//! taskpod-scheduler
//!
//! 外部スケジューラAPI（launch / terminate / exec）の抽象と、
//! Dockerを使った実装、およびヘルスプローブの実行を提供します。

pub mod converter;
pub mod docker;
pub mod error;
pub mod probe;
pub mod scheduler;

pub use converter::*;
pub use docker::*;
pub use error::*;
pub use probe::*;
pub use scheduler::*;
