//! taskpod-supervisor
//!
//! プロセスグループの実行時制御を提供します。
//! プロセスごとのヘルスモニター、依存順のreadyゲート、
//! トラフィック許可ゲート、そしてそれらを束ねるグループスーパーバイザです。

pub mod admission;
pub mod error;
pub mod monitor;
pub mod sequencer;
pub mod supervisor;

pub use admission::*;
pub use error::*;
pub use monitor::*;
pub use sequencer::*;
pub use supervisor::*;
