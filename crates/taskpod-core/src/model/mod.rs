//! モデル定義
//!
//! taskpodで使用されるデータモデルを定義します。
//! 各モデルは機能ごとにモジュールに分離されています。

mod group;
mod probe;
mod process;
mod state;

// Re-exports
pub use group::*;
pub use probe::*;
pub use process::*;
pub use state::*;
