//! taskpod-core
//!
//! プロセスグループのデータモデルと構築時バリデーションを提供します。
//! ここで定義されるモデルは宣言的なデータであり、実行時の振る舞いは
//! taskpod-supervisor が担います。

pub mod error;
pub mod model;
pub mod parser;

pub use error::{GroupError, Result};
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
