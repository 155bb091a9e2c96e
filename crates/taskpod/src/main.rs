mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "taskpod")]
#[command(about = "依存順readyとヘルス駆動ライフサイクルを持つプロセスグループ", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// グループ定義を検証
    Validate {
        /// グループ定義ファイル (.kdl)
        #[arg(default_value = "taskpod.kdl", env = "TASKPOD_FILE")]
        file: PathBuf,
    },
    /// 起動計画を表示（起動順・リソース予約・プローブ）
    Plan {
        /// グループ定義ファイル (.kdl)
        #[arg(default_value = "taskpod.kdl", env = "TASKPOD_FILE")]
        file: PathBuf,
    },
    /// グループを起動して監視（Ctrl-Cで解体）
    Up {
        /// グループ定義ファイル (.kdl)
        #[arg(default_value = "taskpod.kdl", env = "TASKPOD_FILE")]
        file: PathBuf,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { file } => commands::validate::handle(&file)?,
        Commands::Plan { file } => commands::plan::handle(&file)?,
        Commands::Up { file } => commands::up::handle(&file).await?,
        Commands::Version => {
            println!("taskpod {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
