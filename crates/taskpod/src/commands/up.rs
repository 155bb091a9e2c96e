use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use taskpod_core::GroupState;
use taskpod_scheduler::DockerScheduler;
use taskpod_supervisor::GroupSupervisor;

pub async fn handle(file: &Path) -> anyhow::Result<()> {
    let group = taskpod_core::parse_kdl_file(file)?;

    println!("グループ: {}", group.name.cyan());
    println!(
        "{}",
        format!("プロセス一覧 ({} 個):", group.processes.len()).bold()
    );
    for process in &group.processes {
        println!("  • {}", process.name.cyan());
    }

    println!();
    println!("{}", "Dockerに接続中...".blue());
    let docker = taskpod_scheduler::connect().await?;
    let scheduler = Arc::new(DockerScheduler::new(docker));

    let supervisor = GroupSupervisor::new(scheduler);
    let mut handle = supervisor.start(group).await?;
    println!(
        "{}",
        format!("▶ インスタンス {} を起動しました", handle.instance)
            .green()
            .bold()
    );

    loop {
        tokio::select! {
            state = handle.state_changed() => {
                match state {
                    Some(GroupState::Ready) => {
                        println!(
                            "{}",
                            "✓ グループがreadyになりました。トラフィック許可中".green().bold()
                        );
                    }
                    Some(GroupState::Degraded) => {
                        println!("{}", "⚠ グループがdegradedです（公開プロセスは稼働中）".yellow());
                    }
                    Some(GroupState::Initializing) => {
                        println!("{}", "… 依存待機中（トラフィック除外）".blue());
                    }
                    Some(GroupState::Failed) => {
                        eprintln!("{}", "✗ グループが失敗しました".red().bold());
                        if let Some(request) = handle.next_replacement().await {
                            eprintln!(
                                "  essentialプロセス '{}' が停止 ({})。置き換えが必要です",
                                request.process, request.cause
                            );
                        }
                        std::process::exit(1);
                    }
                    // スーパーバイザが終了した
                    None => return Ok(()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", "グループを解体中...".blue());
                handle.shutdown().await;
                println!("{}", "✓ 解体完了".green());
                return Ok(());
            }
        }
    }
}
