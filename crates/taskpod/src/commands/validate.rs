use colored::Colorize;
use std::path::Path;

pub fn handle(file: &Path) -> anyhow::Result<()> {
    match taskpod_core::parse_kdl_file(file) {
        Ok(group) => {
            println!("{}", "✓ グループ定義は有効です".green().bold());
            println!();
            println!("グループ: {}", group.name.cyan());
            println!(
                "リソース予約: cpu {} / memory {} MiB",
                group.cpu, group.memory_mib
            );
            println!("公開プロセス: {}", group.public.cyan());
            println!();
            println!("{}", format!("プロセス ({} 個):", group.processes.len()).bold());
            for process in &group.processes {
                let essential = if process.essential {
                    " [essential]".yellow().to_string()
                } else {
                    String::new()
                };
                println!("  • {}{}", process.name.cyan(), essential);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗ 検証エラー:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
