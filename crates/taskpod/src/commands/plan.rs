use colored::Colorize;
use std::path::Path;
use taskpod_core::Probe;

pub fn handle(file: &Path) -> anyhow::Result<()> {
    let group = taskpod_core::parse_kdl_file(file)?;
    let order = group.topological_order()?;

    println!("グループ: {}", group.name.cyan());
    println!();
    println!("{}", "起動計画:".bold());
    println!("  全プロセスを並行起動し、readyシグナルだけを依存順にゲートします");
    println!("  依存待機の上限: {}秒", group.ready_deadline_secs);
    println!();

    println!("{}", "ready順 (依存先が先):".bold());
    for (index, name) in order.iter().enumerate() {
        let process = group
            .process(name)
            .ok_or_else(|| anyhow::anyhow!("プロセス '{}' の定義が見つかりません", name))?;

        let mut notes = Vec::new();
        if name == &group.public {
            notes.push("public".to_string());
        }
        if process.essential {
            notes.push("essential".to_string());
        }
        if !process.depends_on.is_empty() {
            notes.push(format!("depends_on: {}", process.depends_on.join(", ")));
        }
        let suffix = if notes.is_empty() {
            String::new()
        } else {
            format!(" ({})", notes.join(", ")).dimmed().to_string()
        };

        println!("  {}. {}{}", index + 1, name.cyan(), suffix);
        println!(
            "     image: {}  cpu: {}  memory: {} MiB",
            process.image, process.cpu, process.memory_mib
        );
        let probe = match &process.probe.probe {
            Probe::Command { command } => format!("command {}", command.join(" ")),
            Probe::HttpGet { path } => format!("http GET {}", path),
        };
        println!(
            "     probe: {} (interval {}s, timeout {}s, {}回失敗でunhealthy, 猶予{}s)",
            probe,
            process.probe.interval_secs,
            process.probe.timeout_secs,
            process.probe.failure_threshold,
            process.probe.grace_period_secs
        );
    }

    println!();
    println!(
        "トラフィック許可: {} がhealthyになった時点",
        group.public.cyan()
    );

    Ok(())
}
