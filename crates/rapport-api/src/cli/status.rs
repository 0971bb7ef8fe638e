//! Status dashboard: configuration in effect and stored conversations.

use anyhow::Result;
use console::style;

use rapport_core::llm::TextGenerator;
use rapport_infra::config::CONFIG_FILE;

use crate::state::AppState;

/// Display the status dashboard.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let config = state.tracker.config();
    let conversations = state.tracker.repository().list().await?;
    let generator = state.tracker.extractor().generator();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "enabled": config.enabled,
            "tracking_depth": config.tracking_depth.to_string(),
            "partition_mode": config.partition_mode.to_string(),
            "max_memory_entries": config.max_memory_entries,
            "batch_size": config.batch_size,
            "generator": {
                "backend": generator.name(),
                "base_url": config.generator.base_url,
                "model": config.generator.model,
            },
            "conversations": conversations,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let on_off = |on: bool| {
        if on {
            format!("{}", style("on").green())
        } else {
            format!("{}", style("off").red())
        }
    };

    println!();
    println!("  {} rapport v{}", style("*").bold(), env!("CARGO_PKG_VERSION"));
    println!();
    println!(
        "  {:<20} {}",
        style("Data directory").bold(),
        state.data_dir.display()
    );
    println!(
        "  {:<20} {}",
        style("Config file").bold(),
        state.data_dir.join(CONFIG_FILE).display()
    );
    println!("  {:<20} {}", style("Tracking").bold(), on_off(config.enabled));
    println!(
        "  {:<20} {}",
        style("Emotions").bold(),
        on_off(config.use_emotional_context)
    );
    println!(
        "  {:<20} {}",
        style("Depth").bold(),
        style(config.tracking_depth).cyan()
    );
    println!(
        "  {:<20} {}",
        style("Group chats").bold(),
        style(config.partition_mode).cyan()
    );
    println!(
        "  {:<20} {} memories, batches of {}",
        style("Retention").bold(),
        config.max_memory_entries,
        config.batch_size
    );
    println!(
        "  {:<20} {} @ {}",
        style("Generator").bold(),
        style(&config.generator.model).cyan(),
        config.generator.base_url
    );
    println!();

    if conversations.is_empty() {
        println!("  {} No conversations tracked yet.", style("i").blue().bold());
    } else {
        println!("  {} tracked conversation(s):", style(conversations.len()).bold());
        for id in &conversations {
            println!("    {} {}", style("-").dim(), id);
        }
    }
    println!();

    Ok(())
}
