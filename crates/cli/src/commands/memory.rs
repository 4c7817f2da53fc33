//! `patentrag memory`: Show what the memory extractor finds in a history.

use std::path::Path;

use patentrag_config::AppConfig;
use patentrag_core::conversation::recent_window;
use patentrag_pipeline::MemoryExtractor;
use patentrag_pipeline::context::PATTERN_TABLE_VERSION;

pub async fn run(history: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let turns = super::load_history(history).await?;

    let window = recent_window(&turns, config.memory.history_window);
    let memory = MemoryExtractor::new()
        .with_max_facts(config.memory.max_facts)
        .extract(&window);

    println!("🧠 Conversation Memory");
    println!("======================");
    println!(
        "  Turns:      {} (window {}, pattern table v{})",
        turns.len(),
        window.len(),
        PATTERN_TABLE_VERSION
    );

    if memory.is_empty() {
        println!("  (no facts or topics found)");
        return Ok(());
    }

    for fact in &memory.facts {
        println!("  [{}] {}", fact.fact_type, fact.render());
    }
    if !memory.topics.is_empty() {
        let topics: Vec<&str> = memory.topics.iter().map(String::as_str).collect();
        println!("  Topics:     {}", topics.join(", "));
    }

    Ok(())
}
