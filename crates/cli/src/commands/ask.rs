//! `patentrag ask`: Answer one question through the pipeline.

use std::path::Path;

use patentrag_config::AppConfig;

use crate::bootstrap;

pub async fn run(
    question: &str,
    history: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let history = match history {
        Some(path) => super::load_history(path).await?,
        None => Vec::new(),
    };

    let pipeline = bootstrap::build_pipeline(&config).await?;

    match pipeline.answer(question, &history).await {
        Ok(response) if json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Ok(response) => {
            println!("{}", response.answer);

            let meta = &response.metadata;
            eprintln!();
            eprintln!("  Route:      {} ({})", meta.route, meta.model);
            if let Some(c) = &meta.classification {
                eprintln!("  Classified: {} ({:.2})", c.label, c.confidence);
            }
            for entry in meta.citations.entries() {
                eprintln!("  {}: 출원번호 {}", entry.label, entry.doc_id);
            }
            if meta.any_fallback() {
                eprintln!(
                    "  Fallbacks:  retrieval={} classification={} model={}",
                    meta.retrieval.fallback_used || meta.retrieval.degraded,
                    meta.classification_fallback,
                    meta.model_fallback
                );
            }
            for warning in &meta.warnings {
                eprintln!("  ⚠️  {warning}");
            }
            eprintln!("  Elapsed:    {} ms", meta.elapsed_ms);
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            let hint = if e.is_retryable() { " (retryable)" } else { "" };
            return Err(format!("{e}{hint}").into());
        }
    }

    Ok(())
}
