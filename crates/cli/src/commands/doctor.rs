//! `patentrag doctor`: diagnose configuration and service health.

use patentrag_config::{AppConfig, ServiceBackend};

use crate::bootstrap;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 patentrag Doctor: System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file at {}, using defaults", config_path.display());
    }
    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    if config.backend == ServiceBackend::Openai && !config.has_api_key() {
        println!("  ❌ backend = \"openai\" but no API key (set OPENAI_API_KEY)");
        issues += 1;
    }

    let pipeline = match bootstrap::build_pipeline(&config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            println!("  ❌ Pipeline could not be built: {e}");
            println!("\n  ⚠️  {} issue(s) found. See above for details.", issues + 1);
            return Ok(());
        }
    };

    // Check every collaborator
    for component in pipeline.health().await {
        if component.healthy {
            println!("  ✅ {:<10} {}", component.component, component.name);
        } else {
            let detail = component.detail.as_deref().unwrap_or("not ready");
            println!("  ❌ {:<10} {}: {detail}", component.component, component.name);
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
