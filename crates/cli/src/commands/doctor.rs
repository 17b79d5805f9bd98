//! `baso doctor`: Diagnose configuration and connectivity.

use baso_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Baso Doctor — System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ⚠️  No config file — using defaults (run `baso init`)");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue found. See above for details.");
            return Ok(());
        }
    };

    println!("  ✅ Transport: {}", config.transport);
    println!(
        "  ✅ Models: pro = {}, flash = {}",
        config.models.pro, config.models.flash
    );

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else if config.transport == "gemini" {
        println!("  ❌ No API key — set BASO_API_KEY or api_key in config.toml");
        issues += 1;
    } else {
        println!("  ⚠️  No API key (fine for a local OpenAI-compatible server)");
    }

    match baso_providers::build_from_config(&config) {
        Ok(transport) => match transport.health_check().await {
            Ok(true) => println!("  ✅ {} reachable", transport.name()),
            Ok(false) => {
                println!("  ❌ {} answered, but rejected the request", transport.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ {} unreachable: {e}", transport.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Transport not built: {e}");
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
