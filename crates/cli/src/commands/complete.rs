//! `baso complete`: One autocomplete round.

use std::sync::Arc;
use std::time::Duration;

use baso_config::AppConfig;
use baso_core::prompt::PromptAssembler;
use baso_session::Autocompleter;

pub async fn run(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let transport = baso_providers::build_from_config(&config)?;
    let assembler = Arc::new(PromptAssembler::new(
        Arc::new(config.policy_registry()),
        config.model_catalog(),
    ));

    let completer = Autocompleter::new(assembler, transport, &config.autocomplete);
    if text.trim().is_empty() || text.chars().count() < config.autocomplete.min_chars {
        println!(
            "  Type at least {} characters to get a suggestion.",
            config.autocomplete.min_chars
        );
        return Ok(());
    }

    let mut suggestions = completer.subscribe();
    completer.update(text);

    let deadline = config.autocomplete.quiet_window() + config.request_timeout();
    tokio::time::timeout(deadline + Duration::from_secs(1), suggestions.changed())
        .await
        .map_err(|_| "Timed out waiting for a suggestion")??;

    match completer.suggestion() {
        Some(suggestion) => {
            println!("  Suggestion: {suggestion}");
            println!("  Accepted:   {}", completer.accept(text));
        }
        None => println!("  No suggestion."),
    }

    Ok(())
}
