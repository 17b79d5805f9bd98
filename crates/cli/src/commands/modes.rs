//! `baso modes`: List modes and their policies.

use baso_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = config.policy_registry();
    let catalog = config.model_catalog();

    println!(
        "  {:<13} {:<6} {:<24} {:<8} {:<10} {:<6}",
        "MODE", "TIER", "MODEL", "HISTORY", "REASONING", "IMAGES"
    );
    for policy in registry.iter() {
        let reasoning = policy
            .reasoning
            .map(|hint| hint.budget_tokens.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<13} {:<6} {:<24} {:<8} {:<10} {:<6}",
            policy.mode.as_str(),
            format!("{:?}", policy.tier).to_lowercase(),
            catalog.resolve(policy.tier),
            yes_no(policy.uses_history),
            reasoning,
            yes_no(policy.accepts_images),
        );
    }

    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
