pub mod ask;
pub mod chat;
pub mod complete;
pub mod doctor;
pub mod init;
pub mod modes;

use std::io::Write;
use std::sync::Arc;

use baso_config::AppConfig;
use baso_core::event::SessionEvent;
use baso_core::mode::Mode;
use baso_core::prompt::LanguagePreference;
use baso_session::SessionController;
use tokio::sync::{broadcast, mpsc};

/// Load config and build a controller for `mode`.
///
/// A missing API key stops here with setup instructions.
pub fn open_session(
    mode: &str,
    language: Option<&str>,
) -> Result<(AppConfig, SessionController), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let mode: Mode = mode.parse()?;

    let transport = match baso_providers::build_from_config(&config) {
        Ok(transport) => transport,
        Err(baso_config::ConfigError::MissingApiKey) => {
            print_key_help();
            return Err("No API key found. See above for setup instructions.".into());
        }
        Err(e) => return Err(e.into()),
    };

    let session = SessionController::from_config(&config, mode, transport)?;
    if let Some(language) = language {
        let language: LanguagePreference = language.parse()?;
        session.set_language(Some(language));
    }
    Ok((config, session))
}

fn print_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    BASO_API_KEY   (highest priority)");
    eprintln!("    GEMINI_API_KEY");
    eprintln!("    API_KEY");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
}

/// Print fragments as they arrive.
///
/// Each finished response (completed or failed) sends one `()` on the
/// returned channel so the caller can wait for output to settle.
pub fn spawn_printer(
    mut events: broadcast::Receiver<Arc<SessionEvent>>,
) -> mpsc::UnboundedReceiver<()> {
    let (settled_tx, settled_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Printer fell behind");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event.as_ref() {
                SessionEvent::Fragment { fragment, .. } => {
                    print!("{fragment}");
                    let _ = std::io::stdout().flush();
                }
                SessionEvent::Completed { .. } => {
                    println!();
                    let _ = settled_tx.send(());
                }
                SessionEvent::Failed { message_id, snapshot } => {
                    // Partial output is replaced by the apology
                    if let Some(message) = snapshot.find(message_id) {
                        println!();
                        println!("{}", message.content);
                    }
                    let _ = settled_tx.send(());
                }
                _ => {}
            }
        }
    });

    settled_rx
}
