//! `baso ask`: Single submission, streamed to stdout.

use std::path::PathBuf;

use baso_core::message::Attachment;
use baso_session::SubmitOutcome;

pub async fn run(
    mode: &str,
    context: Option<String>,
    image: Option<PathBuf>,
    language: Option<String>,
    text: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_config, session) = super::open_session(mode, language.as_deref())?;

    let attachment = image.as_deref().map(Attachment::from_path).transpose()?;
    if let Some(tag) = &context {
        session.set_context_tag(tag.as_str());
    }

    let mut settled = super::spawn_printer(session.subscribe());
    let outcome = session.submit(text, attachment).await?;

    if matches!(outcome, SubmitOutcome::Completed(_) | SubmitOutcome::Failed(_)) {
        settled.recv().await;
    }
    if matches!(outcome, SubmitOutcome::Failed(_)) {
        return Err("The request failed. Run `baso doctor` to check your setup.".into());
    }

    Ok(())
}
