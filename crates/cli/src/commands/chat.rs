//! `baso chat`: Interactive conversation.
//!
//! Lines starting with `/` are commands; everything else is submitted.

use baso_core::message::Attachment;
use baso_core::mode::Mode;
use baso_core::prompt::LanguagePreference;
use baso_session::{SessionController, SubmitOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

/// What one line of input asks for.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Message(&'a str),
    Mode(&'a str),
    Language(&'a str),
    Context(&'a str),
    Image(&'a str),
    Reset,
    Exit,
    Help,
    Unknown(&'a str),
}

fn parse_line(line: &str) -> Line<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Line::Message(line);
    };

    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((command, ""));

    match (name, arg) {
        ("exit" | "quit", _) => Line::Exit,
        ("reset" | "clear", _) => Line::Reset,
        ("help", _) => Line::Help,
        ("mode", a) if !a.is_empty() => Line::Mode(a),
        ("lang", a) if !a.is_empty() => Line::Language(a),
        ("context", a) if !a.is_empty() => Line::Context(a),
        ("image", a) if !a.is_empty() => Line::Image(a),
        _ => Line::Unknown(line),
    }
}

fn print_help() {
    println!("  /mode <name>     switch mode (clears the conversation)");
    println!("  /lang <min|id|en> set the answer language");
    println!("  /context <tag>   set the audience or context, once per conversation");
    println!("  /image <path>    attach an image to the next message");
    println!("  /reset           clear the conversation");
    println!("  /exit            quit");
}

fn prompt(session: &SessionController) {
    use std::io::Write;
    print!("  [{}] You > ", session.mode());
    let _ = std::io::stdout().flush();
}

pub async fn run(mode: &str, language: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (config, session) = super::open_session(mode, language.as_deref())?;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Baso — Kawan Baraja Baso Minang        ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Transport: {}", session.transport_name());
    println!("  Models:    {} / {}", config.models.pro, config.models.flash);
    println!("  Mode:      {}", session.mode());
    println!();
    println!("  Type your message and press Enter. /help lists commands.");
    println!();

    let mut settled = super::spawn_printer(session.subscribe());
    let mut staged_image: Option<Attachment> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt(&session);
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Line::Exit => break,
            Line::Help => print_help(),
            Line::Reset => {
                session.reset();
                staged_image = None;
                println!("  Conversation cleared.");
            }
            Line::Mode(name) => match name.parse::<Mode>() {
                Ok(mode) => {
                    session.switch_mode(mode)?;
                    staged_image = None;
                    println!("  Switched to {mode}.");
                }
                Err(e) => eprintln!("  [Error] {e}"),
            },
            Line::Language(code) => match code.parse::<LanguagePreference>() {
                Ok(language) => {
                    session.set_language(Some(language));
                    println!("  Language set to {language}.");
                }
                Err(e) => eprintln!("  [Error] {e}"),
            },
            Line::Context(tag) => {
                if session.set_context_tag(tag) {
                    println!("  Context set to {tag}.");
                } else {
                    println!("  Context is already set for this conversation; /reset to change it.");
                }
            }
            Line::Image(path) => match Attachment::from_path(std::path::Path::new(path)) {
                Ok(image) => {
                    println!("  Attached {} for the next message.", image.media_type);
                    staged_image = Some(image);
                }
                Err(e) => eprintln!("  [Error] {e}"),
            },
            Line::Unknown(text) => eprintln!("  Unknown command: {text} (try /help)"),
            Line::Message(text) => {
                if text.is_empty() && staged_image.is_none() {
                    prompt(&session);
                    continue;
                }
                print!("  Baso > ");
                match session.submit(text, staged_image.take()).await {
                    Ok(SubmitOutcome::Completed(_) | SubmitOutcome::Failed(_)) => {
                        settled.recv().await;
                    }
                    Ok(SubmitOutcome::Busy | SubmitOutcome::Abandoned(_)) => println!(),
                    Err(e) => {
                        println!();
                        eprintln!("  [Error] {e}");
                    }
                }
                println!();
            }
        }
        prompt(&session);
    }

    println!();
    println!("  Sampai basuo liak! 👋");
    println!();
    Ok(())
}
