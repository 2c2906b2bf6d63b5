//! CLI commands that work on the stored session directly

use crate::core::{render_history, DisplayBody, DisplayDirective, ImageSource};
use crate::storage::SessionStore;
use anyhow::{Context, Result};
use colored::Colorize;

/// Output format for `chatdeck history`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum HistoryFormat {
    #[default]
    Text,
    Json,
}

/// Print the rendered conversation
pub async fn run_history(session: &dyn SessionStore, format: HistoryFormat) -> Result<()> {
    let items = session
        .get_items()
        .await
        .context("Failed to read session history")?;
    let directives = render_history(&items);

    match format {
        HistoryFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&directives)?);
        }
        HistoryFormat::Text => {
            if directives.is_empty() {
                println!("{}", "(empty session)".dimmed());
            } else {
                print!("{}", format_history(&directives));
            }
        }
    }
    Ok(())
}

/// Clear the stored conversation
pub async fn run_reset(session: &dyn SessionStore) -> Result<()> {
    session
        .clear_session()
        .await
        .context("Failed to clear session")?;
    println!("{} Cleared session {}", "✓".green(), session.session_id().bold());
    Ok(())
}

/// Plain-text transcript, one header per run of same-role blocks
pub fn format_history(directives: &[DisplayDirective]) -> String {
    let mut out = String::new();
    let mut current_role: Option<&str> = None;

    for directive in directives {
        if current_role != Some(directive.role.as_str()) {
            if current_role.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("{}\n", format!("[{}]", directive.role).bold()));
            current_role = Some(directive.role.as_str());
        }

        match &directive.body {
            DisplayBody::Text(text) => {
                out.push_str(text);
                out.push('\n');
            }
            DisplayBody::Image(ImageSource::Url(url)) if !url.starts_with("data:") => {
                out.push_str(&format!("[image: {}]\n", url));
            }
            DisplayBody::Image(ImageSource::Url(url)) => {
                out.push_str(&format!("[inline image, {} chars]\n", url.len()));
            }
            DisplayBody::Image(ImageSource::Bytes(bytes)) => {
                out.push_str(&format!("[generated image, {} bytes]\n", bytes.len()));
            }
            DisplayBody::Code(code) => {
                for line in code.lines() {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }

    out
}
