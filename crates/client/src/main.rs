//! casesync-tail - follow one case conversation from the terminal.
//!
//! Prints messages as they arrive and sends every line typed on stdin.
//! `/more` loads older history, `/read` marks the other party's messages read.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use casesync_client::ws::TungsteniteTransport;
use casesync_client::{
    socket_url, ApiClient, ClientConfig, ConversationParams, ConversationSession,
    ConversationView, SyncConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casesync_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    if config.case_id.is_empty() || config.user_id.is_empty() || config.other_user_id.is_empty() {
        bail!("CASESYNC_CASE_ID, CASESYNC_USER_ID and CASESYNC_OTHER_USER_ID must be set");
    }
    url::Url::parse(&config.ws_url)
        .with_context(|| format!("invalid CASESYNC_WS_URL '{}'", config.ws_url))?;

    let api = ApiClient::new()
        .with_base_url(config.api_url.clone())
        .with_token(config.token.clone());
    let ws_url = config.ws_url.clone();

    let session = ConversationSession::new(
        ConversationParams {
            case_id: config.case_id.clone(),
            current_user_id: config.user_id.clone(),
            current_user_name: config.user_name.clone(),
            current_user_role: config.user_role.clone(),
            other_user_id: config.other_user_id.clone(),
        },
        Arc::new(api),
        Arc::new(TungsteniteTransport::new()),
        move |token| socket_url(&ws_url, token),
        SyncConfig::from_env(),
    );
    session.mount();

    let mut changes = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printer = Printer::default();

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                printer.render(&session.view());
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                handle_line(&session, line.trim());
            }
        }
    }

    session.unmount();
    Ok(())
}

fn handle_line(session: &ConversationSession, line: &str) {
    match line {
        "" => {}
        "/more" => {
            let session = session.clone();
            tokio::spawn(async move {
                if let Err(e) = session.load_more().await {
                    println!("! could not load older messages: {}", e.user_message());
                }
            });
        }
        "/read" => {
            let unread: Vec<String> = session
                .messages()
                .into_iter()
                .filter(|m| !m.is_mine && m.read_at.is_none())
                .map(|m| m.id)
                .collect();
            let session = session.clone();
            tokio::spawn(async move { session.mark_as_read(unread).await });
        }
        text => {
            session.set_typing_indicator(false);
            let send = session.send(text);
            tokio::spawn(async move {
                if let Err(e) = send.await {
                    println!("! message not sent: {}", e.user_message());
                }
            });
        }
    }
}

/// Prints each confirmed message once, plus status changes.
#[derive(Default)]
struct Printer {
    printed: HashSet<String>,
    status: Option<String>,
}

impl Printer {
    fn render(&mut self, view: &ConversationView) {
        let status = status_line(view);
        if self.status.as_deref() != Some(status.as_str()) {
            println!("-- {}", status);
            self.status = Some(status);
        }

        for msg in view.messages.iter().filter(|m| !m.is_placeholder()) {
            if self.printed.insert(msg.id.clone()) {
                let who = if msg.is_mine { "you" } else { msg.sender_name.as_str() };
                println!(
                    "[{}] {} ({}): {}",
                    msg.created_at.format("%Y-%m-%d %H:%M"),
                    who,
                    msg.sender_role,
                    msg.content
                );
            }
        }
    }
}

fn status_line(view: &ConversationView) -> String {
    let mut parts = vec![format!("{:?}", view.connection_state).to_lowercase()];
    if view.is_loading {
        parts.push("loading".to_string());
    }
    if let Some(err) = &view.ws_error {
        parts.push(err.clone());
    }
    if let Some(err) = &view.error {
        parts.push(format!("history unavailable: {}", err));
    }
    if view.is_typing {
        parts.push("other party is typing".to_string());
    }
    if view.pending_sends > 0 {
        parts.push(format!("{} sending", view.pending_sends));
    }
    parts.join(" | ")
}
