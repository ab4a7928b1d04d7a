use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{error, info, warn};

use crate::bot::Responder;
use crate::platform::IncomingMessage;
use crate::plugins::leave::LEAVE_REPLY;

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Pull the leave marker out of a joined reply. Returns the text still to
/// post and whether the bot should leave the chat afterwards.
fn take_leave(reply: &str) -> (String, bool) {
    let mut leave = false;
    let rest: Vec<&str> = reply
        .lines()
        .filter(|line| {
            let is_leave = line.trim() == LEAVE_REPLY;
            leave |= is_leave;
            !is_leave
        })
        .collect();
    (rest.join("\n"), leave)
}

/// Run the Telegram platform. An empty `allowed_chat_ids` accepts every chat.
pub async fn run(responder: Arc<Responder>, allowed_chat_ids: Vec<i64>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message()
        .filter_map(move |msg: Message| {
            if allowed_chat_ids.is_empty() || allowed_chat_ids.contains(&msg.chat.id.0) {
                Some(msg)
            } else {
                None
            }
        })
        .endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![responder])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, responder: Arc<Responder>) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    let (user_id, user_name) = match msg.from.as_ref() {
        Some(user) => (user.id.0.to_string(), user.first_name.clone()),
        None => (String::new(), String::new()),
    };

    let incoming = IncomingMessage {
        platform: "telegram".to_string(),
        user_id,
        chat_id: msg.chat.id.0.to_string(),
        user_name,
        text,
    };

    let reply = match responder.on_message(&incoming).await {
        Ok(Some(reply)) => reply,
        Ok(None) => return Ok(()),
        Err(e) => {
            // one bad lookup must not take the listener down
            error!("Error processing message in chat {}: {:#}", incoming.chat_id, e);
            return Ok(());
        }
    };

    info!(
        "Replying in chat {} to {}: {} chars",
        incoming.chat_id,
        incoming.user_name,
        reply.len()
    );

    let (reply, leave) = take_leave(&reply);

    if !reply.trim().is_empty() {
        for chunk in split_message(&reply, 4000) {
            if let Err(e) = bot.send_message(msg.chat.id, chunk).await {
                warn!("Failed to send reply chunk: {}", e);
            }
        }
    }

    if leave {
        info!("Leaving chat {}", incoming.chat_id);
        if let Err(e) = bot.leave_chat(msg.chat.id).await {
            warn!("Failed to leave chat {}: {}", incoming.chat_id, e);
        }
    }

    Ok(())
}
