use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::warn;

const TELEGRAM_MAX_LENGTH: usize = 4000;

pub async fn edit_text_with_retry(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
) -> Result<()> {
    let mut delay = Duration::from_secs_f32(1.5);
    for attempt in 0..3 {
        match bot
            .edit_message_text(chat_id, message_id, text.to_string())
            .await
        {
            Ok(_) => return Ok(()),
            Err(err) => {
                if attempt == 2 {
                    return Err(err.into());
                }
                warn!("edit_message_text failed: {err}");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    Ok(())
}

pub async fn send_response(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    response: &str,
) -> Result<()> {
    let text = if response.chars().count() > TELEGRAM_MAX_LENGTH {
        let truncated: String = response.chars().take(TELEGRAM_MAX_LENGTH - 100).collect();
        format!("{truncated}...\n\n(Ответ был обрезан из-за длины)")
    } else {
        response.to_string()
    };

    edit_text_with_retry(bot, chat_id, message_id, &text).await
}
