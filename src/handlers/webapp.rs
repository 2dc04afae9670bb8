use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, MessageId, ReplyParameters};
use tracing::{error, info, warn};

use crate::config::CONFIG;
use crate::db::models::UserInsert;
use crate::handlers::responses::{edit_text_with_retry, send_response};
use crate::llm::{call_gemini, generate_image, generate_video, GeminiImageConfig};
use crate::prompt::template::{DEFAULT_ORIENTATION, DEFAULT_RESOLUTION};
use crate::prompt::{AssembledRequest, GenerationMode};
use crate::state::{AppState, Requester};
use crate::utils::telegram::{chat_action_for_mode, start_chat_action_heartbeat};
use teloxide::requests::Requester as _;

pub async fn handle_web_app_data(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let Some(data) = message.web_app_data() else {
        return Ok(());
    };
    let Some(user) = message.from.clone() else {
        return Ok(());
    };

    let request: AssembledRequest = match serde_json::from_str(&data.data) {
        Ok(request) => request,
        Err(err) => {
            warn!("Failed to parse WebApp submission: {err}");
            bot.send_message(
                message.chat.id,
                "Не удалось обработать данные мини-приложения. Попробуйте ещё раз.",
            )
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
            return Ok(());
        }
    };

    info!(
        "Received WebApp submission: mode={:?}, prompt chars={}, references={}",
        request.mode,
        request.prompt.chars().count(),
        request.references.len()
    );

    let requester = Requester::from_user(&user);
    dispatch_request(&bot, &state, message.chat.id, message.id, &requester, request).await
}

fn mode_title(mode: GenerationMode) -> &'static str {
    match mode {
        GenerationMode::Text => "TEXT",
        GenerationMode::Image => "IMAGE",
        GenerationMode::Video => "VIDEO",
        GenerationMode::Reference => "REFERENCE",
    }
}

fn charge_description(mode: GenerationMode) -> &'static str {
    match mode {
        GenerationMode::Text => "Chat generation",
        GenerationMode::Image => "Image generation",
        GenerationMode::Video => "Video generation",
        GenerationMode::Reference => "Reference image generation",
    }
}

fn prompt_preview(prompt: &str) -> String {
    let preview: String = prompt.chars().take(50).collect();
    if preview.len() < prompt.len() {
        format!("{preview}...")
    } else {
        preview
    }
}

pub async fn dispatch_request(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    reply_to: MessageId,
    requester: &Requester,
    request: AssembledRequest,
) -> Result<()> {
    let user_id = requester.id;

    let Some(_slot) = state.generation_slots.try_acquire(user_id) else {
        bot.send_message(
            chat_id,
            "⏳ Предыдущая генерация ещё выполняется. Дождитесь результата.",
        )
        .reply_parameters(ReplyParameters::new(reply_to))
        .await?;
        return Ok(());
    };

    state
        .db
        .ensure_user(UserInsert {
            id: user_id,
            username: requester.username.clone(),
            full_name: Some(requester.full_name.clone()),
        })
        .await?;

    let charged = state
        .db
        .try_charge(user_id, CONFIG.generation_cost, charge_description(request.mode))
        .await?;
    if !charged {
        bot.send_message(
            chat_id,
            "Недостаточно кредитов. Пополните баланс, чтобы продолжить генерацию.",
        )
        .reply_parameters(ReplyParameters::new(reply_to))
        .await?;
        return Ok(());
    }

    let ack = bot
        .send_message(
            chat_id,
            format!(
                "✅ Задача получена: {}\nПромт: {}",
                mode_title(request.mode),
                prompt_preview(&request.prompt)
            ),
        )
        .reply_parameters(ReplyParameters::new(reply_to))
        .await?;

    let _chat_action = start_chat_action_heartbeat(
        bot.clone(),
        chat_id,
        chat_action_for_mode(request.mode),
    );

    match request.mode {
        GenerationMode::Text => {
            match call_gemini(&request.prompt).await {
                Ok(text) => send_response(bot, chat_id, ack.id, &text).await?,
                Err(err) => {
                    error!("Chat generation failed: {err}");
                    edit_text_with_retry(bot, chat_id, ack.id, &format!("❌ Ошибка генерации: {err}"))
                        .await?;
                }
            }
        }
        GenerationMode::Image | GenerationMode::Reference => {
            let image_config = GeminiImageConfig {
                aspect_ratio: request.params.get("aspectRatio").cloned(),
                image_size: Some(
                    request
                        .params
                        .get("resolution")
                        .cloned()
                        .unwrap_or_else(|| DEFAULT_RESOLUTION.to_string()),
                ),
            };
            match generate_image(&request.prompt, &image_config, &request.references).await {
                Ok(images) => {
                    deliver_images(bot, chat_id, reply_to, ack.id, images, &request.prompt).await?;
                }
                Err(err) => {
                    error!(model = CONFIG.gemini_image_model.as_str(), "Image generation failed: {}", err.0);
                    edit_text_with_retry(
                        bot,
                        chat_id,
                        ack.id,
                        &format!("❌ Ошибка генерации: {}", err.0),
                    )
                    .await?;
                }
            }
        }
        GenerationMode::Video => {
            let orientation = request
                .params
                .get("orientation")
                .cloned()
                .unwrap_or_else(|| DEFAULT_ORIENTATION.to_string());
            match generate_video(&request.prompt, &orientation).await {
                Ok(video) => {
                    bot.send_video(chat_id, InputFile::memory(video))
                        .reply_parameters(ReplyParameters::new(reply_to))
                        .caption(format!("🎬 {}", CONFIG.gemini_video_model))
                        .await?;
                    let _ = edit_text_with_retry(bot, chat_id, ack.id, "Видео готово 👇").await;
                }
                Err(err) => {
                    error!("Video generation failed: {err}");
                    edit_text_with_retry(bot, chat_id, ack.id, &format!("❌ Ошибка генерации: {err}"))
                        .await?;
                }
            }
        }
    }

    Ok(())
}

async fn deliver_images(
    bot: &Bot,
    chat_id: ChatId,
    reply_to: MessageId,
    ack_id: MessageId,
    images: Vec<Vec<u8>>,
    prompt: &str,
) -> Result<()> {
    let caption = format!(
        "🎨 {}\n{}",
        CONFIG.gemini_image_model,
        prompt_preview(prompt)
    );

    let mut image_iter = images.into_iter();
    if let Some(first_image) = image_iter.next() {
        let media = InputMedia::Photo(
            InputMediaPhoto::new(InputFile::memory(first_image.clone())).caption(caption.clone()),
        );
        let edit_result = bot.edit_message_media(chat_id, ack_id, media).await;
        if edit_result.is_err() {
            bot.send_photo(chat_id, InputFile::memory(first_image))
                .reply_parameters(ReplyParameters::new(reply_to))
                .caption(caption)
                .await?;
            let _ = edit_text_with_retry(bot, chat_id, ack_id, "Изображение готово 👇").await;
        }
    }

    for image in image_iter {
        bot.send_photo(chat_id, InputFile::memory(image))
            .reply_parameters(ReplyParameters::new(reply_to))
            .await?;
    }

    Ok(())
}
