use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, ReplyParameters, WebAppInfo,
};
use tracing::warn;

use crate::config::CONFIG;
use crate::db::models::UserInsert;
use crate::form::{FieldChange, FieldValue};
use crate::handlers::responses::{edit_text_with_retry, send_response};
use crate::handlers::webapp::dispatch_request;
use crate::llm::enhance_prompt;
use crate::prompt::template::{
    ASPECT_RATIO_FIELD, MESSAGE_FIELD, RESOLUTION_FIELD, SUBJECT_FIELD, VIDEO_PROMPT_FIELD,
};
use crate::prompt::{assemble, GenerationMode};
use crate::schema::{initial_form_state, Schema};
use crate::state::{AppState, PendingImageRequest, Requester};
use teloxide::requests::Requester as _;

pub const IMAGE_RESOLUTION_CALLBACK_PREFIX: &str = "image_res:";
pub const IMAGE_ASPECT_RATIO_CALLBACK_PREFIX: &str = "image_aspect:";

const RESOLUTION_FALLBACK_OPTIONS: &[&str] = &["1K", "2K", "4K"];
const ASPECT_RATIO_FALLBACK_OPTIONS: &[&str] = &["1:1", "3:4", "4:3", "9:16", "16:9"];

fn studio_keyboard() -> Option<InlineKeyboardMarkup> {
    let url = url::Url::parse(CONFIG.webapp_url.trim()).ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::web_app("🎨 Открыть студию", WebAppInfo { url }),
    ]]))
}

fn field_options<'a>(schema: &'a Schema, field_id: &str, fallback: &[&'a str]) -> Vec<&'a str> {
    match schema.field(field_id) {
        Some(field) if !field.options.is_empty() => {
            field.options.iter().map(String::as_str).collect()
        }
        _ => fallback.to_vec(),
    }
}

fn build_option_keyboard(
    schema: &Schema,
    field_id: &str,
    prefix: &str,
    request_key: &str,
    fallback: &[&str],
) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = field_options(schema, field_id, fallback)
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|option| {
                    InlineKeyboardButton::callback(
                        option.to_string(),
                        format!("{prefix}{request_key}|{option}"),
                    )
                })
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn is_known_option(schema: &Schema, field_id: &str, value: &str, fallback: &[&str]) -> bool {
    field_options(schema, field_id, fallback)
        .iter()
        .any(|option| *option == value)
}

pub async fn start_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let Some(user) = message.from.clone() else {
        return Ok(());
    };
    let requester = Requester::from_user(&user);
    state
        .db
        .ensure_user(UserInsert {
            id: requester.id,
            username: requester.username.clone(),
            full_name: Some(requester.full_name.clone()),
        })
        .await?;
    let balance = state.db.get_balance(requester.id).await?.unwrap_or_default();

    let text = format!(
        "Привет, {}!\nДобро пожаловать в студию генерации.\n\n\
         Откройте мини-приложение, чтобы собрать промт по шагам, \
         или используйте команды — /help.\n\n💳 Баланс: {} кредит(ов).",
        requester.full_name, balance
    );

    let request = bot
        .send_message(message.chat.id, text)
        .reply_parameters(ReplyParameters::new(message.id));
    if let Some(keyboard) = studio_keyboard() {
        request.reply_markup(keyboard).await?;
    } else {
        request.await?;
    }
    Ok(())
}

pub async fn help_handler(bot: Bot, message: Message) -> Result<()> {
    let text = "Команды:\n\
        /start — открыть студию\n\
        /image <сюжет> — сгенерировать изображение (разрешение и формат — кнопками)\n\
        /vid <сцена> — сгенерировать видео\n\
        /enhance <промт> — улучшить черновик промта\n\
        /balance — остаток кредитов\n\n\
        Любое обычное сообщение — чат с ассистентом.";
    bot.send_message(message.chat.id, text)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

pub async fn balance_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let Some(user) = message.from.clone() else {
        return Ok(());
    };
    let requester = Requester::from_user(&user);
    state
        .db
        .ensure_user(UserInsert {
            id: requester.id,
            username: requester.username.clone(),
            full_name: Some(requester.full_name.clone()),
        })
        .await?;
    let user_row = state.db.get_user(requester.id).await?;
    let (balance, premium) = user_row
        .map(|row| (row.balance, row.is_premium))
        .unwrap_or((0, false));

    let mut text = format!("💳 Ваш баланс: {balance} кредит(ов).");
    if premium {
        text.push_str("\n⭐ Premium-аккаунт.");
    }

    let history = state.db.recent_transactions(requester.id, 5).await?;
    if !history.is_empty() {
        text.push_str("\n\nПоследние операции:");
        for entry in history {
            text.push_str(&format!(
                "\n{} {} — {}",
                if entry.amount >= 0 { "➕" } else { "➖" },
                entry.amount.abs(),
                entry.description
            ));
        }
    }

    bot.send_message(message.chat.id, text)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(())
}

pub async fn enhance_handler(bot: Bot, message: Message, draft: Option<String>) -> Result<()> {
    let draft = draft
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let Some(draft) = draft else {
        bot.send_message(message.chat.id, "Укажите черновик промта: /enhance <текст>")
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
        return Ok(());
    };

    let ack = bot
        .send_message(message.chat.id, "✨ Улучшаю промт...")
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;

    match enhance_prompt(&draft, GenerationMode::Image).await {
        Ok(enhanced) => send_response(&bot, message.chat.id, ack.id, &enhanced).await?,
        Err(err) => {
            warn!("Prompt enhancement failed: {err}");
            edit_text_with_retry(
                &bot,
                message.chat.id,
                ack.id,
                "❌ Не удалось улучшить промт. Попробуйте позже.",
            )
            .await?;
        }
    }
    Ok(())
}

pub async fn image_handler(
    bot: Bot,
    state: AppState,
    message: Message,
    subject: Option<String>,
) -> Result<()> {
    let Some(user) = message.from.clone() else {
        return Ok(());
    };
    let subject = subject
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let Some(subject) = subject else {
        bot.send_message(message.chat.id, "Укажите сюжет: /image <кто или что в кадре>")
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
        return Ok(());
    };

    let mut form = initial_form_state(&state.schema);
    form.apply(FieldChange::Set {
        field: SUBJECT_FIELD.to_string(),
        value: FieldValue::scalar(subject),
    });

    let request_key = format!("{}_{}", message.chat.id.0, message.id.0);
    let selection_message = bot
        .send_message(message.chat.id, "Выберите разрешение (по умолчанию: 1K):")
        .reply_parameters(ReplyParameters::new(message.id))
        .reply_markup(build_option_keyboard(
            &state.schema,
            RESOLUTION_FIELD,
            IMAGE_RESOLUTION_CALLBACK_PREFIX,
            &request_key,
            RESOLUTION_FALLBACK_OPTIONS,
        ))
        .await?;

    let pending = PendingImageRequest {
        requester: Requester::from_user(&user),
        chat_id: message.chat.id.0,
        message_id: message.id.0 as i64,
        selection_message_id: selection_message.id.0 as i64,
        form,
    };
    state
        .pending_image_requests
        .lock()
        .insert(request_key.clone(), pending);

    // Selections that never arrive fall back to the assembler defaults.
    let bot_clone = bot.clone();
    let state_clone = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(CONFIG.selection_timeout)).await;
        let still_pending = state_clone
            .pending_image_requests
            .lock()
            .contains_key(&request_key);
        if still_pending {
            if let Err(err) = finalize_image_request(&bot_clone, &state_clone, &request_key).await {
                warn!("image request finalize after timeout failed: {err}");
            }
        }
    });

    Ok(())
}

pub async fn image_selection_callback(
    bot: Bot,
    state: AppState,
    query: CallbackQuery,
) -> Result<()> {
    let _ = bot.answer_callback_query(query.id.clone()).await;
    let Some(data) = &query.data else {
        return Ok(());
    };
    let query_user_id = i64::try_from(query.from.id.0).unwrap_or_default();

    if let Some(payload) = data.strip_prefix(IMAGE_RESOLUTION_CALLBACK_PREFIX) {
        let mut parts = payload.split('|');
        let request_key = parts.next().unwrap_or("");
        let resolution = parts.next().unwrap_or("");
        if !is_known_option(
            &state.schema,
            RESOLUTION_FIELD,
            resolution,
            RESOLUTION_FALLBACK_OPTIONS,
        ) {
            return Ok(());
        }

        {
            let mut pending = state.pending_image_requests.lock();
            let Some(request) = pending.get_mut(request_key) else {
                return Ok(());
            };
            if request.requester.id != query_user_id {
                return Ok(());
            }
            request.form.apply(FieldChange::Set {
                field: RESOLUTION_FIELD.to_string(),
                value: FieldValue::scalar(resolution),
            });
        }

        if let Some(message) = &query.message {
            bot.edit_message_text(
                message.chat().id,
                message.id(),
                format!("Разрешение: {resolution}. Теперь выберите соотношение сторон (по умолчанию: 1:1)."),
            )
            .reply_markup(build_option_keyboard(
                &state.schema,
                ASPECT_RATIO_FIELD,
                IMAGE_ASPECT_RATIO_CALLBACK_PREFIX,
                request_key,
                ASPECT_RATIO_FALLBACK_OPTIONS,
            ))
            .await?;
        }
        return Ok(());
    }

    if let Some(payload) = data.strip_prefix(IMAGE_ASPECT_RATIO_CALLBACK_PREFIX) {
        let mut parts = payload.split('|');
        let request_key = parts.next().unwrap_or("");
        let aspect = parts.next().unwrap_or("");
        if !is_known_option(
            &state.schema,
            ASPECT_RATIO_FIELD,
            aspect,
            ASPECT_RATIO_FALLBACK_OPTIONS,
        ) {
            return Ok(());
        }

        {
            let mut pending = state.pending_image_requests.lock();
            let Some(request) = pending.get_mut(request_key) else {
                return Ok(());
            };
            if request.requester.id != query_user_id {
                return Ok(());
            }
            request.form.apply(FieldChange::Set {
                field: ASPECT_RATIO_FIELD.to_string(),
                value: FieldValue::scalar(aspect),
            });
        }

        finalize_image_request(&bot, &state, request_key).await?;
    }

    Ok(())
}

async fn finalize_image_request(bot: &Bot, state: &AppState, request_key: &str) -> Result<()> {
    let Some(pending) = state.pending_image_requests.lock().remove(request_key) else {
        return Ok(());
    };
    let chat_id = ChatId(pending.chat_id);
    let selection_message_id = teloxide::types::MessageId(pending.selection_message_id as i32);

    match assemble(GenerationMode::Image, &pending.form, &state.schema, None) {
        Ok(request) => {
            let _ = edit_text_with_retry(bot, chat_id, selection_message_id, "Собираю промт...").await;
            dispatch_request(
                bot,
                state,
                chat_id,
                teloxide::types::MessageId(pending.message_id as i32),
                &pending.requester,
                request,
            )
            .await
        }
        Err(err) => {
            edit_text_with_retry(
                bot,
                chat_id,
                selection_message_id,
                &err.user_message(&state.schema),
            )
            .await
        }
    }
}

pub async fn vid_handler(
    bot: Bot,
    state: AppState,
    message: Message,
    scene: Option<String>,
) -> Result<()> {
    let Some(user) = message.from.clone() else {
        return Ok(());
    };
    let scene = scene
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let Some(scene) = scene else {
        bot.send_message(message.chat.id, "Опишите сцену: /vid <что происходит в кадре>")
            .reply_parameters(ReplyParameters::new(message.id))
            .await?;
        return Ok(());
    };

    let mut form = initial_form_state(&state.schema);
    form.apply(FieldChange::Set {
        field: VIDEO_PROMPT_FIELD.to_string(),
        value: FieldValue::scalar(scene),
    });

    match assemble(GenerationMode::Video, &form, &state.schema, None) {
        Ok(request) => {
            let requester = Requester::from_user(&user);
            dispatch_request(&bot, &state, message.chat.id, message.id, &requester, request).await
        }
        Err(err) => {
            bot.send_message(message.chat.id, err.user_message(&state.schema))
                .reply_parameters(ReplyParameters::new(message.id))
                .await?;
            Ok(())
        }
    }
}

pub async fn chat_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    if !message.chat.is_private() {
        return Ok(());
    }
    let Some(user) = message.from.clone() else {
        return Ok(());
    };
    let Some(text) = message.text() else {
        return Ok(());
    };

    let mut form = crate::form::FormState::default();
    form.apply(FieldChange::Set {
        field: MESSAGE_FIELD.to_string(),
        value: FieldValue::scalar(text),
    });

    match assemble(GenerationMode::Text, &form, &state.schema, None) {
        Ok(request) => {
            let requester = Requester::from_user(&user);
            dispatch_request(&bot, &state, message.chat.id, message.id, &requester, request).await
        }
        // Whitespace-only messages are ignored rather than answered.
        Err(_) => Ok(()),
    }
}
