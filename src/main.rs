use std::error::Error;

use dotenvy::dotenv;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

mod config;
mod db;
mod form;
mod handlers;
mod llm;
mod prompt;
mod schema;
mod state;
mod utils;

use config::CONFIG;
use db::database::Database;
use handlers::commands::{
    self, IMAGE_ASPECT_RATIO_CALLBACK_PREFIX, IMAGE_RESOLUTION_CALLBACK_PREFIX,
};
use handlers::webapp;
use state::AppState;
use utils::logging::init_logging;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
    Balance,
    Image(String),
    Vid(String),
    Enhance(String),
}

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    let _guards = init_logging();

    let bot = Bot::new(CONFIG.bot_token.clone());
    info!("Starting TelegramStudioBot (Rust)");

    let db = Database::init(&CONFIG.database_url).await?;
    let schema = schema::load_schema().await;
    let state = AppState::new(db, schema);

    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(
            dptree::filter(|msg: Message| msg.web_app_data().is_some())
                .endpoint(handle_web_app_data),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_chat_message),
        )
        .endpoint(ignore_message);

    let callback_state = state.clone();
    let callback_handler =
        Update::filter_callback_query().endpoint(move |bot: Bot, query: CallbackQuery| {
            let state = callback_state.clone();
            async move { handle_callback_query(bot, state, query).await }
        });

    let handler = dptree::entry()
        .branch(message_handler)
        .branch(callback_handler);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    state: AppState,
    message: Message,
    command: Command,
) -> HandlerResult {
    fn optional_arg(arg: String) -> Option<String> {
        if arg.trim().is_empty() {
            None
        } else {
            Some(arg)
        }
    }

    match command {
        Command::Start => commands::start_handler(bot, state, message).await?,
        Command::Help => commands::help_handler(bot, message).await?,
        Command::Balance => commands::balance_handler(bot, state, message).await?,
        Command::Image(arg) => {
            let arg = optional_arg(arg);
            tokio::spawn(async move {
                if let Err(err) = commands::image_handler(bot, state, message, arg).await {
                    error!("image handler failed: {err}");
                }
            });
        }
        Command::Vid(arg) => {
            let arg = optional_arg(arg);
            tokio::spawn(async move {
                if let Err(err) = commands::vid_handler(bot, state, message, arg).await {
                    error!("vid handler failed: {err}");
                }
            });
        }
        Command::Enhance(arg) => {
            let arg = optional_arg(arg);
            tokio::spawn(async move {
                if let Err(err) = commands::enhance_handler(bot, message, arg).await {
                    error!("enhance handler failed: {err}");
                }
            });
        }
    }
    Ok(())
}

async fn handle_web_app_data(bot: Bot, state: AppState, message: Message) -> HandlerResult {
    tokio::spawn(async move {
        if let Err(err) = webapp::handle_web_app_data(bot, state, message).await {
            error!("web app data handler failed: {err}");
        }
    });
    Ok(())
}

async fn handle_chat_message(bot: Bot, state: AppState, message: Message) -> HandlerResult {
    if let Some(text) = message.text() {
        if text.trim_start().starts_with('/') {
            return Ok(());
        }
    }
    tokio::spawn(async move {
        if let Err(err) = commands::chat_handler(bot, state, message).await {
            error!("chat handler failed: {err}");
        }
    });
    Ok(())
}

async fn handle_callback_query(bot: Bot, state: AppState, query: CallbackQuery) -> HandlerResult {
    let Some(data) = query.data.clone() else {
        return Ok(());
    };
    if data.starts_with(IMAGE_RESOLUTION_CALLBACK_PREFIX)
        || data.starts_with(IMAGE_ASPECT_RATIO_CALLBACK_PREFIX)
    {
        tokio::spawn(async move {
            if let Err(err) = commands::image_selection_callback(bot, state, query).await {
                error!("image selection callback failed: {err}");
            }
        });
    }
    Ok(())
}

async fn ignore_message(_message: Message) -> HandlerResult {
    Ok(())
}
