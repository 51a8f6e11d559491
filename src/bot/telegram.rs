use std::sync::Arc;

use eyre::Result;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup};
use teloxide::RequestError;
use tracing::{debug, error, info, warn};

use super::command::Command;
use super::prompt::MAIN_MENU;
use super::{Keyboard, Reply, TodoBot};

const HANDLER_FAILED: &str = "Something went wrong while handling your request. Please try again later.";

/// Poll Telegram for updates and answer them until interrupted with Ctrl-C.
pub async fn run(bot: Bot, todo: Arc<TodoBot>) -> Result<()> {
    let commands = Command::ALL
        .into_iter()
        .map(|command| BotCommand::new(command.name(), command.description()));
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("Failed to register bot commands: {}", e);
    }

    info!("Listening for Telegram updates");

    let handler = Update::filter_message().endpoint(handle_message);
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![todo])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Dispatcher stopped");
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, todo: Arc<TodoBot>) -> Result<(), RequestError> {
    let (Some(user), Some(text)) = (msg.from(), msg.text()) else {
        debug!("Ignoring non-text message in chat {}", msg.chat.id);
        return Ok(());
    };
    let user_id = user.id.0.to_string();

    let replies = replies_or_failure(&user_id, todo.handle_input(&user_id, text).await);

    for reply in replies {
        let mut request = bot.send_message(msg.chat.id, reply.text);
        if let Some(markup) = reply_markup(reply.keyboard) {
            request = request.reply_markup(markup);
        }
        request.await?;
    }

    Ok(())
}

/// Router errors are logged and turned into a single apology with the menu.
fn replies_or_failure(user_id: &str, result: Result<Vec<Reply>>) -> Vec<Reply> {
    match result {
        Ok(replies) => replies,
        Err(e) => {
            error!(user_id, "Failed to handle message: {:#}", e);
            vec![Reply {
                text: HANDLER_FAILED.to_string(),
                keyboard: Keyboard::MainMenu,
            }]
        }
    }
}

fn reply_markup(keyboard: Keyboard) -> Option<ReplyMarkup> {
    match keyboard {
        Keyboard::Keep => None,
        Keyboard::MainMenu => Some(main_menu().into()),
        Keyboard::Remove => Some(KeyboardRemove::new().into()),
    }
}

fn main_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(
        MAIN_MENU
            .iter()
            .map(|command| vec![KeyboardButton::new(format!("/{}", command.name()))]),
    )
    .resize_keyboard(true)
    .one_time_keyboard(true)
}
