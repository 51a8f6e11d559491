pub mod command;
pub mod conversation_state;
pub mod prompt;
pub mod telegram;

use std::sync::Arc;

use command::{Command, Input};
use conversation_state::{ConversationState, Conversations};
use eyre::Result;
use prompt::{command_help, numbered_list, MAIN_MENU};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::openai_client::Organizer;
use crate::task_store::{DeleteError, TaskStore};

const WELCOME_TEXT: &str = "Hi! I'm your to-do list bot. You can use the following commands:";

const ADD_PROMPT: &str = "Please type the task you want to add:";
const MORE_TEXT: &str = "You can add more tasks or use other commands:";
const EMPTY_LIST: &str = "Your task list is empty.";
const NOTHING_TO_DELETE: &str = "Your task list is empty, there are no tasks to delete.";
const BAD_INDEX: &str = "Invalid number. Please choose a valid task number.";
const NOT_A_NUMBER: &str = "Please type the task number correctly.";
const CANCELLED: &str = "Operation cancelled.";
const NOTHING_TO_CANCEL: &str = "There is nothing to cancel.";
const NOTHING_TO_ORGANIZE: &str = "There are no tasks to organize.";
const ORGANIZE_FAILED: &str = "An error occurred while contacting ChatGPT. Please try again later.";
const UNKNOWN_INPUT: &str = "I didn't understand that. Send /help to see the available commands.";

/// What to do with the reply keyboard when a message is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave whatever the user currently sees
    Keep,
    MainMenu,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::Keep,
        }
    }

    fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

/// Routes chat messages to task operations, tracking each user's pending
/// conversation.
pub struct TodoBot {
    store: TaskStore,
    organizer: Arc<dyn Organizer>,
    conversations: Mutex<Conversations>,
}

impl TodoBot {
    pub fn new(store: TaskStore, organizer: Arc<dyn Organizer>) -> Self {
        Self {
            store,
            organizer,
            conversations: Mutex::new(Conversations::new()),
        }
    }

    /// Handle one message from `user_id` and return the replies to send, in order.
    ///
    /// Text, `/cancel`, `/add` and `/delete` end a pending conversation. The
    /// one-shot commands and unknown commands answer without touching it, so
    /// the next text still completes the conversation. Storage failures are
    /// returned as errors.
    pub async fn handle_input(&self, user_id: &str, text: &str) -> Result<Vec<Reply>> {
        let input = Input::parse(text);
        let pending = {
            let mut conversations = self.conversations.lock().await;
            if input.ends_conversation() {
                conversations.take(user_id)
            } else {
                conversations.get(user_id)
            }
        };
        debug!(user_id, ?pending, ?input, "Handling message");

        match (pending, input) {
            (ConversationState::Idle, Input::Command(command)) => self.handle_command(user_id, command).await,
            (_, Input::Command(Command::Cancel)) => Ok(vec![Reply::with_keyboard(CANCELLED, Keyboard::Remove)]),
            (ConversationState::AwaitingNewTask, Input::Text(task)) => self.add_task(user_id, &task).await,
            (ConversationState::AwaitingDeleteIndex, Input::Text(raw_index)) => {
                self.delete_task(user_id, &raw_index).await
            }
            (pending, Input::Command(command)) => {
                if command.starts_conversation() {
                    debug!(user_id, ?pending, "Abandoning conversation for /{}", command.name());
                }
                self.handle_command(user_id, command).await
            }
            (_, Input::UnknownCommand(_)) | (ConversationState::Idle, Input::Text(_)) => {
                Ok(vec![Reply::text(UNKNOWN_INPUT)])
            }
        }
    }

    async fn handle_command(&self, user_id: &str, command: Command) -> Result<Vec<Reply>> {
        match command {
            Command::Start => Ok(vec![Reply::with_keyboard(
                format!("{}\n{}", WELCOME_TEXT, command_help(&MAIN_MENU)),
                Keyboard::MainMenu,
            )]),
            Command::Help => Ok(vec![Reply::text(format!(
                "Available commands:\n{}",
                command_help(&Command::ALL[1..])
            ))]),
            Command::Add => {
                self.set_state(user_id, ConversationState::AwaitingNewTask).await;
                Ok(vec![Reply::with_keyboard(ADD_PROMPT, Keyboard::Remove)])
            }
            Command::List => self.list_tasks(user_id).await,
            Command::Delete => self.start_delete(user_id).await,
            Command::Organize => self.organize_tasks(user_id).await,
            Command::Cancel => Ok(vec![Reply::text(NOTHING_TO_CANCEL)]),
        }
    }

    async fn set_state(&self, user_id: &str, state: ConversationState) {
        let mut conversations = self.conversations.lock().await;
        conversations.set(user_id, state);
        debug!(user_id, ?state, pending = conversations.pending(), "Conversation started");
    }

    async fn add_task(&self, user_id: &str, task: &str) -> Result<Vec<Reply>> {
        self.store.add_task(user_id, task).await?;

        Ok(vec![
            Reply::text(format!("Task added: {}", task)),
            Reply::with_keyboard(MORE_TEXT, Keyboard::MainMenu),
        ])
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Reply>> {
        let tasks = self.store.list_tasks(user_id).await?;
        if tasks.is_empty() {
            return Ok(vec![Reply::text(EMPTY_LIST)]);
        }

        Ok(vec![Reply::text(format!("Your tasks:\n{}", numbered_list(&tasks)))])
    }

    async fn start_delete(&self, user_id: &str) -> Result<Vec<Reply>> {
        let tasks = self.store.list_tasks(user_id).await?;
        if tasks.is_empty() {
            return Ok(vec![Reply::text(NOTHING_TO_DELETE)]);
        }

        self.set_state(user_id, ConversationState::AwaitingDeleteIndex).await;
        Ok(vec![Reply::with_keyboard(
            format!(
                "Please type the number of the task you want to delete:\n\n{}",
                numbered_list(&tasks)
            ),
            Keyboard::Remove,
        )])
    }

    async fn delete_task(&self, user_id: &str, raw_index: &str) -> Result<Vec<Reply>> {
        let outcome = match self.store.delete_task(user_id, raw_index).await {
            Ok(removed) => format!("Task deleted: {}", removed),
            Err(DeleteError::OutOfRange { index, len }) => {
                debug!(user_id, index, len, "Delete index out of range");
                BAD_INDEX.to_string()
            }
            Err(DeleteError::InvalidNumber(raw)) => {
                debug!(user_id, raw = raw.as_str(), "Delete index is not a number");
                NOT_A_NUMBER.to_string()
            }
            Err(DeleteError::Store(e)) => return Err(e.into()),
        };

        Ok(vec![
            Reply::text(outcome),
            Reply::with_keyboard(MORE_TEXT, Keyboard::MainMenu),
        ])
    }

    async fn organize_tasks(&self, user_id: &str) -> Result<Vec<Reply>> {
        let tasks = self.store.tasks(user_id).await?;
        if tasks.is_empty() {
            return Ok(vec![Reply::text(NOTHING_TO_ORGANIZE)]);
        }

        match self.organizer.organize(&tasks).await {
            Ok(organized) => Ok(vec![Reply::text(organized)]),
            Err(e) => {
                warn!(user_id, "Organize failed: {}", e);
                Ok(vec![Reply::text(ORGANIZE_FAILED)])
            }
        }
    }
}
