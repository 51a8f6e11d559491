use std::sync::OnceLock;

use regex::Regex;

/// Slash commands the bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Add,
    List,
    Delete,
    Organize,
    Cancel,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Start,
        Command::Help,
        Command::Add,
        Command::List,
        Command::Delete,
        Command::Organize,
        Command::Cancel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Add => "add",
            Command::List => "list",
            Command::Delete => "delete",
            Command::Organize => "organize",
            Command::Cancel => "cancel",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Command::Start => "Show the welcome message and menu",
            Command::Help => "List the available commands",
            Command::Add => "Add a new task",
            Command::List => "Show your tasks",
            Command::Delete => "Delete a task",
            Command::Organize => "Ask ChatGPT to order your tasks by importance",
            Command::Cancel => "Cancel the current operation",
        }
    }

    /// Commands that open a multi-step conversation of their own
    pub fn starts_conversation(self) -> bool {
        matches!(self, Command::Add | Command::Delete)
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }
}

/// One incoming chat message, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    /// Looks like a command but is not one of ours
    UnknownCommand(String),
    Text(String),
}

impl Input {
    /// Classify a message. Commands may carry a `@botname` suffix and
    /// trailing arguments, both of which are ignored.
    pub fn parse(text: &str) -> Self {
        let Some(captures) = command_regex().and_then(|re| re.captures(text)) else {
            return Input::Text(text.to_string());
        };

        let name = captures.get(1).map_or("", |m| m.as_str());
        match Command::from_name(name) {
            Some(command) => Input::Command(command),
            None => Input::UnknownCommand(name.to_string()),
        }
    }

    /// Whether this input closes a pending conversation. One-shot commands
    /// such as `/list` are answered alongside it instead.
    pub fn ends_conversation(&self) -> bool {
        match self {
            Input::Text(_) => true,
            Input::Command(command) => *command == Command::Cancel || command.starts_conversation(),
            Input::UnknownCommand(_) => false,
        }
    }
}

fn command_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/([A-Za-z0-9_]+)(?:@[A-Za-z0-9_]+)?(?:\s|$)").ok())
        .as_ref()
}
