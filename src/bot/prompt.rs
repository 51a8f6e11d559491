use super::command::Command;

/// Commands offered on the reply keyboard, one per row
pub const MAIN_MENU: [Command; 5] = [
    Command::Add,
    Command::Delete,
    Command::List,
    Command::Organize,
    Command::Help,
];

/// Render tasks as `1. first`, `2. second`, ...
pub fn numbered_lines(tasks: &[(usize, String)]) -> Vec<String> {
    tasks
        .iter()
        .map(|(index, task)| format!("{}. {}", index, task))
        .collect()
}

pub fn numbered_list(tasks: &[(usize, String)]) -> String {
    numbered_lines(tasks).join("\n")
}

/// `/add - Add a new task` lines for the given commands
pub fn command_help(commands: &[Command]) -> String {
    commands
        .iter()
        .map(|command| format!("/{} - {}", command.name(), command.description()))
        .collect::<Vec<_>>()
        .join("\n")
}
