use std::collections::HashMap;

/// Which multi-step command, if any, a user is in the middle of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingNewTask,
    AwaitingDeleteIndex,
}

/// Pending conversations per user. Idle users have no entry.
#[derive(Debug, Default)]
pub struct Conversations {
    states: HashMap<String, ConversationState>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> ConversationState {
        self.states.get(user_id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, user_id: &str, state: ConversationState) {
        if state == ConversationState::Idle {
            self.states.remove(user_id);
        } else {
            self.states.insert(user_id.to_string(), state);
        }
    }

    /// Remove and return the user's state, leaving them idle.
    pub fn take(&mut self, user_id: &str) -> ConversationState {
        self.states.remove(user_id).unwrap_or_default()
    }

    pub fn pending(&self) -> usize {
        self.states.len()
    }
}
