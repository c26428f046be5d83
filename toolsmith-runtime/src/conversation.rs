//! # Conversation State
//!
//! The append-only transcript exchanged with the model. It always opens
//! with one system and one user message. Tool results are only accepted
//! for calls requested by the latest assistant message, at most once each.

use crate::provider::{ChatMessage, Role, ToolCall};
use toolsmith_error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    /// Call ids of the latest assistant message still awaiting a result
    pending: Vec<String>,
}

impl Conversation {
    /// Start a transcript from a system prompt and the task text
    pub fn seed(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            pending: Vec::new(),
        }
    }

    /// Append an assistant message, tool-call requests included
    pub fn push_assistant(&mut self, message: ChatMessage) -> Result<()> {
        if message.role != Role::Assistant {
            return Err(Error::invalid_argument(format!(
                "expected an assistant message, got {:?}",
                message.role
            ))
            .with_operation("conversation::push_assistant"));
        }

        self.pending = message.requested_calls().iter().map(|c| c.id.clone()).collect();
        self.messages.push(message);
        Ok(())
    }

    /// Append the result for one requested call
    pub fn push_tool_result(&mut self, call: &ToolCall, content: impl Into<String>) -> Result<()> {
        let Some(pos) = self.pending.iter().position(|id| id == &call.id) else {
            return Err(Error::invalid_argument(format!(
                "tool call '{}' is not awaiting a result",
                call.id
            ))
            .with_operation("conversation::push_tool_result")
            .with_context("tool", &call.name));
        };

        self.pending.remove(pos);
        self.messages
            .push(ChatMessage::tool_result(&call.id, &call.name, content));
        Ok(())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Call ids from the latest assistant message without a result yet
    pub fn pending_calls(&self) -> &[String] {
        &self.pending
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role == Role::Tool)
    }

    pub fn assistant_turns(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role == Role::Assistant)
    }
}
