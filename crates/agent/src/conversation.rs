//! Ordered model history for one session.
//!
//! A model turn that requested functions must be answered by exactly one
//! user turn carrying a response for each call, before anything else is
//! appended. Rolling back to a checkpoint keeps that invariant intact when a
//! turn fails halfway.

use procura_core::DomainError;

use crate::llm::{Content, FunctionResponse, Part, Role};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conversation {
    system_instruction: String,
    contents: Vec<Content>,
}

/// Length of the history at some earlier point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint(usize);

impl Conversation {
    pub fn new(system_instruction: impl Into<String>) -> Self {
        Self { system_instruction: system_instruction.into(), contents: Vec::new() }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.contents.len())
    }

    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.contents.truncate(checkpoint.0);
    }

    /// True while the last model turn still waits for its function responses.
    pub fn awaiting_function_responses(&self) -> bool {
        self.contents
            .last()
            .is_some_and(|content| content.role == Role::Model && content.has_function_calls())
    }

    pub fn push_user(&mut self, parts: Vec<Part>) -> Result<(), DomainError> {
        self.ensure_not_awaiting()?;
        self.contents.push(Content::user(parts));
        Ok(())
    }

    pub fn push_model(&mut self, parts: Vec<Part>) -> Result<(), DomainError> {
        self.ensure_not_awaiting()?;
        self.contents.push(Content::model(parts));
        Ok(())
    }

    /// Answer the pending function calls in one user turn.
    pub fn push_function_responses(
        &mut self,
        responses: Vec<FunctionResponse>,
    ) -> Result<(), DomainError> {
        let expected = match self.contents.last() {
            Some(content) if content.role == Role::Model => content.function_calls().count(),
            _ => 0,
        };
        if expected == 0 {
            return Err(DomainError::InvariantViolation(
                "function responses without pending function calls".to_string(),
            ));
        }
        if responses.len() != expected {
            return Err(DomainError::InvariantViolation(format!(
                "expected {expected} function responses, got {}",
                responses.len()
            )));
        }

        self.contents.push(Content::user(
            responses.into_iter().map(Part::FunctionResponse).collect(),
        ));
        Ok(())
    }

    fn ensure_not_awaiting(&self) -> Result<(), DomainError> {
        if self.awaiting_function_responses() {
            return Err(DomainError::InvariantViolation(
                "pending function calls must be answered first".to_string(),
            ));
        }
        Ok(())
    }
}
