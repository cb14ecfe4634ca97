//! Conversation hand-off
//!
//! Tracks who authors outbound messages on the selected conversation: the
//! AI assistant (`active`) or a person (`human_active`). The responder is
//! always the last status the server reported; it is never inferred from
//! the message history. Take-over, return-to-AI and manual sends are
//! backend mutations followed by invalidation and a fresh read.

use crate::api::ApiError;
use crate::cache::Cached;
use crate::models::{ConversationDetail, ConversationStatus, HandoffResponse, Message};
use crate::queries::{Mutation, Queries};
use crate::validation::{self, ValidationError};
use std::fmt;
use uuid::Uuid;

/// Who currently answers the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Responder {
    Ai,
    Human,
}

impl Responder {
    /// Only `human_active` means a person has the conversation
    pub fn from_status(status: ConversationStatus) -> Self {
        match status {
            ConversationStatus::HumanActive => Self::Human,
            _ => Self::Ai,
        }
    }

    /// Conversation header text
    pub fn label(self) -> &'static str {
        match self {
            Self::Ai => "AI is responding",
            Self::Human => "You are responding",
        }
    }
}

impl fmt::Display for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("No conversation loaded")]
    NotLoaded,

    #[error("Take over the conversation before sending messages")]
    NotHumanActive,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result of a send attempt that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Sent; the echoed message if the backend returned one
    Sent(Option<Message>),
    /// Blank input, nothing was sent
    Skipped,
}

/// Hand-off state for the selected conversation
#[derive(Debug)]
pub struct HandoffController {
    queries: Queries,
    selected: Option<Uuid>,
    detail: Option<Cached<ConversationDetail>>,
    status: Option<ConversationStatus>,
    draft: String,
    last_error: Option<String>,
}

impl HandoffController {
    pub fn new(queries: Queries) -> Self {
        Self {
            queries,
            selected: None,
            detail: None,
            status: None,
            draft: String::new(),
            last_error: None,
        }
    }

    /// Switch to another conversation and load it. Selecting the current
    /// conversation again only refreshes it.
    pub async fn select(&mut self, id: Uuid) -> Result<(), HandoffError> {
        if self.selected != Some(id) {
            tracing::debug!("Selecting conversation {}", id);
            self.selected = Some(id);
            self.detail = None;
            self.status = None;
            self.draft.clear();
            self.last_error = None;
        }
        self.refresh().await
    }

    /// Re-read the selected conversation through the cache
    pub async fn refresh(&mut self) -> Result<(), HandoffError> {
        let id = self.selected.ok_or(HandoffError::NotLoaded)?;
        match self.queries.conversation(id).await {
            Ok(detail) => {
                self.apply_detail(id, detail);
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Adopt a fetched conversation. A response for anything but the
    /// selected conversation is dropped. Returns whether it was applied.
    pub fn apply_detail(&mut self, id: Uuid, detail: Cached<ConversationDetail>) -> bool {
        if self.selected != Some(id) || detail.data.conversation.id != id {
            tracing::debug!("Ignoring late response for conversation {}", id);
            return false;
        }
        self.status = Some(detail.data.conversation.status);
        self.detail = Some(detail);
        true
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn detail(&self) -> Option<&ConversationDetail> {
        self.detail.as_ref().map(|cached| cached.data.as_ref())
    }

    pub fn messages(&self) -> &[Message] {
        self.detail()
            .map(|detail| detail.messages.as_slice())
            .unwrap_or_default()
    }

    /// Last server-reported status
    pub fn status(&self) -> Option<ConversationStatus> {
        self.status
    }

    /// Current responder, once the conversation is loaded
    pub fn responder(&self) -> Option<Responder> {
        self.status.map(Responder::from_status)
    }

    pub fn is_human_active(&self) -> bool {
        self.responder() == Some(Responder::Human)
    }

    /// Error from the most recent failed action, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Ask the backend to hand the conversation to a person
    pub async fn takeover(&mut self) -> Result<Responder, HandoffError> {
        let id = self.selected.ok_or(HandoffError::NotLoaded)?;
        let result = self.queries.client().takeover_conversation(id).await;
        self.finish_handoff(id, result).await
    }

    /// Ask the backend to hand the conversation back to the AI
    pub async fn return_to_ai(&mut self) -> Result<Responder, HandoffError> {
        let id = self.selected.ok_or(HandoffError::NotLoaded)?;
        let result = self.queries.client().return_to_ai(id).await;
        self.finish_handoff(id, result).await
    }

    async fn finish_handoff(
        &mut self,
        id: Uuid,
        result: Result<HandoffResponse, ApiError>,
    ) -> Result<Responder, HandoffError> {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Hand-off for conversation {} failed: {}", id, e);
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        self.last_error = None;
        self.queries.cache().invalidate_all(Mutation::Handoff.invalidates());
        if self.selected == Some(id) {
            if let Some(status) = response.reported_status() {
                self.status = Some(status);
            }
        }

        // The mutation went through; a failed re-read only leaves the
        // reported status in place
        if let Err(e) = self.refresh().await {
            tracing::warn!("Reloading conversation {} after hand-off failed: {}", id, e);
        }

        self.responder().ok_or(HandoffError::NotLoaded)
    }

    // =========================================================================
    // Manual messages
    // =========================================================================

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Whether the send button is enabled
    pub fn can_send(&self) -> bool {
        self.is_human_active() && !self.draft.trim().is_empty()
    }

    /// Send the draft as a manual message.
    ///
    /// A blank draft is skipped without a request and left as is. On
    /// success the draft is cleared and the thread is re-read; the message
    /// is never appended locally.
    pub async fn send_message(&mut self) -> Result<SendOutcome, HandoffError> {
        let id = self.selected.ok_or(HandoffError::NotLoaded)?;
        if self.status.is_none() {
            return Err(HandoffError::NotLoaded);
        }
        if !self.is_human_active() {
            return Err(HandoffError::NotHumanActive);
        }

        let body = match validation::validate_message_body(&self.draft) {
            Ok(body) => body.to_string(),
            Err(ValidationError::Required { .. }) => return Ok(SendOutcome::Skipped),
            Err(e) => return Err(e.into()),
        };

        let message = match self.queries.client().send_message(id, &body).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Sending to conversation {} failed: {}", id, e);
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        self.draft.clear();
        self.last_error = None;
        self.queries.cache().invalidate_all(Mutation::SendMessage.invalidates());
        if let Err(e) = self.refresh().await {
            tracing::warn!("Reloading conversation {} after send failed: {}", id, e);
        }
        Ok(SendOutcome::Sent(message))
    }
}
