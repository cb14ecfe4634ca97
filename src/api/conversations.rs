//! Conversation endpoints, including the hand-off transitions

use crate::models::*;
use uuid::Uuid;

use super::{ApiClient, ApiError};

impl ApiClient {
    /// `GET /conversations[?status=]`
    pub async fn conversations(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>, ApiError> {
        let envelope: ConversationsEnvelope = match status {
            Some(status) => {
                self.get_with_query("/conversations", &[("status", status.as_str())])
                    .await?
            }
            None => self.get("/conversations").await?,
        };
        Ok(envelope.conversations)
    }

    /// `GET /conversations/:id`
    pub async fn conversation(&self, id: Uuid) -> Result<ConversationDetail, ApiError> {
        self.get(&format!("/conversations/{}", id)).await
    }

    /// `POST /conversations/:id/takeover`
    pub async fn takeover_conversation(&self, id: Uuid) -> Result<HandoffResponse, ApiError> {
        self.post(&format!("/conversations/{}/takeover", id), None::<&()>)
            .await
    }

    /// `POST /conversations/:id/return-ai`
    pub async fn return_to_ai(&self, id: Uuid) -> Result<HandoffResponse, ApiError> {
        self.post(&format!("/conversations/{}/return-ai", id), None::<&()>)
            .await
    }

    /// `POST /conversations/:id/message`. The created message is echoed
    /// back when the backend has it.
    pub async fn send_message(&self, id: Uuid, body: &str) -> Result<Option<Message>, ApiError> {
        let request = SendMessage {
            body: body.to_string(),
        };
        let envelope: MessageEnvelope = self
            .post(&format!("/conversations/{}/message", id), Some(&request))
            .await?;
        Ok(envelope.message)
    }
}
