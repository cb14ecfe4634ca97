//! Lead and call log endpoints

use crate::models::*;
use uuid::Uuid;

use super::{ApiClient, ApiError};

impl ApiClient {
    /// `GET /leads[?status=]`
    pub async fn leads(&self, status: Option<LeadStatus>) -> Result<Vec<Lead>, ApiError> {
        let envelope: LeadsEnvelope = match status {
            Some(status) => {
                self.get_with_query("/leads", &[("status", status.as_str())])
                    .await?
            }
            None => self.get("/leads").await?,
        };
        Ok(envelope.leads)
    }

    /// `GET /leads/:id`
    pub async fn lead(&self, id: Uuid) -> Result<LeadDetail, ApiError> {
        self.get(&format!("/leads/{}", id)).await
    }

    /// `PATCH /leads/:id`
    pub async fn update_lead(&self, id: Uuid, input: &UpdateLead) -> Result<Lead, ApiError> {
        let envelope: LeadEnvelope = self.patch(&format!("/leads/{}", id), input).await?;
        Ok(envelope.lead)
    }

    /// `GET /calls[?status=]`
    pub async fn calls(&self, status: Option<CallStatus>) -> Result<Vec<Call>, ApiError> {
        let envelope: CallsEnvelope = match status {
            Some(status) => {
                self.get_with_query("/calls", &[("status", status.as_str())])
                    .await?
            }
            None => self.get("/calls").await?,
        };
        Ok(envelope.calls)
    }
}
