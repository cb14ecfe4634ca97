//! Business settings, service catalog and calendar integration endpoints

use crate::models::*;
use uuid::Uuid;

use super::{ApiClient, ApiError};

impl ApiClient {
    // =========================================================================
    // Settings
    // =========================================================================

    /// `GET /settings`
    pub async fn settings(&self) -> Result<BusinessSettings, ApiError> {
        let envelope: SettingsEnvelope = self.get("/settings").await?;
        Ok(envelope.settings)
    }

    /// `PATCH /settings`
    pub async fn update_settings(
        &self,
        input: &UpdateSettings,
    ) -> Result<BusinessSettings, ApiError> {
        let envelope: SettingsEnvelope = self.patch("/settings", input).await?;
        Ok(envelope.settings)
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// `GET /services`
    pub async fn services(&self) -> Result<Vec<Service>, ApiError> {
        let envelope: ServicesEnvelope = self.get("/services").await?;
        Ok(envelope.services)
    }

    /// `POST /services`
    pub async fn create_service(&self, input: &ServiceForm) -> Result<Service, ApiError> {
        let envelope: ServiceEnvelope = self.post("/services", Some(input)).await?;
        Ok(envelope.service)
    }

    /// `PATCH /services/:id`
    pub async fn update_service(&self, id: Uuid, input: &ServiceForm) -> Result<Service, ApiError> {
        let envelope: ServiceEnvelope = self.patch(&format!("/services/{}", id), input).await?;
        Ok(envelope.service)
    }

    /// `DELETE /services/:id`
    pub async fn delete_service(&self, id: Uuid) -> Result<bool, ApiError> {
        let envelope: DeletedEnvelope = self.delete(&format!("/services/{}", id)).await?;
        Ok(envelope.deleted)
    }

    // =========================================================================
    // Calendar
    // =========================================================================

    /// `GET /calendar/integrations`
    pub async fn calendar_integrations(&self) -> Result<Vec<CalendarIntegration>, ApiError> {
        let envelope: IntegrationsEnvelope = self.get("/calendar/integrations").await?;
        Ok(envelope.integrations)
    }

    /// `GET /calendar/connect/:provider`. Returns the provider's auth URL
    /// the user must be sent to.
    pub async fn connect_calendar(&self, provider: CalendarProvider) -> Result<String, ApiError> {
        let envelope: AuthUrlEnvelope = self
            .get(&format!("/calendar/connect/{}", provider.as_str()))
            .await?;
        Ok(envelope.auth_url)
    }

    /// `DELETE /calendar/integrations/:id`
    pub async fn disconnect_calendar(&self, id: Uuid) -> Result<bool, ApiError> {
        let envelope: DeletedEnvelope = self
            .delete(&format!("/calendar/integrations/{}", id))
            .await?;
        Ok(envelope.deleted)
    }
}
