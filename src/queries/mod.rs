//! Page queries and mutations
//!
//! Reads go through the query cache under stable keys. Page reads hand back
//! cached data at once, stale or not, and refresh it in the background.
//! Mutations validate their input, call the backend and then invalidate
//! whatever the change makes stale. Nothing here writes into the cache
//! directly.

use crate::api::{ApiClient, ApiError};
use crate::cache::{Cached, QueryCache, QueryKey, Resource};
use crate::models::*;
use crate::validation::{self, ValidationError};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Cache keys shared by every reader of a resource
pub mod keys {
    use super::*;

    pub fn dashboard_stats() -> QueryKey {
        QueryKey::scoped(Resource::Dashboard, "stats")
    }

    pub fn recent_activity() -> QueryKey {
        QueryKey::scoped(Resource::Dashboard, "recent")
    }

    pub fn leads(status: Option<LeadStatus>) -> QueryKey {
        match status {
            Some(status) => QueryKey::scoped(Resource::Leads, format!("status={}", status)),
            None => QueryKey::new(Resource::Leads),
        }
    }

    pub fn lead(id: Uuid) -> QueryKey {
        QueryKey::scoped(Resource::Lead, id)
    }

    pub fn conversations(status: Option<ConversationStatus>) -> QueryKey {
        match status {
            Some(status) => {
                QueryKey::scoped(Resource::Conversations, format!("status={}", status))
            }
            None => QueryKey::new(Resource::Conversations),
        }
    }

    pub fn conversation(id: Uuid) -> QueryKey {
        QueryKey::scoped(Resource::Conversation, id)
    }

    pub fn calls(status: Option<CallStatus>) -> QueryKey {
        match status {
            Some(status) => QueryKey::scoped(Resource::Calls, format!("status={}", status)),
            None => QueryKey::new(Resource::Calls),
        }
    }

    pub fn appointments() -> QueryKey {
        QueryKey::new(Resource::Appointments)
    }

    pub fn report(period: ReportPeriod) -> QueryKey {
        QueryKey::scoped(Resource::Reports, period.as_str())
    }

    pub fn settings() -> QueryKey {
        QueryKey::new(Resource::Settings)
    }

    pub fn services() -> QueryKey {
        QueryKey::new(Resource::Services)
    }

    pub fn calendar_integrations() -> QueryKey {
        QueryKey::new(Resource::CalendarIntegrations)
    }
}

/// Backend writes and the cached resources each one makes stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    UpdateLead,
    CreateAppointment,
    UpdateAppointment,
    UpdateSettings,
    SaveService,
    DeleteService,
    DisconnectCalendar,
    Handoff,
    SendMessage,
}

impl Mutation {
    pub fn invalidates(self) -> &'static [Resource] {
        match self {
            Self::UpdateLead => &[Resource::Leads, Resource::Lead, Resource::Dashboard],
            Self::CreateAppointment | Self::UpdateAppointment => {
                &[Resource::Appointments, Resource::Dashboard]
            }
            Self::UpdateSettings => &[Resource::Settings],
            Self::SaveService | Self::DeleteService => &[Resource::Services],
            Self::DisconnectCalendar => &[Resource::CalendarIntegrations],
            Self::Handoff | Self::SendMessage => {
                &[Resource::Conversation, Resource::Conversations]
            }
        }
    }
}

/// Cached reads and invalidating writes for the dashboard pages
#[derive(Debug, Clone)]
pub struct Queries {
    client: ApiClient,
    cache: QueryCache,
}

impl Queries {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn completed(&self, mutation: Mutation) {
        tracing::debug!("{:?} succeeded, invalidating {:?}", mutation, mutation.invalidates());
        self.cache.invalidate_all(mutation.invalidates());
    }

    // =========================================================================
    // Dashboard and reports
    // =========================================================================

    pub async fn dashboard_stats(&self) -> Result<Cached<DashboardStats>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::dashboard_stats(), move || async move { client.dashboard_stats().await })
            .await
    }

    /// Dashboard stats, waiting for a refetch when the cached copy is stale
    pub async fn latest_dashboard_stats(&self) -> Result<Cached<DashboardStats>, ApiError> {
        let client = self.client.clone();
        self.cache
            .fetch(keys::dashboard_stats(), || async move { client.dashboard_stats().await })
            .await
    }

    pub async fn recent_activity(&self) -> Result<Cached<Vec<Activity>>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::recent_activity(), move || async move { client.recent_activity().await })
            .await
    }

    pub async fn report(&self, period: ReportPeriod) -> Result<Cached<Report>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::report(period), move || async move { client.report(period).await })
            .await
    }

    // =========================================================================
    // Leads and calls
    // =========================================================================

    /// Leads, optionally filtered by status. The filter is re-applied to the
    /// response so a lenient backend cannot leak other statuses into a tab.
    pub async fn leads(&self, status: Option<LeadStatus>) -> Result<Cached<Vec<Lead>>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::leads(status), move || async move {
                let mut leads = client.leads(status).await?;
                if let Some(status) = status {
                    leads.retain(|lead| lead.status == status);
                }
                Ok(leads)
            })
            .await
    }

    pub async fn lead(&self, id: Uuid) -> Result<Cached<LeadDetail>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::lead(id), move || async move { client.lead(id).await })
            .await
    }

    pub async fn update_lead(&self, id: Uuid, input: &UpdateLead) -> Result<Lead, QueryError> {
        validation::validate_update_lead(input)?;
        let lead = self.client.update_lead(id, input).await?;
        self.completed(Mutation::UpdateLead);
        Ok(lead)
    }

    pub async fn calls(&self, status: Option<CallStatus>) -> Result<Cached<Vec<Call>>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::calls(status), move || async move {
                let mut calls = client.calls(status).await?;
                if let Some(status) = status {
                    calls.retain(|call| call.status == status);
                }
                Ok(calls)
            })
            .await
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    pub async fn conversations(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Cached<Vec<Conversation>>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::conversations(status), move || async move {
                client.conversations(status).await
            })
            .await
    }

    /// One thread with its messages. Always waits for a fresh copy once the
    /// cached one is stale, so a re-read after a hand-off sees the change.
    pub async fn conversation(&self, id: Uuid) -> Result<Cached<ConversationDetail>, ApiError> {
        let client = self.client.clone();
        self.cache
            .fetch(keys::conversation(id), || async move { client.conversation(id).await })
            .await
    }

    // =========================================================================
    // Appointments
    // =========================================================================

    pub async fn appointments(&self) -> Result<Cached<Vec<Appointment>>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::appointments(), move || async move { client.appointments().await })
            .await
    }

    pub async fn create_appointment(
        &self,
        input: &CreateAppointment,
    ) -> Result<Appointment, QueryError> {
        validation::validate_create_appointment(input)?;
        let appointment = self.client.create_appointment(input).await?;
        self.completed(Mutation::CreateAppointment);
        Ok(appointment)
    }

    pub async fn update_appointment(
        &self,
        id: Uuid,
        input: &UpdateAppointment,
    ) -> Result<Appointment, QueryError> {
        let appointment = self.client.update_appointment(id, input).await?;
        self.completed(Mutation::UpdateAppointment);
        Ok(appointment)
    }

    // =========================================================================
    // Settings, services, calendar
    // =========================================================================

    pub async fn settings(&self) -> Result<Cached<BusinessSettings>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::settings(), move || async move { client.settings().await })
            .await
    }

    pub async fn update_settings(
        &self,
        input: &UpdateSettings,
    ) -> Result<BusinessSettings, QueryError> {
        validation::validate_update_settings(input)?;
        let settings = self.client.update_settings(input).await?;
        self.completed(Mutation::UpdateSettings);
        Ok(settings)
    }

    pub async fn services(&self) -> Result<Cached<Vec<Service>>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::services(), move || async move { client.services().await })
            .await
    }

    /// Create (`id` = None) or update a service
    pub async fn save_service(
        &self,
        id: Option<Uuid>,
        input: &ServiceForm,
    ) -> Result<Service, QueryError> {
        validation::validate_service(input)?;
        let service = match id {
            Some(id) => self.client.update_service(id, input).await?,
            None => self.client.create_service(input).await?,
        };
        self.completed(Mutation::SaveService);
        Ok(service)
    }

    pub async fn delete_service(&self, id: Uuid) -> Result<bool, QueryError> {
        let deleted = self.client.delete_service(id).await?;
        self.completed(Mutation::DeleteService);
        Ok(deleted)
    }

    pub async fn calendar_integrations(&self) -> Result<Cached<Vec<CalendarIntegration>>, ApiError> {
        let client = self.client.clone();
        self.cache
            .read(keys::calendar_integrations(), move || async move {
                client.calendar_integrations().await
            })
            .await
    }

    /// Provider auth URL to send the user to. The integration only appears
    /// once the provider redirects back to the backend.
    pub async fn connect_calendar(&self, provider: CalendarProvider) -> Result<String, QueryError> {
        Ok(self.client.connect_calendar(provider).await?)
    }

    pub async fn disconnect_calendar(&self, id: Uuid) -> Result<bool, QueryError> {
        let deleted = self.client.disconnect_calendar(id).await?;
        self.completed(Mutation::DisconnectCalendar);
        Ok(deleted)
    }
}
