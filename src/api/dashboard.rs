//! Dashboard and report endpoints

use crate::models::*;

use super::{ApiClient, ApiError};

impl ApiClient {
    /// `GET /dashboard/stats`
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        let envelope: StatsEnvelope = self.get("/dashboard/stats").await?;
        Ok(envelope.stats)
    }

    /// `GET /dashboard/recent`
    pub async fn recent_activity(&self) -> Result<Vec<Activity>, ApiError> {
        let envelope: ActivitiesEnvelope = self.get("/dashboard/recent").await?;
        Ok(envelope.activities)
    }

    /// `GET /reports/weekly` or `GET /reports/monthly`
    pub async fn report(&self, period: ReportPeriod) -> Result<Report, ApiError> {
        let envelope: ReportEnvelope = self
            .get(&format!("/reports/{}", period.as_str()))
            .await?;
        Ok(envelope.report)
    }
}
