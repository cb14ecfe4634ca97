//! Appointment endpoints

use crate::models::*;
use uuid::Uuid;

use super::{ApiClient, ApiError};

impl ApiClient {
    /// `GET /appointments`
    pub async fn appointments(&self) -> Result<Vec<Appointment>, ApiError> {
        let envelope: AppointmentsEnvelope = self.get("/appointments").await?;
        Ok(envelope.appointments)
    }

    /// `POST /appointments`
    pub async fn create_appointment(
        &self,
        input: &CreateAppointment,
    ) -> Result<Appointment, ApiError> {
        let envelope: AppointmentEnvelope = self.post("/appointments", Some(input)).await?;
        Ok(envelope.appointment)
    }

    /// `PATCH /appointments/:id`
    pub async fn update_appointment(
        &self,
        id: Uuid,
        input: &UpdateAppointment,
    ) -> Result<Appointment, ApiError> {
        let envelope: AppointmentEnvelope = self
            .patch(&format!("/appointments/{}", id), input)
            .await?;
        Ok(envelope.appointment)
    }
}
