//! Data models exchanged with the CallHook backend

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualifying,
    Qualified,
    Booked,
    Unresponsive,
    Lost,
    Converted,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// The AI assistant is responding
    Active,
    /// A person has taken over
    HumanActive,
    FollowUp,
    Completed,
    Closed,
    #[serde(other)]
    Other,
}

impl ConversationStatus {
    /// Conversations the backend will no longer hand off
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Caller,
    Ai,
    Human,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Missed,
    Answered,
    Voicemail,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarProvider {
    Google,
    Outlook,
}

impl CalendarProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Outlook => "outlook",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Call,
    Message,
    Lead,
    Appointment,
}

/// Wire form of a status, as used in `?status=` filters
macro_rules! status_str {
    ($ty:ty { $($variant:ident => $s:literal),* $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)*
                    Self::Other => "other",
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_str!(LeadStatus {
    New => "new",
    Contacted => "contacted",
    Qualifying => "qualifying",
    Qualified => "qualified",
    Booked => "booked",
    Unresponsive => "unresponsive",
    Lost => "lost",
    Converted => "converted",
});

status_str!(ConversationStatus {
    Active => "active",
    HumanActive => "human_active",
    FollowUp => "follow_up",
    Completed => "completed",
    Closed => "closed",
});

status_str!(CallStatus {
    Missed => "missed",
    Answered => "answered",
    Voicemail => "voicemail",
});

status_str!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub total_calls: i64,
    pub missed_calls: i64,
    pub recovered_calls: i64,
    pub estimated_revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub today: PeriodStats,
    pub this_month: PeriodStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub description: String,
    #[serde(default)]
    pub time_ago: Option<String>,
    #[serde(default)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

// =============================================================================
// Lead
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub business_id: Uuid,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub service_needed: Option<String>,
    pub urgency: Option<String>,
    pub status: LeadStatus,
    pub source: String,
    pub estimated_value: Option<f64>,
    pub preferred_time: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Name when captured, phone otherwise
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.phone)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLead {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LeadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
}

/// Lead detail: the lead with its conversations and their messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadDetail {
    pub lead: Lead,
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

// =============================================================================
// Conversation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub business_id: Uuid,
    pub lead_id: Uuid,
    pub call_id: Option<Uuid>,
    pub status: ConversationStatus,
    #[serde(default)]
    pub follow_up_count: i32,
    pub next_follow_up_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub qualification_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub lead: Option<Lead>,
    #[serde(default)]
    pub lead_name: Option<String>,
    #[serde(default)]
    pub lead_phone: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
}

/// Conversation detail with its message thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub direction: MessageDirection,
    pub sender_type: SenderType,
    pub body: String,
    #[serde(default, alias = "twilio_message_sid")]
    pub twilio_sid: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessage {
    pub body: String,
}

/// Response to a take-over or return-to-AI request. The backend answers
/// with either the updated conversation or just its new status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandoffResponse {
    #[serde(default)]
    pub conversation: Option<Conversation>,
    #[serde(default)]
    pub status: Option<ConversationStatus>,
}

impl HandoffResponse {
    /// Status reported by the server, if any
    pub fn reported_status(&self) -> Option<ConversationStatus> {
        self.conversation
            .as_ref()
            .map(|c| c.status)
            .or(self.status)
    }
}

// =============================================================================
// Call
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub business_id: Uuid,
    pub twilio_call_sid: String,
    pub caller_phone: String,
    pub status: CallStatus,
    pub duration_seconds: Option<i32>,
    #[serde(default)]
    pub is_after_hours: bool,
    pub recording_url: Option<String>,
    pub transcription: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Appointment
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub business_id: Uuid,
    pub lead_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub service_type: Option<String>,
    pub address: Option<String>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    #[serde(default)]
    pub lead_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointment {
    pub lead_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// =============================================================================
// Reports
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub id: Uuid,
    pub date: NaiveDate,
    pub total_calls: i64,
    pub missed_calls: i64,
    pub recovered_calls: i64,
    pub leads_captured: i64,
    pub leads_qualified: i64,
    pub appointments_booked: i64,
    pub estimated_revenue: f64,
    pub messages_sent: i64,
    pub messages_received: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_calls: i64,
    pub missed_calls: i64,
    pub recovered_calls: i64,
    pub leads_captured: i64,
    pub leads_qualified: i64,
    pub appointments_booked: i64,
    pub estimated_revenue: f64,
    #[serde(default)]
    pub roi_percentage: Option<f64>,
    #[serde(default)]
    pub daily_breakdown: Vec<DailyMetric>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Weekly,
    Monthly,
}

impl ReportPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub open: String,
    pub close: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    pub sms: bool,
    pub email: bool,
    pub quiet_start: String,
    pub quiet_end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessSettings {
    pub name: String,
    pub owner_name: String,
    pub owner_email: String,
    pub owner_phone: String,
    pub business_phone: String,
    pub twilio_number: String,
    pub timezone: String,
    #[serde(default)]
    pub business_hours: HashMap<String, Option<OpeningHours>>,
    #[serde(default)]
    pub services: Vec<String>,
    pub ai_greeting: Option<String>,
    pub ai_instructions: Option<String>,
    pub notification_prefs: NotificationPrefs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_hours: Option<HashMap<String, Option<OpeningHours>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_greeting: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_prefs: Option<NotificationPrefs>,
}

// =============================================================================
// Services
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub duration_minutes: i32,
    pub is_bookable: bool,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Service editor form, used for both create and update
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceForm {
    #[validate(custom = "crate::validation::not_blank", length(max = 255))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i32,
    pub is_bookable: bool,
    pub is_active: bool,
}

impl Default for ServiceForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            price: None,
            duration_minutes: 60,
            is_bookable: true,
            is_active: true,
        }
    }
}

impl From<&Service> for ServiceForm {
    fn from(service: &Service) -> Self {
        Self {
            name: service.name.clone(),
            description: service.description.clone(),
            price: service.price,
            duration_minutes: service.duration_minutes,
            is_bookable: service.is_bookable,
            is_active: service.is_active,
        }
    }
}

// =============================================================================
// Calendar
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarIntegration {
    pub id: Uuid,
    pub business_id: Uuid,
    pub provider: CalendarProvider,
    pub calendar_id: Option<String>,
    pub is_active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Response Envelopes
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StatsEnvelope {
    pub stats: DashboardStats,
}

#[derive(Debug, Deserialize)]
pub struct ActivitiesEnvelope {
    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
pub struct LeadsEnvelope {
    #[serde(default)]
    pub leads: Vec<Lead>,
}

#[derive(Debug, Deserialize)]
pub struct LeadEnvelope {
    pub lead: Lead,
}

#[derive(Debug, Deserialize)]
pub struct ConversationsEnvelope {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
pub struct MessageEnvelope {
    /// Null when the backend accepted the send without echoing the row
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct CallsEnvelope {
    #[serde(default)]
    pub calls: Vec<Call>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentsEnvelope {
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentEnvelope {
    pub appointment: Appointment,
}

#[derive(Debug, Deserialize)]
pub struct ReportEnvelope {
    pub report: Report,
}

#[derive(Debug, Deserialize)]
pub struct SettingsEnvelope {
    pub settings: BusinessSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServicesEnvelope {
    #[serde(default)]
    pub services: Vec<Service>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceEnvelope {
    pub service: Service,
}

#[derive(Debug, Deserialize)]
pub struct IntegrationsEnvelope {
    #[serde(default)]
    pub integrations: Vec<CalendarIntegration>,
}

#[derive(Debug, Deserialize)]
pub struct AuthUrlEnvelope {
    pub auth_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletedEnvelope {
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_status_decodes_as_other() {
        let status: ConversationStatus = serde_json::from_value(json!("archived")).unwrap();
        assert_eq!(status, ConversationStatus::Other);

        let status: LeadStatus = serde_json::from_value(json!("booked")).unwrap();
        assert_eq!(status, LeadStatus::Booked);
    }

    #[test]
    fn test_status_wire_strings() {
        assert_eq!(ConversationStatus::HumanActive.as_str(), "human_active");
        assert_eq!(AppointmentStatus::NoShow.to_string(), "no_show");
        assert_eq!(LeadStatus::Unresponsive.as_str(), "unresponsive");
    }

    #[test]
    fn test_terminal_conversation_statuses() {
        assert!(ConversationStatus::Closed.is_terminal());
        assert!(ConversationStatus::Completed.is_terminal());
        assert!(!ConversationStatus::Active.is_terminal());
        assert!(!ConversationStatus::HumanActive.is_terminal());
    }

    #[test]
    fn test_handoff_response_prefers_conversation() {
        let response: HandoffResponse =
            serde_json::from_value(json!({"status": "human_active"})).unwrap();
        assert_eq!(
            response.reported_status(),
            Some(ConversationStatus::HumanActive)
        );

        let empty: HandoffResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.reported_status(), None);
    }

    #[test]
    fn test_message_accepts_backend_sid_field() {
        let message: Message = serde_json::from_value(json!({
            "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "conversation_id": "2b1e6679-7425-40de-944b-e07fc1f90ae7",
            "direction": "outbound",
            "sender_type": "human",
            "body": "On our way",
            "twilio_message_sid": "SM123",
            "status": "sent",
            "created_at": "2026-03-01T10:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(message.twilio_sid.as_deref(), Some("SM123"));
        assert_eq!(message.sender_type, SenderType::Human);
    }

    #[test]
    fn test_update_lead_omits_unset_fields() {
        let update = UpdateLead {
            status: Some(LeadStatus::Qualified),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"status": "qualified"})
        );
    }
}
