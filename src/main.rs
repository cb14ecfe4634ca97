//! CallHook terminal dashboard
//!
//! Signs in with the configured provider and renders the dashboard pages
//! as plain text.

use callhook_dashboard::models::*;
use callhook_dashboard::queries::{keys, Queries};
use callhook_dashboard::views::{
    error_banner, format_currency, format_phone, BadgeVariant, EmptyState, LoadState, Page,
    StatusBadge,
};
use callhook_dashboard::{ApiError, Config, Responder, SendOutcome, SessionContext};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use std::io::IsTerminal;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "callhook", about = "CallHook dashboard in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Today's and this month's call recovery numbers
    Stats,
    /// Recent activity feed
    Recent,
    /// Captured leads
    Leads {
        #[arg(long, value_parser = parse_status::<LeadStatus>)]
        status: Option<LeadStatus>,
    },
    /// One lead with its conversations
    Lead { id: Uuid },
    /// Call log
    Calls {
        #[arg(long, value_parser = parse_status::<CallStatus>)]
        status: Option<CallStatus>,
    },
    /// Conversations
    Conversations {
        #[arg(long, value_parser = parse_status::<ConversationStatus>)]
        status: Option<ConversationStatus>,
    },
    /// One conversation thread
    Conversation { id: Uuid },
    /// Take a conversation over from the AI
    Takeover { id: Uuid },
    /// Hand a conversation back to the AI
    ReturnAi { id: Uuid },
    /// Send a manual message (requires a prior take-over)
    Send { id: Uuid, body: String },
    /// Upcoming appointments
    Appointments,
    /// Weekly or monthly report
    Report {
        #[arg(value_enum)]
        period: PeriodArg,
    },
    /// Service catalog
    Services,
    /// Keep dashboard stats up to date until interrupted
    Watch,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PeriodArg {
    Weekly,
    Monthly,
}

impl From<PeriodArg> for ReportPeriod {
    fn from(period: PeriodArg) -> Self {
        match period {
            PeriodArg::Weekly => ReportPeriod::Weekly,
            PeriodArg::Monthly => ReportPeriod::Monthly,
        }
    }
}

/// Parse a status filter in its wire form, e.g. `booked` or `human_active`
fn parse_status<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|e| format!("unknown status '{}': {}", raw, e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callhook_dashboard=info,callhook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    tracing::debug!("Environment: {:?}", config.environment);
    tracing::debug!("Backend: {}", config.api_url);

    let mut context = SessionContext::start(config).await?;
    let color = std::io::stdout().is_terminal();

    match cli.command {
        Command::Stats => print_stats(&context).await,
        Command::Recent => print_recent(&context).await,
        Command::Leads { status } => print_leads(&context, status, color).await,
        Command::Lead { id } => print_lead(&context, id, color).await,
        Command::Calls { status } => print_calls(&context, status, color).await,
        Command::Conversations { status } => print_conversations(&context, status).await,
        Command::Conversation { id } => print_conversation(&context, id).await?,
        Command::Takeover { id } => {
            let mut handoff = context.handoff()?;
            handoff.select(id).await?;
            let responder = handoff.takeover().await?;
            println!("{}", responder.label());
        }
        Command::ReturnAi { id } => {
            let mut handoff = context.handoff()?;
            handoff.select(id).await?;
            let responder = handoff.return_to_ai().await?;
            println!("{}", responder.label());
        }
        Command::Send { id, body } => {
            let mut handoff = context.handoff()?;
            handoff.select(id).await?;
            handoff.set_draft(body);
            match handoff.send_message().await? {
                SendOutcome::Sent(_) => {
                    println!("Sent. {} messages in thread.", handoff.messages().len())
                }
                SendOutcome::Skipped => println!("Nothing to send."),
            }
        }
        Command::Appointments => print_appointments(&context, color).await,
        Command::Report { period } => print_report(&context, period.into()).await,
        Command::Services => print_services(&context).await,
        Command::Watch => watch(&context).await?,
    }

    if let Err(e) = context.sign_out().await {
        tracing::warn!("Sign-out failed: {}", e);
    }
    Ok(())
}

// =============================================================================
// Rendering
// =============================================================================

/// Print the error banner, the empty state or hand the data back
fn settle<T>(page: Page, result: Result<T, ApiError>, is_empty: impl FnOnce(&T) -> bool) -> Option<T> {
    let state = match result {
        Ok(data) => LoadState::derive(Some(data), None, is_empty),
        Err(e) => LoadState::Error(e.to_string()),
    };
    match state {
        LoadState::Ready(data) => Some(data),
        LoadState::Error(e) => {
            println!("{}", error_banner());
            tracing::debug!("{}", e);
            None
        }
        LoadState::Empty | LoadState::Loading => {
            for line in EmptyState::for_page(page).render() {
                println!("{}", line);
            }
            None
        }
    }
}

/// Queries for the signed-in session; logs why a page cannot load otherwise
fn page_queries(context: &SessionContext, page: Page) -> Option<Queries> {
    match context.queries() {
        Ok(queries) => Some(queries),
        Err(e) => {
            tracing::warn!("Cannot load {}: {}", page.label(), e);
            None
        }
    }
}

fn badge(status: impl std::fmt::Display, variant: BadgeVariant, color: bool) -> String {
    StatusBadge::new(&status.to_string(), variant).render(color)
}

async fn print_stats(context: &SessionContext) {
    let Some(queries) = page_queries(context, Page::Dashboard) else { return };
    let result = queries.dashboard_stats().await.map(|cached| cached.data);
    if let Some(stats) = settle(Page::Dashboard, result, |_| false) {
        render_stats(&stats);
    }
}

fn render_stats(stats: &DashboardStats) {
    for (label, period) in [("Today", &stats.today), ("This month", &stats.this_month)] {
        println!(
            "{:<11} calls {:>4}  missed {:>4}  recovered {:>4}  revenue {}",
            label,
            period.total_calls,
            period.missed_calls,
            period.recovered_calls,
            format_currency(period.estimated_revenue)
        );
    }
}

async fn print_recent(context: &SessionContext) {
    let Some(queries) = page_queries(context, Page::Dashboard) else { return };
    let result = queries.recent_activity().await.map(|cached| cached.data);
    if let Some(activities) = settle(Page::Dashboard, result, |a| a.is_empty()) {
        for activity in activities.iter() {
            println!(
                "{:<12} {}  {}",
                format!("{:?}", activity.kind).to_lowercase(),
                activity.description,
                activity.time_ago.as_deref().unwrap_or("")
            );
        }
    }
}

async fn print_leads(context: &SessionContext, status: Option<LeadStatus>, color: bool) {
    let Some(queries) = page_queries(context, Page::Leads) else { return };
    let result = queries.leads(status).await.map(|cached| cached.data);
    if let Some(leads) = settle(Page::Leads, result, |l| l.is_empty()) {
        for lead in leads.iter() {
            println!(
                "{}  {:<24} {:<16} {}",
                lead.id,
                lead.display_name(),
                format_phone(&lead.phone),
                badge(lead.status, BadgeVariant::Lead, color)
            );
        }
    }
}

async fn print_lead(context: &SessionContext, id: Uuid, color: bool) {
    let Some(queries) = page_queries(context, Page::Leads) else { return };
    let result = queries.lead(id).await.map(|cached| cached.data);
    if let Some(detail) = settle(Page::Leads, result, |_| false) {
        let lead = &detail.lead;
        println!("{} ({})", lead.display_name(), format_phone(&lead.phone));
        println!("Status: {}", badge(lead.status, BadgeVariant::Lead, color));
        if let Some(ref service) = lead.service_needed {
            println!("Service: {}", service);
        }
        if let Some(value) = lead.estimated_value {
            println!("Estimated value: {}", format_currency(value));
        }
        for conversation in &detail.conversations {
            println!(
                "Conversation {}: {}",
                conversation.id,
                Responder::from_status(conversation.status)
            );
        }
    }
}

async fn print_calls(context: &SessionContext, status: Option<CallStatus>, color: bool) {
    let Some(queries) = page_queries(context, Page::Calls) else { return };
    let result = queries.calls(status).await.map(|cached| cached.data);
    if let Some(calls) = settle(Page::Calls, result, |c| c.is_empty()) {
        for call in calls.iter() {
            println!(
                "{}  {:<16} {}{}",
                call.created_at.format("%Y-%m-%d %H:%M"),
                format_phone(&call.caller_phone),
                badge(call.status, BadgeVariant::Call, color),
                if call.is_after_hours { "  after hours" } else { "" }
            );
        }
    }
}

async fn print_conversations(context: &SessionContext, status: Option<ConversationStatus>) {
    let Some(queries) = page_queries(context, Page::Conversations) else { return };
    let result = queries.conversations(status).await.map(|cached| cached.data);
    if let Some(conversations) = settle(Page::Conversations, result, |c| c.is_empty()) {
        for conversation in conversations.iter() {
            let name = conversation
                .lead_name
                .as_deref()
                .or(conversation.lead_phone.as_deref())
                .unwrap_or("Unknown");
            println!(
                "{}  {:<24} {:<18} {}",
                conversation.id,
                name,
                Responder::from_status(conversation.status),
                conversation.last_message.as_deref().unwrap_or("")
            );
        }
    }
}

async fn print_conversation(context: &SessionContext, id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
    let mut handoff = context.handoff()?;
    if let Err(e) = handoff.select(id).await {
        println!("{}", error_banner());
        return Err(e.into());
    }
    if let Some(responder) = handoff.responder() {
        println!("{}", responder.label());
    }
    for message in handoff.messages() {
        let who = match message.sender_type {
            SenderType::Caller => "caller",
            SenderType::Ai => "ai",
            SenderType::Human => "you",
        };
        println!(
            "{}  {:<6} {}",
            message.created_at.format("%H:%M"),
            who,
            message.body
        );
    }
    Ok(())
}

async fn print_appointments(context: &SessionContext, color: bool) {
    let Some(queries) = page_queries(context, Page::Appointments) else { return };
    let result = queries.appointments().await.map(|cached| cached.data);
    if let Some(appointments) = settle(Page::Appointments, result, |a| a.is_empty()) {
        for appointment in appointments.iter() {
            println!(
                "{} {}  {:<20} {:<20} {}",
                appointment.scheduled_date,
                appointment.scheduled_time.format("%H:%M"),
                appointment.lead_name.as_deref().unwrap_or(""),
                appointment.service_type.as_deref().unwrap_or(""),
                badge(appointment.status, BadgeVariant::Appointment, color)
            );
        }
    }
}

async fn print_report(context: &SessionContext, period: ReportPeriod) {
    let Some(queries) = page_queries(context, Page::Reports) else { return };
    let result = queries.report(period).await.map(|cached| cached.data);
    if let Some(report) = settle(Page::Reports, result, |r| r.total_calls == 0) {
        println!("{} to {}", report.period_start, report.period_end);
        println!(
            "Calls {}  missed {}  recovered {}",
            report.total_calls, report.missed_calls, report.recovered_calls
        );
        println!(
            "Leads {}  qualified {}  booked {}",
            report.leads_captured, report.leads_qualified, report.appointments_booked
        );
        println!("Revenue {}", format_currency(report.estimated_revenue));
        if let Some(roi) = report.roi_percentage {
            println!("ROI {:.0}%", roi);
        }
    }
}

async fn print_services(context: &SessionContext) {
    let Some(queries) = page_queries(context, Page::Settings) else { return };
    let result = queries.services().await.map(|cached| cached.data);
    if let Some(services) = settle(Page::Settings, result, |s| s.is_empty()) {
        for service in services.iter() {
            println!(
                "{:<28} {:>8}  {} min{}",
                service.name,
                service.price.map(format_currency).unwrap_or_default(),
                service.duration_minutes,
                if service.is_active { "" } else { "  (inactive)" }
            );
        }
    }
}

/// Print stats, then again whenever polling or realtime invalidates them
async fn watch(context: &SessionContext) -> Result<(), Box<dyn std::error::Error>> {
    let queries = context.queries()?;
    let mut invalidations = context.cache().subscribe();
    let _subscriptions = context.watch_all();
    let _pollers = context.start_polling();

    print_stats(context).await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            key = invalidations.recv() => match key {
                Ok(key) if key == keys::dashboard_stats() => {
                    match queries.latest_dashboard_stats().await {
                        Ok(stats) => {
                            println!();
                            render_stats(&stats.data);
                        }
                        Err(e) => {
                            println!("{}", error_banner());
                            tracing::debug!("{}", e);
                        }
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} invalidations", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}
