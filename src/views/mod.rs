//! Presentation helpers
//!
//! Stateless building blocks shared by every page: status badges, skeleton
//! placeholders, empty states, the error banner and value formatting.

use crate::cache::{QueryCache, QueryKey};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Navigation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Calls,
    Leads,
    Conversations,
    Appointments,
    Reports,
    Settings,
}

impl Page {
    pub const ALL: [Page; 7] = [
        Page::Dashboard,
        Page::Calls,
        Page::Leads,
        Page::Conversations,
        Page::Appointments,
        Page::Reports,
        Page::Settings,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Calls => "Calls",
            Self::Leads => "Leads",
            Self::Conversations => "Conversations",
            Self::Appointments => "Appointments",
            Self::Reports => "Reports",
            Self::Settings => "Settings",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::Calls => "/calls",
            Self::Leads => "/leads",
            Self::Conversations => "/conversations",
            Self::Appointments => "/appointments",
            Self::Reports => "/reports",
            Self::Settings => "/settings",
        }
    }

    /// Whether `path` is this page or one of its sub-pages
    pub fn is_active(self, path: &str) -> bool {
        let own = self.path();
        path == own
            || path
                .strip_prefix(own)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

// =============================================================================
// Status badges
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Navy,
    Teal,
    Amber,
    Purple,
    Red,
    Green,
    /// Unknown status
    Neutral,
}

impl Tone {
    /// ANSI SGR colour code for terminal output
    pub fn ansi(self) -> &'static str {
        match self {
            Self::Navy => "34",
            Self::Teal => "36",
            Self::Amber => "33",
            Self::Purple => "35",
            Self::Red => "31",
            Self::Green => "32",
            Self::Neutral => "90",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BadgeVariant {
    #[default]
    Call,
    Lead,
    Appointment,
}

impl BadgeVariant {
    fn tone(self, status: &str) -> Option<Tone> {
        let tone = match (self, status) {
            (Self::Call, "missed") => Tone::Red,
            (Self::Call, "answered") => Tone::Teal,
            (Self::Call, "voicemail") => Tone::Amber,

            (Self::Lead, "new") => Tone::Navy,
            (Self::Lead, "qualifying") => Tone::Amber,
            (Self::Lead, "qualified") => Tone::Teal,
            (Self::Lead, "booked") => Tone::Purple,
            (Self::Lead, "lost") => Tone::Red,
            (Self::Lead, "converted") => Tone::Green,

            (Self::Appointment, "scheduled") => Tone::Navy,
            (Self::Appointment, "confirmed") => Tone::Teal,
            (Self::Appointment, "completed") => Tone::Green,
            (Self::Appointment, "cancelled") => Tone::Red,
            (Self::Appointment, "no_show") => Tone::Amber,

            _ => return None,
        };
        Some(tone)
    }
}

/// Coloured pill showing a record's status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: String,
    pub tone: Tone,
}

impl StatusBadge {
    pub fn new(status: &str, variant: BadgeVariant) -> Self {
        Self {
            label: status.replace('_', " "),
            tone: variant.tone(status).unwrap_or(Tone::Neutral),
        }
    }

    pub fn render(&self, color: bool) -> String {
        if color {
            format!("\x1b[{}m{}\x1b[0m", self.tone.ansi(), self.label)
        } else {
            self.label.clone()
        }
    }
}

impl fmt::Display for StatusBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

// =============================================================================
// Skeletons
// =============================================================================

const SHADE: char = '░';

/// Rows shown by a skeleton list unless told otherwise
pub const DEFAULT_SKELETON_ROWS: usize = 5;

pub fn skeleton_line(width: usize) -> String {
    std::iter::repeat(SHADE).take(width).collect()
}

/// Stat card placeholder: icon block, value and caption
pub fn skeleton_card() -> Vec<String> {
    vec![
        format!("{}  {}", skeleton_line(2), skeleton_line(8)),
        format!("{}  {}", " ".repeat(2), skeleton_line(12)),
    ]
}

/// Table row placeholder
pub fn skeleton_row() -> String {
    format!(
        "{}  {}  {}{}{}",
        skeleton_line(12),
        skeleton_line(16),
        skeleton_line(10),
        " ".repeat(8),
        skeleton_line(8)
    )
}

pub fn skeleton_list(rows: usize) -> Vec<String> {
    (0..rows).map(|_| skeleton_row()).collect()
}

// =============================================================================
// Empty and error states
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyAction {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyState {
    pub heading: String,
    pub description: String,
    pub action: Option<EmptyAction>,
}

impl EmptyState {
    pub fn new(heading: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            description: description.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, label: impl Into<String>, href: impl Into<String>) -> Self {
        self.action = Some(EmptyAction {
            label: label.into(),
            href: href.into(),
        });
        self
    }

    /// Copy shown by a page with nothing to list
    pub fn for_page(page: Page) -> Self {
        match page {
            Page::Dashboard => Self::new(
                "No activity",
                "No activity yet. Missed calls will appear here.",
            ),
            Page::Calls => Self::new("No calls", "No calls recorded yet."),
            Page::Leads => Self::new("No leads", "No leads captured yet."),
            Page::Conversations => Self::new("No conversations", "No active conversations."),
            Page::Appointments => Self::new("No appointments", "No appointments scheduled."),
            Page::Reports => Self::new(
                "No reports",
                "Reports will appear once you have call data.",
            ),
            Page::Settings => Self::new("No services", "Add the services you offer.")
                .with_action("Add service", "/settings"),
        }
    }

    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![self.heading.clone(), self.description.clone()];
        if let Some(ref action) = self.action {
            lines.push(format!("[{}] {}", action.label, action.href));
        }
        lines
    }
}

/// Static text of the inline error banner
pub const ERROR_BANNER_TEXT: &str = "Failed to load data. Please try refreshing.";

pub fn error_banner() -> String {
    format!("! {}", ERROR_BANNER_TEXT)
}

// =============================================================================
// Load state
// =============================================================================

/// What a page renders for one query
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    /// Nothing cached yet: skeletons
    Loading,
    /// Last fetch failed: error banner
    Error(String),
    /// Fetched, nothing to show: empty state
    Empty,
    Ready(T),
}

impl<T> LoadState<T> {
    /// Error wins over cached data so a failed refresh is never silent,
    /// then loading, then empty.
    pub fn derive<F>(data: Option<T>, error: Option<String>, is_empty: F) -> Self
    where
        F: FnOnce(&T) -> bool,
    {
        if let Some(error) = error {
            return Self::Error(error);
        }
        match data {
            None => Self::Loading,
            Some(data) if is_empty(&data) => Self::Empty,
            Some(data) => Self::Ready(data),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl<T: Send + Sync + 'static> LoadState<Arc<T>> {
    /// State of a cached query
    pub fn of_query<F>(cache: &QueryCache, key: &QueryKey, is_empty: F) -> Self
    where
        F: FnOnce(&T) -> bool,
    {
        let data = cache.peek::<T>(key).map(|cached| cached.data);
        Self::derive(data, cache.error(key), |data| is_empty(data))
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// `+1XXXXXXXXXX` as `(XXX) XXX-XXXX`; anything else unchanged
pub fn format_phone(phone: &str) -> String {
    match phone.strip_prefix("+1") {
        Some(digits) if phone.len() == 12 && digits.is_ascii() => format!(
            "({}) {}-{}",
            &digits[..3],
            &digits[3..6],
            &digits[6..]
        ),
        _ => phone.to_string(),
    }
}

/// Whole US dollars with thousands separators, e.g. `$1,234`
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Resource;

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("+15551234567"), "(555) 123-4567");
        assert_eq!(format_phone("+445551234567"), "+445551234567");
        assert_eq!(format_phone("5551234567"), "5551234567");
        assert_eq!(format_phone("+1555123"), "+1555123");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1234.0), "$1,234");
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(999.5), "$1,000");
        assert_eq!(format_currency(1234567.0), "$1,234,567");
        assert_eq!(format_currency(-42.0), "-$42");
    }

    #[test]
    fn test_badge_tones() {
        assert_eq!(StatusBadge::new("missed", BadgeVariant::Call).tone, Tone::Red);
        assert_eq!(StatusBadge::new("booked", BadgeVariant::Lead).tone, Tone::Purple);
        assert_eq!(
            StatusBadge::new("completed", BadgeVariant::Appointment).tone,
            Tone::Green
        );
        // Same word, different table
        assert_eq!(StatusBadge::new("missed", BadgeVariant::Lead).tone, Tone::Neutral);
        assert_eq!(StatusBadge::new("whatever", BadgeVariant::Call).tone, Tone::Neutral);
    }

    #[test]
    fn test_badge_label() {
        let badge = StatusBadge::new("no_show", BadgeVariant::Appointment);
        assert_eq!(badge.to_string(), "no show");
        assert_eq!(badge.tone, Tone::Amber);
        assert_eq!(badge.render(true), "\x1b[33mno show\x1b[0m");
    }

    #[test]
    fn test_skeleton_list_rows() {
        assert_eq!(skeleton_list(DEFAULT_SKELETON_ROWS).len(), 5);
        assert_eq!(skeleton_line(4), "░░░░");
        assert_eq!(skeleton_card().len(), 2);
    }

    #[test]
    fn test_empty_state_copy() {
        assert_eq!(
            EmptyState::for_page(Page::Leads).description,
            "No leads captured yet."
        );
        let settings = EmptyState::for_page(Page::Settings);
        assert_eq!(settings.render().len(), 3);
    }

    #[test]
    fn test_nav_active() {
        assert!(Page::Leads.is_active("/leads"));
        assert!(Page::Leads.is_active("/leads/123"));
        assert!(!Page::Leads.is_active("/leadsx"));
    }

    #[test]
    fn test_load_state_precedence() {
        let empty = |v: &Vec<u8>| v.is_empty();
        assert_eq!(LoadState::<Vec<u8>>::derive(None, None, empty), LoadState::Loading);
        assert_eq!(
            LoadState::derive(Some(vec![1]), Some("boom".into()), empty),
            LoadState::Error("boom".into())
        );
        assert_eq!(LoadState::derive(Some(vec![]), None, empty), LoadState::Empty);
        assert!(LoadState::derive(Some(vec![1]), None, empty).is_ready());
    }

    #[tokio::test]
    async fn test_load_state_of_query() {
        let cache = QueryCache::default();
        let key = QueryKey::new(Resource::Calls);
        let state = LoadState::<Arc<Vec<u8>>>::of_query(&cache, &key, |v| v.is_empty());
        assert_eq!(state, LoadState::Loading);

        cache
            .fetch(key.clone(), || async { Ok::<_, String>(Vec::<u8>::new()) })
            .await
            .unwrap();
        let state = LoadState::<Arc<Vec<u8>>>::of_query(&cache, &key, |v| v.is_empty());
        assert_eq!(state, LoadState::Empty);
    }
}
