//! CallHook Dashboard
//!
//! Client library behind the CallHook missed-call recovery dashboard.
//!
//! ## Features
//!
//! - **API client**: typed access to leads, calls, conversations,
//!   appointments, reports and settings
//! - **Query cache**: deduplicated, invalidation-driven reads with polling
//! - **Realtime**: table change notifications turned into cache invalidation
//! - **Hand-off**: taking a conversation over from the AI and handing it back

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod handoff;
pub mod models;
pub mod queries;
pub mod realtime;
pub mod session;
pub mod validation;
pub mod views;

pub use api::{ApiClient, ApiError};
pub use cache::{Cached, QueryCache, QueryKey, Resource};
pub use config::Config;
pub use handoff::{HandoffController, HandoffError, Responder, SendOutcome};
pub use queries::{Queries, QueryError};
pub use realtime::RealtimeBridge;
pub use session::SessionContext;
