//! HTTP API client for the CallHook backend

pub mod appointments;
pub mod client;
pub mod conversations;
pub mod dashboard;
pub mod leads;
pub mod settings;

pub use client::*;
