//! # leadflow-zapi
//!
//! Z-API integration: inbound webhook payload classification and the
//! outbound send client.

mod client;
pub mod webhook;

pub use client::ZapiClient;
