//! # leadflow-providers
//!
//! AI responder implementations for Leadflow.

pub mod gemini;

pub use gemini::GeminiResponder;
