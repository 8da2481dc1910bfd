//! Patient health-portal gateway.
//!
//! Proxies the Heidi clinical-data API and a Gemini explainer behind one
//! HTTP surface: transcript summarization, plain-language explanations,
//! timeline, documents, and profile.

pub mod config;
pub mod explainer;
pub mod heidi;
pub mod jwt;
pub mod models;
pub mod server;
pub mod summary;
pub mod timeline;
pub mod transcript;
