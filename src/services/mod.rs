//! Connection lifecycle services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the OAuth flow, stats, and persistence calls so route
//! handlers stay focused on protocol translation: query/body extraction in,
//! redirects and JSON out.

pub mod accounts;
pub mod authorize;
pub mod callback;
pub mod disconnect;
pub mod stats;
