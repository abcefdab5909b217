//! # annex-core
//!
//! Shared building blocks for the Annex attachment engine:
//!
//! - field-scoped validation errors with stable error codes
//! - the explicit attachments configuration (upload ceiling, contexts,
//!   default context)

pub mod config;
pub mod error;

pub use config::AttachmentsConfig;
pub use error::{FieldError, ValidationErrors};
