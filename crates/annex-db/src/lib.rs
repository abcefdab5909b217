//! # annex-db
//!
//! PostgreSQL-backed attachment metadata store. The uniqueness sweep and the
//! surviving record's write run in one transaction, so a crash cannot leave
//! a half-applied supersession.

pub mod pool;
pub mod store;

pub use pool::{Database, DatabaseConfig};
pub use store::PgAttachmentStore;
