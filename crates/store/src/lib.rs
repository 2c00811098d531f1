//! PostgreSQL persistence for the order-processing core.
//!
//! [`PostgresRepository`] implements the domain's repository ports. The schema
//! lives in the workspace `migrations/` directory.

pub mod error;
pub mod postgres;

pub use error::{Result, StoreError};
pub use postgres::PostgresRepository;
