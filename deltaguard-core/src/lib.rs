//! Core library for DeltaGuard.
//!
//! DeltaGuard moves tabular data between heterogeneous backends through one
//! provider contract and layers three operations on top of it: full-table
//! migration, data-quality inspection and duplicate correction.
//!
//! # Security Guarantees
//! - Credentials live in [`security::Secret`] and are never logged or
//!   formatted into errors
//! - Connection URLs are redacted before they reach logs or error messages
//! - Every mutating correction or delete is gated on a write probe
//!
//! # Architecture
//! - [`providers`]: the [`Provider`] trait, its registry and seven backends
//! - [`migration`], [`quality`], [`corrections`]: operations written against
//!   `&mut dyn Provider` only
//! - [`formats`] and [`predicate`]: object-storage codecs and in-memory
//!   `WHERE` evaluation
//!
//! # Example
//! ```rust,no_run
//! use deltaguard_core::{migration, providers::{create_provider_from, with_providers}};
//!
//! # async fn demo() -> deltaguard_core::Result<()> {
//! let source = create_provider_from("sqlite:///tmp/source.db")?;
//! let destination = create_provider_from("postgres://etl:pw@db/warehouse")?;
//! let rows = with_providers(source, destination, |s, d| {
//!     Box::pin(async move { migration::migrate(s, d, "orders", migration::DEFAULT_CHUNK_SIZE).await })
//! })
//! .await?;
//! println!("migrated {rows} rows");
//! # Ok(())
//! # }
//! ```

pub mod corrections;
pub mod error;
pub mod formats;
pub mod logging;
pub mod migration;
pub mod models;
pub mod predicate;
pub mod providers;
pub mod quality;
pub mod security;

// Re-export commonly used types
pub use error::{DeltaGuardError, Result};
pub use models::{
    BackendKind, Capability, Column, ColumnKind, PermissionReport, Recordset, Row, WriteMode,
};
pub use providers::{
    Provider, ProviderConfig, create_provider, create_provider_from, supported_backends,
    with_provider, with_providers,
};
pub use quality::QualityReport;
