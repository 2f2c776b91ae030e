//! Qizx REST API binding
//!
//! Typed client for the Qizx XML database REST service:
//!
//! - **Connection**: service URL or named configuration section ([`ConnectionConfig`])
//! - **Documents**: `get`, `put`, `mkcol`, `move`, `copy`, `delete`
//! - **Properties**: `getprop`, `setprop` with typed [`PropertyValue`]s
//! - **Queries**: `eval` as raw serialization or decoded items
//! - **Batches**: buffered uploads and property transactions ([`DocumentBatch`], [`PropertyBatch`])
//! - **Queries**: `queryprop` selects members by their properties
//! - **Administration**: `listlib`, `mklib`, `dellib`, `server`, `reindex`, `optimize`,
//!   `backup` with `progress`/`wait`, indexing, access control, configuration,
//!   statistics, tasks and running queries

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod batch;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
mod json;
pub mod types;
mod xml;

pub use batch::{DocumentBatch, PropertyBatch};
pub use client::{Client, DEFAULT_POLL};
pub use config::{ConnectionConfig, Verify, DEFAULT_TARGET};
pub use error::{QizxError, Result};
pub use types::{
    AclScope, Counting, EvalFormat, InfoLevel, ItemsOptions, Member, MemberKind, Properties,
    PropertyUpdate, PropertyValue, Record, ServerCommand, TaskProgress,
};
