//! # relay-connection-helpers
//!
//! Relay-style cursor pagination for GraphQL services.
//!
//! ## Features
//!
//! - **Cursor Codec** - Opaque `arrayconnection` cursors carrying node id and position
//! - **Query Filter** - Limit/order/equality-filter builder materialized over JSON records
//! - **Connection Assembly** - Fetch options from `first`/`last`/`before`/`after`/`orderBy`,
//!   then edges and page info from the fetched records
//! - **Loaders** - Data layer seam plus an in-memory loader
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_connection_helpers::{ConnectionArgs, ConnectionConfig, MemoryLoader, RelayConnection};
//! use serde_json::json;
//!
//! # async fn example() -> relay_connection_helpers::Result<()> {
//! let relay = RelayConnection::from_config(&ConnectionConfig::named("User"))?;
//! let loader = MemoryLoader::new(vec![json!({"id": "1"}), json!({"id": "2"})]);
//! let args = ConnectionArgs::first(1);
//!
//! let result = relay.resolve((), args, &(), &true, &loader).await?;
//! assert_eq!(result.connection.unwrap().edges.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod filter;
pub mod loader;
pub mod pagination;
pub mod relay;
pub mod types;

pub use config::{ConnectionConfig, FilteringConfig, OrderEnum, OrderEnumValue};
pub use filter::{FilterArgs, FilterSpec, QueryFilter};
pub use loader::{FetchOptions, FetchResult, MemoryLoader, ResultLoader};
pub use pagination::{
    Connection, ConnectionArgs, CursorCodec, DecodedCursor, Edge, PageInfo, PaginationInput,
};
pub use relay::{
    assemble_connection, compute_page_info, resolve_edge, ConnectionHooks, ConnectionResult,
    DefaultHooks, EdgeSelection, PageFlags, RelayConnection, WindowMeta,
};
pub use types::{Node, OrderBy, OrderDirection, OrderPair};

use thiserror::Error;

/// Boxed error produced by a data layer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pagination errors
#[derive(Error, Debug)]
pub enum GraphQLError {
    #[error("Malformed cursor: {0}")]
    MalformedCursor(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Couldn't transform result: {0}")]
    Transform(String),

    #[error("Pagination error: {0}")]
    Pagination(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure reported by the data layer, displayed as-is.
    #[error("{0}")]
    Fetch(BoxError),
}

impl GraphQLError {
    /// Wrap a data layer failure.
    pub fn fetch<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Fetch(err.into())
    }
}

/// Result type for pagination operations
pub type Result<T> = std::result::Result<T, GraphQLError>;
