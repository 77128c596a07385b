//! # HealthBridge
//!
//! Personal health data through two front ends: a command-line tool and an
//! MCP tool server speaking JSON-RPC 2.0 over stdio. Both resolve their
//! arguments through one operation table and one router, so a request
//! produces the same JSON document whichever way it arrives.
//!
//! ## Modules
//!
//! - [`health`]: data type registry, units, dates and record types
//! - [`store`]: the `HealthStore` trait and its memory and journal backends
//! - [`query`]: sums, samples, statistics, trends and writes over a store
//! - [`dispatch`]: operation table, argument handling, rendering
//! - [`mcp`]: JSON-RPC types and the stdio tool server
//! - [`cli`]: clap command tree
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use healthbridge::dispatch::{ArgMap, Router, Surface};
//! use healthbridge::store::{MemoryStore, StoreHandle};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::new(StoreHandle::from_store(Arc::new(MemoryStore::new())));
//!
//!     let mut args = ArgMap::new();
//!     args.insert("from".into(), "7d".into());
//!     let steps = router.dispatch(Surface::Protocol, "health_read_steps", &args).await?;
//!
//!     println!("{}", steps.pretty());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod mcp;
pub mod query;
pub mod store;

pub use config::{Config, ConfigError, LoggingConfig, McpConfig, StoreBackend, StoreConfig, SyncMode};
pub use dispatch::{ArgMap, Operation, Rendered, Router, Surface, OPERATIONS};
pub use error::{HealthError, HealthResult};
pub use health::{registry, AggregationMode, DataType, DataTypeRegistry, TimeInterval};
pub use mcp::McpServer;
pub use query::{GroupBy, QueryEngine};
pub use store::{HealthStore, JournalStore, MemoryStore, StoreError, StoreHandle};
