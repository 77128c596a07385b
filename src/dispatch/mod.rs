//! Dispatch surface shared by the CLI and the tool server
//!
//! - **operations**: the fixed table of named operations and their defaults
//! - **args**: generic argument map with typed, field-aware accessors
//! - **router**: validation, engine calls and rendering
//! - **render**: canonical JSON and text output
//!
//! ```text
//! CLI subcommand ─┐
//!                 ├→ (name, ArgMap) → Router::dispatch → Rendered { json, text }
//! tools/call ─────┘
//! ```

pub mod args;
pub mod operations;
pub mod render;
pub mod router;

pub use args::{ArgMap, Args};
pub use operations::{find, Operation, OperationKind, Surface, OPERATIONS};
pub use render::{Output, Rendered};
pub use router::Router;
