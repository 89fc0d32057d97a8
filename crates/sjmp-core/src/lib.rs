//! SJMP Core - object registry, type system and request dispatcher for the
//! Simple JSON Management Protocol.
//!
//! A host registers in-memory objects with a [`Registry`]; their typed
//! properties and actions become readable, writable and invokable through
//! JSON envelopes handled by [`dispatch::handle_body`]. The HTTP front end
//! lives in `sjmp-server`; [`SjmpClient`] talks to it.
//!
//! # Example
//!
//! ```rust
//! use sjmp_core::{Action, ObjectBuilder, Property, Registry, ServerInfo};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! # fn main() -> sjmp_core::Result<()> {
//! let registry = Registry::new(ServerInfo::new("demo", "Demo server", ""));
//! let flag = Arc::new(AtomicBool::new(false));
//!
//! let builder = ObjectBuilder::new()
//!     .property(
//!         Property::new("enabled", "feature flag", |f: &AtomicBool| f.load(Ordering::SeqCst))
//!             .setter(|f: &AtomicBool, v| f.store(v, Ordering::SeqCst)),
//!     )
//!     .action(Action::new("toggle", "Flip the flag", |f: &AtomicBool, _args| {
//!         Ok(!f.fetch_xor(true, Ordering::SeqCst))
//!     }));
//! registry.register_with(&flag, "flag", "A feature flag", "features", builder)?;
//!
//! registry.set_property("flag", "enabled", &serde_json::json!(true))?;
//! assert!(flag.load(Ordering::SeqCst));
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod client;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod object;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use cancel::{CancellationToken, CancelledError};
pub use client::SjmpClient;
pub use config::{ClientConfig, ProtocolConfig, ServerDefaults};
pub use descriptor::{ActionDescriptor, Limits, ParameterDescriptor, PropertyDescriptor};
pub use dispatch::{handle_body, Reply};
pub use error::{ErrorKind, Result, SjmpError};
pub use object::{Action, Arguments, ManagedObject, ObjectBuilder, Property};
pub use protocol::{Command, Request, Response};
pub use registry::Registry;
pub use schema::{ObjectSchema, Schema, ServerInfo};
pub use types::{NumericCategory, WireType};
pub use value::{HostType, WireValue};
