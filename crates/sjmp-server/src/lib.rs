//! SJMP Server - HTTP front end for the SJMP protocol engine.
//!
//! Binds the first free port of a range, serves every path with the SJMP
//! handler (optional Basic auth, POST only, 1 MiB body cap) and optionally
//! pushes the schema to a registrar in the background.
//!
//! # Example
//!
//! ```rust,no_run
//! use sjmp_server::{SampleObject, ServerOptions, SjmpServer};
//! use std::sync::Arc;
//!
//! # async fn run() -> sjmp_core::Result<()> {
//! let server = SjmpServer::start(ServerOptions::new("demo").with_port_range(40234, 40300)).await?;
//! let sample = Arc::new(SampleObject::new());
//! server.registry().register(&sample, "Sample", "A sample object", "")?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod binder;
pub mod handler;
pub mod push;
pub mod sample;
pub mod server;

pub use auth::{Authorizer, StaticCredentials};
pub use binder::{bind_first_free, bind_tcp};
pub use push::SchemaPusher;
pub use sample::SampleObject;
pub use server::{ServerOptions, SjmpServer};
