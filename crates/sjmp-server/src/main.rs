//! SJMP sample server.
//!
//! Registers two sample objects and serves them until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use sjmp_core::ServerDefaults;
use sjmp_server::{SampleObject, ServerOptions, SjmpServer};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sjmp-sample-server")]
#[command(about = "Sample server exposing two managed objects over SJMP")]
struct Args {
    /// URL of a registrar to push the schema to
    push_url: Option<String>,

    /// First port to try (0 = default)
    #[arg(long, default_value = "0")]
    port_start: u16,

    /// Last port to try (0 = default)
    #[arg(long, default_value = "0")]
    port_end: u16,

    /// Host to bind to
    #[arg(long, default_value_t = ServerDefaults::BIND_HOST)]
    host: IpAddr,

    /// Require HTTP Basic auth with this username
    #[arg(long, requires = "password")]
    user: Option<String>,

    /// Password for --user
    #[arg(long, requires = "user")]
    password: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let mut options = ServerOptions::new("SchemaName")
        .with_description("Schema description")
        .with_group("Sample group")
        .with_host(args.host)
        .with_port_range(args.port_start, args.port_end);
    if let Some(url) = args.push_url {
        options = options.with_push_url(url);
    }
    if let (Some(user), Some(password)) = (args.user, args.password) {
        options = options.with_credentials(user, password);
    }

    let server = SjmpServer::start(options).await?;
    let registry = server.registry().clone();

    let obj1 = Arc::new(SampleObject::new());
    let obj2 = Arc::new(SampleObject::new());
    registry.register(
        &obj1,
        "SampleObjectName1",
        "First SampleObject Description",
        "SampleObject Group",
    )?;
    registry.register(
        &obj2,
        "SampleObjectName2",
        "Second SampleObject Description",
        "SampleObject Group",
    )?;

    info!("Server started on port {}, press Ctrl-C to close", server.port());

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    obj1.stop_timer();
    obj2.stop_timer();
    registry.unregister(&obj1)?;
    registry.unregister(&obj2)?;
    server.stop().await;

    Ok(())
}
