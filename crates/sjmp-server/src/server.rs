//! Server assembly: options, port binding, HTTP serving and schema push.

use crate::auth::{Authorizer, StaticCredentials};
use crate::binder::bind_tcp;
use crate::handler::{router, AppState};
use crate::push::SchemaPusher;
use sjmp_core::{Registry, Result, ServerDefaults, ServerInfo, SjmpError};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};
use url::Url;

/// Settings for [`SjmpServer::start`].
#[derive(Clone)]
pub struct ServerOptions {
    info: ServerInfo,
    host: IpAddr,
    port_start: u16,
    port_end: u16,
    authorizer: Option<Arc<dyn Authorizer>>,
    push_url: Option<String>,
    push_interval: Duration,
}

impl ServerOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ServerInfo::new(name, "", ""),
            host: ServerDefaults::BIND_HOST,
            port_start: ServerDefaults::PORT_MIN,
            port_end: ServerDefaults::PORT_MAX,
            authorizer: None,
            push_url: None,
            push_interval: ServerDefaults::SCHEMA_PUSH_INTERVAL,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.info.group = group.into();
        self
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Port range to try. Zero for either bound selects its default.
    pub fn with_port_range(mut self, start: u16, end: u16) -> Self {
        self.port_start = if start == 0 { ServerDefaults::PORT_MIN } else { start };
        self.port_end = if end == 0 { ServerDefaults::PORT_MAX } else { end };
        self
    }

    /// Require HTTP Basic credentials accepted by `authorizer`.
    pub fn with_authorizer(mut self, authorizer: impl Authorizer) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    pub fn with_credentials(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.with_authorizer(StaticCredentials::new(username, password))
    }

    /// Push the schema to a registrar URL.
    pub fn with_push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = Some(url.into());
        self
    }

    pub fn with_push_interval(mut self, interval: Duration) -> Self {
        self.push_interval = interval;
        self
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }
}

/// A running SJMP server. Dropping it stops serving.
pub struct SjmpServer {
    registry: Arc<Registry>,
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    push_shutdown_tx: watch::Sender<bool>,
    serve_task: Option<JoinHandle<()>>,
    push_task: Option<JoinHandle<()>>,
}

impl SjmpServer {
    /// Bind the first free port of the range and start serving.
    pub async fn start(options: ServerOptions) -> Result<Self> {
        info!("Starting SJMP server '{}'", options.info.name);

        let registry = Arc::new(Registry::new(options.info.clone()));
        let (port, std_listener) = bind_tcp(options.host, options.port_start, options.port_end)?;
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|source| SjmpError::Bind { port, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| SjmpError::Bind { port, source })?;
        registry.set_port(port)?;

        let app = router(Arc::new(AppState {
            registry: registry.clone(),
            authorizer: options.authorizer.clone(),
        }));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let serve_task = tokio::spawn(async move {
            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
            if let Err(e) = result {
                error!("SJMP server error: {}", e);
            }
            info!("SJMP server stopped");
        });

        let (push_shutdown_tx, push_shutdown_rx) = watch::channel(false);
        let push_task = match &options.push_url {
            Some(url) => match Url::parse(url) {
                Ok(url) => {
                    match SchemaPusher::new(registry.clone(), url, options.push_interval) {
                        Ok(pusher) => Some(pusher.spawn(push_shutdown_rx)),
                        Err(e) => {
                            error!("Error starting schema push: {}", e);
                            None
                        }
                    }
                }
                Err(e) => {
                    error!("Error starting schema push: invalid url '{}': {}", url, e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            registry,
            addr,
            shutdown_tx: Some(shutdown_tx),
            push_shutdown_tx,
            serve_task: Some(serve_task),
            push_task,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Whether a schema push task is running.
    pub fn is_pushing(&self) -> bool {
        self.push_task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop accepting connections and stop the push task.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.push_shutdown_tx.send(true);
    }

    /// Shut down and wait for in-flight requests to finish.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(task) = self.serve_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.push_task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SjmpServer {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(task) = self.push_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = ServerOptions::new("defaults");
        assert_eq!(options.host, ServerDefaults::BIND_HOST);
        assert_eq!(options.port_start, ServerDefaults::PORT_MIN);
        assert_eq!(options.port_end, ServerDefaults::PORT_MAX);

        let options = options.with_port_range(0, 0);
        assert_eq!(options.port_start, ServerDefaults::PORT_MIN);
        assert_eq!(options.port_end, ServerDefaults::PORT_MAX);
    }
}
