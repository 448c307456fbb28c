use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::config::Config;
use crate::http::connection::Connection;

/// Bound listening socket plus the frozen application it serves.
pub struct Server {
    listener: TcpListener,
    app: Arc<App>,
    config: Arc<Config>,
    permits: Arc<Semaphore>,
}

impl Server {
    pub async fn bind(cfg: &Config, app: App) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&cfg.listen_addr).await?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            app: Arc::new(app),
            config: Arc::new(cfg.clone()),
            permits: Arc::new(Semaphore::new(cfg.max_connections)),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until the process exits.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` completes. Connections already accepted keep
    /// running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            // at most max_connections connections are served at once
            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => permit?,
                _ = &mut shutdown => break,
            };

            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = &mut shutdown => break,
            };

            let (socket, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    // e.g. EMFILE; the listener itself is still usable
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };
            debug!("Accepted connection from {}", peer);

            if let Err(e) = socket.set_nodelay(true) {
                debug!(%peer, error = %e, "could not set TCP_NODELAY");
            }

            let app = Arc::clone(&self.app);
            let config = Arc::clone(&self.config);
            tokio::spawn(async move {
                let mut conn = Connection::new(socket, peer.to_string(), app, config);
                if let Err(e) = conn.run().await {
                    error!("Connection error from {}: {:#}", peer, e);
                }
                drop(permit);
            });
        }

        info!("Listener stopped");
        Ok(())
    }
}

/// Binds `cfg.listen_addr` and serves `app` until the process exits.
pub async fn run(cfg: &Config, app: App) -> anyhow::Result<()> {
    Server::bind(cfg, app).await?.run().await
}
