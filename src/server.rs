//! Multi-listener HTTP lifecycle driver.
//!
//! `ServerGroup` binds a set of warp listeners and runs them until a process
//! signal (or a [`ShutdownHandle`]) requests shutdown, then drains every
//! listener gracefully under a single deadline and logs the tally.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use log::{info, warn};
use once_cell::sync::Lazy;
use scopeguard::defer;
use tokio::sync::watch;
use tokio::time::timeout;
use warp::Filter;

use crate::error::{Error, Result};
use crate::Config;

static ACTIVE_LISTENERS: Lazy<Arc<AtomicIsize>> = Lazy::new(|| Arc::new(AtomicIsize::new(0)));

/// Number of listeners currently serving, across all groups in the process.
pub fn active_listeners() -> isize {
    ACTIVE_LISTENERS.load(Ordering::SeqCst)
}

/// Requests shutdown of the [`ServerGroup`] it was taken from.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Fires the group's shutdown channel. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        self.tx.send(true)?;
        Ok(())
    }
}

/// A set of HTTP listeners sharing one filter and one shutdown sequence.
pub struct ServerGroup {
    laddrs: Vec<SocketAddr>,
    cfg: Arc<Config>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ServerGroup {
    /// Creates a group listening on `laddrs` once [`run`](Self::run) is called.
    pub fn new(laddrs: Vec<SocketAddr>, cfg: Arc<Config>) -> Self {
        let (tx, rx) = watch::channel(false);
        ServerGroup {
            laddrs,
            cfg,
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    /// Returns a handle that triggers this group's shutdown without a signal.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Binds every address and serves `filter` until shutdown is requested
    /// by a process signal or a [`ShutdownHandle`].
    ///
    /// Once requested, all listeners stop accepting and drain in-flight
    /// requests; the whole drain is bounded by `Config::shutdown_timeout`,
    /// after which `Error::Elapsed` is returned.
    pub async fn run<F>(self, filter: F) -> Result<()>
    where
        F: Filter<Error = warp::Rejection> + Clone + Send + Sync + 'static,
        F::Extract: warp::Reply,
    {
        let ServerGroup {
            laddrs,
            cfg,
            shutdown_tx,
            shutdown_rx,
        } = self;

        let mut handles = Vec::with_capacity(laddrs.len());
        for laddr in laddrs {
            let mut rx = shutdown_rx.clone();
            let (bound, server) = warp::serve(filter.clone())
                .try_bind_with_graceful_shutdown(laddr, async move {
                    let _ = rx.changed().await;
                })
                .map_err(|e| Error::Bind(laddr, e.to_string()))?;
            info!("listening HTTP requests on: {}", bound);
            handles.push(tokio::spawn(async move {
                ACTIVE_LISTENERS.fetch_add(1, Ordering::SeqCst);
                defer! {
                    ACTIVE_LISTENERS.fetch_sub(1, Ordering::SeqCst);
                }
                server.await;
                bound
            }));
        }

        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            let _ = tx.send(true);
        });

        let mut rx = shutdown_rx;
        let _ = rx.changed().await;

        match timeout(cfg.shutdown_timeout, join_all(handles)).await {
            Ok(results) => {
                let mut success = 0;
                let mut mistake = 0;
                for result in results {
                    match result {
                        Ok(addr) => {
                            info!("{} shutdown success", addr);
                            success += 1;
                        }
                        Err(e) => {
                            warn!("listener shutdown failed, {}", e);
                            mistake += 1;
                        }
                    }
                }
                info!(
                    "shutdown completed, success total is {}, fail total is {}",
                    success, mistake
                );
                Ok(())
            }
            Err(_) => {
                warn!("timeout waiting for listeners to stop");
                Err(Error::Elapsed)
            }
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => return stalled("SIGHUP", e).await,
    };
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => return stalled("SIGINT", e).await,
    };
    let mut quit = match signal(SignalKind::quit()) {
        Ok(s) => s,
        Err(e) => return stalled("SIGQUIT", e).await,
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => return stalled("SIGTERM", e).await,
    };

    tokio::select! {
        _ = hangup.recv() => info!("SIGHUP"),
        _ = interrupt.recv() => info!("SIGINT"),
        _ = quit.recv() => info!("SIGQUIT"),
        _ = terminate.recv() => info!("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        stalled("ctrl-c", e).await;
    }
}

/// A listener that cannot register its signal must never fake one.
async fn stalled(kind: &str, e: std::io::Error) {
    warn!("cannot listen for {}, {}", kind, e);
    futures::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback() -> SocketAddr {
        // port 0: the OS picks a free port, so tests never collide
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn handle_stops_every_listener() {
        let cfg = Arc::new(Config::default());
        let group = ServerGroup::new(vec![loopback(), loopback()], cfg);
        let handle = group.shutdown_handle();

        let routes = warp::get().map(|| "ok");
        let running = tokio::spawn(group.run(routes));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(active_listeners(), 2);

        handle.shutdown().unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(active_listeners(), 0);
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let cfg = Arc::new(Config::default());
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = holder.local_addr().unwrap();

        let group = ServerGroup::new(vec![taken], cfg);
        let routes = warp::get().map(|| "ok");
        match group.run(routes).await {
            Err(Error::Bind(addr, _)) => assert_eq!(addr, taken),
            other => panic!("expected bind error, got {:?}", other),
        }
    }
}
