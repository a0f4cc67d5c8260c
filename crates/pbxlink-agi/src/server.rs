use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::AgiConnection;
use crate::engine::run_menu;
use crate::error::{AgiError, Result};
use crate::menu::MenuTree;

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct AgiServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,
    /// Port to bind; `None` is an argument error. `Some(0)` picks an ephemeral port.
    pub port: Option<u16>,
}

impl Default for AgiServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: None,
        }
    }
}

impl AgiServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<u16> {
        self.port.ok_or(AgiError::MissingPort)
    }
}

/// Menu trees keyed by selector (`agi_network_script`).
#[derive(Debug, Clone, Default)]
pub struct MenuRegistry {
    trees: HashMap<String, Arc<MenuTree>>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `tree` under its selector, replacing any earlier tree for it.
    pub fn register(&mut self, tree: MenuTree) -> Option<Arc<MenuTree>> {
        let selector = tree.selector().to_string();
        let previous = self.trees.insert(selector.clone(), Arc::new(tree));
        if previous.is_some() {
            warn!(%selector, "replacing registered menu");
        }
        previous
    }

    pub fn get(&self, selector: &str) -> Option<&Arc<MenuTree>> {
        self.trees.get(selector)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

/// TCP listener that greets each peer and runs its menu.
pub struct AgiServer {
    listener: TcpListener,
    menus: MenuRegistry,
}

impl AgiServer {
    /// Validate `config` and bind the listening socket.
    pub async fn bind(config: &AgiServerConfig) -> Result<Self> {
        let port = config.validate()?;
        let listener = TcpListener::bind((config.host.as_str(), port))
            .await
            .map_err(|source| AgiError::Bind {
                addr: format!("{}:{port}", config.host),
                source,
            })?;
        let server = Self {
            listener,
            menus: MenuRegistry::new(),
        };
        if let Ok(addr) = server.local_addr() {
            info!(%addr, "AGI server listening");
        }
        Ok(server)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn register_menu(&mut self, tree: MenuTree) {
        self.menus.register(tree);
    }

    pub fn menus(&self) -> &MenuRegistry {
        &self.menus
    }

    /// Accept one connection and read its greeting.
    pub async fn accept(&self) -> Result<AgiConnection<TcpStream>> {
        let (stream, peer) = self.listener.accept().await.map_err(AgiError::Accept)?;
        AgiConnection::accept(stream, Some(peer)).await
    }

    /// Accept until `shutdown` fires, one task per connection.
    ///
    /// Connections whose selector has a registered menu run it; all others
    /// are passed to `handler`.
    pub async fn serve<H, Fut>(self, shutdown: CancellationToken, handler: H) -> Result<()>
    where
        H: Fn(AgiConnection<TcpStream>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let menus = Arc::new(self.menus);
        let handler = Arc::new(handler);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("AGI server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "accepted AGI connection");
                        let menus = Arc::clone(&menus);
                        let handler = Arc::clone(&handler);
                        tokio::spawn(handle_connection(stream, peer, menus, handler));
                    }
                    Err(err) if is_transient(&err) => {
                        warn!(error = %err, "transient accept error");
                    }
                    Err(err) => return Err(AgiError::Accept(err)),
                },
            }
        }
    }
}

async fn handle_connection<H, Fut>(
    stream: TcpStream,
    peer: SocketAddr,
    menus: Arc<MenuRegistry>,
    handler: Arc<H>,
) where
    H: Fn(AgiConnection<TcpStream>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut conn = match AgiConnection::accept(stream, Some(peer)).await {
        Ok(conn) => conn,
        Err(err) => {
            warn!(%peer, code = err.code(), error = %err, "AGI greeting failed");
            return;
        }
    };

    let tree = conn
        .network_script()
        .and_then(|script| menus.get(script))
        .cloned();
    match tree {
        Some(tree) => {
            if let Err(err) = run_menu(&mut conn, &tree).await {
                warn!(%peer, code = err.code(), error = %err, "menu aborted");
            }
        }
        None => handler(conn).await,
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::sync::mpsc;

    use super::*;
    use crate::menu::MenuItem;

    fn single_command_tree(selector: &str) -> MenuTree {
        MenuTree::new(
            selector,
            "entry",
            [("entry".to_string(), vec![MenuItem::new("ANSWER")])],
        )
        .unwrap()
    }

    #[test]
    fn missing_port_is_argument_error() {
        let err = AgiServerConfig::default().validate().unwrap_err();
        assert!(matches!(err, AgiError::MissingPort));
        assert_eq!(err.code(), "E_AGI_ARGUMENT_PORT");
    }

    #[test]
    fn registry_replaces_by_selector() {
        let mut registry = MenuRegistry::new();
        assert!(registry.register(single_command_tree("a")).is_none());
        assert!(registry.register(single_command_tree("a")).is_some());
        registry.register(single_command_tree("b"));
        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
        assert!(registry.get("c").is_none());
    }

    #[tokio::test]
    async fn bind_without_port_fails_before_listening() {
        let result = AgiServer::bind(&AgiServerConfig::default()).await;
        assert!(matches!(result, Err(AgiError::MissingPort)));
    }

    #[tokio::test]
    async fn serve_dispatches_by_selector() {
        let config = AgiServerConfig {
            host: "127.0.0.1".to_string(),
            port: Some(0),
        };
        let mut server = AgiServer::bind(&config).await.unwrap();
        server.register_menu(single_command_tree("app300"));
        let addr = server.local_addr().unwrap();

        let (unmatched_tx, mut unmatched_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let serving = tokio::spawn(server.serve(shutdown.clone(), move |mut conn| {
            let tx = unmatched_tx.clone();
            async move {
                let _ = tx.send(conn.network_script().map(str::to_string));
                conn.close().await;
            }
        }));

        // Matched selector runs the registered menu.
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut peer = BufReader::new(stream);
        peer.get_mut()
            .write_all(b"agi_network_script: app300\nagi_channel: SIP/1\n\n")
            .await
            .unwrap();
        let mut line = String::new();
        peer.read_line(&mut line).await.unwrap();
        assert_eq!(line, "ANSWER\n");
        peer.get_mut().write_all(b"200 result=0\n").await.unwrap();
        let mut rest = Vec::new();
        peer.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        // Unknown selector goes to the handler.
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"agi_network_script: other\n\n").await.unwrap();
        assert_eq!(unmatched_rx.recv().await, Some(Some("other".to_string())));

        shutdown.cancel();
        serving.await.unwrap().unwrap();
    }
}
