use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Debug, Display, Formatter},
    sync::Arc,
};

use connection::{Connection, ConnectionError};
use futures::SinkExt;
use log::{debug, info};
use rigview_protocol::message::ReloadMessage;
use serve::Serve;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

pub mod connection;
pub mod serve;
pub mod websocket;

pub type ReloadSender = mpsc::UnboundedSender<Arc<ReloadMessage>>;
pub type ReloadReceiver = mpsc::UnboundedReceiver<Arc<ReloadMessage>>;

/// Server side of the reload channel: the set of connected viewers and the
/// last reload pushed to them.
#[derive(Debug, Default)]
pub struct Server {
    clients: RwLock<HashMap<Uuid, ReloadSender>>,
    latest: RwLock<Option<Arc<ReloadMessage>>>,
}

pub enum ServeError<S: Serve> {
    Connect(S::ConnectError),
    Connection(ConnectionError<S::SendError, S::RecvError>),
    Close(S::SendError),
}

impl<S: Serve> Debug for ServeError<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(err) => f.debug_tuple("Connect").field(err).finish(),
            Self::Connection(err) => f.debug_tuple("Connection").field(err).finish(),
            Self::Close(err) => f.debug_tuple("Close").field(err).finish(),
        }
    }
}

impl<S: Serve> Display for ServeError<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::Connect(err) => write!(f, "Failed to connect: {}", err),
            ServeError::Connection(err) => write!(f, "Connection failed: {}", err),
            ServeError::Close(err) => write!(f, "Failed to close: {}", err),
        }
    }
}

impl<S: Serve> Error for ServeError<S> {}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client to the broadcast set under a fresh id.
    pub async fn register(&self) -> (Uuid, ReloadReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut clients = self.clients.write().await;
        let mut id = Uuid::new_v4();
        while clients.contains_key(&id) {
            id = Uuid::new_v4();
        }
        clients.insert(id, tx);
        (id, rx)
    }

    pub async fn unregister(&self, id: Uuid) -> bool {
        self.clients.write().await.remove(&id).is_some()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn latest(&self) -> Option<Arc<ReloadMessage>> {
        self.latest.read().await.clone()
    }

    /// Pushes a reload to every client that is still connected and
    /// remembers it for later state requests.
    ///
    /// Clients whose connection is already gone are skipped. Returns the
    /// number of clients the reload was handed to.
    pub async fn publish(&self, message: ReloadMessage) -> usize {
        let message = Arc::new(message);
        *self.latest.write().await = Some(message.clone());

        let clients = self.clients.read().await;
        let mut delivered = 0;
        for (id, sender) in clients.iter() {
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!("Skipping closed client {}", id);
            }
        }
        info!("Reload sent to {} of {} clients", delivered, clients.len());
        delivered
    }

    pub async fn serve<S: Serve>(&self, serve: S) -> Result<(), ServeError<S>> {
        let transport = serve.serve().await.map_err(ServeError::Connect)?;
        let connection = Connection::new(transport, self);
        match connection.run().await {
            Ok(mut transport) => {
                transport.close().await.map_err(ServeError::Close)?;
                Ok(())
            }
            Err(error) => Err(ServeError::Connection(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use rigview_protocol::message::ReloadMessage;

    use super::Server;

    fn reload(tag: &str) -> ReloadMessage {
        ReloadMessage {
            model_data: format!("{{\"model\":\"{}\"}}", tag),
            action_data: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn closed_client_does_not_block_the_rest() {
        let server = Server::new();
        let (_, mut open) = server.register().await;
        let (_, closed) = server.register().await;
        drop(closed);

        assert_eq!(server.publish(reload("a")).await, 1);
        assert_eq!(open.recv().await.unwrap().model_data, "{\"model\":\"a\"}");
        assert_eq!(server.client_count().await, 2);
    }

    #[tokio::test]
    async fn remembers_latest_reload() {
        let server = Server::new();
        assert!(server.latest().await.is_none());
        assert_eq!(server.publish(reload("a")).await, 0);
        server.publish(reload("b")).await;
        assert_eq!(server.latest().await.unwrap().model_data, "{\"model\":\"b\"}");
    }

    #[tokio::test]
    async fn unregistered_client_gets_nothing() {
        let server = Server::new();
        let (id, mut rx) = server.register().await;
        assert!(server.unregister(id).await);
        assert!(!server.unregister(id).await);
        assert_eq!(server.publish(reload("a")).await, 0);
        assert!(rx.recv().await.is_none());
    }
}
