use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
    pin::Pin,
};

use futures::{Sink, SinkExt, Stream, TryStreamExt};
use log::{debug, info};
use rigview_protocol::message::{ClientMessage, ReloadMessage};
use tokio::select;

use super::Server;

#[derive(Debug)]
pub struct Connection<'server, T, SE, RE>
where
    T: Stream<Item = Result<ClientMessage, RE>>
        + Sink<ReloadMessage, Error = SE>
        + Send
        + Sync
        + 'static,
    SE: Error + Send + Sync,
    RE: Error + Send + Sync,
{
    transport: T,
    server: &'server Server,
}

#[derive(Debug)]
pub enum ConnectionError<SE, RE>
where
    SE: Error + Send + Sync,
    RE: Error + Send + Sync,
{
    SendError(SE),
    ReceiveError(RE),
    OutputChannelDestroyed,
}

impl<SE, RE> Display for ConnectionError<SE, RE>
where
    SE: Error + Send + Sync,
    RE: Error + Send + Sync,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendError(err) => write!(f, "Failed to send: {}", err),
            Self::ReceiveError(err) => write!(f, "Failed to receive: {}", err),
            Self::OutputChannelDestroyed => write!(f, "Output channel is destroyed"),
        }
    }
}

impl<SE, RE> Error for ConnectionError<SE, RE>
where
    SE: Error + Send + Sync,
    RE: Error + Send + Sync,
{
}

impl<'server, T, SE, RE> Connection<'server, T, SE, RE>
where
    T: Stream<Item = Result<ClientMessage, RE>>
        + Sink<ReloadMessage, Error = SE>
        + Send
        + Sync
        + 'static,
    SE: Error + Send + Sync,
    RE: Error + Send + Sync,
{
    pub fn new(transport: T, server: &'server Server) -> Self {
        Self { transport, server }
    }

    pub async fn run(self) -> Result<Pin<Box<T>>, ConnectionError<SE, RE>> {
        let mut transport = Box::pin(self.transport);
        let server = self.server;

        let (client_id, mut reload_rx) = server.register().await;
        info!("Client {} connected", client_id);

        let run_result = async {
            loop {
                select! {
                    message = transport.try_next() => {
                        let message = message.map_err(ConnectionError::ReceiveError)?;
                        let Some(message) = message else { break };
                        match message {
                            ClientMessage::RequestState => {
                                let Some(latest) = server.latest().await else {
                                    debug!(
                                        "Client {} asked for state before any reload",
                                        client_id
                                    );
                                    continue;
                                };
                                transport
                                    .send((*latest).clone())
                                    .await
                                    .map_err(ConnectionError::SendError)?;
                            }
                        }
                    }
                    reload = reload_rx.recv() => {
                        let Some(reload) = reload else {
                            return Err(ConnectionError::OutputChannelDestroyed);
                        };
                        transport
                            .send((*reload).clone())
                            .await
                            .map_err(ConnectionError::SendError)?;
                    }
                }
            }
            Ok(())
        }
        .await;

        server.unregister(client_id).await;
        info!("Client {} disconnected", client_id);

        run_result.map(|()| transport)
    }
}
