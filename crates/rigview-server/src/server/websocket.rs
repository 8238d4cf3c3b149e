use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
    io,
    marker::PhantomData,
    net::SocketAddr,
    string::FromUtf8Error,
    sync::Arc,
};

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use rigview_protocol::message::{ClientMessage, ReloadMessage};
use tokio::net::TcpListener;
use tokio_serde::{Deserializer, Framed, Serializer};
use tokio_tungstenite::tungstenite::{self, Message};

use super::{serve::serve, Server};

#[derive(Debug)]
pub enum WebSocketServerError<SE> {
    WebSocket(tungstenite::Error),
    Encoding(FromUtf8Error),
    Serialize(SE),
}

impl<SE: Display> Display for WebSocketServerError<SE> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WebSocketServerError::WebSocket(error) => Display::fmt(error, f),
            WebSocketServerError::Encoding(error) => Display::fmt(error, f),
            WebSocketServerError::Serialize(error) => Display::fmt(error, f),
        }
    }
}

impl<SE: Error> Error for WebSocketServerError<SE> {}

impl<SE> From<SE> for WebSocketServerError<SE> {
    fn from(value: SE) -> Self {
        Self::Serialize(value)
    }
}

/// Websocket listener for the reload channel.
///
/// Reloads go out as text frames so that browser viewers can read them
/// directly; client messages are accepted as text or binary.
#[derive(Debug)]
pub struct WebSocketServer<Codec> {
    listener: TcpListener,
    _marker: PhantomData<Codec>,
}

impl<Codec> WebSocketServer<Codec> {
    pub async fn bind(listen_addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(listen_addr).await?;
        Ok(Self {
            listener,
            _marker: PhantomData,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl<SE, Codec> WebSocketServer<Codec>
where
    SE: Error + Send + Sync + 'static,
    Codec: Deserializer<ClientMessage, Error = SE>
        + Serializer<ReloadMessage, Error = SE>
        + Send
        + Sync
        + 'static,
{
    pub async fn serve(
        self,
        server: Arc<Server>,
        codec_factory: impl Fn() -> Codec + Send + Sync + 'static,
    ) -> io::Result<()> {
        info!("Listening on {}", self.listener.local_addr()?);
        let codec_factory = Arc::new(codec_factory);
        loop {
            let (stream, address) = self.listener.accept().await?;
            info!("Connection from {}", address);
            let server = server.clone();
            let codec_factory = codec_factory.clone();
            tokio::spawn(async move {
                let serve = serve(|| async move {
                    let stream = tokio_tungstenite::accept_async(stream)
                        .await
                        .map_err(WebSocketServerError::WebSocket)?;
                    let stream = stream
                        .filter_map::<_, Result<BytesMut, WebSocketServerError<SE>>, _>(
                            |data| async {
                                let data = match data {
                                    Ok(data) => data,
                                    Err(err) => {
                                        return Some(Err(WebSocketServerError::WebSocket(err)))
                                    }
                                };
                                match data {
                                    Message::Binary(vec) => {
                                        Some(Ok(BytesMut::from(vec.as_slice())))
                                    }
                                    Message::Text(text) => Some(Ok(BytesMut::from(text.as_str()))),
                                    Message::Ping(_)
                                    | Message::Pong(_)
                                    | Message::Close(_)
                                    | Message::Frame(_) => None,
                                }
                            },
                        )
                        .sink_map_err(WebSocketServerError::WebSocket)
                        .with::<Bytes, _, _, WebSocketServerError<SE>>(|message| async move {
                            String::from_utf8(message.to_vec())
                                .map(Message::text)
                                .map_err(WebSocketServerError::Encoding)
                        });
                    let framed = Framed::new(stream, codec_factory());
                    Ok::<_, WebSocketServerError<SE>>(framed)
                });
                match server.serve(serve).await {
                    Ok(_) => {
                        info!("Connection closed from {}", address);
                    }
                    Err(err) => {
                        warn!("Serve failed for {}: {}", address, err);
                    }
                }
            });
        }
    }
}
