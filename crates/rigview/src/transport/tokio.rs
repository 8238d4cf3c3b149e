use std::{
    error::Error as StdError,
    fmt::{self, Debug, Display, Formatter},
    io,
    pin::pin,
    string::FromUtf8Error,
    sync::Arc,
    thread::{self, JoinHandle},
};

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rigview_protocol::message::{ClientMessage, ReloadMessage};
use tokio::{
    runtime::Runtime,
    select,
    sync::{mpsc, oneshot, Mutex},
};
use tokio_serde::{Deserializer, Framed, Serializer};
use tokio_tungstenite::tungstenite::{self, http::Request, Message};

use crate::scene::SceneSlot;

use super::{Transport, TransportParam, TransportState};

#[derive(Debug)]
pub enum Error {
    NotConnected,
    Closed,
    RuntimeFailed(Arc<io::Error>),
    WebsocketFailed(Arc<tungstenite::Error>),
    Send(Arc<dyn StdError + Send + Sync>),
    Receive(Arc<dyn StdError + Send + Sync>),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotConnected => write!(f, "Not connected to the server"),
            Error::Closed => write!(f, "Connection closed"),
            Error::RuntimeFailed(error) => write!(f, "Failed to start transport: {}", error),
            Error::WebsocketFailed(error) => Display::fmt(error, f),
            Error::Send(error) => write!(f, "Send failed: {}", error),
            Error::Receive(error) => write!(f, "Receive failed: {}", error),
        }
    }
}

impl StdError for Error {}

#[derive(Default, Debug)]
enum State {
    #[default]
    Connecting,
    RuntimeFailed(Arc<io::Error>),
    ConnectWebsocketFailed(Arc<tungstenite::Error>),
    Connected {
        send_tx: mpsc::UnboundedSender<ClientMessage>,
    },
    ReceiveFailed(Arc<dyn StdError + Send + Sync + 'static>),
    SendFailed(Arc<dyn StdError + Send + Sync + 'static>),
    ConnectionClosed,
}

impl State {
    fn error(&self) -> Option<Error> {
        match self {
            State::Connecting => Some(Error::NotConnected),
            State::RuntimeFailed(err) => Some(Error::RuntimeFailed(err.clone())),
            State::ConnectWebsocketFailed(err) => Some(Error::WebsocketFailed(err.clone())),
            State::ReceiveFailed(err) => Some(Error::Receive(err.clone())),
            State::SendFailed(err) => Some(Error::Send(err.clone())),
            State::ConnectionClosed => Some(Error::Closed),
            State::Connected { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct TokioTransport {
    thread_handle: Option<JoinHandle<()>>,
    cancel_tx: Option<oneshot::Sender<()>>,
    close_tx: Option<oneshot::Sender<()>>,
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
pub enum TransportError<SE> {
    WebSocket(tungstenite::Error),
    Encoding(FromUtf8Error),
    Serialize(SE),
}

impl<SE: Display> Display for TransportError<SE> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::WebSocket(error) => Display::fmt(error, f),
            TransportError::Encoding(error) => Display::fmt(error, f),
            TransportError::Serialize(error) => Display::fmt(error, f),
        }
    }
}

impl<SE: StdError> StdError for TransportError<SE> {}

impl<SE> From<SE> for TransportError<SE> {
    fn from(value: SE) -> Self {
        Self::Serialize(value)
    }
}

fn transport_thread<SE, Codec>(
    request: Request<()>,
    mut cancel_rx: oneshot::Receiver<()>,
    mut close_rx: oneshot::Receiver<()>,
    state: Arc<Mutex<State>>,
    scenes: Arc<SceneSlot>,
    codec: Codec,
) where
    SE: StdError + Send + Sync + 'static,
    Codec: Deserializer<ReloadMessage, Error = SE>
        + Serializer<ClientMessage, Error = SE>
        + Send
        + Sync
        + 'static,
{
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            warn!("Failed to create runtime: {:?}", err);
            let mut state = state.blocking_lock();
            *state = State::RuntimeFailed(Arc::new(err));
            return;
        }
    };

    let result = runtime.block_on(async {
        let stream = select! {
            biased;
            _ = &mut cancel_rx => { return Ok(()); }
            _ = &mut close_rx => { return Ok(()); }
            stream = tokio_tungstenite::connect_async(request) => stream
        };
        let (stream, _response) = match stream {
            Ok(stream) => stream,
            Err(err) => {
                let mut state = state.lock().await;
                *state = State::ConnectWebsocketFailed(Arc::new(err));
                return Err(());
            }
        };

        let (send_tx, mut send_rx) = mpsc::unbounded_channel();
        {
            let mut state = state.lock().await;
            *state = State::Connected { send_tx };
        }
        info!("Connected to reload server");

        let stream = stream
            .filter_map::<_, Result<BytesMut, TransportError<SE>>, _>(|data| async {
                let data = match data {
                    Ok(data) => data,
                    Err(err) => return Some(Err(TransportError::WebSocket(err))),
                };
                match data {
                    Message::Text(text) => Some(Ok(BytesMut::from(text.as_str()))),
                    Message::Binary(vec) => Some(Ok(BytesMut::from(vec.as_slice()))),
                    Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => {
                        None
                    }
                }
            })
            .sink_map_err(TransportError::WebSocket)
            .with::<Bytes, _, _, TransportError<SE>>(|message: Bytes| async move {
                String::from_utf8(message.to_vec())
                    .map(Message::text)
                    .map_err(TransportError::Encoding)
            });
        let framed = Framed::new(stream, codec);
        let mut transport = pin!(framed);
        loop {
            select! {
                _ = &mut cancel_rx => { return Ok(()); }
                _ = &mut close_rx => { return Ok(()); }
                message = transport.next() => {
                    let Some(message) = message else { return Ok(()) };
                    let message = match message {
                        Ok(message) => message,
                        Err(err) => {
                            let mut state = state.lock().await;
                            *state = State::ReceiveFailed(Arc::new(err));
                            return Err(());
                        },
                    };
                    debug!("Reload received");
                    // A reload that fails to decode is logged by the slot and
                    // leaves the previous scene live.
                    let _ = scenes.apply_reload(&message);
                }
                message = send_rx.recv() => {
                    let Some(message) = message else { return Ok(()) };
                    if let Err(err) = transport.send(message).await {
                        let mut state = state.lock().await;
                        *state = State::SendFailed(Arc::new(err));
                        return Err(());
                    }
                }
            }
        }
    });

    if result.is_ok() {
        let mut state = state.blocking_lock();
        *state = State::ConnectionClosed;
    }

    runtime.shutdown_background();
}

impl TokioTransport {
    fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("Transport thread panicked");
            }
        }
    }
}

impl Transport for TokioTransport {
    fn state(&self) -> TransportState {
        let state = self.state.blocking_lock();
        match &*state {
            State::Connecting => TransportState::Connecting,
            State::Connected { .. } => TransportState::Connected,
            State::ConnectionClosed => TransportState::Closed,
            failed => match failed.error() {
                Some(err) => TransportState::Failed(Box::new(err)),
                None => TransportState::Closed,
            },
        }
    }

    fn send(&mut self, message: ClientMessage) -> Result<(), Box<dyn StdError>> {
        let mut state = self.state.blocking_lock();
        match &mut *state {
            State::Connected { send_tx, .. } => send_tx
                .send(message)
                .map_err(|_| -> Box<dyn StdError> { Box::new(Error::Closed) }),
            other => match other.error() {
                Some(err) => Err(Box::new(err)),
                None => Ok(()),
            },
        }
    }

    fn close(mut self: Box<Self>) {
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
        self.join();
    }
}

impl Drop for TokioTransport {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
        self.join();
    }
}

pub struct TokioTransportParam<CodecBuilder> {
    request: Request<()>,
    codec_builder: CodecBuilder,
}

impl<SE, Codec, CodecBuilder> TransportParam for TokioTransportParam<CodecBuilder>
where
    SE: StdError + Send + Sync + 'static,
    Codec: Deserializer<ReloadMessage, Error = SE>
        + Serializer<ClientMessage, Error = SE>
        + Send
        + Sync
        + 'static,
    CodecBuilder: Fn() -> Codec,
{
    fn connect(&self, scenes: Arc<SceneSlot>) -> Box<dyn Transport> {
        let state = Arc::new(Mutex::new(State::default()));
        let thread_state = state.clone();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (close_tx, close_rx) = oneshot::channel();
        let request = self.request.clone();
        let codec = (self.codec_builder)();
        let transport = TokioTransport {
            thread_handle: Some(thread::spawn(move || {
                transport_thread(request, cancel_rx, close_rx, thread_state, scenes, codec);
            })),
            cancel_tx: Some(cancel_tx),
            close_tx: Some(close_tx),
            state,
        };
        Box::new(transport)
    }
}

impl<CodecBuilder> TokioTransportParam<CodecBuilder> {
    pub fn new(request: Request<()>, codec_builder: CodecBuilder) -> Self {
        Self {
            request,
            codec_builder,
        }
    }
}
