use std::{error::Error, future::Future};

use futures::{Sink, Stream};
use rigview_protocol::message::{ClientMessage, ReloadMessage};

/// Produces one client transport, e.g. by finishing a websocket handshake.
#[allow(async_fn_in_trait)]
pub trait Serve {
    type Transport: Stream<Item = Result<ClientMessage, Self::RecvError>>
        + Sink<ReloadMessage, Error = Self::SendError>
        + Send
        + Sync
        + 'static;
    type ConnectError: Error + Send + Sync;
    type SendError: Error + Send + Sync;
    type RecvError: Error + Send + Sync;

    async fn serve(self) -> Result<Self::Transport, Self::ConnectError>;
}

#[derive(Debug, Clone)]
pub struct ServeFn<F> {
    f: F,
}

impl<F, Fut, T, E, SE, RE> Serve for ServeFn<F>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    T: Stream<Item = Result<ClientMessage, RE>>
        + Sink<ReloadMessage, Error = SE>
        + Send
        + Sync
        + 'static,
    E: Error + Send + Sync,
    SE: Error + Send + Sync,
    RE: Error + Send + Sync,
{
    type Transport = T;
    type ConnectError = E;
    type SendError = SE;
    type RecvError = RE;

    async fn serve(self) -> Result<Self::Transport, Self::ConnectError> {
        (self.f)().await
    }
}

pub fn serve<F>(f: F) -> ServeFn<F> {
    ServeFn { f }
}
