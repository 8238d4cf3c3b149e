use std::{error::Error, fmt::Debug, sync::Arc};

use rigview_protocol::message::ClientMessage;

use crate::scene::SceneSlot;

#[cfg(feature = "tokio-transport")]
pub mod tokio;

#[derive(Debug)]
pub enum TransportState {
    Connecting,
    Connected,
    Closed,
    Failed(Box<dyn Error>),
}

pub trait TransportParam {
    /// Starts a connection attempt. Reloads received on it are decoded and
    /// published into `scenes` by the transport itself.
    fn connect(&self, scenes: Arc<SceneSlot>) -> Box<dyn Transport>;
}

/// One connection attempt to the reload server.
pub trait Transport: Debug {
    fn state(&self) -> TransportState;
    fn send(&mut self, message: ClientMessage) -> Result<(), Box<dyn Error>>;
    fn close(self: Box<Self>);
}
