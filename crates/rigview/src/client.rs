use std::{sync::Arc, time::Duration};

use log::{info, warn};
use rigview_protocol::message::ClientMessage;
use web_time::Instant;

use crate::{
    scene::SceneSlot,
    transport::{Transport, TransportParam, TransportState},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientConfig {
    /// Wait between a lost connection and the next attempt.
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Disconnected, the next attempt is scheduled.
    Waiting,
}

#[derive(Debug)]
enum ClientState {
    Connecting,
    Connected { state_requested: bool },
    Waiting { retry_at: Instant },
}

/// Keeps one connection to the reload server alive.
///
/// Reloads land in the shared [`SceneSlot`] from the transport thread; the
/// client only drives the connection lifecycle and must be ticked
/// regularly, typically once per frame.
pub struct Client {
    param: Box<dyn TransportParam>,
    transport: Option<Box<dyn Transport>>,
    state: ClientState,
    scenes: Arc<SceneSlot>,
    config: ClientConfig,
}

impl Client {
    pub fn new(
        param: Box<dyn TransportParam>,
        scenes: Arc<SceneSlot>,
        config: ClientConfig,
    ) -> Self {
        let transport = param.connect(scenes.clone());
        Self {
            param,
            transport: Some(transport),
            state: ClientState::Connecting,
            scenes,
            config,
        }
    }

    pub fn tick(&mut self, now: Instant) -> ConnectionStatus {
        if let ClientState::Waiting { retry_at } = self.state {
            if now < retry_at {
                return ConnectionStatus::Waiting;
            }
            info!("Reconnecting to reload server");
            self.transport = Some(self.param.connect(self.scenes.clone()));
            self.state = ClientState::Connecting;
        }

        let Some(transport) = self.transport.as_mut() else {
            self.disconnect(now);
            return ConnectionStatus::Waiting;
        };

        match transport.state() {
            TransportState::Connecting => {
                self.state = ClientState::Connecting;
                ConnectionStatus::Connecting
            }
            TransportState::Connected => {
                if !matches!(
                    self.state,
                    ClientState::Connected {
                        state_requested: true
                    }
                ) {
                    if let Err(err) = transport.send(ClientMessage::RequestState) {
                        warn!("Failed to request state: {}", err);
                        self.disconnect(now);
                        return ConnectionStatus::Waiting;
                    }
                    self.state = ClientState::Connected {
                        state_requested: true,
                    };
                }
                ConnectionStatus::Connected
            }
            TransportState::Closed => {
                info!("Reload server closed the connection");
                self.disconnect(now);
                ConnectionStatus::Waiting
            }
            TransportState::Failed(err) => {
                warn!("Connection to reload server failed: {}", err);
                self.disconnect(now);
                ConnectionStatus::Waiting
            }
        }
    }

    /// Closes the current connection, if any.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    fn disconnect(&mut self, now: Instant) {
        self.close();
        self.state = ClientState::Waiting {
            retry_at: now + self.config.reconnect_delay,
        };
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        error::Error,
        fmt::{self, Display, Formatter},
        rc::Rc,
        sync::Arc,
        time::Duration,
    };

    use rigview_protocol::message::ClientMessage;
    use web_time::Instant;

    use crate::{
        scene::SceneSlot,
        transport::{Transport, TransportParam, TransportState},
    };

    use super::{Client, ClientConfig, ConnectionStatus};

    #[derive(Debug, Clone, Copy)]
    enum Fake {
        Connecting,
        Connected,
        Closed,
        Failed,
    }

    #[derive(Debug)]
    struct Refused;

    impl Display for Refused {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "refused")
        }
    }

    impl Error for Refused {}

    #[derive(Debug, Default)]
    struct Log {
        connects: usize,
        sent: Vec<ClientMessage>,
        closes: usize,
    }

    #[derive(Debug)]
    struct FakeTransport {
        state: Rc<RefCell<Fake>>,
        log: Rc<RefCell<Log>>,
    }

    impl Transport for FakeTransport {
        fn state(&self) -> TransportState {
            match *self.state.borrow() {
                Fake::Connecting => TransportState::Connecting,
                Fake::Connected => TransportState::Connected,
                Fake::Closed => TransportState::Closed,
                Fake::Failed => TransportState::Failed(Box::new(Refused)),
            }
        }

        fn send(&mut self, message: ClientMessage) -> Result<(), Box<dyn Error>> {
            self.log.borrow_mut().sent.push(message);
            Ok(())
        }

        fn close(self: Box<Self>) {
            self.log.borrow_mut().closes += 1;
        }
    }

    struct FakeParam {
        state: Rc<RefCell<Fake>>,
        log: Rc<RefCell<Log>>,
    }

    impl TransportParam for FakeParam {
        fn connect(&self, _scenes: Arc<SceneSlot>) -> Box<dyn Transport> {
            self.log.borrow_mut().connects += 1;
            Box::new(FakeTransport {
                state: self.state.clone(),
                log: self.log.clone(),
            })
        }
    }

    fn client(initial: Fake) -> (Client, Rc<RefCell<Fake>>, Rc<RefCell<Log>>) {
        let state = Rc::new(RefCell::new(initial));
        let log = Rc::new(RefCell::new(Log::default()));
        let param = FakeParam {
            state: state.clone(),
            log: log.clone(),
        };
        let client = Client::new(
            Box::new(param),
            Arc::new(SceneSlot::new()),
            ClientConfig::default(),
        );
        (client, state, log)
    }

    #[test]
    fn requests_state_once_per_connection() {
        let (mut client, state, log) = client(Fake::Connecting);
        let now = Instant::now();
        assert_eq!(client.tick(now), ConnectionStatus::Connecting);
        assert!(log.borrow().sent.is_empty());

        *state.borrow_mut() = Fake::Connected;
        assert_eq!(client.tick(now), ConnectionStatus::Connected);
        assert_eq!(client.tick(now), ConnectionStatus::Connected);
        assert_eq!(log.borrow().sent, vec![ClientMessage::RequestState]);
    }

    #[test]
    fn reconnects_after_delay() {
        let (mut client, state, log) = client(Fake::Connected);
        let start = Instant::now();
        client.tick(start);

        *state.borrow_mut() = Fake::Closed;
        assert_eq!(client.tick(start), ConnectionStatus::Waiting);
        assert_eq!(log.borrow().closes, 1);

        *state.borrow_mut() = Fake::Connected;
        assert_eq!(
            client.tick(start + Duration::from_millis(1999)),
            ConnectionStatus::Waiting
        );
        assert_eq!(log.borrow().connects, 1);

        assert_eq!(
            client.tick(start + Duration::from_secs(2)),
            ConnectionStatus::Connected
        );
        assert_eq!(log.borrow().connects, 2);
        assert_eq!(
            log.borrow().sent,
            vec![ClientMessage::RequestState, ClientMessage::RequestState]
        );
    }

    #[test]
    fn failure_schedules_retry() {
        let (mut client, state, log) = client(Fake::Failed);
        let start = Instant::now();
        assert_eq!(client.tick(start), ConnectionStatus::Waiting);
        assert!(log.borrow().sent.is_empty());

        *state.borrow_mut() = Fake::Connecting;
        assert_eq!(
            client.tick(start + Duration::from_secs(3)),
            ConnectionStatus::Connecting
        );
        assert_eq!(log.borrow().connects, 2);
    }
}
