//! Push transport controller — one live connection with backoff reconnect.
//!
//! The controller is an actor task. [`TransportHandle`] sends it commands
//! (connect, address change, disconnect) and exposes its
//! [`ConnectionStatus`] through a watch channel.
//!
//! The actor is always in exactly one phase: idle, dialing, connected or
//! waiting for the retry timer. Entering a phase drops the previous one, so
//! an old connection or a scheduled retry never survives a redial.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use homesync_domain::error::TransportError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_stream::StreamExt;

use crate::backoff::{Backoff, BackoffConfig};
use crate::ports::{FrameSink, FrameStream, PushConnector};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot of the controller, published on every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub url: Option<String>,
    pub reconnect_attempts: u32,
    /// Delay of the scheduled retry, if one is pending.
    pub next_retry: Option<Duration>,
}

#[derive(Debug)]
enum Command {
    Connect(String),
    AddressChanged(String),
    Disconnect,
    Shutdown,
}

/// Cloneable handle to a running [`TransportController`].
#[derive(Debug, Clone)]
pub struct TransportHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl TransportHandle {
    /// Tear down whatever is live and dial `url`.
    pub fn connect(&self, url: impl Into<String>) {
        self.send(Command::Connect(url.into()));
    }

    /// The remote address changed: redial now, skipping any pending retry.
    pub fn address_changed(&self, url: impl Into<String>) {
        self.send(Command::AddressChanged(url.into()));
    }

    /// Close the connection and stop retrying until the next connect.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    /// Stop the controller task.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status.borrow().state == ConnectionState::Connected
    }

    /// Receiver of status transitions.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::debug!("transport controller already stopped");
        }
    }
}

type Dial = Pin<Box<dyn Future<Output = Result<FrameStream, TransportError>> + Send>>;

enum Phase {
    Idle,
    Dialing(Dial),
    Connected(FrameStream),
    Waiting(Pin<Box<Sleep>>),
}

/// Drives one push connection and hands its frames to a [`FrameSink`].
pub struct TransportController<C, S> {
    connector: Arc<C>,
    sink: S,
    backoff: Backoff,
    url: Option<String>,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ConnectionStatus>,
}

impl<C, S> TransportController<C, S>
where
    C: PushConnector,
    S: FrameSink,
{
    /// Start the controller task. It stays idle until
    /// [`TransportHandle::connect`] is called.
    pub fn spawn(connector: C, sink: S, backoff: BackoffConfig) -> (TransportHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let controller = Self {
            connector: Arc::new(connector),
            sink,
            backoff: Backoff::new(backoff),
            url: None,
            commands: commands_rx,
            status: status_tx,
        };
        let task = tokio::spawn(controller.run());
        let handle = TransportHandle {
            commands: commands_tx,
            status: status_rx,
        };
        (handle, task)
    }

    async fn run(mut self) {
        let mut phase = Phase::Idle;
        loop {
            let next = match phase {
                Phase::Idle => match self.commands.recv().await {
                    Some(command) => self.on_command(command),
                    None => None,
                },
                Phase::Dialing(mut dial) => tokio::select! {
                    biased;
                    command = self.commands.recv() => command.and_then(|c| self.on_command(c)),
                    result = &mut dial => Some(match result {
                        Ok(stream) => self.on_open(stream),
                        Err(err) => self.on_failure(&err.to_string()),
                    }),
                },
                Phase::Connected(mut stream) => tokio::select! {
                    biased;
                    command = self.commands.recv() => command.and_then(|c| self.on_command(c)),
                    frame = stream.next() => Some(match frame {
                        Some(Ok(frame)) => {
                            self.sink.handle(frame);
                            Phase::Connected(stream)
                        }
                        Some(Err(err)) => self.on_failure(&err.to_string()),
                        None => self.on_failure("stream closed"),
                    }),
                },
                Phase::Waiting(mut timer) => tokio::select! {
                    biased;
                    command = self.commands.recv() => command.and_then(|c| self.on_command(c)),
                    () = &mut timer => Some(self.dial()),
                },
            };
            match next {
                Some(next) => phase = next,
                None => break,
            }
        }
        self.publish(ConnectionState::Disconnected, None);
        tracing::debug!("transport controller stopped");
    }

    /// `None` stops the controller.
    fn on_command(&mut self, command: Command) -> Option<Phase> {
        match command {
            Command::Connect(url) => {
                tracing::info!(url = %url, "push transport connecting");
                self.url = Some(url);
                Some(self.dial())
            }
            Command::AddressChanged(url) => {
                tracing::info!(url = %url, "remote address changed, redialing");
                self.url = Some(url);
                Some(self.dial())
            }
            Command::Disconnect => {
                tracing::info!("push transport disconnected on request");
                self.publish(ConnectionState::Disconnected, None);
                Some(Phase::Idle)
            }
            Command::Shutdown => None,
        }
    }

    fn dial(&mut self) -> Phase {
        let Some(url) = self.url.clone() else {
            self.publish(ConnectionState::Disconnected, None);
            return Phase::Idle;
        };
        self.publish(ConnectionState::Connecting, None);
        let connector = Arc::clone(&self.connector);
        Phase::Dialing(Box::pin(async move { connector.connect(&url).await }))
    }

    fn on_open(&mut self, stream: FrameStream) -> Phase {
        self.backoff.reset();
        tracing::info!(url = ?self.url, "push transport connected");
        self.publish(ConnectionState::Connected, None);
        Phase::Connected(stream)
    }

    fn on_failure(&mut self, reason: &str) -> Phase {
        let delay = self.backoff.next_delay();
        tracing::warn!(
            url = ?self.url,
            reason,
            attempt = self.backoff.attempts(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "push transport lost, scheduling reconnect"
        );
        self.publish(ConnectionState::Disconnected, Some(delay));
        Phase::Waiting(Box::pin(tokio::time::sleep(delay)))
    }

    fn publish(&self, state: ConnectionState, next_retry: Option<Duration>) {
        let status = ConnectionStatus {
            state,
            url: self.url.clone(),
            reconnect_attempts: self.backoff.attempts(),
            next_retry,
        };
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}
