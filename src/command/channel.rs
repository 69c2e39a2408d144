//! Outbound command transport
//!
//! Commands are sent as single UDP datagrams, fire-and-forget. A send that
//! fails is logged and dropped: a stale retry of a realtime control is worse
//! than a lost one.

use super::Command;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to bind command socket: {0}")]
    BindError(std::io::Error),

    #[error("Failed to send {command}: {source}")]
    SendError {
        command: Command,
        source: std::io::Error,
    },

    #[error("Command channel closed")]
    Closed,
}

/// Destination for commands, shared read-only by every source
pub trait CommandSink: Send + Sync + 'static {
    fn send(&self, command: Command) -> Result<(), ChannelError>;
}

/// Sends each command and logs failures instead of returning them
pub fn emit<I>(sink: &dyn CommandSink, commands: I)
where
    I: IntoIterator<Item = Command>,
{
    for command in commands {
        if let Err(e) = sink.send(command) {
            warn!("Dropping command: {}", e);
        }
    }
}

impl<T: CommandSink + ?Sized> CommandSink for Arc<T> {
    fn send(&self, command: Command) -> Result<(), ChannelError> {
        (**self).send(command)
    }
}

/// UDP command channel towards the controller emulation process
#[derive(Debug)]
pub struct UdpCommandChannel {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpCommandChannel {
    /// Binds an ephemeral local socket that sends to `destination`
    pub async fn connect(destination: SocketAddr) -> Result<Self, ChannelError> {
        let local: SocketAddr = if destination.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(ChannelError::BindError)?;
        // try_send_to only succeeds once the reactor has seen the socket writable
        socket.writable().await.map_err(ChannelError::BindError)?;
        info!("Command channel ready, sending to {}", destination);
        Ok(Self {
            socket,
            destination,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl CommandSink for UdpCommandChannel {
    fn send(&self, command: Command) -> Result<(), ChannelError> {
        match self
            .socket
            .try_send_to(command.token().as_bytes(), self.destination)
        {
            Ok(_) => {
                debug!("Sent {} to {}", command, self.destination);
                Ok(())
            }
            Err(source) => Err(ChannelError::SendError { command, source }),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that keeps every command in memory
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        commands: Mutex<Vec<Command>>,
    }

    impl RecordingSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn commands(&self) -> Vec<Command> {
            self.commands.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub fn take(&self) -> Vec<Command> {
            self.commands
                .lock()
                .map(|mut c| std::mem::take(&mut *c))
                .unwrap_or_default()
        }
    }

    impl CommandSink for RecordingSink {
        fn send(&self, command: Command) -> Result<(), ChannelError> {
            self.commands
                .lock()
                .map_err(|_| ChannelError::Closed)?
                .push(command);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Button, Tap};

    #[tokio::test]
    async fn sends_tokens_as_datagrams() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let channel = UdpCommandChannel::connect(receiver.local_addr().unwrap())
            .await
            .unwrap();

        channel.send(Command::Press(Button::Left)).unwrap();
        channel.send(Command::Tap(Tap::Pause)).unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"P_LEFT");
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"PAUSE");
    }

    #[tokio::test]
    async fn nothing_is_lost_right_after_connect() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let channel = UdpCommandChannel::connect(receiver.local_addr().unwrap())
            .await
            .unwrap();

        let buttons = [Button::Up, Button::Left, Button::Nitro, Button::Rescue];
        let sent: Vec<Command> = buttons
            .iter()
            .flat_map(|b| [b.press(), b.release()])
            .collect();
        for command in &sent {
            channel.send(*command).unwrap();
        }

        let mut buf = [0u8; 64];
        for command in &sent {
            let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], command.token().as_bytes());
        }
    }

    #[test]
    fn emit_forwards_in_order() {
        let sink = testing::RecordingSink::new();
        emit(
            sink.as_ref(),
            [Button::Up.release(), Button::Down.press()],
        );
        assert_eq!(
            sink.commands(),
            vec![Command::Release(Button::Up), Command::Press(Button::Down)]
        );
    }
}
