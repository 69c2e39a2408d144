//! UDP input server: receives command tokens and hands them to an executor
//!
//! ```text
//! :6006 ─┐
//! :6007 ─┤  one listener task per port
//!  ...   ├──► decode ──► CommandExecutor
//! :6010 ─┘
//! ```
//!
//! Each datagram is one token, commas are stripped. The control message
//! `STOPSERVEUR` on any port stops every listener.

use super::executor::CommandExecutor;
use crate::command::{Command, STOP_SERVER_TOKEN};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const MAX_DATAGRAM: usize = 1024;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind input port {port}: {source}")]
    BindError { port: u16, source: std::io::Error },

    #[error("Listener task failed: {0}")]
    TaskError(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputServerSettings {
    pub bind_address: IpAddr,
    /// One port per source: phone, markers, voice, pedals, face
    pub ports: Vec<u16>,
}

impl Default for InputServerSettings {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ports: (6006..=6010).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Datagram {
    Command(Command),
    Stop,
    Unknown(String),
}

/// Decodes one datagram payload
pub fn decode(payload: &[u8]) -> Datagram {
    let text = String::from_utf8_lossy(payload).replace(',', "");
    let token = text.trim();
    if token == STOP_SERVER_TOKEN {
        return Datagram::Stop;
    }
    match token.parse::<Command>() {
        Ok(command) => Datagram::Command(command),
        Err(_) => Datagram::Unknown(token.to_string()),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub executed: u64,
    pub unknown: u64,
}

impl std::ops::AddAssign for ServerStats {
    fn add_assign(&mut self, other: Self) {
        self.executed += other.executed;
        self.unknown += other.unknown;
    }
}

pub struct InputServer {
    sockets: Vec<UdpSocket>,
    executor: Arc<dyn CommandExecutor>,
    shutdown: CancellationToken,
}

impl InputServer {
    pub async fn bind(
        settings: &InputServerSettings,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self, ServerError> {
        let mut sockets = Vec::with_capacity(settings.ports.len());
        for &port in &settings.ports {
            let socket = UdpSocket::bind(SocketAddr::new(settings.bind_address, port))
                .await
                .map_err(|source| ServerError::BindError { port, source })?;
            info!(
                "Input server listening on {}",
                socket
                    .local_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| port.to_string())
            );
            sockets.push(socket);
        }

        Ok(Self {
            sockets,
            executor,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.sockets
            .iter()
            .filter_map(|socket| socket.local_addr().ok())
            .collect()
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs every listener until a stop message or cancellation
    pub async fn run(self) -> Result<ServerStats, ServerError> {
        let mut listeners = Vec::with_capacity(self.sockets.len());
        for socket in self.sockets {
            let executor = self.executor.clone();
            let shutdown = self.shutdown.clone();
            listeners.push(tokio::spawn(listen(socket, executor, shutdown)));
        }

        let mut total = ServerStats::default();
        let mut failure = None;
        for listener in listeners {
            match listener.await {
                Ok(stats) => total += stats,
                Err(e) => {
                    error!("Listener task panicked: {}", e);
                    self.shutdown.cancel();
                    failure = Some(ServerError::TaskError(e.to_string()));
                }
            }
        }

        self.executor.shutdown();
        info!(
            "Input server stopped: {} commands executed, {} unknown",
            total.executed, total.unknown
        );
        match failure {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }
}

async fn listen(
    socket: UdpSocket,
    executor: Arc<dyn CommandExecutor>,
    shutdown: CancellationToken,
) -> ServerStats {
    let mut stats = ServerStats::default();
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = socket.recv_from(&mut buf) => {
                let (len, from) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("Receive error: {}", e);
                        continue;
                    }
                };

                match decode(&buf[..len]) {
                    Datagram::Command(command) => {
                        debug!("{} from {}", command, from);
                        executor.execute(command);
                        stats.executed += 1;
                    }
                    Datagram::Stop => {
                        info!("Stop message received from {}", from);
                        shutdown.cancel();
                        break;
                    }
                    Datagram::Unknown(token) => {
                        warn!("Unknown command from {}: {:?}", from, token);
                        stats.unknown += 1;
                    }
                }
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Button, Tap};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        commands: Mutex<Vec<Command>>,
    }

    impl CommandExecutor for RecordingExecutor {
        fn execute(&self, command: Command) {
            self.commands.lock().unwrap().push(command);
        }
    }

    #[test]
    fn decodes_payloads() {
        assert_eq!(decode(b"P_UP"), Datagram::Command(Command::Press(Button::Up)));
        assert_eq!(decode(b"R_NITRO,"), Datagram::Command(Command::Release(Button::Nitro)));
        assert_eq!(decode(b"PAUSE\n"), Datagram::Command(Command::Tap(Tap::Pause)));
        assert_eq!(decode(b"STOPSERVEUR"), Datagram::Stop);
        assert_eq!(decode(b"P_JUMP"), Datagram::Unknown("P_JUMP".to_string()));
        assert!(matches!(decode(&[0xff, 0xfe]), Datagram::Unknown(_)));
    }

    #[tokio::test]
    async fn executes_until_stop_message() {
        let executor = Arc::new(RecordingExecutor::default());
        let settings = InputServerSettings {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ports: vec![0, 0],
        };
        let server = InputServer::bind(&settings, executor.clone()).await.unwrap();
        let addrs = server.local_addrs();
        assert_eq!(addrs.len(), 2);
        let running = tokio::spawn(server.run());

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        for payload in ["P_LEFT", "bogus", "R_LEFT", "STOPSERVEUR"] {
            client.send_to(payload.as_bytes(), addrs[0]).await.unwrap();
        }

        let stats = running.await.unwrap().unwrap();
        assert_eq!(
            stats,
            ServerStats {
                executed: 2,
                unknown: 1
            }
        );
        assert_eq!(
            *executor.commands.lock().unwrap(),
            vec![Command::Press(Button::Left), Command::Release(Button::Left)]
        );
    }

    #[tokio::test]
    async fn cancellation_stops_every_listener() {
        let executor = Arc::new(RecordingExecutor::default());
        let settings = InputServerSettings {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ports: vec![0, 0, 0],
        };
        let server = InputServer::bind(&settings, executor).await.unwrap();
        let token = server.shutdown_token();
        let running = tokio::spawn(server.run());

        token.cancel();
        assert_eq!(running.await.unwrap().unwrap(), ServerStats::default());
    }
}
