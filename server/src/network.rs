//! Server network layer handling UDP communications and the fixed-rate tick loop

use crate::config::SimConfig;
use crate::simulation::Simulation;
use log::{debug, error, info, warn};
use shared::{decode_packet, Packet, MAX_CLIENT_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { bytes: Vec<u8>, addr: SocketAddr },
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis()
        .min(u64::MAX as u128) as u64
}

/// Main server coordinating networking and the simulation
///
/// The run loop is the only place the [`Simulation`] is touched. The receiver task
/// decodes datagrams and enqueues them, the sender task drains encoded datagrams; neither
/// ever sees simulation state.
pub struct Server {
    socket: Arc<UdpSocket>,
    simulation: Simulation,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(addr: &str, config: SimConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            tick_duration: config.tick_duration(),
            simulation: Simulation::new(config),
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender that can be used to stop the run loop from another task
    pub fn control_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode_packet(&buffer[..len], MAX_CLIENT_PACKET_SIZE) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { bytes, addr } => {
                        if let Err(e) = socket.send_to(&bytes, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    /// Moves everything the simulation queued onto the sender task
    fn flush_outgoing(&mut self) {
        for out in self.simulation.drain_outgoing() {
            if let Err(e) = self.game_tx.send(GameMessage::SendPacket {
                bytes: out.bytes,
                addr: out.addr,
            }) {
                error!("Failed to queue packet for sending: {}", e);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeout_interval = interval(Duration::from_secs(1));
        let mut last_tick = Instant::now();

        let max_delta_time = self.simulation.config().max_delta_time;
        let stats_interval = self.simulation.config().stats_interval_ticks;
        let tick_budget_ms = self.tick_duration.as_secs_f64() * 1000.0;

        info!(
            "Server started successfully ({} TPS)",
            self.simulation.config().tick_rate
        );

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.simulation.handle_packet(addr, packet, now_ms());
                            self.flush_outgoing();
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt > max_delta_time {
                        debug!("Large delta time detected ({:.3}s), capping to {:.3}s", dt, max_delta_time);
                        dt = max_delta_time;
                    }

                    let report = self.simulation.tick(dt, now_ms());
                    self.flush_outgoing();

                    let tick_time_ms = now.elapsed().as_secs_f64() * 1000.0;
                    if tick_time_ms > tick_budget_ms {
                        warn!("Tick {} took {:.2}ms (budget {:.2}ms)", report.tick, tick_time_ms, tick_budget_ms);
                    }

                    // Periodic performance monitoring
                    if stats_interval > 0
                        && report.tick % stats_interval == 0
                        && !self.simulation.clients().is_empty()
                    {
                        self.simulation.log_stats(&report, tick_time_ms);
                    }
                },

                _ = timeout_interval.tick() => {
                    self.simulation.sweep_timeouts();
                    self.flush_outgoing();
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{encode_packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};

    #[tokio::test]
    async fn test_shutdown_stops_idle_server() {
        let mut server = Server::new("127.0.0.1:0", SimConfig::default())
            .await
            .unwrap();
        let control = server.control_handle();
        control.send(ServerMessage::Shutdown).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), server.run()).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[test]
    fn test_now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000);
    }

    #[tokio::test]
    async fn test_connect_handshake_over_udp() {
        let mut server = Server::new("127.0.0.1:0", SimConfig::default())
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap();
        let control = server.control_handle();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = encode_packet(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
        })
        .unwrap();
        socket.send_to(&connect, server_addr).await.unwrap();

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let packet = decode_packet(&buf[..len], MAX_DATAGRAM_SIZE).unwrap();
        assert!(matches!(packet, Packet::Welcome { .. }));

        control.send(ServerMessage::Shutdown).unwrap();
        handle.await.unwrap();
    }
}
