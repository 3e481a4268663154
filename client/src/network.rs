//! UDP transport for the client session with handshake and reconnect.

use crate::config::ClientConfig;
use crate::game::{ControlSource, GameSession, NetEvent};
use log::{debug, error, info, warn};
use shared::{decode_packet, encode_packet, Packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Milliseconds elapsed since `start` on the client's monotonic clock.
pub fn clock_ms(start: Instant) -> u64 {
    start.elapsed().as_millis().min(u64::MAX as u128) as u64
}

pub struct Client {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    session: GameSession,
    config: ClientConfig,
    fake_ping_ms: u64,
    started: Instant,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        config: ClientConfig,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            session: GameSession::new(config.clone()),
            config,
            fake_ping_ms,
            started: Instant::now(),
        })
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    fn now_ms(&self) -> u64 {
        clock_ms(self.started)
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = encode_packet(packet)?;

        if self.fake_ping_ms > 0 {
            let socket = Arc::clone(&self.socket);
            let addr = self.server_addr;
            let delay = Duration::from_millis(self.fake_ping_ms / 2);
            tokio::spawn(async move {
                sleep(delay).await;
                if let Err(e) = socket.send_to(&data, addr).await {
                    error!("Failed to send delayed packet: {}", e);
                }
            });
            return Ok(());
        }

        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Decodes datagrams from the server and forwards them as events
    fn spawn_receiver(&self, tx: mpsc::UnboundedSender<NetEvent>) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server_addr = self.server_addr;
        let started = self.started;
        let delay = Duration::from_millis(self.fake_ping_ms / 2);

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                let (len, from) = match socket.recv_from(&mut buffer).await {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                };
                if from != server_addr {
                    debug!("Ignoring datagram from {}", from);
                    continue;
                }

                let packet = match decode_packet(&buffer[..len], MAX_DATAGRAM_SIZE) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("Dropping datagram from server: {}", e);
                        continue;
                    }
                };

                let Some(event) = NetEvent::from_packet(packet, clock_ms(started)) else {
                    warn!("Unexpected packet type from server");
                    continue;
                };

                if delay.is_zero() {
                    if tx.send(event).is_err() {
                        break;
                    }
                } else {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        sleep(delay).await;
                        let _ = tx.send(event);
                    });
                }
            }
        })
    }

    /// Runs the session until `run_for` elapses, or forever when it is `None`.
    ///
    /// Connects on start and again `reconnect_delay` after every disconnect, whether the
    /// server closed the connection or simply went silent.
    pub async fn run<C: ControlSource>(
        &mut self,
        controls: &mut C,
        run_for: Option<Duration>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let receiver = self.spawn_receiver(tx);

        let mut frame_interval = interval(Duration::from_millis(16));
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats_interval = interval(Duration::from_secs(5));

        let deadline = run_for.map(|d| Instant::now() + d);
        let mut last_frame = Instant::now();
        let mut last_received = Instant::now();
        let mut next_connect = Instant::now();

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        error!("Receiver task stopped");
                        break;
                    };
                    last_received = Instant::now();
                    if matches!(event, NetEvent::Disconnected { .. }) {
                        next_connect = last_received + self.config.reconnect_delay;
                    }
                    self.session.push_event(event);
                },

                _ = frame_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    let now_ms = self.now_ms();
                    let input = controls.sample(now_ms);
                    self.session.frame(now_ms, dt, &input);

                    for packet in self.session.take_outgoing() {
                        if let Err(e) = self.send_packet(&packet).await {
                            error!("Error sending packet: {}", e);
                        }
                    }

                    if self.session.is_connected() && last_received.elapsed() > self.config.server_timeout {
                        warn!("No data from server for {:?}", self.config.server_timeout);
                        self.session.push_event(NetEvent::Disconnected {
                            reason: "Connection lost".to_string(),
                        });
                        next_connect = now + self.config.reconnect_delay;
                    }

                    if !self.session.is_connected() && now >= next_connect {
                        info!("Connecting to {}...", self.server_addr);
                        let connect = Packet::Connect { client_version: PROTOCOL_VERSION };
                        if let Err(e) = self.send_packet(&connect).await {
                            error!("Error sending connect: {}", e);
                        }
                        next_connect = now + self.config.reconnect_delay;
                        last_received = now;
                    }

                    if deadline.is_some_and(|deadline| now >= deadline) {
                        break;
                    }
                },

                _ = stats_interval.tick() => {
                    let stats = self.session.stats(self.now_ms());
                    info!(
                        "id {:?}, tick {:?}, pending {}, buffer {}, delay {:.0}ms, reconciliations {}{}",
                        stats.player_id,
                        stats.last_tick,
                        stats.pending_inputs,
                        stats.buffered_snapshots,
                        stats.interpolation_delay_ms,
                        stats.reconciliations,
                        if stats.is_reconciling { " (reconciling)" } else { "" }
                    );
                },
            }
        }

        if self.session.is_connected() {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }
        receiver.abort();

        Ok(())
    }
}
