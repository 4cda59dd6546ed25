//! DHCP client runtime
//!
//! This module drives the [`Engine`] on tokio:
//! - one UDP socket per managed interface
//! - a single event channel fed by socket readers and timers
//! - execution of the engine's actions

use crate::{
    config::ClientConfig,
    engine::{Action, Engine, Event, TimerKind},
    error::LeasedError,
    network::LeaseApplier,
    transaction::InterfaceDescriptor,
};
use bytes::Bytes;
use std::{
    collections::HashMap,
    future::Future,
    io,
    net::{SocketAddr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};
use tokio::{net::UdpSocket, sync::mpsc, task::JoinHandle};

/// Posts `TimerFired` events into the engine's channel.
#[derive(Clone)]
pub struct TimerScheduler {
    events: mpsc::UnboundedSender<Event>,
}

impl TimerScheduler {
    pub fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        Self { events }
    }

    /// Arms a one-shot timer. Timers are never cancelled; a timer whose
    /// transaction is gone by the time it fires is ignored by the engine.
    pub fn arm(&self, xid: u32, kind: TimerKind, delay: Duration) -> JoinHandle<()> {
        let events = self.events.clone();
        tracing::debug!("Arming {:?} timer for xid {:#010x} in {:?}", kind, xid, delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(Event::TimerFired { xid, kind }).is_err() {
                tracing::debug!("Event loop gone, dropping {:?} timer", kind);
            }
        })
    }
}

/// Feeds datagrams from `recv` into the event channel until the channel
/// closes.
///
/// A failed read pauses for `backoff` before the next attempt. Only the first
/// error of a run is logged at `warn`.
async fn receive_datagrams<F, Fut>(
    interface: String,
    mut recv: F,
    events: mpsc::UnboundedSender<Event>,
    backoff: Duration,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<Bytes>>,
{
    let mut failures: u32 = 0;
    loop {
        match recv().await {
            Ok(datagram) => {
                if failures > 0 {
                    tracing::info!("Receiving on {} again after {} errors", interface, failures);
                    failures = 0;
                }
                if events.send(Event::DatagramReceived(datagram)).is_err() {
                    break;
                }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                if failures == 1 {
                    tracing::warn!("Socket receive error on {}: {}", interface, e);
                } else {
                    tracing::debug!("Socket receive error #{} on {}: {}", failures, interface, e);
                }
                if events.is_closed() {
                    break;
                }
                tokio::time::sleep(backoff).await;
            }
        }
    }
    tracing::debug!("Receiver for {} stopped", interface);
}

pub struct DhcpClient {
    config: ClientConfig,
    engine: Engine,
    interfaces: Vec<InterfaceDescriptor>,
    sockets: HashMap<String, Arc<UdpSocket>>,
    applier: Box<dyn LeaseApplier + Send>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl DhcpClient {
    /// Binds one socket per interface. Socket setup failures are fatal.
    pub fn new(
        config: ClientConfig,
        interfaces: Vec<InterfaceDescriptor>,
        applier: Box<dyn LeaseApplier + Send>,
    ) -> Result<Self, LeasedError> {
        if interfaces.is_empty() {
            return Err(LeasedError::NoInterfaces);
        }

        let mut sockets = HashMap::with_capacity(interfaces.len());
        for iface in &interfaces {
            let socket =
                crate::network::bind_client_socket(&iface.name, config.client_port)?;
            tracing::debug!("Bound {} to port {}", iface.name, config.client_port);
            sockets.insert(iface.name.clone(), Arc::new(socket));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            engine: Engine::new(config.engine.clone()),
            config,
            interfaces,
            sockets,
            applier,
            events_tx,
            events_rx,
        })
    }

    fn spawn_receivers(&self) -> Vec<JoinHandle<()>> {
        self.sockets
            .iter()
            .map(|(name, socket)| {
                let socket = Arc::clone(socket);
                let buffer_size = self.config.recv_buffer_size;
                let label = name.clone();
                let recv = move || {
                    let socket = Arc::clone(&socket);
                    let label = label.clone();
                    async move {
                        let mut buf = vec![0u8; buffer_size];
                        let (len, addr) = socket.recv_from(&mut buf).await?;
                        tracing::debug!("Received {} bytes from {} on {}", len, addr, label);
                        buf.truncate(len);
                        Ok::<_, io::Error>(Bytes::from(buf))
                    }
                };
                tokio::spawn(receive_datagrams(
                    name.clone(),
                    recv,
                    self.events_tx.clone(),
                    self.config.recv_error_backoff,
                ))
            })
            .collect()
    }

    async fn execute(&self, action: Action, timers: &TimerScheduler) {
        match action {
            Action::Send { interface, packet } => {
                let Some(socket) = self.sockets.get(&interface) else {
                    tracing::error!("No socket for interface {}", interface);
                    return;
                };
                let target = SocketAddr::V4(SocketAddrV4::new(
                    self.config.broadcast_address,
                    self.config.server_port,
                ));
                match socket.send_to(&packet, target).await {
                    Ok(sent) => tracing::debug!("Sent {} bytes to {} on {}", sent, target, interface),
                    Err(e) => tracing::error!("Send on {} failed: {}", interface, e),
                }
            }
            Action::ApplyLease(lease) => {
                tracing::info!("DHCP Bind Successful! Lease: {:?}", lease);
                if let Err(e) = self.applier.apply_lease(&lease) {
                    tracing::error!("Failed to apply network configuration: {}", e);
                    tracing::warn!("Lease obtained but network configuration failed");
                }
            }
            Action::ArmTimer { xid, kind, delay } => {
                timers.arm(xid, kind, delay);
            }
        }
    }

    /// Starts discovery on every interface and processes events. The client
    /// holds a sender of its own channel, so this only returns if the
    /// channel is torn down underneath it.
    pub async fn run(&mut self) -> Result<(), LeasedError> {
        let receivers = self.spawn_receivers();
        let timers = TimerScheduler::new(self.events_tx.clone());

        let interfaces = self.interfaces.clone();
        let mut pending = self.engine.start(interfaces);

        loop {
            for action in pending.drain(..) {
                self.execute(action, &timers).await;
            }

            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            pending = self.engine.handle_event(event);
        }

        for receiver in receivers {
            receiver.abort();
        }
        Ok(())
    }
}
