//! Link drivers
//!
//! The runtime talks to its ports through the [`LinkDriver`] seam: raw
//! Ethernet sockets in production, an in-memory pair in tests.

use async_trait::async_trait;
use pnet_datalink::{self, Channel, DataLinkSender};
use tokio::sync::mpsc;
use tracing::warn;

use rapidtree_core::{Error, MacAddr, Result};

/// Frame transport for one bridge's ports.
#[async_trait]
pub trait LinkDriver: Send {
    /// Transmit a raw Ethernet frame on `port`
    async fn send(&mut self, port: usize, frame: &[u8]) -> Result<()>;

    /// Next received frame with its arrival port; `None` when the driver
    /// has shut down
    async fn recv(&mut self) -> Option<(usize, Vec<u8>)>;
}

/// Driver backed by pnet datalink channels, one OS interface per port.
/// A reader thread per interface feeds received frames into one queue.
pub struct PnetLinkDriver {
    senders: Vec<Box<dyn DataLinkSender>>,
    rx: mpsc::Receiver<(usize, Vec<u8>)>,
    macs: Vec<MacAddr>,
}

impl PnetLinkDriver {
    pub fn open(names: &[String]) -> Result<Self> {
        let available = pnet_datalink::interfaces();
        let (queue, rx) = mpsc::channel(256);

        let mut senders = Vec::with_capacity(names.len());
        let mut macs = Vec::with_capacity(names.len());
        for (port, name) in names.iter().enumerate() {
            let iface = available
                .iter()
                .find(|i| &i.name == name)
                .cloned()
                .ok_or_else(|| Error::InterfaceNotFound(name.clone()))?;

            let mac = iface
                .mac
                .map(|m| MacAddr([m.0, m.1, m.2, m.3, m.4, m.5]))
                .unwrap_or_else(MacAddr::zero);

            let (sender, mut receiver) = match pnet_datalink::channel(&iface, Default::default())
            {
                Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
                Ok(_) => {
                    return Err(Error::Interface(format!(
                        "unsupported channel type on {name}"
                    )))
                }
                Err(e) => {
                    return Err(Error::Interface(format!(
                        "failed to open channel on {name}: {e}"
                    )))
                }
            };

            let queue = queue.clone();
            let thread_name = format!("rt-rx-{name}");
            std::thread::Builder::new()
                .name(thread_name)
                .spawn(move || loop {
                    match receiver.next() {
                        Ok(frame) => {
                            if queue.blocking_send((port, frame.to_vec())).is_err() {
                                // runtime is gone
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(port, error = %e, "receive failed");
                            break;
                        }
                    }
                })
                .map_err(Error::Io)?;

            senders.push(sender);
            macs.push(mac);
        }

        Ok(Self { senders, rx, macs })
    }

    /// MAC addresses of the opened interfaces, in port order.
    pub fn macs(&self) -> &[MacAddr] {
        &self.macs
    }
}

#[async_trait]
impl LinkDriver for PnetLinkDriver {
    async fn send(&mut self, port: usize, frame: &[u8]) -> Result<()> {
        let count = self.senders.len();
        let sender = self
            .senders
            .get_mut(port)
            .ok_or(Error::PortOutOfRange { port, count })?;
        sender
            .send_to(frame, None)
            .ok_or_else(|| Error::Interface("failed to queue frame".into()))?
            .map_err(|e| Error::Interface(format!("send error: {e}")))?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<(usize, Vec<u8>)> {
        self.rx.recv().await
    }
}

/// In-memory driver pair: port `i` of each side is wired to port `i` of
/// the other. Used by runtime tests.
pub struct LoopbackDriver {
    peer: mpsc::Sender<(usize, Vec<u8>)>,
    rx: mpsc::Receiver<(usize, Vec<u8>)>,
}

impl LoopbackDriver {
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(64);
        let (b_tx, b_rx) = mpsc::channel(64);
        (
            Self { peer: b_tx, rx: a_rx },
            Self { peer: a_tx, rx: b_rx },
        )
    }
}

#[async_trait]
impl LinkDriver for LoopbackDriver {
    async fn send(&mut self, port: usize, frame: &[u8]) -> Result<()> {
        // a closed peer behaves like an unplugged cable
        let _ = self.peer.send((port, frame.to_vec())).await;
        Ok(())
    }

    async fn recv(&mut self) -> Option<(usize, Vec<u8>)> {
        self.rx.recv().await
    }
}
