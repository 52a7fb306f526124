//! UDP link with acknowledgments. Each protocol packet travels in a Data frame that the
//! receiver acks; the sender retransmits until acked or out of retries. Runs on a blocking
//! thread and drives the tokio socket through a runtime handle.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use duel_core::{Address, Transport};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Poll interval between checks of an indefinite wait.
const IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Bincode framing overhead on top of the protocol packet (tag, ids, addresses, length).
const FRAME_OVERHEAD: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Frame {
    Data {
        id: u16,
        from: u8,
        to: u8,
        payload: Vec<u8>,
    },
    Ack {
        id: u16,
        from: u8,
        to: u8,
    },
}

fn decode_frame(bytes: &[u8]) -> Option<Frame> {
    match bincode::deserialize(bytes) {
        Ok(f) => Some(f),
        Err(e) => {
            warn!(len = bytes.len(), error = %e, "discarding malformed frame");
            None
        }
    }
}

/// True if `frame` is the peer's ack for our Data frame `id`.
fn acknowledges(frame: &Frame, id: u16, local: Address, peer: Address) -> bool {
    matches!(*frame, Frame::Ack { id: acked, from, to }
        if acked == id && from == peer.0 && to == local.0)
}

/// Link parameters taken from the daemon config.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub player_one: SocketAddr,
    pub player_two: SocketAddr,
    pub ack_timeout: Duration,
    pub retries: u8,
    pub max_packet: usize,
}

impl From<&Config> for LinkSettings {
    fn from(c: &Config) -> Self {
        Self {
            player_one: c.player_one,
            player_two: c.player_two,
            ack_timeout: Duration::from_millis(c.ack_timeout_ms),
            retries: c.retries,
            max_packet: c.max_packet,
        }
    }
}

impl LinkSettings {
    fn socket_addr(&self, address: Address) -> Option<SocketAddr> {
        match address {
            Address::PLAYER_ONE => Some(self.player_one),
            Address::PLAYER_TWO => Some(self.player_two),
            _ => None,
        }
    }
}

/// Delivered datagrams, with duplicate suppression for retransmitted frames.
#[derive(Debug, Default)]
struct Inbox {
    last_id: Option<u16>,
    queue: VecDeque<Vec<u8>>,
}

impl Inbox {
    /// Queue a payload unless it repeats the last delivered frame. Returns true if queued.
    fn deliver(&mut self, id: u16, payload: Vec<u8>) -> bool {
        if self.last_id == Some(id) {
            return false;
        }
        self.last_id = Some(id);
        self.queue.push_back(payload);
        true
    }

    fn take(&mut self, buf: &mut [u8]) -> Option<usize> {
        let bytes = self.queue.pop_front()?;
        if bytes.len() > buf.len() {
            warn!(len = bytes.len(), "dropping datagram larger than receive buffer");
            return None;
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Some(bytes.len())
    }
}

/// Acknowledged UDP link between the two configured player addresses.
pub struct UdpLink {
    handle: Handle,
    settings: LinkSettings,
    socket: Option<UdpSocket>,
    local: Address,
    peer: Address,
    next_id: u16,
    inbox: Inbox,
    buf: Vec<u8>,
}

impl UdpLink {
    pub fn new(handle: Handle, settings: LinkSettings) -> Self {
        let buf = vec![0u8; settings.max_packet + FRAME_OVERHEAD];
        Self {
            handle,
            settings,
            socket: None,
            local: Address::PLAYER_ONE,
            peer: Address::PLAYER_TWO,
            next_id: rand::random(),
            inbox: Inbox::default(),
            buf,
        }
    }

    /// Wait for one well-formed frame until `deadline`. None once the deadline passes.
    fn recv_frame(&mut self, deadline: Instant) -> Option<Frame> {
        let socket = self.socket.as_ref()?;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let buf = &mut self.buf;
            let res = self
                .handle
                .block_on(async { tokio::time::timeout(remaining, socket.recv(buf)).await });
            match res {
                Err(_) => return None,
                Ok(Err(e)) => {
                    debug!(error = %e, "receive failed");
                    std::thread::sleep(IDLE_SLEEP);
                }
                Ok(Ok(n)) => {
                    if let Some(frame) = decode_frame(&self.buf[..n]) {
                        return Some(frame);
                    }
                }
            }
        }
    }

    /// Drain frames already waiting on the socket without blocking.
    fn pump(&mut self) {
        loop {
            let Some(socket) = self.socket.as_ref() else {
                return;
            };
            let n = match socket.try_recv(&mut self.buf) {
                Ok(n) => n,
                Err(_) => return,
            };
            if let Some(frame) = decode_frame(&self.buf[..n]) {
                self.handle_frame(frame);
            }
        }
    }

    /// Ack and queue Data frames for us; Acks outside a send are stale and dropped.
    fn handle_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Data {
                id,
                from,
                to,
                payload,
            } => {
                if to != self.local.0 || from != self.peer.0 {
                    debug!(from, to, "ignoring frame for another address");
                    return;
                }
                self.transmit(&Frame::Ack {
                    id,
                    from: self.local.0,
                    to: self.peer.0,
                });
                if !self.inbox.deliver(id, payload) {
                    debug!(id, "duplicate frame acked again");
                }
            }
            Frame::Ack { id, .. } => debug!(id, "stale ack"),
        }
    }

    fn transmit(&self, frame: &Frame) -> bool {
        let Some(socket) = self.socket.as_ref() else {
            return false;
        };
        let bytes = match bincode::serialize(frame) {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "cannot encode frame");
                return false;
            }
        };
        match self.handle.block_on(async { socket.send(&bytes).await }) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "transmit failed");
                false
            }
        }
    }
}

impl Transport for UdpLink {
    fn configure(&mut self, local: Address, peer: Address) -> bool {
        let (Some(bind), Some(dest)) = (
            self.settings.socket_addr(local),
            self.settings.socket_addr(peer),
        ) else {
            error!(%local, %peer, "no socket address for link address");
            return false;
        };
        let socket = self.handle.block_on(async {
            let socket = UdpSocket::bind(bind).await?;
            socket.connect(dest).await?;
            Ok::<_, std::io::Error>(socket)
        });
        match socket {
            Ok(s) => {
                info!(%bind, %dest, "link ready");
                self.socket = Some(s);
                self.local = local;
                self.peer = peer;
                true
            }
            Err(e) => {
                error!(%bind, %dest, error = %e, "link setup failed");
                false
            }
        }
    }

    fn send(&mut self, payload: &[u8]) -> bool {
        if payload.len() > self.settings.max_packet {
            return false;
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let frame = Frame::Data {
            id,
            from: self.local.0,
            to: self.peer.0,
            payload: payload.to_vec(),
        };
        for attempt in 0..=self.settings.retries {
            if !self.transmit(&frame) {
                std::thread::sleep(self.settings.ack_timeout);
                continue;
            }
            let deadline = Instant::now() + self.settings.ack_timeout;
            while let Some(reply) = self.recv_frame(deadline) {
                if acknowledges(&reply, id, self.local, self.peer) {
                    return true;
                }
                self.handle_frame(reply);
            }
            debug!(id, attempt, "no ack, retransmitting");
        }
        false
    }

    fn receive_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Option<usize> {
        if let Some(n) = self.inbox.take(buf) {
            return Some(n);
        }
        let deadline = Instant::now() + timeout;
        while let Some(frame) = self.recv_frame(deadline) {
            self.handle_frame(frame);
            if let Some(n) = self.inbox.take(buf) {
                return Some(n);
            }
        }
        None
    }

    fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.inbox.queue.is_empty() {
            self.pump();
        }
        self.inbox.take(buf)
    }

    fn available(&mut self) -> bool {
        self.pump();
        !self.inbox.queue.is_empty()
    }

    fn max_datagram_len(&self) -> usize {
        self.settings.max_packet
    }

    fn idle(&mut self) {
        std::thread::sleep(IDLE_SLEEP);
    }
}
