//! In-process acknowledged link. Two endpoints share one pair of queues; a send is acknowledged
//! when it lands in the other endpoint's queue. Loss can be injected per endpoint.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::transport::{Address, Transport};

/// Poll interval used by `idle()`.
const IDLE_SLEEP: Duration = Duration::from_millis(1);

#[derive(Default)]
struct Queues {
    inbox: [VecDeque<Vec<u8>>; 2],
    closed: [bool; 2],
}

struct Shared {
    queues: Mutex<Queues>,
    arrived: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One end of an in-memory link.
pub struct MemoryLink {
    side: usize,
    shared: Arc<Shared>,
    max_len: usize,
    drop_next: usize,
    addresses: Option<(Address, Address)>,
}

impl MemoryLink {
    /// Two connected endpoints carrying datagrams up to `max_len` bytes.
    pub fn pair(max_len: usize) -> (MemoryLink, MemoryLink) {
        let shared = Arc::new(Shared {
            queues: Mutex::new(Queues::default()),
            arrived: Condvar::new(),
        });
        let end = |side| MemoryLink {
            side,
            shared: shared.clone(),
            max_len,
            drop_next: 0,
            addresses: None,
        };
        (end(0), end(1))
    }

    /// Lose the next `n` outbound datagrams; each reports no ack.
    pub fn drop_next(&mut self, n: usize) {
        self.drop_next = n;
    }

    /// Stop accepting datagrams; the peer's sends go unacknowledged from now on.
    pub fn disconnect(&self) {
        self.shared.lock().closed[self.side] = true;
        self.shared.arrived.notify_all();
    }

    /// Addresses given to `configure`, if called.
    pub fn addresses(&self) -> Option<(Address, Address)> {
        self.addresses
    }

    /// Datagrams waiting for this endpoint.
    pub fn pending(&self) -> usize {
        self.shared.lock().inbox[self.side].len()
    }

    fn other(&self) -> usize {
        1 - self.side
    }
}

impl Transport for MemoryLink {
    fn configure(&mut self, local: Address, peer: Address) -> bool {
        self.addresses = Some((local, peer));
        true
    }

    fn send(&mut self, payload: &[u8]) -> bool {
        if payload.len() > self.max_len {
            return false;
        }
        if self.drop_next > 0 {
            self.drop_next -= 1;
            return false;
        }
        let other = self.other();
        let mut q = self.shared.lock();
        if q.closed[other] || q.closed[self.side] {
            return false;
        }
        q.inbox[other].push_back(payload.to_vec());
        drop(q);
        self.shared.arrived.notify_all();
        true
    }

    fn receive_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Option<usize> {
        let side = self.side;
        let q = self.shared.lock();
        let (mut q, _) = self
            .shared
            .arrived
            .wait_timeout_while(q, timeout, |q| q.inbox[side].is_empty() && !q.closed[side])
            .unwrap_or_else(PoisonError::into_inner);
        let bytes = q.inbox[side].pop_front()?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        Some(bytes.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        let bytes = self.shared.lock().inbox[self.side].pop_front()?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        Some(bytes.len())
    }

    fn available(&mut self) -> bool {
        !self.shared.lock().inbox[self.side].is_empty()
    }

    fn max_datagram_len(&self) -> usize {
        self.max_len
    }

    fn idle(&mut self) {
        std::thread::sleep(IDLE_SLEEP);
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}
