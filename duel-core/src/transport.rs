//! Transport contract: an acknowledged point-to-point datagram link between two addressed peers.
//! The core never opens sockets; the host supplies an implementation (radio, UDP, in-memory).

use std::fmt;
use std::time::Duration;

/// Device address on the link. A session uses exactly two: its own and its peer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub u8);

impl Address {
    pub const PLAYER_ONE: Address = Address(1);
    pub const PLAYER_TWO: Address = Address(2);
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed player role of this device. Unrelated to turn order, which the coin flip decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerRole {
    One,
    Two,
}

impl PlayerRole {
    pub fn from_is_player_one(is_player_one: bool) -> Self {
        if is_player_one {
            PlayerRole::One
        } else {
            PlayerRole::Two
        }
    }

    /// This device's address.
    pub fn local(self) -> Address {
        match self {
            PlayerRole::One => Address::PLAYER_ONE,
            PlayerRole::Two => Address::PLAYER_TWO,
        }
    }

    /// Destination of every transmission.
    pub fn peer(self) -> Address {
        match self {
            PlayerRole::One => Address::PLAYER_TWO,
            PlayerRole::Two => Address::PLAYER_ONE,
        }
    }
}

/// Bidirectional datagram channel with acknowledgment semantics.
///
/// Implementations must not retry at the protocol's request; any link-level retransmission
/// they do internally is invisible to the caller, which only sees acknowledged or not.
pub trait Transport {
    /// One-time setup. Returns false on unrecoverable failure.
    fn configure(&mut self, local: Address, peer: Address) -> bool;

    /// Sends one datagram to the peer. True iff the peer acknowledged it.
    fn send(&mut self, payload: &[u8]) -> bool;

    /// Waits up to `timeout` for one datagram. Returns its length, or None on timeout.
    fn receive_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Option<usize>;

    /// Takes one pending datagram. Callers check `available()` first; None means it was lost
    /// between the check and the read.
    fn receive(&mut self, buf: &mut [u8]) -> Option<usize>;

    /// True if a datagram is waiting.
    fn available(&mut self) -> bool;

    /// Largest datagram the link can carry.
    fn max_datagram_len(&self) -> usize;

    /// Cooperative suspension point, called between polls of an indefinite wait.
    fn idle(&mut self) {
        std::thread::yield_now();
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn configure(&mut self, local: Address, peer: Address) -> bool {
        (**self).configure(local, peer)
    }
    fn send(&mut self, payload: &[u8]) -> bool {
        (**self).send(payload)
    }
    fn receive_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Option<usize> {
        (**self).receive_timeout(buf, timeout)
    }
    fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        (**self).receive(buf)
    }
    fn available(&mut self) -> bool {
        (**self).available()
    }
    fn max_datagram_len(&self) -> usize {
        (**self).max_datagram_len()
    }
    fn idle(&mut self) {
        (**self).idle()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn configure(&mut self, local: Address, peer: Address) -> bool {
        (**self).configure(local, peer)
    }
    fn send(&mut self, payload: &[u8]) -> bool {
        (**self).send(payload)
    }
    fn receive_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Option<usize> {
        (**self).receive_timeout(buf, timeout)
    }
    fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        (**self).receive(buf)
    }
    fn available(&mut self) -> bool {
        (**self).available()
    }
    fn max_datagram_len(&self) -> usize {
        (**self).max_datagram_len()
    }
    fn idle(&mut self) {
        (**self).idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_complementary() {
        let one = PlayerRole::from_is_player_one(true);
        let two = PlayerRole::from_is_player_one(false);
        assert_eq!(one.local(), Address::PLAYER_ONE);
        assert_eq!(one.peer(), Address::PLAYER_TWO);
        assert_eq!(two.local(), one.peer());
        assert_eq!(two.peer(), one.local());
    }
}
