//! Packet exchange over a transport: send, send a bare control packet, and wait for a packet
//! of a given type (once with a timeout, or indefinitely). No retries happen here.

use std::marker::PhantomData;
use std::time::Duration;

use tracing::{debug, warn};

use crate::protocol::{Move, Outcome, Packet, PacketType, Payload};
use crate::transport::Transport;
use crate::wire;

/// Borrowed view of a transport that speaks `Packet<M, R>`.
pub struct PacketChannel<'t, T: Transport + ?Sized, M, R> {
    transport: &'t mut T,
    buf: Vec<u8>,
    _payloads: PhantomData<fn() -> (M, R)>,
}

impl<'t, T, M, R> PacketChannel<'t, T, M, R>
where
    T: Transport + ?Sized,
    M: Payload,
    R: Payload,
{
    pub fn new(transport: &'t mut T) -> Self {
        let buf = vec![0u8; transport.max_datagram_len()];
        Self {
            transport,
            buf,
            _payloads: PhantomData,
        }
    }

    /// Transmit once. True iff the peer acknowledged. Packets that cannot be encoded are
    /// logged and reported as unacknowledged.
    pub fn send(&mut self, packet: &Packet<M, R>) -> bool {
        let bytes = match wire::encode_packet(packet, self.buf.len()) {
            Ok(b) => b,
            Err(e) => {
                warn!(%packet, error = %e, "cannot encode packet");
                return false;
            }
        };
        let acked = self.transport.send(&bytes);
        if acked {
            debug!(%packet, "sent (ack received)");
        } else {
            debug!(%packet, "sent (no ack)");
        }
        acked
    }

    /// Send a zero-payload control packet of the given type.
    pub fn send_typed(&mut self, kind: PacketType) -> bool {
        self.send(&Packet::control(kind))
    }

    /// One receive attempt within `timeout`. None on timeout, on a packet of another type, or
    /// on an undecodable datagram; a mismatched packet is dropped.
    pub fn require_type_with_timeout(
        &mut self,
        kind: PacketType,
        timeout: Duration,
    ) -> Option<Packet<M, R>> {
        let n = self.transport.receive_timeout(&mut self.buf, timeout)?;
        let packet = self.decode(n)?;
        if packet.packet_type() == kind {
            debug!(%packet, "got timed packet, was required type");
            Some(packet)
        } else {
            debug!(%packet, expected = %kind, "got timed packet, was wrong type");
            None
        }
    }

    /// Wait until a packet of the given type arrives, discarding everything else.
    pub fn require_type(&mut self, kind: PacketType) -> Packet<M, R> {
        loop {
            if !self.transport.available() {
                self.transport.idle();
                continue;
            }
            let Some(n) = self.transport.receive(&mut self.buf) else {
                self.transport.idle();
                continue;
            };
            let Some(packet) = self.decode(n) else {
                continue;
            };
            if packet.packet_type() == kind {
                debug!(%packet, "got packet, was required type");
                return packet;
            }
            debug!(%packet, expected = %kind, "got packet, was wrong type, ignoring");
        }
    }

    /// Wait indefinitely for the opponent's move.
    pub fn require_move(&mut self) -> Move<M> {
        loop {
            if let Packet::Move(mv) = self.require_type(PacketType::Move) {
                return mv;
            }
        }
    }

    /// Wait indefinitely for the answer to our move.
    pub fn require_outcome(&mut self) -> Outcome<R> {
        loop {
            if let Packet::Outcome(outcome) = self.require_type(PacketType::Result) {
                return outcome;
            }
        }
    }

    fn decode(&self, n: usize) -> Option<Packet<M, R>> {
        match wire::decode_packet(&self.buf[..n]) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(len = n, error = %e, "discarding undecodable datagram");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MoveKind, OutcomeKind};
    use crate::scripted::ScriptedLink;

    type Chan<'t> = PacketChannel<'t, ScriptedLink, u32, u32>;
    type P = Packet<u32, u32>;

    #[test]
    fn send_reports_ack() {
        let mut link = ScriptedLink::new();
        link.acks.extend([true, false]);
        let mut chan = Chan::new(&mut link);
        assert!(chan.send_typed(PacketType::Offer));
        assert!(!chan.send_typed(PacketType::Offer));
        assert_eq!(link.sent.len(), 2);
    }

    #[test]
    fn send_oversized_is_not_transmitted() {
        let mut link = ScriptedLink::new();
        link.max_len = 4;
        let mut chan = Chan::new(&mut link);
        assert!(!chan.send(&Packet::Move(Move::new(1, MoveKind::Normal, 5))));
        assert!(link.sent.is_empty());
    }

    #[test]
    fn timed_wait_matches_type() {
        let mut link = ScriptedLink::new();
        link.push::<u32, u32>(Packet::control(PacketType::Accept));
        let mut chan = Chan::new(&mut link);
        let got = chan.require_type_with_timeout(PacketType::Accept, Duration::from_millis(10));
        assert_eq!(got, Some(P::control(PacketType::Accept)));
    }

    #[test]
    fn timed_wait_false_on_timeout() {
        let mut link = ScriptedLink::new();
        link.push_timeout();
        let mut chan = Chan::new(&mut link);
        assert!(chan
            .require_type_with_timeout(PacketType::Accept, Duration::from_millis(10))
            .is_none());
    }

    #[test]
    fn timed_wait_drops_wrong_type() {
        let mut link = ScriptedLink::new();
        link.push::<u32, u32>(Packet::control(PacketType::Offer))
            .push::<u32, u32>(Packet::control(PacketType::Accept));
        let mut chan = Chan::new(&mut link);
        assert!(chan
            .require_type_with_timeout(PacketType::Accept, Duration::from_millis(10))
            .is_none());
        // The Offer was consumed, not requeued: the next attempt sees the Accept.
        assert!(chan
            .require_type_with_timeout(PacketType::Accept, Duration::from_millis(10))
            .is_some());
        assert!(link.inbound.is_empty());
    }

    /// Reports data ready but loses the first `misses` reads.
    struct LostReads {
        misses: usize,
        idles: usize,
    }

    impl Transport for LostReads {
        fn configure(&mut self, _: crate::transport::Address, _: crate::transport::Address) -> bool {
            true
        }
        fn send(&mut self, _: &[u8]) -> bool {
            true
        }
        fn receive_timeout(&mut self, buf: &mut [u8], _: Duration) -> Option<usize> {
            self.receive(buf)
        }
        fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
            if self.misses > 0 {
                self.misses -= 1;
                return None;
            }
            let bytes = wire::encode_packet(&P::control(PacketType::Accept), buf.len()).unwrap();
            buf[..bytes.len()].copy_from_slice(&bytes);
            Some(bytes.len())
        }
        fn available(&mut self) -> bool {
            true
        }
        fn max_datagram_len(&self) -> usize {
            16
        }
        fn idle(&mut self) {
            self.idles += 1;
        }
    }

    #[test]
    fn blocking_wait_yields_after_failed_read() {
        let mut link = LostReads {
            misses: 3,
            idles: 0,
        };
        let mut chan = PacketChannel::<_, u32, u32>::new(&mut link);
        assert_eq!(chan.require_type(PacketType::Accept), P::control(PacketType::Accept));
        assert_eq!(link.idles, 3);
    }

    #[test]
    fn blocking_wait_discards_until_match() {
        let mut link = ScriptedLink::new();
        link.push::<u32, u32>(Packet::control(PacketType::Offer))
            .push_raw(&[0xff, 0, 0])
            .push_timeout()
            .push::<u32, u32>(Packet::Move(Move::new(2, MoveKind::Normal, 11)))
            .push::<u32, u32>(Packet::Outcome(Outcome {
                sequence: 2,
                kind: OutcomeKind::Miss,
                payload: 99,
            }))
            .push::<u32, u32>(Packet::control(PacketType::Found));
        let mut chan = Chan::new(&mut link);
        let got = chan.require_type(PacketType::Result);
        assert_eq!(got.into_outcome().unwrap().payload, 99);
        assert_eq!(link.inbound.len(), 1);
        assert!(link.idles >= 1);
    }
}
