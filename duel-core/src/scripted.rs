//! Deterministic transport for single-peer tests: inbound datagrams and send acks are queued
//! up front, every outbound datagram is recorded.

use std::collections::VecDeque;
use std::time::Duration;

use crate::protocol::{Packet, Payload};
use crate::transport::{Address, Transport};
use crate::wire;

/// One queued inbound event.
pub(crate) enum Inbound {
    Datagram(Vec<u8>),
    /// A receive_timeout call that expires with nothing.
    Timeout,
}

pub(crate) struct ScriptedLink {
    pub inbound: VecDeque<Inbound>,
    /// Ack results for successive sends; an empty queue acknowledges.
    pub acks: VecDeque<bool>,
    pub sent: Vec<Vec<u8>>,
    pub configured: Option<(Address, Address)>,
    pub configure_ok: bool,
    pub max_len: usize,
    pub idles: usize,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            acks: VecDeque::new(),
            sent: Vec::new(),
            configured: None,
            configure_ok: true,
            max_len: 64,
            idles: 0,
        }
    }

    pub fn push<M: Payload, R: Payload>(&mut self, packet: Packet<M, R>) -> &mut Self {
        let bytes = wire::encode_packet(&packet, self.max_len).unwrap();
        self.inbound.push_back(Inbound::Datagram(bytes));
        self
    }

    pub fn push_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.inbound.push_back(Inbound::Datagram(bytes.to_vec()));
        self
    }

    pub fn push_timeout(&mut self) -> &mut Self {
        self.inbound.push_back(Inbound::Timeout);
        self
    }

    pub fn sent_packets<M: Payload, R: Payload>(&self) -> Vec<Packet<M, R>> {
        self.sent
            .iter()
            .map(|b| wire::decode_packet(b).unwrap())
            .collect()
    }

    fn take(&mut self, buf: &mut [u8]) -> Option<usize> {
        match self.inbound.pop_front()? {
            Inbound::Datagram(bytes) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Some(bytes.len())
            }
            Inbound::Timeout => None,
        }
    }
}

impl Transport for ScriptedLink {
    fn configure(&mut self, local: Address, peer: Address) -> bool {
        self.configured = Some((local, peer));
        self.configure_ok
    }

    fn send(&mut self, payload: &[u8]) -> bool {
        self.sent.push(payload.to_vec());
        self.acks.pop_front().unwrap_or(true)
    }

    fn receive_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> Option<usize> {
        self.take(buf)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        self.take(buf)
    }

    fn available(&mut self) -> bool {
        matches!(self.inbound.front(), Some(Inbound::Datagram(_)))
    }

    fn max_datagram_len(&self) -> usize {
        self.max_len
    }

    fn idle(&mut self) {
        self.idles += 1;
        assert!(
            !self.inbound.is_empty() || self.idles < 1000,
            "indefinite wait on an exhausted script"
        );
        if let Some(Inbound::Timeout) = self.inbound.front() {
            self.inbound.pop_front();
        }
    }
}
