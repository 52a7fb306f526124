//! Two-player turn-based session protocol over an acknowledged datagram link.
//! Host-driven: the host supplies a transport and game handlers, then calls `step()` in its loop.

pub mod channel;
pub mod handler;
pub mod memory;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod scripted;

pub use channel::PacketChannel;
pub use handler::{FatalAction, Handlers, Judgement, MoveHandler, ResultHandler, SessionHooks};
pub use memory::MemoryLink;
pub use protocol::{
    Move, MoveKind, Outcome, OutcomeKind, Packet, PacketType, Payload, SubType, PROTOCOL_VERSION,
};
pub use session::{
    Game, ProtocolError, Session, SessionConfig, SessionError, State, DEFAULT_OFFER_TIMEOUT_MS,
    DEFAULT_OFFER_TRIES,
};
pub use transport::{Address, PlayerRole, Transport};
pub use wire::{decode_packet, encode_packet, PacketDecodeError, PacketEncodeError};
