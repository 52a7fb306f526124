//! Duel wire protocol: packet types, subtypes, Move and Outcome shapes, and version.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::wire;

/// Current protocol version. First byte of every packet; both peers must agree.
pub const PROTOCOL_VERSION: u8 = 1;

/// Game-defined data carried by a Move or Outcome. Must encode to the same size on both peers,
/// so fixed-size types (integers, arrays, enums without heap data) are the norm.
pub trait Payload: Serialize + DeserializeOwned + Default + Clone + fmt::Debug {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Default + Clone + fmt::Debug {}

/// Packet type tag. Discriminants are the wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    None = 0,
    Offer = 1,
    Accept = 2,
    Move = 3,
    Result = 4,
    Found = 5,
    CoinFlip = 6,
}

impl PacketType {
    pub fn from_wire(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => PacketType::None,
            1 => PacketType::Offer,
            2 => PacketType::Accept,
            3 => PacketType::Move,
            4 => PacketType::Result,
            5 => PacketType::Found,
            6 => PacketType::CoinFlip,
            _ => return None,
        })
    }

    /// True for types that carry no body.
    pub fn is_control(self) -> bool {
        !matches!(self, PacketType::Move | PacketType::Result)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PacketType::None => "No packet type",
            PacketType::Offer => "Offering Game Packet",
            PacketType::Accept => "Accepting Game Packet",
            PacketType::Move => "Move Packet",
            PacketType::Result => "Results Packet",
            PacketType::Found => "Found Game Packet",
            PacketType::CoinFlip => "Coin Flip Packet",
        })
    }
}

/// Packet subtype tag. Discriminants are the wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SubType {
    #[default]
    None = 0,
    NormalMove = 1,
    PassMove = 2,
    QuitMove = 3,
    NormalResult = 4,
    Hit = 5,
    Miss = 6,
    Win = 7,
    Lose = 8,
    Tie = 9,
    FlipTrue = 10,
    FlipFalse = 11,
}

impl SubType {
    pub fn from_wire(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => SubType::None,
            1 => SubType::NormalMove,
            2 => SubType::PassMove,
            3 => SubType::QuitMove,
            4 => SubType::NormalResult,
            5 => SubType::Hit,
            6 => SubType::Miss,
            7 => SubType::Win,
            8 => SubType::Lose,
            9 => SubType::Tie,
            10 => SubType::FlipTrue,
            11 => SubType::FlipFalse,
            _ => return None,
        })
    }
}

impl fmt::Display for SubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubType::None => "No subtype",
            SubType::NormalMove => "Normal Move",
            SubType::PassMove => "Pass Move",
            SubType::QuitMove => "Quit Move",
            SubType::NormalResult => "Normal Results",
            SubType::Hit => "Hit Results",
            SubType::Miss => "Miss Results",
            SubType::Win => "Win Results",
            SubType::Lose => "Lose Results",
            SubType::Tie => "Tie Results",
            SubType::FlipTrue => "Flip True",
            SubType::FlipFalse => "Flip False",
        })
    }
}

/// Subtype of a Move packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MoveKind {
    #[default]
    Normal,
    Pass,
    Quit,
}

impl From<MoveKind> for SubType {
    fn from(kind: MoveKind) -> Self {
        match kind {
            MoveKind::Normal => SubType::NormalMove,
            MoveKind::Pass => SubType::PassMove,
            MoveKind::Quit => SubType::QuitMove,
        }
    }
}

impl TryFrom<SubType> for MoveKind {
    type Error = SubType;

    fn try_from(sub: SubType) -> Result<Self, SubType> {
        match sub {
            SubType::NormalMove => Ok(MoveKind::Normal),
            SubType::PassMove => Ok(MoveKind::Pass),
            SubType::QuitMove => Ok(MoveKind::Quit),
            other => Err(other),
        }
    }
}

/// Subtype of a Result packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutcomeKind {
    #[default]
    Normal,
    Hit,
    Miss,
    Win,
    Lose,
    Tie,
}

impl From<OutcomeKind> for SubType {
    fn from(kind: OutcomeKind) -> Self {
        match kind {
            OutcomeKind::Normal => SubType::NormalResult,
            OutcomeKind::Hit => SubType::Hit,
            OutcomeKind::Miss => SubType::Miss,
            OutcomeKind::Win => SubType::Win,
            OutcomeKind::Lose => SubType::Lose,
            OutcomeKind::Tie => SubType::Tie,
        }
    }
}

impl TryFrom<SubType> for OutcomeKind {
    type Error = SubType;

    fn try_from(sub: SubType) -> Result<Self, SubType> {
        match sub {
            SubType::NormalResult => Ok(OutcomeKind::Normal),
            SubType::Hit => Ok(OutcomeKind::Hit),
            SubType::Miss => Ok(OutcomeKind::Miss),
            SubType::Win => Ok(OutcomeKind::Win),
            SubType::Lose => Ok(OutcomeKind::Lose),
            SubType::Tie => Ok(OutcomeKind::Tie),
            other => Err(other),
        }
    }
}

/// One player's turn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Move<P> {
    /// Move number within the current game. Starts at 1; 0 marks a bootstrap pass.
    pub sequence: u16,
    pub kind: MoveKind,
    pub payload: P,
}

impl<P> Move<P> {
    pub fn new(sequence: u16, kind: MoveKind, payload: P) -> Self {
        Self {
            sequence,
            kind,
            payload,
        }
    }
}

/// The answering peer's response to a Move ("Result" on the wire).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outcome<P> {
    /// Sequence number of the Move this answers.
    pub sequence: u16,
    pub kind: OutcomeKind,
    pub payload: P,
}

impl<P> Outcome<P> {
    pub fn new(kind: OutcomeKind, payload: P) -> Self {
        Self {
            sequence: 0,
            kind,
            payload,
        }
    }
}

/// Transmissible unit. Exactly one shape is active per type.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet<M, R> {
    /// Zero-payload packet: Offer, Accept, Found, CoinFlip.
    Control { kind: PacketType, subtype: SubType },
    Move(Move<M>),
    Outcome(Outcome<R>),
}

impl<M, R> Packet<M, R> {
    pub fn control(kind: PacketType) -> Self {
        Packet::Control {
            kind,
            subtype: SubType::None,
        }
    }

    /// Coin flip announcement. `true` means the offering side moves first.
    pub fn coin_flip(offerer_first: bool) -> Self {
        Packet::Control {
            kind: PacketType::CoinFlip,
            subtype: if offerer_first {
                SubType::FlipTrue
            } else {
                SubType::FlipFalse
            },
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Control { kind, .. } => *kind,
            Packet::Move(_) => PacketType::Move,
            Packet::Outcome(_) => PacketType::Result,
        }
    }

    pub fn subtype(&self) -> SubType {
        match self {
            Packet::Control { subtype, .. } => *subtype,
            Packet::Move(m) => m.kind.into(),
            Packet::Outcome(o) => o.kind.into(),
        }
    }

    /// Value of a coin flip packet; None for any other packet.
    pub fn flip_value(&self) -> Option<bool> {
        match self {
            Packet::Control {
                kind: PacketType::CoinFlip,
                subtype,
            } => Some(*subtype == SubType::FlipTrue),
            _ => None,
        }
    }

    pub fn into_move(self) -> Option<Move<M>> {
        match self {
            Packet::Move(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_outcome(self) -> Option<Outcome<R>> {
        match self {
            Packet::Outcome(o) => Some(o),
            _ => None,
        }
    }
}

impl<M: Payload, R: Payload> Packet<M, R> {
    /// Number of bytes this packet occupies on the wire.
    pub fn encoded_size(&self) -> Result<usize, wire::PacketEncodeError> {
        wire::encoded_size(self)
    }
}

impl<M: fmt::Debug, R: fmt::Debug> fmt::Display for Packet<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type='{}'", self.packet_type())?;
        let subtype = self.subtype();
        if subtype != SubType::None {
            write!(f, " subtype='{}'", subtype)?;
        }
        match self {
            Packet::Control { .. } => Ok(()),
            Packet::Move(m) => write!(f, " Move #{} {:?}", m.sequence, m.payload),
            Packet::Outcome(o) => write!(f, " Results #{} {:?}", o.sequence, o.payload),
        }
    }
}
