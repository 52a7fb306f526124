//! Session state machine: offer or seek a game, settle turn order, then alternate moves and
//! results with sequence checks. The host calls `start()` once and `step()` from its run loop.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::channel::PacketChannel;
use crate::handler::{FatalAction, Handlers, Judgement, MoveHandler, ResultHandler, SessionHooks};
use crate::protocol::{Move, MoveKind, Outcome, OutcomeKind, Packet, PacketType};
use crate::transport::{Address, PlayerRole, Transport};
use crate::wire::{self, PacketEncodeError};

/// Default number of offers sent before falling back to seeking.
pub const DEFAULT_OFFER_TRIES: u8 = 2;

/// Default wait for an Accept after each offer.
pub const DEFAULT_OFFER_TIMEOUT_MS: u64 = 1000;

/// Everything a game supplies to a session.
pub trait Game: MoveHandler + ResultHandler<<Self as MoveHandler>::Payload> + SessionHooks {}

impl<G> Game for G where G: MoveHandler + ResultHandler<<G as MoveHandler>::Payload> + SessionHooks {}

type MovePayload<G> = <G as MoveHandler>::Payload;
type OutcomePayload<G> = <G as ResultHandler<MovePayload<G>>>::Payload;

/// Protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Offering,
    Seeking,
    MyTurn,
    OpponentsTurn,
    GameOver,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Offering => "Offering Game",
            State::Seeking => "Seeking Game",
            State::MyTurn => "My Turn",
            State::OpponentsTurn => "Opponent's Turn",
            State::GameOver => "Game Over",
        })
    }
}

/// Offer retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Offers sent before switching to seeking (default 2).
    #[serde(default = "default_offer_tries")]
    pub offer_tries: u8,
    /// Wait for Accept after each offer, in milliseconds (default 1000).
    #[serde(default = "default_offer_timeout_ms")]
    pub offer_timeout_ms: u64,
}

fn default_offer_tries() -> u8 {
    DEFAULT_OFFER_TRIES
}
fn default_offer_timeout_ms() -> u64 {
    DEFAULT_OFFER_TIMEOUT_MS
}

impl SessionConfig {
    pub fn offer_timeout(&self) -> Duration {
        Duration::from_millis(self.offer_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            offer_tries: default_offer_tries(),
            offer_timeout_ms: default_offer_timeout_ms(),
        }
    }
}

/// Unrecoverable protocol condition. Reported through `SessionHooks::on_fatal_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("no ack for {0}")]
    NoAck(PacketType),
    #[error("results number mismatch: expected {expected}, got {got}")]
    OutcomeSequence { expected: u16, got: u16 },
    #[error("opponent's move number mismatch: expected {expected}, got {got}")]
    MoveSequence { expected: u16, got: u16 },
    #[error("move number {expected} rewritten to {got}")]
    SequenceRewritten { expected: u16, got: u16 },
    #[error("no handling for {0:?} move")]
    UnhandledMove(MoveKind),
    #[error("no handling for {0:?} results")]
    UnhandledOutcome(OutcomeKind),
    #[error("move rejected: {0}")]
    Rejected(String),
}

/// Error starting a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport setup failed for {local} -> {peer}")]
    Configure { local: Address, peer: Address },
    #[error("{kind} does not fit the link: {source}")]
    PacketTooLarge {
        kind: PacketType,
        #[source]
        source: PacketEncodeError,
    },
}

fn open<G: Game, T: Transport>(
    transport: &mut T,
) -> PacketChannel<'_, T, MovePayload<G>, OutcomePayload<G>> {
    PacketChannel::new(transport)
}

/// One peer's side of a long-lived two-player session.
pub struct Session<G: Game, T: Transport> {
    game: G,
    transport: T,
    role: PlayerRole,
    config: SessionConfig,
    state: State,
    sequence: u16,
    games_completed: u64,
}

impl<G: Game, T: Transport> Session<G, T> {
    pub fn new(game: G, transport: T, is_player_one: bool) -> Self {
        Self::with_config(game, transport, is_player_one, SessionConfig::default())
    }

    pub fn with_config(game: G, transport: T, is_player_one: bool, config: SessionConfig) -> Self {
        Self {
            game,
            transport,
            role: PlayerRole::from_is_player_one(is_player_one),
            config,
            state: State::Offering,
            sequence: 1,
            games_completed: 0,
        }
    }

    /// Check packet sizes against the link and configure the transport. Call once.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let max = self.transport.max_datagram_len();
        let shapes: [Packet<MovePayload<G>, OutcomePayload<G>>; 2] = [
            Packet::Move(Move::default()),
            Packet::Outcome(Outcome::default()),
        ];
        for packet in &shapes {
            wire::encode_packet(packet, max).map_err(|source| SessionError::PacketTooLarge {
                kind: packet.packet_type(),
                source,
            })?;
        }
        let (local, peer) = (self.role.local(), self.role.peer());
        if !self.transport.configure(local, peer) {
            return Err(SessionError::Configure { local, peer });
        }
        info!(%local, %peer, state = %self.state, "session started");
        Ok(())
    }

    /// Run one transition of the current state and return the resulting state.
    pub fn step(&mut self) -> State {
        let result = match self.state {
            State::Offering => self.offering(),
            State::Seeking => self.seeking(),
            State::MyTurn => self.my_turn(),
            State::OpponentsTurn => self.opponents_turn(),
            State::GameOver => {
                self.game_over();
                Ok(())
            }
        };
        if let Err(e) = result {
            self.fatal(e);
        }
        self.state
    }

    /// Skip offering and wait for the peer's offer on the next step.
    pub fn seek(&mut self) {
        self.state = State::Seeking;
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Current move number.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn role(&self) -> PlayerRole {
        self.role
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn games_completed(&self) -> u64 {
        self.games_completed
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_parts(self) -> (G, T) {
        (self.game, self.transport)
    }

    fn offering(&mut self) -> Result<(), ProtocolError> {
        self.sequence = 1;
        let timeout = self.config.offer_timeout();
        let mut chan = open::<G, T>(&mut self.transport);
        for attempt in 1..=self.config.offer_tries {
            if !chan.send_typed(PacketType::Offer) {
                debug!(attempt, "no reply to offer");
                continue;
            }
            if chan
                .require_type_with_timeout(PacketType::Accept, timeout)
                .is_none()
            {
                debug!(attempt, "offer not accepted");
                continue;
            }
            info!("offer accepted");
            // The accepting side is already waiting on these; a lost ack must not abort.
            if !chan.send_typed(PacketType::Found) {
                warn!("game found not acknowledged");
            }
            let offerer_first = self.game.coin_flip();
            if !chan.send(&Packet::coin_flip(offerer_first)) {
                warn!(offerer_first, "coin flip not acknowledged");
            }
            self.state = if offerer_first {
                State::MyTurn
            } else {
                State::OpponentsTurn
            };
            info!(offerer_first, "coin flipped");
            return Ok(());
        }
        debug!("giving up offering, seeking instead");
        self.state = State::Seeking;
        Ok(())
    }

    fn seeking(&mut self) -> Result<(), ProtocolError> {
        let mut chan = open::<G, T>(&mut self.transport);
        chan.require_type(PacketType::Offer);
        info!("offer received");
        if !chan.send_typed(PacketType::Accept) {
            return Err(ProtocolError::NoAck(PacketType::Accept));
        }
        chan.require_type(PacketType::Found);
        self.game.on_game_found();
        let offerer_first = chan.require_type(PacketType::CoinFlip).flip_value() == Some(true);
        self.game.on_flip_result(offerer_first);
        self.state = if offerer_first {
            State::OpponentsTurn
        } else {
            State::MyTurn
        };
        self.sequence = 1;
        info!(offerer_first, "game found");
        Ok(())
    }

    fn my_turn(&mut self) -> Result<(), ProtocolError> {
        let expected = self.sequence;
        let mut mv = Move::new(expected, MoveKind::Normal, Default::default());
        self.game.decide_move(&mut mv);
        let sent = mv.sequence;
        if sent != expected && !(sent == 0 && expected == 1) {
            return Err(ProtocolError::SequenceRewritten {
                expected,
                got: sent,
            });
        }
        let mut chan = open::<G, T>(&mut self.transport);
        if !chan.send(&Packet::Move(mv)) {
            return Err(ProtocolError::NoAck(PacketType::Move));
        }
        debug!(sequence = sent, "waiting for results");
        let outcome = chan.require_outcome();
        if outcome.sequence != sent {
            return Err(ProtocolError::OutcomeSequence {
                expected: sent,
                got: outcome.sequence,
            });
        }
        let ended = self.game.process_results(&outcome)?;
        self.state = if ended {
            State::GameOver
        } else {
            State::OpponentsTurn
        };
        self.sequence = sent.wrapping_add(1);
        Ok(())
    }

    fn opponents_turn(&mut self) -> Result<(), ProtocolError> {
        let mut chan = open::<G, T>(&mut self.transport);
        let mv = chan.require_move();
        if mv.sequence == 0 {
            debug!("opponent passed the opening move");
            self.sequence = 0;
        } else if mv.sequence != self.sequence {
            return Err(ProtocolError::MoveSequence {
                expected: self.sequence,
                got: mv.sequence,
            });
        }
        let Judgement {
            mut outcome,
            game_ended,
        } = self.game.generate_results(&mv)?;
        outcome.sequence = mv.sequence;
        self.state = if game_ended {
            State::GameOver
        } else {
            State::MyTurn
        };
        if !chan.send(&Packet::Outcome(outcome)) {
            warn!(sequence = mv.sequence, "results not acknowledged");
        }
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }

    fn game_over(&mut self) {
        self.game.on_game_over();
        self.games_completed += 1;
        info!(games = self.games_completed, "game over");
        self.state = State::Offering;
    }

    fn fatal(&mut self, e: ProtocolError) {
        error!(state = %self.state, sequence = self.sequence, error = %e, "fatal protocol error");
        match self.game.on_fatal_error(&e) {
            FatalAction::Remain => {}
            FatalAction::EndGame => self.state = State::GameOver,
            FatalAction::Restart => self.state = State::Offering,
        }
    }

    #[cfg(test)]
    pub(crate) fn force(&mut self, state: State, sequence: u16) {
        self.state = state;
        self.sequence = sequence;
    }
}

impl<Mv, Rs, H, T> Session<Handlers<Mv, Rs, H>, T>
where
    Mv: MoveHandler,
    Rs: ResultHandler<Mv::Payload>,
    H: SessionHooks,
    T: Transport,
{
    /// Build a session from separate move, result, and lifecycle handlers.
    pub fn from_parts(moves: Mv, results: Rs, hooks: H, transport: T, is_player_one: bool) -> Self {
        Self::new(
            Handlers {
                moves,
                results,
                hooks,
            },
            transport,
            is_player_one,
        )
    }
}
