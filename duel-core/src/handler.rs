//! Game-supplied capabilities the session invokes at defined points.
//!
//! A game implements all three traits on one type (the usual case, since moves and results
//! share board state), or bundles separate objects with [`Handlers`].

use crate::protocol::{Move, Outcome, Payload};
use crate::session::ProtocolError;

/// Decides this player's moves.
pub trait MoveHandler {
    type Payload: Payload;

    /// Fill in `mv` (kind and payload). The session has already set `mv.sequence`; the only
    /// permitted change to it is 0 on the first move of a game (bootstrap pass).
    fn decide_move(&mut self, mv: &mut Move<Self::Payload>);
}

/// Judges the opponent's moves and reacts to answers to our own.
pub trait ResultHandler<M> {
    type Payload: Payload;

    /// React to an opponent's move. The session stamps the outcome with the move's sequence.
    /// Return an error for a move kind the game does not handle.
    fn generate_results(&mut self, mv: &Move<M>) -> Result<Judgement<Self::Payload>, ProtocolError>;

    /// React to the answer to our own move. Returns true if the game ended.
    fn process_results(&mut self, outcome: &Outcome<Self::Payload>) -> Result<bool, ProtocolError>;
}

/// Answer to an opponent's move.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement<P> {
    pub outcome: Outcome<P>,
    pub game_ended: bool,
}

impl<P> Judgement<P> {
    pub fn continues(outcome: Outcome<P>) -> Self {
        Self {
            outcome,
            game_ended: false,
        }
    }

    pub fn ends(outcome: Outcome<P>) -> Self {
        Self {
            outcome,
            game_ended: true,
        }
    }
}

/// What the session does after reporting a fatal protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalAction {
    /// Stay in the state where the error happened.
    #[default]
    Remain,
    /// Enter GAME_OVER (which calls `on_game_over`, then offers again).
    EndGame,
    /// Drop the game and go straight back to offering.
    Restart,
}

/// Session lifecycle callbacks.
pub trait SessionHooks {
    /// Offering side only: true if the offering side moves first.
    fn coin_flip(&mut self) -> bool {
        rand::random()
    }

    fn on_game_over(&mut self);

    /// Called once per fatal condition; the current transition has already been abandoned.
    fn on_fatal_error(&mut self, error: &ProtocolError) -> FatalAction;

    /// Accepting side: the offering side's coin flip.
    fn on_flip_result(&mut self, _offerer_first: bool) {}

    /// Accepting side: the offering side confirmed the game.
    fn on_game_found(&mut self) {}
}

/// Separate move, result, and lifecycle objects acting as one capability set.
#[derive(Debug, Clone, Default)]
pub struct Handlers<Mv, Rs, H> {
    pub moves: Mv,
    pub results: Rs,
    pub hooks: H,
}

impl<Mv: MoveHandler, Rs, H> MoveHandler for Handlers<Mv, Rs, H> {
    type Payload = Mv::Payload;

    fn decide_move(&mut self, mv: &mut Move<Self::Payload>) {
        self.moves.decide_move(mv)
    }
}

impl<M, Mv, Rs: ResultHandler<M>, H> ResultHandler<M> for Handlers<Mv, Rs, H> {
    type Payload = Rs::Payload;

    fn generate_results(&mut self, mv: &Move<M>) -> Result<Judgement<Self::Payload>, ProtocolError> {
        self.results.generate_results(mv)
    }

    fn process_results(&mut self, outcome: &Outcome<Self::Payload>) -> Result<bool, ProtocolError> {
        self.results.process_results(outcome)
    }
}

impl<Mv, Rs, H: SessionHooks> SessionHooks for Handlers<Mv, Rs, H> {
    fn coin_flip(&mut self) -> bool {
        self.hooks.coin_flip()
    }
    fn on_game_over(&mut self) {
        self.hooks.on_game_over()
    }
    fn on_fatal_error(&mut self, error: &ProtocolError) -> FatalAction {
        self.hooks.on_fatal_error(error)
    }
    fn on_flip_result(&mut self, offerer_first: bool) {
        self.hooks.on_flip_result(offerer_first)
    }
    fn on_game_found(&mut self) {
        self.hooks.on_game_found()
    }
}
