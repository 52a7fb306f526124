//! Nim demo game: players alternately take 1 to 3 from a shared pile; whoever takes the last
//! one wins. The receiver of each move owns the rules check and reports the pile back.

use duel_core::{
    FatalAction, Judgement, Move, MoveHandler, MoveKind, Outcome, OutcomeKind, ProtocolError,
    ResultHandler, SessionHooks,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const MAX_TAKE: u8 = 3;

/// Move payload: how many to take from the pile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Take {
    pub count: u8,
}

/// Result payload: the pile after the move was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PileReport {
    pub remaining: u8,
}

#[derive(Debug)]
pub struct Nim {
    start: u8,
    pile: u8,
    wins: u32,
    losses: u32,
    rng: StdRng,
}

impl Nim {
    pub fn new(pile: u8) -> Self {
        Self::with_rng(pile, StdRng::from_entropy())
    }

    pub fn with_rng(pile: u8, rng: StdRng) -> Self {
        Self {
            start: pile,
            pile,
            wins: 0,
            losses: 0,
            rng,
        }
    }

    pub fn pile(&self) -> u8 {
        self.pile
    }

    pub fn wins(&self) -> u32 {
        self.wins
    }

    pub fn losses(&self) -> u32 {
        self.losses
    }

    /// Leave a multiple of four when possible; otherwise take a random legal amount.
    fn choose(&mut self) -> u8 {
        let limit = MAX_TAKE.min(self.pile).max(1);
        match self.pile % (MAX_TAKE + 1) {
            0 => self.rng.gen_range(1..=limit),
            n => n,
        }
    }

    fn report(&self, kind: OutcomeKind) -> Outcome<PileReport> {
        Outcome::new(
            kind,
            PileReport {
                remaining: self.pile,
            },
        )
    }
}

impl MoveHandler for Nim {
    type Payload = Take;

    fn decide_move(&mut self, mv: &mut Move<Take>) {
        mv.kind = MoveKind::Normal;
        mv.payload = Take {
            count: self.choose(),
        };
        info!(take = mv.payload.count, pile = self.pile, "my move");
    }
}

impl ResultHandler<Take> for Nim {
    type Payload = PileReport;

    fn generate_results(&mut self, mv: &Move<Take>) -> Result<Judgement<PileReport>, ProtocolError> {
        match mv.kind {
            MoveKind::Quit => {
                self.wins += 1;
                Ok(Judgement::ends(self.report(OutcomeKind::Lose)))
            }
            MoveKind::Pass => Ok(Judgement::continues(self.report(OutcomeKind::Normal))),
            MoveKind::Normal => {
                let count = mv.payload.count;
                if count == 0 || count > MAX_TAKE || count > self.pile {
                    return Err(ProtocolError::Rejected(format!(
                        "cannot take {count} from a pile of {}",
                        self.pile
                    )));
                }
                self.pile -= count;
                info!(take = count, pile = self.pile, "opponent moved");
                if self.pile == 0 {
                    self.losses += 1;
                    Ok(Judgement::ends(self.report(OutcomeKind::Win)))
                } else {
                    Ok(Judgement::continues(self.report(OutcomeKind::Normal)))
                }
            }
        }
    }

    fn process_results(&mut self, outcome: &Outcome<PileReport>) -> Result<bool, ProtocolError> {
        match outcome.kind {
            OutcomeKind::Normal => {
                self.pile = outcome.payload.remaining;
                Ok(false)
            }
            OutcomeKind::Win => {
                self.pile = 0;
                self.wins += 1;
                Ok(true)
            }
            OutcomeKind::Lose => {
                self.losses += 1;
                Ok(true)
            }
            other => Err(ProtocolError::UnhandledOutcome(other)),
        }
    }
}

impl SessionHooks for Nim {
    fn on_game_over(&mut self) {
        info!(wins = self.wins, losses = self.losses, "game over");
        self.pile = self.start;
    }

    fn on_fatal_error(&mut self, error: &ProtocolError) -> FatalAction {
        warn!(%error, "abandoning game");
        self.pile = self.start;
        FatalAction::Restart
    }

    fn on_flip_result(&mut self, offerer_first: bool) {
        info!(offerer_first, "coin flipped");
    }

    fn on_game_found(&mut self) {
        info!(pile = self.start, "game found");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_core::{MemoryLink, Session, State};

    fn nim(pile: u8) -> Nim {
        Nim::with_rng(pile, StdRng::seed_from_u64(7))
    }

    fn take(count: u8) -> Move<Take> {
        Move::new(1, MoveKind::Normal, Take { count })
    }

    #[test]
    fn strategy_leaves_multiple_of_four() {
        let mut g = nim(10);
        let mut mv = Move::default();
        g.decide_move(&mut mv);
        assert_eq!(mv.payload.count, 2);
        g.pile = 3;
        g.decide_move(&mut mv);
        assert_eq!(mv.payload.count, 3);
    }

    #[test]
    fn losing_position_takes_legal_amount() {
        let mut g = nim(8);
        for _ in 0..50 {
            let mut mv = Move::default();
            g.decide_move(&mut mv);
            assert!((1..=MAX_TAKE).contains(&mv.payload.count));
        }
    }

    #[test]
    fn taking_last_one_wins_for_mover() {
        let mut g = nim(2);
        let j = g.generate_results(&take(2)).unwrap();
        assert!(j.game_ended);
        assert_eq!(j.outcome.kind, OutcomeKind::Win);
        assert_eq!(j.outcome.payload.remaining, 0);
        assert_eq!(g.losses(), 1);
    }

    #[test]
    fn normal_move_reports_pile() {
        let mut g = nim(21);
        let j = g.generate_results(&take(3)).unwrap();
        assert!(!j.game_ended);
        assert_eq!(j.outcome.payload.remaining, 18);
    }

    #[test]
    fn illegal_take_rejected() {
        let mut g = nim(2);
        for count in [0, 3, 4] {
            assert!(matches!(
                g.generate_results(&take(count)),
                Err(ProtocolError::Rejected(_))
            ));
        }
        assert_eq!(g.pile(), 2);
    }

    #[test]
    fn quit_and_pass() {
        let mut g = nim(9);
        let pass = g
            .generate_results(&Move::new(1, MoveKind::Pass, Take::default()))
            .unwrap();
        assert!(!pass.game_ended);
        assert_eq!(pass.outcome.payload.remaining, 9);
        let quit = g
            .generate_results(&Move::new(2, MoveKind::Quit, Take::default()))
            .unwrap();
        assert!(quit.game_ended);
        assert_eq!(quit.outcome.kind, OutcomeKind::Lose);
        assert_eq!(g.wins(), 1);
    }

    #[test]
    fn answers_update_mover() {
        let mut g = nim(21);
        let ended = g
            .process_results(&Outcome::new(OutcomeKind::Normal, PileReport { remaining: 17 }))
            .unwrap();
        assert!(!ended);
        assert_eq!(g.pile(), 17);
        assert!(g
            .process_results(&Outcome::new(OutcomeKind::Win, PileReport::default()))
            .unwrap());
        assert_eq!(g.wins(), 1);
        assert_eq!(
            g.process_results(&Outcome::new(OutcomeKind::Hit, PileReport::default())),
            Err(ProtocolError::UnhandledOutcome(OutcomeKind::Hit))
        );
    }

    #[test]
    fn game_over_and_fatal_reset_pile() {
        let mut g = nim(21);
        g.pile = 4;
        g.on_game_over();
        assert_eq!(g.pile(), 21);
        g.pile = 4;
        assert_eq!(
            g.on_fatal_error(&ProtocolError::Rejected("x".into())),
            FatalAction::Restart
        );
        assert_eq!(g.pile(), 21);
    }

    #[test]
    fn full_game_over_memory_link() {
        let (a, b) = MemoryLink::pair(60);
        let seeker = std::thread::spawn(move || {
            let mut s = Session::new(nim(21), b, false);
            s.start().unwrap();
            s.seek();
            while s.games_completed() == 0 {
                s.step();
            }
            s.into_parts().0
        });
        let mut s = Session::new(Nim::with_rng(21, StdRng::seed_from_u64(11)), a, true);
        s.start().unwrap();
        while s.games_completed() == 0 {
            s.step();
        }
        assert_eq!(s.state(), State::Offering);
        let offerer = s.into_parts().0;
        let seeker = seeker.join().unwrap();
        assert_eq!(offerer.wins() + seeker.wins(), 1);
        assert_eq!(offerer.losses() + seeker.losses(), 1);
        assert_eq!(offerer.wins(), seeker.losses());
        assert_eq!(offerer.pile(), 21);
        assert_eq!(seeker.pile(), 21);
    }
}
