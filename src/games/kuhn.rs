//! Kuhn poker with the standard 3-card deck.
//!
//! Two chance plies deal one card to each player (ante 1), then one betting
//! round with a single bet size of 1: P1 checks or bets; facing a check P2
//! may check or bet, facing a bet the opponent folds or calls. Showdowns pay
//! the pot to the higher card. The equilibrium value for P1 is -1/18.

use crate::game::{ActionList, Game, Player};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    Check = 0,
    Bet = 1,
    Call = 2,
    Fold = 3,
    Jack = 4,
    Queen = 5,
    King = 6,
}

impl Action {
    fn from_code(code: u64) -> Action {
        match code {
            0 => Action::Check,
            1 => Action::Bet,
            2 => Action::Call,
            3 => Action::Fold,
            4 => Action::Jack,
            5 => Action::Queen,
            6 => Action::King,
            _ => panic!("invalid Kuhn action code: {}", code),
        }
    }

    fn is_card(self) -> bool {
        matches!(self, Action::Jack | Action::Queen | Action::King)
    }

    fn rank(self) -> i32 {
        debug_assert!(self.is_card());
        self as i32 - Action::Jack as i32
    }
}

const CARDS: [Action; 3] = [Action::Jack, Action::Queen, Action::King];

/// Per-player view masks over the packed history: each player's own card is
/// visible, the opponent's is not, the betting is public.
const MASKS: [u64; 3] = [!0b111_000, !0b111, !0];

const PLAYERS_BY_PLY: [Player; 5] =
    [Player::Chance, Player::Chance, Player::P1, Player::P2, Player::P1];

#[derive(Debug, Default, Clone)]
pub struct Kuhn {
    history: u64,
    plies: u32,
}

impl Kuhn {
    fn action_at(&self, ply: u32) -> Action {
        Action::from_code((self.history >> (3 * ply)) & 0b111)
    }

    fn decode(state: u64, ply: u32) -> Action {
        Action::from_code((state >> (3 * ply)) & 0b111)
    }
}

impl Game for Kuhn {
    type Action = Action;
    type State = u64;
    type InfoSet = u64;

    const MAX_PLAYER_ACTIONS: usize = 2;
    const MAX_CHANCE_ACTIONS: usize = 3;

    fn reset(&mut self) {
        self.history = 0;
        self.plies = 0;
    }

    fn state(&self) -> u64 {
        (self.plies as u64) << 32 | self.history
    }

    fn set_state(&mut self, state: u64) {
        self.plies = (state >> 32) as u32;
        self.history = state & 0xFFFF_FFFF;
    }

    fn info_set(&self, player: Player) -> u64 {
        (self.plies as u64) << 32 | (self.history & MASKS[player as usize])
    }

    fn current_player(&self) -> Player {
        PLAYERS_BY_PLY[self.plies.min(4) as usize]
    }

    fn is_over(&self) -> bool {
        if self.plies < 4 {
            return false;
        }
        let last = self.action_at(self.plies - 1);
        last != Action::Bet
    }

    fn actions(&self, out: &mut ActionList<Action>) {
        match self.plies {
            0 => {
                for card in CARDS {
                    out.push(card);
                }
            }
            1 => {
                let dealt = self.action_at(0);
                for card in CARDS {
                    if card != dealt {
                        out.push(card);
                    }
                }
            }
            2 => {
                out.push(Action::Check);
                out.push(Action::Bet);
            }
            _ => {
                if self.action_at(self.plies - 1) == Action::Bet {
                    out.push(Action::Fold);
                    out.push(Action::Call);
                } else {
                    out.push(Action::Check);
                    out.push(Action::Bet);
                }
            }
        }
    }

    fn chance_weights(&self, out: &mut ActionList<u32>) {
        debug_assert!(self.plies < 2);
        let remaining = if self.plies == 0 { 3 } else { 2 };
        for _ in 0..remaining {
            out.push(1);
        }
    }

    fn play(&mut self, action: Action) {
        self.history |= (action as u64) << (3 * self.plies);
        self.plies += 1;
    }

    fn undo(&mut self, _action: Action) {
        self.plies -= 1;
        self.history &= !(0b111 << (3 * self.plies));
    }

    fn payoff(&self, player: Player) -> i32 {
        debug_assert!(self.is_over());
        let c1 = self.action_at(0).rank();
        let c2 = self.action_at(1).rank();
        let showdown = |stake: i32| if c1 > c2 { stake } else { -stake };
        let p1 = match (self.action_at(2), self.action_at(3)) {
            (Action::Check, Action::Check) => showdown(1),
            (Action::Bet, Action::Fold) => 1,
            (Action::Bet, Action::Call) => showdown(2),
            (Action::Check, Action::Bet) => match self.action_at(4) {
                Action::Fold => -1,
                Action::Call => showdown(2),
                a => panic!("invalid reply to a bet: {:?}", a),
            },
            (a, b) => panic!("invalid betting line: {:?}, {:?}", a, b),
        };
        if player == Player::P1 {
            p1
        } else {
            -p1
        }
    }

    fn info_sets_and_actions(state: u64, player: Player) -> Vec<(u64, Action)> {
        let plies = (state >> 32) as u32;
        let mut game = Kuhn::default();
        let mut pairs = Vec::new();
        for ply in 0..plies {
            let action = Self::decode(state, ply);
            if game.current_player() == player {
                pairs.push((game.info_set(player), action));
            }
            game.play(action);
        }
        pairs
    }

    fn chance_reach_proba(state: u64) -> f64 {
        debug_assert!((state >> 32) >= 2, "cards not dealt yet");
        // first deal is uniform over 3 cards, the second over the 2 left
        1.0 / 6.0
    }
}
