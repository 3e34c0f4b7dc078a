//! Leduc hold'em, no-raise variant.
//!
//! Six-card deck (two each of Jack, Queen, King). Both players ante 1 and
//! receive one private card; a betting round with a fixed bet of 2 follows,
//! then one public flop card, then a second round with a bet of 4. At most
//! one bet per round (no raises). At showdown a pair with the flop beats any
//! unpaired card; otherwise the higher rank wins.

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
            _ => panic!("invalid Leduc action code: {}", code),
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

/// Per-player view masks: own card visible, opponent's hidden, everything
/// else (betting and the flop) public.
const MASKS: [u64; 3] = [!0b111_000, !0b111, !0];

/// Acting party by ply; the row is selected on whether P2 bet at ply 3
/// (which inserts P1's reply before the flop).
const PLAYERS_BY_PLY: [[Player; 10]; 2] = [
    [
        Player::Chance,
        Player::Chance,
        Player::P1,
        Player::P2,
        Player::Chance,
        Player::P1,
        Player::P2,
        Player::P1,
        Player::P2,
        Player::P1,
    ],
    [
        Player::Chance,
        Player::Chance,
        Player::P1,
        Player::P2,
        Player::P1,
        Player::Chance,
        Player::P1,
        Player::P2,
        Player::P1,
        Player::P2,
    ],
];

const BET_SIZES: [i32; 2] = [2, 4];

#[derive(Debug, Default, Clone)]
pub struct LeducNoRaise {
    history: u64,
    plies: u32,
}

impl LeducNoRaise {
    fn action_at(&self, ply: u32) -> Action {
        Action::from_code((self.history >> (3 * ply)) & 0b111)
    }

    fn decode(state: u64, ply: u32) -> Action {
        Action::from_code((state >> (3 * ply)) & 0b111)
    }

    fn row(&self) -> usize {
        (self.plies > 3 && self.action_at(3) == Action::Bet) as usize
    }

    /// Copies of each rank still in the deck after the cards dealt so far.
    fn remaining_counts(&self) -> [u32; 3] {
        let mut counts = [2u32; 3];
        for ply in 0..self.plies {
            let a = self.action_at(ply);
            if a.is_card() {
                counts[a.rank() as usize] -= 1;
            }
        }
        counts
    }

    /// Showdown strength: pairing the flop dominates rank.
    fn strength(card: Action, flop: Action) -> i32 {
        if card == flop {
            100 + card.rank()
        } else {
            card.rank()
        }
    }
}

impl Game for LeducNoRaise {
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
        PLAYERS_BY_PLY[self.row()][self.plies.min(9) as usize]
    }

    fn is_over(&self) -> bool {
        if self.plies <= 2 {
            return false;
        }
        let last = self.action_at(self.plies - 1);
        if last == Action::Fold {
            return true;
        }
        let before_last = self.action_at(self.plies - 2);
        self.plies >= 7
            && !before_last.is_card()
            && (last == Action::Check || last == Action::Call)
    }

    fn actions(&self, out: &mut ActionList<Action>) {
        if self.is_chance() {
            let counts = self.remaining_counts();
            for card in CARDS {
                if counts[card.rank() as usize] > 0 {
                    out.push(card);
                }
            }
        } else if self.action_at(self.plies - 1) == Action::Bet {
            out.push(Action::Fold);
            out.push(Action::Call);
        } else {
            out.push(Action::Check);
            out.push(Action::Bet);
        }
    }

    fn chance_weights(&self, out: &mut ActionList<u32>) {
        debug_assert!(self.is_chance());
        let counts = self.remaining_counts();
        for card in CARDS {
            if counts[card.rank() as usize] > 0 {
                out.push(counts[card.rank() as usize]);
            }
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
        let c1 = self.action_at(0);
        let c2 = self.action_at(1);
        let row = self.row();

        // replay the betting to find the pot contributions and any fold
        let mut contrib = [1i32; 2];
        let mut round = 0;
        let mut flop = Action::Check;
        let mut folder = None;
        for ply in 2..self.plies {
            let action = self.action_at(ply);
            match PLAYERS_BY_PLY[row][ply as usize] {
                Player::Chance => {
                    flop = action;
                    round = 1;
                }
                actor => {
                    let actor = actor as usize;
                    match action {
                        Action::Bet => contrib[actor] += BET_SIZES[round],
                        Action::Call => contrib[actor] = contrib[actor ^ 1],
                        Action::Fold => folder = Some(actor),
                        Action::Check => {}
                        a => panic!("invalid betting action: {:?}", a),
                    }
                }
            }
        }

        let p1 = match folder {
            Some(0) => -contrib[0],
            Some(_) => contrib[1],
            None => {
                debug_assert!(flop.is_card());
                let s1 = Self::strength(c1, flop);
                let s2 = Self::strength(c2, flop);
                if s1 > s2 {
                    contrib[1]
                } else if s1 < s2 {
                    -contrib[0]
                } else {
                    0
                }
            }
        };
        if player == Player::P1 {
            p1
        } else {
            -p1
        }
    }

    fn info_sets_and_actions(state: u64, player: Player) -> Vec<(u64, Action)> {
        let plies = (state >> 32) as u32;
        let mut game = LeducNoRaise::default();
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
        let c1 = Self::decode(state, 0);
        let c2 = Self::decode(state, 1);
        debug_assert!(c1.is_card() && c2.is_card());
        let mut proba = (1.0 / 3.0) * if c1 == c2 { 1.0 / 5.0 } else { 2.0 / 5.0 };
        let plies = (state >> 32) as u32;
        for ply in 2..plies {
            let a = Self::decode(state, ply);
            if a.is_card() {
                proba *= if c1 == c2 {
                    0.5
                } else if a != c1 && a != c2 {
                    0.5
                } else {
                    0.25
                };
                break;
            }
        }
        proba
    }
}
