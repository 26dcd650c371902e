//! Server-side resolution of a single game round.
//!
//! Every game is a pure function of the bet, its parameters and an RNG, so
//! callers seed the RNG to replay a round exactly.

use rand::Rng;
use rand::seq::{SliceRandom, index};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WalletError};
use crate::types::MONEY_SCALE;

const MINES_GRID_SIZE: u8 = 25;
const CRASH_HOUSE_EDGE: f64 = 0.05;
const CRASH_MAX_MULTIPLIER: f64 = 100.0;
const PLINKO_ROWS: usize = 16;
const BLACKJACK_STAND_ON: u8 = 17;

const WHEEL_SEGMENTS: [u32; 6] = [2, 3, 5, 10, 20, 50];

/// Plinko payout per sink, in tenths, indexed by how many times the ball went right
const PLINKO_MULTIPLIERS: [i64; PLINKO_ROWS + 1] = [
    160, 90, 20, 14, 14, 12, 11, 10, 5, 10, 11, 12, 14, 14, 20, 90, 160,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Blackjack,
    Dice,
    Mines,
    Crash,
    Craps,
    Wheel,
    Plinko,
}

impl Game {
    pub const ALL: [Game; 7] = [
        Game::Blackjack,
        Game::Dice,
        Game::Mines,
        Game::Crash,
        Game::Craps,
        Game::Wheel,
        Game::Plinko,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Blackjack => "blackjack",
            Self::Dice => "dice",
            Self::Mines => "mines",
            Self::Crash => "crash",
            Self::Craps => "craps",
            Self::Wheel => "wheel",
            Self::Plinko => "plinko",
        }
    }

    /// Capitalized name used in ledger labels
    pub fn title(&self) -> &'static str {
        match self {
            Self::Blackjack => "Blackjack",
            Self::Dice => "Dice",
            Self::Mines => "Mines",
            Self::Crash => "Crash",
            Self::Craps => "Craps",
            Self::Wheel => "Wheel",
            Self::Plinko => "Plinko",
        }
    }

    /// Pick the game out of a client result label such as `plinko_win` or `dice`.
    /// Anything after the first `_` is the client's own claim and is discarded.
    pub fn from_result_kind(kind: &str) -> Result<Self> {
        let prefix = kind.trim().split('_').next().unwrap_or_default();
        prefix
            .parse()
            .map_err(|_| WalletError::Validation(format!("Unknown game '{}'", kind.trim())))
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Game {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Game::ALL
            .into_iter()
            .find(|game| game.name() == lowered)
            .ok_or_else(|| format!("unknown game '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundResult {
    Win,
    Push,
    Loss,
}

impl RoundResult {
    fn from_multiplier(multiplier: Decimal) -> Self {
        match multiplier.cmp(&Decimal::ONE) {
            std::cmp::Ordering::Greater => Self::Win,
            std::cmp::Ordering::Equal => Self::Push,
            std::cmp::Ordering::Less => Self::Loss,
        }
    }
}

impl fmt::Display for RoundResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Win => "Win",
            Self::Push => "Push",
            Self::Loss => "Loss",
        })
    }
}

impl FromStr for RoundResult {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "win" => Ok(Self::Win),
            "push" => Ok(Self::Push),
            "loss" => Ok(Self::Loss),
            _ => Err(format!("unknown round result '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CrapsBet {
    #[default]
    Pass,
    #[serde(alias = "dont_pass")]
    DontPass,
}

/// Optional per-game knobs; each game reads only its own fields
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameParams {
    /// Dice: win if the roll is at or below this (1..=98)
    pub target: Option<u8>,
    /// Crash: cash out once the multiplier reaches this
    pub auto_cashout: Option<Decimal>,
    /// Mines: number of mines on the 5x5 grid
    pub mines: Option<u8>,
    /// Mines: number of tiles revealed before cashing out
    pub picks: Option<u8>,
    /// Craps: which line the bet is on
    pub bet_type: Option<CrapsBet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// 1 = ace, 11..=13 = jack, queen, king
    pub rank: u8,
    pub suit: char,
}

impl Card {
    fn points(&self) -> u8 {
        match self.rank {
            1 => 11,
            11..=13 => 10,
            r => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum RoundDetail {
    Blackjack {
        player: Vec<Card>,
        dealer: Vec<Card>,
        player_total: u8,
        dealer_total: u8,
    },
    Dice {
        roll: f64,
        target: u8,
    },
    Mines {
        mines: u8,
        revealed: Vec<u8>,
        mine_hit: Option<u8>,
    },
    Crash {
        crash_point: f64,
        #[serde(with = "rust_decimal::serde::float")]
        auto_cashout: Decimal,
    },
    Craps {
        bet_type: CrapsBet,
        rolls: Vec<(u8, u8)>,
        point: Option<u8>,
    },
    Wheel {
        segment: usize,
    },
    Plinko {
        sink: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundOutcome {
    pub game: Game,
    pub result: RoundResult,
    /// Total returned to the player per unit staked (0 = bet lost)
    #[serde(with = "rust_decimal::serde::float")]
    pub multiplier: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub payout: Decimal,
    pub detail: RoundDetail,
}

impl RoundOutcome {
    /// Change to the balance caused by this round
    pub fn net(&self, bet: Decimal) -> Decimal {
        self.payout - bet
    }
}

/// Resolve one round of `game` for a stake of `bet`.
pub fn play<R: Rng + ?Sized>(
    game: Game,
    bet: Decimal,
    params: &GameParams,
    rng: &mut R,
) -> Result<RoundOutcome> {
    if bet <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(bet));
    }

    let (multiplier, detail, result) = match game {
        Game::Blackjack => play_blackjack(rng),
        Game::Dice => play_dice(params, rng)?,
        Game::Mines => play_mines(params, rng)?,
        Game::Crash => play_crash(params, rng)?,
        Game::Craps => play_craps(params, rng),
        Game::Wheel => play_wheel(rng),
        Game::Plinko => play_plinko(rng),
    };

    let payout = bet.checked_mul(multiplier).ok_or_else(|| {
        WalletError::Validation(format!("Payout for a bet of {bet} is out of range"))
    })?;

    Ok(RoundOutcome {
        game,
        result,
        multiplier,
        payout: payout.round_dp(MONEY_SCALE),
        detail,
    })
}

type Resolved = (Decimal, RoundDetail, RoundResult);

fn win_or_loss(won: bool, multiplier: Decimal) -> (Decimal, RoundResult) {
    if won {
        (multiplier, RoundResult::Win)
    } else {
        (Decimal::ZERO, RoundResult::Loss)
    }
}

fn play_dice<R: Rng + ?Sized>(params: &GameParams, rng: &mut R) -> Result<Resolved> {
    let target = params.target.unwrap_or(50);
    if !(1..=98).contains(&target) {
        return Err(WalletError::Validation(format!(
            "Dice target must be between 1 and 98, got {target}"
        )));
    }

    let roll = rng.gen_range(0.0..100.0);
    let (multiplier, result) = win_or_loss(
        roll <= f64::from(target),
        (Decimal::ONE_HUNDRED / Decimal::from(target)).round_dp(4),
    );
    Ok((multiplier, RoundDetail::Dice { roll, target }, result))
}

fn play_wheel<R: Rng + ?Sized>(rng: &mut R) -> Resolved {
    let segment = rng.gen_range(0..WHEEL_SEGMENTS.len());
    (
        Decimal::from(WHEEL_SEGMENTS[segment]),
        RoundDetail::Wheel { segment },
        RoundResult::Win,
    )
}

fn crash_point(u: f64) -> f64 {
    ((1.0 / (1.0 - u)) * (1.0 - CRASH_HOUSE_EDGE)).clamp(1.0, CRASH_MAX_MULTIPLIER)
}

fn play_crash<R: Rng + ?Sized>(params: &GameParams, rng: &mut R) -> Result<Resolved> {
    let auto_cashout = params.auto_cashout.unwrap_or(Decimal::TWO);
    if auto_cashout < Decimal::new(101, 2) {
        return Err(WalletError::Validation(format!(
            "Crash auto cashout must be at least 1.01, got {auto_cashout}"
        )));
    }

    let crash_point = crash_point(rng.gen_range(0.0..1.0));
    let target = auto_cashout.to_f64().unwrap_or(f64::MAX);
    let (multiplier, result) = win_or_loss(target < crash_point, auto_cashout);
    Ok((
        multiplier,
        RoundDetail::Crash {
            crash_point,
            auto_cashout,
        },
        result,
    ))
}

fn play_mines<R: Rng + ?Sized>(params: &GameParams, rng: &mut R) -> Result<Resolved> {
    let mines = params.mines.unwrap_or(5);
    if !(1..MINES_GRID_SIZE).contains(&mines) {
        return Err(WalletError::Validation(format!(
            "Mines must be between 1 and {}, got {mines}",
            MINES_GRID_SIZE - 1
        )));
    }
    let safe_tiles = MINES_GRID_SIZE - mines;
    let picks = params.picks.unwrap_or(1);
    if !(1..=safe_tiles).contains(&picks) {
        return Err(WalletError::Validation(format!(
            "Picks must be between 1 and {safe_tiles}, got {picks}"
        )));
    }

    let mut board = [false; MINES_GRID_SIZE as usize];
    for tile in index::sample(rng, board.len(), mines as usize) {
        board[tile] = true;
    }

    let mut revealed = Vec::with_capacity(picks as usize);
    let mut mine_hit = None;
    for tile in index::sample(rng, board.len(), picks as usize) {
        revealed.push(tile as u8);
        if board[tile] {
            mine_hit = Some(tile as u8);
            break;
        }
    }

    let payout = Decimal::ONE + (Decimal::from(mines) / Decimal::from(safe_tiles)).round_dp(4);
    let (multiplier, result) = win_or_loss(mine_hit.is_none(), payout);
    Ok((
        multiplier,
        RoundDetail::Mines {
            mines,
            revealed,
            mine_hit,
        },
        result,
    ))
}

fn play_plinko<R: Rng + ?Sized>(rng: &mut R) -> Resolved {
    let sink = (0..PLINKO_ROWS).filter(|_| rng.gen_bool(0.5)).count();
    let multiplier = Decimal::new(PLINKO_MULTIPLIERS[sink], 1);
    (
        multiplier,
        RoundDetail::Plinko { sink },
        RoundResult::from_multiplier(multiplier),
    )
}

fn hand_total(hand: &[Card]) -> u8 {
    let mut total: u8 = hand.iter().map(Card::points).sum();
    let mut soft_aces = hand.iter().filter(|card| card.rank == 1).count();
    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    total
}

fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck: Vec<Card> = ['♠', '♥', '♦', '♣']
        .into_iter()
        .flat_map(|suit| (1..=13).map(move |rank| Card { rank, suit }))
        .collect();
    deck.shuffle(rng);
    deck
}

fn play_blackjack<R: Rng + ?Sized>(rng: &mut R) -> Resolved {
    // 52 cards always cover two hands that stop drawing at 17
    let mut deck = shuffled_deck(rng).into_iter();
    let mut draw = || deck.next().unwrap_or(Card { rank: 10, suit: '♠' });

    let mut player = vec![draw(), draw()];
    let mut dealer = vec![draw(), draw()];

    while hand_total(&player) < BLACKJACK_STAND_ON {
        player.push(draw());
    }
    let player_total = hand_total(&player);

    if player_total <= 21 {
        while hand_total(&dealer) < BLACKJACK_STAND_ON {
            dealer.push(draw());
        }
    }
    let dealer_total = hand_total(&dealer);

    let (multiplier, result) = if player_total > 21 {
        (Decimal::ZERO, RoundResult::Loss)
    } else if dealer_total > 21 || player_total > dealer_total {
        (Decimal::TWO, RoundResult::Win)
    } else if player_total == dealer_total {
        (Decimal::ONE, RoundResult::Push)
    } else {
        (Decimal::ZERO, RoundResult::Loss)
    };

    (
        multiplier,
        RoundDetail::Blackjack {
            player,
            dealer,
            player_total,
            dealer_total,
        },
        result,
    )
}

fn roll_pair<R: Rng + ?Sized>(rng: &mut R) -> (u8, u8) {
    (rng.gen_range(1..=6), rng.gen_range(1..=6))
}

fn play_craps<R: Rng + ?Sized>(params: &GameParams, rng: &mut R) -> Resolved {
    let bet_type = params.bet_type.unwrap_or_default();
    let mut rolls = vec![roll_pair(rng)];
    let come_out = rolls[0].0 + rolls[0].1;

    let (pass_wins, point) = match come_out {
        7 | 11 => (true, None),
        2 | 3 | 12 => (false, None),
        point => loop {
            let (a, b) = roll_pair(rng);
            rolls.push((a, b));
            match a + b {
                total if total == point => break (true, Some(point)),
                7 => break (false, Some(point)),
                _ => {}
            }
        },
    };

    let won = match bet_type {
        CrapsBet::Pass => pass_wins,
        CrapsBet::DontPass => !pass_wins,
    };
    let (multiplier, result) = win_or_loss(won, Decimal::TWO);
    (
        multiplier,
        RoundDetail::Craps {
            bet_type,
            rolls,
            point,
        },
        result,
    )
}
