use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::error::{Result, WalletError};
use crate::games::{self, Game, GameParams, RoundOutcome, RoundResult};
use crate::store::AccountStore;
use crate::types::{Account, MAX_AMOUNT, MONEY_SCALE, Transaction, TransactionKind, UserId};

/// Result of a single balance change
#[derive(Debug, Clone)]
pub struct Receipt {
    pub balance: Decimal,
    pub transaction: Transaction,
}

/// Result of settling a game round against the wallet
#[derive(Debug, Clone)]
pub struct Settlement {
    pub balance: Decimal,
    pub transaction: Transaction,
    pub outcome: RoundOutcome,
}

/// A client's request to play and settle one round
#[derive(Debug, Clone, Default)]
pub struct GameRequest {
    /// Game label as sent by the client, e.g. `dice` or `plinko_win`
    pub result_kind: String,
    pub bet_amount: Decimal,
    /// What the client believes the balance will be; never applied
    pub client_balance: Option<Decimal>,
    pub params: GameParams,
}

#[derive(Clone)]
pub struct WalletService {
    store: Arc<dyn AccountStore>,
    max_retries: usize,
}

/// Amounts must be positive, at most `MAX_AMOUNT`, and carry no more than two decimal places
fn check_amount(amount: Decimal) -> Result<Decimal> {
    let amount = amount.normalize();
    if amount <= Decimal::ZERO || amount > MAX_AMOUNT || amount.scale() > MONEY_SCALE {
        return Err(WalletError::InvalidAmount(amount));
    }
    Ok(amount)
}

fn balance_overflow(user_id: &UserId) -> WalletError {
    WalletError::Validation(format!("balance of account {user_id} would exceed the supported range"))
}

impl WalletService {
    pub fn new(store: Arc<dyn AccountStore>, config: &WalletConfig) -> Self {
        Self {
            store,
            max_retries: config.max_retries.max(1),
        }
    }

    pub fn account(&self, user_id: &UserId) -> Result<Account> {
        self.store
            .get_account(user_id)?
            .ok_or_else(|| WalletError::AccountNotFound(user_id.to_string()))
    }

    pub fn get_balance(&self, user_id: &UserId) -> Result<Decimal> {
        Ok(self.account(user_id)?.amount)
    }

    /// Full ledger in insertion order
    pub fn transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>> {
        Ok(self.account(user_id)?.transactions)
    }

    pub fn deposit(&self, user_id: &UserId, amount: Decimal) -> Result<Receipt> {
        let amount = check_amount(amount)?;
        let receipt = self.mutate(user_id, |account| {
            let balance = account
                .amount
                .checked_add(amount)
                .ok_or_else(|| balance_overflow(user_id))?;
            Ok(account
                .record(TransactionKind::Deposit, amount, balance)
                .clone())
        })?;
        info!(user_id = %user_id, amount = %amount, balance = %receipt.balance, "Deposit applied");
        Ok(receipt)
    }

    pub fn withdraw(&self, user_id: &UserId, amount: Decimal) -> Result<Receipt> {
        let amount = check_amount(amount)?;
        let receipt = self.mutate(user_id, |account| {
            if amount > account.amount {
                return Err(WalletError::InsufficientBalance {
                    requested: amount,
                    available: account.amount,
                });
            }
            let balance = account.amount - amount;
            Ok(account
                .record(TransactionKind::Withdrawal, amount, balance)
                .clone())
        })?;
        info!(user_id = %user_id, amount = %amount, balance = %receipt.balance, "Withdrawal applied");
        Ok(receipt)
    }

    /// Play a round server-side and settle it; the client's balance is ignored
    pub fn apply_game_result(&self, user_id: &UserId, request: &GameRequest) -> Result<Settlement> {
        self.apply_game_result_with_rng(user_id, request, &mut rand::thread_rng())
    }

    pub fn apply_game_result_with_rng<R: Rng + ?Sized>(
        &self,
        user_id: &UserId,
        request: &GameRequest,
        rng: &mut R,
    ) -> Result<Settlement> {
        if let Some(claimed) = request.client_balance {
            if claimed < Decimal::ZERO {
                return Err(WalletError::Validation("invalid balance".to_string()));
            }
        }
        let game = Game::from_result_kind(&request.result_kind)?;
        let bet = check_amount(request.bet_amount)?;

        let available = self.get_balance(user_id)?;
        if bet > available {
            return Err(WalletError::InsufficientBalance {
                requested: bet,
                available,
            });
        }

        // Resolved once, outside the write loop, so a retried write settles the same round
        let outcome = games::play(game, bet, &request.params, rng)?;

        let receipt = self.mutate(user_id, |account| {
            if bet > account.amount {
                return Err(WalletError::InsufficientBalance {
                    requested: bet,
                    available: account.amount,
                });
            }
            let balance = account
                .amount
                .checked_add(outcome.net(bet))
                .ok_or_else(|| balance_overflow(user_id))?;
            let moved = match outcome.result {
                RoundResult::Win | RoundResult::Push => outcome.payout,
                RoundResult::Loss => bet,
            };
            let kind = TransactionKind::GameResult {
                game,
                result: outcome.result,
            };
            Ok(account.record(kind, moved, balance).clone())
        })?;

        if let Some(claimed) = request.client_balance {
            if claimed != receipt.balance {
                warn!(
                    user_id = %user_id,
                    claimed = %claimed,
                    balance = %receipt.balance,
                    "Client balance disagrees with settled balance"
                );
            }
        }
        info!(
            user_id = %user_id,
            game = %game,
            bet = %bet,
            payout = %outcome.payout,
            balance = %receipt.balance,
            "Game round settled"
        );

        Ok(Settlement {
            balance: receipt.balance,
            transaction: receipt.transaction,
            outcome,
        })
    }

    /// Read-modify-write of one account, retried on concurrent modification
    fn mutate<F>(&self, user_id: &UserId, mut apply: F) -> Result<Receipt>
    where
        F: FnMut(&mut Account) -> Result<Transaction>,
    {
        for attempt in 1..=self.max_retries {
            let mut account = self.account(user_id)?;
            let expected_version = account.version;
            let transaction = apply(&mut account)?;
            account.version += 1;

            match self.store.compare_and_swap(&account, expected_version) {
                Ok(()) => {
                    return Ok(Receipt {
                        balance: account.amount,
                        transaction,
                    });
                }
                Err(WalletError::VersionConflict(_)) => {
                    debug!(user_id = %user_id, attempt, "Balance write conflicted, retrying");
                    std::thread::yield_now();
                }
                Err(e) => return Err(e),
            }
        }

        warn!(user_id = %user_id, retries = self.max_retries, "Balance write abandoned under contention");
        Err(WalletError::Store(format!(
            "account {user_id} is too busy, try again"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, NewUser};
    use crate::store::InMemoryStore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::thread;

    fn setup() -> (WalletService, UserId) {
        let store: Arc<dyn AccountStore> = Arc::new(InMemoryStore::new());
        let config = WalletConfig::new("test-secret");
        let auth = AuthService::new(store.clone(), &config);
        auth.signup(NewUser {
            username: "player@example.com".to_string(),
            password: "password1".to_string(),
            first_name: "Pat".to_string(),
            last_name: "Player".to_string(),
        })
        .unwrap();
        (
            WalletService::new(store, &config),
            UserId::from_username("player@example.com"),
        )
    }

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_balance_of_unknown_account() {
        let (wallet, _) = setup();
        let ghost = UserId::from_username("ghost@example.com");
        assert!(matches!(
            wallet.get_balance(&ghost),
            Err(WalletError::AccountNotFound(_))
        ));
        assert!(matches!(
            wallet.deposit(&ghost, dec(10)),
            Err(WalletError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_deposit_then_overdraw() {
        let (wallet, id) = setup();
        assert_eq!(wallet.get_balance(&id).unwrap(), dec(1000));

        let receipt = wallet.deposit(&id, dec(500)).unwrap();
        assert_eq!(receipt.balance, dec(1500));
        assert_eq!(receipt.transaction.kind, TransactionKind::Deposit);
        assert_eq!(receipt.transaction.amount, dec(500));
        assert_eq!(wallet.transactions(&id).unwrap().len(), 1);

        assert!(matches!(
            wallet.withdraw(&id, dec(2000)),
            Err(WalletError::InsufficientBalance { .. })
        ));
        assert_eq!(wallet.get_balance(&id).unwrap(), dec(1500));
        assert_eq!(wallet.transactions(&id).unwrap().len(), 1);
    }

    #[test]
    fn test_withdraw() {
        let (wallet, id) = setup();
        let receipt = wallet.withdraw(&id, Decimal::new(2550, 2)).unwrap();
        assert_eq!(receipt.balance, Decimal::new(97450, 2));
        assert_eq!(receipt.transaction.kind, TransactionKind::Withdrawal);

        // Draining to exactly zero is allowed
        let receipt = wallet.withdraw(&id, Decimal::new(97450, 2)).unwrap();
        assert_eq!(receipt.balance, Decimal::ZERO);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let (wallet, id) = setup();
        for amount in [Decimal::ZERO, dec(-5), Decimal::new(1, 3)] {
            assert!(matches!(
                wallet.deposit(&id, amount),
                Err(WalletError::InvalidAmount(_))
            ));
            assert!(matches!(
                wallet.withdraw(&id, amount),
                Err(WalletError::InvalidAmount(_))
            ));
        }
        assert_eq!(wallet.get_balance(&id).unwrap(), dec(1000));
        assert!(wallet.transactions(&id).unwrap().is_empty());
    }

    #[test]
    fn test_amount_precision_and_range() {
        let (wallet, id) = setup();
        for amount in [Decimal::new(15, 3), MAX_AMOUNT + Decimal::ONE, Decimal::MAX] {
            assert!(matches!(
                wallet.deposit(&id, amount),
                Err(WalletError::InvalidAmount(_))
            ));
            assert!(matches!(
                wallet.withdraw(&id, amount),
                Err(WalletError::InvalidAmount(_))
            ));
        }
        assert!(wallet.transactions(&id).unwrap().is_empty());

        // Trailing zeros are not extra precision
        let receipt = wallet.deposit(&id, Decimal::new(10500, 3)).unwrap();
        assert_eq!(receipt.transaction.amount, Decimal::new(1050, 2));
        assert_eq!(receipt.balance, Decimal::new(101050, 2));

        let receipt = wallet.deposit(&id, MAX_AMOUNT).unwrap();
        assert_eq!(receipt.balance, MAX_AMOUNT + Decimal::new(101050, 2));
    }

    #[test]
    fn test_balance_overflow_is_rejected() {
        let (wallet, id) = setup();
        let mut account = wallet.account(&id).unwrap();
        let expected_version = account.version;
        account.amount = Decimal::MAX - Decimal::ONE;
        account.version += 1;
        wallet.store.compare_and_swap(&account, expected_version).unwrap();

        assert!(matches!(
            wallet.deposit(&id, MAX_AMOUNT),
            Err(WalletError::Validation(_))
        ));

        // Every wheel segment pays out more than the stake, so the win cannot be credited
        let request = GameRequest {
            result_kind: "wheel".to_string(),
            bet_amount: MAX_AMOUNT,
            ..Default::default()
        };
        assert!(matches!(
            wallet.apply_game_result_with_rng(&id, &request, &mut StdRng::seed_from_u64(9)),
            Err(WalletError::Validation(_))
        ));

        assert_eq!(wallet.get_balance(&id).unwrap(), Decimal::MAX - Decimal::ONE);
        assert!(wallet.transactions(&id).unwrap().is_empty());
    }

    #[test]
    fn test_oversized_bet_is_refused_before_play() {
        let (wallet, id) = setup();
        let request = GameRequest {
            result_kind: "wheel".to_string(),
            bet_amount: MAX_AMOUNT,
            ..Default::default()
        };
        assert!(matches!(
            wallet.apply_game_result_with_rng(&id, &request, &mut StdRng::seed_from_u64(1)),
            Err(WalletError::InsufficientBalance { .. })
        ));

        let request = GameRequest {
            bet_amount: Decimal::new(7, 0) * Decimal::from(10u64.pow(18)) * Decimal::from(10u64.pow(10)),
            ..request
        };
        assert!(matches!(
            wallet.apply_game_result_with_rng(&id, &request, &mut StdRng::seed_from_u64(1)),
            Err(WalletError::InvalidAmount(_))
        ));
        assert_eq!(wallet.get_balance(&id).unwrap(), dec(1000));
    }

    #[test]
    fn test_game_round_settles_from_server_outcome() {
        let (wallet, id) = setup();
        let request = GameRequest {
            result_kind: "dice_win".to_string(),
            bet_amount: dec(100),
            // A client trying to award itself a fortune
            client_balance: Some(dec(1_000_000)),
            params: GameParams::default(),
        };

        let expected = games::play(Game::Dice, dec(100), &request.params, &mut StdRng::seed_from_u64(42)).unwrap();
        let settlement = wallet
            .apply_game_result_with_rng(&id, &request, &mut StdRng::seed_from_u64(42))
            .unwrap();

        assert_eq!(settlement.outcome, expected);
        assert_eq!(settlement.balance, dec(1000) - dec(100) + expected.payout);
        assert_ne!(settlement.balance, dec(1_000_000));
        assert_eq!(
            settlement.transaction.kind,
            TransactionKind::GameResult {
                game: Game::Dice,
                result: expected.result,
            }
        );
        assert_eq!(wallet.get_balance(&id).unwrap(), settlement.balance);
    }

    #[test]
    fn test_game_round_ledger_amounts() {
        let (wallet, id) = setup();
        for seed in 0..50 {
            let before = wallet.get_balance(&id).unwrap();
            let request = GameRequest {
                result_kind: "plinko".to_string(),
                bet_amount: dec(10),
                ..Default::default()
            };
            let settlement = wallet
                .apply_game_result_with_rng(&id, &request, &mut StdRng::seed_from_u64(seed))
                .unwrap();
            let outcome = &settlement.outcome;
            assert_eq!(settlement.balance, before - dec(10) + outcome.payout);
            match outcome.result {
                RoundResult::Loss => assert_eq!(settlement.transaction.amount, dec(10)),
                _ => assert_eq!(settlement.transaction.amount, outcome.payout),
            }
        }
        assert_eq!(wallet.transactions(&id).unwrap().len(), 50);
    }

    #[test]
    fn test_game_round_rejections() {
        let (wallet, id) = setup();
        let mut rng = StdRng::seed_from_u64(1);
        let base = GameRequest {
            result_kind: "wheel".to_string(),
            bet_amount: dec(10),
            ..Default::default()
        };

        let bad_balance = GameRequest {
            client_balance: Some(dec(-1)),
            ..base.clone()
        };
        assert!(matches!(
            wallet.apply_game_result_with_rng(&id, &bad_balance, &mut rng),
            Err(WalletError::Validation(_))
        ));

        let unknown_game = GameRequest {
            result_kind: "roulette_win".to_string(),
            ..base.clone()
        };
        assert!(matches!(
            wallet.apply_game_result_with_rng(&id, &unknown_game, &mut rng),
            Err(WalletError::Validation(_))
        ));

        let zero_bet = GameRequest {
            bet_amount: Decimal::ZERO,
            ..base.clone()
        };
        assert!(matches!(
            wallet.apply_game_result_with_rng(&id, &zero_bet, &mut rng),
            Err(WalletError::InvalidAmount(_))
        ));

        let too_big = GameRequest {
            bet_amount: dec(1001),
            ..base
        };
        assert!(matches!(
            wallet.apply_game_result_with_rng(&id, &too_big, &mut rng),
            Err(WalletError::InsufficientBalance { .. })
        ));

        assert_eq!(wallet.get_balance(&id).unwrap(), dec(1000));
        assert!(wallet.transactions(&id).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_deposits_and_withdrawals_converge() {
        let (wallet, id) = setup();
        let wallet = WalletService {
            max_retries: 10_000,
            ..wallet
        };
        let rounds = 200;

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let wallet = wallet.clone();
                let id = id.clone();
                thread::spawn(move || {
                    for _ in 0..rounds {
                        if worker % 2 == 0 {
                            wallet.deposit(&id, dec(2)).unwrap();
                        } else {
                            wallet.withdraw(&id, dec(2)).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Two withdrawers can take at most 800, so every withdrawal succeeds
        assert_eq!(wallet.get_balance(&id).unwrap(), dec(1000));
        let account = wallet.account(&id).unwrap();
        assert_eq!(account.transactions.len(), 4 * rounds);
        assert_eq!(account.version, (4 * rounds) as u64);
    }
}
