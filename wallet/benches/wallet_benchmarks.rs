use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use std::hint::black_box;
use std::sync::Arc;
use wallet::games::{self, Game, GameParams};
use wallet::store::{AccountStore, InMemoryStore};
use wallet::{Account, GameRequest, UserId, WalletConfig, WalletService};

fn setup_wallet() -> (WalletService, UserId) {
    let store = Arc::new(InMemoryStore::new());
    let id = UserId::from_username("bench@example.com");
    let user = wallet::User {
        id: id.clone(),
        username: "bench@example.com".to_string(),
        password_hash: String::new(),
        first_name: "Bench".to_string(),
        last_name: "Mark".to_string(),
        created_at: chrono::Utc::now(),
    };
    store
        .insert_user(&user, &Account::new(id.clone(), Decimal::from(1_000_000_000)))
        .unwrap();
    let store: Arc<dyn AccountStore> = store;
    (WalletService::new(store, &WalletConfig::new("bench")), id)
}

// Benchmark for a single deposit against a fresh account
fn bench_deposit(c: &mut Criterion) {
    c.bench_function("deposit", |b| {
        b.iter_with_setup(setup_wallet, |(wallet, id)| {
            black_box(wallet.deposit(&id, Decimal::from(10)).unwrap());
        })
    });
}

// Benchmark for a withdrawal against a fresh account
fn bench_withdraw(c: &mut Criterion) {
    c.bench_function("withdraw", |b| {
        b.iter_with_setup(setup_wallet, |(wallet, id)| {
            black_box(wallet.withdraw(&id, Decimal::from(10)).unwrap());
        })
    });
}

// Benchmark for settling a round once the ledger already holds history
fn bench_settle_with_history(c: &mut Criterion) {
    c.bench_function("settle_round_1000_tx_history", |b| {
        b.iter_with_setup(
            || {
                let (wallet, id) = setup_wallet();
                for _ in 0..1000 {
                    wallet.deposit(&id, Decimal::ONE).unwrap();
                }
                (wallet, id, StdRng::seed_from_u64(1))
            },
            |(wallet, id, mut rng)| {
                let request = GameRequest {
                    result_kind: "dice".to_string(),
                    bet_amount: Decimal::from(10),
                    ..Default::default()
                };
                black_box(wallet.apply_game_result_with_rng(&id, &request, &mut rng).unwrap());
            },
        )
    });
}

// Benchmark for resolving each game without touching the wallet
fn bench_play_games(c: &mut Criterion) {
    let params = GameParams::default();
    for game in Game::ALL {
        c.bench_function(&format!("play_{game}"), |b| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| black_box(games::play(game, Decimal::TEN, &params, &mut rng).unwrap()))
        });
    }
}

criterion_group!(
    benches,
    bench_deposit,
    bench_withdraw,
    bench_settle_with_history,
    bench_play_games
);
criterion_main!(benches);
