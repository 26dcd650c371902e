use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use wallet::store::{AccountStore, InMemoryStore};
use wallet::{Account, GameRequest, User, UserId, WalletConfig, WalletService};

const STARTING_BALANCE: i64 = 1_000_000;

/// Load testing tool for sustained wallet throughput and contention
fn main() {
    println!("=== Wallet Load Testing ===\n");

    test_sustained_deposits();
    test_mixed_workload();
    test_concurrent_access();
}

fn setup_wallet(accounts: usize) -> (WalletService, Vec<UserId>) {
    let store = Arc::new(InMemoryStore::new());
    let mut ids = Vec::with_capacity(accounts);
    for i in 0..accounts {
        let username = format!("load{i}@example.com");
        let id = UserId::from_username(&username);
        let user = User {
            id: id.clone(),
            username,
            password_hash: String::new(),
            first_name: "Load".to_string(),
            last_name: "Tester".to_string(),
            created_at: chrono::Utc::now(),
        };
        store
            .insert_user(&user, &Account::new(id.clone(), Decimal::from(STARTING_BALANCE)))
            .expect("insert load test user");
        ids.push(id);
    }
    let store: Arc<dyn AccountStore> = store;
    let mut config = WalletConfig::new("load-tester");
    config.max_retries = usize::MAX;
    (WalletService::new(store, &config), ids)
}

fn test_sustained_deposits() {
    println!("📈 Testing sustained deposits...");

    let (wallet, ids) = setup_wallet(1);
    let duration = Duration::from_secs(5);
    let start = Instant::now();
    let mut operations = 0u64;

    while start.elapsed() < duration {
        wallet
            .deposit(&ids[0], Decimal::ONE)
            .expect("deposit during load test");
        operations += 1;
    }

    let elapsed = start.elapsed();
    println!("   Operations: {}", operations);
    println!("   Duration: {:.2}s", elapsed.as_secs_f64());
    println!(
        "   Throughput: {:.0} ops/sec",
        operations as f64 / elapsed.as_secs_f64()
    );
    println!(
        "   Balance: {}\n",
        wallet.get_balance(&ids[0]).unwrap_or_default()
    );
}

fn test_mixed_workload() {
    println!("🔄 Testing mixed workload...");

    let (wallet, ids) = setup_wallet(16);
    let duration = Duration::from_secs(5);
    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(42);
    let games = ["dice", "wheel", "crash", "mines", "plinko", "blackjack", "craps"];

    let mut operations = 0usize;
    let mut rounds = 0usize;
    let mut rejected = 0usize;

    while start.elapsed() < duration {
        let id = &ids[operations % ids.len()];
        let result = match operations % 4 {
            0 => wallet.deposit(id, Decimal::from(25)).map(|_| ()),
            1 => wallet.withdraw(id, Decimal::from(20)).map(|_| ()),
            _ => {
                rounds += 1;
                let request = GameRequest {
                    result_kind: games[operations % games.len()].to_string(),
                    bet_amount: Decimal::from(10),
                    ..Default::default()
                };
                wallet
                    .apply_game_result_with_rng(id, &request, &mut rng)
                    .map(|_| ())
            }
        };
        if result.is_err() {
            rejected += 1;
        }
        operations += 1;
    }

    let elapsed = start.elapsed();
    println!("   Operations: {}", operations);
    println!("   Game rounds: {}", rounds);
    println!("   Rejected: {}", rejected);
    println!("   Duration: {:.2}s", elapsed.as_secs_f64());
    println!(
        "   Throughput: {:.0} ops/sec\n",
        operations as f64 / elapsed.as_secs_f64()
    );
}

fn test_concurrent_access() {
    println!("⚡ Testing concurrent access on one account...");

    let (wallet, ids) = setup_wallet(1);
    let id = ids[0].clone();
    let operations = Arc::new(AtomicU64::new(0));
    let duration = Duration::from_secs(5);

    let num_threads = 4;
    let mut handles = vec![];

    for thread_id in 0..num_threads {
        let wallet = wallet.clone();
        let id = id.clone();
        let ops_clone = Arc::clone(&operations);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let mut local_ops = 0;

            // Deposit/withdraw pairs so the balance must return to where it started
            while start.elapsed() < duration {
                if thread_id % 2 == 0 {
                    wallet.deposit(&id, Decimal::from(3)).expect("deposit");
                    wallet.withdraw(&id, Decimal::from(3)).expect("withdraw");
                } else {
                    wallet.withdraw(&id, Decimal::from(5)).expect("withdraw");
                    wallet.deposit(&id, Decimal::from(5)).expect("deposit");
                }
                local_ops += 2;
            }

            ops_clone.fetch_add(local_ops, Ordering::Relaxed);
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("load test thread panicked");
    }

    let total_ops = operations.load(Ordering::Relaxed);
    let balance = wallet.get_balance(&id).unwrap_or_default();

    println!("   Threads: {}", num_threads);
    println!("   Total operations: {}", total_ops);
    println!("   Duration: {:.2}s", duration.as_secs_f64());
    println!(
        "   Throughput: {:.0} ops/sec",
        total_ops as f64 / duration.as_secs_f64()
    );
    println!(
        "   Final balance: {} (expected {}) {}\n",
        balance,
        STARTING_BALANCE,
        if balance == Decimal::from(STARTING_BALANCE) {
            "✅"
        } else {
            "❌ lost update"
        }
    );
}
