use challenge_escrow::application::engine::ChallengeEngine;
use challenge_escrow::domain::ids::{ChallengeId, UserId};
use challenge_escrow::domain::challenge::ChallengeStatus;
use challenge_escrow::domain::ledger::AccountRef;
use challenge_escrow::domain::ports::Clock;
use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod common;
use common::{engine, funded, reference, terms, token, user};

const USERS: u128 = 4;

async fn assert_books_balance(engine: &ChallengeEngine, open: &[ChallengeId]) {
    let mut wallets = Decimal::ZERO;
    for wallet in engine.wallets().await.unwrap() {
        let rebuilt = engine
            .account_balance(AccountRef::UserWallet(wallet.owner()))
            .await
            .unwrap();
        assert_eq!(wallet.balance().value(), rebuilt, "wallet {}", wallet.owner());
        assert!(wallet.balance().value() >= Decimal::ZERO);
        wallets += rebuilt;
    }

    let escrow = engine.account_balance(AccountRef::Escrow).await.unwrap();
    let commission = engine.account_balance(AccountRef::Commission).await.unwrap();
    let bank = engine.account_balance(AccountRef::Bank).await.unwrap();
    assert_eq!(wallets + escrow + commission + bank, Decimal::ZERO);

    let mut locked = Decimal::ZERO;
    for id in open {
        let challenge = engine.challenge(*id).await.unwrap();
        if !challenge.status().is_terminal() {
            locked += challenge.amount().value();
        }
    }
    assert_eq!(escrow, locked);
}

async fn random_walk(seed: u64, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let (engine, clock) = engine();
    for n in 1..=USERS {
        funded(&engine, user(n), dec!(500)).await;
    }
    let mut challenges: Vec<ChallengeId> = Vec::new();
    let mut references = 0u128;
    let mut next_reference = || {
        references += 1;
        reference(references)
    };

    for _ in 0..steps {
        let a = user(rng.gen_range(1..=USERS));
        let b = user(rng.gen_range(1..=USERS));
        let amount = token(Decimal::new(rng.gen_range(1..=20_000), 2));

        // Failures are expected; every command must leave the books intact.
        match rng.gen_range(0..10) {
            0 => {
                let _ = engine.deposit(a, amount, next_reference()).await;
            }
            1 => {
                let _ = engine.withdraw(a, amount, next_reference()).await;
            }
            2 => {
                let _ = engine.transfer(a, b, amount, next_reference()).await;
            }
            3 | 4 => {
                let hours = rng.gen_range(1..=48);
                let mut t = terms(a, b, amount.value(), hours);
                t.expires_at = clock.now() + Duration::hours(hours);
                if let Ok((challenge, _)) = engine.create_challenge(a, t).await {
                    challenges.push(challenge.id());
                }
            }
            5 if !challenges.is_empty() => {
                let c = pick(&engine, &mut rng, &challenges).await;
                let _ = engine.accept(c.1, c.0).await;
            }
            6 if !challenges.is_empty() => {
                let c = pick(&engine, &mut rng, &challenges).await;
                if rng.gen_bool(0.5) {
                    let _ = engine.streamer_reject(c.1, c.0).await;
                } else {
                    let _ = engine.viewer_reject(c.2, c.0).await;
                }
            }
            7 if !challenges.is_empty() => {
                let c = pick(&engine, &mut rng, &challenges).await;
                let _ = engine.streamer_complete(c.1, c.0).await;
                let _ = engine.viewer_confirm(c.2, c.0).await;
            }
            8 if !challenges.is_empty() => {
                let c = pick(&engine, &mut rng, &challenges).await;
                let _ = engine.update_amount(c.2, c.0, amount).await;
            }
            _ => clock.advance(Duration::minutes(rng.gen_range(1..=600))),
        }
    }

    assert_books_balance(&engine, &challenges).await;

    // Wind everything down; escrow must drain to zero.
    for id in &challenges {
        let challenge = engine.challenge(*id).await.unwrap();
        match challenge.status() {
            ChallengeStatus::StreamerCompleted => {
                engine.viewer_confirm(challenge.created_by(), *id).await.unwrap();
            }
            status if !status.is_terminal() => {
                engine.viewer_reject(challenge.created_by(), *id).await.unwrap();
            }
            _ => {}
        }
    }
    assert_books_balance(&engine, &challenges).await;
    assert_eq!(
        engine.account_balance(AccountRef::Escrow).await.unwrap(),
        Decimal::ZERO
    );
}

/// A random challenge with its assignee and creator.
async fn pick(
    engine: &ChallengeEngine,
    rng: &mut StdRng,
    challenges: &[ChallengeId],
) -> (ChallengeId, UserId, UserId) {
    let id = challenges[rng.gen_range(0..challenges.len())];
    let challenge = engine.challenge(id).await.unwrap();
    (id, challenge.assigned_to(), challenge.created_by())
}

#[tokio::test]
async fn test_random_walks_keep_books_balanced() {
    for seed in 0..8 {
        random_walk(seed, 300).await;
    }
}
