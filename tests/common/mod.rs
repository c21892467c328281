#![allow(dead_code)]

use challenge_escrow::application::engine::{ChallengeEngine, Stores};
use challenge_escrow::application::lifecycle::ChallengeLifecycleService;
use challenge_escrow::domain::challenge::{ChallengeTerms, Title};
use challenge_escrow::domain::fees::FeeSchedule;
use challenge_escrow::domain::ids::{ReferenceId, UserId};
use challenge_escrow::domain::money::Token;
use challenge_escrow::infrastructure::authorization::ParticipantPolicy;
use challenge_escrow::infrastructure::clock::ManualClock;
use challenge_escrow::infrastructure::ids::SequentialIdGenerator;
use challenge_escrow::infrastructure::in_memory::InMemoryStore;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn token(value: Decimal) -> Token {
    Token::new(value).unwrap()
}

pub fn user(n: u128) -> UserId {
    UserId::new(Uuid::from_u128(n))
}

pub fn reference(n: u128) -> ReferenceId {
    ReferenceId::new(Uuid::from_u128(n))
}

/// An in-memory engine on a manual clock set to [`start`].
pub fn engine() -> (ChallengeEngine, ManualClock) {
    let clock = ManualClock::new(start());
    let lifecycle = ChallengeLifecycleService::new(
        Arc::new(SequentialIdGenerator::new()),
        Arc::new(clock.clone()),
        FeeSchedule::default(),
    );
    let engine = ChallengeEngine::new(
        Stores::shared(InMemoryStore::new()),
        lifecycle,
        Arc::new(ParticipantPolicy),
    );
    (engine, clock)
}

pub async fn funded(engine: &ChallengeEngine, owner: UserId, amount: Decimal) {
    engine.open_wallet(owner).await.unwrap();
    if amount > Decimal::ZERO {
        let n = owner.value().as_u128() + 1_000_000;
        engine
            .deposit(owner, token(amount), reference(n))
            .await
            .unwrap();
    }
}

pub fn terms(viewer: UserId, streamer: UserId, amount: Decimal, hours: i64) -> ChallengeTerms {
    ChallengeTerms {
        title: Title::new("Finish the marathon stream").unwrap(),
        description: None,
        created_by: viewer,
        assigned_to: streamer,
        amount: token(amount),
        streamer_fixed_amount: Token::ZERO,
        expires_at: start() + Duration::hours(hours),
    }
}

/// Writes a script that opens `users` wallets, funds each with 100 and runs
/// a 10 stake challenge between every consecutive pair through to
/// confirmation.
pub fn generate_script(path: &Path, users: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    wtr.write_record([
        "at", "op", "actor", "challenge", "target", "amount", "expires_at", "title",
    ])?;
    let at = "2024-01-01T00:00:00Z";
    let later = "2024-01-01T01:00:00Z";
    let expires = "2024-01-02T00:00:00Z";

    for i in 0..users {
        let name = format!("user{i}");
        wtr.write_record([at, "open", name.as_str()])?;
        wtr.write_record([at, "deposit", name.as_str(), "", "", "100"])?;
    }
    for i in 1..users {
        let viewer = format!("user{}", i - 1);
        let streamer = format!("user{i}");
        let challenge = format!("c{i}");
        wtr.write_record([
            at,
            "create",
            viewer.as_str(),
            challenge.as_str(),
            streamer.as_str(),
            "10",
            expires,
            "Relay",
        ])?;
    }
    for i in 1..users {
        let viewer = format!("user{}", i - 1);
        let streamer = format!("user{i}");
        let challenge = format!("c{i}");
        wtr.write_record([later, "accept", streamer.as_str(), challenge.as_str()])?;
        wtr.write_record([later, "confirm", viewer.as_str(), challenge.as_str()])?;
    }

    wtr.flush()?;
    Ok(())
}
