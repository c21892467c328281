#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use challenge_escrow::application::engine::{ChallengeEngine, Stores};
use challenge_escrow::application::lifecycle::ChallengeLifecycleService;
use challenge_escrow::domain::challenge::ChallengeStatus;
use challenge_escrow::domain::fees::FeeSchedule;
use challenge_escrow::domain::ledger::AccountRef;
use challenge_escrow::infrastructure::authorization::ParticipantPolicy;
use challenge_escrow::infrastructure::clock::ManualClock;
use challenge_escrow::infrastructure::ids::UuidV7Generator;
use challenge_escrow::infrastructure::rocksdb::RocksDBStore;
use rust_decimal_macros::dec;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::tempdir;

mod common;

fn rocksdb_engine(path: &Path, clock: &ManualClock) -> ChallengeEngine {
    let store = RocksDBStore::open(path).unwrap();
    let lifecycle = ChallengeLifecycleService::new(
        Arc::new(UuidV7Generator),
        Arc::new(clock.clone()),
        FeeSchedule::default(),
    );
    ChallengeEngine::new(Stores::shared(store), lifecycle, Arc::new(ParticipantPolicy))
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: open and fund a wallet
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "at,op,actor,challenge,target,amount").unwrap();
    writeln!(csv1, "2024-01-01T00:00:00Z,open,alice").unwrap();
    writeln!(csv1, "2024-01-01T00:00:00Z,deposit,alice,,,100.0").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("challenge-escrow"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("alice,100\n"));

    // 2. Second run: deposit again into the same wallet
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "at,op,actor,challenge,target,amount").unwrap();
    writeln!(csv2, "2024-01-02T00:00:00Z,deposit,alice,,,50.0").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("challenge-escrow"));
    cmd2.arg(csv2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // Recovered 100 and added 50
    assert!(stdout2.contains("alice,150\n"));
}

#[tokio::test]
async fn test_rocksdb_challenge_survives_reopen() {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new(common::start());
    let viewer = common::user(1);
    let streamer = common::user(2);

    let id = {
        let engine = rocksdb_engine(dir.path(), &clock);
        common::funded(&engine, viewer, dec!(100)).await;
        common::funded(&engine, streamer, dec!(0)).await;
        let (challenge, _) = engine
            .create_challenge(viewer, common::terms(viewer, streamer, dec!(60), 10))
            .await
            .unwrap();
        engine.accept(streamer, challenge.id()).await.unwrap();
        challenge.id()
    };

    let engine = rocksdb_engine(dir.path(), &clock);
    let challenge = engine.challenge(id).await.unwrap();
    assert_eq!(challenge.status(), ChallengeStatus::Accepted);
    assert!(challenge.accepted_at().is_some());
    assert_eq!(
        engine.account_balance(AccountRef::Escrow).await.unwrap(),
        dec!(60)
    );

    engine.viewer_confirm(viewer, id).await.unwrap();
    assert_eq!(
        engine.wallet(streamer).await.unwrap().balance(),
        common::token(dec!(54))
    );
    assert_eq!(engine.transactions_for(id.into()).await.unwrap().len(), 2);
}
