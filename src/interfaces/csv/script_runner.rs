use crate::application::engine::ChallengeEngine;
use crate::domain::challenge::{ChallengeTerms, Description, Title};
use crate::domain::ids::{ChallengeId, ReferenceId, UserId};
use crate::domain::ledger::AccountRef;
use crate::domain::money::Token;
use crate::domain::ports::IdGeneratorRef;
use crate::error::{EscrowError, Result};
use crate::infrastructure::clock::ManualClock;
use crate::interfaces::csv::command_reader::{CommandRow, Operation};
use crate::interfaces::csv::report_writer::BalanceLine;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use uuid::Uuid;

/// Replays scripted commands against a [`ChallengeEngine`].
///
/// The clock is moved to each row's `at` before the command runs. Challenge
/// names are mapped to ids as the challenges are created.
pub struct ScriptRunner {
    engine: ChallengeEngine,
    clock: ManualClock,
    ids: IdGeneratorRef,
    users: BTreeMap<String, UserId>,
    challenges: HashMap<String, ChallengeId>,
}

impl ScriptRunner {
    pub fn new(engine: ChallengeEngine, clock: ManualClock, ids: IdGeneratorRef) -> Self {
        Self {
            engine,
            clock,
            ids,
            users: BTreeMap::new(),
            challenges: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &ChallengeEngine {
        &self.engine
    }

    pub async fn apply(&mut self, row: CommandRow) -> Result<()> {
        self.clock.set(row.at);
        debug!(op = ?row.op, actor = %row.actor, at = %row.at, "applying command");

        match row.op {
            Operation::Open => {
                let owner = self.user(&row.actor);
                self.engine.open_wallet(owner).await?;
            }
            Operation::Deposit => {
                let owner = self.user(&row.actor);
                let amount = amount(&row)?;
                self.engine.deposit(owner, amount, self.reference()).await?;
            }
            Operation::Withdraw => {
                let owner = self.user(&row.actor);
                let amount = amount(&row)?;
                self.engine.withdraw(owner, amount, self.reference()).await?;
            }
            Operation::Transfer => {
                let from = self.user(&row.actor);
                let to = self.user(required(&row.target, "target")?);
                let amount = amount(&row)?;
                self.engine
                    .transfer(from, to, amount, self.reference())
                    .await?;
            }
            Operation::Create => {
                let name = required(&row.challenge, "challenge")?;
                if self.challenges.contains_key(name) {
                    return Err(EscrowError::ValidationError(format!(
                        "challenge name {name} already used"
                    )));
                }
                let viewer = self.user(&row.actor);
                let terms = ChallengeTerms {
                    title: Title::new(required(&row.title, "title")?)?,
                    description: description(&row)?,
                    created_by: viewer,
                    assigned_to: self.user(required(&row.target, "target")?),
                    amount: amount(&row)?,
                    streamer_fixed_amount: row.minimum.map(Token::new).transpose()?.unwrap_or_default(),
                    expires_at: row
                        .expires_at
                        .ok_or_else(|| missing(row.op, "expires_at"))?,
                };
                let (challenge, _) = self.engine.create_challenge(viewer, terms).await?;
                self.challenges.insert(name.to_string(), challenge.id());
            }
            Operation::Accept => {
                let (actor, id) = self.participant(&row)?;
                self.engine.accept(actor, id).await?;
            }
            Operation::StreamerReject => {
                let (actor, id) = self.participant(&row)?;
                self.engine.streamer_reject(actor, id).await?;
            }
            Operation::ViewerReject => {
                let (actor, id) = self.participant(&row)?;
                self.engine.viewer_reject(actor, id).await?;
            }
            Operation::Complete => {
                let (actor, id) = self.participant(&row)?;
                self.engine.streamer_complete(actor, id).await?;
            }
            Operation::Confirm => {
                let (actor, id) = self.participant(&row)?;
                self.engine.viewer_confirm(actor, id).await?;
            }
            Operation::Amount => {
                let (actor, id) = self.participant(&row)?;
                self.engine.update_amount(actor, id, amount(&row)?).await?;
            }
            Operation::Extend => {
                let (actor, id) = self.participant(&row)?;
                let expires_at = row
                    .expires_at
                    .ok_or_else(|| missing(row.op, "expires_at"))?;
                self.engine.extend_deadline(actor, id, expires_at).await?;
            }
            Operation::Content => {
                let (actor, id) = self.participant(&row)?;
                let title = Title::new(required(&row.title, "title")?)?;
                self.engine
                    .update_content(actor, id, title, description(&row)?)
                    .await?;
            }
        }
        Ok(())
    }

    /// Balances of every named user, then the escrow and commission accounts
    /// rebuilt from the ledger.
    pub async fn report(&self) -> Result<Vec<BalanceLine>> {
        let mut lines = Vec::with_capacity(self.users.len() + 2);
        for (name, owner) in &self.users {
            match self.engine.wallet(*owner).await {
                Ok(wallet) => lines.push(BalanceLine::new(name.as_str(), wallet.balance().value())),
                Err(EscrowError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        for (name, account) in [("escrow", AccountRef::Escrow), ("commission", AccountRef::Commission)] {
            lines.push(BalanceLine::new(name, self.engine.account_balance(account).await?));
        }
        Ok(lines)
    }

    /// User ids are derived from names, so a script can address wallets
    /// opened by an earlier run against the same database.
    fn user(&mut self, name: &str) -> UserId {
        *self
            .users
            .entry(name.to_string())
            .or_insert_with(|| UserId::new(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())))
    }

    fn participant(&mut self, row: &CommandRow) -> Result<(UserId, ChallengeId)> {
        let name = required(&row.challenge, "challenge")?;
        let id = self
            .challenges
            .get(name)
            .copied()
            .ok_or_else(|| EscrowError::not_found("Challenge", name))?;
        Ok((self.user(&row.actor), id))
    }

    fn reference(&self) -> ReferenceId {
        ReferenceId::new(self.ids.next())
    }
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str> {
    field
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EscrowError::ValidationError(format!("missing {name}")))
}

fn missing(op: Operation, name: &str) -> EscrowError {
    EscrowError::ValidationError(format!("{op:?} requires {name}"))
}

fn amount(row: &CommandRow) -> Result<Token> {
    let value = row.amount.ok_or_else(|| missing(row.op, "amount"))?;
    Token::new(value)
}

fn description(row: &CommandRow) -> Result<Option<Description>> {
    row.description
        .as_deref()
        .filter(|value| !value.is_empty())
        .map(Description::new)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::Stores;
    use crate::application::lifecycle::ChallengeLifecycleService;
    use crate::domain::fees::FeeSchedule;
    use crate::error::ErrorKind;
    use crate::infrastructure::authorization::ParticipantPolicy;
    use crate::infrastructure::ids::SequentialIdGenerator;
    use crate::infrastructure::in_memory::InMemoryStore;
    use crate::interfaces::csv::command_reader::CommandReader;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn runner() -> ScriptRunner {
        let ids: IdGeneratorRef = Arc::new(SequentialIdGenerator::new());
        let clock = ManualClock::default();
        let lifecycle =
            ChallengeLifecycleService::new(ids.clone(), Arc::new(clock.clone()), FeeSchedule::default());
        let engine = ChallengeEngine::new(
            Stores::shared(InMemoryStore::new()),
            lifecycle,
            Arc::new(ParticipantPolicy),
        );
        ScriptRunner::new(engine, clock, ids)
    }

    async fn run(runner: &mut ScriptRunner, script: &str) -> Vec<Result<()>> {
        let mut outcomes = Vec::new();
        for row in CommandReader::new(script.as_bytes()).commands() {
            outcomes.push(match row {
                Ok(row) => runner.apply(row).await,
                Err(e) => Err(e),
            });
        }
        outcomes
    }

    const HEADER: &str = "at,op,actor,challenge,target,amount,expires_at,title,description,minimum\n";

    #[tokio::test]
    async fn test_script_viewer_reject_midway() {
        let mut runner = runner();
        let script = format!(
            "{HEADER}\
2024-01-01T00:00:00Z,open,alice
2024-01-01T00:00:00Z,open,bob
2024-01-01T00:00:00Z,deposit,alice,,,100.00
2024-01-01T00:00:00Z,create,alice,c1,bob,100.00,2024-01-01T10:00:00Z,Speedrun,,10.00
2024-01-01T01:00:00Z,accept,bob,c1
2024-01-01T05:00:00Z,viewer_reject,alice,c1
"
        );
        let outcomes = run(&mut runner, &script).await;
        assert!(outcomes.iter().all(Result::is_ok), "{outcomes:?}");

        let report = runner.report().await.unwrap();
        assert_eq!(
            report,
            vec![
                BalanceLine::new("alice", dec!(70)),
                BalanceLine::new("bob", dec!(20)),
                BalanceLine::new("escrow", dec!(0)),
                BalanceLine::new("commission", dec!(10)),
            ]
        );
    }

    #[tokio::test]
    async fn test_script_unknown_names() {
        let mut runner = runner();
        let script = format!(
            "{HEADER}\
2024-01-01T00:00:00Z,deposit,ghost,,,1
2024-01-01T00:00:00Z,open,alice
2024-01-01T00:00:00Z,accept,alice,nope
2024-01-01T00:00:00Z,deposit,alice
"
        );
        let outcomes = run(&mut runner, &script).await;
        assert_eq!(outcomes[0].as_ref().unwrap_err().kind(), ErrorKind::NotFound);
        assert!(outcomes[1].is_ok());
        assert_eq!(outcomes[2].as_ref().unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            outcomes[3].as_ref().unwrap_err().kind(),
            ErrorKind::FieldValidation
        );
    }

    #[tokio::test]
    async fn test_script_reopen_is_rejected() {
        let mut runner = runner();
        let script = format!(
            "{HEADER}\
2024-01-01T00:00:00Z,open,alice
2024-01-01T00:00:00Z,open,alice
"
        );
        let outcomes = run(&mut runner, &script).await;
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[1].as_ref().unwrap_err().kind(), ErrorKind::DomainRule);
        assert_eq!(runner.engine().wallets().await.unwrap().len(), 1);
    }
}
