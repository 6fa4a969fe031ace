use crate::clock::{Clock, SystemClock};
use crate::config::LotteryConfig;
use crate::constants::{DB_FILE_NAME, NUMBERS_PER_TICKET};
use crate::draw::{OsSeedSource, SeedSource};
use crate::engine::{
    ClaimRecord, JackpotSnapshot, LotteryEngine, PendingPrize, Transfer,
};
use crate::error::{LotteryError, Result};
use crate::events::{EventBus, LotteryEvent, DEFAULT_EVENT_CAPACITY};
use crate::round::{Round, RoundSummary};
use crate::stats::PlayerStatistics;
use crate::storage::Storage;
use crate::types::{AccountId, Amount, NumberSet, RoundId, Ticket};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

pub struct ServiceOptions {
    pub clock: Arc<dyn Clock>,
    pub seeds: Box<dyn SeedSource>,
    pub event_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            seeds: Box::new(OsSeedSource),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ServiceOptions {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_seeds(mut self, seeds: Box<dyn SeedSource>) -> Self {
        self.seeds = seeds;
        self
    }
}

/// Result of closing a round.
#[derive(Debug, Clone)]
pub struct DrawOutcome {
    pub closed: Round,
    pub next_round_id: RoundId,
}

/// Persistent lottery. Requests are served one at a time, each one committed
/// to storage before its notifications go out.
pub struct LotteryService {
    storage: Arc<Storage>,
    engine: Mutex<LotteryEngine>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl LotteryService {
    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join(DB_FILE_NAME)
    }

    pub async fn exists(data_dir: &Path) -> Result<bool> {
        let db_path = Self::db_path(data_dir);
        if !db_path.exists() {
            return Ok(false);
        }
        Storage::new(&db_path).await?.is_initialized().await
    }

    /// Initializes a new lottery in `data_dir` with round 1 opening now.
    pub async fn create(
        data_dir: &Path,
        config: LotteryConfig,
        options: ServiceOptions,
    ) -> Result<Self> {
        config.validate()?;

        let db_path = Self::db_path(data_dir);
        let storage = Arc::new(Storage::new(&db_path).await?);
        if storage.is_initialized().await? {
            return Err(LotteryError::AlreadyInitialized(
                data_dir.display().to_string(),
            ));
        }

        let now = options.clock.now();
        let mut engine = LotteryEngine::new(config, options.seeds, now)?;
        let changes = engine.take_changes();
        storage.initialize(engine.config(), &changes).await?;

        tracing::info!(
            "Created lottery in {} (ticket price {}, fee {} bps)",
            data_dir.display(),
            engine.config().ticket_price,
            engine.config().fee_bps
        );

        Ok(Self {
            storage,
            engine: Mutex::new(engine),
            clock: options.clock,
            events: EventBus::new(options.event_capacity),
        })
    }

    pub async fn open(data_dir: &Path, options: ServiceOptions) -> Result<Self> {
        let db_path = Self::db_path(data_dir);
        if !db_path.exists() {
            return Err(LotteryError::NotInitialized(
                data_dir.display().to_string(),
            ));
        }

        let storage = Arc::new(Storage::new(&db_path).await?);
        let parts = storage.load_parts().await?;
        let engine = LotteryEngine::from_parts(parts, options.seeds)?;

        tracing::debug!(
            "Opened lottery in {} at round {}",
            data_dir.display(),
            engine.current_round_id()
        );

        Ok(Self {
            storage,
            engine: Mutex::new(engine),
            clock: options.clock,
            events: EventBus::new(options.event_capacity),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LotteryEvent> {
        self.events.subscribe()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Runs one mutating request: engine, then storage, then notifications.
    async fn execute<T>(
        &self,
        op: impl FnOnce(&mut LotteryEngine, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let mut engine = self.engine.lock().await;
        let now = self.clock.now();

        let value = op(&mut *engine, now)?;
        let changes = engine.take_changes();

        if let Err(e) = self.storage.commit(&changes).await {
            tracing::warn!("Failed to persist request, reloading from storage: {}", e);
            let parts = self.storage.load_parts().await?;
            engine.reset_to(parts)?;
            return Err(e);
        }

        self.events.publish(changes.events);
        Ok(value)
    }

    async fn query<T>(&self, f: impl FnOnce(&LotteryEngine, DateTime<Utc>) -> T) -> T {
        let engine = self.engine.lock().await;
        f(&*engine, self.clock.now())
    }

    // ---- actions ----

    pub async fn buy_ticket(
        &self,
        owner: &AccountId,
        numbers: [u8; NUMBERS_PER_TICKET],
        paid: Amount,
    ) -> Result<Ticket> {
        self.execute(|engine, now| engine.buy(owner, numbers, paid, now))
            .await
    }

    pub async fn draw(&self) -> Result<DrawOutcome> {
        self.execute(|engine, now| {
            let round_id = engine.current_round_id();
            let next_round_id = engine.draw(now)?;
            Ok(DrawOutcome {
                closed: engine.round_details(round_id)?.clone(),
                next_round_id,
            })
        })
        .await
    }

    pub async fn claim_prize(&self, owner: &AccountId, round_id: RoundId) -> Result<Amount> {
        self.execute(|engine, now| engine.claim(owner, round_id, now))
            .await
    }

    pub async fn withdraw_fees(&self, caller: &AccountId) -> Result<Transfer> {
        self.execute(|engine, now| engine.withdraw_fees(caller, now))
            .await
    }

    pub async fn emergency_withdraw(&self, caller: &AccountId) -> Result<Transfer> {
        self.execute(|engine, now| engine.emergency_withdraw(caller, now))
            .await
    }

    // ---- queries ----

    pub async fn config(&self) -> LotteryConfig {
        self.query(|engine, _| engine.config().clone()).await
    }

    pub async fn current_round_summary(&self) -> RoundSummary {
        self.query(|engine, _| engine.current_round_summary()).await
    }

    pub async fn round_details(&self, round_id: RoundId) -> Result<Round> {
        self.query(|engine, _| engine.round_details(round_id).cloned())
            .await
    }

    /// Most recent rounds first.
    pub async fn recent_rounds(&self, limit: usize) -> Vec<RoundSummary> {
        self.query(|engine, _| {
            engine
                .rounds()
                .rev()
                .take(limit)
                .map(Round::summary)
                .collect()
        })
        .await
    }

    pub async fn tickets_of(&self, owner: &AccountId, round_id: RoundId) -> Vec<Ticket> {
        self.query(|engine, _| engine.tickets_of(owner, round_id))
            .await
    }

    pub async fn pending_prize(&self, owner: &AccountId, round_id: RoundId) -> Result<Amount> {
        self.query(|engine, _| engine.pending_prize(owner, round_id))
            .await
    }

    pub async fn pending_prizes(&self, owner: &AccountId) -> Result<Vec<PendingPrize>> {
        self.query(|engine, _| engine.pending_prizes(owner)).await
    }

    pub async fn claimed_status(&self, owner: &AccountId, round_id: RoundId) -> bool {
        self.query(|engine, _| engine.claimed_status(owner, round_id))
            .await
    }

    pub async fn claim_record(&self, owner: &AccountId, round_id: RoundId) -> Option<ClaimRecord> {
        self.query(|engine, _| engine.claim_record(owner, round_id).cloned())
            .await
    }

    pub async fn jackpot_snapshot(&self) -> JackpotSnapshot {
        self.query(|engine, _| engine.jackpot_snapshot()).await
    }

    pub async fn operator_balance(&self) -> Amount {
        self.query(|engine, _| engine.operator_balance()).await
    }

    pub async fn vault(&self) -> Amount {
        self.query(|engine, _| engine.vault()).await
    }

    pub async fn time_until_draw(&self) -> u64 {
        self.query(|engine, now| engine.time_until_draw(now)).await
    }

    pub async fn total_tickets(&self) -> u64 {
        self.query(|engine, _| engine.total_tickets()).await
    }

    pub async fn winning_numbers(&self, round_id: RoundId) -> Result<Option<NumberSet>> {
        self.query(|engine, _| engine.winning_numbers(round_id))
            .await
    }

    pub async fn verify_draw(&self, round_id: RoundId) -> Result<bool> {
        self.query(|engine, _| engine.verify_draw(round_id)).await
    }

    pub async fn player_statistics(&self, owner: &AccountId) -> Result<PlayerStatistics> {
        self.query(|engine, _| engine.player_statistics(owner))
            .await
    }

    pub async fn transfers(
        &self,
        recipient: Option<&AccountId>,
        limit: usize,
    ) -> Result<Vec<Transfer>> {
        self.storage.list_transfers(recipient, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::draw::{draw_numbers, FixedSeedSource};
    use crate::engine::TransferKind;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    const SEED: [u8; 32] = [11u8; 32];

    fn options(clock: &Arc<ManualClock>) -> ServiceOptions {
        ServiceOptions::default()
            .with_clock(clock.clone())
            .with_seeds(Box::new(FixedSeedSource(SEED)))
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 4, 1, 18, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_create_and_reopen() {
        let temp_dir = tempdir().unwrap();
        let clock = clock();
        assert!(!LotteryService::exists(temp_dir.path()).await.unwrap());

        let service = LotteryService::create(temp_dir.path(), LotteryConfig::default(), options(&clock))
            .await
            .unwrap();
        assert!(LotteryService::exists(temp_dir.path()).await.unwrap());
        assert_eq!(service.current_round_summary().await.id, 1);
        drop(service);

        let result =
            LotteryService::create(temp_dir.path(), LotteryConfig::default(), options(&clock)).await;
        assert!(matches!(result, Err(LotteryError::AlreadyInitialized(_))));

        let reopened = LotteryService::open(temp_dir.path(), options(&clock)).await.unwrap();
        assert_eq!(reopened.config().await, LotteryConfig::default());
    }

    #[tokio::test]
    async fn test_open_missing_lottery() {
        let temp_dir = tempdir().unwrap();
        let result = LotteryService::open(temp_dir.path(), ServiceOptions::default()).await;
        assert!(matches!(result, Err(LotteryError::NotInitialized(_))));
    }

    #[tokio::test]
    async fn test_full_round_survives_restart() {
        let temp_dir = tempdir().unwrap();
        let clock = clock();
        let service = LotteryService::create(temp_dir.path(), LotteryConfig::default(), options(&clock))
            .await
            .unwrap();
        let mut events = service.subscribe();

        let alice = AccountId::new("alice");
        let price = service.config().await.ticket_price;
        let winning = draw_numbers(&SEED);
        let mut jackpot_numbers = [0u8; NUMBERS_PER_TICKET];
        jackpot_numbers.copy_from_slice(winning.as_slice());

        service.buy_ticket(&alice, jackpot_numbers, price).await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            LotteryEvent::TicketPurchased { round_id: 1, .. }
        ));

        assert!(matches!(
            service.draw().await,
            Err(LotteryError::StillActive { round_id: 1 })
        ));

        clock.advance(Duration::days(4));
        assert_eq!(service.time_until_draw().await, 0);

        let outcome = service.draw().await.unwrap();
        assert_eq!(outcome.next_round_id, 2);
        assert_eq!(outcome.closed.winning_numbers, Some(winning));
        assert!(matches!(
            events.recv().await.unwrap(),
            LotteryEvent::RoundClosed { round_id: 1, .. }
        ));

        let prize = service.pending_prize(&alice, 1).await.unwrap();
        assert_eq!(
            prize,
            service.config().await.ticket_net().mul_bps(5_000)
        );
        drop(service);

        let service = LotteryService::open(temp_dir.path(), options(&clock)).await.unwrap();
        assert_eq!(service.current_round_summary().await.id, 2);
        assert_eq!(service.pending_prize(&alice, 1).await.unwrap(), prize);
        assert!(service.verify_draw(1).await.unwrap());

        assert_eq!(service.claim_prize(&alice, 1).await.unwrap(), prize);
        assert!(service.claimed_status(&alice, 1).await);
        assert!(matches!(
            service.claim_prize(&alice, 1).await,
            Err(LotteryError::AlreadyClaimed { round_id: 1 })
        ));

        let transfers = service.transfers(Some(&alice), 10).await.unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].kind, TransferKind::Prize);
        assert_eq!(transfers[0].amount, prize);

        let stats = service.player_statistics(&alice).await.unwrap();
        assert_eq!(stats.best_match, 5);
        assert_eq!(stats.total_claimed, prize);
    }

    #[tokio::test]
    async fn test_expired_buy_persists_both_rounds() {
        let temp_dir = tempdir().unwrap();
        let clock = clock();
        let service = LotteryService::create(temp_dir.path(), LotteryConfig::default(), options(&clock))
            .await
            .unwrap();
        let bob = AccountId::new("bob");
        let price = service.config().await.ticket_price;

        clock.advance(Duration::days(5));
        let ticket = service.buy_ticket(&bob, [3, 1, 4, 15, 9], price).await.unwrap();
        assert_eq!(ticket.round_id, 2);
        drop(service);

        let service = LotteryService::open(temp_dir.path(), options(&clock)).await.unwrap();
        let round_one = service.round_details(1).await.unwrap();
        assert!(round_one.closed);
        assert_eq!(round_one.ticket_count, 0);

        let current = service.current_round_summary().await;
        assert_eq!(current.id, 2);
        assert_eq!(current.ticket_count, 1);
        assert_eq!(service.tickets_of(&bob, 2).await, vec![ticket]);
        assert_eq!(service.total_tickets().await, 1);
        assert_eq!(service.recent_rounds(10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_operator_actions() {
        let temp_dir = tempdir().unwrap();
        let clock = clock();
        let config = LotteryConfig::new(AccountId::new("house"));
        let service = LotteryService::create(temp_dir.path(), config, options(&clock))
            .await
            .unwrap();
        let house = AccountId::new("house");
        let price = service.config().await.ticket_price;

        assert!(matches!(
            service.withdraw_fees(&house).await,
            Err(LotteryError::NothingToWithdraw)
        ));

        service
            .buy_ticket(&AccountId::new("carol"), [1, 2, 3, 4, 5], price)
            .await
            .unwrap();
        assert!(matches!(
            service.withdraw_fees(&AccountId::new("carol")).await,
            Err(LotteryError::NotOwner { .. })
        ));

        let fees = service.withdraw_fees(&house).await.unwrap();
        assert_eq!(fees.amount, price.mul_bps(100));
        assert_eq!(service.operator_balance().await, Amount::ZERO);

        let sweep = service.emergency_withdraw(&house).await.unwrap();
        assert_eq!(sweep.amount, service.config().await.ticket_net());
        assert_eq!(service.vault().await, Amount::ZERO);
        assert_eq!(service.jackpot_snapshot().await.current_pool, Amount::ZERO);
        assert_eq!(service.current_round_summary().await.ticket_count, 1);

        let journal = service.transfers(None, 10).await.unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(service.jackpot_snapshot().await.rollover, Amount::ZERO);
        drop(service);

        let reopened = LotteryService::open(temp_dir.path(), options(&clock)).await.unwrap();
        assert_eq!(reopened.current_round_summary().await.prize_pool, Amount::ZERO);
    }
}
