use crate::card_duel::{CardDuel, DuelAction, DuelSnapshot};
use crate::cards::Shoe;
use crate::coin_flip::{self, CoinWagers};
use crate::config::{AbandonPolicy, CasinoConfig, GameConfig};
use crate::dice_gate::{self, GateWagers};
use crate::error::{GameError, Result};
use crate::rng::{RandomSource, SystemRng};
use crate::round::{describe, GameKind, RoundDetail, RoundResult};
use crate::session::{DuelSession, SessionRegistry};
use casino_core::{ActiveGame, BalanceKey, Funds, GroupId, Ledger, PlayerId, TransferReceipt};
use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Entry point for callers: runs rounds against the ledger.
pub struct Casino {
    ledger: Arc<Ledger>,
    config: GameConfig,
    sessions: SessionRegistry,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl Casino {
    pub async fn open(data_dir: &Path, config: CasinoConfig) -> Result<Self> {
        Self::open_with_rng(data_dir, config, Box::new(SystemRng::new())).await
    }

    /// Opens the ledger under `data_dir` and picks up duels left open by
    /// an earlier process.
    pub async fn open_with_rng(
        data_dir: &Path,
        config: CasinoConfig,
        rng: Box<dyn RandomSource>,
    ) -> Result<Self> {
        config.validate()?;
        let ledger = Arc::new(Ledger::new(data_dir, config.ledger).await?);
        let casino = Self::new(ledger, config.games, rng)?;
        casino.restore_active_duels().await?;
        Ok(casino)
    }

    pub async fn in_memory(config: CasinoConfig, rng: Box<dyn RandomSource>) -> Result<Self> {
        config.validate()?;
        let ledger = Arc::new(Ledger::in_memory(config.ledger).await?);
        Self::new(ledger, config.games, rng)
    }

    pub fn new(ledger: Arc<Ledger>, config: GameConfig, rng: Box<dyn RandomSource>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            ledger,
            config,
            sessions: SessionRegistry::new(),
            rng: Mutex::new(rng),
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn open_duels(&self) -> usize {
        self.sessions.len()
    }

    pub async fn start_card_duel(
        &self,
        player: PlayerId,
        group: GroupId,
        wager: i64,
    ) -> Result<DuelSnapshot> {
        let decks = self.config.shoe_decks;
        self.start_card_duel_with(player, group, wager, |rng| Shoe::new(decks, rng))
            .await
    }

    /// Same as [`Casino::start_card_duel`] with a caller-built shoe.
    pub async fn start_card_duel_with<F>(
        &self,
        player: PlayerId,
        group: GroupId,
        wager: i64,
        make_shoe: F,
    ) -> Result<DuelSnapshot>
    where
        F: FnOnce(&mut dyn RandomSource) -> Shoe,
    {
        if wager <= 0 {
            return Err(GameError::invalid_wager("Wager must be positive"));
        }

        let key = BalanceKey::new(player, group);
        let mut session = self.sessions.reserve(key)?;
        let round_id = session.round_id;

        let dealt = self.with_rng(|rng| {
            let shoe = make_shoe(rng);
            CardDuel::deal(wager, shoe, rng)
        });
        let opened = match dealt {
            Ok(duel) => self.record_opening_wager(&session, &duel).await.map(|_| duel),
            Err(e) => Err(e),
        };
        let duel = match opened {
            Ok(duel) => duel,
            Err(e) => {
                self.sessions.remove(&key, round_id);
                return Err(e);
            }
        };

        let snapshot = duel.snapshot();
        session.duel = Some(duel);
        session.touch();

        tracing::info!("Card duel {} opened for {} with wager {}", round_id, key, wager);
        Ok(snapshot)
    }

    pub async fn duel_action(
        &self,
        player: PlayerId,
        group: GroupId,
        action: DuelAction,
    ) -> Result<DuelSnapshot> {
        let key = BalanceKey::new(player, group);
        let session = self.sessions.get(&key).ok_or(GameError::NoActiveGame)?;
        let mut session = session.lock().await;

        if session.settled {
            return Err(GameError::NoActiveGame);
        }
        let duel = session.duel.as_ref().ok_or(GameError::NoActiveGame)?;

        // a finished but unsettled duel only retries its payout
        if !duel.is_terminal() {
            let next = self.apply_action(&session, duel.clone(), action).await?;
            session.duel = Some(next);
            session.touch();
        }

        self.settle_if_finished(&mut session).await
    }

    /// The open duel as the player sees it.
    pub async fn current_duel(&self, player: PlayerId, group: GroupId) -> Result<DuelSnapshot> {
        let key = BalanceKey::new(player, group);
        let session = self.sessions.get(&key).ok_or(GameError::NoActiveGame)?;
        let session = session.lock().await;

        match (&session.duel, session.settled) {
            (Some(duel), false) => Ok(duel.snapshot()),
            _ => Err(GameError::NoActiveGame),
        }
    }

    pub async fn play_dice_gate(
        &self,
        player: PlayerId,
        group: GroupId,
        wagers: &GateWagers,
    ) -> Result<RoundResult> {
        let key = BalanceKey::new(player, group);
        let total = wagers.total();
        let round_id = Uuid::new_v4();

        let luck = self.config.luck_factor;
        let roll = self.with_rng(|rng| dice_gate::roll(wagers, luck, rng));
        let payout = roll.payout;

        let funds = self
            .ledger
            .settle_round(
                &key,
                total,
                payout,
                &describe(GameKind::DiceGate, round_id, "wager"),
                &describe(GameKind::DiceGate, round_id, "payout"),
            )
            .await?;

        tracing::info!(
            "Dice gate {} for {}: {:?} wager {} payout {}",
            round_id,
            key,
            roll.faces,
            total,
            payout
        );
        Ok(RoundResult::new(
            round_id,
            total,
            payout,
            funds,
            RoundDetail::DiceGate(roll),
        ))
    }

    pub async fn play_coin_flip(
        &self,
        player: PlayerId,
        group: GroupId,
        wagers: &CoinWagers,
    ) -> Result<RoundResult> {
        let key = BalanceKey::new(player, group);
        let total = wagers.total();
        let round_id = Uuid::new_v4();

        let luck = self.config.luck_factor;
        let roll = self.with_rng(|rng| coin_flip::flip(wagers, luck, rng));
        let payout = roll.payout;

        let funds = self
            .ledger
            .settle_round(
                &key,
                total,
                payout,
                &describe(GameKind::CoinFlip, round_id, "wager"),
                &describe(GameKind::CoinFlip, round_id, "payout"),
            )
            .await?;

        tracing::info!(
            "Coin flip {} for {}: {} red, wager {} payout {}",
            round_id,
            key,
            roll.red_count,
            total,
            payout
        );
        Ok(RoundResult::new(
            round_id,
            total,
            payout,
            funds,
            RoundDetail::CoinFlip(roll),
        ))
    }

    pub async fn get_balance(&self, player: PlayerId, group: GroupId) -> Result<Funds> {
        Ok(self.ledger.funds(&BalanceKey::new(player, group)).await?)
    }

    pub async fn transfer(
        &self,
        from: PlayerId,
        to: PlayerId,
        group: GroupId,
        amount: i64,
    ) -> Result<TransferReceipt> {
        Ok(self.ledger.transfer(from, to, group, amount).await?)
    }

    /// Settle every duel nobody touched within the idle timeout. Duels
    /// currently being played are skipped. Returns how many were closed.
    pub async fn expire_idle_duels(&self) -> Result<usize> {
        let timeout = TimeDelta::from_std(self.config.duel_idle_timeout())
            .map_err(|_| GameError::config("Duel idle timeout out of range"))?;
        let cutoff = Utc::now() - timeout;
        let refund = self.config.abandon_policy == AbandonPolicy::Refund;

        let mut closed = 0;
        for (key, session) in self.sessions.snapshot() {
            let Ok(mut session) = session.try_lock_owned() else {
                continue;
            };
            if session.settled || !session.is_idle_since(cutoff) {
                continue;
            }

            let Some(duel) = session.duel.as_mut() else {
                continue;
            };
            if !duel.is_terminal() {
                duel.abandon(refund)?;
            }

            match self.settle_if_finished(&mut session).await {
                Ok(_) => {
                    closed += 1;
                    tracing::info!("Expired idle card duel for {}", key);
                }
                Err(e) => {
                    tracing::warn!("Failed to settle idle duel for {}: {}", key, e);
                }
            }
        }

        Ok(closed)
    }

    /// Loads the duels stored by an earlier process into the registry.
    /// Duels that had already finished are settled straight away.
    pub async fn restore_active_duels(&self) -> Result<usize> {
        let mut restored = 0;
        for game in self.ledger.active_games().await? {
            if game.game != GameKind::CardDuel.as_str() {
                continue;
            }

            let duel: CardDuel = match serde_json::from_str(&game.state) {
                Ok(duel) => duel,
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable duel {} for {}: {}",
                        game.round_id,
                        game.key,
                        e
                    );
                    continue;
                }
            };
            let Ok(round_id) = Uuid::parse_str(&game.round_id) else {
                tracing::warn!(
                    "Skipping duel with bad round id {} for {}",
                    game.round_id,
                    game.key
                );
                continue;
            };

            let finished = duel.is_terminal();
            if !self
                .sessions
                .restore(game.key, round_id, duel, game.opened_at, game.updated_at)
            {
                continue;
            }
            restored += 1;

            if finished {
                let Some(session) = self.sessions.get(&game.key) else {
                    continue;
                };
                let mut session = session.lock().await;
                if let Err(e) = self.settle_if_finished(&mut session).await {
                    tracing::warn!("Failed to settle restored duel for {}: {}", game.key, e);
                }
            }
        }

        if restored > 0 {
            tracing::info!("Restored {} open card duels", restored);
        }
        Ok(restored)
    }

    /// Runs [`Casino::expire_idle_duels`] on a fixed interval until the
    /// handle is aborted.
    pub fn spawn_idle_reaper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match self.expire_idle_duels().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Idle reaper closed {} duels", n),
                    Err(e) => tracing::warn!("Idle reaper failed: {}", e),
                }
            }
        })
    }

    async fn record_opening_wager(&self, session: &DuelSession, duel: &CardDuel) -> Result<()> {
        let description = describe(GameKind::CardDuel, session.round_id, "wager");
        self.ledger
            .place_game_wager(&duel_record(session, duel)?, duel.wager(), &description)
            .await?;
        Ok(())
    }

    /// Plays `action` on a copy of the duel and stores the result. The
    /// caller only swaps the copy in once it is stored.
    async fn apply_action(
        &self,
        session: &DuelSession,
        mut duel: CardDuel,
        action: DuelAction,
    ) -> Result<CardDuel> {
        match action {
            DuelAction::Hit => self.with_rng(|rng| duel.hit(rng))?,
            DuelAction::Stand => self.with_rng(|rng| duel.stand(rng))?,
            DuelAction::Split => duel.split()?,
            DuelAction::Double => {
                if !duel.can_double() {
                    return Err(GameError::invalid_action(
                        "Double is only allowed on the first two cards",
                    ));
                }

                let extra = duel.wager();
                self.with_rng(|rng| duel.double(rng))?;
                let description = describe(GameKind::CardDuel, session.round_id, "double");
                self.ledger
                    .place_game_wager(&duel_record(session, &duel)?, extra, &description)
                    .await?;
                return Ok(duel);
            }
        }

        self.ledger.save_active_game(&duel_record(session, &duel)?).await?;
        Ok(duel)
    }

    /// Credits a finished duel exactly once and drops it from the registry.
    /// Unfinished duels just return their snapshot.
    async fn settle_if_finished(&self, session: &mut DuelSession) -> Result<DuelSnapshot> {
        let duel = session.duel.as_ref().ok_or(GameError::NoActiveGame)?;
        let mut snapshot = duel.snapshot();
        let (Some(outcome), payout) = (duel.outcome(), duel.payout()) else {
            return Ok(snapshot);
        };

        let note = format!("payout {}", outcome);
        let funds = self
            .ledger
            .settle_active_game(
                &session.key,
                &session.round_id.to_string(),
                payout,
                &describe(GameKind::CardDuel, session.round_id, &note),
            )
            .await?;

        session.settled = true;
        self.sessions.remove(&session.key, session.round_id);

        tracing::info!(
            "Card duel {} for {} settled: {} pays {}",
            session.round_id,
            session.key,
            outcome,
            payout
        );
        snapshot.funds = Some(funds);
        Ok(snapshot)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut dyn RandomSource) -> T) -> T {
        let mut rng = self.rng.lock();
        f(&mut **rng)
    }
}

fn duel_record(session: &DuelSession, duel: &CardDuel) -> Result<ActiveGame> {
    Ok(ActiveGame {
        key: session.key,
        round_id: session.round_id.to_string(),
        game: GameKind::CardDuel.as_str().to_string(),
        state: serde_json::to_string(duel)?,
        opened_at: session.opened_at,
        updated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Card, Rank, Suit};
    use crate::coin_flip::CoinBet;
    use crate::dice_gate::Gate;
    use crate::card_duel::DuelOutcome;
    use crate::rng::{ScriptedRng, SeededRng};
    use casino_core::storage::Storage;
    use casino_core::{LedgerConfig, TransactionKind};
    use tempfile::tempdir;

    const ADMIN: PlayerId = PlayerId(77);
    const GROUP: GroupId = GroupId(1);
    const PLAYER: PlayerId = PlayerId(10);

    fn config() -> CasinoConfig {
        CasinoConfig {
            ledger: LedgerConfig::with_admins([ADMIN]),
            games: GameConfig::default(),
        }
    }

    async fn casino_with(config: CasinoConfig, rng: Box<dyn RandomSource>) -> Casino {
        Casino::in_memory(config, rng).await.unwrap()
    }

    async fn casino() -> Casino {
        casino_with(config(), Box::new(SeededRng::new(99))).await
    }

    fn stacked(ranks: &[Rank]) -> impl FnOnce(&mut dyn RandomSource) -> Shoe {
        let cards: Vec<Card> = ranks.iter().map(|r| Card::new(*r, Suit::Hearts)).collect();
        move |_rng| Shoe::stacked(6, cards)
    }

    fn key() -> BalanceKey {
        BalanceKey::new(PLAYER, GROUP)
    }

    #[tokio::test]
    async fn test_start_and_lose_debits_once() {
        let casino = casino().await;
        let snapshot = casino
            .start_card_duel_with(
                PLAYER,
                GROUP,
                100,
                stacked(&[Rank::Ten, Rank::Seven, Rank::Ten, Rank::Nine]),
            )
            .await
            .unwrap();
        assert_eq!(snapshot.dealer_hand.len(), 1);
        assert_eq!(
            casino.get_balance(PLAYER, GROUP).await.unwrap(),
            Funds::Limited(900)
        );

        let done = casino
            .duel_action(PLAYER, GROUP, DuelAction::Stand)
            .await
            .unwrap();
        assert_eq!(done.outcome, Some(DuelOutcome::Lose));
        assert_eq!(done.funds, Some(Funds::Limited(900)));
        assert_eq!(casino.open_duels(), 0);

        let err = casino
            .duel_action(PLAYER, GROUP, DuelAction::Stand)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "no_active_game");

        let history = casino.ledger().history(&key(), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransactionKind::Payout);
        assert_eq!(history[0].amount, 0);
        assert_eq!(history[1].kind, TransactionKind::Wager);
        assert_eq!(history[1].amount, -100);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let casino = casino().await;
        casino
            .start_card_duel_with(
                PLAYER,
                GROUP,
                100,
                stacked(&[Rank::Ten, Rank::Six, Rank::Ten, Rank::Seven, Rank::Four]),
            )
            .await
            .unwrap();

        let mut shoe_built = false;
        let err = casino
            .start_card_duel_with(PLAYER, GROUP, 100, |rng| {
                shoe_built = true;
                Shoe::new(6, rng)
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "game_already_open");
        assert!(!shoe_built);
        assert_eq!(
            casino.get_balance(PLAYER, GROUP).await.unwrap(),
            Funds::Limited(900)
        );

        // the first duel is untouched
        let snapshot = casino
            .duel_action(PLAYER, GROUP, DuelAction::Hit)
            .await
            .unwrap();
        assert_eq!(snapshot.player_value, 20);
        assert!(!snapshot.is_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_open_one_duel() {
        let casino = Arc::new(casino().await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let casino = casino.clone();
            handles.push(tokio::spawn(async move {
                casino.start_card_duel(PLAYER, GROUP, 100).await.is_ok()
            }));
        }

        let mut opened = 0;
        for handle in handles {
            if handle.await.unwrap() {
                opened += 1;
            }
        }

        assert_eq!(opened, 1);
        assert_eq!(casino.open_duels(), 1);
        assert_eq!(
            casino.get_balance(PLAYER, GROUP).await.unwrap(),
            Funds::Limited(900)
        );
    }

    #[tokio::test]
    async fn test_blackjack_settles_two_and_a_half() {
        let casino = casino().await;
        casino
            .start_card_duel_with(
                PLAYER,
                GROUP,
                100,
                stacked(&[Rank::Ace, Rank::King, Rank::Ten, Rank::Seven]),
            )
            .await
            .unwrap();

        let done = casino
            .duel_action(PLAYER, GROUP, DuelAction::Stand)
            .await
            .unwrap();
        assert_eq!(done.payout, 250);
        assert_eq!(done.funds, Some(Funds::Limited(1150)));
    }

    #[tokio::test]
    async fn test_bust_settles_immediately() {
        let casino = casino().await;
        casino
            .start_card_duel_with(
                PLAYER,
                GROUP,
                50,
                stacked(&[Rank::King, Rank::Queen, Rank::Nine, Rank::Seven, Rank::Two]),
            )
            .await
            .unwrap();

        let done = casino
            .duel_action(PLAYER, GROUP, DuelAction::Hit)
            .await
            .unwrap();
        assert_eq!(done.player_value, 22);
        assert_eq!(done.payout, 0);
        assert_eq!(done.funds, Some(Funds::Limited(950)));
        assert_eq!(casino.open_duels(), 0);
    }

    #[tokio::test]
    async fn test_double_debits_extra_stake() {
        let casino = casino().await;
        casino
            .start_card_duel_with(
                PLAYER,
                GROUP,
                100,
                stacked(&[Rank::Five, Rank::Six, Rank::Ten, Rank::Seven, Rank::Nine]),
            )
            .await
            .unwrap();

        let done = casino
            .duel_action(PLAYER, GROUP, DuelAction::Double)
            .await
            .unwrap();
        assert_eq!(done.wager, 200);
        assert_eq!(done.payout, 400);
        assert_eq!(done.funds, Some(Funds::Limited(1200)));

        let wagers: i64 = casino
            .ledger()
            .history(&key(), 10)
            .await
            .unwrap()
            .iter()
            .filter(|r| r.kind == TransactionKind::Wager)
            .map(|r| r.amount)
            .sum();
        assert_eq!(wagers, -200);
    }

    #[tokio::test]
    async fn test_double_without_funds_keeps_duel() {
        let casino = casino().await;
        casino
            .ledger()
            .register_group(GroupId(2), None, Some(150))
            .await
            .unwrap();
        casino
            .start_card_duel_with(
                PLAYER,
                GroupId(2),
                100,
                stacked(&[Rank::Five, Rank::Six, Rank::Ten, Rank::Seven, Rank::Nine]),
            )
            .await
            .unwrap();

        let err = casino
            .duel_action(PLAYER, GroupId(2), DuelAction::Double)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");

        let snapshot = casino.current_duel(PLAYER, GroupId(2)).await.unwrap();
        assert_eq!(snapshot.wager, 100);
        assert_eq!(snapshot.player_hand.len(), 2);
        assert!(snapshot.can_double);
    }

    #[tokio::test]
    async fn test_split_is_unsupported() {
        let casino = casino().await;
        let snapshot = casino
            .start_card_duel_with(
                PLAYER,
                GROUP,
                10,
                stacked(&[Rank::Eight, Rank::Eight, Rank::Ten, Rank::Seven]),
            )
            .await
            .unwrap();
        assert!(snapshot.can_split);

        let err = casino
            .duel_action(PLAYER, GROUP, DuelAction::Split)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unsupported_feature");
        assert_eq!(casino.open_duels(), 1);
    }

    #[tokio::test]
    async fn test_failed_start_releases_slot() {
        let casino = casino().await;

        let err = casino.start_card_duel(PLAYER, GROUP, 5000).await.unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");
        assert_eq!(casino.open_duels(), 0);

        let err = casino.start_card_duel(PLAYER, GROUP, 0).await.unwrap_err();
        assert_eq!(err.code(), "invalid_wager");

        assert!(casino.start_card_duel(PLAYER, GROUP, 500).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_group_rejects_games() {
        let casino = casino().await;
        casino
            .ledger()
            .register_group(GroupId(3), None, None)
            .await
            .unwrap();
        casino
            .ledger()
            .set_group_enabled(GroupId(3), false)
            .await
            .unwrap();

        let err = casino
            .start_card_duel(PLAYER, GroupId(3), 10)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "group_disabled");
        assert_eq!(casino.open_duels(), 0);

        let wagers = CoinWagers::new([(CoinBet::Even, 10)]).unwrap();
        let err = casino
            .play_coin_flip(PLAYER, GroupId(3), &wagers)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "group_disabled");
    }

    #[tokio::test]
    async fn test_dice_gate_triple_pays_three_times() {
        let draw = (1.0 + 0.5) / 6.0; // crab
        let casino = casino_with(config(), Box::new(ScriptedRng::new([draw; 3]))).await;
        let wagers = GateWagers::explicit([(Gate::Crab, 100)]).unwrap();

        let result = casino
            .play_dice_gate(PLAYER, GROUP, &wagers)
            .await
            .unwrap();
        assert_eq!(result.wager, 100);
        assert_eq!(result.payout, 300);
        assert_eq!(result.profit, 200);
        assert_eq!(result.funds, Funds::Limited(1200));
        assert_eq!(result.game(), GameKind::DiceGate);
    }

    #[tokio::test]
    async fn test_coin_flip_pays_every_satisfied_bet() {
        let casino = casino_with(
            config(),
            Box::new(ScriptedRng::new([0.1, 0.9, 0.3, 0.6])),
        )
        .await;
        let wagers = CoinWagers::new([(CoinBet::TwoRed, 10), (CoinBet::Even, 10), (CoinBet::Odd, 10)])
            .unwrap();

        let result = casino
            .play_coin_flip(PLAYER, GROUP, &wagers)
            .await
            .unwrap();
        assert_eq!(result.wager, 30);
        assert_eq!(result.payout, 30);
        assert_eq!(result.profit, 0);
        assert_eq!(result.funds, Funds::Limited(1000));
    }

    #[tokio::test]
    async fn test_instant_game_overdraw_rejected() {
        let casino = casino().await;
        let wagers = GateWagers::split_evenly(1200, &[Gate::Fish, Gate::Deer]).unwrap();

        let err = casino
            .play_dice_gate(PLAYER, GROUP, &wagers)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "insufficient_funds");
        assert!(casino.ledger().history(&key(), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_payout_write_leaves_no_stake() {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let ledger = Arc::new(Ledger::with_storage(storage.clone(), config().ledger).unwrap());
        let casino = Casino::new(ledger, GameConfig::default(), Box::new(SeededRng::new(3))).unwrap();
        storage
            .get_connection()
            .await
            .execute_batch(
                "CREATE TRIGGER reject_payouts BEFORE INSERT ON transactions
                 WHEN NEW.kind = 'payout'
                 BEGIN SELECT RAISE(ABORT, 'payout rejected'); END;",
            )
            .unwrap();

        let wagers = GateWagers::explicit([(Gate::Crab, 100)]).unwrap();
        let err = casino
            .play_dice_gate(PLAYER, GROUP, &wagers)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "persistence_failure");

        let wagers = CoinWagers::new([(CoinBet::Even, 50)]).unwrap();
        assert!(casino.play_coin_flip(PLAYER, GROUP, &wagers).await.is_err());

        assert!(casino.ledger().history(&key(), 5).await.unwrap().is_empty());
        assert_eq!(
            casino.get_balance(PLAYER, GROUP).await.unwrap(),
            Funds::Limited(1000)
        );
    }

    #[tokio::test]
    async fn test_privileged_player_is_unlimited() {
        let casino = casino().await;
        let wagers = CoinWagers::new([(CoinBet::FourRed, 1_000_000)]).unwrap();

        let result = casino.play_coin_flip(ADMIN, GROUP, &wagers).await.unwrap();
        assert_eq!(result.funds, Funds::Unlimited);
        assert_eq!(
            casino.get_balance(ADMIN, GROUP).await.unwrap(),
            Funds::Unlimited
        );
    }

    async fn age_session(casino: &Casino) {
        let session = casino.sessions.get(&key()).unwrap();
        session.lock().await.last_action_at = Utc::now() - TimeDelta::try_hours(1).unwrap();
    }

    #[tokio::test]
    async fn test_idle_duel_is_forfeited() {
        let casino = casino().await;
        casino.start_card_duel(PLAYER, GROUP, 100).await.unwrap();

        assert_eq!(casino.expire_idle_duels().await.unwrap(), 0);
        age_session(&casino).await;
        assert_eq!(casino.expire_idle_duels().await.unwrap(), 1);

        assert_eq!(casino.open_duels(), 0);
        assert_eq!(
            casino.get_balance(PLAYER, GROUP).await.unwrap(),
            Funds::Limited(900)
        );
        let last = casino.ledger().history(&key(), 1).await.unwrap().remove(0);
        assert_eq!(last.kind, TransactionKind::Payout);
        assert_eq!(last.amount, 0);
        assert!(last.description.contains("ABANDONED"));
    }

    #[tokio::test]
    async fn test_idle_duel_refund_policy() {
        let mut config = config();
        config.games.abandon_policy = AbandonPolicy::Refund;
        let casino = casino_with(config, Box::new(SeededRng::new(4))).await;

        casino.start_card_duel(PLAYER, GROUP, 100).await.unwrap();
        age_session(&casino).await;
        assert_eq!(casino.expire_idle_duels().await.unwrap(), 1);

        assert_eq!(
            casino.get_balance(PLAYER, GROUP).await.unwrap(),
            Funds::Limited(1000)
        );
        assert!(casino.start_card_duel(PLAYER, GROUP, 100).await.is_ok());
    }

    #[tokio::test]
    async fn test_reaper_task_expires_duels() {
        let casino = Arc::new(casino().await);
        casino.start_card_duel(PLAYER, GROUP, 100).await.unwrap();
        age_session(&casino).await;

        let handle = casino.clone().spawn_idle_reaper(Duration::from_millis(10));
        for _ in 0..50 {
            if casino.open_duels() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(casino.open_duels(), 0);
    }

    async fn reopen(dir: &Path, config: CasinoConfig) -> Casino {
        Casino::open_with_rng(dir, config, Box::new(SeededRng::new(5)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_duel_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        {
            let casino = reopen(temp_dir.path(), config()).await;
            casino
                .start_card_duel_with(
                    PLAYER,
                    GROUP,
                    100,
                    stacked(&[Rank::Ten, Rank::Six, Rank::Ten, Rank::Seven, Rank::Four]),
                )
                .await
                .unwrap();
            casino
                .duel_action(PLAYER, GROUP, DuelAction::Hit)
                .await
                .unwrap();
        }

        let casino = reopen(temp_dir.path(), config()).await;
        assert_eq!(casino.open_duels(), 1);
        let snapshot = casino.current_duel(PLAYER, GROUP).await.unwrap();
        assert_eq!(snapshot.player_value, 20);
        assert_eq!(snapshot.wager, 100);
        assert_eq!(
            casino.get_balance(PLAYER, GROUP).await.unwrap(),
            Funds::Limited(900)
        );

        let err = casino.start_card_duel(PLAYER, GROUP, 10).await.unwrap_err();
        assert_eq!(err.code(), "game_already_open");

        let done = casino
            .duel_action(PLAYER, GROUP, DuelAction::Stand)
            .await
            .unwrap();
        assert_eq!(done.outcome, Some(DuelOutcome::Win));
        assert_eq!(done.funds, Some(Funds::Limited(1100)));
        assert!(casino.ledger().active_games().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finished_duel_is_paid_on_open() {
        let temp_dir = tempdir().unwrap();
        {
            let casino = reopen(temp_dir.path(), config()).await;
            let mut rng = SeededRng::new(1);
            let ranks = [Rank::Ace, Rank::King, Rank::Ten, Rank::Seven];
            let shoe = Shoe::stacked(6, ranks.map(|r| Card::new(r, Suit::Hearts)));
            let mut duel = CardDuel::deal(100, shoe, &mut rng).unwrap();
            duel.stand(&mut rng).unwrap();

            let record = ActiveGame {
                key: key(),
                round_id: Uuid::new_v4().to_string(),
                game: GameKind::CardDuel.as_str().to_string(),
                state: serde_json::to_string(&duel).unwrap(),
                opened_at: Utc::now(),
                updated_at: Utc::now(),
            };
            casino
                .ledger()
                .place_game_wager(&record, 100, "card-duel wager")
                .await
                .unwrap();
        }

        let casino = reopen(temp_dir.path(), config()).await;
        assert_eq!(casino.open_duels(), 0);
        assert_eq!(
            casino.get_balance(PLAYER, GROUP).await.unwrap(),
            Funds::Limited(1150)
        );
        assert!(casino.ledger().active_games().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restored_idle_duel_is_refunded() {
        let mut config = config();
        config.games.abandon_policy = AbandonPolicy::Refund;
        let temp_dir = tempdir().unwrap();
        {
            let casino = reopen(temp_dir.path(), config.clone()).await;
            casino.start_card_duel(PLAYER, GROUP, 100).await.unwrap();
        }

        let casino = reopen(temp_dir.path(), config).await;
        assert_eq!(casino.open_duels(), 1);
        age_session(&casino).await;
        assert_eq!(casino.expire_idle_duels().await.unwrap(), 1);

        assert_eq!(
            casino.get_balance(PLAYER, GROUP).await.unwrap(),
            Funds::Limited(1000)
        );
        assert!(casino.ledger().active_games().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_passthrough() {
        let casino = casino().await;
        let receipt = casino
            .transfer(PLAYER, PlayerId(11), GROUP, 50)
            .await
            .unwrap();
        assert_eq!(receipt.from_funds, Funds::Limited(950));
        assert_eq!(receipt.to_funds, Funds::Limited(1050));

        let err = casino
            .transfer(PLAYER, PLAYER, GROUP, 50)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "self_transfer");
    }
}
