//! Trade Orchestrator
//!
//! Fixed-cadence polling loop that opens the trade window with the selected user. Every tick
//! walks the guards in order:
//! 1. target gone: stop, the run ends
//! 2. item gone: stop, the run ends
//! 3. not the active sender, or a trade is already open: wait for the next tick
//! 4. otherwise send the trade-open command to the target's room index
//!
//! Once a trade window is open the offer/accept/confirm steps are driven by notifications
//! (see `handlers`), not by this loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{info, trace, warn};

use super::selection::SharedSelection;
use crate::coordination::{Shutdown, SyncRole};
use crate::domain::{OrchestratorState, StateTransition, TradeItem, TradeTarget};
use crate::error::{Result, TraderError};
use crate::session::{MessageSink, OutgoingMessage, SessionState};

/// Outcome of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    TargetLeft,
    ItemGone,
    Idle,
    OpenTrade { index: i32 },
}

impl TickDecision {
    /// State the tick settles in
    pub fn state(&self) -> OrchestratorState {
        self.path()[self.path().len() - 1]
    }

    /// States the tick walks through, in order
    pub fn path(&self) -> &'static [OrchestratorState] {
        use OrchestratorState::*;
        match self {
            TickDecision::TargetLeft => &[AwaitingPartnerPresence, TerminatedTargetLeft],
            TickDecision::ItemGone => &[
                AwaitingPartnerPresence,
                AwaitingItemPresence,
                TerminatedItemGone,
            ],
            TickDecision::Idle => &[
                AwaitingPartnerPresence,
                AwaitingItemPresence,
                IdleWhileTrading,
            ],
            TickDecision::OpenTrade { .. } => {
                &[AwaitingPartnerPresence, AwaitingItemPresence, ReadyToOpen]
            }
        }
    }
}

/// Evaluate the guards in precedence order
pub fn decide(
    target: Option<&TradeTarget>,
    item: Option<&TradeItem>,
    active_sender: bool,
    trading: bool,
) -> TickDecision {
    let Some(target) = target else {
        return TickDecision::TargetLeft;
    };
    if item.is_none() {
        return TickDecision::ItemGone;
    }
    if !active_sender || trading {
        return TickDecision::Idle;
    }
    TickDecision::OpenTrade {
        index: target.index,
    }
}

pub struct TradeOrchestrator {
    sink: Arc<dyn MessageSink>,
    selection: SharedSelection,
    session: Arc<RwLock<SessionState>>,
    role: SyncRole,
    tick_interval: Duration,
    username: String,
    furniture: String,
    state: OrchestratorState,
    last_transition: Option<StateTransition>,
}

impl TradeOrchestrator {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        selection: SharedSelection,
        session: Arc<RwLock<SessionState>>,
        role: SyncRole,
        tick_interval: Duration,
    ) -> Self {
        Self {
            sink,
            selection,
            session,
            role,
            tick_interval,
            username: String::new(),
            furniture: String::new(),
            state: OrchestratorState::AwaitingPartnerPresence,
            last_transition: None,
        }
    }

    /// Names the operator picked, used when reporting why the loop stopped
    pub fn with_names(mut self, username: impl Into<String>, furniture: impl Into<String>) -> Self {
        self.username = username.into();
        self.furniture = furniture.into();
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.last_transition.as_ref()
    }

    /// Run one tick; sends the trade-open command when the guards allow it
    pub async fn tick(&mut self) -> Result<TickDecision> {
        let (target, item) = self.selection.snapshot().await;
        let trading = self.session.read().await.trading;

        let decision = decide(
            target.as_ref(),
            item.as_ref(),
            self.role.is_active_sender(),
            trading,
        );
        self.walk(decision);

        if let TickDecision::OpenTrade { index } = decision {
            info!("Open trading...");
            self.sink.send(OutgoingMessage::TradeUser { index }).await?;
        }

        Ok(decision)
    }

    /// Tick until the target or item is gone, or the run is cancelled
    pub async fn run(mut self, shutdown: &Shutdown) -> Result<()> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            role = %self.role,
            tick_ms = self.tick_interval.as_millis() as u64,
            "Trade loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => return Err(shutdown.take_error()),
            }

            match self.tick().await? {
                TickDecision::TargetLeft => {
                    return Err(TraderError::TargetLeft {
                        username: self.username.clone(),
                    })
                }
                TickDecision::ItemGone => {
                    return Err(TraderError::ItemExhausted {
                        furniture: self.furniture.clone(),
                    })
                }
                TickDecision::Idle | TickDecision::OpenTrade { .. } => {}
            }
        }
    }

    fn walk(&mut self, decision: TickDecision) {
        for &next in decision.path() {
            if next == self.state {
                continue;
            }
            if !self.state.can_transition_to(next) {
                warn!(from = %self.state, to = %next, "unexpected trade loop transition");
            }
            let transition = StateTransition::new(self.state, next);
            trace!(from = %transition.from, to = %transition.to, "trade loop state");
            self.state = next;
            self.last_transition = Some(transition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::ShutdownSignal;
    use crate::session::testing::RecordingSink;
    use crate::session::{MockMessageSink, SessionEvent};

    fn target() -> TradeTarget {
        TradeTarget {
            id: 20,
            name: "bob".into(),
            index: 4,
        }
    }

    fn item() -> TradeItem {
        TradeItem {
            id: 5,
            trade_id: -5,
            name: "Throne".into(),
        }
    }

    #[test]
    fn test_decide_precedence() {
        let t = target();
        let i = item();

        // Target check wins over everything
        assert_eq!(decide(None, None, true, false), TickDecision::TargetLeft);
        assert_eq!(decide(None, Some(&i), true, true), TickDecision::TargetLeft);
        assert_eq!(decide(Some(&t), None, true, false), TickDecision::ItemGone);
        assert_eq!(decide(Some(&t), Some(&i), false, false), TickDecision::Idle);
        assert_eq!(decide(Some(&t), Some(&i), true, true), TickDecision::Idle);
        assert_eq!(
            decide(Some(&t), Some(&i), true, false),
            TickDecision::OpenTrade { index: 4 }
        );
    }

    #[test]
    fn test_never_opens_without_selection_or_while_trading() {
        let t = target();
        let i = item();
        for target in [None, Some(&t)] {
            for item in [None, Some(&i)] {
                for active in [false, true] {
                    for trading in [false, true] {
                        let decision = decide(target, item, active, trading);
                        let opens = matches!(decision, TickDecision::OpenTrade { .. });
                        assert_eq!(
                            opens,
                            target.is_some() && item.is_some() && active && !trading
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_tick_paths_are_valid_transitions() {
        let decisions = [
            TickDecision::TargetLeft,
            TickDecision::ItemGone,
            TickDecision::Idle,
            TickDecision::OpenTrade { index: 4 },
        ];
        for decision in decisions {
            let path = decision.path();
            assert_eq!(path[0], OrchestratorState::AwaitingPartnerPresence);
            assert_eq!(*path.last().unwrap(), decision.state());
            for step in path.windows(2) {
                assert!(step[0].can_transition_to(step[1]), "{} -> {}", step[0], step[1]);
            }
            // Non-terminal ticks loop back to the first guard
            if !decision.state().is_terminal() {
                assert!(decision
                    .state()
                    .can_transition_to(OrchestratorState::AwaitingPartnerPresence));
            }
        }
    }

    async fn orchestrator(
        sink: Arc<dyn MessageSink>,
        role: SyncRole,
        trading: bool,
    ) -> (TradeOrchestrator, SharedSelection, Arc<RwLock<SessionState>>) {
        let selection = SharedSelection::new();
        selection.select(Some(target()), Some(item())).await;
        let session = Arc::new(RwLock::new(SessionState {
            trading,
            ..SessionState::default()
        }));
        let orchestrator = TradeOrchestrator::new(
            sink,
            selection.clone(),
            session.clone(),
            role,
            Duration::from_secs(1),
        )
        .with_names("bob", "Throne");
        (orchestrator, selection, session)
    }

    #[tokio::test]
    async fn test_tick_sends_one_trade_open() {
        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .withf(|message| *message == OutgoingMessage::TradeUser { index: 4 })
            .times(1)
            .returning(|_| Ok(()));

        let (mut orchestrator, _, _) = orchestrator(Arc::new(sink), SyncRole::Waiter, false).await;
        let decision = orchestrator.tick().await.unwrap();

        assert_eq!(decision, TickDecision::OpenTrade { index: 4 });
        assert_eq!(orchestrator.state(), OrchestratorState::ReadyToOpen);
        let last = orchestrator.last_transition().unwrap();
        assert_eq!(last.from, OrchestratorState::AwaitingItemPresence);
        assert_eq!(last.to, OrchestratorState::ReadyToOpen);
    }

    #[tokio::test]
    async fn test_signaler_never_sends() {
        let mut sink = MockMessageSink::new();
        sink.expect_send().times(0);

        let (mut orchestrator, _, _) =
            orchestrator(Arc::new(sink), SyncRole::Signaler, false).await;
        for _ in 0..3 {
            assert_eq!(orchestrator.tick().await.unwrap(), TickDecision::Idle);
        }
        assert_eq!(orchestrator.state(), OrchestratorState::IdleWhileTrading);
    }

    #[tokio::test]
    async fn test_no_send_while_trade_open() {
        let sink = Arc::new(RecordingSink::default());
        let (mut orchestrator, _, session) =
            orchestrator(sink.clone(), SyncRole::Waiter, true).await;

        assert_eq!(orchestrator.tick().await.unwrap(), TickDecision::Idle);
        assert!(sink.sent().is_empty());

        session.write().await.apply(&SessionEvent::TradeClosed);
        assert_eq!(
            orchestrator.tick().await.unwrap(),
            TickDecision::OpenTrade { index: 4 }
        );
        assert_eq!(sink.count("trade_user"), 1);
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .returning(|_| Err(TraderError::Protocol("broken pipe".into())));

        let (mut orchestrator, _, _) = orchestrator(Arc::new(sink), SyncRole::Waiter, false).await;
        assert!(matches!(
            orchestrator.tick().await,
            Err(TraderError::Protocol(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_target_leaves() {
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, selection, session) =
            orchestrator(sink.clone(), SyncRole::Waiter, false).await;
        let shutdown = Shutdown::new();

        let run = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { orchestrator.run(&shutdown).await })
        };

        // First tick fires immediately and opens the trade.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.count("trade_user"), 1);
        session.write().await.trading = true;

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.count("trade_user"), 1);

        selection.clear_target_if_index(4).await;
        let result = run.await.unwrap();
        assert!(matches!(
            result,
            Err(TraderError::TargetLeft { ref username }) if username == "bob"
        ));
        assert_eq!(sink.count("trade_user"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_missing_item() {
        let sink = Arc::new(RecordingSink::default());
        let selection = SharedSelection::new();
        selection.select(Some(target()), None).await;
        let orchestrator = TradeOrchestrator::new(
            sink.clone(),
            selection,
            Arc::new(RwLock::new(SessionState::default())),
            SyncRole::Waiter,
            Duration::from_secs(1),
        )
        .with_names("bob", "Throne");

        let result = orchestrator.run(&Shutdown::new()).await;
        assert!(matches!(
            result,
            Err(TraderError::ItemExhausted { ref furniture }) if furniture == "Throne"
        ));
        assert!(sink.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cancels_promptly() {
        let sink = Arc::new(RecordingSink::default());
        let (orchestrator, _, _) = orchestrator(sink, SyncRole::Signaler, false).await;
        let shutdown = Shutdown::new();

        let run = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { orchestrator.run(&shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        shutdown.request(ShutdownSignal::Operator);

        let result = run.await.unwrap();
        assert!(matches!(result, Err(TraderError::Cancelled)));
    }
}
