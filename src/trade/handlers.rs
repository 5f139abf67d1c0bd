//! Notification handlers.
//!
//! Run on the dispatcher task, concurrently with the polling loop. Any error returned here ends
//! the run through the shared `Shutdown`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::selection::SharedSelection;
use crate::coordination::Shutdown;
use crate::domain::{InventoryItem, TradeItem, TradeOffer};
use crate::error::{Result, TraderError};
use crate::session::{MessageSink, OutgoingMessage, SessionEvent};

/// Accept state of the trade currently open.
///
/// A scheduled confirm belongs to the generation it was scheduled in and is dropped once the
/// trade is closed, completed, replaced by a new one, or the run ends.
#[derive(Debug, Default)]
pub struct TradeLatch {
    accepted: AtomicBool,
    generation: AtomicU64,
}

impl TradeLatch {
    /// True for the first accept of the current trade only
    fn try_accept(&self) -> bool {
        !self.accepted.swap(true, Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Forget the current trade: re-arm the accept and void any confirm still waiting
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.accepted.store(false, Ordering::SeqCst);
    }
}

pub struct TradeEventHandler {
    sink: Arc<dyn MessageSink>,
    selection: SharedSelection,
    shutdown: Arc<Shutdown>,
    confirm_delay: Duration,
    latch: Arc<TradeLatch>,
}

impl TradeEventHandler {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        selection: SharedSelection,
        shutdown: Arc<Shutdown>,
        confirm_delay: Duration,
    ) -> Self {
        Self {
            sink,
            selection,
            shutdown,
            confirm_delay,
            latch: Arc::new(TradeLatch::default()),
        }
    }

    /// Shared with the trade run so it can void pending confirms when it ends
    pub fn latch(&self) -> Arc<TradeLatch> {
        self.latch.clone()
    }

    pub async fn handle(&self, event: &SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Connected {
                hotel,
                client_identifier,
                client_version,
            } => {
                info!(
                    "Connected to the Hotel {}, Client {} - Version {}",
                    hotel, client_identifier, client_version
                );
                Ok(())
            }
            SessionEvent::Disconnected => Err(TraderError::SessionLeft("Connection closed".into())),
            SessionEvent::RoomLeft => self.on_room_left().await,
            SessionEvent::UserRemoved { index } => self.on_user_removed(index).await,
            SessionEvent::InventoryItemUpdated { item } => self.on_item_updated(item).await,
            SessionEvent::TradeOpened {
                initiator,
                partner_id,
            } => self.on_trade_opened(*initiator, *partner_id).await,
            SessionEvent::TradeUpdated {
                self_offer,
                partner_offer,
            } => self.on_trade_updated(self_offer, partner_offer).await,
            SessionEvent::TradeItemList { first, second } => {
                if first.furni_count > 1 || second.furni_count > 1 {
                    info!("Item offered to trade");
                }
                Ok(())
            }
            SessionEvent::TradeClosed | SessionEvent::TradeCompleted => {
                self.latch.reset();
                Ok(())
            }
            SessionEvent::UserData { .. }
            | SessionEvent::RoomEntered { .. }
            | SessionEvent::UsersAdded { .. }
            | SessionEvent::InventoryLoaded { .. } => Ok(()),
        }
    }

    async fn on_room_left(&self) -> Result<()> {
        if self.selection.is_empty().await {
            return Ok(());
        }
        Err(TraderError::LeftRoom)
    }

    async fn on_user_removed(&self, index: &str) -> Result<()> {
        let Ok(index) = index.trim().parse::<i32>() else {
            return Ok(());
        };
        if let Some(target) = self.selection.clear_target_if_index(index).await {
            warn!(index, "User {} left the room", target.name);
        }
        Ok(())
    }

    /// The game identifies offered furniture by a negative id; this notification carries it
    /// positive, so it is normalised before the item is stored.
    async fn on_item_updated(&self, item: &InventoryItem) -> Result<()> {
        let fresh = TradeItem::from(&item.clone().with_trade_identifier());
        let trade_id = fresh.trade_id;
        if self.selection.replace_item(fresh).await {
            info!(trade_id, "Trade item refreshed: {}", item.name);
        }
        Ok(())
    }

    async fn on_trade_opened(&self, initiator: bool, partner_id: i64) -> Result<()> {
        info!("Trade opened");
        self.latch.reset();

        let (target, item) = self.selection.snapshot().await;
        let expected = target.as_ref().is_some_and(|t| t.id == partner_id);

        if !initiator && !expected {
            warn!(partner_id, "Trade opened by an unexpected user, closing it");
            return self.sink.send(OutgoingMessage::CloseTrade).await;
        }

        match item {
            Some(item) => {
                info!("Offer item to trade");
                self.sink
                    .send(OutgoingMessage::OfferTradeItems {
                        item_ids: vec![item.trade_id],
                    })
                    .await
            }
            None => {
                warn!("No item selected to offer");
                Ok(())
            }
        }
    }

    async fn on_trade_updated(&self, own: &TradeOffer, partner: &TradeOffer) -> Result<()> {
        if !own.has_furni() || !partner.has_furni() {
            return Ok(());
        }
        if !self.latch.try_accept() {
            return Ok(());
        }
        let generation = self.latch.generation();

        info!("Accepting trade...");
        self.sink.send(OutgoingMessage::AcceptTrade).await?;

        let sink = self.sink.clone();
        let shutdown = self.shutdown.clone();
        let latch = self.latch.clone();
        let delay = self.confirm_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return,
            }
            if latch.generation() != generation {
                debug!(generation, "trade ended before confirm, dropping it");
                return;
            }
            match sink.send(OutgoingMessage::ConfirmAcceptTrade).await {
                Ok(()) => info!("Trading confirmed"),
                Err(e) => shutdown.fail(e),
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TradeTarget;
    use crate::session::testing::RecordingSink;
    use crate::session::MockMessageSink;

    const CONFIRM_DELAY: Duration = Duration::from_millis(3_150);

    async fn handler(sink: Arc<dyn MessageSink>) -> (TradeEventHandler, SharedSelection) {
        let selection = SharedSelection::new();
        selection
            .select(
                Some(TradeTarget {
                    id: 20,
                    name: "bob".into(),
                    index: 4,
                }),
                Some(TradeItem {
                    id: 5,
                    trade_id: -5,
                    name: "Throne".into(),
                }),
            )
            .await;
        let handler =
            TradeEventHandler::new(sink, selection.clone(), Shutdown::new(), CONFIRM_DELAY);
        (handler, selection)
    }

    fn offers(own: u32, partner: u32) -> SessionEvent {
        SessionEvent::TradeUpdated {
            self_offer: TradeOffer {
                furni_count: own,
                credit_count: 0,
            },
            partner_offer: TradeOffer {
                furni_count: partner,
                credit_count: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_item_update_negates_identifier() {
        let sink = Arc::new(RecordingSink::default());
        let (handler, selection) = handler(sink).await;

        for id in [42, -42] {
            handler
                .handle(&SessionEvent::InventoryItemUpdated {
                    item: InventoryItem {
                        id,
                        item_id: 1,
                        name: "Throne".into(),
                        tradeable: true,
                    },
                })
                .await
                .unwrap();
            assert_eq!(selection.snapshot().await.1.unwrap().trade_id, -42);
        }
    }

    #[tokio::test]
    async fn test_user_removed_matching_index() {
        let sink = Arc::new(RecordingSink::default());
        let (handler, selection) = handler(sink).await;

        handler
            .handle(&SessionEvent::UserRemoved { index: "9".into() })
            .await
            .unwrap();
        handler
            .handle(&SessionEvent::UserRemoved {
                index: "bob".into(),
            })
            .await
            .unwrap();
        assert!(selection.snapshot().await.0.is_some());

        handler
            .handle(&SessionEvent::UserRemoved { index: "4".into() })
            .await
            .unwrap();
        assert!(selection.snapshot().await.0.is_none());
    }

    #[tokio::test]
    async fn test_unexpected_partner_is_closed_without_offer() {
        let mut sink = MockMessageSink::new();
        sink.expect_send()
            .withf(|message| *message == OutgoingMessage::CloseTrade)
            .times(1)
            .returning(|_| Ok(()));

        let (handler, _) = handler(Arc::new(sink)).await;
        handler
            .handle(&SessionEvent::TradeOpened {
                initiator: false,
                partner_id: 99,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expected_partner_gets_offer() {
        let sink = Arc::new(RecordingSink::default());
        let (handler, _) = handler(sink.clone()).await;

        handler
            .handle(&SessionEvent::TradeOpened {
                initiator: false,
                partner_id: 20,
            })
            .await
            .unwrap();
        // Trades we opened are offered into regardless of the partner id reported.
        handler
            .handle(&SessionEvent::TradeOpened {
                initiator: true,
                partner_id: 99,
            })
            .await
            .unwrap();

        assert_eq!(
            sink.sent(),
            vec![
                OutgoingMessage::OfferTradeItems { item_ids: vec![-5] },
                OutgoingMessage::OfferTradeItems { item_ids: vec![-5] },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_then_confirm_once() {
        let sink = Arc::new(RecordingSink::default());
        let (handler, _) = handler(sink.clone()).await;

        handler.handle(&offers(1, 0)).await.unwrap();
        assert!(sink.sent().is_empty());

        handler.handle(&offers(1, 1)).await.unwrap();
        assert_eq!(sink.sent(), vec![OutgoingMessage::AcceptTrade]);

        // Later updates of the same trade do not accept again.
        handler.handle(&offers(1, 2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(sink.count("confirm_accept_trade"), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        handler.handle(&offers(1, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            sink.sent(),
            vec![
                OutgoingMessage::AcceptTrade,
                OutgoingMessage::ConfirmAcceptTrade
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_trade_can_be_accepted_again() {
        let sink = Arc::new(RecordingSink::default());
        let (handler, _) = handler(sink.clone()).await;

        handler.handle(&offers(1, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        handler.handle(&SessionEvent::TradeCompleted).await.unwrap();
        handler.handle(&offers(1, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(sink.count("accept_trade"), 2);
        assert_eq!(sink.count("confirm_accept_trade"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_dropped_when_trade_closes_early() {
        let sink = Arc::new(RecordingSink::default());
        let (handler, _) = handler(sink.clone()).await;

        handler.handle(&offers(1, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        handler.handle(&SessionEvent::TradeClosed).await.unwrap();

        // The next trade opens inside the old settle window
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        handler
            .handle(&SessionEvent::TradeOpened {
                initiator: true,
                partner_id: 20,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(
            sink.sent(),
            vec![
                OutgoingMessage::AcceptTrade,
                OutgoingMessage::OfferTradeItems { item_ids: vec![-5] },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_dropped_when_run_ends() {
        let sink = Arc::new(RecordingSink::default());
        let (handler, _) = handler(sink.clone()).await;
        let latch = handler.latch();

        handler.handle(&offers(1, 1)).await.unwrap();
        latch.reset();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(sink.count("accept_trade"), 1);
        assert_eq!(sink.count("confirm_accept_trade"), 0);
    }

    #[tokio::test]
    async fn test_session_loss_and_room_exit_are_fatal() {
        let sink = Arc::new(RecordingSink::default());
        let (handler, selection) = handler(sink).await;

        assert!(matches!(
            handler.handle(&SessionEvent::Disconnected).await,
            Err(TraderError::SessionLeft(_))
        ));
        assert!(matches!(
            handler.handle(&SessionEvent::RoomLeft).await,
            Err(TraderError::LeftRoom)
        ));

        selection.select(None, None).await;
        assert!(handler.handle(&SessionEvent::RoomLeft).await.is_ok());
    }
}
