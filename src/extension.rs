//! The extension: owns the connection to the interception host, keeps the session snapshot
//! current, and drives startup and the trade run.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::BridgeClient;
use crate::config::AppConfig;
use crate::coordination::{NamedGate, Shutdown};
use crate::domain::{find_item, tradeable_names, TradeItem, TradeTarget};
use crate::error::{Result, TraderError};
use crate::session::{MessageSink, OutgoingMessage, SessionEvent, SessionState};
use crate::trade::{SharedSelection, TradeEventHandler, TradeLatch, TradeOrchestrator};

pub struct TraderExtension {
    config: AppConfig,
    sink: Arc<dyn MessageSink>,
    session: Arc<RwLock<SessionState>>,
    selection: SharedSelection,
    latch: Arc<TradeLatch>,
    gate: NamedGate,
    shutdown: Arc<Shutdown>,
    dispatcher: JoinHandle<()>,
}

impl TraderExtension {
    /// Connect to the interception host on `port`
    pub async fn connect(
        config: AppConfig,
        port: u16,
        gate: NamedGate,
        shutdown: Arc<Shutdown>,
    ) -> Result<Self> {
        let (client, events) = BridgeClient::connect(
            &config.connection.host,
            port,
            config.connection.connect_timeout(),
        )
        .await?;
        Ok(Self::with_transport(
            config,
            Arc::new(client),
            events,
            gate,
            shutdown,
        ))
    }

    /// Build on an already established transport
    pub fn with_transport(
        config: AppConfig,
        sink: Arc<dyn MessageSink>,
        events: mpsc::Receiver<SessionEvent>,
        gate: NamedGate,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let session = Arc::new(RwLock::new(SessionState::new()));
        let selection = SharedSelection::new();
        let handler = TradeEventHandler::new(
            sink.clone(),
            selection.clone(),
            shutdown.clone(),
            config.trade.confirm_delay(),
        );
        let latch = handler.latch();
        let dispatcher = tokio::spawn(dispatch(events, session.clone(), handler, shutdown.clone()));

        Self {
            config,
            sink,
            session,
            selection,
            latch,
            gate,
            shutdown,
            dispatcher,
        }
    }

    /// Startup sequence: game connection, profile, room with company, inventory
    pub async fn start(&self) -> Result<()> {
        self.ensure_game_connected().await?;
        self.load_profile().await?;
        self.ensure_in_room().await?;
        self.load_inventory().await?;
        Ok(())
    }

    /// Room occupants other than the player, in room order
    pub async fn users_to_trade(&self) -> Vec<String> {
        self.session.read().await.users_to_trade()
    }

    /// Tradeable furniture names, deduplicated
    pub async fn furniture_to_trade(&self) -> Vec<String> {
        self.session
            .read()
            .await
            .inventory
            .as_deref()
            .map(tradeable_names)
            .unwrap_or_default()
    }

    /// Select the partner and item, synchronise with the other process, then run the trade loop
    /// until it hits a fatal condition or the run is cancelled
    pub async fn trade(&self, username: &str, furniture: &str) -> Result<()> {
        info!("User {} selected to trade with furniture {}", username, furniture);

        let (target, item) = {
            let session = self.session.read().await;
            let target = session
                .room
                .as_ref()
                .and_then(|room| room.find_user(username))
                .map(TradeTarget::from);
            let item = session
                .inventory
                .as_deref()
                .and_then(|items| find_item(items, furniture))
                .map(TradeItem::from);
            (target, item)
        };
        self.selection.select(target, item).await;

        self.gate.arrive(&self.shutdown).await?;

        let outcome = TradeOrchestrator::new(
            self.sink.clone(),
            self.selection.clone(),
            self.session.clone(),
            self.gate.role(),
            self.config.trade.tick_interval(),
        )
        .with_names(username, furniture)
        .run(&self.shutdown)
        .await;

        // Nothing may be confirmed once the run is over
        self.latch.reset();
        outcome
    }

    async fn ensure_game_connected(&self) -> Result<()> {
        info!("Awaiting to habbo connection...");
        self.wait_until(self.config.connection.poll_interval(), |s| s.connected)
            .await
    }

    async fn load_profile(&self) -> Result<()> {
        info!("Getting user information...");
        self.sink.send(OutgoingMessage::RequestUserData).await?;
        self.wait_until(self.config.connection.poll_interval(), |s| {
            s.profile.is_some()
        })
        .await?;

        if let Some(profile) = &self.session.read().await.profile {
            info!("Welcome {} to TraderUp", profile.name);
        }
        Ok(())
    }

    async fn ensure_in_room(&self) -> Result<()> {
        let self_id = self
            .session
            .read()
            .await
            .profile
            .as_ref()
            .map(|p| p.id)
            .ok_or_else(|| TraderError::Internal("profile not loaded".into()))?;
        let mut last_room: Option<i64> = None;

        loop {
            info!("Enter a room...");
            self.wait_until(self.config.trade.room_poll(), |s| {
                s.room.as_ref().is_some_and(|room| Some(room.id) != last_room)
            })
            .await?;

            let Some(room) = self.session.read().await.room.clone() else {
                continue;
            };
            info!(
                "Entered a room {} from {} with {} users...",
                room.name,
                room.owner_name,
                room.users.len()
            );

            if !room.has_user_to_trade(self_id) {
                warn!("There are no other users in this room");
                last_room = Some(room.id);
                continue;
            }

            return Ok(());
        }
    }

    async fn load_inventory(&self) -> Result<()> {
        info!("Loading inventory...");
        self.sink.send(OutgoingMessage::RequestInventory).await?;
        self.wait_until(self.config.connection.poll_interval(), |s| {
            s.inventory.is_some()
        })
        .await?;
        info!("Inventory loaded");
        Ok(())
    }

    /// Poll the session snapshot until `ready` holds, or the run is cancelled
    async fn wait_until<F>(&self, poll: Duration, mut ready: F) -> Result<()>
    where
        F: FnMut(&SessionState) -> bool,
    {
        loop {
            if ready(&*self.session.read().await) {
                return Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = self.shutdown.cancelled() => return Err(self.shutdown.take_error()),
            }
        }
    }
}

impl Drop for TraderExtension {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

/// Fold every notification into the snapshot, then hand it to the trade handlers. The first
/// handler error cancels the run.
async fn dispatch(
    mut events: mpsc::Receiver<SessionEvent>,
    session: Arc<RwLock<SessionState>>,
    handler: TradeEventHandler,
    shutdown: Arc<Shutdown>,
) {
    while let Some(event) = events.recv().await {
        debug!(event = event.kind(), "session event");
        session.write().await.apply(&event);

        if let Err(e) = handler.handle(&event).await {
            shutdown.fail(e);
            return;
        }
    }
    debug!("session event stream ended");
}
