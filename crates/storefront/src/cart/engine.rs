//! The cart synchronization engine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

use zenro_core::{
    Cart, ProductId, ProductSnapshot, Session, SlotKey, UserId, normalize_requested,
};

use super::scheduler::WriteScheduler;
use super::{CartSnapshot, EngineConfig, HandoffPolicy, HydrationMode, SyncContext, SyncErrorKind};
use crate::identity::IdentityProvider;
use crate::stores::{CartDocument, StoreError};

/// Owns one browser's cart and keeps it in sync with the stores.
///
/// Cloning is cheap; clones drive the same engine. Mutations apply
/// synchronously and return the resulting snapshot; persistence happens in
/// background tasks, so every method that can persist must be called from
/// within a tokio runtime.
#[derive(Debug, Clone)]
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

#[derive(Debug)]
struct EngineInner {
    ctx: SyncContext,
    config: EngineConfig,
    state: Mutex<EngineState>,
    scheduler: WriteScheduler,
    /// Serializes remote writes. Held across `merge_write` so a flush that
    /// has already fired lands before a later `clear` writes the empty cart.
    write_lane: AsyncMutex<()>,
    snapshots: watch::Sender<CartSnapshot>,
}

#[derive(Debug)]
struct EngineState {
    cart: Cart,
    session: Session,
    /// Bumped on every session transition; background work carries the
    /// epoch it was started under and is dropped once it no longer matches.
    epoch: u64,
    hydrating: bool,
    writes_in_flight: usize,
    last_error: Option<SyncErrorKind>,
    hydration: Option<AbortHandle>,
    listener: Option<AbortHandle>,
    /// Guest cart waiting to be merged into the hydrating user's cart.
    handoff: Option<Cart>,
}

impl EngineState {
    fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            cart: self.cart.clone(),
            count: self.cart.count(),
            session: self.session.clone(),
            hydrating: self.hydrating,
            syncing: self.writes_in_flight > 0,
            last_error: self.last_error,
        }
    }
}

impl CartEngine {
    /// Create an engine in the guest session, loaded from the guest slot.
    #[must_use]
    pub fn new(ctx: SyncContext, config: EngineConfig) -> Self {
        let cart = read_slot(&ctx, &SlotKey::Guest);
        let state = EngineState {
            cart,
            session: Session::Guest,
            epoch: 0,
            hydrating: false,
            writes_in_flight: 0,
            last_error: None,
            hydration: None,
            listener: None,
            handoff: None,
        };
        let (snapshots, _) = watch::channel(state.snapshot());

        Self {
            inner: Arc::new(EngineInner {
                scheduler: WriteScheduler::new(config.debounce),
                write_lane: AsyncMutex::new(()),
                ctx,
                config,
                state: Mutex::new(state),
                snapshots,
            }),
        }
    }

    /// Follow an identity provider: every transition it reports is applied
    /// with [`CartEngine::on_session_change`], in arrival order.
    ///
    /// Replaces any provider attached earlier.
    pub fn attach(&self, provider: &dyn IdentityProvider) {
        let mut stream = provider.subscribe();
        let engine = Arc::downgrade(&self.inner);

        let listener = tokio::spawn(async move {
            while let Some(identity) = stream.next().await {
                let Some(inner) = engine.upgrade() else {
                    break;
                };
                inner.on_session_change(Session::from(identity));
            }
        });

        let mut state = self.inner.lock();
        if let Some(previous) = state.listener.replace(listener.abort_handle()) {
            previous.abort();
        }
    }

    /// Switch to a new session.
    ///
    /// Tears down the previous session's subscription and pending write
    /// before anything is set up for the new one. A guest session loads the
    /// guest slot; a signed-in session starts hydrating from the remote
    /// store. A change of profile fields for the same user only updates the
    /// published session.
    pub fn on_session_change(&self, session: Session) {
        self.inner.on_session_change(session);
    }

    /// Add `quantity` of a product, accumulating onto an existing line with
    /// the same product and size.
    ///
    /// `quantity` is floored and clamped to at least 1.
    pub fn add_item(&self, product: &ProductSnapshot, size: Option<&str>, quantity: f64) -> CartSnapshot {
        let line = product.to_line(
            size,
            normalize_requested(quantity),
            &self.inner.config.placeholder_image,
        );
        self.inner.mutate(move |cart| {
            cart.add(line);
            true
        })
    }

    /// Remove a line. No-op when nothing matches.
    pub fn remove_item(&self, product_id: &ProductId, size: Option<&str>) -> CartSnapshot {
        self.inner.mutate(|cart| cart.remove(product_id, size))
    }

    /// Set a line's quantity. No-op when `quantity < 1` or nothing matches.
    pub fn update_quantity(&self, product_id: &ProductId, size: Option<&str>, quantity: i64) -> CartSnapshot {
        self.inner
            .mutate(|cart| cart.set_quantity(product_id, size, quantity))
    }

    /// Empty the cart and persist the empty cart immediately.
    ///
    /// The in-memory cart and the local slot are emptied before the first
    /// await; for a signed-in session the remote write has completed when
    /// this returns.
    pub async fn clear(&self) -> CartSnapshot {
        self.inner.clear().await
    }

    /// Take an ordered cart out of the cart.
    ///
    /// Lines added while the order was being placed stay and are persisted
    /// like any mutation. When nothing is left this behaves as
    /// [`clear`](Self::clear).
    pub async fn settle(&self, ordered: &Cart) -> CartSnapshot {
        self.inner.settle(ordered).await
    }

    /// Stop following identity, drop the pending write and close the remote
    /// subscription. Mutations still apply in memory afterwards.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.lock().snapshot()
    }

    /// Current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.inner.lock().cart.clone()
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn cart_count(&self) -> u64 {
        self.inner.lock().cart.count()
    }

    /// Whether a write to the authoritative store is in flight.
    #[must_use]
    pub fn syncing(&self) -> bool {
        self.inner.lock().writes_in_flight > 0
    }

    /// Last surfaced sync failure.
    #[must_use]
    pub fn last_error(&self) -> Option<SyncErrorKind> {
        self.inner.lock().last_error
    }

    /// Receive every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Wait until the engine has adopted `session` and finished hydrating it.
    pub async fn wait_for_session(&self, session: &Session) -> CartSnapshot {
        let mut rx = self.inner.snapshots.subscribe();
        let adopted = rx
            .wait_for(|snapshot| snapshot.session.same_principal(session) && !snapshot.hydrating)
            .await
            .map(|snapshot| snapshot.clone());
        adopted.unwrap_or_else(|_| self.snapshot())
    }
}

impl EngineInner {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &EngineState) -> CartSnapshot {
        let snapshot = state.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    #[instrument(skip_all, fields(user_id = ?session.user_id()))]
    fn on_session_change(self: &Arc<Self>, session: Session) {
        let mut state = self.lock();

        if state.session.same_principal(&session) {
            if state.session != session {
                state.session = session;
                self.publish(&state);
            }
            return;
        }

        state.epoch += 1;
        let epoch = state.epoch;
        if let Some(hydration) = state.hydration.take() {
            hydration.abort();
        }
        self.scheduler.cancel();

        let previous = std::mem::replace(&mut state.session, session.clone());
        state.last_error = None;
        state.handoff = None;

        match &session {
            Session::Guest => {
                info!(epoch, "Session changed to guest");
                state.cart = read_slot(&self.ctx, &SlotKey::Guest);
                state.hydrating = false;
            }
            Session::User(identity) => {
                info!(epoch, "Session changed to signed-in user");
                let outgoing = std::mem::take(&mut state.cart);
                if previous.is_guest()
                    && self.config.handoff == HandoffPolicy::Merge
                    && !outgoing.is_empty()
                {
                    state.handoff = Some(outgoing);
                }
                state.hydrating = true;

                let task = tokio::spawn(hydrate(
                    Arc::downgrade(self),
                    epoch,
                    identity.user_id.clone(),
                ));
                state.hydration = Some(task.abort_handle());
            }
        }

        self.publish(&state);
    }

    /// Apply the first remote delivery for the session started at `epoch`.
    ///
    /// Returns whether hydration succeeded and later deliveries should be
    /// followed.
    fn finish_hydration(
        self: &Arc<Self>,
        epoch: u64,
        user_id: &UserId,
        result: Result<Option<CartDocument>, StoreError>,
    ) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            debug!(epoch, current = state.epoch, "Dropping stale hydration result");
            return false;
        }
        state.hydrating = false;
        let slot = SlotKey::User(user_id.clone());

        match result {
            Ok(document) => {
                state.cart = document.map(|doc| Cart::from_lines(doc.items)).unwrap_or_default();
                let merged = match state.handoff.take() {
                    Some(guest) => state.cart.absorb(guest),
                    None => false,
                };
                self.ctx.local.write(&slot, state.cart.lines());
                if merged {
                    self.schedule_persist(epoch);
                }
                info!(%user_id, lines = state.cart.len(), merged, "Hydrated cart from remote store");
                self.publish(&state);
                true
            }
            Err(e) => {
                warn!(%user_id, error = %e, "Remote hydration failed, falling back to local slot");
                state.handoff = None;
                state.cart = read_slot(&self.ctx, &slot);
                state.last_error = Some(SyncErrorKind::RemoteHydrationFailed);
                self.publish(&state);
                false
            }
        }
    }

    /// Apply a later remote delivery.
    ///
    /// Ignored while a local write is pending or in flight, so an echo of an
    /// older write never reverts newer local changes.
    fn apply_remote(&self, epoch: u64, document: Option<CartDocument>) {
        let mut state = self.lock();
        if state.epoch != epoch || state.hydrating {
            return;
        }
        if self.scheduler.is_pending() || state.writes_in_flight > 0 {
            debug!(epoch, "Remote change deferred to pending local write");
            return;
        }

        let incoming = document.map(|doc| Cart::from_lines(doc.items)).unwrap_or_default();
        if incoming == state.cart {
            return;
        }
        debug!(epoch, lines = incoming.len(), "Applying remote cart change");
        state.cart = incoming;
        self.ctx.local.write(&state.session.slot(), state.cart.lines());
        self.publish(&state);
    }

    fn mutate(self: &Arc<Self>, op: impl FnOnce(&mut Cart) -> bool) -> CartSnapshot {
        let mut state = self.lock();
        if !op(&mut state.cart) {
            debug!(kind = %SyncErrorKind::InvalidMutation, "Ignoring cart mutation");
            return state.snapshot();
        }

        self.ctx.local.write(&state.session.slot(), state.cart.lines());
        if !state.hydrating {
            self.schedule_persist(state.epoch);
        }
        self.publish(&state)
    }

    fn schedule_persist(self: &Arc<Self>, epoch: u64) {
        let engine = Arc::downgrade(self);
        self.scheduler.schedule(move || async move {
            if let Some(inner) = engine.upgrade() {
                inner.persist(epoch).await;
            }
        });
    }

    /// Write the current cart to the authoritative store.
    ///
    /// The cart is read only once the write lane is held, so a write queued
    /// behind a `clear` sends the cleared cart, never the lines it replaced.
    async fn persist(&self, epoch: u64) {
        let _lane = self.write_lane.lock().await;
        let (target, lines) = {
            let mut state = self.lock();
            if state.epoch != epoch || state.hydrating {
                return;
            }
            let target = state.session.user_id().cloned();
            if target.is_some() {
                state.writes_in_flight += 1;
                self.publish(&state);
            }
            (target, state.cart.to_vec())
        };

        let Some(user_id) = target else {
            self.ctx.local.write(&SlotKey::Guest, &lines);
            return;
        };

        let result = self.ctx.remote.merge_write(&user_id, &lines).await;
        self.finish_write(epoch, &user_id, lines.len(), result);
    }

    fn finish_write(&self, epoch: u64, user_id: &UserId, lines: usize, result: Result<(), StoreError>) {
        let mut state = self.lock();
        state.writes_in_flight = state.writes_in_flight.saturating_sub(1);

        match result {
            Ok(()) => {
                debug!(%user_id, lines, "Saved cart to remote store");
                if state.last_error == Some(SyncErrorKind::RemoteWriteFailed) {
                    state.last_error = None;
                }
            }
            Err(e) => {
                warn!(%user_id, lines, error = %e, "Remote cart write failed");
                if state.epoch == epoch {
                    state.last_error = Some(SyncErrorKind::RemoteWriteFailed);
                }
            }
        }
        self.publish(&state);
    }

    async fn clear(&self) -> CartSnapshot {
        let target = {
            let mut state = self.lock();
            self.empty_cart(&mut state)
        };
        self.write_empty(target).await
    }

    async fn settle(self: &Arc<Self>, ordered: &Cart) -> CartSnapshot {
        let target = {
            let mut state = self.lock();
            let mut remaining = state.cart.clone();
            remaining.subtract(ordered);
            if !remaining.is_empty() {
                debug!(lines = remaining.len(), "Keeping lines added during checkout");
                state.cart = remaining;
                self.ctx.local.write(&state.session.slot(), state.cart.lines());
                if !state.hydrating {
                    self.schedule_persist(state.epoch);
                }
                return self.publish(&state);
            }
            self.empty_cart(&mut state)
        };
        self.write_empty(target).await
    }

    /// Empty the cart in memory and locally, returning the user whose
    /// remote cart must be emptied.
    fn empty_cart(&self, state: &mut EngineState) -> Option<(UserId, u64)> {
        state.cart.clear();
        self.scheduler.cancel();
        self.ctx.local.write(&state.session.slot(), &[]);
        let target = state.session.user_id().cloned();
        if target.is_some() {
            state.writes_in_flight += 1;
        }
        self.publish(state);
        target.map(|user_id| (user_id, state.epoch))
    }

    async fn write_empty(&self, target: Option<(UserId, u64)>) -> CartSnapshot {
        if let Some((user_id, epoch)) = target {
            // Wait out a flush that fired before the clear
            let _lane = self.write_lane.lock().await;
            let result = self.ctx.remote.merge_write(&user_id, &[]).await;
            self.finish_write(epoch, &user_id, 0, result);
        }
        self.lock().snapshot()
    }

    fn shutdown(&self) {
        let mut state = self.lock();
        state.epoch += 1;
        if let Some(listener) = state.listener.take() {
            listener.abort();
        }
        if let Some(hydration) = state.hydration.take() {
            hydration.abort();
        }
        state.hydrating = false;
        self.scheduler.cancel();
        debug!("Cart engine shut down");
        self.publish(&state);
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(listener) = state.listener.take() {
            listener.abort();
        }
        if let Some(hydration) = state.hydration.take() {
            hydration.abort();
        }
    }
}

fn read_slot(ctx: &SyncContext, slot: &SlotKey) -> Cart {
    ctx.local.read(slot).map(Cart::from_lines).unwrap_or_default()
}

/// Hydrate the session started at `epoch` and follow its remote document.
///
/// Holds only a weak reference between awaits so a dropped engine stops it.
async fn hydrate(engine: Weak<EngineInner>, epoch: u64, user_id: UserId) {
    let Some((remote, mode)) = engine
        .upgrade()
        .map(|inner| (Arc::clone(&inner.ctx.remote), inner.config.hydration))
    else {
        return;
    };

    if mode == HydrationMode::ReadOnce {
        let result = remote.read_once(&user_id).await;
        if let Some(inner) = engine.upgrade() {
            inner.finish_hydration(epoch, &user_id, result);
        }
        return;
    }

    let mut subscription = match remote.subscribe(&user_id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            if let Some(inner) = engine.upgrade() {
                inner.finish_hydration(epoch, &user_id, Err(e));
            }
            return;
        }
    };

    let first = subscription
        .next()
        .await
        .unwrap_or(Err(StoreError::SubscriptionClosed));
    let followed = engine
        .upgrade()
        .is_some_and(|inner| inner.finish_hydration(epoch, &user_id, first));
    if !followed {
        return;
    }

    while let Some(event) = subscription.next().await {
        let Some(inner) = engine.upgrade() else {
            return;
        };
        match event {
            Ok(document) => inner.apply_remote(epoch, document),
            Err(e) => {
                warn!(%user_id, error = %e, "Remote cart subscription failed");
                return;
            }
        }
    }
}
