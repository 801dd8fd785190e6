//! Request coordination: inline or background dispatch, the active-reply
//! handle, abort handling and terminal notifications.
//!
//! # Second request while one is pending
//!
//! A `calculate_route` issued while a background request is still pending
//! cancels and replaces it. The new reply is published as active first; the
//! superseded reply is then resolved `Aborted` (subscribers receive its
//! `Aborted` event) and its worker is terminated.
//!
//! # Who resolves a background reply
//!
//! Both the worker completion path and the abort path start by detaching the
//! reply from the active handle with a compare-and-swap. Only the side whose
//! swap succeeds writes into the reply, so a late result can never overwrite
//! `Aborted` and every reply produces exactly one event.
//!
//! # Engine reloads
//!
//! A worker terminated mid-call keeps running on its detached thread. When
//! the coordinator owns a loader, a fresh engine handle is built on a
//! separate `engine-reload` thread and swapped in once ready; requests
//! dispatched before that use the current handle. Reload requests that
//! arrive while one is running are folded into one more pass.

use super::error::RouteError;
use super::provider::types::EngineParameters;
use super::reply::{ReplyState, RouteReply};
use super::request::RouteRequest;
use super::service::{EngineLoader, Interrupt, RoutingEngine};
use super::worker::{compute, Outcome, Worker};
use crate::sdk::config::{ConfigError, EngineConfig};
use crate::sdk::features::Capabilities;
use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread;

/// Where engine calls run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// On the caller's thread; replies are terminal when returned.
    Inline,
    /// On one dedicated worker thread per request.
    #[default]
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteEventKind {
    Finished,
    Errored,
    Aborted,
}

/// Terminal notification, delivered once per reply.
#[derive(Debug, Clone)]
pub struct RouteEvent {
    pub kind: RouteEventKind,
    pub reply: Arc<RouteReply>,
}

struct ActiveRequest {
    reply: Arc<RouteReply>,
    worker: Arc<Worker>,
}

type Reloader<E> = Box<dyn Fn() -> Result<E, ConfigError> + Send + Sync>;

struct Shared<E> {
    engine: ArcSwap<E>,
    reloader: Option<Reloader<E>>,
    active: ArcSwapOption<ActiveRequest>,
    subscribers: Mutex<Vec<Sender<RouteEvent>>>,
    next_worker: AtomicU64,
    reload_requests: AtomicU64,
    reloading: AtomicBool,
}

pub struct RouteCoordinator<E: RoutingEngine> {
    shared: Arc<Shared<E>>,
    mode: ExecutionMode,
    capabilities: Capabilities,
}

impl<E: RoutingEngine> RouteCoordinator<E> {
    /// Wraps an initialised engine handle.
    pub fn new(engine: E, mode: ExecutionMode) -> Self {
        Self::build(engine, None, mode)
    }

    /// Parses the host parameter bag, validates it and loads the engine.
    ///
    /// Any failure is returned as a [`ConfigError`] and no coordinator is
    /// created.
    pub fn from_params<L>(
        params: &HashMap<String, String>,
        mode: ExecutionMode,
        loader: L,
    ) -> Result<Self, ConfigError>
    where
        L: EngineLoader<Engine = E>,
    {
        let config = EngineConfig::from_params(params).map_err(|e| {
            log::warn!("[COORDINATOR] Rejected engine configuration: {}", e);
            e
        })?;
        Self::from_config(config, mode, loader)
    }

    /// Loads the engine from a validated configuration. The loader is kept to
    /// recreate the engine handle after a worker is terminated mid-call.
    pub fn from_config<L>(
        config: EngineConfig,
        mode: ExecutionMode,
        loader: L,
    ) -> Result<Self, ConfigError>
    where
        L: EngineLoader<Engine = E>,
    {
        config.validate()?;
        let engine = loader.load(&config).map_err(|e| {
            log::warn!(
                "[COORDINATOR] Engine failed to load {}: {}",
                config.storage_config.display(),
                e
            );
            e
        })?;
        log::info!(
            "[COORDINATOR] Engine loaded from {} ({} algorithm)",
            config.storage_config.display(),
            config.algorithm
        );
        let reloader: Reloader<E> = Box::new(move || loader.load(&config));
        Ok(Self::build(engine, Some(reloader), mode))
    }

    fn build(engine: E, reloader: Option<Reloader<E>>, mode: ExecutionMode) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine: ArcSwap::from_pointee(engine),
                reloader,
                active: ArcSwapOption::empty(),
                subscribers: Mutex::new(Vec::new()),
                next_worker: AtomicU64::new(1),
                reload_requests: AtomicU64::new(0),
                reloading: AtomicBool::new(false),
            }),
            mode,
            capabilities: Capabilities::default(),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The reply currently being computed in the background, if any.
    pub fn active_reply(&self) -> Option<Arc<RouteReply>> {
        self.shared
            .active
            .load_full()
            .map(|active| Arc::clone(&active.reply))
    }

    /// Registers a listener for terminal events. Dropped receivers are
    /// pruned on the next delivery.
    pub fn subscribe(&self) -> Receiver<RouteEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Submits `request` and returns its reply at once.
    ///
    /// Inline mode resolves the reply before returning. Background mode
    /// returns it `Pending`, cancelling any request still pending.
    pub fn calculate_route(&self, request: impl Into<Arc<RouteRequest>>) -> Arc<RouteReply> {
        let reply = Arc::new(RouteReply::new(request.into()));
        let shared = Arc::downgrade(&self.shared);
        reply.set_abort_hook(Box::new(move |reply: &RouteReply| {
            if let Some(shared) = shared.upgrade() {
                shared.abort(reply);
            }
        }));

        log::debug!(
            "[COORDINATOR] Route request {} with {} waypoints ({:?})",
            reply.id(),
            reply.request().waypoints().len(),
            self.mode
        );

        match self.mode {
            ExecutionMode::Inline => self.run_inline(&reply),
            ExecutionMode::Background => self.dispatch(&reply),
        }
        reply
    }

    /// Cancels `reply` if it is the active, still pending request.
    /// Returns whether anything was aborted.
    pub fn abort(&self, reply: &RouteReply) -> bool {
        self.shared.abort(reply)
    }

    fn run_inline(&self, reply: &Arc<RouteReply>) {
        let engine = self.shared.engine.load_full();
        let parameters = EngineParameters::for_request(reply.request());
        let outcome = compute(&*engine, &parameters, &Interrupt::new());
        self.shared.resolve(reply, outcome);
    }

    fn dispatch(&self, reply: &Arc<RouteReply>) {
        let worker = Worker::new(self.shared.next_worker.fetch_add(1, Ordering::Relaxed));
        let active = Arc::new(ActiveRequest {
            reply: Arc::clone(reply),
            worker: Arc::clone(&worker),
        });

        if let Some(previous) = self.shared.active.swap(Some(active)) {
            log::info!(
                "[COORDINATOR] Request {} supersedes pending request {}",
                reply.id(),
                previous.reply.id()
            );
            self.shared.cancel(&previous, true);
        }

        // Loaded after any cancellation; a reload still in progress swaps in later.
        let engine = self.shared.engine.load_full();
        let parameters = EngineParameters::for_request(reply.request());
        let shared = Arc::downgrade(&self.shared);
        let target = Arc::clone(reply);

        let started = worker.start(engine, parameters, move |outcome| {
            match shared.upgrade() {
                Some(shared) => shared.complete(&target, outcome.clone()),
                None => log::debug!(
                    "[COORDINATOR] Coordinator gone, dropping result for request {}",
                    target.id()
                ),
            }
        });

        match started {
            Ok(()) => {}
            // Superseded by a concurrent request before the thread spawned.
            Err(RouteError::Aborted) => log::debug!(
                "[COORDINATOR] Request {} cancelled before its worker started",
                reply.id()
            ),
            Err(err) => {
                log::error!("[COORDINATOR] Request {}: {}", reply.id(), err);
                if self.shared.detach(reply).is_some() {
                    self.shared.resolve(reply, Err(err));
                }
            }
        }
    }
}

impl<E: RoutingEngine> Drop for RouteCoordinator<E> {
    fn drop(&mut self) {
        // Nobody can deliver the pending result any more; release waiters.
        if let Some(active) = self.shared.active.swap(None) {
            self.shared.cancel(&active, false);
        }
    }
}

impl<E: RoutingEngine> Shared<E> {
    /// Clears the active handle if it still refers to `reply`, returning the
    /// detached request. Exactly one caller can win for a given request.
    fn detach(&self, reply: &RouteReply) -> Option<Arc<ActiveRequest>> {
        let current = self.active.load_full();
        let is_target = current
            .as_ref()
            .is_some_and(|active| ptr::eq(Arc::as_ptr(&active.reply), reply));
        if !is_target {
            return None;
        }

        let previous = self
            .active
            .compare_and_swap(&current, None::<Arc<ActiveRequest>>);
        let swapped = match (&*previous, &current) {
            (Some(previous), Some(current)) => Arc::ptr_eq(previous, current),
            _ => false,
        };
        if swapped {
            current
        } else {
            None
        }
    }

    fn abort(self: &Arc<Self>, reply: &RouteReply) -> bool {
        if reply.state() != ReplyState::Pending {
            log::debug!(
                "[COORDINATOR] Abort ignored, request {} is already {:?}",
                reply.id(),
                reply.state()
            );
            return false;
        }
        match self.detach(reply) {
            Some(active) => {
                log::info!("[COORDINATOR] Aborting request {}", reply.id());
                self.cancel(&active, true);
                true
            }
            None => {
                log::debug!(
                    "[COORDINATOR] Abort ignored, request {} is not active",
                    reply.id()
                );
                false
            }
        }
    }

    /// Resolves a detached request as aborted, then terminates its worker.
    fn cancel(self: &Arc<Self>, active: &ActiveRequest, recycle: bool) {
        self.resolve(&active.reply, Err(RouteError::Aborted));
        if active.worker.terminate() && recycle {
            self.recycle_engine();
        }
    }

    fn complete(&self, reply: &Arc<RouteReply>, outcome: Outcome) {
        if self.detach(reply).is_none() {
            log::debug!(
                "[COORDINATOR] Request {} is no longer active, dropping late result",
                reply.id()
            );
            return;
        }
        self.resolve(reply, outcome);
    }

    fn resolve(&self, reply: &Arc<RouteReply>, outcome: Outcome) {
        let resolved = match outcome {
            Ok(routes) => {
                log::debug!(
                    "[COORDINATOR] Request {} finished with {} route(s)",
                    reply.id(),
                    routes.len()
                );
                reply.set_routes(routes)
            }
            Err(RouteError::Aborted) => reply.set_aborted(),
            Err(err) => {
                log::warn!("[COORDINATOR] Request {} failed: {}", reply.id(), err);
                reply.set_error(&err)
            }
        };
        if resolved {
            self.notify(reply);
        }
    }

    fn notify(&self, reply: &Arc<RouteReply>) {
        let kind = match reply.state() {
            ReplyState::Finished => RouteEventKind::Finished,
            ReplyState::Errored => RouteEventKind::Errored,
            ReplyState::Aborted => RouteEventKind::Aborted,
            ReplyState::Pending => return,
        };
        let event = RouteEvent {
            kind,
            reply: Arc::clone(reply),
        };
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Schedules a fresh engine handle after a worker was terminated
    /// mid-call. Returns at once; the load runs on its own thread.
    /// Without a loader the current handle stays: the abandoned call keeps
    /// running to completion on its own thread and is never cut short.
    fn recycle_engine(self: &Arc<Self>) {
        if self.reloader.is_none() {
            return;
        }
        self.reload_requests.fetch_add(1, Ordering::AcqRel);
        if self.reloading.swap(true, Ordering::AcqRel) {
            // The running reload picks this request up.
            return;
        }

        let shared = Arc::downgrade(self);
        let spawned = thread::Builder::new()
            .name("engine-reload".to_string())
            .spawn(move || Self::reload_loop(shared));
        if let Err(e) = spawned {
            log::error!("[COORDINATOR] Could not spawn engine reload: {}", e);
            self.reloading.store(false, Ordering::Release);
        }
    }

    fn reload_loop(weak: Weak<Self>) {
        loop {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let served = shared.reload_requests.load(Ordering::Acquire);
            shared.reload_engine();
            shared.reloading.store(false, Ordering::Release);

            // Requests raised during the load need one more pass.
            if shared.reload_requests.load(Ordering::Acquire) == served
                || shared.reloading.swap(true, Ordering::AcqRel)
            {
                return;
            }
        }
    }

    fn reload_engine(&self) {
        let Some(reload) = &self.reloader else {
            return;
        };
        match reload() {
            Ok(engine) => {
                self.engine.store(Arc::new(engine));
                log::info!("[COORDINATOR] Engine handle recreated after termination");
            }
            Err(e) => log::error!(
                "[COORDINATOR] Could not recreate engine handle, keeping the current one: {}",
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::routing::provider::buffer::ResultWriter;
    use crate::sdk::routing::provider::types::EngineResult;
    use crate::sdk::routing::request::Waypoint;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + TIMEOUT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn request() -> RouteRequest {
        RouteRequest::between(Waypoint::new(52.5, 13.4), Waypoint::new(52.6, 13.5))
    }

    struct Fixed(EngineResult);

    impl RoutingEngine for Fixed {
        fn route(&self, _: &EngineParameters, _: &Interrupt) -> EngineResult {
            self.0.clone()
        }
    }

    /// Waits for the interrupt, then reports a route anyway.
    struct Stubborn;

    impl RoutingEngine for Stubborn {
        fn route(&self, parameters: &EngineParameters, interrupt: &Interrupt) -> EngineResult {
            while !interrupt.is_raised() {
                std::thread::sleep(Duration::from_millis(1));
            }
            EngineResult::ok(
                ResultWriter::new()
                    .route(&parameters.coordinates, 1.0, 1.0)
                    .finish(),
            )
        }
    }

    #[test]
    fn inline_reply_is_terminal_on_return() {
        let buffer = ResultWriter::new().error("NoRoute", "no route found").finish();
        let coordinator = RouteCoordinator::new(Fixed(EngineResult::error(buffer)), ExecutionMode::Inline);
        let events = coordinator.subscribe();

        let reply = coordinator.calculate_route(request());
        assert_eq!(reply.state(), ReplyState::Errored);
        assert!(coordinator.active_reply().is_none());
        assert!(!coordinator.abort(&reply));

        let event = events.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(event.kind, RouteEventKind::Errored);
        assert!(Arc::ptr_eq(&event.reply, &reply));
    }

    #[test]
    fn abort_detaches_then_drops_late_result() {
        let coordinator = RouteCoordinator::new(Stubborn, ExecutionMode::Background);
        let events = coordinator.subscribe();

        let reply = coordinator.calculate_route(request());
        assert_eq!(reply.state(), ReplyState::Pending);
        assert!(Arc::ptr_eq(&coordinator.active_reply().unwrap(), &reply));

        assert!(coordinator.abort(&reply));
        assert_eq!(reply.state(), ReplyState::Aborted);
        assert!(coordinator.active_reply().is_none());
        assert!(!coordinator.abort(&reply), "second abort is a no-op");

        let event = events.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(event.kind, RouteEventKind::Aborted);
        // The stubborn engine still returns a route; nothing else is delivered.
        assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(reply.state(), ReplyState::Aborted);
    }

    #[test]
    fn terminated_worker_triggers_engine_reload() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let loader = move |_: &EngineConfig| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ConfigError>(Stubborn)
        };
        let mut config = EngineConfig::new("/shm/graph");
        config.use_shared_memory = true;

        let coordinator =
            RouteCoordinator::from_config(config, ExecutionMode::Background, loader).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let reply = coordinator.calculate_route(request());
        reply.abort();
        assert_eq!(reply.state(), ReplyState::Aborted);
        assert!(wait_for(|| loads.load(Ordering::SeqCst) == 2));
    }

    #[test]
    fn slow_reload_does_not_block_callers() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let loader = move |_: &EngineConfig| {
            if counter.fetch_add(1, Ordering::SeqCst) > 0 {
                std::thread::sleep(Duration::from_millis(800));
            }
            Ok::<_, ConfigError>(Stubborn)
        };
        let mut config = EngineConfig::new("/shm/graph");
        config.use_shared_memory = true;
        let coordinator =
            RouteCoordinator::from_config(config, ExecutionMode::Background, loader).unwrap();

        let first = coordinator.calculate_route(request());
        let started = Instant::now();
        let second = coordinator.calculate_route(request());
        assert!(started.elapsed() < Duration::from_millis(400), "replace waited for reload");
        assert_eq!(first.state(), ReplyState::Aborted);
        assert_eq!(second.state(), ReplyState::Pending);

        let started = Instant::now();
        assert!(coordinator.abort(&second));
        assert!(started.elapsed() < Duration::from_millis(400), "abort waited for reload");
        assert_eq!(second.state(), ReplyState::Aborted);

        // Both terminations are served, in one or two passes.
        assert!(wait_for(|| loads.load(Ordering::SeqCst) >= 2));
        assert!(loads.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn dropping_coordinator_releases_waiters() {
        let coordinator = RouteCoordinator::new(Stubborn, ExecutionMode::Background);
        let reply = coordinator.calculate_route(request());
        drop(coordinator);
        assert_eq!(reply.wait_timeout(TIMEOUT), ReplyState::Aborted);
    }
}
