//! One engine computation on its own thread.
//!
//! A worker is a disposable execution unit: it runs at most one engine call
//! and is never restarted. Termination is non-cooperative from the engine's
//! point of view: the thread is detached, its interrupt flag is raised, and
//! whatever it produces afterwards is dropped.

use super::decode::decode;
use super::error::RouteError;
use super::provider::types::EngineParameters;
use super::route::DecodedRoute;
use super::service::{Interrupt, RoutingEngine};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

pub type Outcome = Result<Vec<DecodedRoute>, RouteError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    NotStarted = 0,
    Running = 1,
    Completed = 2,
    Terminated = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::NotStarted,
            1 => WorkerState::Running,
            2 => WorkerState::Completed,
            _ => WorkerState::Terminated,
        }
    }
}

#[derive(Debug)]
pub struct Worker {
    id: u64,
    state: AtomicU8,
    interrupt: Interrupt,
    outcome: OnceLock<Outcome>,
}

impl Worker {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: AtomicU8::new(WorkerState::NotStarted as u8),
            interrupt: Interrupt::new(),
            outcome: OnceLock::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The published outcome. Always present once the state is `Completed`.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.get()
    }

    /// Spawns the worker thread.
    ///
    /// `on_complete` runs on the worker thread after the outcome has been
    /// published, and only if the worker was not terminated first.
    pub fn start<E, F>(
        self: &Arc<Self>,
        engine: Arc<E>,
        parameters: EngineParameters,
        on_complete: F,
    ) -> Result<(), RouteError>
    where
        E: RoutingEngine + ?Sized,
        F: FnOnce(&Outcome) + Send + 'static,
    {
        if !self.transition(WorkerState::NotStarted, WorkerState::Running) {
            if self.state() == WorkerState::Terminated {
                return Err(RouteError::Aborted);
            }
            return Err(RouteError::Worker(format!(
                "worker {} already started",
                self.id
            )));
        }

        let worker = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("route-worker-{}", self.id))
            .spawn(move || {
                let outcome = compute(&*engine, &parameters, &worker.interrupt);
                worker.complete(outcome, on_complete);
            });

        if let Err(e) = spawned {
            let err = RouteError::Worker(format!("failed to spawn worker thread: {}", e));
            let _ = self.outcome.set(Err(err.clone()));
            self.transition(WorkerState::Running, WorkerState::Completed);
            return Err(err);
        }
        log::debug!("[WORKER] Worker {} started", self.id);
        Ok(())
    }

    /// Moves `Running -> Terminated` and returns `true` if an engine call was
    /// cut loose. A worker that never started is terminated too, so a later
    /// `start` fails with [`RouteError::Aborted`]; that returns `false`, as
    /// does terminating a completed worker.
    pub fn terminate(&self) -> bool {
        if self.transition(WorkerState::NotStarted, WorkerState::Terminated) {
            log::debug!("[WORKER] Worker {} terminated before start", self.id);
            return false;
        }
        if !self.transition(WorkerState::Running, WorkerState::Terminated) {
            return false;
        }
        self.interrupt.raise();
        log::warn!(
            "[WORKER] Worker {} terminated mid-call; its thread is detached",
            self.id
        );
        true
    }

    fn complete<F: FnOnce(&Outcome)>(&self, outcome: Outcome, on_complete: F) {
        // Publish before the state change: observers of `Completed` must see it.
        let outcome = self.outcome.get_or_init(|| outcome);
        if self.transition(WorkerState::Running, WorkerState::Completed) {
            log::debug!("[WORKER] Worker {} completed", self.id);
            on_complete(outcome);
        } else {
            log::debug!(
                "[WORKER] Worker {} finished after termination, result discarded",
                self.id
            );
        }
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Runs one engine call and decodes its result. An engine panic becomes a
/// [`RouteError::Worker`].
pub(crate) fn compute<E>(engine: &E, parameters: &EngineParameters, interrupt: &Interrupt) -> Outcome
where
    E: RoutingEngine + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| engine.route(parameters, interrupt))) {
        Ok(result) => decode(result.status, &result.buffer),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("[WORKER] Engine panicked: {}", message);
            Err(RouteError::Worker(format!("engine panicked: {}", message)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::routing::provider::buffer::ResultWriter;
    use crate::sdk::routing::provider::types::EngineResult;
    use crate::sdk::routing::request::{RouteRequest, Waypoint};
    use std::sync::mpsc;
    use std::time::Duration;

    fn parameters() -> EngineParameters {
        EngineParameters::for_request(&RouteRequest::between(
            Waypoint::new(52.5, 13.4),
            Waypoint::new(52.6, 13.5),
        ))
    }

    struct EchoEngine;

    impl RoutingEngine for EchoEngine {
        fn route(&self, parameters: &EngineParameters, _: &Interrupt) -> EngineResult {
            EngineResult::ok(
                ResultWriter::new()
                    .route(&parameters.coordinates, 42.0, 7.0)
                    .finish(),
            )
        }
    }

    /// Blocks until released, then returns a route.
    struct GatedEngine {
        release: parking_lot::Mutex<mpsc::Receiver<()>>,
    }

    impl RoutingEngine for GatedEngine {
        fn route(&self, parameters: &EngineParameters, _: &Interrupt) -> EngineResult {
            let _ = self.release.lock().recv();
            EchoEngine.route(parameters, &Interrupt::new())
        }
    }

    struct PanickingEngine;

    impl RoutingEngine for PanickingEngine {
        fn route(&self, _: &EngineParameters, _: &Interrupt) -> EngineResult {
            panic!("graph corrupted");
        }
    }

    #[test]
    fn completes_and_publishes_before_callback() {
        let worker = Worker::new(1);
        let (tx, rx) = mpsc::channel();
        let observer = Arc::clone(&worker);
        worker
            .start(Arc::new(EchoEngine), parameters(), move |outcome| {
                // The outcome is readable through the worker by now.
                assert!(observer.outcome().is_some());
                tx.send(outcome.clone()).unwrap();
            })
            .unwrap();

        let routes = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(routes[0].distance, 42.0);
        assert_eq!(
            routes[0].path[0],
            Waypoint::new(52.5, 13.4),
            "coordinates round-trip back to lat/lon"
        );
        assert_eq!(worker.state(), WorkerState::Completed);
        assert!(!worker.terminate(), "terminate after completion is a no-op");
        assert_eq!(worker.state(), WorkerState::Completed);
    }

    #[test]
    fn terminated_worker_never_calls_back() {
        let (release_tx, release_rx) = mpsc::channel();
        let engine = Arc::new(GatedEngine {
            release: parking_lot::Mutex::new(release_rx),
        });
        let worker = Worker::new(2);
        let (tx, rx) = mpsc::channel::<()>();
        worker
            .start(engine, parameters(), move |_| {
                let _ = tx.send(());
            })
            .unwrap();

        assert!(worker.terminate());
        assert_eq!(worker.state(), WorkerState::Terminated);
        assert!(worker.interrupt.is_raised());

        release_tx.send(()).unwrap();
        // The callback's sender is dropped without sending once the thread ends.
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
        assert_eq!(worker.state(), WorkerState::Terminated);
    }

    #[test]
    fn cannot_start_twice() {
        let worker = Worker::new(3);
        let (tx, rx) = mpsc::channel();
        worker
            .start(Arc::new(EchoEngine), parameters(), move |_| {
                let _ = tx.send(());
            })
            .unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let err = worker
            .start(Arc::new(EchoEngine), parameters(), |_| {})
            .unwrap_err();
        assert!(matches!(err, RouteError::Worker(_)));
    }

    #[test]
    fn terminated_before_start_never_runs() {
        struct Counting(std::sync::atomic::AtomicUsize);
        impl RoutingEngine for Counting {
            fn route(&self, parameters: &EngineParameters, _: &Interrupt) -> EngineResult {
                self.0.fetch_add(1, Ordering::SeqCst);
                EchoEngine.route(parameters, &Interrupt::new())
            }
        }

        let engine = Arc::new(Counting(std::sync::atomic::AtomicUsize::new(0)));
        let worker = Worker::new(4);
        assert!(!worker.terminate(), "no call was in flight");
        assert_eq!(worker.state(), WorkerState::Terminated);

        let err = worker
            .start(Arc::clone(&engine), parameters(), |_| panic!("must not run"))
            .unwrap_err();
        assert_eq!(err, RouteError::Aborted);
        assert_eq!(worker.state(), WorkerState::Terminated);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn engine_panic_becomes_worker_error() {
        let outcome = compute(&PanickingEngine, &parameters(), &Interrupt::new());
        assert_eq!(
            outcome,
            Err(RouteError::Worker("engine panicked: graph corrupted".into()))
        );
    }

    #[test]
    fn engine_error_flows_through_decoder() {
        struct Failing;
        impl RoutingEngine for Failing {
            fn route(&self, _: &EngineParameters, _: &Interrupt) -> EngineResult {
                EngineResult::failure("NoSegment", "could not snap coordinate")
            }
        }
        let outcome = compute(&Failing, &parameters(), &Interrupt::new());
        assert_eq!(
            outcome.unwrap_err().to_string(),
            "code: NoSegment, message: could not snap coordinate"
        );
    }
}
