//! Single-resolution result container handed to callers.
//!
//! A [`RouteReply`] starts `Pending` and moves exactly once to `Finished`,
//! `Errored` or `Aborted`. The resolved value is published through a
//! `OnceLock`, so a reader on another thread either sees nothing or the
//! complete outcome.

use super::error::{ErrorCode, ReplyError, RouteError};
use super::request::RouteRequest;
use super::route::DecodedRoute;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

static NEXT_REPLY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    Pending,
    Finished,
    Errored,
    Aborted,
}

impl ReplyState {
    pub fn is_terminal(self) -> bool {
        self != ReplyState::Pending
    }
}

enum Resolution {
    Finished(Vec<DecodedRoute>),
    Errored(ReplyError),
    Aborted(ReplyError),
}

pub(crate) type AbortHook = Box<dyn Fn(&RouteReply) + Send + Sync>;

pub struct RouteReply {
    id: u64,
    request: Arc<RouteRequest>,
    resolution: OnceLock<Resolution>,
    abort_requested: AtomicBool,
    abort_hook: OnceLock<AbortHook>,
    signal: Mutex<()>,
    resolved: Condvar,
}

impl RouteReply {
    pub fn new(request: Arc<RouteRequest>) -> Self {
        Self {
            id: NEXT_REPLY_ID.fetch_add(1, Ordering::Relaxed),
            request,
            resolution: OnceLock::new(),
            abort_requested: AtomicBool::new(false),
            abort_hook: OnceLock::new(),
            signal: Mutex::new(()),
            resolved: Condvar::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &RouteRequest {
        &self.request
    }

    pub fn state(&self) -> ReplyState {
        match self.resolution.get() {
            None => ReplyState::Pending,
            Some(Resolution::Finished(_)) => ReplyState::Finished,
            Some(Resolution::Errored(_)) => ReplyState::Errored,
            Some(Resolution::Aborted(_)) => ReplyState::Aborted,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Routes, once `Finished`.
    pub fn routes(&self) -> Option<&[DecodedRoute]> {
        match self.resolution.get() {
            Some(Resolution::Finished(routes)) => Some(routes),
            _ => None,
        }
    }

    /// Error code and message, once `Errored` or `Aborted`.
    pub fn error(&self) -> Option<&ReplyError> {
        match self.resolution.get() {
            Some(Resolution::Errored(error)) | Some(Resolution::Aborted(error)) => Some(error),
            _ => None,
        }
    }

    /// Whether [`RouteReply::abort`] was ever called on this reply.
    pub fn abort_requested(&self) -> bool {
        self.abort_requested.load(Ordering::Acquire)
    }

    /// Asks the owning coordinator to cancel this request.
    ///
    /// Has no effect once the reply is terminal or if no coordinator is
    /// attached.
    pub fn abort(&self) {
        self.abort_requested.store(true, Ordering::Release);
        match self.abort_hook.get() {
            Some(hook) => hook(self),
            None => log::debug!("[REPLY] Abort requested on detached reply {}", self.id),
        }
    }

    pub(crate) fn set_abort_hook(&self, hook: AbortHook) {
        if self.abort_hook.set(hook).is_err() {
            log::error!("[REPLY] Abort hook installed twice on reply {}", self.id);
        }
    }

    pub(crate) fn set_routes(&self, routes: Vec<DecodedRoute>) -> bool {
        self.resolve(Resolution::Finished(routes))
    }

    /// Resolves with `error`. [`RouteError::Aborted`] resolves to `Aborted`.
    pub(crate) fn set_error(&self, error: &RouteError) -> bool {
        let reply_error = ReplyError::from(error);
        match reply_error.code {
            ErrorCode::Aborted => self.resolve(Resolution::Aborted(reply_error)),
            ErrorCode::Computation => self.resolve(Resolution::Errored(reply_error)),
        }
    }

    pub(crate) fn set_aborted(&self) -> bool {
        self.set_error(&RouteError::Aborted)
    }

    /// Blocks until the reply is terminal.
    pub fn wait(&self) -> ReplyState {
        let mut guard = self.signal.lock();
        while self.resolution.get().is_none() {
            self.resolved.wait(&mut guard);
        }
        self.state()
    }

    /// Blocks until the reply is terminal or `timeout` elapses, returning the
    /// state observed last. A timeout past the clock's range waits forever.
    pub fn wait_timeout(&self, timeout: Duration) -> ReplyState {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait();
        };
        let mut guard = self.signal.lock();
        while self.resolution.get().is_none() {
            if self.resolved.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.state()
    }

    fn resolve(&self, resolution: Resolution) -> bool {
        if self.resolution.set(resolution).is_err() {
            log::error!(
                "[REPLY] Reply {} resolved twice, keeping {:?}",
                self.id,
                self.state()
            );
            debug_assert!(false, "reply {} resolved twice", self.id);
            return false;
        }
        let _guard = self.signal.lock();
        self.resolved.notify_all();
        true
    }
}

impl fmt::Debug for RouteReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteReply")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("waypoints", &self.request.waypoints().len())
            .finish()
    }
}
