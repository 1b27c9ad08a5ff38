// ============================================================================
// RECOMPUTE SCHEDULER — debounce, single-flight tokens, stale suppression
// ============================================================================
//
// Parameter changes arm a debounce timer on a dedicated thread. When the
// window elapses without a newer change, the timer issues a fresh
// `CancelToken` (cancelling the previous one) and hands the job to rayon.
// A finished run only publishes if its token is still the current one.
//
// Lock order: `gate` before the session mutex. Workers clone their source
// under a brief session lock without holding the gate.
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::editor::EditorEvent;
use crate::error::{EditorError, EditorResult};
use crate::ops::adjustments::{apply_family, checkpoint};
use crate::ops::effects::apply_filter;
use crate::params::{AdjustmentFamily, EffectKind, EffectParams};
use crate::raster::{RasterBuffer, Snapshot};
use crate::session::{Session, SharedSession, lock_session};

// ============================================================================
// CANCEL TOKEN
// ============================================================================

/// Cooperative cancellation handle for one recompute.
///
/// Clones share the same flag. The generation identifies which issuance the
/// token belongs to, so a run can tell whether it is still the latest.
#[derive(Clone, Debug)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    generation: u64,
}

impl CancelToken {
    fn issued(generation: u64) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            generation,
        }
    }

    /// A token nobody will cancel. Used for synchronous one-shot pipelines.
    pub fn never() -> Self {
        Self::issued(0)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// ============================================================================
// JOBS
// ============================================================================

/// Which buffer a recompute starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecomputePolicy {
    /// Start from the original and re-apply one adjustment family.
    Adjustment(AdjustmentFamily),
    /// Apply one filter on top of whatever the working buffer holds.
    Filter(EffectKind),
}

/// A recompute request. Parameters are captured when the job is created, so
/// the last scheduled job always carries the last values.
#[derive(Clone, Debug)]
pub struct RecomputeJob {
    pub policy: RecomputePolicy,
    pub params: EffectParams,
}

impl RecomputeJob {
    pub fn adjustment(family: AdjustmentFamily, params: &EffectParams) -> Self {
        Self {
            policy: RecomputePolicy::Adjustment(family),
            params: params.clone(),
        }
    }

    pub fn filter(kind: EffectKind, params: &EffectParams) -> Self {
        Self {
            policy: RecomputePolicy::Filter(kind),
            params: params.clone(),
        }
    }

    fn source(&self, session: &Session) -> RasterBuffer {
        match self.policy {
            RecomputePolicy::Adjustment(_) => RasterBuffer::clone(session.original()),
            RecomputePolicy::Filter(_) => session.working().clone(),
        }
    }

    /// Run the job on `buf`, abandoning early once `token` is cancelled.
    pub fn compute(&self, mut buf: RasterBuffer, token: &CancelToken) -> EditorResult<RasterBuffer> {
        match self.policy {
            RecomputePolicy::Adjustment(family) => {
                apply_family(&mut buf, &self.params, family, token)?;
            }
            RecomputePolicy::Filter(kind) => {
                checkpoint(token)?;
                apply_filter(&mut buf, kind, &self.params)?;
                checkpoint(token)?;
            }
        }
        Ok(buf)
    }

    fn label(&self) -> &'static str {
        match self.policy {
            RecomputePolicy::Adjustment(AdjustmentFamily::Basic) => "basic adjustments",
            RecomputePolicy::Adjustment(AdjustmentFamily::Color) => "color adjustments",
            RecomputePolicy::Filter(kind) => kind.display_name(),
        }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

enum TimerMsg {
    Arm { epoch: u64, job: RecomputeJob },
    Disarm,
    Shutdown,
}

/// Token issuance state. Everything that decides "which run is the latest"
/// happens under this one mutex.
struct Gate {
    generation: u64,
    current: CancelToken,
    /// Bumped on every arm and teardown; a timer firing for an older epoch is
    /// dropped.
    arm_epoch: u64,
}

impl Gate {
    fn issue(&mut self) -> CancelToken {
        self.current.cancel();
        self.generation += 1;
        self.current = CancelToken::issued(self.generation);
        self.current.clone()
    }

    fn is_current(&self, token: &CancelToken) -> bool {
        !token.is_cancelled() && token.generation() == self.generation
    }
}

struct Inner {
    gate: Mutex<Gate>,
    session: SharedSession,
    events: mpsc::Sender<EditorEvent>,
}

impl Inner {
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn begin_run(&self) -> CancelToken {
        self.gate().issue()
    }

    /// Timer fired for `epoch`: issue a token and start the job on rayon.
    fn fire(self: &Arc<Self>, epoch: u64, job: RecomputeJob) {
        let token = {
            let mut gate = self.gate();
            if gate.arm_epoch != epoch {
                tracing::trace!(epoch, "debounce fired for a superseded arm");
                return;
            }
            gate.issue()
        };
        tracing::debug!(job = job.label(), generation = token.generation(), "recompute started");

        let inner = Arc::clone(self);
        rayon::spawn(move || {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                inner.execute(&job, &token)
            }));
            match outcome {
                Ok(Ok(_)) => {}
                Ok(Err(e)) if e.is_silent() => {
                    tracing::trace!(job = job.label(), generation = token.generation(), "stale recompute discarded");
                }
                Ok(Err(e)) => {
                    tracing::warn!(job = job.label(), error = %e, "recompute failed");
                    let _ = inner.events.send(EditorEvent::Status(format!("Error: {e}")));
                }
                Err(_) => {
                    tracing::error!(job = job.label(), "recompute panicked");
                }
            }
        });
    }

    fn execute(&self, job: &RecomputeJob, token: &CancelToken) -> EditorResult<Snapshot> {
        checkpoint(token)?;
        let source = {
            let guard = lock_session(&self.session);
            let session = guard.as_ref().ok_or(EditorError::EmptySession)?;
            job.source(session)
        };
        let result = job.compute(source, token)?;
        self.publish(token, result)
    }

    /// Install `result` as the working buffer if `token` is still the latest.
    fn publish(&self, token: &CancelToken, result: RasterBuffer) -> EditorResult<Snapshot> {
        let gate = self.gate();
        if !gate.is_current(token) {
            return Err(EditorError::CancelledStale);
        }
        let snapshot = Snapshot::new(result);
        {
            let mut guard = lock_session(&self.session);
            let session = guard.as_mut().ok_or(EditorError::EmptySession)?;
            session.replace_working(RasterBuffer::clone(&snapshot))?;
        }
        tracing::debug!(generation = token.generation(), "preview published");
        let _ = self.events.send(EditorEvent::PreviewChanged(snapshot.clone()));
        drop(gate);
        Ok(snapshot)
    }
}

/// Turns bursts of parameter changes into at most one published recompute.
pub struct RecomputeScheduler {
    inner: Arc<Inner>,
    timer_tx: mpsc::Sender<TimerMsg>,
    timer: Option<JoinHandle<()>>,
}

impl RecomputeScheduler {
    pub fn new(session: SharedSession, events: mpsc::Sender<EditorEvent>, debounce: Duration) -> Self {
        let inner = Arc::new(Inner {
            gate: Mutex::new(Gate {
                generation: 0,
                current: CancelToken::never(),
                arm_epoch: 0,
            }),
            session,
            events,
        });
        let (timer_tx, timer_rx) = mpsc::channel();
        let timer_inner = Arc::clone(&inner);
        let timer = std::thread::Builder::new()
            .name("retouch-debounce".into())
            .spawn(move || timer_loop(timer_inner, timer_rx, debounce))
            .map_err(|e| tracing::error!(error = %e, "failed to start debounce thread"))
            .ok();
        Self {
            inner,
            timer_tx,
            timer,
        }
    }

    /// Arm (or re-arm) the debounce window for `job`. Nothing runs until the
    /// window elapses without another call.
    pub fn schedule(&self, job: RecomputeJob) {
        let epoch = {
            let mut gate = self.inner.gate();
            gate.arm_epoch += 1;
            gate.arm_epoch
        };
        tracing::debug!(job = job.label(), epoch, "debounce armed");
        if self.timer.is_some() {
            let _ = self.timer_tx.send(TimerMsg::Arm { epoch, job });
        } else {
            // No timer thread: degrade to immediate background execution.
            self.inner.fire(epoch, job);
        }
    }

    /// Run `job` synchronously on the caller, bypassing the debounce window.
    /// Any pending arm is dropped and any in-flight run is superseded.
    pub fn run_now(&self, job: RecomputeJob) -> EditorResult<Snapshot> {
        let _ = self.timer_tx.send(TimerMsg::Disarm);
        let token = {
            let mut gate = self.inner.gate();
            gate.arm_epoch += 1;
            gate.issue()
        };
        tracing::debug!(job = job.label(), generation = token.generation(), "synchronous recompute");
        self.inner.execute(&job, &token)
    }

    /// Cancel pending and in-flight work. Used on load, reset and clear.
    pub fn teardown(&self) {
        {
            let mut gate = self.inner.gate();
            gate.current.cancel();
            gate.arm_epoch += 1;
        }
        let _ = self.timer_tx.send(TimerMsg::Disarm);
        tracing::debug!("scheduler torn down");
    }

    /// Generation of the most recently issued token.
    pub fn current_generation(&self) -> u64 {
        self.inner.gate().generation
    }

    /// Issue a token outside the timer path.
    #[cfg(test)]
    pub(crate) fn begin_run(&self) -> CancelToken {
        self.inner.begin_run()
    }

    #[cfg(test)]
    pub(crate) fn publish(&self, token: &CancelToken, result: RasterBuffer) -> EditorResult<Snapshot> {
        self.inner.publish(token, result)
    }
}

impl Drop for RecomputeScheduler {
    fn drop(&mut self) {
        self.inner.gate().current.cancel();
        let _ = self.timer_tx.send(TimerMsg::Shutdown);
        if let Some(handle) = self.timer.take() {
            let _ = handle.join();
        }
    }
}

fn timer_loop(inner: Arc<Inner>, rx: mpsc::Receiver<TimerMsg>, debounce: Duration) {
    let mut pending: Option<(Instant, u64, RecomputeJob)> = None;
    loop {
        let msg = match &pending {
            Some((deadline, _, _)) => {
                let now = Instant::now();
                if now >= *deadline {
                    Err(RecvTimeoutError::Timeout)
                } else {
                    rx.recv_timeout(*deadline - now)
                }
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match msg {
            Ok(TimerMsg::Arm { epoch, job }) => {
                pending = Some((Instant::now() + debounce, epoch, job));
            }
            Ok(TimerMsg::Disarm) => pending = None,
            Ok(TimerMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if let Some((_, epoch, job)) = pending.take() {
                    inner.fire(epoch, job);
                }
            }
        }
    }
    tracing::trace!("debounce thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::adjustments::adjust_brightness;
    use crate::raster::testing::pattern;

    const WINDOW: Duration = Duration::from_millis(60);
    const SETTLE: Duration = Duration::from_millis(400);

    fn setup() -> (RecomputeScheduler, SharedSession, mpsc::Receiver<EditorEvent>) {
        let session: SharedSession = Arc::new(Mutex::new(Some(
            Session::from_buffer(pattern(24, 16)).unwrap(),
        )));
        let (tx, rx) = mpsc::channel();
        let scheduler = RecomputeScheduler::new(Arc::clone(&session), tx, WINDOW);
        (scheduler, session, rx)
    }

    fn brightness_job(amount: f32) -> RecomputeJob {
        let params = EffectParams {
            brightness: amount,
            ..EffectParams::default()
        };
        RecomputeJob::adjustment(AdjustmentFamily::Basic, &params)
    }

    fn expected_brightness(amount: f32) -> RasterBuffer {
        let mut buf = pattern(24, 16);
        adjust_brightness(&mut buf, amount).unwrap();
        buf
    }

    fn previews(rx: &mpsc::Receiver<EditorEvent>) -> Vec<Snapshot> {
        let mut out = Vec::new();
        while let Ok(event) = rx.recv_timeout(SETTLE) {
            if let EditorEvent::PreviewChanged(s) = event {
                out.push(s);
            }
        }
        out
    }

    #[test]
    fn cancel_token_clones_share_state() {
        let token = CancelToken::issued(7);
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.generation(), 7);
        assert!(!CancelToken::never().is_cancelled());
    }

    #[test]
    fn burst_publishes_once_with_last_params() {
        let (scheduler, session, rx) = setup();
        for amount in [5.0, 10.0, 15.0, 20.0, 25.0, 30.0] {
            scheduler.schedule(brightness_job(amount));
            std::thread::sleep(Duration::from_millis(5));
        }
        let published = previews(&rx);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].buffer(), &expected_brightness(30.0));
        let guard = lock_session(&session);
        assert_eq!(guard.as_ref().unwrap().working(), &expected_brightness(30.0));
    }

    #[test]
    fn separate_windows_each_publish() {
        let (scheduler, _session, rx) = setup();
        scheduler.schedule(brightness_job(10.0));
        let first = rx.recv_timeout(SETTLE).unwrap();
        assert!(matches!(first, EditorEvent::PreviewChanged(_)));
        scheduler.schedule(brightness_job(-40.0));
        let published = previews(&rx);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].buffer(), &expected_brightness(-40.0));
    }

    #[test]
    fn slow_stale_run_is_suppressed() {
        let (scheduler, session, rx) = setup();
        let stale = scheduler.begin_run();
        let fresh = scheduler.begin_run();
        assert!(stale.is_cancelled());

        let fresh_result = expected_brightness(50.0);
        scheduler.publish(&fresh, fresh_result.clone()).unwrap();
        // The stale run finishes later and must not clobber the fresh one.
        assert!(matches!(
            scheduler.publish(&stale, expected_brightness(-50.0)),
            Err(EditorError::CancelledStale)
        ));
        assert_eq!(lock_session(&session).as_ref().unwrap().working(), &fresh_result);
        assert_eq!(previews(&rx).len(), 1);
    }

    #[test]
    fn teardown_drops_pending_work() {
        let (scheduler, session, rx) = setup();
        scheduler.schedule(brightness_job(60.0));
        scheduler.teardown();
        assert!(previews(&rx).is_empty());
        assert_eq!(lock_session(&session).as_ref().unwrap().working(), &pattern(24, 16));
    }

    #[test]
    fn run_now_bypasses_debounce_and_supersedes_pending() {
        let (scheduler, session, rx) = setup();
        scheduler.schedule(brightness_job(60.0));
        let params = EffectParams::default();
        let snap = scheduler
            .run_now(RecomputeJob::filter(EffectKind::Negative, &params))
            .unwrap();

        let mut expected = pattern(24, 16);
        crate::ops::filters::negative(&mut expected).unwrap();
        assert_eq!(snap.buffer(), &expected);
        let published = previews(&rx);
        assert_eq!(published.len(), 1);
        assert_eq!(lock_session(&session).as_ref().unwrap().working(), &expected);
    }

    #[test]
    fn filters_accumulate_on_working() {
        let (scheduler, _session, _rx) = setup();
        let params = EffectParams::default();
        scheduler.run_now(RecomputeJob::filter(EffectKind::Negative, &params)).unwrap();
        let snap = scheduler.run_now(RecomputeJob::filter(EffectKind::Negative, &params)).unwrap();
        assert_eq!(snap.buffer(), &pattern(24, 16));
    }

    #[test]
    fn generations_increase_per_issue() {
        let (scheduler, _session, _rx) = setup();
        let g0 = scheduler.current_generation();
        scheduler.begin_run();
        scheduler.begin_run();
        assert_eq!(scheduler.current_generation(), g0 + 2);
    }

    #[test]
    fn no_session_means_silent_no_op() {
        let session: SharedSession = Arc::new(Mutex::new(None));
        let (tx, rx) = mpsc::channel();
        let scheduler = RecomputeScheduler::new(session, tx, WINDOW);
        let err = scheduler
            .run_now(RecomputeJob::filter(EffectKind::Negative, &EffectParams::default()))
            .unwrap_err();
        assert!(matches!(err, EditorError::EmptySession));
        scheduler.schedule(brightness_job(10.0));
        assert!(rx.recv_timeout(SETTLE).is_err());
    }
}
