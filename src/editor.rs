// ============================================================================
// EDITOR — caller-context facade over session, scheduler and history
// ============================================================================
//
// All history and session mutation happens here, on the caller's thread.
// Debounced recomputes publish from rayon workers through the shared
// session and the event channel; `drain_events` folds their status
// messages back into `status()`.
// ============================================================================

use std::path::Path;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use crate::error::{EditorError, EditorResult};
use crate::history::{DEFAULT_HISTORY_CAPACITY, HistoryManager, MIN_HISTORY_CAPACITY};
use crate::io::{DEFAULT_JPEG_QUALITY, SaveFormat};
use crate::params::{
    AdjustmentFamily, BLUR_SIGMA, BOX_RADIUS, BRIGHTNESS, CHANNEL_OFFSET, CONTRAST, EYE_LEVEL,
    EYE_THRESHOLD, EffectKind, EffectParams, EyeColor, GAMMA, HUE, MEDIAN_RADIUS, ParamRange,
    SATURATION, SHARPEN_AMOUNT,
};
use crate::raster::Snapshot;
use crate::scheduler::{RecomputeJob, RecomputeScheduler};
use crate::session::{Session, SharedSession, lock_session};

/// Debounce window applied to slider-style changes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Observable outputs. Rendering them is up to the caller.
#[derive(Clone, Debug)]
pub enum EditorEvent {
    /// The working buffer changed; the snapshot is ready to present.
    PreviewChanged(Snapshot),
    /// Human-readable outcome of the last operation.
    Status(String),
    HistoryChanged { cursor: usize, count: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditorConfig {
    pub debounce: Duration,
    /// Entries kept in history, the original included. Never below 2.
    pub history_capacity: usize,
    pub jpeg_quality: u8,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl EditorConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(MIN_HISTORY_CAPACITY);
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

pub struct Editor {
    config: EditorConfig,
    session: SharedSession,
    scheduler: RecomputeScheduler,
    history: HistoryManager,
    params: EffectParams,
    current_effect: EffectKind,
    status: String,
    events_tx: mpsc::Sender<EditorEvent>,
    events_rx: mpsc::Receiver<EditorEvent>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let session: SharedSession = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = mpsc::channel();
        let scheduler = RecomputeScheduler::new(Arc::clone(&session), events_tx.clone(), config.debounce);
        Self {
            history: HistoryManager::new(config.history_capacity),
            config,
            session,
            scheduler,
            params: EffectParams::default(),
            current_effect: EffectKind::None,
            status: "Ready".to_string(),
            events_tx,
            events_rx,
        }
    }

    // ========================================================================
    // OPEN / SAVE / RESET
    // ========================================================================

    /// Load an image from disk. On failure the previous session, history and
    /// parameters are left exactly as they were.
    pub fn open_image(&mut self, path: &Path) -> EditorResult<()> {
        let loaded = Session::load(path);
        self.install(loaded)
    }

    pub fn open_image_bytes(&mut self, bytes: &[u8]) -> EditorResult<()> {
        let loaded = Session::load_from_memory(bytes);
        self.install(loaded)
    }

    fn install(&mut self, loaded: EditorResult<Session>) -> EditorResult<()> {
        let session = match loaded {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "open failed");
                self.set_status(format!("Error: {e}"));
                return Err(e);
            }
        };

        self.scheduler.teardown();
        self.params = EffectParams::default();
        self.current_effect = EffectKind::None;
        let name = session.file_name();
        let original = session.original().clone();
        self.history.start(original.clone());
        *lock_session(&self.session) = Some(session);

        self.emit(EditorEvent::PreviewChanged(original));
        self.emit_history();
        self.set_status(format!("Loaded: {name}"));
        Ok(())
    }

    /// Save the working buffer; format comes from the extension.
    pub fn save_image(&mut self, path: &Path) -> EditorResult<()> {
        self.save_image_as(path, SaveFormat::from_path(path), self.config.jpeg_quality)
    }

    pub fn save_image_as(&mut self, path: &Path, format: SaveFormat, quality: u8) -> EditorResult<()> {
        let result = match lock_session(&self.session).as_ref() {
            Some(session) => session.save(path, format, quality),
            None => return Err(EditorError::EmptySession),
        };
        match result {
            Ok(()) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.set_status(format!("Saved: {name}"));
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "save failed");
                self.set_status(format!("Error: {e}"));
                Err(e)
            }
        }
    }

    /// Discard every effect and parameter; history is kept.
    pub fn reset_image(&mut self) {
        if !self.is_image_loaded() {
            return;
        }
        self.scheduler.teardown();
        self.params = EffectParams::default();
        self.current_effect = EffectKind::None;
        if let Some(snapshot) = self.with_session(|s| {
            s.reset_working_to_original();
            s.original().clone()
        }) {
            self.emit(EditorEvent::PreviewChanged(snapshot));
        }
        tracing::info!("reset to original");
        self.set_status("Reset to original".to_string());
    }

    // ========================================================================
    // ADJUSTMENT PARAMETERS — debounced, re-applied from the original
    // ========================================================================

    pub fn set_brightness(&mut self, value: f32) {
        self.update_adjustment(AdjustmentFamily::Basic, BRIGHTNESS, value, |p| &mut p.brightness);
    }

    pub fn set_contrast(&mut self, value: f32) {
        self.update_adjustment(AdjustmentFamily::Basic, CONTRAST, value, |p| &mut p.contrast);
    }

    pub fn set_gamma(&mut self, value: f32) {
        self.update_adjustment(AdjustmentFamily::Basic, GAMMA, value, |p| &mut p.gamma);
    }

    pub fn set_saturation(&mut self, value: f32) {
        self.update_adjustment(AdjustmentFamily::Color, SATURATION, value, |p| &mut p.saturation);
    }

    pub fn set_hue(&mut self, value: f32) {
        self.update_adjustment(AdjustmentFamily::Color, HUE, value, |p| &mut p.hue);
    }

    pub fn set_red(&mut self, value: f32) {
        self.update_adjustment(AdjustmentFamily::Color, CHANNEL_OFFSET, value, |p| &mut p.red);
    }

    pub fn set_green(&mut self, value: f32) {
        self.update_adjustment(AdjustmentFamily::Color, CHANNEL_OFFSET, value, |p| &mut p.green);
    }

    pub fn set_blue(&mut self, value: f32) {
        self.update_adjustment(AdjustmentFamily::Color, CHANNEL_OFFSET, value, |p| &mut p.blue);
    }

    fn update_adjustment(
        &mut self,
        family: AdjustmentFamily,
        range: ParamRange,
        value: f32,
        field: fn(&mut EffectParams) -> &mut f32,
    ) {
        let value = range.clamp(value);
        let slot = field(&mut self.params);
        if *slot == value {
            return;
        }
        *slot = value;
        if !self.is_image_loaded() {
            return;
        }
        self.scheduler.schedule(RecomputeJob::adjustment(family, &self.params));
    }

    // ========================================================================
    // FILTER PARAMETERS — debounced only while their filter is current
    // ========================================================================

    pub fn set_blur_sigma(&mut self, value: f32) {
        let value = BLUR_SIGMA.clamp(value);
        if self.params.blur_sigma != value {
            self.params.blur_sigma = value;
            self.refilter_if_current(EffectKind::Blur);
        }
    }

    pub fn set_sharpen_amount(&mut self, value: f32) {
        let value = SHARPEN_AMOUNT.clamp(value);
        if self.params.sharpen_amount != value {
            self.params.sharpen_amount = value;
            self.refilter_if_current(EffectKind::Sharpen);
        }
    }

    pub fn set_median_radius(&mut self, value: i32) {
        let value = MEDIAN_RADIUS.clamp_int(value);
        if self.params.median_radius != value {
            self.params.median_radius = value;
            self.refilter_if_current(EffectKind::MedianFilter);
        }
    }

    pub fn set_box_radius(&mut self, value: i32) {
        let value = BOX_RADIUS.clamp_int(value);
        if self.params.box_radius != value {
            self.params.box_radius = value;
            self.refilter_if_current(EffectKind::BoxBlur);
        }
    }

    fn refilter_if_current(&mut self, kind: EffectKind) {
        if self.current_effect == kind && self.is_image_loaded() {
            self.scheduler.schedule(RecomputeJob::filter(kind, &self.params));
        }
    }

    /// Eye threshold changes re-apply synchronously when that reduction is current.
    pub fn set_eye_threshold(&mut self, color: EyeColor, value: i32) {
        let value = EYE_THRESHOLD.clamp_int(value);
        let eye = self.params.eye_mut(color);
        if eye.threshold == value {
            return;
        }
        eye.threshold = value;
        self.reapply_eye_if_current(color);
    }

    pub fn set_eye_level(&mut self, color: EyeColor, value: i32) {
        let value = EYE_LEVEL.clamp_int(value);
        let eye = self.params.eye_mut(color);
        if eye.level == value {
            return;
        }
        eye.level = value;
        self.reapply_eye_if_current(color);
    }

    fn reapply_eye_if_current(&mut self, color: EyeColor) {
        let kind = EffectKind::from_eye_color(color);
        if self.current_effect == kind && self.is_image_loaded() {
            // Failures already land in the status text.
            let _ = self.apply_effect(kind);
        }
    }

    // ========================================================================
    // FILTER COMMANDS — synchronous, accumulate onto the working buffer
    // ========================================================================

    /// Apply `kind` on top of the working buffer right away and make it the
    /// current effect. Adjustment kinds and `None` are ignored.
    pub fn apply_effect(&mut self, kind: EffectKind) -> EditorResult<Snapshot> {
        if !self.is_image_loaded() {
            return Err(EditorError::EmptySession);
        }
        if !kind.is_filter() {
            tracing::debug!(%kind, "not a filter; ignored");
            return self.working_snapshot().ok_or(EditorError::EmptySession);
        }

        self.current_effect = kind;
        match self.scheduler.run_now(RecomputeJob::filter(kind, &self.params)) {
            Ok(snapshot) => {
                let message = match kind.eye_color() {
                    Some(color) => {
                        let eye = self.params.eye(color);
                        format!(
                            "{} Reduction - Threshold: {}, Level: {}",
                            color.label(),
                            eye.threshold,
                            eye.level
                        )
                    }
                    None => format!("Applied: {}", kind.display_name()),
                };
                tracing::info!(%kind, "filter applied");
                self.set_status(message);
                Ok(snapshot)
            }
            Err(e) if e.is_silent() => Err(e),
            Err(e) => {
                tracing::warn!(%kind, error = %e, "filter failed");
                self.set_status(format!("Error: {e}"));
                Err(e)
            }
        }
    }

    pub fn apply_grayscale(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::Grayscale)
    }

    pub fn apply_sepia(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::Sepia)
    }

    pub fn apply_negative(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::Negative)
    }

    pub fn apply_blur(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::Blur)
    }

    pub fn apply_sharpen(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::Sharpen)
    }

    pub fn apply_median_filter(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::MedianFilter)
    }

    pub fn apply_box_blur(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::BoxBlur)
    }

    pub fn apply_edge_detection(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::EdgeDetection)
    }

    pub fn apply_edge_detection_laplacian(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::EdgeDetectionLaplacian)
    }

    pub fn apply_emboss(&mut self) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::Emboss)
    }

    pub fn apply_eye_reduction(&mut self, color: EyeColor) -> EditorResult<Snapshot> {
        self.apply_effect(EffectKind::from_eye_color(color))
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Commit the working buffer as a new history entry.
    pub fn apply_current_changes(&mut self) -> EditorResult<()> {
        let snapshot = self.working_snapshot().ok_or(EditorError::EmptySession)?;
        if self.history.commit(snapshot) {
            self.emit_history();
            self.set_status("Changes applied to history".to_string());
        }
        Ok(())
    }

    pub fn navigate_back(&mut self) -> Option<Snapshot> {
        if !self.history.can_navigate_back() {
            return None;
        }
        self.scheduler.teardown();
        let snapshot = self.history.back()?;
        self.show_history_entry(snapshot, "Navigated to previous image")
    }

    pub fn navigate_forward(&mut self) -> Option<Snapshot> {
        if !self.history.can_navigate_forward() {
            return None;
        }
        self.scheduler.teardown();
        let snapshot = self.history.forward()?;
        self.show_history_entry(snapshot, "Navigated to next image")
    }

    fn show_history_entry(&mut self, snapshot: Snapshot, message: &str) -> Option<Snapshot> {
        let loaded = self.with_session(|s| s.load_working_from_snapshot(&snapshot))?;
        if let Err(e) = loaded {
            tracing::error!(error = %e, "history entry does not fit the session");
            self.set_status(format!("Error: {e}"));
            return None;
        }
        self.emit(EditorEvent::PreviewChanged(snapshot.clone()));
        self.emit_history();
        self.set_status(message.to_string());
        Some(snapshot)
    }

    /// Throw away the preview and every committed entry but the original.
    pub fn clear_preview(&mut self) {
        if !self.is_image_loaded() {
            return;
        }
        self.scheduler.teardown();
        self.current_effect = EffectKind::None;
        if let Some(original) = self.with_session(|s| {
            s.reset_working_to_original();
            s.original().clone()
        }) {
            self.emit(EditorEvent::PreviewChanged(original));
        }
        self.history.reset_to_original_only();
        self.emit_history();
        self.set_status("Preview cleared".to_string());
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn history_text(&self) -> String {
        self.history.status_text()
    }

    pub fn can_navigate_back(&self) -> bool {
        self.history.can_navigate_back()
    }

    pub fn can_navigate_forward(&self) -> bool {
        self.history.can_navigate_forward()
    }

    // ========================================================================
    // STATE & EVENTS
    // ========================================================================

    pub fn is_image_loaded(&self) -> bool {
        lock_session(&self.session).is_some()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn current_effect(&self) -> EffectKind {
        self.current_effect
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Frozen copy of the working buffer.
    pub fn working_snapshot(&self) -> Option<Snapshot> {
        lock_session(&self.session).as_ref().map(Session::snapshot_working)
    }

    pub fn original_snapshot(&self) -> Option<Snapshot> {
        lock_session(&self.session).as_ref().map(|s| s.original().clone())
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_event(&mut self, timeout: Duration) -> Option<EditorEvent> {
        let event = self.events_rx.recv_timeout(timeout).ok()?;
        self.observe(&event);
        Some(event)
    }

    /// Everything queued so far, without blocking.
    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        let events: Vec<EditorEvent> = self.events_rx.try_iter().collect();
        for event in &events {
            self.observe(event);
        }
        events
    }

    fn observe(&mut self, event: &EditorEvent) {
        if let EditorEvent::Status(message) = event {
            self.status.clone_from(message);
        }
    }

    fn set_status(&mut self, message: String) {
        self.status.clone_from(&message);
        self.emit(EditorEvent::Status(message));
    }

    fn emit(&self, event: EditorEvent) {
        let _ = self.events_tx.send(event);
    }

    fn emit_history(&self) {
        self.emit(EditorEvent::HistoryChanged {
            cursor: self.history.cursor(),
            count: self.history.len(),
        });
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        lock_session(&self.session).as_mut().map(f)
    }
}
