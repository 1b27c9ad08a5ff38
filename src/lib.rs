//! Non-destructive raster retouching: a library of pixel effects, a session
//! holding the original and working buffers, a debounced recompute scheduler
//! and a bounded history of committed results.
//!
//! [`Editor`] is the entry point for interactive use; the [`ops`] functions
//! can be called directly on a [`RasterBuffer`] for one-shot processing.

pub mod cli;
pub mod editor;
pub mod error;
pub mod history;
pub mod io;
pub mod logger;
pub mod ops;
pub mod params;
pub mod raster;
pub mod scheduler;
pub mod session;

pub use editor::{Editor, EditorConfig, EditorEvent};
pub use error::{EditorError, EditorResult};
pub use history::HistoryManager;
pub use io::SaveFormat;
pub use params::{AdjustmentFamily, EffectKind, EffectParams, EyeColor};
pub use raster::{RasterBuffer, Snapshot};
pub use scheduler::{CancelToken, RecomputeJob, RecomputePolicy, RecomputeScheduler};
pub use session::Session;
