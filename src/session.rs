// ============================================================================
// RASTER SESSION — immutable original + mutable working buffer
// ============================================================================

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::error::{EditorError, EditorResult};
use crate::io::{self, SaveFormat};
use crate::raster::{RasterBuffer, Snapshot};

/// The single live session, shared between the caller context and the
/// recompute workers. `None` until an image is loaded.
pub type SharedSession = Arc<Mutex<Option<Session>>>;

/// Lock the shared session. Poisoning is recovered: every writer replaces the
/// guarded buffers wholesale, so a panicked writer cannot leave them torn.
pub fn lock_session(shared: &SharedSession) -> MutexGuard<'_, Option<Session>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Session {
    id: Uuid,
    source: Option<PathBuf>,
    original: Snapshot,
    working: RasterBuffer,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("dimensions", &self.original.dimensions())
            .finish()
    }
}

impl Session {
    /// Decode `path` and start a session on it.
    pub fn load(path: &Path) -> EditorResult<Self> {
        let buf = io::load_image(path)?;
        let mut session = Self::from_buffer(buf)?;
        session.source = Some(path.to_path_buf());
        tracing::info!(
            id = %session.id,
            path = %path.display(),
            width = session.original.width(),
            height = session.original.height(),
            "session loaded"
        );
        Ok(session)
    }

    pub fn load_from_memory(bytes: &[u8]) -> EditorResult<Self> {
        let session = Self::from_buffer(io::load_image_from_memory(bytes)?)?;
        tracing::info!(id = %session.id, bytes = bytes.len(), "session loaded from memory");
        Ok(session)
    }

    /// Start a session on an already decoded buffer.
    pub fn from_buffer(buf: RasterBuffer) -> EditorResult<Self> {
        if buf.is_empty() {
            return Err(EditorError::load_failed("image has no pixels"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            source: None,
            working: buf.clone(),
            original: Snapshot::new(buf),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path the session was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Display name used in status messages.
    pub fn file_name(&self) -> String {
        self.source
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    }

    pub fn original(&self) -> &Snapshot {
        &self.original
    }

    pub fn working(&self) -> &RasterBuffer {
        &self.working
    }

    pub fn working_mut(&mut self) -> &mut RasterBuffer {
        &mut self.working
    }

    pub fn reset_working_to_original(&mut self) {
        self.working = RasterBuffer::clone(&self.original);
        tracing::debug!(id = %self.id, "working buffer reset to original");
    }

    /// Reinitialise the working buffer from a previously rendered snapshot,
    /// so further filters accumulate on top of it.
    pub fn load_working_from_snapshot(&mut self, snapshot: &Snapshot) -> EditorResult<()> {
        self.working.copy_from(snapshot)
    }

    /// Install a freshly computed working buffer.
    pub fn replace_working(&mut self, buf: RasterBuffer) -> EditorResult<()> {
        if buf.dimensions() != self.working.dimensions() {
            return Err(EditorError::DimensionMismatch {
                expected: self.working.dimensions(),
                found: buf.dimensions(),
            });
        }
        self.working = buf;
        Ok(())
    }

    /// Freeze the current working buffer.
    pub fn snapshot_working(&self) -> Snapshot {
        Snapshot::new(self.working.clone())
    }

    pub fn save(&self, path: &Path, format: SaveFormat, quality: u8) -> EditorResult<()> {
        io::encode_and_write(&self.working, path, format, quality)?;
        tracing::info!(id = %self.id, path = %path.display(), ?format, "working buffer saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::filters;
    use crate::raster::testing::pattern;

    #[test]
    fn working_starts_as_copy_of_original() {
        let s = Session::from_buffer(pattern(5, 4)).unwrap();
        assert_eq!(s.working(), s.original().buffer());
        assert_eq!(s.file_name(), "image");
        assert!(s.source().is_none());
    }

    #[test]
    fn empty_buffer_is_a_load_failure() {
        assert!(matches!(
            Session::from_buffer(RasterBuffer::new(0, 3)),
            Err(EditorError::LoadFailed(_))
        ));
    }

    #[test]
    fn reset_restores_original_and_keeps_original_intact() {
        let mut s = Session::from_buffer(pattern(6, 6)).unwrap();
        filters::negative(s.working_mut()).unwrap();
        assert_ne!(s.working(), s.original().buffer());
        assert_eq!(s.original().buffer(), &pattern(6, 6));
        s.reset_working_to_original();
        assert_eq!(s.working(), &pattern(6, 6));
    }

    #[test]
    fn snapshot_is_detached_from_later_edits() {
        let mut s = Session::from_buffer(pattern(4, 4)).unwrap();
        let snap = s.snapshot_working();
        filters::negative(s.working_mut()).unwrap();
        assert_eq!(snap.buffer(), &pattern(4, 4));
        s.load_working_from_snapshot(&snap).unwrap();
        assert_eq!(s.working(), &pattern(4, 4));
    }

    #[test]
    fn foreign_dimensions_are_rejected() {
        let mut s = Session::from_buffer(pattern(4, 4)).unwrap();
        let other = Snapshot::new(pattern(3, 4));
        assert!(matches!(
            s.load_working_from_snapshot(&other),
            Err(EditorError::DimensionMismatch { .. })
        ));
        assert!(s.replace_working(pattern(4, 5)).is_err());
        assert_eq!(s.working(), &pattern(4, 4));
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.png");
        let s = Session::from_buffer(pattern(8, 3)).unwrap();
        s.save(&path, SaveFormat::Png, 90).unwrap();
        let loaded = Session::load(&path).unwrap();
        assert_eq!(loaded.original().buffer(), &pattern(8, 3));
        assert_eq!(loaded.file_name(), "saved.png");
        assert_ne!(loaded.id(), s.id());
    }
}
