use std::path::{Path, PathBuf};
use std::time::Duration;

use retouch::io::encode_and_write;
use retouch::ops::{adjustments, filters};
use retouch::{Editor, EditorConfig, EditorError, EditorEvent, RasterBuffer, SaveFormat, Snapshot};

const SETTLE: Duration = Duration::from_millis(500);

fn gradient() -> RasterBuffer {
    RasterBuffer::from_fn(32, 20, |x, y| {
        [(x * 8) as u8, (y * 12) as u8, ((x + y) * 5) as u8]
    })
}

fn write_input(dir: &Path) -> PathBuf {
    let path = dir.join("input.png");
    encode_and_write(&gradient(), &path, SaveFormat::Png, 90).unwrap();
    path
}

fn editor_on(dir: &Path) -> Editor {
    let mut editor = Editor::new(EditorConfig::default().with_debounce(Duration::from_millis(50)));
    editor.open_image(&write_input(dir)).unwrap();
    editor.drain_events();
    editor
}

/// Collect events until the editor has been quiet for `SETTLE`.
fn settle(editor: &mut Editor) -> Vec<EditorEvent> {
    let mut events = Vec::new();
    while let Some(e) = editor.next_event(SETTLE) {
        events.push(e);
    }
    events
}

fn previews(events: &[EditorEvent]) -> Vec<Snapshot> {
    events
        .iter()
        .filter_map(|e| match e {
            EditorEvent::PreviewChanged(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn open_reports_loaded_file() {
    let dir = tempfile::tempdir().unwrap();
    let editor = editor_on(dir.path());
    assert!(editor.is_image_loaded());
    assert_eq!(editor.status(), "Loaded: input.png");
    assert_eq!(editor.history_text(), "History: 1 / 1");
    assert_eq!(editor.original_snapshot().unwrap().buffer(), &gradient());
}

#[test]
fn neutral_basic_adjustments_equal_original() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = editor_on(dir.path());
    editor.set_brightness(25.0);
    editor.set_contrast(10.0);
    editor.set_brightness(0.0);
    editor.set_contrast(0.0);
    editor.set_gamma(1.0);
    settle(&mut editor);
    assert_eq!(editor.working_snapshot().unwrap().buffer(), &gradient());
}

#[test]
fn slider_burst_publishes_once_with_last_value() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = editor_on(dir.path());
    for step in 1..=20 {
        editor.set_gamma(1.0 + step as f32 * 0.05);
    }
    let published = previews(&settle(&mut editor));
    assert_eq!(published.len(), 1);

    let mut expected = gradient();
    adjustments::adjust_gamma(&mut expected, 2.0).unwrap();
    assert_eq!(published[0].buffer(), &expected);
}

#[test]
fn colour_family_replaces_basic_family() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = editor_on(dir.path());
    editor.set_brightness(40.0);
    settle(&mut editor);
    editor.set_saturation(-100.0);
    settle(&mut editor);

    let mut expected = gradient();
    adjustments::adjust_saturation(&mut expected, -100.0).unwrap();
    assert_eq!(editor.working_snapshot().unwrap().buffer(), &expected);
}

#[test]
fn grayscale_then_negative_accumulates() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = editor_on(dir.path());
    editor.apply_grayscale().unwrap();
    let result = editor.apply_negative().unwrap();

    let mut expected = gradient();
    filters::grayscale(&mut expected).unwrap();
    filters::negative(&mut expected).unwrap();
    assert_eq!(result.buffer(), &expected);

    let mut negative_only = gradient();
    filters::negative(&mut negative_only).unwrap();
    assert_ne!(result.buffer(), &negative_only);
}

#[test]
fn six_commits_keep_original_pinned() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = editor_on(dir.path());
    let mut committed = Vec::new();
    for _ in 0..6 {
        editor.apply_box_blur().unwrap();
        editor.apply_current_changes().unwrap();
        committed.push(editor.working_snapshot().unwrap());
    }

    let history = editor.history();
    assert_eq!(history.len(), 5);
    assert_eq!(history.get(0).unwrap().buffer(), &gradient());
    for (index, snap) in (1..=4).zip(&committed[2..]) {
        assert_eq!(history.get(index).unwrap(), snap);
    }
    assert_eq!(editor.history_text(), "History: 5 / 5");
}

#[test]
fn branch_after_back_truncates() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = editor_on(dir.path());
    editor.apply_sepia().unwrap();
    editor.apply_current_changes().unwrap();
    editor.apply_emboss().unwrap();
    editor.apply_current_changes().unwrap();

    let sepia = editor.navigate_back().unwrap();
    assert!(editor.can_navigate_forward());
    editor.apply_edge_detection().unwrap();
    editor.apply_current_changes().unwrap();

    let mut expected = RasterBuffer::clone(&sepia);
    retouch::ops::effects::edge_detection(&mut expected).unwrap();
    assert_eq!(editor.history().len(), 3);
    assert_eq!(editor.history().get(2).unwrap().buffer(), &expected);
    assert!(!editor.can_navigate_forward());
}

#[test]
fn corrupt_file_leaves_editor_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("broken.png");
    std::fs::write(&bad, b"\x89PNG but not really").unwrap();

    let mut fresh = Editor::default();
    assert!(matches!(fresh.open_image(&bad), Err(EditorError::LoadFailed(_))));
    assert!(!fresh.is_image_loaded());
    assert!(fresh.history().is_empty());
    assert!(fresh.status().starts_with("Error: "));

    let mut editor = editor_on(dir.path());
    editor.apply_negative().unwrap();
    let before = editor.working_snapshot().unwrap();
    assert!(editor.open_image(&bad).is_err());
    assert_eq!(editor.working_snapshot().unwrap(), before);
    assert_eq!(editor.history_text(), "History: 1 / 1");
}

#[test]
fn reload_cancels_pending_recompute() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = editor_on(dir.path());
    editor.set_hue(90.0);
    editor.open_image(&dir.path().join("input.png")).unwrap();
    let events = settle(&mut editor);
    // Only the preview from the reload itself.
    let published = previews(&events);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].buffer(), &gradient());
    assert_eq!(editor.params().hue, 0.0);
}

#[test]
fn save_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut editor = editor_on(dir.path());
    editor.apply_negative().unwrap();
    let out = dir.path().join("negative.png");
    editor.save_image(&out).unwrap();
    assert_eq!(editor.status(), "Saved: negative.png");

    let mut reopened = Editor::default();
    reopened.open_image(&out).unwrap();
    assert_eq!(
        reopened.original_snapshot().unwrap(),
        editor.working_snapshot().unwrap()
    );
}
