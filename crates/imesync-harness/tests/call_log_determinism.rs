#![forbid(unsafe_code)]

//! The same keyboard script produces byte-identical call logs.

use imesync_core::{KeyCode, KeyEvent, Modifiers, SyncConfig, TextSnapshot};
use imesync_harness::{CallLog, EditorBehavior, Session};

fn run_script(log: CallLog) -> Session {
    let config = SyncConfig::default();
    let behavior = EditorBehavior::matching(&config);
    let mut s = Session::new(TextSnapshot::with_caret_at_end("Lorem"), behavior, config, log).unwrap();
    s.monitor(9).unwrap();
    let e = s.engine_mut();
    e.begin_batch_edit();
    e.commit_text(" ipsum", 1).unwrap();
    e.set_composing_text("dol", 1).unwrap();
    e.end_batch_edit();
    e.commit_text("dolor", 1).unwrap();
    e.send_key_event(KeyEvent::down(KeyCode::DpadLeft).with_modifiers(Modifiers::SHIFT))
        .unwrap();
    e.text_before_cursor(4).unwrap();
    s.pump();
    s
}

#[test]
fn identical_scripts_have_identical_checksums() {
    let a = CallLog::new();
    let b = CallLog::new();
    run_script(a.clone());
    run_script(b.clone());
    assert_eq!(a.to_json_lines(), b.to_json_lines());
    assert_eq!(a.checksum(), b.checksum());
    assert!(a.checksum().starts_with("blake3:"));
}

#[test]
fn json_lines_describe_every_call() {
    let log = CallLog::new();
    let session = run_script(log.clone());
    let lines: Vec<serde_json::Value> = log
        .to_json_lines()
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect();
    assert_eq!(lines.len(), log.len());
    assert_eq!(lines[0]["call"], "extracted_text");
    assert_eq!(lines[0]["monitor"], true);
    assert!(lines.iter().any(|l| l["call"] == "send_key_event" && l["modifiers"] == 1));
    assert_eq!(session.editor().text(), "Lorem ipsumdolor");
}

#[test]
fn different_scripts_differ() {
    let a = CallLog::new();
    run_script(a.clone());

    let b = CallLog::new();
    let config = SyncConfig::default();
    let behavior = EditorBehavior::matching(&config);
    let mut s = Session::new(TextSnapshot::with_caret_at_end("Lorem"), behavior, config, b.clone()).unwrap();
    s.engine_mut().commit_text("x", 1).unwrap();
    assert_eq!(b.len(), 1);
    assert_ne!(a.checksum(), b.checksum());
}
