use std::error::Error;
use std::time::Duration;

use execmon::errors::ExecError;
use execmon::output::OutputStream;
use execmon::record::{
    EXIT_SESSION_FAILED, EXIT_SPAWN_FAILED, ProcessRegistry, RecordState, Termination,
};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn get_without_create_returns_none_for_unknown_ids() {
    let registry = ProcessRegistry::new();
    assert!(registry.get("missing", false).is_none());
    assert!(registry.is_empty());
}

#[test]
fn get_with_create_returns_the_same_record_every_time() {
    let registry = ProcessRegistry::new();
    let first = registry.get("srv", true).expect("created");
    let second = registry.get("srv", true).expect("existing");
    let third = registry.get_or_create("srv");

    assert!(first.ptr_eq(&second));
    assert!(first.ptr_eq(&third));
    assert_eq!(registry.len(), 1);
}

#[test]
fn lookup_of_unknown_id_is_not_found() {
    let registry = ProcessRegistry::new();
    let err = registry.lookup("nope").unwrap_err();
    assert!(matches!(err, ExecError::NotFound(id) if id == "nope"));
}

#[test]
fn new_record_snapshot_is_empty_and_idle() -> TestResult {
    let registry = ProcessRegistry::new();
    registry.get_or_create("fresh");

    let snapshot = registry.snapshot("fresh")?;
    assert!(snapshot.stdout.is_empty());
    assert!(snapshot.stderr.is_empty());
    assert_eq!(snapshot.pid, None);
    assert_eq!(snapshot.exit_status, None);
    assert!(!snapshot.in_progress);
    assert!(!snapshot.is_settled());
    assert_eq!(registry.lookup("fresh")?.state(), RecordState::Created);
    Ok(())
}

#[test]
fn remove_forgets_the_record() {
    let registry = ProcessRegistry::new();
    let record = registry.get_or_create("gone");
    let removed = registry.remove("gone").expect("was present");

    assert!(removed.ptr_eq(&record));
    assert!(!registry.contains("gone"));
    assert!(registry.remove("gone").is_none());
}

#[test]
fn clones_share_the_same_map() {
    let registry = ProcessRegistry::new();
    let other = registry.clone();
    registry.get_or_create("shared");
    assert!(other.contains("shared"));
    assert_eq!(other.ids(), vec!["shared".to_string()]);
}

#[test]
fn second_run_on_a_running_record_is_busy() {
    let registry = ProcessRegistry::new();
    let record = registry.get_or_create("busy");

    record.with(|r| r.begin_run("busy", true)).expect("first run starts");
    let err = record.with(|r| r.begin_run("busy", true)).unwrap_err();

    assert!(matches!(err, ExecError::RecordBusy(_)));
    assert_eq!(record.state(), RecordState::Running);
}

#[test]
fn clear_on_reload_controls_previous_output() {
    let registry = ProcessRegistry::new();
    let record = registry.get_or_create("reload");

    record.with(|r| {
        r.begin_run("reload", true).expect("start");
        r.append(OutputStream::Stdout, ["one\n".to_string()]);
        r.finish(Termination::Exited(0));
    });

    record.with(|r| r.begin_run("reload", false)).expect("append run");
    record.with(|r| r.append(OutputStream::Stdout, ["two\n".to_string()]));
    assert_eq!(record.snapshot().stdout, vec!["one\n", "two\n"]);
    assert_eq!(record.exit_status(), None, "new run resets the status");

    record.with(|r| r.finish(Termination::Exited(0)));
    record.with(|r| r.begin_run("reload", true)).expect("clear run");
    assert!(record.snapshot().stdout.is_empty());
}

#[test]
fn settled_record_never_grows() {
    let registry = ProcessRegistry::new();
    let record = registry.get_or_create("settled");

    record.with(|r| {
        r.begin_run("settled", true).expect("start");
        r.append(OutputStream::Stderr, ["late?\n".to_string()]);
        r.finish(Termination::Exited(2));
        r.append(OutputStream::Stderr, ["too late\n".to_string()]);
    });

    let snapshot = record.snapshot();
    assert_eq!(snapshot.stderr, vec!["late?\n"]);
    assert_eq!(snapshot.exit_status, Some(2));
    assert!(snapshot.is_settled());
    assert_eq!(record.state(), RecordState::Finished);
}

#[test]
fn snapshot_serializes_with_the_exposed_field_names() -> TestResult {
    let registry = ProcessRegistry::new();
    let record = registry.get_or_create("json");
    record.with(|r| {
        r.begin_run("json", true).expect("start");
        r.set_pid(Some(4242));
        r.append(OutputStream::Stdout, ["hi\n".to_string()]);
    });

    let value = serde_json::to_value(record.snapshot())?;
    assert_eq!(value["stdout"], serde_json::json!(["hi\n"]));
    assert_eq!(value["stderr"], serde_json::json!([]));
    assert_eq!(value["pid"], serde_json::json!(4242));
    assert_eq!(value["exit_status"], serde_json::Value::Null);
    assert_eq!(value["in_progress"], serde_json::json!(true));
    Ok(())
}

#[test]
fn sentinel_codes_map_back_to_terminations() {
    assert_eq!(Termination::from_code(EXIT_SPAWN_FAILED), Termination::SpawnFailed);
    assert_eq!(Termination::from_code(EXIT_SESSION_FAILED), Termination::SessionFailed);
    assert_eq!(Termination::from_code(143), Termination::Exited(143));
    assert!(Termination::TimedOut.is_retryable());
    assert!(!Termination::Exited(1).is_retryable());
    assert!(Termination::Exited(0).success());
}

#[tokio::test(start_paused = true)]
async fn sweep_removes_idle_records_but_not_running_ones() {
    let registry = ProcessRegistry::new();
    registry.get_or_create("idle");
    let running = registry.get_or_create("running");
    running.with(|r| r.begin_run("running", true)).expect("start");

    tokio::time::advance(Duration::from_secs(2 * 60 * 60)).await;
    registry.get_or_create("recent");

    let swept = registry.sweep_idle(Duration::from_secs(60 * 60));
    assert_eq!(swept, vec!["idle".to_string()]);
    assert!(registry.contains("running"));
    assert!(registry.contains("recent"));
}
