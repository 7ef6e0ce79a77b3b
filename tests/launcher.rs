use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use execmon::command::Target;
use execmon::errors::ExecError;
use execmon::launch::{AsyncLauncher, LaunchLimits, WatchdogConfig, WatchdogExit};
use execmon::record::{ProcessRegistry, Termination};
use execmon_test_utils::builders::{DescriptorBuilder, RunRequestBuilder};
use execmon_test_utils::{
    LoopbackTransport, init_tracing, loopback_executors, wait_settled, with_timeout,
};

type TestResult = Result<(), Box<dyn Error>>;

fn launcher(max_workers: usize, max_queued: usize) -> AsyncLauncher {
    let transport = LoopbackTransport::new();
    AsyncLauncher::new(
        ProcessRegistry::new(),
        loopback_executors(&transport, Duration::from_secs(2)),
        LaunchLimits {
            max_workers,
            max_queued,
        },
    )
}

#[tokio::test]
async fn launch_returns_before_the_command_finishes() -> TestResult {
    init_tracing();
    let launcher = launcher(2, 2);

    let handle = launcher.launch(RunRequestBuilder::new("bg").shell("sleep 0.2; echo done").build())?;
    assert_eq!(handle.id(), "bg");

    let record = launcher.registry().lookup("bg")?;
    assert_eq!(record.exit_status(), None);

    let snapshot = wait_settled(&record).await;
    assert_eq!(snapshot.stdout, vec!["done\n"]);
    assert_eq!(with_timeout(handle.wait()).await?, Termination::Exited(0));
    Ok(())
}

#[tokio::test]
async fn saturated_pool_rejects_new_launches() -> TestResult {
    init_tracing();
    let launcher = launcher(1, 1);

    let first = launcher.launch(RunRequestBuilder::new("a").shell("sleep 0.3").build())?;
    let second = launcher.launch(RunRequestBuilder::new("b").shell("sleep 0.3").build())?;
    assert_eq!(launcher.in_flight(), 2);

    let err = launcher
        .launch(RunRequestBuilder::new("c").shell("true").build())
        .unwrap_err();
    assert!(matches!(err, ExecError::LaunchRejected(_)), "got {err:?}");
    assert!(!launcher.registry().contains("c"));

    with_timeout(first.wait()).await?;
    with_timeout(second.wait()).await?;
    assert_eq!(launcher.in_flight(), 0);

    let retry = launcher.launch(RunRequestBuilder::new("c").shell("true").build())?;
    assert_eq!(with_timeout(retry.wait()).await?, Termination::Exited(0));
    Ok(())
}

#[tokio::test]
async fn queued_launch_waits_for_a_worker() -> TestResult {
    let launcher = launcher(1, 4);

    let first = launcher.launch(RunRequestBuilder::new("first").shell("sleep 0.3").build())?;
    let second = launcher.launch(RunRequestBuilder::new("second").shell("echo ran").build())?;

    let queued = launcher.registry().lookup("second")?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!queued.is_running(), "second launch must wait for the only worker");

    with_timeout(first.wait()).await?;
    assert_eq!(with_timeout(second.wait()).await?, Termination::Exited(0));
    assert_eq!(queued.snapshot().stdout, vec!["ran\n"]);
    Ok(())
}

#[tokio::test]
async fn idle_sweep_spares_launches_waiting_for_a_worker() -> TestResult {
    let launcher = launcher(1, 4);

    let first = launcher.launch(RunRequestBuilder::new("first").shell("sleep 0.3").build())?;
    let second = launcher.launch(RunRequestBuilder::new("second").shell("echo ran").build())?;
    let queued = launcher.registry().lookup("second")?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(queued.is_queued());
    assert!(!queued.is_running());
    let swept = launcher.registry().sweep_idle(Duration::ZERO);
    assert!(swept.is_empty(), "swept {swept:?}");

    with_timeout(first.wait()).await?;
    assert_eq!(with_timeout(second.wait()).await?, Termination::Exited(0));
    let record = launcher.registry().lookup("second")?;
    assert!(record.ptr_eq(&queued));
    assert!(!record.is_queued());
    assert_eq!(record.snapshot().stdout, vec!["ran\n"]);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let mut swept = launcher.registry().sweep_idle(Duration::ZERO);
    swept.sort();
    assert_eq!(swept, vec!["first".to_string(), "second".to_string()]);
    Ok(())
}

#[tokio::test]
async fn rejected_busy_launch_does_not_leave_the_record_queued() -> TestResult {
    let launcher = launcher(2, 2);
    let record = launcher.registry().get_or_create("held");

    let request = RunRequestBuilder::new("held").shell("true").build();
    let busy = launcher.executors().select(&request.target);
    let task_record = record.clone();
    let holder = tokio::spawn(async move {
        let request = RunRequestBuilder::new("held").shell("sleep 0.3").build();
        busy.run(&request, &task_record).await
    });
    with_timeout(async {
        while !record.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    let err = launcher.launch(request).unwrap_err();
    assert!(matches!(err, ExecError::RecordBusy(_)));
    assert!(!record.is_queued());
    assert_eq!(launcher.in_flight(), 0);

    with_timeout(holder).await??;
    Ok(())
}

#[tokio::test]
async fn same_id_cannot_be_launched_twice() -> TestResult {
    let launcher = launcher(4, 4);

    let handle = launcher.launch(RunRequestBuilder::new("dup").shell("sleep 0.3").build())?;

    let err = launcher
        .launch(RunRequestBuilder::new("dup").shell("true").build())
        .unwrap_err();
    assert!(matches!(err, ExecError::RecordBusy(_)));

    let err = launcher
        .run(RunRequestBuilder::new("dup").shell("true").build())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::RecordBusy(_)));

    with_timeout(handle.wait()).await?;
    Ok(())
}

#[tokio::test]
async fn run_executes_in_place() -> TestResult {
    let launcher = launcher(1, 0);

    let termination = with_timeout(
        launcher.run(RunRequestBuilder::new("sync").argv(&["echo", "inline"]).build()),
    )
    .await?;

    assert_eq!(termination, Termination::Exited(0));
    assert_eq!(launcher.registry().snapshot("sync")?.stdout, vec!["inline\n"]);
    assert_eq!(launcher.in_flight(), 0);
    Ok(())
}

#[tokio::test]
async fn remote_targets_go_through_the_remote_executor() -> TestResult {
    let transport = LoopbackTransport::new();
    let launcher = AsyncLauncher::new(
        ProcessRegistry::new(),
        loopback_executors(&transport, Duration::from_secs(2)),
        LaunchLimits::default(),
    );
    let target: Target = DescriptorBuilder::remote("vps", "game").target();

    let handle = launcher.launch(
        RunRequestBuilder::new("remote")
            .argv(&["echo", "over the wire"])
            .target(target)
            .build(),
    )?;

    assert_eq!(with_timeout(handle.wait()).await?, Termination::Exited(0));
    assert_eq!(transport.connects(), 1);
    assert_eq!(
        launcher.registry().snapshot("remote")?.stdout,
        vec!["over the wire\n"]
    );
    Ok(())
}

#[tokio::test]
async fn watchdog_retires_the_record_once_complete() -> TestResult {
    init_tracing();
    let launcher = launcher(2, 2);
    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);

    let (handle, watchdog) = launcher.launch_with_watchdog(
        RunRequestBuilder::new("server-start").shell("echo starting").build(),
        move || flag.load(Ordering::SeqCst),
        WatchdogConfig {
            interval: Duration::from_millis(20),
            max_lifetime: Duration::from_secs(5),
        },
    )?;

    with_timeout(handle.wait()).await?;
    assert!(launcher.registry().contains("server-start"));

    done.store(true, Ordering::SeqCst);
    assert_eq!(with_timeout(watchdog.join()).await, WatchdogExit::Completed);
    assert!(!launcher.registry().contains("server-start"));
    Ok(())
}
