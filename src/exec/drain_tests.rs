// src/exec/drain_tests.rs

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use super::{DrainEnd, drain_output};
use crate::record::RecordHandle;

/// Reader whose every read fails.
struct Broken;

impl AsyncRead for Broken {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel reset")))
    }
}

fn running_record() -> RecordHandle {
    let record = RecordHandle::new();
    record.begin_run("drain", true).expect("fresh record");
    record
}

#[tokio::test]
async fn read_failure_keeps_the_partial_line() {
    let record = running_record();
    let stdout = (&b"done\npartial"[..]).chain(Broken);

    let end = drain_output(Some(stdout), None::<&[u8]>, &record, false, None).await;

    match end {
        DrainEnd::Failed(err) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("expected a failed drain, got {other:?}"),
    }
    assert_eq!(record.snapshot().stdout, vec!["done\n", "partial"]);
}

#[tokio::test]
async fn both_streams_are_drained_to_eof() {
    let record = running_record();

    let end = drain_output(
        Some(&b"out\n"[..]),
        Some(&b"err"[..]),
        &record,
        true,
        Some(Duration::from_secs(1)),
    )
    .await;

    assert!(matches!(end, DrainEnd::Closed));
    let snapshot = record.snapshot();
    assert_eq!(snapshot.stdout, vec!["out\n"]);
    assert_eq!(snapshot.stderr, vec!["err\n"]);
}
