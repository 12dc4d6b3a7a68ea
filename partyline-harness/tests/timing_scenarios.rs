//! End-to-end runs of writer and reader tasks through the timing harness.

mod common;

use common::{boxed, output_file, payload, scratch, test_harness};
use partyline_core::{JoinableConfig, JoinableFile, Partyline, PartylineError};
use partyline_harness::{
    Delay, FnTask, HarnessConfig, ReadTarget, ReaderTask, TimingHarness, WriteTarget, WriterTask,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

#[test]
fn staggered_readers_receive_whole_payload() {
    let dir = tempdir().unwrap();
    let file = output_file(&scratch(dir.path(), "payload.bin"));
    let data = payload(10_000);

    let writer = WriterTask::with_payload(
        "writer",
        WriteTarget::Joinable(file.clone()),
        Delay::Millis(5),
        &data,
        10,
    );
    let writer_log = writer.output();
    let readers: Vec<ReaderTask> = (0..3)
        .map(|i| ReaderTask::joining(format!("reader-{i}"), Delay::None, &file))
        .collect();
    let outputs: Vec<_> = readers.iter().map(ReaderTask::output).collect();

    let mut tasks = vec![boxed(writer)];
    tasks.extend(readers.into_iter().map(boxed));
    let timings = test_harness().run_and_collect(2, tasks).unwrap();

    assert_eq!(timings.len(), 4);
    for output in &outputs {
        assert_eq!(output.bytes(), data);
        assert!(output.reached_end());
    }

    let log = writer_log.snapshot();
    assert_eq!(log.commits.len(), 10);
    assert_eq!(log.closed_at, Some(10_000));
    let last_commit = writer_log.last_commit_ms().unwrap();
    assert!(timings.get("writer").unwrap() >= last_commit);
}

#[test]
fn second_writer_task_fails_the_run() {
    let dir = tempdir().unwrap();
    let path = scratch(dir.path(), "contended.bin");
    let partyline = Arc::new(Partyline::default());
    let target = || WriteTarget::Registry {
        partyline: Arc::clone(&partyline),
        path: path.clone(),
    };

    let first = WriterTask::new(
        "writer-a",
        target(),
        Delay::Millis(50),
        vec![vec![b'a'; 64]; 4],
    );
    let second = WriterTask::new("writer-b", target(), Delay::None, vec![vec![b'b'; 64]]);

    let err = test_harness()
        .run_and_collect(10, vec![boxed(first), boxed(second)])
        .unwrap_err();

    match &err {
        PartylineError::TaskFailed { task, .. } => assert_eq!(task, "writer-b"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root(), PartylineError::LockConflict { .. }));

    // The winner finished its whole payload despite the failed run.
    assert_eq!(std::fs::read(&path).unwrap(), vec![b'a'; 256]);
}

#[test]
fn later_joiners_never_see_less() {
    let dir = tempdir().unwrap();
    let file = output_file(&scratch(dir.path(), "monotonic.bin"));
    let data = payload(20 * 512);

    let writer = WriterTask::with_payload(
        "writer",
        WriteTarget::Joinable(file.clone()),
        Delay::Millis(10),
        &data,
        20,
    );
    let readers: Vec<ReaderTask> = [0, 50, 100]
        .into_iter()
        .map(|ms| ReaderTask::joining(format!("join-{ms}"), Delay::Millis(ms), &file))
        .collect();
    let outputs: Vec<_> = readers.iter().map(ReaderTask::output).collect();

    let mut tasks = vec![boxed(writer)];
    tasks.extend(readers.into_iter().map(boxed));
    test_harness().run_and_collect(0, tasks).unwrap();

    let logs: Vec<_> = outputs.iter().map(|o| o.snapshot()).collect();
    for log in &logs {
        assert_eq!(log.bytes, data);
        assert!(log.samples.windows(2).all(|w| w[0].committed <= w[1].committed));
        assert!(log.samples.iter().all(|s| s.read_total <= s.committed));
    }

    for (i, early) in logs.iter().enumerate() {
        for late in &logs[i + 1..] {
            let Some(first) = late.samples.first() else {
                continue;
            };
            let joined = late.joined_at_ms.unwrap();
            for sample in early.samples.iter().filter(|s| s.at_ms < joined) {
                assert!(first.committed >= sample.committed);
            }
        }
    }
}

#[test]
fn raw_reader_matches_after_close() {
    let dir = tempdir().unwrap();
    let path = scratch(dir.path(), "raw.bin");
    let file = output_file(&path);
    let data = payload(3_000);

    let writer = WriterTask::with_payload(
        "writer",
        WriteTarget::Joinable(file.clone()),
        Delay::None,
        &data,
        3,
    );
    let raw = ReaderTask::new(
        "raw",
        Delay::Millis(100),
        Delay::None,
        Delay::None,
        ReadTarget::Raw(path.clone()),
    )
    .with_chunk_size(700);
    let raw_output = raw.output();

    let timings = test_harness()
        .run(vec![boxed(writer), boxed(raw)])
        .unwrap();

    assert_eq!(raw_output.bytes(), data);
    assert_eq!(raw_output.snapshot().chunks, 5);
    assert!(timings.get("raw").unwrap() >= timings.get("writer").unwrap());
}

#[test]
fn join_after_close_reads_full_content() {
    let dir = tempdir().unwrap();
    let path = scratch(dir.path(), "closed.bin");
    let data = payload(1_234);

    let mut writer = JoinableFile::create(&path, JoinableConfig::default()).unwrap();
    writer.write(&data).unwrap();
    let file = writer.file();
    writer.close().unwrap();

    let late = ReaderTask::joining("late", Delay::None, &file);
    let late_output = late.output();
    let cold = ReaderTask::new(
        "cold",
        Delay::None,
        Delay::None,
        Delay::None,
        ReadTarget::Joinable(JoinableFile::open(&path, false, JoinableConfig::default()).unwrap()),
    );
    let cold_output = cold.output();

    test_harness().run(vec![boxed(late), boxed(cold)]).unwrap();
    assert_eq!(late_output.bytes(), data);
    assert_eq!(cold_output.bytes(), data);
    assert!(late_output.reached_end() && cold_output.reached_end());
}

#[test]
fn slow_reader_keeps_up_in_chunks() {
    let dir = tempdir().unwrap();
    let file = output_file(&scratch(dir.path(), "slow.bin"));
    let data = payload(4_000);

    let writer = WriterTask::with_payload(
        "writer",
        WriteTarget::Joinable(file.clone()),
        Delay::Millis(2),
        &data,
        4,
    );
    let reader = ReaderTask::new(
        "slow",
        Delay::None,
        Delay::Millis(5),
        Delay::Millis(20),
        ReadTarget::Joinable(file.clone()),
    )
    .with_chunk_size(500);
    let output = reader.output();

    let timings = test_harness()
        .run(vec![boxed(writer), boxed(reader)])
        .unwrap();

    let log = output.snapshot();
    assert_eq!(log.bytes, data);
    assert!(log.chunks >= 8);
    assert!(log.samples.iter().all(|s| s.read_total <= s.committed));
    assert!(timings.get("slow").unwrap() > timings.get("writer").unwrap());
}

#[test]
fn stalled_writer_trips_read_timeout() {
    let dir = tempdir().unwrap();
    let config = JoinableConfig::default().with_read_timeout(Duration::from_millis(50));
    let file = JoinableFile::open(scratch(dir.path(), "stall.bin"), true, config).unwrap();

    let writer = WriterTask::new(
        "writer",
        WriteTarget::Joinable(file.clone()),
        Delay::None,
        vec![b"head".to_vec()],
    )
    .with_close_delay(Delay::Millis(300));
    let writer_log = writer.output();
    let reader = ReaderTask::joining("reader", Delay::None, &file);
    let output = reader.output();

    let err = test_harness()
        .run(vec![boxed(writer), boxed(reader)])
        .unwrap_err();

    assert!(matches!(err.root(), PartylineError::WaitExceeded { .. }));
    assert_eq!(output.bytes(), b"head");
    assert!(!output.reached_end());
    // Cancellation does not cut an open writer short; it closes normally.
    assert_eq!(writer_log.closed_at(), Some(4));
    assert!(file.is_closed());
}

#[test]
fn failed_run_lets_open_writer_finish() {
    let dir = tempdir().unwrap();
    let path = scratch(dir.path(), "complete.bin");
    let file = output_file(&path);
    let data = payload(100);

    let writer = WriterTask::with_payload(
        "writer",
        WriteTarget::Joinable(file.clone()),
        Delay::Millis(20),
        &data,
        10,
    );
    let writer_log = writer.output();
    let failing = FnTask::new("failing", |ctx| {
        ctx.sleep(Delay::Millis(30))?;
        Err(PartylineError::NotFound {
            path: "absent.bin".into(),
        })
    });

    let err = test_harness()
        .run(vec![boxed(writer), boxed(failing)])
        .unwrap_err();

    assert_eq!(err.root().code(), "E002");
    let log = writer_log.snapshot();
    assert_eq!(log.commits.len(), 10);
    assert_eq!(log.closed_at, Some(100));
    assert_eq!(file.committed(), 100);
    assert_eq!(std::fs::read(&path).unwrap(), data);
}

#[test]
fn failed_run_releases_waiting_readers() {
    let dir = tempdir().unwrap();
    let file = output_file(&scratch(dir.path(), "never.bin"));
    let readers: Vec<ReaderTask> = (0..3)
        .map(|i| ReaderTask::joining(format!("reader-{i}"), Delay::None, &file))
        .collect();
    let outputs: Vec<_> = readers.iter().map(ReaderTask::output).collect();

    let mut tasks: Vec<_> = readers.into_iter().map(boxed).collect();
    tasks.push(boxed(FnTask::new("failing", |ctx| {
        ctx.sleep(Delay::Millis(20))?;
        Err(PartylineError::NotFound {
            path: "absent.bin".into(),
        })
    })));

    let start = Instant::now();
    let err = test_harness().run(tasks).unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(err.root().code(), "E002");
    assert_eq!(file.reader_count(), 0);
    assert!(outputs.iter().all(|o| o.is_empty() && !o.reached_end()));
}

#[test]
fn writer_task_on_closed_file_fails() {
    let dir = tempdir().unwrap();
    let writer = JoinableFile::create(scratch(dir.path(), "done.bin"), JoinableConfig::default())
        .unwrap();
    let file = writer.file();
    writer.close().unwrap();

    let task = WriterTask::new("again", WriteTarget::Joinable(file), Delay::None, vec![]);
    let err = test_harness().run(vec![boxed(task)]).unwrap_err();
    assert_eq!(err.root().code(), "E003");
}

#[test]
fn reader_joining_missing_path_fails() {
    let dir = tempdir().unwrap();
    let partyline = Partyline::default();
    let err = partyline
        .join(scratch(dir.path(), "nowhere.bin"))
        .err()
        .unwrap();
    assert!(matches!(err, PartylineError::NotFound { .. }));

    let raw = ReaderTask::new(
        "raw",
        Delay::None,
        Delay::None,
        Delay::None,
        ReadTarget::Raw(scratch(dir.path(), "nowhere.bin")),
    );
    let err = test_harness().run(vec![boxed(raw)]).unwrap_err();
    assert_eq!(err.root().code(), "E002");
}

#[test]
fn harness_from_yaml_config() {
    let dir = tempdir().unwrap();
    let config_path = scratch(dir.path(), "harness.yaml");
    std::fs::write(
        &config_path,
        "label: yaml-run\nstart_delay_ms: 15\nrun_timeout_ms: 5000\n",
    )
    .unwrap();

    let config = HarnessConfig::from_yaml_file(&config_path).unwrap();
    let harness = TimingHarness::new(config);
    assert_eq!(harness.config().label, "yaml-run");

    let file = output_file(&scratch(dir.path(), "yaml.bin"));
    let writer = WriterTask::new(
        "writer",
        WriteTarget::Joinable(file.clone()),
        Delay::None,
        vec![b"x".to_vec()],
    );
    let reader = ReaderTask::joining("reader", Delay::None, &file);

    let timings = harness.run(vec![boxed(writer), boxed(reader)]).unwrap();
    assert!(timings.get("reader").unwrap() >= 15);
}

#[test]
fn timings_serialize_to_json() {
    let dir = tempdir().unwrap();
    let file = output_file(&scratch(dir.path(), "json.bin"));
    let writer = WriterTask::new(
        "writer",
        WriteTarget::Joinable(file),
        Delay::None,
        vec![b"abc".to_vec()],
    );

    let timings = test_harness().run(vec![boxed(writer)]).unwrap();
    let json = serde_json::to_value(&timings).unwrap();
    assert!(json["entries"]["writer"].is_u64());
}
