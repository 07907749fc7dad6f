// crates/daemon/tests/daemonize.rs
mod common;

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use common::{FakeFork, FakeOps, FakeServer, expect_exit};
use daemon::{DaemonOptions, DetachOptions, SignalBindings, detach_with, run_daemon_with};
use tempfile::tempdir;

#[test]
fn detach_forks_twice_and_records_grandchild() {
    let dir = tempdir().unwrap();
    let pid_file = dir.path().join("d.pid");
    let out = dir.path().join("out.log");
    let ops = FakeOps::with_plan(&[FakeFork::Child, FakeFork::Child]);
    let opts = DetachOptions::default()
        .stdout(&out)
        .pid_file(Some(pid_file.clone()));

    detach_with(&ops, &opts).unwrap();

    assert_eq!(ops.fork_count(), 2);
    assert_eq!(ops.sessions.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(ops.redirects.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(fs::read_to_string(&pid_file).unwrap(), "4242\n");
    assert!(out.exists());
}

#[test]
fn detach_parent_exits_cleanly() {
    let ops = FakeOps::with_plan(&[FakeFork::Parent]);
    assert_eq!(expect_exit(|| detach_with(&ops, &DetachOptions::default())), 0);
    assert_eq!(ops.fork_count(), 1);
    assert_eq!(ops.sessions.load(std::sync::atomic::Ordering::SeqCst), 0);

    let ops = FakeOps::with_plan(&[FakeFork::Child, FakeFork::Parent]);
    assert_eq!(expect_exit(|| detach_with(&ops, &DetachOptions::default())), 0);
    assert_eq!(ops.fork_count(), 2);
    assert_eq!(ops.sessions.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn detach_fork_failure_exits_with_status_one() {
    let ops = FakeOps::with_plan(&[FakeFork::Fail(libc::EAGAIN)]);
    assert_eq!(expect_exit(|| detach_with(&ops, &DetachOptions::default())), 1);

    let ops = FakeOps::with_plan(&[FakeFork::Child, FakeFork::Fail(libc::ENOMEM)]);
    assert_eq!(expect_exit(|| detach_with(&ops, &DetachOptions::default())), 1);
    assert_eq!(ops.redirects.load(std::sync::atomic::Ordering::SeqCst), 0);
}

fn foreground(pid_file: Option<std::path::PathBuf>) -> DaemonOptions {
    DaemonOptions {
        pid_file,
        daemonize: false,
        signals: SignalBindings::disabled(),
        ..DaemonOptions::default()
    }
}

#[test]
fn foreground_run_writes_and_removes_pid_file() {
    let dir = tempdir().unwrap();
    let pid_file = dir.path().join("d.pid");
    let server = Arc::new(FakeServer {
        watch: Some(pid_file.clone()),
        ..FakeServer::default()
    });
    let ops = FakeOps::default();

    run_daemon_with(&ops, server.clone(), &foreground(Some(pid_file.clone()))).unwrap();

    assert_eq!(server.serves(), 1);
    assert_eq!(server.seen.lock().unwrap().as_deref(), Some("4242\n"));
    assert!(!pid_file.exists());
    assert_eq!(ops.fork_count(), 0);
}

#[test]
fn pid_file_is_removed_when_serving_fails_or_panics() {
    let dir = tempdir().unwrap();
    let pid_file = dir.path().join("d.pid");

    let failing = Arc::new(FakeServer {
        fail_serve: true,
        ..FakeServer::default()
    });
    assert!(run_daemon_with(&FakeOps::default(), failing, &foreground(Some(pid_file.clone()))).is_err());
    assert!(!pid_file.exists());

    let panicking = Arc::new(FakeServer {
        panic_serve: true,
        ..FakeServer::default()
    });
    let opts = foreground(Some(pid_file.clone()));
    let res = panic::catch_unwind(AssertUnwindSafe(|| {
        run_daemon_with(&FakeOps::default(), panicking, &opts)
    }));
    assert!(res.is_err());
    assert!(!pid_file.exists());
}

#[test]
fn pid_file_deleted_by_someone_else_is_tolerated() {
    struct Remover(std::path::PathBuf);
    impl daemon::Lifecycle for Remover {
        fn serve_forever(&self) -> std::io::Result<()> {
            fs::remove_file(&self.0)
        }
        fn shutdown(&self) {}
        fn load_config(&self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let dir = tempdir().unwrap();
    let pid_file = dir.path().join("d.pid");
    let server = Arc::new(Remover(pid_file.clone()));
    run_daemon_with(&FakeOps::default(), server, &foreground(Some(pid_file.clone()))).unwrap();
    assert!(!pid_file.exists());
}

#[test]
fn daemonized_run_detaches_before_serving() {
    let dir = tempdir().unwrap();
    let pid_file = dir.path().join("d.pid");
    let server = Arc::new(FakeServer {
        watch: Some(pid_file.clone()),
        ..FakeServer::default()
    });
    let ops = FakeOps::with_plan(&[FakeFork::Child, FakeFork::Child]);
    let opts = DaemonOptions {
        pid_file: Some(pid_file.clone()),
        daemonize: true,
        detach: DetachOptions::default().stdout(dir.path().join("out.log")),
        signals: SignalBindings::disabled(),
    };

    run_daemon_with(&ops, server.clone(), &opts).unwrap();

    assert_eq!(ops.fork_count(), 2);
    assert_eq!(server.seen.lock().unwrap().as_deref(), Some("4242\n"));
    assert!(!pid_file.exists());
}
