// tests/common/mod.rs
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::cargo::CommandCargoExt;

pub fn preforkd() -> Command {
    let mut cmd = Command::cargo_bin("preforkd").unwrap();
    cmd.env_remove("PREFORK_CONFIG_PATH").env_remove("RUST_LOG");
    cmd
}

/// Spawn `preforkd start --no-detach` and read the port it prints.
pub fn start_foreground(args: &[&str]) -> (Child, u16) {
    let mut child = preforkd()
        .args(["start", "--no-detach", "--address", "127.0.0.1", "--port", "0"])
        .args(args)
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    let mut line = String::new();
    BufReader::new(child.stdout.take().unwrap())
        .read_line(&mut line)
        .unwrap();
    let port = line.trim().parse::<u16>().unwrap();
    (child, port)
}

pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(20));
    }
}

pub fn wait_for_file(path: &Path) {
    wait_until("pid file", || {
        std::fs::read_to_string(path)
            .map(|s| s.ends_with('\n'))
            .unwrap_or(false)
    });
}

pub fn echo(port: u16, msg: &[u8]) -> Vec<u8> {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let mut s = TcpStream::connect_timeout(&addr, Duration::from_secs(5)).unwrap();
    s.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    s.write_all(msg).unwrap();
    let mut out = Vec::new();
    s.read_to_end(&mut out).unwrap();
    out
}

pub fn wait_exit(child: &mut Child) -> std::process::ExitStatus {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("preforkd did not exit");
        }
        sleep(Duration::from_millis(20));
    }
}
