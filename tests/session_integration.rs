//! End-to-end tests against an in-memory duplex stream standing in for a
//! live debugger: the fake peer below writes scripted MI output and reads
//! encoded commands off the other half, exercising the full
//! parser → correlator → dispatcher → façade pipeline without spawning a
//! real `gdb`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use gdbmi::command::BreakpointLocation;
use gdbmi::config::Config;
use gdbmi::error::Error;
use gdbmi::events::EventName;
use gdbmi::session::Session;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

static INIT_LOGGING: Once = Once::new();

/// `tracing` events fire throughout the protocol path (command writes,
/// dropped malformed records, correlation misses); surfacing them under
/// `cargo test -- --nocapture` is worth the one-line setup.
fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn test_config() -> Config {
    Config {
        debugger_path: "gdb".to_string(),
        command_timeout_secs: 5,
    }
}

/// Reads one line (terminator included) off `half`.
async fn read_command(half: &mut tokio::io::DuplexStream) -> String {
    let mut buf = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        half.read_exact(&mut byte).await.unwrap();
        buf.push(byte[0]);
        if byte[0] == b'\n' {
            break;
        }
    }
    String::from_utf8(buf).unwrap()
}

/// Byte-exact expectations via `tokio_test`'s mock, as opposed to the
/// scripted-peer-task style the other tests use: the mock fails the test
/// immediately if the encoder ever writes something other than the exact
/// expected line, instead of blocking forever waiting for a peer read.
#[tokio::test]
async fn exec_next_encodes_the_exact_wire_line() {
    init_logging();
    let mock = tokio_test::io::Builder::new()
        .write(b"1-exec-next --thread 2\n")
        .read(b"1^running\n")
        .build();
    let (read_half, write_half) = tokio::io::split(mock);
    let session = Session::attach(read_half, write_half, test_config());

    session.step_over_line(Some(2)).await.unwrap();
}

#[tokio::test]
async fn breakpoint_insert_round_trips_through_the_facade() {
    init_logging();
    let (client, mut peer) = tokio::io::duplex(4096);
    let (read_half, write_half) = tokio::io::split(client);
    let session = Session::attach(read_half, write_half, test_config());

    let peer_task = tokio::spawn(async move {
        let cmd = read_command(&mut peer).await;
        assert!(cmd.starts_with("1-break-insert"));
        peer.write_all(b"1^done,bkpt={number=\"1\",type=\"breakpoint\",disp=\"keep\",enabled=\"y\",addr=\"0x4011f0\",func=\"main\",file=\"a.c\",fullname=\"/p/a.c\",line=\"6\",times=\"0\"}\n")
            .await
            .unwrap();
        peer.write_all(b"(gdb)\n").await.unwrap();
        peer
    });

    let bkpt = session
        .add_breakpoint(BreakpointLocation::Function { file: "a.c", function: "main" }, false)
        .await
        .unwrap();
    assert_eq!(bkpt.number.major, 1);
    assert_eq!(bkpt.function.as_deref(), Some("main"));
    assert_eq!(bkpt.src.line, Some(6));

    peer_task.await.unwrap();
}

#[tokio::test]
async fn debugger_error_result_surfaces_as_debugger_error() {
    let (client, mut peer) = tokio::io::duplex(4096);
    let (read_half, write_half) = tokio::io::split(client);
    let session = Session::attach(read_half, write_half, test_config());

    tokio::spawn(async move {
        let _ = read_command(&mut peer).await;
        peer.write_all(b"1^error,msg=\"Undefined command\",code=\"undefined-command\"\n")
            .await
            .unwrap();
        peer.write_all(b"(gdb)\n").await.unwrap();
    });

    let err = session.start_inferior().await.unwrap_err();
    match err {
        Error::Debugger { msg, .. } => assert_eq!(msg, "Undefined command"),
        other => panic!("expected Debugger error, got {other:?}"),
    }
}

#[tokio::test]
async fn interleaved_commands_resolve_to_their_own_caller() {
    let (client, mut peer) = tokio::io::duplex(4096);
    let (read_half, write_half) = tokio::io::split(client);
    let session = Arc::new(Session::attach(read_half, write_half, test_config()));

    let peer_task = tokio::spawn(async move {
        let first = read_command(&mut peer).await;
        let second = read_command(&mut peer).await;
        assert!(first.starts_with("1-"));
        assert!(second.starts_with("2-"));
        // Reply out of order: second command resolves first.
        peer.write_all(b"2^done\n").await.unwrap();
        peer.write_all(b"(gdb)\n").await.unwrap();
        peer.write_all(b"1^done\n").await.unwrap();
        peer.write_all(b"(gdb)\n").await.unwrap();
    });

    let s1 = session.clone();
    let s2 = session.clone();
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { s1.start_inferior().await }),
        tokio::spawn(async move { s2.continue_all(None).await }),
    );
    r1.unwrap().unwrap();
    r2.unwrap().unwrap();
    peer_task.await.unwrap();
}

#[tokio::test]
async fn stopped_notification_dispatches_breakpoint_hit() {
    let (client, mut peer) = tokio::io::duplex(4096);
    let (read_half, write_half) = tokio::io::split(client);
    let session = Session::attach(read_half, write_half, test_config());

    let hit_count = Arc::new(AtomicUsize::new(0));
    {
        let hit_count = hit_count.clone();
        session.subscribe(
            EventName::BreakpointHit,
            Box::new(move |_event| {
                hit_count.fetch_add(1, Ordering::SeqCst);
            }),
        );
    }

    peer.write_all(b"*stopped,reason=\"breakpoint-hit\",bkptno=\"1\",thread-id=\"1\",stopped-threads=\"all\",frame={addr=\"0x4011f0\",func=\"main\",file=\"a.c\",line=\"12\"}\n")
        .await
        .unwrap();

    // Give the reader task a moment to observe and dispatch the record.
    for _ in 0..50 {
        if hit_count.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(hit_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_token_in_result_is_reported_not_dropped() {
    let (client, mut peer) = tokio::io::duplex(4096);
    let (read_half, write_half) = tokio::io::split(client);
    let _session = Session::attach(read_half, write_half, test_config());

    // No command was ever issued with token 7; the reader task should log
    // and continue rather than panic or wedge the stream.
    peer.write_all(b"7^done\n").await.unwrap();
    peer.write_all(b"(gdb)\n").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
}

#[tokio::test]
async fn end_resolves_cleanly_on_gdb_exit() {
    let (client, mut peer) = tokio::io::duplex(4096);
    let (read_half, write_half) = tokio::io::split(client);
    let session = Session::attach(read_half, write_half, test_config());

    tokio::spawn(async move {
        let cmd = read_command(&mut peer).await;
        assert!(cmd.starts_with("1-gdb-exit"));
        peer.write_all(b"1^exit\n").await.unwrap();
    });

    session.end().await.unwrap();
}
