//! Record/replay round trips through the session API.

use std::time::Duration;

use netexpect::mock::MockDevice;
use netexpect::transcript::{escape, unescape};
use netexpect::{
    Credentials, NetError, NullTransport, Session, SessionConfig, TimeoutConfig, Transport,
};
use proptest::prelude::*;

fn fast_timeouts() -> TimeoutConfig {
    TimeoutConfig::default()
        .command(Duration::from_millis(300))
        .settle(Duration::from_millis(30))
}

fn fake_router() -> MockDevice {
    MockDevice::new()
        .on("show clock", "show clock\n12:00:00 UTC Mon Mar 1\nrouter1#")
        .on("show users", "show users\nadmin on vty0\nrouter1#")
        .on("", "\nrouter1#")
}

async fn record_two_commands(path: &std::path::Path) -> Vec<String> {
    let config = SessionConfig::new("r1.test")
        .credentials(Credentials::new("admin", "pw"))
        .timeouts(fast_timeouts())
        .record_to(path);
    let mut session = Session::new(fake_router(), config).unwrap();
    session.detect_prompt().await.unwrap();

    let mut outputs = Vec::new();
    for command in ["show clock", "show users"] {
        let reply = session.command(command).await.unwrap();
        outputs.push(reply.into_output().unwrap());
    }
    outputs
}

fn replay_session(path: &std::path::Path) -> Session<Box<dyn Transport>> {
    let config = SessionConfig::new("r1.test").replay_from(path);
    Session::new(Box::new(NullTransport) as Box<dyn Transport>, config).unwrap()
}

#[tokio::test]
async fn recorded_commands_replay_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.transcript");

    let recorded = record_two_commands(&path).await;
    assert_eq!(recorded[0], "12:00:00 UTC Mon Mar 1");

    let mut session = replay_session(&path);
    for (command, expected) in ["show clock", "show users"].iter().zip(&recorded) {
        let reply = session.command(command).await.unwrap();
        assert_eq!(reply.output(), Some(expected.as_str()));
    }
}

#[tokio::test]
async fn out_of_order_replay_is_sequence_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.transcript");
    record_two_commands(&path).await;

    let mut session = replay_session(&path);
    let err = session.command("show users").await.unwrap_err();
    assert!(matches!(err, NetError::SequenceMismatch { .. }));
}

#[tokio::test]
async fn replay_past_the_end_is_sequence_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.transcript");
    record_two_commands(&path).await;

    let mut session = replay_session(&path);
    session.command("show clock").await.unwrap();
    session.command("show users").await.unwrap();
    let err = session.command("show clock").await.unwrap_err();
    assert!(matches!(err, NetError::SequenceMismatch { .. }));
}

proptest! {
    #[test]
    fn escaping_round_trips_arbitrary_output(output in any::<String>()) {
        prop_assert_eq!(unescape(&escape(&output)), output);
    }

    #[test]
    fn escaped_output_never_contains_newlines(output in any::<String>()) {
        prop_assert!(!escape(&output).contains('\n'));
    }
}
