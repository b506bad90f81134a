//! PTY session tests against local programs
#![cfg(unix)]

use ndback::{
    Connector, Method, Pattern, PtyConnector, PtySession, SessionRequest, Transport, TransportError,
};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_basic_command_output() {
    let mut session = PtySession::builder()
        .spawn_command("echo", &["Hello World"])
        .expect("Failed to spawn echo");

    let result = session
        .expect(&Pattern::regex("Hello").unwrap(), WAIT)
        .await
        .expect("Failed to find 'Hello'");

    assert_eq!(result.matched, "Hello");
    session.close().await;
}

#[tokio::test]
async fn test_earliest_match_wins() {
    let mut session = PtySession::builder()
        .spawn_command("printf", &["Password: (last login: never)"])
        .expect("Failed to spawn printf");

    let user = Pattern::regex("ogin:").unwrap();
    let password = Pattern::regex("assword:").unwrap();
    let result = session
        .expect_any(&[&user, &password], WAIT)
        .await
        .expect("No pattern matched");

    assert_eq!(result.pattern_index, 1);
    assert_eq!(result.before, "P");

    // The rest stays pending for the next wait
    let result = session.expect(&user, WAIT).await.expect("Second match");
    assert_eq!(result.before, " (last l");
}

#[tokio::test]
async fn test_capture_between_prompts() {
    let mut session = PtySession::builder()
        .spawn_command("printf", &["sw1#show version\\nIOS 15.2\\nsw1#"])
        .expect("Failed to spawn printf");
    let prompt = Pattern::regex("#").unwrap();

    session.expect(&prompt, WAIT).await.expect("First prompt");
    let result = session.expect(&prompt, WAIT).await.expect("Second prompt");

    // The terminal turns each newline into CR LF
    assert_eq!(
        result.captured().replace('\r', ""),
        "show version\nIOS 15.2\nsw1#"
    );
}

#[tokio::test]
async fn test_ansi_stripped_before_matching() {
    let mut session = PtySession::builder()
        .spawn_command("printf", &["\\033[1mBOLD\\033[0m done"])
        .expect("Failed to spawn printf");

    let result = session
        .expect(&Pattern::regex("BOLD done").unwrap(), WAIT)
        .await
        .expect("Stripped text not matched");
    assert_eq!(result.matched, "BOLD done");
}

#[tokio::test]
async fn test_timeout_error() {
    let mut session = PtySession::builder()
        .spawn_command("sleep", &["2"])
        .expect("Failed to spawn sleep");

    let result = session
        .expect(&Pattern::regex("NEVER_APPEARS").unwrap(), Duration::from_millis(100))
        .await;

    match result {
        Err(TransportError::Timeout { duration }) => {
            assert_eq!(duration, Duration::from_millis(100));
        }
        Ok(_) => panic!("Should not have matched"),
        Err(e) => panic!("Unexpected error: {}", e),
    }
    session.close().await;
}

#[tokio::test]
async fn test_eof_after_exit() {
    let mut session = PtySession::builder()
        .spawn_command("echo", &["Quick"])
        .expect("Failed to spawn echo");

    session
        .expect(&Pattern::regex("Quick").unwrap(), WAIT)
        .await
        .expect("Output before exit");

    let result = session.expect(&Pattern::regex("NEVER").unwrap(), WAIT).await;
    assert!(matches!(result, Err(TransportError::Eof)), "got {result:?}");
}

#[tokio::test]
async fn test_send_and_receive() {
    let mut session = PtySession::builder()
        .spawn_command::<&str>("cat", &[])
        .expect("Failed to spawn cat");

    session
        .send_line("show running-config")
        .await
        .expect("Failed to send");

    let result = session
        .expect(&Pattern::literal("show running-config").unwrap(), WAIT)
        .await
        .expect("Echo not received");
    assert_eq!(result.matched, "show running-config");

    session.close().await;
}

#[tokio::test]
async fn test_full_buffer() {
    let mut session = PtySession::builder()
        .max_pending(16)
        .spawn_command("printf", &["0123456789012345678901234567890123456789"])
        .expect("Failed to spawn printf");

    let result = session.expect(&Pattern::regex("#$").unwrap(), WAIT).await;
    assert!(
        matches!(result, Err(TransportError::FullBuffer { size }) if size > 16),
        "got {result:?}"
    );
}

#[tokio::test]
async fn test_close_kills_process() {
    let mut session = PtySession::builder()
        .spawn_command("sleep", &["30"])
        .expect("Failed to spawn sleep");
    assert!(session.is_alive());

    let started = Instant::now();
    session.close().await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!session.is_alive());
    assert!(matches!(
        session.send_line("anything").await,
        Err(TransportError::Closed)
    ));
    assert!(matches!(
        session.expect(&Pattern::regex("x").unwrap(), WAIT).await,
        Err(TransportError::Closed)
    ));
}

#[tokio::test]
async fn test_missing_program() {
    let result = PtySession::builder().spawn_command::<&str>("/nonexistent/ndback-client", &[]);
    assert!(matches!(result, Err(TransportError::Spawn(_))));
}

#[tokio::test]
async fn test_wait_longer_than_clock() {
    let mut session = PtySession::builder()
        .spawn_command("echo", &["Hello"])
        .expect("Failed to spawn echo");

    let result = session
        .expect(&Pattern::regex("Hello").unwrap(), Duration::MAX)
        .await
        .expect("Failed to find 'Hello'");
    assert_eq!(result.matched, "Hello");
}

#[tokio::test]
async fn test_stalled_write_times_out() {
    let limit = Duration::from_millis(200);
    let mut session = PtySession::builder()
        .write_timeout(limit)
        .spawn_command("sh", &["-c", "stty raw -echo && echo ready && exec sleep 30"])
        .expect("Failed to spawn sh");
    session
        .expect(&Pattern::regex("ready").unwrap(), WAIT)
        .await
        .expect("Terminal not set up");

    // Nobody reads, so the terminal queue fills and the write blocks
    let flood = vec![b'x'; 1024 * 1024];
    let started = Instant::now();
    let result = session.send(&flood).await;

    assert!(
        matches!(result, Err(TransportError::Timeout { duration }) if duration == limit),
        "got {result:?}"
    );
    assert!(started.elapsed() < WAIT);
    session.close().await;
}

#[tokio::test]
async fn test_connector_opens_session() {
    let request = SessionRequest {
        method: Method::Ssh,
        address: "192.0.2.1".to_string(),
        port: "22".to_string(),
        user: "backup".to_string(),
        line_ending: "\n".to_string(),
        timeout: WAIT,
        echo: false,
    };

    // Hosts without an ssh client report a spawn error instead
    match PtyConnector::default().connect(&request).await {
        Ok(mut session) => session.close().await,
        Err(TransportError::Spawn(_)) => {}
        Err(e) => panic!("Unexpected error: {e}"),
    }
}
