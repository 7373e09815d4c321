//! Skips wiremock-backed tests where loopback sockets cannot be bound.
//!
//! Set `TERALINK_REQUIRE_SOCKET_TESTS=1` in CI to turn a skip into a failure.

use std::net::TcpListener;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "TERALINK_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .map(|value| value.trim().to_ascii_lowercase())
        .is_ok_and(|value| matches!(value.as_str(), "1" | "true" | "yes"))
}

fn loopback_available() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

/// Starts a mock server, or returns `None` (after a note on stderr) when
/// loopback is unavailable and sockets are not required.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if loopback_available() {
        return Some(MockServer::start().await);
    }

    let test = std::thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string();
    assert!(
        !sockets_required(),
        "{test}: cannot bind 127.0.0.1 and {REQUIRE_ENV} is set"
    );
    eprintln!("{test}: skipped, cannot bind 127.0.0.1 (set {REQUIRE_ENV}=1 to fail instead)");
    None
}
