//! Shared helpers for HTTP integration tests.

pub mod mock_share;
pub mod socket_guard;
