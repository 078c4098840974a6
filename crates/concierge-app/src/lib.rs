// Library root: re-exports all modules so integration tests and the binary
// share one public API.

pub mod app;
pub mod chat;
pub mod prompt;
pub mod search;
pub mod server;
pub mod tools;
