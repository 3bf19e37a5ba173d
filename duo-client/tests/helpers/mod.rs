//! Test helper modules for duo-client integration tests
//!
//! - MockBackend: in-process study backend on an ephemeral port

pub mod mock_backend;

pub use mock_backend::MockBackend;
