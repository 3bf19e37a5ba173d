//! # Duo Common Library
//!
//! Shared code for the Duo study client:
//! - Sample normalization and feedback reconciliation
//! - FD hypothesis editing and serialization
//! - Backend wire types and the double-decode adapter
//! - Participant session state machine
//! - Configuration loading

pub mod config;
pub mod error;
pub mod feedback;
pub mod header;
pub mod hypothesis;
pub mod reconcile;
pub mod sample;
pub mod scenarios;
pub mod session;
pub mod sort;
pub mod wire;

pub use error::{Error, Result};
pub use header::Header;
pub use hypothesis::{FdHypothesis, Side};
pub use reconcile::{CellKey, ReconciledSample};
pub use session::{BackendCall, Input, Session, SessionSettings, Stage};
