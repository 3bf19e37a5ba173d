//! duo-client library - terminal front end for the Duo study
//!
//! Talks to the study backend over HTTP and drives the participant session
//! from [`duo_common::session`].

pub mod backend;
pub mod commands;
pub mod driver;
pub mod render;

pub use backend::{BackendClient, ClientError};
pub use driver::Driver;
