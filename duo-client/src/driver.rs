//! Session driver
//!
//! Owns the current [`Session`] and performs the backend calls each
//! transition asks for, feeding the replies back in until the session is
//! idle again. A failed call, or a reply the session cannot accept, becomes
//! [`Input::RequestFailed`] so the participant can retry.

use crate::backend::BackendClient;
use duo_common::session::{BackendCall, Input, Session, SessionSettings};
use std::collections::VecDeque;
use tracing::{error, info};

pub struct Driver {
    client: BackendClient,
    session: Session,
    last_failure: Option<String>,
}

impl Driver {
    pub fn new(client: BackendClient, settings: SessionSettings) -> Self {
        Self {
            client,
            session: Session::new(settings),
            last_failure: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Reason the most recent backend round-trip failed, if it did
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Apply a participant input and run any resulting backend calls
    ///
    /// Errors are rejections of `input` itself; the session is unchanged.
    /// Backend failures are not errors here, see [`Driver::last_failure`].
    pub async fn submit(&mut self, input: Input) -> duo_common::Result<()> {
        let step = self.session.step(input)?;
        self.session = step.session;
        self.last_failure = None;

        let mut calls: VecDeque<BackendCall> = step.calls.into();
        while let Some(call) = calls.pop_front() {
            let endpoint = call.endpoint();
            info!(endpoint, "Calling backend");

            let reply = match self.client.execute(&call).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.fail(endpoint, e.to_string());
                    continue;
                }
            };

            match self.session.step(reply) {
                Ok(step) => {
                    self.session = step.session;
                    calls.extend(step.calls);
                }
                Err(e) => self.fail(endpoint, e.to_string()),
            }
        }
        Ok(())
    }

    fn fail(&mut self, endpoint: &str, reason: String) {
        error!(endpoint, reason = %reason, "Backend round-trip failed");
        let failed = Input::RequestFailed {
            endpoint: endpoint.to_string(),
            reason: reason.clone(),
        };
        match self.session.step(failed) {
            Ok(step) => self.session = step.session,
            Err(e) => error!("Could not record failure: {}", e),
        }
        self.last_failure = Some(format!("{} failed: {}", endpoint, reason));
    }
}
