/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The IdP dispatcher: builds action-style JSON requests, routes them
//! through the injected [`Dispatcher`], tracks per-action backoff state and
//! classifies error responses.

use crate::error::*;
use crate::transport::{Dispatcher, Request};
use parking_lot::Mutex;
use serde_derive::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum BackoffState {
    Ok,
    Backoff {
        backoff_end_duration: Duration,
        time_since_backoff: Instant,
    },
}

/// Talks to a single IdP endpoint. One instance is shared by every `User`
/// created from the same `Pool`.
pub struct IdpClient {
    endpoint: String,
    dispatcher: Box<dyn Dispatcher>,
    backoff: Mutex<HashMap<String, BackoffState>>,
}

#[derive(Debug, Deserialize)]
struct IdpErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    message: Option<String>,
}

impl IdpClient {
    pub fn new(endpoint: impl Into<String>, dispatcher: Box<dyn Dispatcher>) -> Self {
        IdpClient {
            endpoint: endpoint.into(),
            dispatcher,
            backoff: Mutex::new(HashMap::new()),
        }
    }

    /// Invoke an IdP action with a pre-built JSON argument map and return
    /// the parsed JSON response.
    pub fn invoke(&self, action: &str, args: Value) -> Result<Value> {
        log::debug!("dispatching {}", action);
        self.check_backoff(action)?;
        let body = serde_json::to_vec(&args)?;
        let request = Request::post_json(self.endpoint.clone(), action, body);
        let response = self.dispatcher.send(request).map_err(|e| {
            log::warn!("{} failed at the transport layer: {}", action, e);
            ErrorKind::Network(e.to_string())
        })?;

        if response.status == 429 {
            log::warn!("{} was rate-limited, backing off", action);
            self.record_backoff(action, Duration::from_secs(1));
            return Err(ErrorKind::Network(format!("{} was rate-limited", action)).into());
        }

        if !response.is_success() {
            let err = self.classify_error(&response.body);
            log::warn!("{} returned {}: {}", action, response.status, err);
            return Err(err);
        }

        self.clear_backoff(action);
        Ok(serde_json::from_slice(&response.body)?)
    }

    fn classify_error(&self, body: &[u8]) -> Error {
        match serde_json::from_slice::<IdpErrorBody>(body) {
            Ok(parsed) => {
                let kind = parsed
                    .error_type
                    .as_deref()
                    .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
                    .unwrap_or_else(|| "UnknownError".to_string());
                let message = parsed.message.unwrap_or_default();
                match kind.as_str() {
                    "NotAuthorizedException" => ErrorKind::NotAuthorized(message).into(),
                    _ => ErrorKind::IdpError { kind, message }.into(),
                }
            }
            Err(_) => ErrorKind::IdpError {
                kind: "UnknownError".to_string(),
                message: String::from_utf8_lossy(body).to_string(),
            }
            .into(),
        }
    }

    fn check_backoff(&self, action: &str) -> Result<()> {
        let mut states = self.backoff.lock();
        if let Some(BackoffState::Backoff {
            backoff_end_duration,
            time_since_backoff,
        }) = states.get(action)
        {
            if time_since_backoff.elapsed() < *backoff_end_duration {
                return Err(ErrorKind::Network(format!("{} is backing off", action)).into());
            }
        }
        states.insert(action.to_string(), BackoffState::Ok);
        Ok(())
    }

    fn record_backoff(&self, action: &str, duration: Duration) {
        self.backoff.lock().insert(
            action.to_string(),
            BackoffState::Backoff {
                backoff_end_duration: duration,
                time_since_backoff: Instant::now(),
            },
        );
    }

    fn clear_backoff(&self, action: &str) {
        self.backoff.lock().insert(action.to_string(), BackoffState::Ok);
    }
}
