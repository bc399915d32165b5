/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Test doubles shared by the unit test suites: a scripted [`Dispatcher`]
//! that plays back a fixed sequence of responses, and a `test_pool`
//! constructor wired to it.

use crate::config::PoolConfig;
use crate::idp_client::IdpClient;
use crate::pool::Pool;
use crate::storage::MemoryStorage;
use crate::transport::{Dispatcher, Request, Response, TransportError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

pub struct QueuedResponse {
    status: u16,
    body: Vec<u8>,
}

impl QueuedResponse {
    pub fn ok(body: Value) -> Self {
        QueuedResponse {
            status: 200,
            body: serde_json::to_vec(&body).expect("test fixtures always serialize"),
        }
    }

    pub fn error(status: u16, body: Value) -> Self {
        QueuedResponse {
            status,
            body: serde_json::to_vec(&body).expect("test fixtures always serialize"),
        }
    }
}

pub struct ScriptedDispatcher {
    queue: Mutex<Vec<QueuedResponse>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Dispatcher for ScriptedDispatcher {
    fn send(&self, request: Request) -> std::result::Result<Response, TransportError> {
        self.sent.lock().push(request.body);
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            return Err(TransportError::Other("no more scripted responses".into()));
        }
        let next = queue.remove(0);
        Ok(Response {
            status: next.status,
            body: next.body,
        })
    }
}

/// Build a `Pool` backed by an in-memory storage and a dispatcher that
/// plays back `responses` in order, one per IdP call.
pub fn test_pool(responses: Vec<QueuedResponse>) -> Arc<Pool> {
    test_pool_capturing(responses).0
}

/// Like `test_pool`, but also returns a handle to every request body sent
/// through the dispatcher, in order, for assertions on outgoing arguments.
pub fn test_pool_capturing(responses: Vec<QueuedResponse>) -> (Arc<Pool>, Arc<Mutex<Vec<Vec<u8>>>>) {
    let config = PoolConfig::new("us-east-1_TESTPOOL1", "test-client-id").expect("valid test pool id");
    let sent = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = ScriptedDispatcher {
        queue: Mutex::new(responses),
        sent: sent.clone(),
    };
    let client = IdpClient::new(config.endpoint.clone(), Box::new(dispatcher));
    (Pool::new(config, client, Arc::new(MemoryStorage::new())), sent)
}
