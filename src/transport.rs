/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The injectable HTTP transport boundary. Applications that don't want to
//! bring their own HTTP stack can enable the `reqwest-backend` feature for
//! a default blocking implementation; everything else in this crate talks
//! only to the [`Dispatcher`] trait.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn post_json(url: impl Into<String>, target: &str, body: Vec<u8>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("X-Idp-Target".to_string(), target.to_string());
        Request {
            url: url.into(),
            headers,
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport error: {0}")]
    Other(String),
}

pub trait Dispatcher: Send + Sync {
    fn send(&self, request: Request) -> Result<Response, TransportError>;
}

#[cfg(feature = "reqwest-backend")]
pub struct ReqwestDispatcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "reqwest-backend")]
impl Default for ReqwestDispatcher {
    fn default() -> Self {
        ReqwestDispatcher {
            client: reqwest::blocking::Client::new(),
        }
    }
}

#[cfg(feature = "reqwest-backend")]
impl Dispatcher for ReqwestDispatcher {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        let mut builder = self.client.post(&request.url).body(request.body);
        for (k, v) in &request.headers {
            builder = builder.header(k, v);
        }
        let resp = builder
            .send()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| TransportError::Other(e.to_string()))?
            .to_vec();
        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoDispatcher;
    impl Dispatcher for EchoDispatcher {
        fn send(&self, request: Request) -> Result<Response, TransportError> {
            Ok(Response {
                status: 200,
                body: request.body,
            })
        }
    }

    #[test]
    fn post_json_sets_target_header() {
        let req = Request::post_json("https://example.test/", "InitiateAuth", b"{}".to_vec());
        assert_eq!(req.headers.get("X-Idp-Target").unwrap(), "InitiateAuth");
    }

    #[test]
    fn response_is_success_checks_status_range() {
        let ok = Response {
            status: 200,
            body: vec![],
        };
        let err = Response {
            status: 400,
            body: vec![],
        };
        assert!(ok.is_success());
        assert!(!err.is_success());
    }

    #[test]
    fn echo_dispatcher_round_trips_body() {
        let dispatcher = EchoDispatcher;
        let req = Request::post_json("https://example.test/", "GetUser", b"hello".to_vec());
        let resp = dispatcher.send(req).unwrap();
        assert_eq!(resp.body, b"hello");
    }
}
