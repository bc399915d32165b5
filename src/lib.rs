/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

#![allow(unknown_lints)]
#![warn(rust_2018_idioms)]

//! Client-side identity library: authenticates end-users against a hosted
//! identity provider over an SRP-6a exchange, drives the full MFA/device
//! challenge tree, and maintains a locally-persisted, auto-refreshing
//! session.
//!
//! Applications construct a [`PoolConfig`], wrap it (together with an
//! [`idp_client::IdpClient`] and a [`Storage`] implementation) into a
//! [`Pool`], obtain a [`User`] from it, and drive [`User::authenticate`]
//! through whatever [`AuthResult`] it returns until it reaches
//! [`AuthResult::Done`].

pub mod config;
mod crypto;
pub mod error;
pub mod idp_client;
pub mod pool;
pub mod session;
pub mod srp;
pub mod storage;
#[cfg(test)]
pub(crate) mod testing;
pub mod token;
mod token_cache;
pub mod transport;
mod user;
mod util;

pub use config::PoolConfig;
pub use error::{Error, ErrorKind, Result};
pub use idp_client::IdpClient;
pub use pool::{Pool, SignUpResult};
pub use session::Session;
pub use storage::{MemoryStorage, Storage};
pub use token::{AccessToken, IdToken, RefreshToken};
pub use transport::{Dispatcher, Request, Response, TransportError};
pub use user::{AuthFlowType, AuthResult, AuthenticationDetails, User};
