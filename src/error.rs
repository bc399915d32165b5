/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Crate-level error type. Internal helpers return `Result<T, Error>` via
//! `?`; the only panics in this crate are the documented precondition
//! panics at `User` construction.

use std::string;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Thin wrapper over [`ErrorKind`], mirroring the `Error`/`ErrorKind` split
/// used elsewhere in this lineage so callers can match on `.kind()` without
/// depending on `Error`'s concrete representation.
#[derive(Debug)]
pub struct Error(pub ErrorKind);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.0)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unrecognized authentication flow type")]
    InvalidAuthenticationFlowType,

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("identity provider error [{kind}]: {message}")]
    IdpError { kind: String, message: String },

    #[error("SRP protocol invariant violated: {0}")]
    CryptoInvariant(&'static str),

    #[error("hex decode error: {0}")]
    HexDecodeError(#[from] hex::FromHexError),

    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("UTF8 decode error: {0}")]
    Utf8DecodeError(#[from] string::FromUtf8Error),

    #[error("malformed URL error: {0}")]
    MalformedUrl(#[from] url::ParseError),
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error(ErrorKind::from(e))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error(ErrorKind::from(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error(ErrorKind::from(e))
    }
}

impl From<string::FromUtf8Error> for Error {
    fn from(e: string::FromUtf8Error) -> Self {
        Error(ErrorKind::from(e))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error(ErrorKind::from(e))
    }
}
