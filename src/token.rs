/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Token value objects: JWT-backed id/access tokens and an opaque refresh
//! token.

use crate::error::*;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn decode_jwt_payload(jwt: &str) -> Result<Value> {
    let mut parts = jwt.split('.');
    let _header = parts.next();
    let payload = parts
        .next()
        .ok_or_else(|| ErrorKind::InvalidParameter("malformed JWT: missing payload segment".into()))?;
    let decoded = URL_SAFE_NO_PAD.decode(payload)?;
    Ok(serde_json::from_slice(&decoded)?)
}

/// A decoded JWT's exp/iat/sub/username fields, plus the raw claim map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwtPayload {
    pub exp: i64,
    pub iat: i64,
    pub sub: Option<String>,
    pub username: Option<String>,
    #[serde(default)]
    pub claims: HashMap<String, Value>,
}

impl JwtPayload {
    fn from_jwt(jwt: &str) -> Result<Self> {
        let value = decode_jwt_payload(jwt)?;
        let obj = value
            .as_object()
            .ok_or_else(|| ErrorKind::InvalidParameter("JWT payload is not a JSON object".into()))?;
        let get_i64 = |name: &str| -> Result<i64> {
            obj.get(name)
                .and_then(Value::as_i64)
                .ok_or_else(|| ErrorKind::InvalidParameter(format!("JWT payload missing `{}`", name)).into())
        };
        Ok(JwtPayload {
            exp: get_i64("exp")?,
            iat: get_i64("iat")?,
            sub: obj.get("sub").and_then(Value::as_str).map(str::to_owned),
            username: obj
                .get("username")
                .or_else(|| obj.get("preferred_username"))
                .and_then(Value::as_str)
                .map(str::to_owned),
            claims: obj.clone().into_iter().collect(),
        })
    }
}

macro_rules! jwt_token {
    ($name:ident) => {
        #[derive(Clone, Debug, Serialize, Deserialize)]
        pub struct $name {
            pub jwt: String,
        }

        impl $name {
            pub fn new(jwt: String) -> Self {
                Self { jwt }
            }

            pub fn payload(&self) -> Result<JwtPayload> {
                JwtPayload::from_jwt(&self.jwt)
            }

            pub fn expires_at(&self) -> Result<i64> {
                Ok(self.payload()?.exp)
            }

            pub fn issued_at(&self) -> Result<i64> {
                Ok(self.payload()?.iat)
            }

            pub fn as_str(&self) -> &str {
                &self.jwt
            }
        }
    };
}

jwt_token!(IdToken);
jwt_token!(AccessToken);

/// Opaque refresh token; the server never expects the client to parse it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token: String,
}

impl RefreshToken {
    pub fn new(token: String) -> Self {
        Self { token }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_jwt(exp: i64, iat: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"exp":{},"iat":{},"sub":"user-1","username":"alice"}}"#,
            exp, iat
        ));
        format!("{}.{}.", header, payload)
    }

    #[test]
    fn decodes_exp_iat_sub_username() {
        let token = IdToken::new(make_jwt(200, 100));
        let payload = token.payload().unwrap();
        assert_eq!(payload.exp, 200);
        assert_eq!(payload.iat, 100);
        assert_eq!(payload.sub.as_deref(), Some("user-1"));
        assert_eq!(payload.username.as_deref(), Some("alice"));
    }

    #[test]
    fn malformed_jwt_is_an_error_not_a_panic() {
        let token = IdToken::new("not-a-jwt".to_string());
        assert!(token.payload().is_err());
    }
}
