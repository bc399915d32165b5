/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The user session: id/access/refresh tokens plus clock-drift-aware
//! validity.

use crate::error::*;
use crate::token::{AccessToken, IdToken, RefreshToken};
use crate::util::now_secs;
use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id_token: IdToken,
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    /// localNow - iat(idToken), captured at issuance.
    pub clock_drift: i64,
}

impl Session {
    pub fn new(id_token: IdToken, access_token: AccessToken, refresh_token: RefreshToken) -> Result<Self> {
        let iat = id_token.issued_at()?;
        let clock_drift = now_secs() - iat;
        Ok(Session {
            id_token,
            access_token,
            refresh_token,
            clock_drift,
        })
    }

    /// min(idExp, accessExp) > currentTime - clockDrift
    pub fn is_valid(&self) -> Result<bool> {
        let id_exp = self.id_token.expires_at()?;
        let access_exp = self.access_token.expires_at()?;
        let threshold = now_secs() - self.clock_drift;
        Ok(id_exp.min(access_exp) > threshold)
    }

    pub fn username(&self) -> Result<Option<String>> {
        Ok(self.id_token.payload()?.username)
    }
}
