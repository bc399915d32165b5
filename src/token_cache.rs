/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Persisted token cache: reads and writes the namespaced keys documented
//! in the external interface section -- `IdentityServiceProvider.<clientId>.*`.

use crate::session::Session;
use crate::storage::Storage;
use crate::token::{AccessToken, IdToken, RefreshToken};

const PREFIX: &str = "IdentityServiceProvider";

fn user_key(client_id: &str, username: &str, field: &str) -> String {
    format!("{}.{}.{}.{}", PREFIX, client_id, username, field)
}

fn last_auth_user_key(client_id: &str) -> String {
    format!("{}.{}.LastAuthUser", PREFIX, client_id)
}

pub fn cache_tokens(storage: &dyn Storage, client_id: &str, username: &str, session: &Session) {
    storage.set_item(&user_key(client_id, username, "idToken"), session.id_token.as_str().to_string());
    storage.set_item(
        &user_key(client_id, username, "accessToken"),
        session.access_token.as_str().to_string(),
    );
    storage.set_item(
        &user_key(client_id, username, "refreshToken"),
        session.refresh_token.as_str().to_string(),
    );
    storage.set_item(
        &user_key(client_id, username, "clockDrift"),
        session.clock_drift.to_string(),
    );
    storage.set_item(&last_auth_user_key(client_id), username.to_string());
}

pub fn load_cached_session(storage: &dyn Storage, client_id: &str, username: &str) -> Option<Session> {
    let id_token = storage.get_item(&user_key(client_id, username, "idToken"))?;
    let access_token = storage.get_item(&user_key(client_id, username, "accessToken"))?;
    let refresh_token = storage.get_item(&user_key(client_id, username, "refreshToken"))?;
    let clock_drift: i64 = storage
        .get_item(&user_key(client_id, username, "clockDrift"))?
        .parse()
        .ok()?;
    Some(Session {
        id_token: IdToken::new(id_token),
        access_token: AccessToken::new(access_token),
        refresh_token: RefreshToken::new(refresh_token),
        clock_drift,
    })
}

pub fn clear_cached_session(storage: &dyn Storage, client_id: &str, username: &str) {
    storage.remove_item(&user_key(client_id, username, "idToken"));
    storage.remove_item(&user_key(client_id, username, "accessToken"));
    storage.remove_item(&user_key(client_id, username, "refreshToken"));
    storage.remove_item(&user_key(client_id, username, "clockDrift"));
    storage.remove_item(&last_auth_user_key(client_id));
}

pub fn set_device_credentials(
    storage: &dyn Storage,
    client_id: &str,
    username: &str,
    device_key: &str,
    device_group_key: &str,
    random_password: &str,
) {
    storage.set_item(&user_key(client_id, username, "deviceKey"), device_key.to_string());
    storage.set_item(
        &user_key(client_id, username, "deviceGroupKey"),
        device_group_key.to_string(),
    );
    storage.set_item(
        &user_key(client_id, username, "randomPasswordKey"),
        random_password.to_string(),
    );
}

pub struct DeviceCredentials {
    pub device_key: String,
    pub device_group_key: String,
    pub random_password: String,
}

pub fn get_device_credentials(storage: &dyn Storage, client_id: &str, username: &str) -> Option<DeviceCredentials> {
    Some(DeviceCredentials {
        device_key: storage.get_item(&user_key(client_id, username, "deviceKey"))?,
        device_group_key: storage.get_item(&user_key(client_id, username, "deviceGroupKey"))?,
        random_password: storage.get_item(&user_key(client_id, username, "randomPasswordKey"))?,
    })
}

pub fn last_auth_user(storage: &dyn Storage, client_id: &str) -> Option<String> {
    storage.get_item(&last_auth_user_key(client_id))
}
