/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The user pool: holds configuration, the IdP dispatcher and storage, and
//! is the entry point for sign-up and `User` construction.

use crate::config::PoolConfig;
use crate::error::*;
use crate::idp_client::IdpClient;
use crate::storage::{MemoryStorage, Storage};
use crate::token_cache;
use crate::user::User;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct Pool {
    pub(crate) config: PoolConfig,
    pub(crate) client: IdpClient,
    pub(crate) storage: Arc<dyn Storage>,
}

pub struct SignUpResult {
    pub user: User,
    pub user_confirmed: bool,
    pub user_sub: String,
}

impl Pool {
    pub fn new(config: PoolConfig, client: IdpClient, storage: Arc<dyn Storage>) -> Arc<Self> {
        Arc::new(Pool {
            config,
            client,
            storage,
        })
    }

    /// Convenience constructor using the in-memory storage fallback; real
    /// applications should supply their own [`Storage`] implementation.
    pub fn with_memory_storage(config: PoolConfig, client: IdpClient) -> Arc<Self> {
        Self::new(config, client, Arc::new(MemoryStorage::new()))
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    pub fn pool_short_id(&self) -> &str {
        self.config
            .pool_id
            .split_once('_')
            .map(|(_, short_id)| short_id)
            .unwrap_or(&self.config.pool_id)
    }

    pub fn last_auth_user(&self) -> Option<String> {
        token_cache::last_auth_user(self.storage.as_ref(), self.client_id())
    }

    /// Construct a `User` bound to this pool. Panics if `username` is
    /// empty -- this is the one documented construction-time panic in the
    /// crate.
    pub fn user(self: &Arc<Self>, username: impl Into<String>) -> User {
        let username = username.into();
        assert!(
            !username.is_empty(),
            "username is required to construct a User (pool is always required by construction)"
        );
        User::new(self.clone(), username)
    }

    fn secret_hash(&self, username: &str) -> Option<String> {
        self.config.client_secret.as_ref().map(|secret| {
            let mac = crate::crypto::hmac_sha256(
                secret.as_bytes(),
                format!("{}{}", username, self.config.client_id).as_bytes(),
            )
            .expect("HMAC key is never empty when a client secret is configured");
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, mac)
        })
    }

    pub fn sign_up(
        self: &Arc<Self>,
        username: &str,
        password: &str,
        user_attributes: Value,
        validation_data: Option<Value>,
    ) -> Result<SignUpResult> {
        let mut args = json!({
            "ClientId": self.config.client_id,
            "Username": username,
            "Password": password,
            "UserAttributes": user_attributes,
        });
        if let Some(secret_hash) = self.secret_hash(username) {
            args["SecretHash"] = json!(secret_hash);
        }
        if let Some(validation_data) = validation_data {
            args["ValidationData"] = validation_data;
        }
        let response = self.client.invoke("SignUp", args)?;
        Ok(SignUpResult {
            user: self.user(username),
            user_confirmed: response["UserConfirmed"].as_bool().unwrap_or(false),
            user_sub: response["UserSub"].as_str().unwrap_or_default().to_string(),
        })
    }

    pub fn confirm_registration(&self, username: &str, code: &str, force_alias_creation: bool) -> Result<()> {
        let mut args = json!({
            "ClientId": self.config.client_id,
            "Username": username,
            "ConfirmationCode": code,
            "ForceAliasCreation": force_alias_creation,
        });
        if let Some(secret_hash) = self.secret_hash(username) {
            args["SecretHash"] = json!(secret_hash);
        }
        self.client.invoke("ConfirmSignUp", args)?;
        Ok(())
    }

    pub fn resend_confirmation_code(&self, username: &str) -> Result<()> {
        let mut args = json!({
            "ClientId": self.config.client_id,
            "Username": username,
        });
        if let Some(secret_hash) = self.secret_hash(username) {
            args["SecretHash"] = json!(secret_hash);
        }
        self.client.invoke("ResendConfirmationCode", args)?;
        Ok(())
    }
}
