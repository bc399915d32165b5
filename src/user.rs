/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! The authentication state machine. `User` drives the SRP exchange, the
//! challenge tree, device trust, and post-login account operations.

use crate::config::PoolConfig;
use crate::error::*;
use crate::pool::Pool;
use crate::session::Session;
use crate::srp::{self, Ephemeral};
use crate::token::{AccessToken, IdToken, RefreshToken};
use crate::token_cache;
use crate::util;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_derive::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthFlowType {
    UserSrpAuth,
    UserPasswordAuth,
    CustomAuth,
    RefreshTokenAuth,
    RefreshToken,
}

impl Default for AuthFlowType {
    fn default() -> Self {
        AuthFlowType::UserSrpAuth
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuthenticationDetails {
    pub username: Option<String>,
    pub password: Option<String>,
    pub validation_data: Option<Value>,
    pub client_metadata: Option<Value>,
}

/// The challenge-tree sum type returned by every authentication-driving
/// `User` method, in place of a callback record.
#[derive(Debug)]
pub enum AuthResult {
    MfaRequired(HashMap<String, String>),
    MfaSelection(HashMap<String, String>),
    MfaSetup(HashMap<String, String>),
    TotpRequired(HashMap<String, String>),
    CustomChallenge(HashMap<String, String>),
    NewPasswordRequired {
        user_attributes: HashMap<String, String>,
        required_attributes: Vec<String>,
    },
    Done {
        session: Session,
        user_confirmation_necessary: bool,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChallengeResponse {
    challenge_name: Option<String>,
    session: Option<String>,
    #[serde(default)]
    challenge_parameters: HashMap<String, String>,
    authentication_result: Option<AuthenticationResultDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResultDto {
    id_token: String,
    access_token: String,
    refresh_token: Option<String>,
    new_device_metadata: Option<NewDeviceMetadataDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NewDeviceMetadataDto {
    device_key: String,
    device_group_key: String,
}

pub struct User {
    pool: Arc<Pool>,
    username: String,
    pub auth_flow_type: AuthFlowType,
    session_token: Option<String>,
    sign_in_user_session: Option<Session>,
    device_key: Option<String>,
    device_group_key: Option<String>,
    random_password: Option<String>,
    device_name: Option<String>,
    challenge_name: Option<String>,
    challenge_parameters: HashMap<String, String>,
    ephemeral: Option<Ephemeral>,
}

impl User {
    pub(crate) fn new(pool: Arc<Pool>, username: String) -> Self {
        let cached_device = token_cache::get_device_credentials(pool.storage.as_ref(), pool.client_id(), &username);
        User {
            pool,
            username,
            auth_flow_type: AuthFlowType::UserSrpAuth,
            session_token: None,
            sign_in_user_session: None,
            device_key: cached_device.as_ref().map(|d| d.device_key.clone()),
            device_group_key: cached_device.as_ref().map(|d| d.device_group_key.clone()),
            random_password: cached_device.map(|d| d.random_password),
            device_name: None,
            challenge_name: None,
            challenge_parameters: HashMap::new(),
            ephemeral: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Override the `DeviceName` sent during device confirmation (4.3.d).
    /// Falls back to `"default-device"` when never set.
    pub fn set_device_name(&mut self, name: impl Into<String>) {
        self.device_name = Some(name.into());
    }

    pub fn session(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn challenge_name(&self) -> Option<&str> {
        self.challenge_name.as_deref()
    }

    pub fn challenge_parameters(&self) -> &HashMap<String, String> {
        &self.challenge_parameters
    }

    fn config(&self) -> &PoolConfig {
        &self.pool.config
    }

    fn secret_hash(&self, username: &str) -> Option<String> {
        self.config().client_secret.as_ref().map(|secret| {
            let mac = crate::crypto::hmac_sha256(
                secret.as_bytes(),
                format!("{}{}", username, self.config().client_id).as_bytes(),
            )
            .expect("non-empty HMAC key");
            STANDARD.encode(mac)
        })
    }

    // ---- 4.3 authenticate ----

    pub fn authenticate(&mut self, details: AuthenticationDetails) -> Result<AuthResult> {
        match self.auth_flow_type {
            AuthFlowType::UserPasswordAuth => self.authenticate_plain(details),
            AuthFlowType::UserSrpAuth | AuthFlowType::CustomAuth => self.authenticate_srp(details),
            AuthFlowType::RefreshTokenAuth | AuthFlowType::RefreshToken => {
                Err(ErrorKind::InvalidAuthenticationFlowType.into())
            }
        }
    }

    fn authenticate_plain(&mut self, details: AuthenticationDetails) -> Result<AuthResult> {
        let username = details.username.unwrap_or_else(|| self.username.clone());
        let password = details
            .password
            .ok_or_else(|| ErrorKind::InvalidParameter("password is required for USER_PASSWORD_AUTH".into()))?;

        let mut auth_parameters = json!({
            "USERNAME": username,
            "PASSWORD": password,
        });
        self.attach_device_key(&mut auth_parameters);
        self.attach_secret_hash(&mut auth_parameters, &username);

        let mut args = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.config().client_id,
            "AuthParameters": auth_parameters,
        });
        if let Some(metadata) = details.client_metadata {
            args["ClientMetadata"] = metadata;
        }

        let response = self.pool.client.invoke("InitiateAuth", args)?;
        self.route_challenge(response)
    }

    fn authenticate_srp(&mut self, details: AuthenticationDetails) -> Result<AuthResult> {
        let username = details.username.unwrap_or_else(|| self.username.clone());
        let password = details
            .password
            .ok_or_else(|| ErrorKind::InvalidParameter("password is required for SRP authentication".into()))?;

        let ephemeral = srp::generate_ephemeral();
        let a_hex = srp::public_value_hex(&ephemeral);

        let mut auth_parameters = json!({
            "USERNAME": username,
            "SRP_A": a_hex,
        });
        self.attach_device_key(&mut auth_parameters);
        self.attach_secret_hash(&mut auth_parameters, &username);

        let mut args = json!({
            "AuthFlow": if self.auth_flow_type == AuthFlowType::CustomAuth { "CUSTOM_AUTH" } else { "USER_SRP_AUTH" },
            "ClientId": self.config().client_id,
            "AuthParameters": auth_parameters,
        });
        if self.auth_flow_type == AuthFlowType::CustomAuth {
            args["AuthParameters"]["CHALLENGE_NAME"] = json!("SRP_A");
        }
        if let Some(metadata) = details.client_metadata.clone() {
            args["ClientMetadata"] = metadata;
        }

        self.ephemeral = Some(ephemeral);
        let response = self.pool.client.invoke("InitiateAuth", args)?;
        let parsed: ChallengeResponse = serde_json::from_value(response)?;

        if parsed.challenge_name.as_deref() == Some("PASSWORD_VERIFIER") {
            return self.respond_password_verifier(parsed, &username, &password);
        }
        self.route_parsed_challenge(parsed)
    }

    fn respond_password_verifier(
        &mut self,
        parsed: ChallengeResponse,
        username: &str,
        password: &str,
    ) -> Result<AuthResult> {
        let ephemeral = self
            .ephemeral
            .take()
            .ok_or_else(|| ErrorKind::CryptoInvariant("SRP ephemeral missing before PASSWORD_VERIFIER"))?;
        let params = &parsed.challenge_parameters;
        let user_id_for_srp = params
            .get("USER_ID_FOR_SRP")
            .ok_or_else(|| ErrorKind::InvalidParameter("missing USER_ID_FOR_SRP".into()))?;
        let srp_b = params
            .get("SRP_B")
            .ok_or_else(|| ErrorKind::InvalidParameter("missing SRP_B".into()))?;
        let salt = params
            .get("SALT")
            .ok_or_else(|| ErrorKind::InvalidParameter("missing SALT".into()))?;
        let secret_block = params
            .get("SECRET_BLOCK")
            .ok_or_else(|| ErrorKind::InvalidParameter("missing SECRET_BLOCK".into()))?;

        let key = srp::get_password_authentication_key(
            self.pool.pool_short_id(),
            user_id_for_srp,
            password,
            &ephemeral,
            srp_b,
            salt,
        )?;

        let timestamp = util::srp_timestamp_now();
        let secret_block_bytes = STANDARD.decode(secret_block)?;
        let mut mac_input = Vec::new();
        mac_input.extend_from_slice(self.pool.pool_short_id().as_bytes());
        mac_input.extend_from_slice(user_id_for_srp.as_bytes());
        mac_input.extend_from_slice(&secret_block_bytes);
        mac_input.extend_from_slice(timestamp.as_bytes());
        let signature = crate::crypto::hmac_sha256(&key.mac_key, &mac_input)?;

        self.username = user_id_for_srp.to_string();

        let mut challenge_responses = json!({
            "USERNAME": user_id_for_srp,
            "PASSWORD_CLAIM_SECRET_BLOCK": secret_block,
            "PASSWORD_CLAIM_SIGNATURE": STANDARD.encode(signature),
            "TIMESTAMP": timestamp,
        });
        self.attach_device_key(&mut challenge_responses);
        self.attach_secret_hash(&mut challenge_responses, username);

        let mut args = json!({
            "ChallengeName": "PASSWORD_VERIFIER",
            "ClientId": self.config().client_id,
            "ChallengeResponses": challenge_responses,
        });
        if let Some(session) = &parsed.session {
            args["Session"] = json!(session);
        }

        let response = self.pool.client.invoke("RespondToAuthChallenge", args)?;
        let parsed: ChallengeResponse = serde_json::from_value(response)?;
        self.route_parsed_challenge(parsed)
    }

    fn attach_device_key(&self, params: &mut Value) {
        if let Some(device_key) = &self.device_key {
            params["DEVICE_KEY"] = json!(device_key);
        }
    }

    fn attach_secret_hash(&self, params: &mut Value, username: &str) {
        if let Some(secret_hash) = self.secret_hash(username) {
            params["SECRET_HASH"] = json!(secret_hash);
        }
    }

    // ---- challenge router ----

    fn route_challenge(&mut self, response: Value) -> Result<AuthResult> {
        let parsed: ChallengeResponse = serde_json::from_value(response)?;
        self.route_parsed_challenge(parsed)
    }

    fn route_parsed_challenge(&mut self, parsed: ChallengeResponse) -> Result<AuthResult> {
        self.session_token = parsed.session.clone();
        self.challenge_name = parsed.challenge_name.clone();
        self.challenge_parameters = parsed.challenge_parameters.clone();
        log::debug!(
            "challenge router: {}",
            parsed.challenge_name.as_deref().unwrap_or("<terminal>")
        );

        match parsed.challenge_name.as_deref() {
            Some("SMS_MFA") => Ok(AuthResult::MfaRequired(parsed.challenge_parameters)),
            Some("SELECT_MFA_TYPE") => Ok(AuthResult::MfaSelection(parsed.challenge_parameters)),
            Some("MFA_SETUP") => Ok(AuthResult::MfaSetup(parsed.challenge_parameters)),
            Some("SOFTWARE_TOKEN_MFA") => Ok(AuthResult::TotpRequired(parsed.challenge_parameters)),
            Some("CUSTOM_CHALLENGE") => Ok(AuthResult::CustomChallenge(parsed.challenge_parameters)),
            Some("NEW_PASSWORD_REQUIRED") => {
                let mut user_attributes = HashMap::new();
                let mut required_attributes = Vec::new();
                if let Some(raw) = parsed.challenge_parameters.get("userAttributes") {
                    let parsed_attrs: HashMap<String, String> = serde_json::from_str(raw).unwrap_or_default();
                    user_attributes = parsed_attrs;
                }
                if let Some(raw) = parsed.challenge_parameters.get("requiredAttributes") {
                    let raw_attrs: Vec<String> = serde_json::from_str(raw).unwrap_or_default();
                    required_attributes = raw_attrs
                        .into_iter()
                        .map(|name| {
                            name.strip_prefix("userAttributes.")
                                .map(str::to_string)
                                .unwrap_or(name)
                        })
                        .collect();
                }
                Ok(AuthResult::NewPasswordRequired {
                    user_attributes,
                    required_attributes,
                })
            }
            Some("DEVICE_SRP_AUTH") => self.device_srp_auth(),
            None => self.finish_authentication(
                parsed
                    .authentication_result
                    .ok_or_else(|| ErrorKind::IdpError {
                        kind: "MissingAuthenticationResult".into(),
                        message: "no ChallengeName and no AuthenticationResult in response".into(),
                    })?,
            ),
            Some(other) => Err(ErrorKind::IdpError {
                kind: "UnknownChallenge".into(),
                message: format!("unrecognised challenge name: {}", other),
            }
            .into()),
        }
    }

    fn finish_authentication(&mut self, result: AuthenticationResultDto) -> Result<AuthResult> {
        let refresh_token = result
            .refresh_token
            .or_else(|| self.sign_in_user_session.as_ref().map(|s| s.refresh_token.as_str().to_string()))
            .ok_or_else(|| ErrorKind::IdpError {
                kind: "MissingRefreshToken".into(),
                message: "no refresh token in AuthenticationResult and none cached".into(),
            })?;

        let session = Session::new(
            IdToken::new(result.id_token),
            AccessToken::new(result.access_token),
            RefreshToken::new(refresh_token),
        )?;
        self.sign_in_user_session = Some(session.clone());
        token_cache::cache_tokens(self.pool.storage.as_ref(), self.pool.client_id(), &self.username, &session);

        if let Some(metadata) = result.new_device_metadata {
            let confirmation_necessary = self.confirm_device(metadata)?;
            return Ok(AuthResult::Done {
                session,
                user_confirmation_necessary: confirmation_necessary,
            });
        }

        Ok(AuthResult::Done {
            session,
            user_confirmation_necessary: false,
        })
    }

    // ---- 4.3.c device SRP ----

    fn device_srp_auth(&mut self) -> Result<AuthResult> {
        let device_key = self
            .device_key
            .clone()
            .ok_or_else(|| ErrorKind::CryptoInvariant("DEVICE_SRP_AUTH requested with no cached device"))?;
        let device_group_key = self
            .device_group_key
            .clone()
            .ok_or_else(|| ErrorKind::CryptoInvariant("DEVICE_SRP_AUTH requested with no cached device group key"))?;
        let random_password = self
            .random_password
            .clone()
            .ok_or_else(|| ErrorKind::CryptoInvariant("DEVICE_SRP_AUTH requested with no cached device password"))?;

        let ephemeral = srp::generate_ephemeral();
        let a_hex = srp::public_value_hex(&ephemeral);

        let mut args = json!({
            "ChallengeName": "DEVICE_SRP_AUTH",
            "ClientId": self.config().client_id,
            "ChallengeResponses": {
                "USERNAME": self.username,
                "DEVICE_KEY": device_key,
                "SRP_A": a_hex,
            },
        });
        if let Some(session) = &self.session_token {
            args["Session"] = json!(session);
        }

        let response = self.pool.client.invoke("RespondToAuthChallenge", args)?;
        let parsed: ChallengeResponse = serde_json::from_value(response)?;

        if parsed.challenge_name.as_deref() != Some("DEVICE_PASSWORD_VERIFIER") {
            self.ephemeral = None;
            return self.route_parsed_challenge(parsed);
        }

        let params = &parsed.challenge_parameters;
        let srp_b = params
            .get("SRP_B")
            .ok_or_else(|| ErrorKind::InvalidParameter("missing SRP_B for device verifier".into()))?;
        let salt = params
            .get("SALT")
            .ok_or_else(|| ErrorKind::InvalidParameter("missing SALT for device verifier".into()))?;

        let key = srp::get_password_authentication_key(
            self.pool.pool_short_id(),
            &device_group_key,
            &random_password,
            &ephemeral,
            srp_b,
            salt,
        )?;
        let timestamp = util::srp_timestamp_now();
        let mut mac_input = Vec::new();
        mac_input.extend_from_slice(device_group_key.as_bytes());
        mac_input.extend_from_slice(device_key.as_bytes());
        mac_input.extend_from_slice(timestamp.as_bytes());
        let signature = crate::crypto::hmac_sha256(&key.mac_key, &mac_input)?;

        let mut args = json!({
            "ChallengeName": "DEVICE_PASSWORD_VERIFIER",
            "ClientId": self.config().client_id,
            "ChallengeResponses": {
                "USERNAME": self.username,
                "DEVICE_KEY": device_key,
                "PASSWORD_CLAIM_SIGNATURE": STANDARD.encode(signature),
                "TIMESTAMP": timestamp,
            },
        });
        if let Some(session) = &parsed.session {
            args["Session"] = json!(session);
        }

        let response = self.pool.client.invoke("RespondToAuthChallenge", args)?;
        self.route_challenge(response)
    }

    // ---- 4.3.d device confirmation ----

    fn confirm_device(&mut self, metadata: NewDeviceMetadataDto) -> Result<bool> {
        let verifier = srp::generate_hash_device(&metadata.device_group_key, &metadata.device_key);
        let device_name = self.device_name.clone().unwrap_or_else(util::default_device_name);
        let args = json!({
            "AccessToken": self.require_session()?.access_token.as_str(),
            "DeviceKey": metadata.device_key,
            "DeviceName": device_name,
            "DeviceSecretVerifierConfig": {
                "Salt": verifier.salt_hex,
                "PasswordVerifier": verifier.verifier_hex,
            },
        });
        let response = self.pool.client.invoke("ConfirmDevice", args)?;

        self.device_key = Some(metadata.device_key.clone());
        self.device_group_key = Some(metadata.device_group_key.clone());
        self.random_password = Some(verifier.random_password.clone());
        token_cache::set_device_credentials(
            self.pool.storage.as_ref(),
            self.pool.client_id(),
            &self.username,
            &metadata.device_key,
            &metadata.device_group_key,
            &verifier.random_password,
        );

        Ok(response
            .get("UserConfirmationNecessary")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    // ---- 4.3 other entry points ----

    pub fn send_mfa_code(&mut self, code: &str, mfa_type: Option<&str>) -> Result<AuthResult> {
        let challenge_name = mfa_type.unwrap_or("SMS_MFA");
        let code_key = if challenge_name == "SOFTWARE_TOKEN_MFA" {
            "SOFTWARE_TOKEN_MFA_CODE"
        } else {
            "SMS_MFA_CODE"
        };
        let mut challenge_responses = json!({
            "USERNAME": self.username,
            code_key: code,
        });
        self.attach_secret_hash(&mut challenge_responses, &self.username.clone());

        let mut args = json!({
            "ChallengeName": challenge_name,
            "ClientId": self.config().client_id,
            "ChallengeResponses": challenge_responses,
        });
        if let Some(session) = &self.session_token {
            args["Session"] = json!(session);
        }

        let response = self.pool.client.invoke("RespondToAuthChallenge", args)?;
        self.route_challenge(response)
    }

    pub fn send_custom_challenge_answer(&mut self, answer: &str) -> Result<AuthResult> {
        let mut challenge_responses = json!({
            "USERNAME": self.username,
            "ANSWER": answer,
        });
        self.attach_secret_hash(&mut challenge_responses, &self.username.clone());

        let mut args = json!({
            "ChallengeName": "CUSTOM_CHALLENGE",
            "ClientId": self.config().client_id,
            "ChallengeResponses": challenge_responses,
        });
        if let Some(session) = &self.session_token {
            args["Session"] = json!(session);
        }

        let response = self.pool.client.invoke("RespondToAuthChallenge", args)?;
        self.route_challenge(response)
    }

    pub fn complete_new_password_challenge(
        &mut self,
        new_password: &str,
        required_attributes: HashMap<String, String>,
    ) -> Result<AuthResult> {
        let mut challenge_responses = json!({
            "USERNAME": self.username,
            "NEW_PASSWORD": new_password,
        });
        for (name, value) in required_attributes {
            challenge_responses[format!("userAttributes.{}", name)] = json!(value);
        }
        self.attach_device_key(&mut challenge_responses);
        self.attach_secret_hash(&mut challenge_responses, &self.username.clone());

        let mut args = json!({
            "ChallengeName": "NEW_PASSWORD_REQUIRED",
            "ClientId": self.config().client_id,
            "ChallengeResponses": challenge_responses,
        });
        if let Some(session) = &self.session_token {
            args["Session"] = json!(session);
        }

        let response = self.pool.client.invoke("RespondToAuthChallenge", args)?;
        self.route_challenge(response)
    }

    pub fn send_mfa_selection_answer(&mut self, mfa_type: &str) -> Result<AuthResult> {
        let mut challenge_responses = json!({
            "USERNAME": self.username,
            "ANSWER": mfa_type,
        });
        self.attach_secret_hash(&mut challenge_responses, &self.username.clone());

        let mut args = json!({
            "ChallengeName": "SELECT_MFA_TYPE",
            "ClientId": self.config().client_id,
            "ChallengeResponses": challenge_responses,
        });
        if let Some(session) = &self.session_token {
            args["Session"] = json!(session);
        }

        let response = self.pool.client.invoke("RespondToAuthChallenge", args)?;
        self.route_challenge(response)
    }

    // ---- 4.5 access-token gating ----

    pub fn get_session(&mut self) -> Result<Session> {
        if let Some(session) = &self.sign_in_user_session {
            if session.is_valid()? {
                return Ok(session.clone());
            }
        }

        if self.username.is_empty() {
            return Err(ErrorKind::NotAuthorized("Username is null. Cannot retrieve a new session".into()).into());
        }

        let cached = token_cache::load_cached_session(self.pool.storage.as_ref(), self.pool.client_id(), &self.username);
        match cached {
            Some(session) if session.is_valid()? => {
                self.sign_in_user_session = Some(session.clone());
                Ok(session)
            }
            Some(session) => self.refresh_session(session.refresh_token.as_str().to_string(), None),
            None => Err(ErrorKind::NotAuthorized("User is not authenticated".into()).into()),
        }
    }

    pub fn refresh_session(&mut self, refresh_token: String, client_metadata: Option<Value>) -> Result<Session> {
        let mut auth_parameters = json!({
            "REFRESH_TOKEN": refresh_token,
        });
        self.attach_secret_hash(&mut auth_parameters, &self.username.clone());

        let mut args = json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "ClientId": self.config().client_id,
            "AuthParameters": auth_parameters,
        });
        if let Some(metadata) = client_metadata {
            args["ClientMetadata"] = metadata;
        }

        let response = self.pool.client.invoke("InitiateAuth", args)?;
        let parsed: ChallengeResponse = serde_json::from_value(response)?;
        let mut result = parsed
            .authentication_result
            .ok_or_else(|| ErrorKind::IdpError {
                kind: "MissingAuthenticationResult".into(),
                message: "refresh did not return an AuthenticationResult".into(),
            })?;
        if result.refresh_token.is_none() {
            result.refresh_token = Some(refresh_token);
        }

        let session = Session::new(
            IdToken::new(result.id_token),
            AccessToken::new(result.access_token),
            RefreshToken::new(result.refresh_token.expect("filled in above")),
        )?;
        self.sign_in_user_session = Some(session.clone());
        token_cache::cache_tokens(self.pool.storage.as_ref(), self.pool.client_id(), &self.username, &session);
        Ok(session)
    }

    fn require_session(&mut self) -> Result<Session> {
        self.get_session()
    }

    // ---- 4.7 sign-out ----

    pub fn sign_out(&mut self) {
        self.sign_in_user_session = None;
        token_cache::clear_cached_session(self.pool.storage.as_ref(), self.pool.client_id(), &self.username);
    }

    pub fn global_sign_out(&mut self) -> Result<()> {
        let session = self.get_session()?;
        self.pool.client.invoke(
            "GlobalSignOut",
            json!({ "AccessToken": session.access_token.as_str() }),
        )?;
        self.sign_out();
        Ok(())
    }

    // ---- single-shot authenticated account operations ----

    fn invoke_authenticated(&mut self, action: &str, mut args: Value) -> Result<Value> {
        let session = self.get_session()?;
        args["AccessToken"] = json!(session.access_token.as_str());
        self.pool.client.invoke(action, args)
    }

    pub fn change_password(&mut self, previous_password: &str, proposed_password: &str) -> Result<()> {
        self.invoke_authenticated(
            "ChangePassword",
            json!({
                "PreviousPassword": previous_password,
                "ProposedPassword": proposed_password,
            }),
        )?;
        Ok(())
    }

    pub fn forgot_password(&mut self) -> Result<()> {
        let mut args = json!({
            "ClientId": self.config().client_id,
            "Username": self.username,
        });
        self.attach_secret_hash(&mut args, &self.username.clone());
        self.pool.client.invoke("ForgotPassword", args)?;
        Ok(())
    }

    pub fn confirm_password(&mut self, code: &str, new_password: &str) -> Result<()> {
        let mut args = json!({
            "ClientId": self.config().client_id,
            "Username": self.username,
            "ConfirmationCode": code,
            "Password": new_password,
        });
        self.attach_secret_hash(&mut args, &self.username.clone());
        self.pool.client.invoke("ConfirmForgotPassword", args)?;
        Ok(())
    }

    pub fn get_user_attributes(&mut self) -> Result<HashMap<String, String>> {
        let response = self.invoke_authenticated("GetUser", json!({}))?;
        let mut attributes = HashMap::new();
        if let Some(list) = response.get("UserAttributes").and_then(Value::as_array) {
            for entry in list {
                if let (Some(name), Some(value)) = (
                    entry.get("Name").and_then(Value::as_str),
                    entry.get("Value").and_then(Value::as_str),
                ) {
                    attributes.insert(name.to_string(), value.to_string());
                }
            }
        }
        Ok(attributes)
    }

    pub fn update_attributes(&mut self, attributes: HashMap<String, String>) -> Result<()> {
        let user_attributes: Vec<Value> = attributes
            .into_iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value }))
            .collect();
        self.invoke_authenticated("UpdateUserAttributes", json!({ "UserAttributes": user_attributes }))?;
        Ok(())
    }

    pub fn delete_attributes(&mut self, attribute_names: Vec<String>) -> Result<()> {
        self.invoke_authenticated(
            "DeleteUserAttributes",
            json!({ "UserAttributeNames": attribute_names }),
        )?;
        Ok(())
    }

    pub fn get_attribute_verification_code(&mut self, attribute_name: &str) -> Result<()> {
        self.invoke_authenticated(
            "GetUserAttributeVerificationCode",
            json!({ "AttributeName": attribute_name }),
        )?;
        Ok(())
    }

    pub fn verify_attribute(&mut self, attribute_name: &str, code: &str) -> Result<()> {
        self.invoke_authenticated(
            "VerifyUserAttribute",
            json!({ "AttributeName": attribute_name, "Code": code }),
        )?;
        Ok(())
    }

    pub fn get_mfa_options(&mut self) -> Result<Value> {
        self.invoke_authenticated("GetUser", json!({}))
    }

    pub fn set_user_mfa_preference(&mut self, sms_enabled: bool, totp_enabled: bool) -> Result<()> {
        self.invoke_authenticated(
            "SetUserMFAPreference",
            json!({
                "SMSMfaSettings": { "Enabled": sms_enabled, "PreferredMfa": sms_enabled },
                "SoftwareTokenMfaSettings": { "Enabled": totp_enabled, "PreferredMfa": totp_enabled },
            }),
        )?;
        Ok(())
    }

    pub fn enable_mfa(&mut self) -> Result<()> {
        self.set_user_mfa_preference(true, false)
    }

    pub fn disable_mfa(&mut self) -> Result<()> {
        self.set_user_mfa_preference(false, false)
    }

    pub fn associate_software_token(&mut self) -> Result<String> {
        let response = if self.sign_in_user_session.is_some() {
            self.invoke_authenticated("AssociateSoftwareToken", json!({}))?
        } else {
            let mut args = json!({});
            if let Some(session) = &self.session_token {
                args["Session"] = json!(session);
            }
            self.pool.client.invoke("AssociateSoftwareToken", args)?
        };
        Ok(response["SecretCode"].as_str().unwrap_or_default().to_string())
    }

    pub fn verify_software_token(&mut self, code: &str, friendly_name: &str) -> Result<AuthResult> {
        let mut args = json!({
            "UserCode": code,
            "FriendlyDeviceName": friendly_name,
        });
        let signed_in = self.sign_in_user_session.is_some();
        if signed_in {
            let session = self.get_session()?;
            args["AccessToken"] = json!(session.access_token.as_str());
        } else if let Some(session) = &self.session_token {
            args["Session"] = json!(session);
        }

        self.pool.client.invoke("VerifySoftwareToken", args)?;

        if signed_in {
            return self.get_session().map(|session| AuthResult::Done {
                session,
                user_confirmation_necessary: false,
            });
        }

        let mut challenge_responses = json!({ "USERNAME": self.username });
        self.attach_secret_hash(&mut challenge_responses, &self.username.clone());
        let mut args = json!({
            "ChallengeName": "MFA_SETUP",
            "ClientId": self.config().client_id,
            "ChallengeResponses": challenge_responses,
        });
        if let Some(session) = &self.session_token {
            args["Session"] = json!(session);
        }
        let response = self.pool.client.invoke("RespondToAuthChallenge", args)?;
        self.route_challenge(response)
    }

    pub fn delete_user(&mut self) -> Result<()> {
        self.invoke_authenticated("DeleteUser", json!({}))?;
        self.sign_out();
        Ok(())
    }

    pub fn list_devices(&mut self) -> Result<Value> {
        self.invoke_authenticated("ListDevices", json!({}))
    }

    pub fn get_device(&mut self, device_key: &str) -> Result<Value> {
        self.invoke_authenticated("GetDevice", json!({ "DeviceKey": device_key }))
    }

    pub fn forget_device(&mut self) -> Result<()> {
        let device_key = self
            .device_key
            .clone()
            .ok_or_else(|| ErrorKind::InvalidParameter("no remembered device to forget".into()))?;
        self.forget_specific_device(&device_key)
    }

    pub fn forget_specific_device(&mut self, device_key: &str) -> Result<()> {
        self.invoke_authenticated("ForgetDevice", json!({ "DeviceKey": device_key }))?;
        if self.device_key.as_deref() == Some(device_key) {
            self.device_key = None;
            self.device_group_key = None;
            self.random_password = None;
        }
        Ok(())
    }

    fn set_device_status(&mut self, device_key: &str, remembered: bool) -> Result<()> {
        let status = if remembered { "remembered" } else { "not_remembered" };
        self.invoke_authenticated(
            "UpdateDeviceStatus",
            json!({ "DeviceKey": device_key, "DeviceRememberedStatus": status }),
        )?;
        Ok(())
    }

    pub fn set_device_status_remembered(&mut self, device_key: &str) -> Result<()> {
        self.set_device_status(device_key, true)
    }

    pub fn set_device_status_not_remembered(&mut self, device_key: &str) -> Result<()> {
        self.set_device_status(device_key, false)
    }

    pub fn resend_confirmation_code(&mut self) -> Result<()> {
        self.pool.resend_confirmation_code(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_pool, test_pool_capturing, QueuedResponse};

    fn s1_panics_on_empty_username() {
        let pool = test_pool(vec![]);
        pool.user("");
    }

    #[test]
    fn s1_bad_construction_panics() {
        assert!(std::panic::catch_unwind(s1_panics_on_empty_username).is_err());
    }

    #[test]
    fn s2_invalid_flow_returns_invalid_flow_error() {
        let pool = test_pool(vec![]);
        let mut user = pool.user("alice");
        user.auth_flow_type = AuthFlowType::RefreshToken;
        let err = user.authenticate(AuthenticationDetails::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidAuthenticationFlowType));
    }

    #[test]
    fn s4_custom_challenge_carries_through() {
        let pool = test_pool(vec![QueuedResponse::ok(json!({
            "ChallengeName": "CUSTOM_CHALLENGE",
            "Session": "s",
            "ChallengeParameters": {"p": "v"},
        }))]);
        let mut user = pool.user("alice");
        user.auth_flow_type = AuthFlowType::CustomAuth;
        let result = user
            .authenticate(AuthenticationDetails {
                username: Some("alice".into()),
                password: Some("hunter2".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(matches!(result, AuthResult::CustomChallenge(_)));
        assert_eq!(user.session(), Some("s"));
    }

    #[test]
    fn s5_global_sign_out_with_no_session_is_not_authorized() {
        let pool = test_pool(vec![]);
        let mut user = pool.user("alice");
        let err = user.global_sign_out().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotAuthorized(_)));
    }

    #[test]
    fn new_password_required_strips_user_attributes_prefix_from_required_attributes() {
        let pool = test_pool(vec![QueuedResponse::ok(json!({
            "ChallengeName": "NEW_PASSWORD_REQUIRED",
            "Session": "s",
            "ChallengeParameters": {
                "userAttributes": "{\"email\":\"a@example.test\"}",
                "requiredAttributes": "[\"userAttributes.given_name\",\"userAttributes.family_name\"]",
            },
        }))]);
        let mut user = pool.user("alice");
        let result = user
            .authenticate(AuthenticationDetails {
                username: Some("alice".into()),
                password: Some("hunter2".into()),
                ..Default::default()
            })
            .unwrap();
        match result {
            AuthResult::NewPasswordRequired {
                required_attributes, ..
            } => {
                assert_eq!(required_attributes, vec!["given_name", "family_name"]);
            }
            other => panic!("expected NewPasswordRequired, got {:?}", other),
        }
    }

    fn make_jwt(exp: i64, iat: i64) -> String {
        make_jwt_with_username(exp, iat, "alice")
    }

    fn make_jwt_with_username(exp: i64, iat: i64, username: &str) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"exp":{},"iat":{},"sub":"user-1","username":"{}"}}"#,
            exp, iat, username
        ));
        format!("{}.{}.", header, payload)
    }

    #[test]
    fn terminal_success_on_a_non_srp_flow_never_rewrites_username() {
        // Invariant 1: only the PASSWORD_VERIFIER alias-resolution step may
        // rewrite the local username. A plain USER_PASSWORD_AUTH login whose
        // IdToken happens to carry a different `username` claim must not
        // rename the local user.
        let now = util::now_secs();
        let id_jwt = make_jwt_with_username(now + 3600, now, "server-side-alias");
        let access_jwt = make_jwt(now + 3600, now);
        let pool = test_pool(vec![QueuedResponse::ok(json!({
            "AuthenticationResult": {
                "IdToken": id_jwt,
                "AccessToken": access_jwt,
                "RefreshToken": "refresh-token",
            },
        }))]);
        let mut user = pool.user("alice");
        user.auth_flow_type = AuthFlowType::UserPasswordAuth;
        let result = user
            .authenticate(AuthenticationDetails {
                username: Some("alice".into()),
                password: Some("hunter2".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(matches!(result, AuthResult::Done { .. }));
        assert_eq!(user.username(), "alice");
    }

    #[test]
    fn confirm_device_uses_the_overridden_device_name_when_set() {
        let now = util::now_secs();
        let id_jwt = make_jwt(now + 3600, now);
        let access_jwt = make_jwt(now + 3600, now);
        let (pool, sent) = test_pool_capturing(vec![
            QueuedResponse::ok(json!({
                "ChallengeName": "PASSWORD_VERIFIER",
                "Session": "srp-session",
                "ChallengeParameters": {
                    "USER_ID_FOR_SRP": "alice",
                    "SRP_B": "02",
                    "SALT": "00",
                    "SECRET_BLOCK": STANDARD.encode("block"),
                },
            })),
            QueuedResponse::ok(json!({
                "AuthenticationResult": {
                    "IdToken": id_jwt,
                    "AccessToken": access_jwt,
                    "RefreshToken": "refresh-token",
                    "NewDeviceMetadata": {
                        "DeviceKey": "device-1",
                        "DeviceGroupKey": "group-1",
                    },
                },
            })),
            QueuedResponse::ok(json!({ "UserConfirmationNecessary": false })),
        ]);
        let mut user = pool.user("alice");
        user.auth_flow_type = AuthFlowType::UserSrpAuth;
        user.set_device_name("my-laptop");
        let result = user
            .authenticate(AuthenticationDetails {
                username: Some("alice".into()),
                password: Some("hunter2".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(matches!(result, AuthResult::Done { .. }));

        let confirm_device_request: Value = serde_json::from_slice(&sent.lock()[2]).unwrap();
        assert_eq!(confirm_device_request["DeviceName"], "my-laptop");
    }

    #[test]
    fn s3_srp_happy_path_yields_a_valid_session() {
        let now = util::now_secs();
        let id_jwt = make_jwt(now + 3600, now);
        let access_jwt = make_jwt(now + 3600, now);
        let pool = test_pool(vec![
            QueuedResponse::ok(json!({
                "ChallengeName": "PASSWORD_VERIFIER",
                "Session": "srp-session",
                "ChallengeParameters": {
                    "USER_ID_FOR_SRP": "alice",
                    "SRP_B": "02",
                    "SALT": "00",
                    "SECRET_BLOCK": STANDARD.encode("block"),
                },
            })),
            QueuedResponse::ok(json!({
                "AuthenticationResult": {
                    "IdToken": id_jwt,
                    "AccessToken": access_jwt,
                    "RefreshToken": "refresh-token",
                },
            })),
        ]);
        let mut user = pool.user("alice");
        user.auth_flow_type = AuthFlowType::UserSrpAuth;
        let result = user
            .authenticate(AuthenticationDetails {
                username: Some("alice".into()),
                password: Some("hunter2".into()),
                ..Default::default()
            })
            .unwrap();
        match result {
            AuthResult::Done {
                session,
                user_confirmation_necessary,
            } => {
                assert!(session.is_valid().unwrap());
                assert!(!user_confirmation_necessary);
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[test]
    fn s6_refresh_session_preserves_existing_refresh_token_when_server_omits_it() {
        let now = util::now_secs();
        let id_jwt = make_jwt(now + 3600, now);
        let access_jwt = make_jwt(now + 3600, now);
        let pool = test_pool(vec![QueuedResponse::ok(json!({
            "AuthenticationResult": {
                "IdToken": id_jwt,
                "AccessToken": access_jwt,
                "RefreshToken": Value::Null,
            },
        }))]);
        let mut user = pool.user("alice");
        let session = user.refresh_session("original-refresh-token".into(), None).unwrap();
        assert_eq!(session.refresh_token.as_str(), "original-refresh-token");
    }

    #[test]
    fn s7_get_session_returns_cached_valid_session_without_a_network_call() {
        let now = util::now_secs();
        let id_jwt = make_jwt(now + 3600, now);
        let access_jwt = make_jwt(now + 3600, now);
        // No queued responses: any network call made by get_session would fail the test.
        let pool = test_pool(vec![]);
        let session = Session::new(
            IdToken::new(id_jwt),
            AccessToken::new(access_jwt.clone()),
            RefreshToken::new("refresh".into()),
        )
        .unwrap();
        token_cache::cache_tokens(pool.storage.as_ref(), pool.client_id(), "alice", &session);

        let mut user = pool.user("alice");
        let fetched = user.get_session().unwrap();
        assert_eq!(fetched.access_token.as_str(), access_jwt);
    }
}
