/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Pool configuration: parses and validates a `region_poolShortId` pool id
//! and derives the default IdP endpoint.

use crate::error::*;

#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub pool_id: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub endpoint: String,
    region: String,
}

impl PoolConfig {
    pub fn new(pool_id: &str, client_id: &str) -> Result<Self> {
        let region = region_from_pool_id(pool_id)?;
        let endpoint = default_endpoint(&region);
        Ok(PoolConfig {
            pool_id: pool_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: None,
            endpoint,
            region,
        })
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_endpoint_override(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

fn region_from_pool_id(pool_id: &str) -> Result<String> {
    match pool_id.split_once('_') {
        Some((region, short_id)) if !region.is_empty() && !short_id.is_empty() => Ok(region.to_string()),
        _ => Err(ErrorKind::InvalidParameter(format!(
            "pool id `{}` is not of the form region_poolShortId",
            pool_id
        ))
        .into()),
    }
}

fn default_endpoint(region: &str) -> String {
    format!("https://idp.{}.example/", region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_region_from_well_formed_pool_id() {
        let config = PoolConfig::new("us-east-1_AbCdEfGhI", "client123").unwrap();
        assert_eq!(config.region(), "us-east-1");
        assert_eq!(config.endpoint, "https://idp.us-east-1.example/");
    }

    #[test]
    fn rejects_pool_id_without_underscore() {
        assert!(PoolConfig::new("noSeparator", "client123").is_err());
    }

    #[test]
    fn rejects_pool_id_with_empty_short_id() {
        assert!(PoolConfig::new("us-east-1_", "client123").is_err());
    }

    #[test]
    fn endpoint_override_replaces_default() {
        let config = PoolConfig::new("us-east-1_AbCdEfGhI", "client123")
            .unwrap()
            .with_endpoint_override("https://custom.example/");
        assert_eq!(config.endpoint, "https://custom.example/");
    }
}
