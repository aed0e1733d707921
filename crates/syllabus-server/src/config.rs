// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;

use syllabus_core::IdentityPolicy;

/// Syllabus server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Store URL: `memory:`, `sqlite:...` or `postgres://...`
    pub database_url: String,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Let API-key callers without a subject create records
    pub allow_guest_writes: bool,
    /// Keys accepted on the guest path
    pub api_keys: Vec<String>,
    /// Issuers whose subjects are accepted; empty accepts any issuer
    pub trusted_issuers: Vec<String>,
    /// Largest accepted batch
    pub max_batch_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `SYLLABUS_DATABASE_URL`: store URL (default: `memory:`)
    /// - `SYLLABUS_HTTP_PORT`: HTTP port (default: 8080)
    /// - `SYLLABUS_ALLOW_GUEST_WRITES`: `true`/`false` (default: false)
    /// - `SYLLABUS_API_KEYS`: comma-separated guest keys (default: none)
    /// - `SYLLABUS_TRUSTED_ISSUERS`: comma-separated issuers (default: any)
    /// - `SYLLABUS_MAX_BATCH_SIZE`: largest batch (default: 100)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("SYLLABUS_DATABASE_URL").unwrap_or_else(|_| "memory:".to_string());
        if database_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "SYLLABUS_DATABASE_URL",
                "must not be empty",
            ));
        }

        let http_port: u16 = std::env::var("SYLLABUS_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("SYLLABUS_HTTP_PORT", "must be a valid port number")
            })?;

        let allow_guest_writes = match std::env::var("SYLLABUS_ALLOW_GUEST_WRITES")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "" | "false" | "0" | "no" => false,
            "true" | "1" | "yes" => true,
            _ => {
                return Err(ConfigError::Invalid(
                    "SYLLABUS_ALLOW_GUEST_WRITES",
                    "must be true or false",
                ));
            }
        };

        let max_batch_size: usize = std::env::var("SYLLABUS_MAX_BATCH_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "SYLLABUS_MAX_BATCH_SIZE",
                "must be a positive integer",
            ))?;

        Ok(Self {
            database_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            allow_guest_writes,
            api_keys: comma_list("SYLLABUS_API_KEYS"),
            trusted_issuers: comma_list("SYLLABUS_TRUSTED_ISSUERS"),
            max_batch_size,
        })
    }

    /// Owner policy derived from this configuration.
    pub fn identity_policy(&self) -> IdentityPolicy {
        IdentityPolicy::require_subject()
            .with_guest_writes(self.allow_guest_writes)
            .with_trusted_issuers(self.trusted_issuers.iter().cloned())
    }
}

fn comma_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
