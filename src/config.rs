// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;

const DEFAULT_MAX_GEOFENCES_PER_USER: usize = 500;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Active geofences a single user may own
    pub max_geofences_per_user: usize,
    /// Optional GeoJSON file imported at startup
    pub seed_file: Option<String>,
    /// Owner assigned to seeded geofences
    pub seed_owner: Option<String>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            max_geofences_per_user: DEFAULT_MAX_GEOFENCES_PER_USER,
            seed_file: None,
            seed_owner: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let seed_file = env::var("GEOFENCE_SEED_FILE").ok();
        let seed_owner = env::var("GEOFENCE_SEED_OWNER").ok();
        if seed_file.is_some() && seed_owner.is_none() {
            return Err(ConfigError::Missing("GEOFENCE_SEED_OWNER"));
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_or("PORT", 8080)?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            max_geofences_per_user: parse_or(
                "MAX_GEOFENCES_PER_USER",
                DEFAULT_MAX_GEOFENCES_PER_USER,
            )?,
            seed_file,
            seed_owner,
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
