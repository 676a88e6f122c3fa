// SPDX-License-Identifier: EUPL-1.2

//! Environment-driven configuration, read once at startup.

use std::collections::HashMap;

use anyhow::{anyhow, Context};

use crate::models::Stage;
use crate::routing::{EscalationPolicy, Routing};

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    /// Base64url Ed25519 key of the identity provider. `None` trusts identity headers as-is.
    pub identity_public_key: Option<String>,
    pub routing: Routing,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let target = match var("ESCALATION_STAGE") {
            Some(s) => s
                .parse::<Stage>()
                .map_err(|e| anyhow!(e))
                .context("ESCALATION_STAGE")?,
            None => Stage::Dtg,
        };
        let escalation = EscalationPolicy::new(target, var("ESCALATION_HANDLER"))
            .map_err(|e| anyhow!(e))
            .context("ESCALATION_STAGE")?;

        let approvers: HashMap<Stage, String> = Stage::ALL
            .into_iter()
            .filter_map(|stage| {
                let key = format!("APPROVER_{}", stage.as_str().to_ascii_uppercase());
                var(&key).map(|name| (stage, name))
            })
            .collect();

        Ok(Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3100".into()),
            database_url: var("DATABASE_URL"),
            redis_url: var("REDIS_URL"),
            identity_public_key: var("IDENTITY_PUBLIC_KEY"),
            routing: Routing::new(approvers, escalation),
        })
    }
}
