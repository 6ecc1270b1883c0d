//! Owner roles and tracker quotas
//!
//! Roles:
//! - `admin`: unlimited trackers
//! - `vip`: `vip_quota` trackers (10 by default)
//! - `default`: `default_quota` trackers (2 by default)

use crate::config::RolesConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Owner role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Vip,
    Default,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Vip => write!(f, "vip"),
            Role::Default => write!(f, "default"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "vip" => Ok(Role::Vip),
            "default" | "user" => Ok(Role::Default),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Maximum number of concurrently active trackers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    Unlimited,
    Limited(usize),
}

impl Quota {
    /// Whether one more tracker fits next to `current` existing ones
    pub fn allows(&self, current: usize) -> bool {
        match self {
            Quota::Unlimited => true,
            Quota::Limited(limit) => current < *limit,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Quota::Unlimited => None,
            Quota::Limited(limit) => Some(*limit),
        }
    }
}

/// Quota table per role
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    pub vip: usize,
    pub default: usize,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self { vip: 10, default: 2 }
    }
}

impl QuotaPolicy {
    pub fn quota_for(&self, role: Role) -> Quota {
        match role {
            Role::Admin => Quota::Unlimited,
            Role::Vip => Quota::Limited(self.vip),
            Role::Default => Quota::Limited(self.default),
        }
    }
}

/// External role lookup
#[async_trait::async_trait]
pub trait RoleLookup: Send + Sync {
    async fn role(&self, owner: &str) -> anyhow::Result<Role>;
}

/// Role lookup backed by the `roles` configuration section
pub struct ConfigRoleLookup {
    admins: HashSet<String>,
    vips: HashSet<String>,
}

impl ConfigRoleLookup {
    pub fn new(config: &RolesConfig) -> Self {
        Self {
            admins: config.admins.iter().cloned().collect(),
            vips: config.vips.iter().cloned().collect(),
        }
    }
}

#[async_trait::async_trait]
impl RoleLookup for ConfigRoleLookup {
    async fn role(&self, owner: &str) -> anyhow::Result<Role> {
        if self.admins.contains(owner) {
            Ok(Role::Admin)
        } else if self.vips.contains(owner) {
            Ok(Role::Vip)
        } else {
            Ok(Role::Default)
        }
    }
}
