//! Tracker models - one monitoring session over a wallet cohort

use crate::decimal::MAX_TOKEN_DECIMALS;
use crate::error::{TrackerError, TrackerResult};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which wallet cohort a tracker follows
///
/// Purely a label: aggregation is identical for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackType {
    #[serde(rename = "team")]
    Team,
    #[serde(rename = "topHolders")]
    TopHolders,
}

impl TrackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackType::Team => "team",
            TrackType::TopHolders => "topHolders",
        }
    }

    /// Human label used in notifications
    pub fn label(&self) -> &'static str {
        match self {
            TrackType::Team => "Team wallets",
            TrackType::TopHolders => "Top holders",
        }
    }
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrackType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team" => Ok(TrackType::Team),
            "topHolders" | "top_holders" | "topholders" => Ok(TrackType::TopHolders),
            _ => Err(format!("Unknown track type: {}", s)),
        }
    }
}

/// Derive the per-owner tracker key from token and track type
pub fn tracker_id(token_address: &str, track_type: TrackType) -> String {
    format!("{}:{}", token_address, track_type)
}

/// Identifies a tracker across owners
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackerKey {
    pub owner: String,
    pub tracker_id: String,
}

impl TrackerKey {
    pub fn new(owner: impl Into<String>, tracker_id: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            tracker_id: tracker_id.into(),
        }
    }
}

impl std::fmt::Display for TrackerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.tracker_id)
    }
}

/// Request to start a tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSpec {
    /// Where notifications go (chat id)
    pub destination: String,
    pub token_address: String,
    pub wallets: Vec<String>,
    pub track_type: TrackType,
    /// Token total supply in human units, fixed for the tracker's lifetime
    pub total_supply: Decimal,
    pub decimals: u32,
    pub ticker: String,
    /// Percentage observed when the tracker was requested; becomes the baseline
    pub initial_percentage: Decimal,
    /// Minimum percentage-point move that triggers a notification
    pub threshold: Decimal,
}

fn check_invariants(threshold: Decimal, decimals: u32) -> TrackerResult<()> {
    if threshold <= Decimal::ZERO {
        return Err(TrackerError::InvalidThreshold(format!(
            "threshold must be greater than zero, got {}",
            threshold
        )));
    }

    if decimals > MAX_TOKEN_DECIMALS {
        return Err(TrackerError::InvalidDecimals(decimals));
    }

    Ok(())
}

/// One monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracker {
    pub tracker_id: String,
    pub owner: String,
    pub destination: String,
    pub wallets: Vec<String>,
    pub token_address: String,
    pub ticker: String,
    pub decimals: u32,
    pub total_supply: Decimal,
    pub track_type: TrackType,
    pub baseline_percentage: Decimal,
    pub current_percentage: Decimal,
    pub significant_change_threshold: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Tracker {
    /// Build a tracker from a start request, validating its invariants
    pub fn from_spec(owner: &str, spec: TrackerSpec, now: DateTime<Utc>) -> TrackerResult<Self> {
        check_invariants(spec.threshold, spec.decimals)?;

        let mut seen = HashSet::new();
        let wallets: Vec<String> = spec
            .wallets
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty() && seen.insert(w.clone()))
            .collect();

        Ok(Self {
            tracker_id: tracker_id(&spec.token_address, spec.track_type),
            owner: owner.to_string(),
            destination: spec.destination,
            wallets,
            token_address: spec.token_address,
            ticker: spec.ticker,
            decimals: spec.decimals,
            total_supply: spec.total_supply,
            track_type: spec.track_type,
            baseline_percentage: spec.initial_percentage,
            current_percentage: spec.initial_percentage,
            significant_change_threshold: spec.threshold,
            created_at: now,
        })
    }

    /// Re-check the creation invariants (snapshots are not trusted)
    pub fn validate(&self) -> TrackerResult<()> {
        check_invariants(self.significant_change_threshold, self.decimals)
    }

    /// Same tracker, not a later one re-created under the same key
    pub fn same_instance(&self, other: &Tracker) -> bool {
        self.owner == other.owner
            && self.tracker_id == other.tracker_id
            && self.created_at == other.created_at
    }

    pub fn key(&self) -> TrackerKey {
        TrackerKey::new(self.owner.clone(), self.tracker_id.clone())
    }

    /// Age strictly beyond the TTL
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.created_at) > ttl
    }

    pub fn summary(&self) -> TrackerSummary {
        TrackerSummary {
            tracker_id: self.tracker_id.clone(),
            ticker: self.ticker.clone(),
            current_percentage: self.current_percentage,
            track_type: self.track_type,
            threshold: self.significant_change_threshold,
        }
    }
}

/// Listing view of a tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSummary {
    pub tracker_id: String,
    pub ticker: String,
    pub current_percentage: Decimal,
    pub track_type: TrackType,
    pub threshold: Decimal,
}
