//! Subscription plan registry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription tier identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    #[default]
    Free,
    Pro,
    Advanced,
}

impl PlanId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Free => "free",
            PlanId::Pro => "pro",
            PlanId::Advanced => "advanced",
        }
    }

    /// Lenient parse: anything unrecognised is treated as the free tier.
    pub fn parse_or_free(value: &str) -> Self {
        value.parse().unwrap_or(PlanId::Free)
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(PlanId::Free),
            "pro" => Ok(PlanId::Pro),
            "advanced" => Ok(PlanId::Advanced),
            other => Err(format!("unknown plan '{}'", other)),
        }
    }
}

/// Capability flags bundled into plans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BasicScan,
    AiRecommendations,
    AutoFix,
    Benchmark,
    CompetitorAnalysis,
    PrioritySupport,
    ApiAccess,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::BasicScan => "basic_scan",
            Feature::AiRecommendations => "ai_recommendations",
            Feature::AutoFix => "auto_fix",
            Feature::Benchmark => "benchmark",
            Feature::CompetitorAnalysis => "competitor_analysis",
            Feature::PrioritySupport => "priority_support",
            Feature::ApiAccess => "api_access",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entitlements of a single plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDefinition {
    pub id: PlanId,
    pub name: &'static str,
    pub monthly_price_cents: u32,
    pub scan_quota_per_month: u32,
    pub store_quota: u32,
    pub features: &'static [Feature],
}

impl PlanDefinition {
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Scans left after `used` scans this period, never below zero
    pub fn remaining_scans(&self, used: u32) -> u32 {
        self.scan_quota_per_month.saturating_sub(used)
    }
}

static PLANS: [PlanDefinition; 3] = [
    PlanDefinition {
        id: PlanId::Free,
        name: "Free",
        monthly_price_cents: 0,
        scan_quota_per_month: 1,
        store_quota: 1,
        features: &[Feature::BasicScan],
    },
    PlanDefinition {
        id: PlanId::Pro,
        name: "Pro",
        monthly_price_cents: 2900,
        scan_quota_per_month: 10,
        store_quota: 3,
        features: &[
            Feature::BasicScan,
            Feature::AiRecommendations,
            Feature::AutoFix,
            Feature::Benchmark,
        ],
    },
    PlanDefinition {
        id: PlanId::Advanced,
        name: "Advanced",
        monthly_price_cents: 7900,
        scan_quota_per_month: 50,
        store_quota: 10,
        features: &[
            Feature::BasicScan,
            Feature::AiRecommendations,
            Feature::AutoFix,
            Feature::Benchmark,
            Feature::CompetitorAnalysis,
            Feature::PrioritySupport,
            Feature::ApiAccess,
        ],
    },
];

/// Definition for a plan
pub fn definition(plan: PlanId) -> &'static PlanDefinition {
    match plan {
        PlanId::Free => &PLANS[0],
        PlanId::Pro => &PLANS[1],
        PlanId::Advanced => &PLANS[2],
    }
}

/// Look up a plan by its wire identifier, falling back to free
pub fn lookup(plan_id: &str) -> &'static PlanDefinition {
    definition(PlanId::parse_or_free(plan_id))
}

/// All plans in tier order
pub fn all() -> &'static [PlanDefinition] {
    &PLANS
}
