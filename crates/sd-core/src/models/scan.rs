//! Scan models

use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Issue severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl FromStr for Severity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(CoreError::Validation(format!("unknown severity '{}'", other))),
        }
    }
}

/// Issue lifecycle: `open` moves to `fixed` and stays there
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    #[default]
    Open,
    Fixed,
}

/// Per-category scores, each 0..=100
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryScores {
    pub performance_score: u8,
    pub seo_score: u8,
    pub accessibility_score: u8,
    pub conversion_score: u8,
    pub security_score: u8,
}

impl CategoryScores {
    /// Every category at the same score
    pub fn uniform(score: u8) -> Self {
        Self {
            performance_score: score,
            seo_score: score,
            accessibility_score: score,
            conversion_score: score,
            security_score: score,
        }
    }

    pub fn named(&self) -> [(&'static str, u8); 5] {
        [
            ("performance", self.performance_score),
            ("seo", self.seo_score),
            ("accessibility", self.accessibility_score),
            ("conversion", self.conversion_score),
            ("security", self.security_score),
        ]
    }
}

/// Detected problem on a scanned store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub category: String,
    pub severity: Severity,
    pub impact: String,
    pub recommendation: String,
    pub status: IssueStatus,
}

/// Issue as submitted with a new scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub recommendation: String,
}

fn default_category() -> String {
    "general".to_string()
}

/// Payload of a scan creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDraft {
    pub overall_score: u8,
    #[serde(flatten)]
    pub scores: CategoryScores,
    #[serde(default)]
    pub issues: Vec<IssueDraft>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl ScanDraft {
    /// Check scores are in range and issues are titled with distinct ids
    pub fn validate(&self) -> CoreResult<()> {
        validate_score("overallScore", self.overall_score)?;
        for (name, score) in self.scores.named() {
            validate_score(name, score)?;
        }

        let mut seen = HashSet::new();
        for issue in &self.issues {
            if issue.title.trim().is_empty() {
                return Err(CoreError::Validation("issue title must not be empty".to_string()));
            }
            if let Some(id) = issue.id.as_deref().filter(|id| !id.trim().is_empty()) {
                if !seen.insert(id) {
                    return Err(CoreError::Validation(format!("duplicate issue id '{}'", id)));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: Uuid,
    pub store_id: Uuid,
    pub owner_id: String,
    pub overall_score: u8,
    #[serde(flatten)]
    pub scores: CategoryScores,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ScanRecord {
    /// Build a scan from a draft; every issue starts open
    pub fn from_draft(store_id: Uuid, owner_id: &str, draft: ScanDraft) -> CoreResult<Self> {
        draft.validate()?;

        let issues = draft
            .issues
            .into_iter()
            .map(|issue| Issue {
                id: issue
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                title: issue.title.trim().to_string(),
                category: issue.category,
                severity: issue.severity,
                impact: issue.impact,
                recommendation: issue.recommendation,
                status: IssueStatus::Open,
            })
            .collect();

        let recommendations = draft
            .recommendations
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        Ok(Self {
            id: Uuid::new_v4(),
            store_id,
            owner_id: owner_id.to_string(),
            overall_score: draft.overall_score,
            scores: draft.scores,
            issues,
            recommendations,
            created_at: Utc::now(),
        })
    }

    pub fn issue(&self, issue_id: &str) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id == issue_id)
    }

    /// Mark an issue fixed. Already fixed issues are left as they are.
    pub fn mark_fixed(&mut self, issue_id: &str) -> CoreResult<&Issue> {
        let issue = self
            .issues
            .iter_mut()
            .find(|i| i.id == issue_id)
            .ok_or_else(|| CoreError::not_found("Issue", issue_id))?;
        issue.status = IssueStatus::Fixed;
        Ok(&*issue)
    }

    pub fn open_issues(&self) -> usize {
        self.issues.iter().filter(|i| i.status == IssueStatus::Open).count()
    }
}

/// Audit entry written by every auto-fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixAttempt {
    pub issue_id: String,
    pub applied_at: DateTime<Utc>,
    pub success: bool,
}

fn validate_score(name: &str, score: u8) -> CoreResult<()> {
    if score > 100 {
        return Err(CoreError::Validation(format!(
            "{} must be between 0 and 100, got {}",
            name, score
        )));
    }
    Ok(())
}
