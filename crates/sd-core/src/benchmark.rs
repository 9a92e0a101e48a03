//! Industry comparison figures
//!
//! The reference figures are fixed constants; a report only places a
//! scan's stored scores next to them.

use crate::models::{CategoryScores, ScanRecord};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCard {
    pub overall_score: u8,
    #[serde(flatten)]
    pub scores: CategoryScores,
}

pub const INDUSTRY_AVERAGE: ScoreCard = ScoreCard {
    overall_score: 68,
    scores: CategoryScores {
        performance_score: 62,
        seo_score: 71,
        accessibility_score: 66,
        conversion_score: 58,
        security_score: 79,
    },
};

pub const TOP_PERFORMERS: ScoreCard = ScoreCard {
    overall_score: 92,
    scores: CategoryScores {
        performance_score: 94,
        seo_score: 93,
        accessibility_score: 90,
        conversion_score: 88,
        security_score: 97,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    pub scan_id: Uuid,
    pub your_score: ScoreCard,
    pub industry_average: ScoreCard,
    pub top_performers: ScoreCard,
}

pub fn report_for(scan: &ScanRecord) -> BenchmarkReport {
    BenchmarkReport {
        scan_id: scan.id,
        your_score: ScoreCard {
            overall_score: scan.overall_score,
            scores: scan.scores,
        },
        industry_average: INDUSTRY_AVERAGE,
        top_performers: TOP_PERFORMERS,
    }
}
