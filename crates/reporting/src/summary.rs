//! Portfolio rollup across one run's reports.

use campaign_core::types::{ActionKind, CampaignReport, Grade, SampleTier, StageLabel};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub as_of: Option<NaiveDate>,
    pub total_campaigns: u64,
    /// Reports without a grade are counted under `ungraded`.
    pub by_grade: BTreeMap<Grade, u64>,
    pub ungraded: u64,
    pub by_stage: BTreeMap<StageLabel, u64>,
    pub by_tier: BTreeMap<SampleTier, u64>,
    pub by_action: BTreeMap<ActionKind, u64>,
    pub total_cost_usd: f64,
    pub total_commission_usd: f64,
    pub total_rejected_commission_usd: f64,
    /// `(commission - cost) / cost` over the whole portfolio; 0 without spend.
    pub blended_roi: f64,
    pub inverted_campaigns: u64,
    pub reports_with_diagnostics: u64,
}

impl PortfolioSummary {
    pub fn from_reports(reports: &[CampaignReport]) -> Self {
        let mut by_grade = BTreeMap::new();
        let mut by_stage = BTreeMap::new();
        let mut by_tier = BTreeMap::new();
        let mut by_action = BTreeMap::new();
        let mut ungraded = 0;

        for r in reports {
            match r.verdict.grade {
                Some(grade) => *by_grade.entry(grade).or_insert(0) += 1,
                None => ungraded += 1,
            }
            if let Some(stage) = r.verdict.stage_label {
                *by_stage.entry(stage).or_insert(0) += 1;
            }
            *by_tier.entry(r.verdict.sample_tier).or_insert(0) += 1;
            *by_action.entry(r.action.kind).or_insert(0) += 1;
        }

        let total_cost_usd: f64 = reports.iter().map(|r| r.metric.cost_usd_7d).sum();
        let total_commission_usd: f64 = reports.iter().map(|r| r.metric.commission_usd_7d).sum();

        Self {
            as_of: reports.first().map(|r| r.as_of),
            total_campaigns: reports.len() as u64,
            by_grade,
            ungraded,
            by_stage,
            by_tier,
            by_action,
            total_cost_usd,
            total_commission_usd,
            total_rejected_commission_usd: reports
                .iter()
                .map(|r| r.metric.rejected_commission_usd_7d)
                .sum(),
            blended_roi: if total_cost_usd > 0.0 {
                (total_commission_usd - total_cost_usd) / total_cost_usd
            } else {
                0.0
            },
            inverted_campaigns: reports.iter().filter(|r| r.metric.is_inverted()).count() as u64,
            reports_with_diagnostics: reports.iter().filter(|r| !r.diagnostics.is_empty()).count()
                as u64,
        }
    }

    pub fn grade_count(&self, grade: Grade) -> u64 {
        self.by_grade.get(&grade).copied().unwrap_or(0)
    }
}
