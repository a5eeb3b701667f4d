//! Report history: keeps the latest report per campaign key and diffs
//! successive runs into verdict changes.

use campaign_core::types::{CampaignReport, Grade, SampleTier, StageLabel};
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Key absent from the previous run.
    Appeared,
    /// Key absent from the current run.
    Disappeared,
    /// Grade, stage or sample tier moved.
    Moved,
}

/// One key whose classification differs between two runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictChange {
    pub key: String,
    pub kind: ChangeKind,
    pub previous_as_of: Option<NaiveDate>,
    pub current_as_of: Option<NaiveDate>,
    pub previous_grade: Option<Grade>,
    pub current_grade: Option<Grade>,
    pub previous_stage: Option<StageLabel>,
    pub current_stage: Option<StageLabel>,
    pub previous_tier: Option<SampleTier>,
    pub current_tier: Option<SampleTier>,
}

impl VerdictChange {
    pub fn grade_changed(&self) -> bool {
        self.previous_grade != self.current_grade
    }

    /// True when a campaign newly lands in D.
    pub fn is_new_kill(&self) -> bool {
        self.current_grade == Some(Grade::D) && self.previous_grade != Some(Grade::D)
    }
}

/// Key a report is tracked under across runs. Unparseable campaigns have
/// no join key, so they are tracked by their raw name.
pub fn history_key(report: &CampaignReport) -> String {
    if report.affiliate_code.is_empty() {
        let name = report.campaign_names.first().map(String::as_str).unwrap_or("");
        format!("unparseable:{}", name)
    } else {
        report.join_key().to_string()
    }
}

/// Verdict moves between two report sets, ordered by key. Keys whose grade,
/// stage and tier are all unchanged are omitted.
pub fn diff_reports(previous: &[CampaignReport], current: &[CampaignReport]) -> Vec<VerdictChange> {
    let before: BTreeMap<String, &CampaignReport> =
        previous.iter().map(|r| (history_key(r), r)).collect();
    let after: BTreeMap<String, &CampaignReport> =
        current.iter().map(|r| (history_key(r), r)).collect();

    let mut changes = Vec::new();
    for (key, cur) in &after {
        match before.get(key) {
            None => changes.push(change(key, ChangeKind::Appeared, None, Some(cur))),
            Some(prev) => {
                let moved = prev.verdict.grade != cur.verdict.grade
                    || prev.verdict.stage_label != cur.verdict.stage_label
                    || prev.verdict.sample_tier != cur.verdict.sample_tier;
                if moved {
                    changes.push(change(key, ChangeKind::Moved, Some(prev), Some(cur)));
                }
            }
        }
    }
    for (key, prev) in &before {
        if !after.contains_key(key) {
            changes.push(change(key, ChangeKind::Disappeared, Some(prev), None));
        }
    }
    changes.sort_by(|a, b| a.key.cmp(&b.key));
    changes
}

fn change(
    key: &str,
    kind: ChangeKind,
    prev: Option<&CampaignReport>,
    cur: Option<&CampaignReport>,
) -> VerdictChange {
    VerdictChange {
        key: key.to_string(),
        kind,
        previous_as_of: prev.map(|r| r.as_of),
        current_as_of: cur.map(|r| r.as_of),
        previous_grade: prev.and_then(|r| r.verdict.grade),
        current_grade: cur.and_then(|r| r.verdict.grade),
        previous_stage: prev.and_then(|r| r.verdict.stage_label),
        current_stage: cur.and_then(|r| r.verdict.stage_label),
        previous_tier: prev.map(|r| r.verdict.sample_tier),
        current_tier: cur.map(|r| r.verdict.sample_tier),
    }
}

/// Latest report per key, shared across threads.
pub struct ReportHistory {
    latest: DashMap<String, CampaignReport>,
}

impl ReportHistory {
    pub fn new() -> Self {
        Self {
            latest: DashMap::new(),
        }
    }

    /// Replace the stored snapshot with `reports` and return what moved.
    pub fn record(&self, reports: &[CampaignReport]) -> Vec<VerdictChange> {
        let previous = self.snapshot();
        let changes = diff_reports(&previous, reports);

        self.latest.clear();
        for report in reports {
            self.latest.insert(history_key(report), report.clone());
        }
        for change in &changes {
            metrics::counter!("history.verdict_changes", "kind" => change_label(change.kind))
                .increment(1);
        }
        debug!(
            stored = self.latest.len(),
            changes = changes.len(),
            "Report history updated"
        );
        changes
    }

    pub fn get(&self, key: &str) -> Option<CampaignReport> {
        self.latest.get(key).map(|r| r.clone())
    }

    /// Stored reports, ordered by key.
    pub fn snapshot(&self) -> Vec<CampaignReport> {
        let mut all: Vec<_> = self
            .latest
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all.into_iter().map(|(_, r)| r).collect()
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

impl Default for ReportHistory {
    fn default() -> Self {
        Self::new()
    }
}

fn change_label(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Appeared => "appeared",
        ChangeKind::Disappeared => "disappeared",
        ChangeKind::Moved => "moved",
    }
}
