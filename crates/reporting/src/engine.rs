//! Reconciliation engine: composes intake, rolling-window aggregation,
//! join, sample tiering, grading and action recommendation into one
//! `analyze` call.
//!
//! The engine holds only immutable configuration. Given the same rows and
//! the same as-of date it produces byte-identical reports, so re-running
//! after upstream data is re-collected is safe.

use crate::actions::ActionRecommender;
use crate::currency::CurrencyTable;
use crate::grading::GradeEngine;
use crate::identity::CampaignNameParser;
use crate::intake::{unparseable_key, Intake, KeyLabels};
use crate::reconcile::{AliasTable, Reconciler};
use crate::sample::classify_sample;
use crate::window::{AdAggregate, CommissionAggregate, RollingWindow};
use campaign_core::config::AppConfig;
use campaign_core::types::{
    Action, ActionKind, AdSpendRecord, CampaignMetric, CampaignReport, CampaignVerdict,
    CommissionOrder, Diagnostic, DiagnosticKind, Grade, JoinKey,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use uuid::Uuid;

/// Full result of one run, including findings that belong to no campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub as_of: NaiveDate,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub rate_table_version: String,
    pub reports: Vec<CampaignReport>,
    pub unattributed: Vec<Diagnostic>,
    pub rows_excluded: usize,
}

pub struct ReconciliationEngine {
    config: AppConfig,
    parser: CampaignNameParser,
    currency: CurrencyTable,
    aliases: AliasTable,
}

impl ReconciliationEngine {
    pub fn new(config: AppConfig) -> Self {
        let parser = CampaignNameParser::new(config.naming.clone());
        let currency = CurrencyTable::new(&config.currency);
        let aliases = AliasTable::new(&config.aliases);
        Self {
            config,
            parser,
            currency,
            aliases,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Classified reports, one per campaign key, ordered by key.
    pub fn analyze(
        &self,
        as_of: NaiveDate,
        ad_rows: &[AdSpendRecord],
        commission_rows: &[CommissionOrder],
    ) -> Vec<CampaignReport> {
        self.analyze_detailed(as_of, ad_rows, commission_rows).reports
    }

    pub fn analyze_detailed(
        &self,
        as_of: NaiveDate,
        ad_rows: &[AdSpendRecord],
        commission_rows: &[CommissionOrder],
    ) -> Analysis {
        let window = RollingWindow::trailing(as_of, self.config.window.window_days);
        let intake = Intake::collect(
            ad_rows,
            commission_rows,
            &self.parser,
            &self.currency,
            &self.aliases,
        );

        let ad_aggs = window.aggregate_ads(&intake.ad_rows);
        let commission_aggs = window.aggregate_orders(&intake.orders);
        let reconciler =
            Reconciler::new(&self.aliases, window, self.config.grading.epc_conservatism);
        let joined = reconciler.reconcile(&ad_aggs, &commission_aggs);

        let (mut diagnostics, mut unparseable_diagnostics) = self.canonical_diagnostics(&intake);
        let labels = self.canonical_labels(&intake.labels);

        let mut reports = Vec::with_capacity(joined.len() + intake.unparseable.len());
        let mut seen = BTreeSet::new();
        for campaign in joined {
            let extra = diagnostics.remove(&campaign.key).unwrap_or_default();
            seen.insert(campaign.key.clone());
            reports.push(self.keyed_report(
                as_of,
                &campaign.key,
                campaign.metric,
                campaign.has_commission,
                labels.get(&campaign.key),
                extra,
            ));
        }
        // Keys whose every row was excluded still get a report carrying why.
        let empty_metric =
            reconciler.metric(&AdAggregate::default(), &CommissionAggregate::default());
        for (key, extra) in diagnostics {
            if seen.contains(&key) {
                continue;
            }
            reports.push(self.keyed_report(
                as_of,
                &key,
                empty_metric.clone(),
                false,
                labels.get(&key),
                extra,
            ));
        }
        reports.sort_by(|a, b| a.join_key().cmp(&b.join_key()));

        for (name, rows) in &intake.unparseable {
            let key = unparseable_key(name);
            let aggs = window.aggregate_ads(rows);
            let extra = unparseable_diagnostics.remove(&key).unwrap_or_default();
            let ad = aggs.get(&key).cloned().unwrap_or_default();
            if !ad.has_spend_in_window() && extra.is_empty() {
                continue;
            }
            let metric = reconciler.metric(&ad, &CommissionAggregate::default());
            reports.push(self.unparseable_report(as_of, name, metric, extra));
        }

        let mut grade_counts = [0usize; 4];
        for report in &reports {
            let (grade, slot) = match report.verdict.grade {
                Some(Grade::S) => ("S", 0),
                Some(Grade::B) => ("B", 1),
                Some(Grade::D) => ("D", 2),
                None => ("none", 3),
            };
            grade_counts[slot] += 1;
            metrics::counter!("reconcile.reports", "grade" => grade).increment(1);
        }

        info!(
            as_of = %as_of,
            window_start = %window.start,
            window_end = %window.end,
            ad_rows = ad_rows.len(),
            commission_rows = commission_rows.len(),
            rows_excluded = intake.rows_excluded,
            reports = reports.len(),
            grade_s = grade_counts[0],
            grade_b = grade_counts[1],
            grade_d = grade_counts[2],
            ungraded = grade_counts[3],
            "Campaign analysis complete"
        );

        Analysis {
            as_of,
            window_start: window.start,
            window_end: window.end,
            rate_table_version: self.currency.version().to_string(),
            reports,
            unattributed: intake.unattributed,
            rows_excluded: intake.rows_excluded,
        }
    }

    fn keyed_report(
        &self,
        as_of: NaiveDate,
        key: &JoinKey,
        metric: CampaignMetric,
        has_commission: bool,
        labels: Option<&KeyLabels>,
        mut diagnostics: Vec<Diagnostic>,
    ) -> CampaignReport {
        let window_days = self.config.window.window_days;
        let tier = classify_sample(metric.avg_daily_clicks, &self.config.sample);
        let verdict = GradeEngine::new(&self.config.grading, window_days).grade(&metric, tier);
        let action = ActionRecommender::new(&self.config.action, window_days)
            .recommend(&metric, &verdict);

        if metric.budget_usd == 0.0 {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnbudgetedInWindow,
                "no budget observed in window",
            ));
        }
        if !metric.has_ad_spend {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::NoAdSpend,
                "no ad-spend rows in window",
            ));
        } else if !has_commission {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::NoCommission,
                "no commission orders in window",
            ));
        }

        let merchant_id = labels
            .and_then(|l| l.merchant_ids.iter().next().cloned())
            .unwrap_or_else(|| key.merchant_id.clone());
        let affiliate_label = labels
            .and_then(|l| l.affiliate_codes.iter().next().cloned())
            .unwrap_or_else(|| key.affiliate_code.clone());
        let campaign_names = labels
            .map(|l| l.campaign_names.iter().cloned().collect())
            .unwrap_or_default();

        debug!(
            key = %key,
            grade = ?verdict.grade,
            tier = ?verdict.sample_tier,
            action = ?action.kind,
            "Campaign classified"
        );

        CampaignReport {
            report_id: report_id(&key.to_string(), as_of),
            as_of,
            merchant_id,
            affiliate_code: key.affiliate_code.clone(),
            affiliate_label,
            campaign_names,
            metric,
            verdict,
            action,
            diagnostics,
        }
    }

    fn unparseable_report(
        &self,
        as_of: NaiveDate,
        campaign_name: &str,
        metric: CampaignMetric,
        extra: Vec<Diagnostic>,
    ) -> CampaignReport {
        let detail = match self.parser.parse(campaign_name) {
            Err(err) => err.to_string(),
            Ok(_) => format!("campaign name {:?} did not decode", campaign_name),
        };
        let mut diagnostics = vec![Diagnostic::new(DiagnosticKind::UnparseableIdentity, detail)];
        diagnostics.extend(extra);

        CampaignReport {
            report_id: report_id(campaign_name, as_of),
            as_of,
            merchant_id: String::new(),
            affiliate_code: String::new(),
            affiliate_label: String::new(),
            campaign_names: vec![campaign_name.to_string()],
            verdict: CampaignVerdict {
                sample_tier: classify_sample(metric.avg_daily_clicks, &self.config.sample),
                grade: None,
                stage_label: None,
                reasons: vec!["unparseable identity".to_string()],
            },
            metric,
            action: Action::without_numbers(ActionKind::None, "no grade, identity unresolved"),
            diagnostics,
        }
    }

    /// Split intake findings into keyed (alias-resolved) and unparseable.
    fn canonical_diagnostics(
        &self,
        intake: &Intake,
    ) -> (
        BTreeMap<JoinKey, Vec<Diagnostic>>,
        BTreeMap<JoinKey, Vec<Diagnostic>>,
    ) {
        let mut keyed: BTreeMap<JoinKey, Vec<Diagnostic>> = BTreeMap::new();
        let mut unparseable: BTreeMap<JoinKey, Vec<Diagnostic>> = BTreeMap::new();
        for (key, diags) in &intake.diagnostics {
            if key.affiliate_code.is_empty() {
                unparseable
                    .entry(key.clone())
                    .or_default()
                    .extend(diags.iter().cloned());
            } else {
                keyed
                    .entry(self.aliases.canonical_key(key))
                    .or_default()
                    .extend(diags.iter().cloned());
            }
        }
        (keyed, unparseable)
    }

    fn canonical_labels(
        &self,
        labels: &BTreeMap<JoinKey, KeyLabels>,
    ) -> BTreeMap<JoinKey, KeyLabels> {
        let mut out: BTreeMap<JoinKey, KeyLabels> = BTreeMap::new();
        for (key, label) in labels {
            let merged = out.entry(self.aliases.canonical_key(key)).or_default();
            merged.merchant_ids.extend(label.merchant_ids.iter().cloned());
            merged.affiliate_codes.extend(label.affiliate_codes.iter().cloned());
            merged.campaign_names.extend(label.campaign_names.iter().cloned());
        }
        out
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

/// Stable id for a report: the same key and as-of date always map to the
/// same UUID.
pub fn report_id(key: &str, as_of: NaiveDate) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("campaign-review|{}|{}", key, as_of).as_bytes(),
    )
}
