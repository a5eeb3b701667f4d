//! Intake: turns raw ingestion rows into identity-tagged, USD-normalized
//! rows, collecting per-campaign data-quality findings on the way.
//!
//! Nothing here fails the batch: a bad row is dropped and a
//! [`Diagnostic`] is recorded against the campaign key it belongs to.

use crate::currency::CurrencyTable;
use crate::identity::CampaignNameParser;
use crate::reconcile::AliasTable;
use campaign_core::error::CampaignError;
use campaign_core::types::{
    AdSpendRecord, CommissionOrder, Diagnostic, DiagnosticKind, JoinKey, OrderStatus,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

/// An ad-spend row after identity and currency normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct AdRow {
    pub key: JoinKey,
    pub campaign_name: String,
    pub date: NaiveDate,
    pub budget_usd: f64,
    pub cost_usd: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub lost_share_budget: f64,
    pub lost_share_rank: f64,
}

/// A commission order after currency normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub key: JoinKey,
    pub order_id: String,
    pub order_date: NaiveDate,
    pub commission_usd: f64,
    pub status: OrderStatus,
}

/// Original-case labels seen for a join key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyLabels {
    pub merchant_ids: BTreeSet<String>,
    pub affiliate_codes: BTreeSet<String>,
    pub campaign_names: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct Intake {
    pub ad_rows: Vec<AdRow>,
    pub orders: Vec<OrderRow>,
    /// Ad rows whose campaign name did not decode, keyed by raw name.
    pub unparseable: BTreeMap<String, Vec<AdRow>>,
    pub diagnostics: BTreeMap<JoinKey, Vec<Diagnostic>>,
    pub labels: BTreeMap<JoinKey, KeyLabels>,
    /// Findings that cannot be tied to any campaign key.
    pub unattributed: Vec<Diagnostic>,
    pub rows_excluded: usize,
}

impl Intake {
    pub fn collect(
        ad_records: &[AdSpendRecord],
        orders: &[CommissionOrder],
        parser: &CampaignNameParser,
        currency: &CurrencyTable,
        aliases: &AliasTable,
    ) -> Self {
        let mut intake = Intake::default();
        intake.collect_ads(ad_records, parser, currency);
        intake.collect_orders(orders, currency, aliases);
        intake
    }

    fn collect_ads(
        &mut self,
        records: &[AdSpendRecord],
        parser: &CampaignNameParser,
        currency: &CurrencyTable,
    ) {
        // A re-collected (campaign, day) supersedes earlier copies.
        let mut latest: HashMap<(&str, NaiveDate), usize> = HashMap::new();
        for (idx, rec) in records.iter().enumerate() {
            latest.insert((rec.campaign_name.as_str(), rec.date), idx);
        }
        let mut superseded: BTreeMap<&str, usize> = BTreeMap::new();

        for (idx, rec) in records.iter().enumerate() {
            if latest.get(&(rec.campaign_name.as_str(), rec.date)) != Some(&idx) {
                *superseded.entry(rec.campaign_name.as_str()).or_default() += 1;
                continue;
            }

            let parsed = parser.parse(&rec.campaign_name);
            let key = match &parsed {
                Ok(k) => k.join_key(),
                Err(_) => {
                    self.unparseable.entry(rec.campaign_name.clone()).or_default();
                    unparseable_key(&rec.campaign_name)
                }
            };

            if let Err(err) = rec.validate() {
                self.exclude(&key, DiagnosticKind::InvalidRecord, &err, "invalid_record");
                continue;
            }

            let converted = currency.to_usd(rec.cost, &rec.currency).and_then(|cost| {
                currency
                    .to_usd(rec.budget, &rec.currency)
                    .map(|budget| (cost, budget))
            });
            let (cost_usd, budget_usd) = match converted {
                Ok(v) => v,
                Err(err) => {
                    self.exclude(&key, DiagnosticKind::UnknownCurrency, &err, "unknown_currency");
                    continue;
                }
            };

            let row = AdRow {
                key: key.clone(),
                campaign_name: rec.campaign_name.clone(),
                date: rec.date,
                budget_usd,
                cost_usd,
                impressions: rec.impressions,
                clicks: rec.clicks,
                lost_share_budget: rec.lost_impression_share_budget,
                lost_share_rank: rec.lost_impression_share_rank,
            };

            match parsed {
                Ok(campaign) => {
                    let labels = self.labels.entry(key).or_default();
                    labels.merchant_ids.insert(campaign.merchant_id);
                    labels.affiliate_codes.insert(campaign.affiliate_code);
                    labels.campaign_names.insert(rec.campaign_name.clone());
                    self.ad_rows.push(row);
                }
                Err(_) => {
                    self.unparseable
                        .entry(rec.campaign_name.clone())
                        .or_default()
                        .push(row);
                }
            }
        }

        for (name, count) in superseded {
            let key = match parser.parse(name) {
                Ok(k) => k.join_key(),
                Err(_) => unparseable_key(name),
            };
            self.push(
                &key,
                Diagnostic::new(
                    DiagnosticKind::SupersededRows,
                    format!("{} re-collected row(s) of {} superseded", count, name),
                ),
            );
        }
    }

    fn collect_orders(
        &mut self,
        orders: &[CommissionOrder],
        currency: &CurrencyTable,
        aliases: &AliasTable,
    ) {
        // Re-ingested orders are matched on the alias-resolved network code.
        let dedup_key = |order: &CommissionOrder| {
            (aliases.canonical_code(&order.affiliate_code), order.order_id.clone())
        };
        let has_identity = |key: &JoinKey| {
            !key.merchant_id.is_empty() && !key.affiliate_code.is_empty()
        };

        let mut latest: HashMap<(String, String), usize> = HashMap::new();
        for (idx, order) in orders.iter().enumerate() {
            if has_identity(&JoinKey::new(&order.merchant_id_or_slug, &order.affiliate_code)) {
                latest.insert(dedup_key(order), idx);
            }
        }
        let mut superseded: BTreeMap<JoinKey, usize> = BTreeMap::new();

        for (idx, order) in orders.iter().enumerate() {
            let key = JoinKey::new(&order.merchant_id_or_slug, &order.affiliate_code);
            if !has_identity(&key) {
                warn!(order_id = %order.order_id, "Order without merchant or affiliate excluded");
                metrics::counter!("reconcile.rows_excluded", "reason" => "missing_identity")
                    .increment(1);
                self.rows_excluded += 1;
                self.unattributed.push(Diagnostic::new(
                    DiagnosticKind::InvalidRecord,
                    format!("order {} has no merchant or affiliate", order.order_id),
                ));
                continue;
            }

            if latest.get(&dedup_key(order)) != Some(&idx) {
                *superseded.entry(key).or_default() += 1;
                continue;
            }

            if let Err(err) = order.validate() {
                let (kind, reason) = match &err {
                    CampaignError::OrderLifecycle { .. } => {
                        (DiagnosticKind::OrderLifecycleViolation, "order_lifecycle")
                    }
                    _ => (DiagnosticKind::InvalidRecord, "invalid_record"),
                };
                self.exclude(&key, kind, &err, reason);
                continue;
            }

            let commission_usd = match currency.to_usd(order.commission, &order.currency) {
                Ok(v) => v,
                Err(err) => {
                    self.exclude(&key, DiagnosticKind::UnknownCurrency, &err, "unknown_currency");
                    continue;
                }
            };

            let labels = self.labels.entry(key.clone()).or_default();
            labels.merchant_ids.insert(order.merchant_id_or_slug.trim().to_string());
            labels.affiliate_codes.insert(order.affiliate_code.trim().to_string());

            self.orders.push(OrderRow {
                key,
                order_id: order.order_id.clone(),
                order_date: order.order_date,
                commission_usd,
                status: order.status,
            });
        }

        for (key, count) in superseded {
            self.push(
                &key,
                Diagnostic::new(
                    DiagnosticKind::SupersededRows,
                    format!("{} re-ingested order(s) superseded", count),
                ),
            );
        }
    }

    fn exclude(
        &mut self,
        key: &JoinKey,
        kind: DiagnosticKind,
        err: &CampaignError,
        reason: &'static str,
    ) {
        warn!(key = %key, reason, error = %err, "Record excluded from aggregation");
        metrics::counter!("reconcile.rows_excluded", "reason" => reason).increment(1);
        self.rows_excluded += 1;
        self.push(key, Diagnostic::new(kind, err.to_string()));
    }

    fn push(&mut self, key: &JoinKey, diagnostic: Diagnostic) {
        self.diagnostics.entry(key.clone()).or_default().push(diagnostic);
    }
}

/// Key under which findings for an undecodable campaign name are filed.
pub fn unparseable_key(campaign_name: &str) -> JoinKey {
    JoinKey {
        merchant_id: campaign_name.to_string(),
        affiliate_code: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::config::AliasConfig;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn ad(name: &str, date: NaiveDate, cost: f64, currency: &str) -> AdSpendRecord {
        AdSpendRecord {
            date,
            campaign_name: name.to_string(),
            budget: 20.0,
            currency: currency.to_string(),
            impressions: 500,
            clicks: 30,
            cost,
            lost_impression_share_budget: 0.1,
            lost_impression_share_rank: 0.2,
        }
    }

    fn order(id: &str, commission: f64) -> CommissionOrder {
        CommissionOrder {
            order_id: id.to_string(),
            merchant_id_or_slug: "12345".to_string(),
            affiliate_code: "RW".to_string(),
            commission,
            currency: "USD".to_string(),
            status: OrderStatus::Pending,
            order_date: day(10),
            settlement_date: None,
            paid_date: None,
        }
    }

    fn collect(ads: &[AdSpendRecord], orders: &[CommissionOrder]) -> Intake {
        Intake::collect(
            ads,
            orders,
            &CampaignNameParser::default(),
            &CurrencyTable::default(),
            &AliasTable::new(&AliasConfig::default()),
        )
    }

    #[test]
    fn test_converts_and_tags_rows() {
        let intake = collect(&[ad("0901-RW-US-12345", day(10), 100.0, "CNY")], &[]);
        assert_eq!(intake.ad_rows.len(), 1);
        let row = &intake.ad_rows[0];
        assert_eq!(row.key, JoinKey::new("12345", "rw"));
        assert!((row.cost_usd - 14.0).abs() < 1e-9);
        assert!((row.budget_usd - 2.8).abs() < 1e-9);
        let labels = &intake.labels[&row.key];
        assert!(labels.affiliate_codes.contains("RW"));
    }

    #[test]
    fn test_unknown_currency_excluded_with_diagnostic() {
        let intake = collect(&[ad("0901-rw-US-12345", day(10), 5.0, "ZZZ")], &[]);
        assert!(intake.ad_rows.is_empty());
        assert_eq!(intake.rows_excluded, 1);
        let diags = &intake.diagnostics[&JoinKey::new("12345", "rw")];
        assert_eq!(diags[0].kind, DiagnosticKind::UnknownCurrency);
    }

    #[test]
    fn test_unparseable_rows_kept_by_raw_name() {
        let intake = collect(&[ad("brandcampaign", day(10), 5.0, "USD")], &[]);
        assert!(intake.ad_rows.is_empty());
        assert_eq!(intake.unparseable["brandcampaign"].len(), 1);
    }

    #[test]
    fn test_recollected_day_supersedes_earlier_copy() {
        let intake = collect(
            &[
                ad("0901-rw-US-12345", day(10), 5.0, "USD"),
                ad("0901-rw-US-12345", day(10), 7.0, "USD"),
            ],
            &[],
        );
        assert_eq!(intake.ad_rows.len(), 1);
        assert!((intake.ad_rows[0].cost_usd - 7.0).abs() < 1e-9);
        let diags = &intake.diagnostics[&JoinKey::new("12345", "rw")];
        assert_eq!(diags[0].kind, DiagnosticKind::SupersededRows);
    }

    #[test]
    fn test_reingested_order_supersedes() {
        let mut updated = order("A-1", 3.0);
        updated.status = OrderStatus::Approved;
        let intake = collect(&[], &[order("A-1", 3.0), updated]);
        assert_eq!(intake.orders.len(), 1);
        assert_eq!(intake.orders[0].status, OrderStatus::Approved);
    }

    #[test]
    fn test_paid_unsettled_order_excluded() {
        let mut bad = order("A-2", 3.0);
        bad.status = OrderStatus::Approved;
        bad.paid_date = Some(day(15));
        let intake = collect(&[], &[bad]);
        assert!(intake.orders.is_empty());
        let diags = &intake.diagnostics[&JoinKey::new("12345", "rw")];
        assert_eq!(diags[0].kind, DiagnosticKind::OrderLifecycleViolation);
    }

    #[test]
    fn test_order_without_identity_is_unattributed() {
        let mut bad = order("A-3", 3.0);
        bad.merchant_id_or_slug = "  ".to_string();
        let intake = collect(&[], &[bad]);
        assert!(intake.orders.is_empty());
        assert_eq!(intake.unattributed.len(), 1);
        assert!(intake.diagnostics.is_empty());
    }

    #[test]
    fn test_order_reingested_under_alias_counts_once() {
        let mut renamed = order("42", 10.0);
        renamed.affiliate_code = "rewardoo".to_string();
        let intake = collect(&[], &[order("42", 10.0), renamed]);
        assert_eq!(intake.orders.len(), 1);
        assert_eq!(intake.orders[0].key, JoinKey::new("12345", "rewardoo"));
        let diags = &intake.diagnostics[&JoinKey::new("12345", "rw")];
        assert_eq!(diags[0].kind, DiagnosticKind::SupersededRows);
    }

    #[test]
    fn test_duplicate_orders_without_identity_stay_unattributed() {
        let mut first = order("A-4", 3.0);
        first.affiliate_code = String::new();
        let second = first.clone();
        let intake = collect(&[], &[first, second]);
        assert!(intake.orders.is_empty());
        assert_eq!(intake.unattributed.len(), 2);
        assert_eq!(intake.rows_excluded, 2);
        assert!(intake.diagnostics.is_empty());
    }
}
