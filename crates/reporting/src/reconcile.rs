//! Reconciler: full outer join of the ad-spend and commission aggregates
//! on `(merchant_id, affiliate_code)`, producing one [`CampaignMetric`]
//! per key.
//!
//! Affiliate networks name themselves inconsistently across sources
//! (`RW` on the ads side, `rewardoo` in the network export). Codes are
//! mapped through an explicit [`AliasTable`] before joining; there is no
//! fuzzy matching.

use crate::window::{AdAggregate, CommissionAggregate, RollingWindow};
use campaign_core::config::AliasConfig;
use campaign_core::types::{CampaignMetric, JoinKey};
use std::collections::{BTreeMap, BTreeSet};

/// Raw affiliate code -> canonical code, both lower-cased.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new(config: &AliasConfig) -> Self {
        let aliases = config
            .affiliates
            .iter()
            .map(|(raw, canonical)| {
                (raw.trim().to_lowercase(), canonical.trim().to_lowercase())
            })
            .collect();
        Self { aliases }
    }

    pub fn canonical_code(&self, code: &str) -> String {
        let code = code.trim().to_lowercase();
        self.aliases.get(&code).cloned().unwrap_or(code)
    }

    pub fn canonical_key(&self, key: &JoinKey) -> JoinKey {
        JoinKey {
            merchant_id: key.merchant_id.clone(),
            affiliate_code: self.canonical_code(&key.affiliate_code),
        }
    }
}

/// One joined campaign: its metric plus the campaign names behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledCampaign {
    pub key: JoinKey,
    pub metric: CampaignMetric,
    pub campaign_names: BTreeSet<String>,
    pub has_commission: bool,
}

pub struct Reconciler<'a> {
    aliases: &'a AliasTable,
    window: RollingWindow,
    epc_conservatism: f64,
}

impl<'a> Reconciler<'a> {
    pub fn new(aliases: &'a AliasTable, window: RollingWindow, epc_conservatism: f64) -> Self {
        Self {
            aliases,
            window,
            epc_conservatism,
        }
    }

    /// Join both sides. A key present on only one side is a valid
    /// ad-only or commission-only campaign, never an error. Ad history
    /// from before the window only dates a key that is active in it.
    pub fn reconcile(
        &self,
        ads: &BTreeMap<JoinKey, AdAggregate>,
        commissions: &BTreeMap<JoinKey, CommissionAggregate>,
    ) -> Vec<ReconciledCampaign> {
        let mut ad_side: BTreeMap<JoinKey, AdAggregate> = BTreeMap::new();
        for (key, agg) in ads {
            ad_side
                .entry(self.aliases.canonical_key(key))
                .or_default()
                .merge(agg);
        }
        let mut commission_side: BTreeMap<JoinKey, CommissionAggregate> = BTreeMap::new();
        for (key, agg) in commissions {
            commission_side
                .entry(self.aliases.canonical_key(key))
                .or_default()
                .merge(agg);
        }

        let keys: BTreeSet<&JoinKey> = ad_side
            .iter()
            .filter(|(_, agg)| agg.has_spend_in_window())
            .map(|(key, _)| key)
            .chain(commission_side.keys())
            .collect();
        let empty_ads = AdAggregate::default();
        let empty_commission = CommissionAggregate::default();

        keys.into_iter()
            .map(|key| {
                let ad = ad_side.get(key).unwrap_or(&empty_ads);
                let commission = commission_side.get(key);
                ReconciledCampaign {
                    key: key.clone(),
                    metric: self.metric(ad, commission.unwrap_or(&empty_commission)),
                    campaign_names: ad.campaign_names.clone(),
                    has_commission: commission.is_some(),
                }
            })
            .collect()
    }

    /// Derive rate metrics from one key's joined aggregates.
    pub fn metric(&self, ad: &AdAggregate, commission: &CommissionAggregate) -> CampaignMetric {
        let clicks = ad.clicks;
        let cost = ad.cost_usd;
        let revenue = commission.commission_usd;

        let cpc = if clicks > 0 { cost / clicks as f64 } else { 0.0 };
        let conservative_epc = if clicks > 0 {
            revenue / clicks as f64 * self.epc_conservatism
        } else {
            0.0
        };
        let roi = if cost > 0.0 { (revenue - cost) / cost } else { 0.0 };
        let as_of = self.window.end + chrono::Duration::days(1);

        CampaignMetric {
            window_start: self.window.start,
            window_end: self.window.end,
            clicks_7d: clicks,
            impressions_7d: ad.impressions,
            cost_usd_7d: cost,
            budget_usd: ad.budget_usd,
            commission_usd_7d: revenue,
            rejected_commission_usd_7d: commission.rejected_commission_usd,
            orders_7d: commission.orders,
            order_days_7d: commission.order_days.len() as u32,
            ad_days_7d: ad.ad_days.len() as u32,
            avg_daily_clicks: clicks as f64 / self.window.days as f64,
            cpc,
            conservative_epc,
            roi,
            inversion: cpc - conservative_epc,
            lost_share_budget: ad.lost_share_budget,
            lost_share_rank: ad.lost_share_rank,
            has_ad_spend: ad.has_spend_in_window(),
            first_ad_date: ad.first_seen,
            age_days: ad.first_seen.map(|d| (as_of - d).num_days()),
        }
    }
}
