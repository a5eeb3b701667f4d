use crate::error::{CampaignError, CampaignResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ─── Input rows ─────────────────────────────────────────────────────────────

/// One Google Ads report row: a single campaign on a single day.
///
/// Monetary fields are in `currency`; the engine normalizes them to USD.
/// Columns beyond these are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdSpendRecord {
    pub date: NaiveDate,
    pub campaign_name: String,
    #[serde(default)]
    pub budget: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub cost: f64,
    /// Fraction (0–1) of impressions lost to budget.
    #[serde(default)]
    pub lost_impression_share_budget: f64,
    /// Fraction (0–1) of impressions lost to ad rank.
    #[serde(default)]
    pub lost_impression_share_rank: f64,
}

impl AdSpendRecord {
    /// Reject rows whose numbers cannot be aggregated safely.
    pub fn validate(&self) -> CampaignResult<()> {
        if !self.cost.is_finite() || self.cost < 0.0 {
            return Err(CampaignError::InvalidRecord(format!(
                "{} on {}: cost {} is not a non-negative amount",
                self.campaign_name, self.date, self.cost
            )));
        }
        if !self.budget.is_finite() || self.budget < 0.0 {
            return Err(CampaignError::InvalidRecord(format!(
                "{} on {}: budget {} is not a non-negative amount",
                self.campaign_name, self.date, self.budget
            )));
        }
        for (field, value) in [
            ("lost_impression_share_budget", self.lost_impression_share_budget),
            ("lost_impression_share_rank", self.lost_impression_share_rank),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(CampaignError::InvalidRecord(format!(
                    "{} on {}: {} {} outside [0, 1]",
                    self.campaign_name, self.date, field, value
                )));
            }
        }
        Ok(())
    }
}

/// Lifecycle status an affiliate network reports for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[serde(alias = "Pending", alias = "PENDING")]
    Pending,
    #[serde(alias = "Approved", alias = "APPROVED")]
    Approved,
    #[serde(alias = "Rejected", alias = "REJECTED")]
    Rejected,
}

/// One order row pulled from an affiliate network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionOrder {
    /// Unique per network account.
    pub order_id: String,
    #[serde(alias = "merchant_id", alias = "merchant_slug")]
    pub merchant_id_or_slug: String,
    pub affiliate_code: String,
    pub commission: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub status: OrderStatus,
    pub order_date: NaiveDate,
    #[serde(default)]
    pub settlement_date: Option<NaiveDate>,
    #[serde(default)]
    pub paid_date: Option<NaiveDate>,
}

impl CommissionOrder {
    /// A paid order must be settled and approved.
    pub fn validate(&self) -> CampaignResult<()> {
        if !self.commission.is_finite() {
            return Err(CampaignError::InvalidRecord(format!(
                "order {}: commission {} is not finite",
                self.order_id, self.commission
            )));
        }
        if self.paid_date.is_some() {
            if self.settlement_date.is_none() {
                return Err(CampaignError::OrderLifecycle {
                    order_id: self.order_id.clone(),
                    detail: "paid without a settlement date".to_string(),
                });
            }
            if self.status != OrderStatus::Approved {
                return Err(CampaignError::OrderLifecycle {
                    order_id: self.order_id.clone(),
                    detail: format!("paid while status is {:?}", self.status),
                });
            }
        }
        Ok(())
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

// ─── Identity ───────────────────────────────────────────────────────────────

/// Identity decoded from an encoded campaign name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignKey {
    pub merchant_id: String,
    /// Affiliate code as written in the campaign name.
    pub affiliate_code: String,
    pub country: Option<String>,
    pub creation_tag: Option<String>,
}

impl CampaignKey {
    pub fn join_key(&self) -> JoinKey {
        JoinKey::new(&self.merchant_id, &self.affiliate_code)
    }
}

/// Case-insensitive `(merchant_id, affiliate_code)` pair used to join the
/// ad-spend and commission streams. Ordered so report output is stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JoinKey {
    pub merchant_id: String,
    pub affiliate_code: String,
}

impl JoinKey {
    pub fn new(merchant_id: &str, affiliate_code: &str) -> Self {
        Self {
            merchant_id: merchant_id.trim().to_lowercase(),
            affiliate_code: affiliate_code.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.merchant_id, self.affiliate_code)
    }
}

// ─── Classification ─────────────────────────────────────────────────────────

/// Confidence bucket derived from average daily click volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleTier {
    Red,
    Yellow,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    /// Scale budget.
    S,
    /// Hold or adjust.
    B,
    /// Kill.
    D,
}

/// Lifecycle tag used by the UI to navigate campaigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageLabel {
    T1,
    T2,
    P1,
    S1,
    K1,
}

impl StageLabel {
    pub fn name(&self) -> &'static str {
        match self {
            StageLabel::T1 => "trial",
            StageLabel::T2 => "watch",
            StageLabel::P1 => "candidate",
            StageLabel::S1 => "mature",
            StageLabel::K1 => "kill",
        }
    }

    pub fn name_zh(&self) -> &'static str {
        match self {
            StageLabel::T1 => "试水",
            StageLabel::T2 => "观察",
            StageLabel::P1 => "候选",
            StageLabel::S1 => "成熟",
            StageLabel::K1 => "关停",
        }
    }
}

// ─── Derived metrics ────────────────────────────────────────────────────────

/// Rolling-window performance for one `(merchant_id, affiliate_code)`.
/// All money is USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignMetric {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub clicks_7d: u64,
    pub impressions_7d: u64,
    pub cost_usd_7d: f64,
    /// Highest daily budget seen in the window; 0 when unbudgeted.
    pub budget_usd: f64,
    /// Pending plus approved commission.
    pub commission_usd_7d: f64,
    pub rejected_commission_usd_7d: f64,
    pub orders_7d: u64,
    pub order_days_7d: u32,
    pub ad_days_7d: u32,
    pub avg_daily_clicks: f64,
    pub cpc: f64,
    pub conservative_epc: f64,
    pub roi: f64,
    /// `cpc - conservative_epc`; positive means each click loses money.
    pub inversion: f64,
    pub lost_share_budget: f64,
    pub lost_share_rank: f64,
    pub has_ad_spend: bool,
    pub first_ad_date: Option<NaiveDate>,
    pub age_days: Option<i64>,
}

impl CampaignMetric {
    pub fn is_inverted(&self) -> bool {
        self.inversion > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignVerdict {
    pub sample_tier: SampleTier,
    /// `None` when the campaign identity could not be recovered.
    pub grade: Option<Grade>,
    pub stage_label: Option<StageLabel>,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Pause,
    Adjust,
    Hold,
    None,
}

/// Concrete recommendation. Numbers are absent for `pause` and `none`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub new_cpc: Option<f64>,
    pub new_budget: Option<f64>,
    pub budget_delta_pct: Option<f64>,
    pub expected_daily_clicks: Option<f64>,
    pub expected_roi: Option<f64>,
    pub notes: Vec<String>,
}

impl Action {
    pub fn without_numbers(kind: ActionKind, note: impl Into<String>) -> Self {
        Self {
            kind,
            new_cpc: None,
            new_budget: None,
            budget_delta_pct: None,
            expected_daily_clicks: None,
            expected_roi: None,
            notes: vec![note.into()],
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnparseableIdentity,
    UnknownCurrency,
    InvalidRecord,
    OrderLifecycleViolation,
    UnbudgetedInWindow,
    NoAdSpend,
    NoCommission,
    SupersededRows,
}

/// A non-fatal data-quality finding attached to the report it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Classified output for one campaign key. Field names are stable so
/// successive runs can be diffed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignReport {
    /// Derived from key and as-of date; identical across re-runs.
    pub report_id: Uuid,
    pub as_of: NaiveDate,
    /// Empty when the identity is unparseable.
    pub merchant_id: String,
    /// Canonical, lower-cased join code.
    pub affiliate_code: String,
    /// Affiliate code as written in the source data.
    pub affiliate_label: String,
    pub campaign_names: Vec<String>,
    pub metric: CampaignMetric,
    pub verdict: CampaignVerdict,
    pub action: Action,
    pub diagnostics: Vec<Diagnostic>,
}

impl CampaignReport {
    pub fn join_key(&self) -> JoinKey {
        JoinKey::new(&self.merchant_id, &self.affiliate_code)
    }

    pub fn has_diagnostic(&self, kind: DiagnosticKind) -> bool {
        self.diagnostics.iter().any(|d| d.kind == kind)
    }
}
