use crate::error::{CampaignError, CampaignResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root configuration for the reconciliation engine. Loaded from an
/// optional TOML file and environment variables with the prefix
/// `CAMPAIGN_REVIEW__`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub sample: SampleConfig,
    #[serde(default)]
    pub grading: GradingConfig,
    #[serde(default)]
    pub action: ActionConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub aliases: AliasConfig,
    #[serde(default)]
    pub naming: NamingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Trailing days ending the day before as-of.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Average daily clicks below this are red.
    #[serde(default = "default_red_below")]
    pub red_below: f64,
    /// Average daily clicks above this are green.
    #[serde(default = "default_green_above")]
    pub green_above: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    /// Multiplier applied to raw EPC to get conservative EPC.
    #[serde(default = "default_epc_conservatism")]
    pub epc_conservatism: f64,
    #[serde(default = "default_scale_min_roi")]
    pub scale_min_roi: f64,
    #[serde(default = "default_scale_min_order_days")]
    pub scale_min_order_days: u32,
    #[serde(default = "default_kill_inversion_margin")]
    pub kill_inversion_margin: f64,
    #[serde(default = "default_kill_inversion_max_roi")]
    pub kill_inversion_max_roi: f64,
    #[serde(default = "default_kill_zero_order_clicks")]
    pub kill_zero_order_clicks: u64,
    #[serde(default = "default_candidate_order_days")]
    pub candidate_order_days: u32,
    #[serde(default = "default_mature_order_days")]
    pub mature_order_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Red-line CPC = conservative EPC × this.
    #[serde(default = "default_red_line_factor")]
    pub red_line_factor: f64,
    /// Target bid for rank-limited S campaigns = red line × this.
    #[serde(default = "default_bid_raise_factor")]
    pub bid_raise_factor: f64,
    #[serde(default = "default_lost_budget_high")]
    pub lost_budget_high: f64,
    #[serde(default = "default_lost_budget_mid")]
    pub lost_budget_mid: f64,
    #[serde(default = "default_lost_rank_high")]
    pub lost_rank_high: f64,
    #[serde(default = "default_budget_double")]
    pub budget_double: f64,
    #[serde(default = "default_budget_step")]
    pub budget_step: f64,
}

/// Static currency table. Rates are USD per one unit of the currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    #[serde(default = "default_rate_version")]
    pub version: String,
    #[serde(default = "default_rates")]
    pub rates: BTreeMap<String, f64>,
}

/// Maps raw affiliate codes to a canonical code before joining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasConfig {
    #[serde(default = "default_affiliate_aliases")]
    pub affiliates: BTreeMap<String, String>,
}

/// Token positions inside a hyphen-delimited campaign name. The merchant
/// is always the last token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "default_affiliate_index")]
    pub affiliate_index: usize,
    #[serde(default = "default_creation_tag_index")]
    pub creation_tag_index: usize,
    #[serde(default = "default_country_index")]
    pub country_index: usize,
}

// Default functions
fn default_window_days() -> u32 {
    7
}
fn default_red_below() -> f64 {
    10.0
}
fn default_green_above() -> f64 {
    25.0
}
fn default_epc_conservatism() -> f64 {
    0.8
}
fn default_scale_min_roi() -> f64 {
    3.0
}
fn default_scale_min_order_days() -> u32 {
    5
}
fn default_kill_inversion_margin() -> f64 {
    0.05
}
fn default_kill_inversion_max_roi() -> f64 {
    1.0
}
fn default_kill_zero_order_clicks() -> u64 {
    100
}
fn default_candidate_order_days() -> u32 {
    2
}
fn default_mature_order_days() -> u32 {
    5
}
fn default_red_line_factor() -> f64 {
    0.7
}
fn default_bid_raise_factor() -> f64 {
    0.9
}
fn default_lost_budget_high() -> f64 {
    0.6
}
fn default_lost_budget_mid() -> f64 {
    0.4
}
fn default_lost_rank_high() -> f64 {
    0.6
}
fn default_budget_double() -> f64 {
    2.0
}
fn default_budget_step() -> f64 {
    1.3
}
fn default_rate_version() -> String {
    "2026-01".to_string()
}
fn default_rates() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("USD".to_string(), 1.0),
        ("CNY".to_string(), 0.14),
    ])
}
fn default_affiliate_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([("rw".to_string(), "rewardoo".to_string())])
}
fn default_affiliate_index() -> usize {
    1
}
fn default_creation_tag_index() -> usize {
    0
}
fn default_country_index() -> usize {
    2
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            red_below: default_red_below(),
            green_above: default_green_above(),
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            epc_conservatism: default_epc_conservatism(),
            scale_min_roi: default_scale_min_roi(),
            scale_min_order_days: default_scale_min_order_days(),
            kill_inversion_margin: default_kill_inversion_margin(),
            kill_inversion_max_roi: default_kill_inversion_max_roi(),
            kill_zero_order_clicks: default_kill_zero_order_clicks(),
            candidate_order_days: default_candidate_order_days(),
            mature_order_days: default_mature_order_days(),
        }
    }
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            red_line_factor: default_red_line_factor(),
            bid_raise_factor: default_bid_raise_factor(),
            lost_budget_high: default_lost_budget_high(),
            lost_budget_mid: default_lost_budget_mid(),
            lost_rank_high: default_lost_rank_high(),
            budget_double: default_budget_double(),
            budget_step: default_budget_step(),
        }
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            version: default_rate_version(),
            rates: default_rates(),
        }
    }
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            affiliates: default_affiliate_aliases(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            affiliate_index: default_affiliate_index(),
            creation_tag_index: default_creation_tag_index(),
            country_index: default_country_index(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            sample: SampleConfig::default(),
            grading: GradingConfig::default(),
            action: ActionConfig::default(),
            currency: CurrencyConfig::default(),
            aliases: AliasConfig::default(),
            naming: NamingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables only.
    pub fn load() -> CampaignResult<Self> {
        Self::build(None)
    }

    /// Load configuration from a TOML file, with environment overrides.
    pub fn load_from(path: &Path) -> CampaignResult<Self> {
        Self::build(Some(path))
    }

    fn build(path: Option<&Path>) -> CampaignResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_REVIEW")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        tracing::debug!(
            window_days = config.window.window_days,
            rate_table = %config.currency.version,
            aliases = config.aliases.affiliates.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Reject threshold combinations the engine cannot act on.
    pub fn validate(&self) -> CampaignResult<()> {
        if self.window.window_days == 0 {
            return Err(CampaignError::Config("window.window_days must be >= 1".into()));
        }
        if self.sample.red_below > self.sample.green_above {
            return Err(CampaignError::Config(format!(
                "sample.red_below ({}) exceeds sample.green_above ({})",
                self.sample.red_below, self.sample.green_above
            )));
        }
        if self.action.lost_budget_mid > self.action.lost_budget_high {
            return Err(CampaignError::Config(format!(
                "action.lost_budget_mid ({}) exceeds action.lost_budget_high ({})",
                self.action.lost_budget_mid, self.action.lost_budget_high
            )));
        }
        for (name, value) in [
            ("grading.epc_conservatism", self.grading.epc_conservatism),
            ("action.red_line_factor", self.action.red_line_factor),
            ("action.bid_raise_factor", self.action.bid_raise_factor),
            ("action.budget_double", self.action.budget_double),
            ("action.budget_step", self.action.budget_step),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CampaignError::Config(format!("{} must be > 0, got {}", name, value)));
            }
        }
        for (code, rate) in &self.currency.rates {
            if !(rate.is_finite() && *rate > 0.0) {
                return Err(CampaignError::Config(format!(
                    "currency rate for {} must be > 0, got {}",
                    code, rate
                )));
            }
        }
        let usd = self
            .currency
            .rates
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case("USD"))
            .map(|(_, rate)| *rate);
        if usd != Some(1.0) {
            return Err(CampaignError::Config(
                "currency table must map USD to exactly 1.0".into(),
            ));
        }
        Ok(())
    }
}
