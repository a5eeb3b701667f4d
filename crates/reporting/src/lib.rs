//! Campaign performance reconciliation: joins ad spend with affiliate
//! commission per campaign key, then grades each campaign and recommends
//! a bid/budget action.

pub mod actions;
pub mod currency;
pub mod engine;
pub mod grading;
pub mod history;
pub mod identity;
pub mod intake;
pub mod reconcile;
pub mod sample;
pub mod summary;
pub mod window;

pub use actions::ActionRecommender;
pub use currency::CurrencyTable;
pub use engine::{report_id, Analysis, ReconciliationEngine};
pub use grading::GradeEngine;
pub use history::{diff_reports, ChangeKind, ReportHistory, VerdictChange};
pub use identity::{parse_campaign_name, CampaignNameParser};
pub use reconcile::{AliasTable, Reconciler};
pub use sample::classify_sample;
pub use summary::PortfolioSummary;
pub use window::RollingWindow;
