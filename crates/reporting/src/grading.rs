//! Grade & stage engine: the S/B/D decision list and the lifecycle stage
//! tag derived alongside it.
//!
//! Rules are evaluated in a fixed order:
//!
//! 1. D (kill): zero conservative EPC on any sample; on a green sample
//!    only, non-positive ROI, a CPC inversion of at least the margin with
//!    weak ROI, or zero orders on a large click count.
//! 2. S (scale): strong ROI, not inverted, enough order days, green sample.
//! 3. B (hold/adjust): everything else.
//!
//! A thin sample can therefore never produce a kill on its own.

use campaign_core::config::GradingConfig;
use campaign_core::types::{CampaignMetric, CampaignVerdict, Grade, SampleTier, StageLabel};

pub struct GradeEngine<'a> {
    config: &'a GradingConfig,
    window_days: u32,
}

impl<'a> GradeEngine<'a> {
    pub fn new(config: &'a GradingConfig, window_days: u32) -> Self {
        Self {
            config,
            window_days,
        }
    }

    pub fn grade(&self, metric: &CampaignMetric, sample_tier: SampleTier) -> CampaignVerdict {
        let (grade, reasons) = self.decide(metric, sample_tier);
        CampaignVerdict {
            sample_tier,
            grade: Some(grade),
            stage_label: Some(self.stage(grade, metric)),
            reasons,
        }
    }

    fn decide(&self, metric: &CampaignMetric, tier: SampleTier) -> (Grade, Vec<String>) {
        let cfg = self.config;

        // EPC is unmeasurable without clicks or spend; covers commission-only
        // keys. Spend that bought no clicks still falls through to the kill list.
        if metric.clicks_7d == 0 && metric.cost_usd_7d == 0.0 {
            return (Grade::B, vec!["no click volume in window".to_string()]);
        }

        let mut kill = Vec::new();
        if metric.conservative_epc == 0.0 {
            kill.push("no commission signal".to_string());
        }
        if tier == SampleTier::Green {
            if metric.roi <= 0.0 {
                kill.push(format!("non-positive roi ({:.2})", metric.roi));
            }
            if metric.inversion >= cfg.kill_inversion_margin && metric.roi < cfg.kill_inversion_max_roi {
                kill.push(format!(
                    "cpc inverted by {:.2} over conservative epc with roi {:.2} < {}",
                    metric.inversion, metric.roi, cfg.kill_inversion_max_roi
                ));
            }
            if metric.clicks_7d >= cfg.kill_zero_order_clicks && metric.orders_7d == 0 {
                kill.push(format!("zero orders on ≥{} clicks", cfg.kill_zero_order_clicks));
            }
        }
        if !kill.is_empty() {
            return (Grade::D, kill);
        }

        if metric.roi >= cfg.scale_min_roi
            && !metric.is_inverted()
            && metric.order_days_7d >= cfg.scale_min_order_days
            && tier == SampleTier::Green
        {
            return (
                Grade::S,
                vec![format!(
                    "roi {:.2} ≥ {} over {} order days on green sample",
                    metric.roi, cfg.scale_min_roi, metric.order_days_7d
                )],
            );
        }

        let reason = if tier != SampleTier::Green {
            format!(
                "{:?} sample ({:.1} clicks/day) too thin to kill or scale",
                tier, metric.avg_daily_clicks
            )
            .to_lowercase()
        } else if metric.is_inverted() {
            format!("cpc exceeds conservative epc by {:.2}", metric.inversion)
        } else if metric.roi < cfg.scale_min_roi {
            format!("roi {:.2} below scale threshold {}", metric.roi, cfg.scale_min_roi)
        } else {
            format!(
                "{} order days below scale threshold {}",
                metric.order_days_7d, cfg.scale_min_order_days
            )
        };
        (Grade::B, vec![reason])
    }

    /// The single grade/history -> stage mapping. D always maps to K1.
    pub fn stage(&self, grade: Grade, metric: &CampaignMetric) -> StageLabel {
        if grade == Grade::D {
            return StageLabel::K1;
        }
        if metric.age_days.is_some_and(|age| age < self.window_days as i64) {
            return StageLabel::T1;
        }
        if metric.order_days_7d >= self.config.mature_order_days {
            StageLabel::S1
        } else if metric.order_days_7d >= self.config.candidate_order_days {
            StageLabel::P1
        } else {
            StageLabel::T2
        }
    }
}
