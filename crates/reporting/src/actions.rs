//! Action recommender: turns a verdict plus lost-impression-share
//! diagnostics into a concrete bid/budget change.

use campaign_core::config::ActionConfig;
use campaign_core::types::{
    Action, ActionKind, CampaignMetric, CampaignVerdict, Grade, SampleTier,
};

const EPSILON: f64 = 1e-9;

pub struct ActionRecommender<'a> {
    config: &'a ActionConfig,
    window_days: u32,
}

impl<'a> ActionRecommender<'a> {
    pub fn new(config: &'a ActionConfig, window_days: u32) -> Self {
        Self {
            config,
            window_days,
        }
    }

    /// Highest CPC that still keeps the minimum margin over conservative EPC.
    pub fn red_line_cpc(&self, metric: &CampaignMetric) -> f64 {
        metric.conservative_epc * self.config.red_line_factor
    }

    pub fn recommend(&self, metric: &CampaignMetric, verdict: &CampaignVerdict) -> Action {
        let grade = match verdict.grade {
            None => {
                return Action::without_numbers(ActionKind::None, "no grade, identity unresolved")
            }
            Some(Grade::D) => {
                return Action::without_numbers(ActionKind::Pause, "pause campaign")
            }
            Some(grade) => grade,
        };
        if metric.clicks_7d == 0 {
            return Action::without_numbers(ActionKind::None, "no click volume to act on");
        }

        let cfg = self.config;
        let red_line = self.red_line_cpc(metric);
        let budget = metric.budget_usd;
        let mut new_cpc = metric.cpc;
        let mut budget_factor = 1.0;
        let mut notes = Vec::new();

        if grade == Grade::S {
            if metric.lost_share_budget > cfg.lost_budget_high {
                budget_factor = cfg.budget_double;
                notes.push(format!(
                    "lost {:.0}% impressions to budget: budget x{}",
                    metric.lost_share_budget * 100.0,
                    cfg.budget_double
                ));
            } else if metric.lost_share_budget > cfg.lost_budget_mid {
                budget_factor = cfg.budget_step;
                notes.push(format!(
                    "lost {:.0}% impressions to budget: budget x{}",
                    metric.lost_share_budget * 100.0,
                    cfg.budget_step
                ));
            }
            if metric.lost_share_rank > cfg.lost_rank_high {
                let target = red_line * cfg.bid_raise_factor;
                if target > metric.cpc {
                    new_cpc = target;
                    notes.push(format!(
                        "lost {:.0}% impressions to rank: raise cpc to {:.2}",
                        metric.lost_share_rank * 100.0,
                        target
                    ));
                } else {
                    notes.push(format!(
                        "rank-limited but cpc {:.2} already at or above {:.2}",
                        metric.cpc, target
                    ));
                }
            }
        } else {
            if metric.is_inverted() {
                new_cpc = red_line;
                notes.push(format!("inverted: drop cpc to red line {:.2}", red_line));
            }
            if matches!(verdict.sample_tier, SampleTier::Red | SampleTier::Yellow) {
                budget_factor = cfg.budget_step;
                notes.push(format!("thin sample: budget x{} to buy data", cfg.budget_step));
            }
        }

        if budget <= 0.0 && (budget_factor - 1.0).abs() > EPSILON {
            notes.push("unbudgeted in window: budget change not computed".to_string());
        }

        let new_budget = budget * budget_factor;
        let budget_delta_pct = if budget > 0.0 {
            (new_budget / budget - 1.0) * 100.0
        } else {
            0.0
        };
        let changed =
            (new_cpc - metric.cpc).abs() > EPSILON || (new_budget - budget).abs() > EPSILON;
        if !changed && notes.is_empty() {
            notes.push("hold current settings".to_string());
        }

        let (expected_daily_clicks, expected_roi) = self.project(metric, new_cpc, new_budget);

        Action {
            kind: if changed {
                ActionKind::Adjust
            } else {
                ActionKind::Hold
            },
            new_cpc: Some(new_cpc),
            new_budget: Some(new_budget),
            budget_delta_pct: Some(budget_delta_pct),
            expected_daily_clicks: Some(expected_daily_clicks),
            expected_roi: Some(expected_roi),
            notes,
        }
    }

    /// Linear projection: spend scales with budget, clicks follow the new CPC.
    fn project(&self, metric: &CampaignMetric, new_cpc: f64, new_budget: f64) -> (f64, f64) {
        let daily_spend = metric.cost_usd_7d / self.window_days.max(1) as f64;
        let budget_ratio = if metric.budget_usd > 0.0 {
            new_budget / metric.budget_usd
        } else {
            1.0
        };
        let projected_spend = daily_spend * budget_ratio;

        if new_cpc > 0.0 {
            (
                projected_spend / new_cpc,
                (metric.conservative_epc - new_cpc) / new_cpc,
            )
        } else {
            (metric.avg_daily_clicks, 0.0)
        }
    }
}
