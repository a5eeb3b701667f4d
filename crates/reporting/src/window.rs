//! Rolling-window aggregation of daily ad-spend rows and commission orders.
//!
//! The window is `[as_of - window_days, as_of - 1]`: yesterday and the
//! days before it. The as-of day itself is never counted.

use crate::intake::{AdRow, OrderRow};
use campaign_core::types::{JoinKey, OrderStatus};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Inclusive date range covered by an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
}

impl RollingWindow {
    pub fn trailing(as_of: NaiveDate, window_days: u32) -> Self {
        let days = window_days.max(1);
        Self {
            start: as_of - Duration::days(days as i64),
            end: as_of - Duration::days(1),
            days,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Sum cost/clicks/impressions, take the highest budget, and keep the
    /// lost-share readings of the most recent day. Keys with rows only
    /// before the window are still returned, with zero totals.
    pub fn aggregate_ads(&self, rows: &[AdRow]) -> BTreeMap<JoinKey, AdAggregate> {
        let mut out: BTreeMap<JoinKey, AdAggregate> = BTreeMap::new();
        for row in rows.iter().filter(|r| r.date <= self.end) {
            let agg = out.entry(row.key.clone()).or_default();
            agg.observe(row, self);
        }
        out
    }

    /// Sum non-rejected commission and count orders and distinct order days
    /// regardless of status.
    pub fn aggregate_orders(&self, orders: &[OrderRow]) -> BTreeMap<JoinKey, CommissionAggregate> {
        let mut out: BTreeMap<JoinKey, CommissionAggregate> = BTreeMap::new();
        for order in orders.iter().filter(|o| self.contains(o.order_date)) {
            out.entry(order.key.clone()).or_default().observe(order);
        }
        out
    }
}

/// Ad-side totals for one key. An aggregate over no in-window rows is all
/// zeros, never missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdAggregate {
    pub clicks: u64,
    pub impressions: u64,
    pub cost_usd: f64,
    pub budget_usd: f64,
    pub ad_days: BTreeSet<NaiveDate>,
    pub latest_day: Option<NaiveDate>,
    pub lost_share_budget: f64,
    pub lost_share_rank: f64,
    /// Earliest row on or before the window end, inside the window or not.
    pub first_seen: Option<NaiveDate>,
    pub campaign_names: BTreeSet<String>,
}

impl AdAggregate {
    fn observe(&mut self, row: &AdRow, window: &RollingWindow) {
        self.first_seen = Some(self.first_seen.map_or(row.date, |d| d.min(row.date)));
        self.campaign_names.insert(row.campaign_name.clone());
        if !window.contains(row.date) {
            return;
        }

        self.clicks += row.clicks;
        self.impressions += row.impressions;
        self.cost_usd += row.cost_usd;
        self.budget_usd = self.budget_usd.max(row.budget_usd);
        self.ad_days.insert(row.date);
        self.take_lost_share(row.date, row.lost_share_budget, row.lost_share_rank);
    }

    fn take_lost_share(&mut self, date: NaiveDate, budget: f64, rank: f64) {
        match self.latest_day {
            Some(latest) if date < latest => {}
            Some(latest) if date == latest => {
                // Several campaigns on the same key and day: keep the worst.
                self.lost_share_budget = self.lost_share_budget.max(budget);
                self.lost_share_rank = self.lost_share_rank.max(rank);
            }
            _ => {
                self.latest_day = Some(date);
                self.lost_share_budget = budget;
                self.lost_share_rank = rank;
            }
        }
    }

    pub fn has_spend_in_window(&self) -> bool {
        !self.ad_days.is_empty()
    }

    /// Fold another aggregate for the same canonical key into this one.
    pub fn merge(&mut self, other: &AdAggregate) {
        self.clicks += other.clicks;
        self.impressions += other.impressions;
        self.cost_usd += other.cost_usd;
        self.budget_usd = self.budget_usd.max(other.budget_usd);
        self.ad_days.extend(other.ad_days.iter().copied());
        if let Some(day) = other.latest_day {
            self.take_lost_share(day, other.lost_share_budget, other.lost_share_rank);
        }
        self.first_seen = match (self.first_seen, other.first_seen) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.campaign_names.extend(other.campaign_names.iter().cloned());
    }
}

/// Commission-side totals for one key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommissionAggregate {
    /// Pending plus approved.
    pub commission_usd: f64,
    pub rejected_commission_usd: f64,
    pub orders: u64,
    pub order_days: BTreeSet<NaiveDate>,
}

impl CommissionAggregate {
    fn observe(&mut self, order: &OrderRow) {
        match order.status {
            OrderStatus::Rejected => self.rejected_commission_usd += order.commission_usd,
            OrderStatus::Pending | OrderStatus::Approved => {
                self.commission_usd += order.commission_usd
            }
        }
        self.orders += 1;
        self.order_days.insert(order.order_date);
    }

    pub fn merge(&mut self, other: &CommissionAggregate) {
        self.commission_usd += other.commission_usd;
        self.rejected_commission_usd += other.rejected_commission_usd;
        self.orders += other.orders;
        self.order_days.extend(other.order_days.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn key() -> JoinKey {
        JoinKey::new("12345", "rw")
    }

    fn ad_row(date: NaiveDate, budget: f64, cost: f64, clicks: u64) -> AdRow {
        AdRow {
            key: key(),
            campaign_name: "0901-rw-US-12345".to_string(),
            date,
            budget_usd: budget,
            cost_usd: cost,
            impressions: clicks * 20,
            clicks,
            lost_share_budget: 0.1,
            lost_share_rank: 0.2,
        }
    }

    fn order_row(id: &str, date: NaiveDate, commission: f64, status: OrderStatus) -> OrderRow {
        OrderRow {
            key: key(),
            order_id: id.to_string(),
            order_date: date,
            commission_usd: commission,
            status,
        }
    }

    #[test]
    fn test_window_excludes_as_of_day() {
        let window = RollingWindow::trailing(day(15), 7);
        assert_eq!(window.start, day(8));
        assert_eq!(window.end, day(14));
        assert!(window.contains(day(8)));
        assert!(window.contains(day(14)));
        assert!(!window.contains(day(15)));
        assert!(!window.contains(day(7)));
    }

    #[test]
    fn test_sums_and_max_budget() {
        let window = RollingWindow::trailing(day(15), 7);
        let rows = vec![
            ad_row(day(8), 30.0, 10.0, 20),
            ad_row(day(12), 50.0, 12.5, 25),
            ad_row(day(14), 40.0, 7.5, 15),
            // As-of day and earlier history do not count.
            ad_row(day(15), 500.0, 100.0, 200),
            ad_row(day(1), 900.0, 100.0, 200),
        ];
        let aggs = window.aggregate_ads(&rows);
        let agg = &aggs[&key()];
        assert_eq!(agg.clicks, 60);
        assert!((agg.cost_usd - 30.0).abs() < 1e-9);
        assert!((agg.budget_usd - 50.0).abs() < 1e-9);
        assert_eq!(agg.ad_days.len(), 3);
        assert_eq!(agg.latest_day, Some(day(14)));
        assert_eq!(agg.first_seen, Some(day(1)));
    }

    #[test]
    fn test_no_rows_in_window_is_zero_not_missing() {
        let window = RollingWindow::trailing(day(15), 7);
        let aggs = window.aggregate_ads(&[ad_row(day(2), 80.0, 20.0, 40)]);
        let agg = &aggs[&key()];
        assert_eq!(agg.budget_usd, 0.0);
        assert_eq!(agg.cost_usd, 0.0);
        assert_eq!(agg.clicks, 0);
        assert!(!agg.has_spend_in_window());

        let empty = AdAggregate::default();
        assert_eq!(empty.budget_usd, 0.0);
        assert!(!empty.budget_usd.is_nan());
    }

    #[test]
    fn test_lost_share_from_latest_day() {
        let window = RollingWindow::trailing(day(15), 7);
        let mut early = ad_row(day(9), 10.0, 1.0, 1);
        early.lost_share_budget = 0.9;
        let mut late = ad_row(day(13), 10.0, 1.0, 1);
        late.lost_share_budget = 0.3;
        let aggs = window.aggregate_ads(&[late, early]);
        assert!((aggs[&key()].lost_share_budget - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_order_days_count_every_status() {
        let window = RollingWindow::trailing(day(15), 7);
        let orders = vec![
            order_row("1", day(9), 5.0, OrderStatus::Pending),
            order_row("2", day(9), 3.0, OrderStatus::Approved),
            order_row("3", day(11), 4.0, OrderStatus::Rejected),
            order_row("4", day(15), 9.0, OrderStatus::Approved),
        ];
        let aggs = window.aggregate_orders(&orders);
        let agg = &aggs[&key()];
        assert_eq!(agg.orders, 3);
        assert_eq!(agg.order_days.len(), 2);
        assert!((agg.commission_usd - 8.0).abs() < 1e-9);
        assert!((agg.rejected_commission_usd - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_ad_aggregates() {
        let window = RollingWindow::trailing(day(15), 7);
        let a = window.aggregate_ads(&[ad_row(day(10), 20.0, 5.0, 10)]);
        let mut b_row = ad_row(day(12), 35.0, 6.0, 12);
        b_row.campaign_name = "0902-rewardoo-US-12345".to_string();
        let b = window.aggregate_ads(&[b_row]);

        let mut merged = a[&key()].clone();
        merged.merge(&b[&key()]);
        assert_eq!(merged.clicks, 22);
        assert!((merged.budget_usd - 35.0).abs() < 1e-9);
        assert_eq!(merged.latest_day, Some(day(12)));
        assert_eq!(merged.campaign_names.len(), 2);
        assert_eq!(merged.first_seen, Some(day(10)));
    }
}
