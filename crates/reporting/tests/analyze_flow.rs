//! End-to-end runs of the reconciliation engine over raw row sets.

use campaign_core::config::AppConfig;
use campaign_core::types::{
    ActionKind, AdSpendRecord, CampaignReport, CommissionOrder, DiagnosticKind, Grade,
    OrderStatus, SampleTier, StageLabel,
};
use campaign_reporting::{PortfolioSummary, ReconciliationEngine};
use chrono::NaiveDate;
use proptest::prelude::*;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn as_of() -> NaiveDate {
    day(15)
}

fn ad(name: &str, d: u32, clicks: u64, cost: f64, budget: f64, lost_budget: f64) -> AdSpendRecord {
    AdSpendRecord {
        date: day(d),
        campaign_name: name.to_string(),
        budget,
        currency: "USD".to_string(),
        impressions: clicks * 30,
        clicks,
        cost,
        lost_impression_share_budget: lost_budget,
        lost_impression_share_rank: 0.05,
    }
}

fn order(id: &str, merchant: &str, affiliate: &str, d: u32, commission: f64) -> CommissionOrder {
    CommissionOrder {
        order_id: id.to_string(),
        merchant_id_or_slug: merchant.to_string(),
        affiliate_code: affiliate.to_string(),
        commission,
        currency: "USD".to_string(),
        status: OrderStatus::Approved,
        order_date: day(d),
        settlement_date: None,
        paid_date: None,
    }
}

fn find<'a>(reports: &'a [CampaignReport], merchant: &str) -> &'a CampaignReport {
    reports
        .iter()
        .find(|r| r.merchant_id == merchant)
        .unwrap_or_else(|| panic!("no report for merchant {}", merchant))
}

/// Portfolio with one campaign per headline outcome.
fn portfolio() -> (Vec<AdSpendRecord>, Vec<CommissionOrder>) {
    let mut ads = Vec::new();
    let mut orders = Vec::new();

    // Scaler: 30 clicks/day at 0.80, budget-limited on the latest day.
    for d in 1..=14 {
        let lost = if d == 14 { 0.7 } else { 0.2 };
        ads.push(ad("0901-RW-US-12345", d, 30, 24.0, 30.0, lost));
    }
    for (i, d) in (8..=13).enumerate() {
        orders.push(order(&format!("s-{}", i), "12345", "rewardoo", d, 123.2));
    }

    // Thin and losing: 8 clicks/day at 1.00, one order.
    for d in 8..=14 {
        ads.push(ad("0915-pb-DE-555", d, 8, 8.0, 20.0, 0.0));
    }
    orders.push(order("t-1", "555", "PB", 10, 28.0));

    // Plenty of clicks, never an order.
    for d in 8..=14 {
        ads.push(ad("0801-lh-US-999", d, 30, 15.0, 25.0, 0.0));
    }

    // Organic: commission with no ad spend.
    orders.push(order("o-1", "777", "cj", 12, 9.0));

    (ads, orders)
}

#[test]
fn test_portfolio_outcomes() {
    let engine = ReconciliationEngine::default();
    let (ads, orders) = portfolio();
    let reports = engine.analyze(as_of(), &ads, &orders);
    assert_eq!(reports.len(), 4);

    let scaler = find(&reports, "12345");
    assert_eq!(scaler.affiliate_code, "rewardoo");
    assert_eq!(scaler.verdict.sample_tier, SampleTier::Green);
    assert_eq!(scaler.metric.clicks_7d, 210);
    assert!((scaler.metric.cpc - 0.80).abs() < 1e-9);
    assert!((scaler.metric.roi - 3.4).abs() < 1e-6);
    assert_eq!(scaler.metric.order_days_7d, 6);
    assert_eq!(scaler.verdict.grade, Some(Grade::S));
    assert_eq!(scaler.verdict.stage_label, Some(StageLabel::S1));
    assert_eq!(scaler.action.kind, ActionKind::Adjust);
    assert!((scaler.action.new_budget.unwrap() - 60.0).abs() < 1e-9);

    let thin = find(&reports, "555");
    assert_eq!(thin.verdict.sample_tier, SampleTier::Red);
    assert!((thin.metric.avg_daily_clicks - 8.0).abs() < 1e-9);
    assert!((thin.metric.roi + 0.5).abs() < 1e-9);
    assert_eq!(thin.verdict.grade, Some(Grade::B));
    assert!((thin.action.new_budget.unwrap() - 26.0).abs() < 1e-9);

    let dud = find(&reports, "999");
    assert_eq!(dud.verdict.grade, Some(Grade::D));
    assert_eq!(dud.verdict.stage_label, Some(StageLabel::K1));
    assert_eq!(dud.action.kind, ActionKind::Pause);
    assert!(dud.verdict.reasons.iter().any(|r| r == "no commission signal"));
    assert!(dud.verdict.reasons.iter().any(|r| r == "zero orders on ≥100 clicks"));
    assert!(dud.has_diagnostic(DiagnosticKind::NoCommission));

    let organic = find(&reports, "777");
    assert_eq!(organic.metric.cost_usd_7d, 0.0);
    assert_eq!(organic.metric.commission_usd_7d, 9.0);
    assert!(organic.has_diagnostic(DiagnosticKind::NoAdSpend));
    assert_eq!(organic.action.kind, ActionKind::None);
}

#[test]
fn test_rerun_is_byte_identical() {
    let engine = ReconciliationEngine::default();
    let (ads, orders) = portfolio();
    let first = serde_json::to_string(&engine.analyze(as_of(), &ads, &orders)).unwrap();
    let second = serde_json::to_string(&engine.analyze(as_of(), &ads, &orders)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_reports_ordered_by_key() {
    let engine = ReconciliationEngine::default();
    let (ads, orders) = portfolio();
    let reports = engine.analyze(as_of(), &ads, &orders);
    let keys: Vec<_> = reports.iter().map(|r| r.join_key()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn test_unknown_currency_is_never_treated_as_usd() {
    let engine = ReconciliationEngine::default();
    let ads: Vec<_> = (8..=14).map(|d| ad("0901-pb-US-321", d, 12, 6.0, 10.0, 0.0)).collect();
    let mut foreign = order("x-1", "321", "pb", 10, 500.0);
    foreign.currency = "XYZ".to_string();
    let mut yuan = order("x-2", "321", "pb", 11, 100.0);
    yuan.currency = "CNY".to_string();

    let analysis = engine.analyze_detailed(as_of(), &ads, &[foreign, yuan]);
    assert_eq!(analysis.rows_excluded, 1);
    assert_eq!(analysis.rate_table_version, "2026-01");
    let r = &analysis.reports[0];
    assert!((r.metric.commission_usd_7d - 14.0).abs() < 1e-9);
    assert_eq!(r.metric.orders_7d, 1);
    assert!(r.has_diagnostic(DiagnosticKind::UnknownCurrency));
}

#[test]
fn test_recollected_rows_supersede_earlier_copies() {
    let engine = ReconciliationEngine::default();
    let mut ads: Vec<_> = (8..=14).map(|d| ad("0901-pb-US-321", d, 12, 6.0, 10.0, 0.0)).collect();
    ads.push(ad("0901-pb-US-321", 14, 40, 20.0, 10.0, 0.0));
    let orders = vec![
        order("dup", "321", "pb", 10, 5.0),
        order("dup", "321", "PB", 10, 7.5),
    ];

    let reports = engine.analyze(as_of(), &ads, &orders);
    let r = &reports[0];
    assert_eq!(r.metric.clicks_7d, 6 * 12 + 40);
    assert_eq!(r.metric.orders_7d, 1);
    assert!((r.metric.commission_usd_7d - 7.5).abs() < 1e-9);
    assert_eq!(
        r.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::SupersededRows)
            .count(),
        2
    );
}

#[test]
fn test_rejected_commission_kept_apart() {
    let engine = ReconciliationEngine::default();
    let ads: Vec<_> = (8..=14).map(|d| ad("0901-pb-US-321", d, 12, 6.0, 10.0, 0.0)).collect();
    let mut rejected = order("r-1", "321", "pb", 9, 40.0);
    rejected.status = OrderStatus::Rejected;
    let mut pending = order("p-1", "321", "pb", 12, 10.0);
    pending.status = OrderStatus::Pending;

    let reports = engine.analyze(as_of(), &ads, &[rejected, pending]);
    let m = &reports[0].metric;
    assert!((m.commission_usd_7d - 10.0).abs() < 1e-9);
    assert!((m.rejected_commission_usd_7d - 40.0).abs() < 1e-9);
    assert_eq!(m.orders_7d, 2);
    assert_eq!(m.order_days_7d, 2);
}

#[test]
fn test_tuned_thresholds_change_grades() {
    let mut config = AppConfig::default();
    config.grading.scale_min_roi = 5.0;
    let engine = ReconciliationEngine::new(config);
    let (ads, orders) = portfolio();
    let reports = engine.analyze(as_of(), &ads, &orders);
    assert_eq!(find(&reports, "12345").verdict.grade, Some(Grade::B));
}

#[test]
fn test_summary_over_portfolio() {
    let engine = ReconciliationEngine::default();
    let (ads, orders) = portfolio();
    let summary = PortfolioSummary::from_reports(&engine.analyze(as_of(), &ads, &orders));
    assert_eq!(summary.total_campaigns, 4);
    assert_eq!(summary.grade_count(Grade::S), 1);
    assert_eq!(summary.grade_count(Grade::D), 1);
    assert_eq!(summary.grade_count(Grade::B), 2);
    assert_eq!(summary.ungraded, 0);
}

fn arb_ad() -> impl Strategy<Value = AdSpendRecord> {
    (
        prop_oneof![
            Just("0901-pb-US-100"),
            Just("0901-rw-US-200"),
            Just("0902-RW-GB-200"),
            Just("Brand Search"),
        ],
        1u32..=20,
        0u64..80,
        0.0f64..60.0,
        0.0f64..50.0,
        0.0f64..=1.0,
    )
        .prop_map(|(name, d, clicks, cost, budget, lost)| {
            ad(name, d, clicks, cost, budget, lost)
        })
}

fn arb_order() -> impl Strategy<Value = CommissionOrder> {
    (
        0u32..40,
        prop_oneof![Just("100"), Just("200"), Just("300")],
        prop_oneof![Just("pb"), Just("rewardoo"), Just("RW")],
        1u32..=20,
        0.0f64..80.0,
        prop_oneof![
            Just(OrderStatus::Pending),
            Just(OrderStatus::Approved),
            Just(OrderStatus::Rejected)
        ],
    )
        .prop_map(|(id, merchant, affiliate, d, commission, status)| {
            let mut o = order(&id.to_string(), merchant, affiliate, d, commission);
            o.status = status;
            o
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn verdict_invariants_hold(
        ads in proptest::collection::vec(arb_ad(), 0..60),
        orders in proptest::collection::vec(arb_order(), 0..30),
    ) {
        let engine = ReconciliationEngine::default();
        let reports = engine.analyze(as_of(), &ads, &orders);

        let mut keys: Vec<_> = reports
            .iter()
            .filter(|r| r.verdict.grade.is_some())
            .map(|r| r.join_key())
            .collect();
        let total = keys.len();
        keys.dedup();
        prop_assert_eq!(keys.len(), total);

        for r in &reports {
            let m = &r.metric;
            prop_assert!(m.cost_usd_7d >= 0.0);
            prop_assert!((m.avg_daily_clicks - m.clicks_7d as f64 / 7.0).abs() < 1e-9);
            if r.verdict.grade == Some(Grade::D) {
                prop_assert_eq!(r.verdict.stage_label, Some(StageLabel::K1));
                if m.conservative_epc != 0.0 {
                    prop_assert_eq!(r.verdict.sample_tier, SampleTier::Green);
                }
            }
            if r.verdict.grade.is_none() {
                prop_assert!(r.has_diagnostic(DiagnosticKind::UnparseableIdentity));
                prop_assert_eq!(r.action.kind, ActionKind::None);
            }
            if let Some(new_cpc) = r.action.new_cpc {
                prop_assert!(new_cpc.is_finite() && new_cpc >= 0.0);
            }
        }

        let again = engine.analyze(as_of(), &ads, &orders);
        prop_assert_eq!(
            serde_json::to_string(&reports).unwrap(),
            serde_json::to_string(&again).unwrap()
        );
    }
}
