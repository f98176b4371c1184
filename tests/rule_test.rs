//! Rule application through the service layer.

mod common;

use std::collections::BTreeMap;

use allotment_engine::domain::{AllocationRule, ChannelId, RuleKind};
use allotment_engine::engine::{AllotmentService, RuleOutcomeStatus};
use allotment_engine::infra::InventoryStore;

use common::*;

fn percentage_rule(shares: &[(ChannelId, f64)]) -> AllocationRule {
    let shares: BTreeMap<ChannelId, f64> = shares.iter().copied().collect();
    AllocationRule::new("seasonal split", RuleKind::Percentage { shares })
}

#[tokio::test]
async fn percentage_rule_covers_the_week() {
    let mut config = base_config(100);
    let rule = percentage_rule(&[
        (ChannelId::Direct, 40.0),
        (ChannelId::BookingCom, 35.0),
        (ChannelId::Expedia, 25.0),
    ]);
    let rule_id = rule.id;
    config.rules.push(rule);

    let store = store_with(&config).await;
    let service = AllotmentService::new(store.clone(), test_clock());
    let version_before = store.load_by_id(&config.id).await.unwrap().version;

    let outcomes = service
        .apply_rule(&config.id, &rule_id, d("2023-06-01"), d("2023-06-07"), "revenue-mgr")
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 7);
    assert!(outcomes.iter().all(|o| o.status == RuleOutcomeStatus::Applied));

    let after = store.load_by_id(&config.id).await.unwrap();
    assert_eq!(after.version, version_before + 1);
    for (_, record) in after.records_in_range(d("2023-06-01"), d("2023-06-07")) {
        assert_eq!(record.channel(ChannelId::Direct).unwrap().allocated, 40);
        assert_eq!(record.channel(ChannelId::BookingCom).unwrap().allocated, 35);
        assert_eq!(record.channel(ChannelId::Expedia).unwrap().allocated, 25);
        assert_eq!(record.free_stock, 0);
        assert_eq!(record.allocated_total(), 100);
    }
}

#[tokio::test]
async fn applying_twice_is_idempotent() {
    let mut config = base_config(100);
    let rule = percentage_rule(&[(ChannelId::Direct, 60.0), (ChannelId::Expedia, 15.0)]);
    let rule_id = rule.id;
    config.rules.push(rule);

    let store = store_with(&config).await;
    let service = AllotmentService::new(store.clone(), test_clock());

    service
        .apply_rule(&config.id, &rule_id, d("2023-06-01"), d("2023-06-03"), "revenue-mgr")
        .await
        .unwrap();
    let first = store.load_by_id(&config.id).await.unwrap();

    service
        .apply_rule(&config.id, &rule_id, d("2023-06-01"), d("2023-06-03"), "revenue-mgr")
        .await
        .unwrap();
    let second = store.load_by_id(&config.id).await.unwrap();

    for (date, record) in first.records_in_range(d("2023-06-01"), d("2023-06-03")) {
        let again = second.daily_records.get(date).unwrap();
        for allotment in &record.channels {
            assert_eq!(
                allotment.allocated,
                again.channel(allotment.channel_id).unwrap().allocated
            );
        }
        // 60% + 15% of 100 leaves 25 rooms free.
        assert_eq!(record.free_stock, 25);
    }
}

#[tokio::test]
async fn rule_below_sold_fails_per_date_and_continues() {
    let mut config = base_config(10);
    allocate(&mut config, ChannelId::Direct, &["2023-06-02"], 10);
    config
        .daily_records
        .get_mut(&d("2023-06-02"))
        .unwrap()
        .channel_mut(ChannelId::Direct)
        .unwrap()
        .sold = 5;
    config.daily_records.get_mut(&d("2023-06-02")).unwrap().recompute();

    let rule = percentage_rule(&[(ChannelId::Direct, 30.0)]);
    let rule_id = rule.id;
    config.rules.push(rule);

    let store = store_with(&config).await;
    let service = AllotmentService::new(store.clone(), test_clock());

    let outcomes = service
        .apply_rule(&config.id, &rule_id, d("2023-06-01"), d("2023-06-03"), "revenue-mgr")
        .await
        .unwrap();

    assert_eq!(outcomes[0].status, RuleOutcomeStatus::Applied);
    assert_eq!(outcomes[1].status, RuleOutcomeStatus::Failed);
    assert_eq!(outcomes[2].status, RuleOutcomeStatus::Applied);

    let after = store.load_by_id(&config.id).await.unwrap();
    let untouched = after.daily_records.get(&d("2023-06-02")).unwrap();
    assert_eq!(untouched.channel(ChannelId::Direct).unwrap().allocated, 10);
    assert_eq!(untouched.channel(ChannelId::Direct).unwrap().sold, 5);
    let applied = after.daily_records.get(&d("2023-06-01")).unwrap();
    assert_eq!(applied.channel(ChannelId::Direct).unwrap().allocated, 3);
}

#[tokio::test]
async fn conditions_gate_dates_outside_the_rule_window() {
    let mut config = base_config(50);
    let mut rule = percentage_rule(&[(ChannelId::Direct, 50.0)]);
    rule.conditions.start = Some(d("2023-06-02"));
    rule.conditions.end = Some(d("2023-06-03"));
    let rule_id = rule.id;
    config.rules.push(rule);

    let store = store_with(&config).await;
    let service = AllotmentService::new(store.clone(), test_clock());

    let outcomes = service
        .apply_rule(&config.id, &rule_id, d("2023-06-01"), d("2023-06-04"), "revenue-mgr")
        .await
        .unwrap();

    let statuses: Vec<RuleOutcomeStatus> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            RuleOutcomeStatus::Skipped,
            RuleOutcomeStatus::Applied,
            RuleOutcomeStatus::Applied,
            RuleOutcomeStatus::Skipped,
        ]
    );
}

#[tokio::test]
async fn optimize_reports_a_summary() {
    let mut config = base_config(20);
    config
        .rules
        .push(percentage_rule(&[(ChannelId::Direct, 100.0)]));

    let store = store_with(&config).await;
    let service = AllotmentService::new(store.clone(), test_clock());

    let summary = service.optimize(&config.id, "scheduler").await.unwrap();
    assert_eq!(summary.dates_applied, 30);
    assert_eq!(summary.dates_failed, 0);

    let after = store.load_by_id(&config.id).await.unwrap();
    // The optimizer starts from hotel-local today (fixed clock: 2023-05-01).
    let record = after.daily_records.get(&d("2023-05-01")).unwrap();
    assert_eq!(record.channel(ChannelId::Direct).unwrap().allocated, 20);
}
