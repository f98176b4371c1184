//! Reservation engine integration tests against the in-memory store.

mod common;

use std::sync::Arc;

use allotment_engine::domain::{ChangeAction, ChannelId};
use allotment_engine::engine::{ReservationEngine, StayRequest};
use allotment_engine::infra::{EngineError, InventoryStore};

use common::*;

fn stay(channel: ChannelId, check_in: &str, check_out: &str, rooms: u32) -> StayRequest {
    StayRequest {
        channel_id: channel,
        check_in: d(check_in),
        check_out: d(check_out),
        rooms,
    }
}

async fn engine_with(
    config: &allotment_engine::domain::AllotmentConfig,
) -> (ReservationEngine, Arc<allotment_engine::infra::InMemoryInventoryStore>) {
    let store = store_with(config).await;
    (
        ReservationEngine::new(store.clone(), test_clock()),
        store,
    )
}

#[tokio::test]
async fn baseline_reservation_updates_each_night() {
    let mut config = base_config(10);
    allocate(&mut config, ChannelId::Direct, &["2023-06-01", "2023-06-02"], 10);
    let (engine, store) = engine_with(&config).await;
    let version_before = store.load_by_id(&config.id).await.unwrap().version;
    let log_before = store.load_by_id(&config.id).await.unwrap().change_log.len();

    let outcome = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-03", 3),
            "front-desk",
        )
        .await
        .unwrap();

    assert_eq!(outcome.nights.len(), 2);
    for night in &outcome.nights {
        assert_eq!(night.sold, 3);
        assert_eq!(night.available, 7);
        assert!((night.occupancy_rate - 30.0).abs() < 0.01);
    }

    let after = store.load_by_id(&config.id).await.unwrap();
    assert_eq!(after.version, version_before + 1);
    assert_eq!(after.change_log.len(), log_before + 1);
    assert_eq!(
        after.change_log.last().unwrap().action,
        ChangeAction::Allocated
    );
    // The check-out day itself is untouched.
    assert!(!after.daily_records.contains_key(&d("2023-06-03")));
}

#[tokio::test]
async fn oversell_fails_on_earliest_offending_date() {
    let mut config = base_config(10);
    allocate(&mut config, ChannelId::Direct, &["2023-06-01", "2023-06-02"], 10);
    let (engine, store) = engine_with(&config).await;

    engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-03", 10),
            "front-desk",
        )
        .await
        .unwrap();

    let err = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-03", 1),
            "front-desk",
        )
        .await
        .unwrap_err();

    match err {
        EngineError::InsufficientInventory {
            date,
            requested,
            available,
        } => {
            assert_eq!(date, d("2023-06-01"));
            assert_eq!(requested, 1);
            assert_eq!(available, 0);
        }
        other => panic!("unexpected error: {other}"),
    }

    // The failed attempt saved nothing.
    let after = store.load_by_id(&config.id).await.unwrap();
    let record = after.daily_records.get(&d("2023-06-01")).unwrap();
    assert_eq!(record.channel(ChannelId::Direct).unwrap().sold, 10);
    assert_eq!(record.channel(ChannelId::Direct).unwrap().available, 0);
}

#[tokio::test]
async fn overbooking_within_limit_succeeds_beyond_fails() {
    let mut config = base_config(10);
    config.defaults.overbooking_allowed = true;
    config.defaults.overbooking_limit = 2;
    allocate(&mut config, ChannelId::Direct, &["2023-06-01"], 10);
    let (engine, store) = engine_with(&config).await;

    let outcome = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-02", 12),
            "front-desk",
        )
        .await
        .unwrap();
    assert_eq!(outcome.nights[0].sold, 12);
    assert_eq!(outcome.nights[0].available, -2);

    let err = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-02", 1),
            "front-desk",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientInventory { .. }));

    let after = store.load_by_id(&config.id).await.unwrap();
    let allotment = after
        .daily_records
        .get(&d("2023-06-01"))
        .unwrap()
        .channel(ChannelId::Direct)
        .unwrap();
    assert_eq!(allotment.overbooked, 2);
}

#[tokio::test]
async fn closed_to_arrival_blocks_only_that_check_in() {
    let mut config = base_config(10);
    allocate(
        &mut config,
        ChannelId::Direct,
        &["2023-06-04", "2023-06-05", "2023-06-06"],
        10,
    );
    config
        .channel_mut(ChannelId::Direct)
        .unwrap()
        .restrictions
        .closed_to_arrival
        .insert(d("2023-06-05"));
    let (engine, _store) = engine_with(&config).await;

    let err = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-05", "2023-06-07", 1),
            "front-desk",
        )
        .await
        .unwrap_err();
    match err {
        EngineError::Closed { date, rule } => {
            assert_eq!(date, d("2023-06-05"));
            assert_eq!(rule, "closed_to_arrival");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Arriving one day earlier is allowed.
    engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-04", "2023-06-07", 1),
            "front-desk",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn stop_sell_and_blackout_block_sales() {
    let mut config = base_config(10);
    allocate(&mut config, ChannelId::Direct, &["2023-06-01", "2023-06-02"], 10);
    config
        .channel_mut(ChannelId::Direct)
        .unwrap()
        .restrictions
        .stop_sell
        .insert(d("2023-06-02"));
    let (engine, _) = engine_with(&config).await;

    let err = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-03", 1),
            "front-desk",
        )
        .await
        .unwrap_err();
    match err {
        EngineError::Closed { date, rule } => {
            assert_eq!(date, d("2023-06-02"));
            assert_eq!(rule, "stop_sell");
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut config = base_config(10);
    allocate(&mut config, ChannelId::Direct, &["2023-06-01"], 10);
    config
        .daily_records
        .get_mut(&d("2023-06-01"))
        .unwrap()
        .blackout = true;
    let (engine, _) = engine_with(&config).await;
    let err = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-02", 1),
            "front-desk",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Closed { rule, .. } if rule == "blackout"));
}

#[tokio::test]
async fn min_stay_rejects_short_stays() {
    let mut config = base_config(10);
    allocate(&mut config, ChannelId::Direct, &["2023-06-01", "2023-06-02"], 10);
    config
        .channel_mut(ChannelId::Direct)
        .unwrap()
        .restrictions
        .min_stay = 2;
    let (engine, _) = engine_with(&config).await;

    let err = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-02", 1),
            "front-desk",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Closed { rule, .. } if rule.starts_with("min_stay")));

    engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-03", 1),
            "front-desk",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn reserve_then_release_restores_state() {
    let mut config = base_config(10);
    allocate(&mut config, ChannelId::Direct, &["2023-06-01", "2023-06-02"], 10);
    let (engine, store) = engine_with(&config).await;

    let before = store.load_by_id(&config.id).await.unwrap();
    let request = stay(ChannelId::Direct, "2023-06-01", "2023-06-03", 4);

    engine
        .reserve(&test_hotel_id(), &test_room_type_id(), &request, "front-desk")
        .await
        .unwrap();
    engine
        .release(
            &test_hotel_id(),
            &test_room_type_id(),
            &request,
            "front-desk",
            Some("cancellation"),
        )
        .await
        .unwrap();

    let after = store.load_by_id(&config.id).await.unwrap();
    assert_eq!(after.version, before.version + 2);
    assert_eq!(after.change_log.len(), before.change_log.len() + 2);
    for date in ["2023-06-01", "2023-06-02"] {
        let was = before.daily_records.get(&d(date)).unwrap();
        let now = after.daily_records.get(&d(date)).unwrap();
        let was = was.channel(ChannelId::Direct).unwrap();
        let now = now.channel(ChannelId::Direct).unwrap();
        assert_eq!(was.sold, now.sold);
        assert_eq!(was.available, now.available);
    }
    assert_eq!(
        after.change_log.last().unwrap().action,
        ChangeAction::Released
    );
}

#[tokio::test]
async fn release_below_zero_is_invariant_violation() {
    let mut config = base_config(10);
    allocate(&mut config, ChannelId::Direct, &["2023-06-01"], 10);
    let (engine, _) = engine_with(&config).await;

    let err = engine
        .release(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-02", 1),
            "front-desk",
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvariantViolation { invariant, .. } if invariant == "sold_non_negative"
    ));
}

#[tokio::test]
async fn zero_inventory_always_fails() {
    let mut config = base_config(0);
    allocate(&mut config, ChannelId::Direct, &["2023-06-01"], 0);
    let (engine, store) = engine_with(&config).await;

    let err = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-02", 1),
            "front-desk",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientInventory { .. }));

    let config = store.load_by_id(&config.id).await.unwrap();
    let record = config.daily_records.get(&d("2023-06-01")).unwrap();
    assert_eq!(record.occupancy_rate, 0.0);
}

#[tokio::test]
async fn missing_allotment_fails_closed_without_auto_create() {
    let config = base_config(10);
    let (engine, _) = engine_with(&config).await;

    let err = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-02", 1),
            "front-desk",
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, EngineError::Closed { rule, .. } if rule == "no_allotment_for_channel")
    );
}

#[tokio::test]
async fn auto_create_assigns_free_stock() {
    let mut config = base_config(10);
    config.defaults.auto_create_allotments = true;
    let (engine, _) = engine_with(&config).await;

    let outcome = engine
        .reserve(
            &test_hotel_id(),
            &test_room_type_id(),
            &stay(ChannelId::Direct, "2023-06-01", "2023-06-02", 4),
            "front-desk",
        )
        .await
        .unwrap();
    assert_eq!(outcome.nights[0].allocated, 10);
    assert_eq!(outcome.nights[0].sold, 4);
    assert_eq!(outcome.nights[0].available, 6);
}

#[tokio::test]
async fn concurrent_reservations_never_break_invariants() {
    let mut config = base_config(10);
    allocate(&mut config, ChannelId::Direct, &["2023-06-01"], 10);
    let (engine, store) = engine_with(&config).await;
    let engine = Arc::new(engine);

    let request = stay(ChannelId::Direct, "2023-06-01", "2023-06-02", 6);
    let a = {
        let engine = engine.clone();
        let request = request.clone();
        tokio::spawn(async move {
            engine
                .reserve(&test_hotel_id(), &test_room_type_id(), &request, "a")
                .await
        })
    };
    let b = {
        let engine = engine.clone();
        let request = request.clone();
        tokio::spawn(async move {
            engine
                .reserve(&test_hotel_id(), &test_room_type_id(), &request, "b")
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    // 6 + 6 > 10: exactly one can win.
    assert_eq!(successes, 1);
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(
                e,
                EngineError::InsufficientInventory { .. } | EngineError::VersionConflict { .. }
            ));
        }
    }

    let after = store.load_by_id(&config.id).await.unwrap();
    let record = after.daily_records.get(&d("2023-06-01")).unwrap();
    record.check_invariants(&after.defaults).unwrap();
    assert_eq!(record.channel(ChannelId::Direct).unwrap().sold, 6);
    assert_eq!(record.total_sold, 6);
    assert_eq!(record.free_stock + record.allocated_total() as i64, 10);
}
