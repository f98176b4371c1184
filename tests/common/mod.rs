//! Common test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use allotment_engine::domain::{
    AllotmentConfig, Channel, ChannelId, Clock, DefaultSettings, FixedClock, HotelId, RoomTypeId,
};
use allotment_engine::engine::{upsert_channel, ChannelAllotmentPatch};
use allotment_engine::infra::{InMemoryInventoryStore, InventoryStore};

/// Test hotel ID
pub fn test_hotel_id() -> HotelId {
    HotelId::from_uuid(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
}

/// Test room type ID
pub fn test_room_type_id() -> RoomTypeId {
    RoomTypeId::from_uuid(Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap())
}

/// A clock pinned well before the test stay dates.
pub fn test_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(test_now()))
}

pub fn test_now() -> DateTime<Utc> {
    "2023-05-01T12:00:00Z".parse().unwrap()
}

pub fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

/// A configuration with the standard three channels and no daily records.
pub fn base_config(total_inventory: u32) -> AllotmentConfig {
    let mut config = AllotmentConfig::new(
        test_hotel_id(),
        test_room_type_id(),
        "Standard Double",
        DefaultSettings {
            total_inventory,
            ..DefaultSettings::default()
        },
        test_now(),
    );
    config.channels.push(Channel::new(ChannelId::Direct, "Direct", 100.0));
    config
        .channels
        .push(Channel::new(ChannelId::BookingCom, "Booking.com", 110.0));
    config
        .channels
        .push(Channel::new(ChannelId::Expedia, "Expedia", 105.0));
    config
}

/// Allocate `allocated` rooms to a channel on each date, via the daily
/// record manager.
pub fn allocate(
    config: &mut AllotmentConfig,
    channel: ChannelId,
    dates: &[&str],
    allocated: u32,
) {
    for date in dates {
        upsert_channel(
            config,
            d(date),
            channel,
            &ChannelAllotmentPatch {
                allocated: Some(allocated),
                ..ChannelAllotmentPatch::default()
            },
            test_now(),
        )
        .unwrap();
    }
}

/// Store a prepared configuration in a fresh in-memory store.
pub async fn store_with(config: &AllotmentConfig) -> Arc<InMemoryInventoryStore> {
    let store = Arc::new(InMemoryInventoryStore::new());
    store.insert(config).await.unwrap();
    store
}
