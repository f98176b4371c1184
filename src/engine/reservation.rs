//! Reservation engine: transactional inventory movement for bookings and
//! releases.
//!
//! A reservation touches every night in [check_in, check_out) on a working
//! copy of the configuration; any failing night aborts the whole operation
//! with the first offending date, and nothing is saved.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{
    AllotmentConfig, ChangeAction, ChangeLogEntry, Channel, ChannelId, Clock, DailyRecord,
};
use crate::infra::{EngineError, InventoryStore, Result};

use super::daily_manager::{ensure_allotment, get_or_seed};
use super::{mutate_with_retry, ConfigKey};

/// A booking or release request for one channel over a stay.
#[derive(Debug, Clone)]
pub struct StayRequest {
    pub channel_id: ChannelId,
    pub check_in: NaiveDate,
    /// Exclusive: the night of `check_out` itself is not reserved.
    pub check_out: NaiveDate,
    pub rooms: u32,
}

impl StayRequest {
    fn validate(&self) -> Result<()> {
        if self.rooms == 0 {
            return Err(EngineError::validation("rooms", "must be at least 1"));
        }
        if self.check_out <= self.check_in {
            return Err(EngineError::validation(
                "check_out",
                "must be after check_in",
            ));
        }
        Ok(())
    }

    fn nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days() as u32
    }

    fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.check_in;
        let nights = self.nights();
        (0..nights).map(move |n| start + Duration::days(i64::from(n)))
    }
}

/// Per-night state after a reservation or release.
#[derive(Debug, Clone, Serialize)]
pub struct DayAllocation {
    pub date: NaiveDate,
    pub allocated: u32,
    pub sold: u32,
    pub available: i64,
    pub occupancy_rate: f64,
}

/// Result of a successful reserve or release.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationOutcome {
    pub config_id: crate::domain::ConfigId,
    pub version: u64,
    pub nights: Vec<DayAllocation>,
}

/// One channel's slice in an availability answer.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityChannel {
    pub channel_id: ChannelId,
    pub allocated: u32,
    pub sold: u32,
    pub blocked: u32,
    pub available: i64,
    pub stop_sell: bool,
}

/// Read-only availability for one date.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityDay {
    pub date: NaiveDate,
    pub total_inventory: u32,
    pub free_stock: i64,
    pub total_sold: u32,
    pub occupancy_rate: f64,
    pub blackout: bool,
    pub channels: Vec<AvailabilityChannel>,
}

/// Transactional booking and release operations.
pub struct ReservationEngine {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Reserve `rooms` for a channel on every night of the stay, or fail
    /// with the first offending date. Appends one `allocated` log entry and
    /// saves under a version check, retrying the whole operation on
    /// conflict.
    pub async fn reserve(
        &self,
        hotel: &crate::domain::HotelId,
        room_type: &crate::domain::RoomTypeId,
        request: &StayRequest,
        actor: &str,
    ) -> Result<ReservationOutcome> {
        request.validate()?;
        let now = self.clock.now();

        let (config, nights) = mutate_with_retry(
            self.store.as_ref(),
            ConfigKey::RoomType(hotel, room_type),
            self.max_retries,
            now,
            true,
            |config| {
                let today = self.clock.today_local(config.utc_offset_minutes);
                check_channel_restrictions(config, request, today, now)?;
                let nights = apply_stay(config, request, now, Direction::Reserve)?;
                config.push_log(
                    ChangeLogEntry::new(actor, ChangeAction::Allocated, now)
                        .with_fields(&["sold"])
                        .with_reason(format!(
                            "reserve {} room(s) on {} for {}..{}",
                            request.rooms, request.channel_id, request.check_in, request.check_out
                        ))
                        .with_details(serde_json::json!({
                            "channel": request.channel_id,
                            "check_in": request.check_in,
                            "check_out": request.check_out,
                            "rooms": request.rooms,
                        })),
                );
                Ok(nights)
            },
        )
        .await?;

        tracing::info!(
            config_id = %config.id,
            channel = %request.channel_id,
            check_in = %request.check_in,
            check_out = %request.check_out,
            rooms = request.rooms,
            "reservation applied"
        );

        Ok(ReservationOutcome {
            config_id: config.id,
            version: config.version,
            nights,
        })
    }

    /// Release previously sold rooms over the stay. `sold` never drops below
    /// zero; a release that would is an invariant violation.
    pub async fn release(
        &self,
        hotel: &crate::domain::HotelId,
        room_type: &crate::domain::RoomTypeId,
        request: &StayRequest,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<ReservationOutcome> {
        request.validate()?;
        let now = self.clock.now();

        let (config, nights) = mutate_with_retry(
            self.store.as_ref(),
            ConfigKey::RoomType(hotel, room_type),
            self.max_retries,
            now,
            true,
            |config| {
                let nights = apply_stay(config, request, now, Direction::Release)?;
                let mut entry = ChangeLogEntry::new(actor, ChangeAction::Released, now)
                    .with_fields(&["sold"])
                    .with_details(serde_json::json!({
                        "channel": request.channel_id,
                        "check_in": request.check_in,
                        "check_out": request.check_out,
                        "rooms": request.rooms,
                    }));
                if let Some(reason) = reason {
                    entry = entry.with_reason(reason);
                }
                config.push_log(entry);
                Ok(nights)
            },
        )
        .await?;

        tracing::info!(
            config_id = %config.id,
            channel = %request.channel_id,
            rooms = request.rooms,
            "release applied"
        );

        Ok(ReservationOutcome {
            config_id: config.id,
            version: config.version,
            nights,
        })
    }

    /// Read-only per-date availability over an inclusive range. Dates
    /// without a record report the seeded view.
    pub async fn availability(
        &self,
        hotel: &crate::domain::HotelId,
        room_type: &crate::domain::RoomTypeId,
        start: NaiveDate,
        end: NaiveDate,
        channel: Option<ChannelId>,
    ) -> Result<Vec<AvailabilityDay>> {
        if end < start {
            return Err(EngineError::validation("end", "must not precede start"));
        }
        let config = self.store.load(hotel, room_type).await?;

        let mut days = Vec::new();
        let mut date = start;
        while date <= end {
            let seeded;
            let record: &DailyRecord = match config.daily_records.get(&date) {
                Some(record) => record,
                None => {
                    seeded = DailyRecord::seeded(date, &config.defaults);
                    &seeded
                }
            };
            let channels = record
                .channels
                .iter()
                .filter(|c| channel.map(|ch| c.channel_id == ch).unwrap_or(true))
                .map(|c| AvailabilityChannel {
                    channel_id: c.channel_id,
                    allocated: c.allocated,
                    sold: c.sold,
                    blocked: c.blocked,
                    available: c.available,
                    stop_sell: c.restrictions.stop_sell,
                })
                .collect();
            days.push(AvailabilityDay {
                date,
                total_inventory: record.total_inventory,
                free_stock: record.free_stock,
                total_sold: record.total_sold,
                occupancy_rate: record.occupancy_rate,
                blackout: record.blackout,
                channels,
            });
            date += Duration::days(1);
        }
        Ok(days)
    }
}

enum Direction {
    Reserve,
    Release,
}

/// Restriction pre-checks that depend only on the channel definition and
/// the stay shape, before any record is touched.
fn check_channel_restrictions(
    config: &AllotmentConfig,
    request: &StayRequest,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<()> {
    let channel: &Channel = config
        .channel(request.channel_id)
        .ok_or(EngineError::ChannelNotFound(request.channel_id))?;

    if !channel.active {
        return Err(EngineError::Closed {
            date: request.check_in,
            rule: "channel_inactive".to_string(),
        });
    }

    let nights = request.nights();
    if nights < channel.restrictions.min_stay {
        return Err(EngineError::Closed {
            date: request.check_in,
            rule: format!("min_stay {}", channel.restrictions.min_stay),
        });
    }
    if nights > channel.restrictions.max_stay {
        return Err(EngineError::Closed {
            date: request.check_in,
            rule: format!("max_stay {}", channel.restrictions.max_stay),
        });
    }

    let lead_days = (request.check_in - today).num_days();
    if let Some(min) = channel.min_advance_days {
        if lead_days < i64::from(min) {
            return Err(EngineError::Closed {
                date: request.check_in,
                rule: format!("min_advance_days {min}"),
            });
        }
    }
    if let Some(max) = channel.max_advance_days {
        if lead_days > i64::from(max) {
            return Err(EngineError::Closed {
                date: request.check_in,
                rule: format!("max_advance_days {max}"),
            });
        }
    }
    if let Some(cutoff) = channel.cutoff_time {
        if request.check_in == today {
            let local_time = (now + Duration::minutes(i64::from(config.utc_offset_minutes))).time();
            if local_time > cutoff {
                return Err(EngineError::Closed {
                    date: request.check_in,
                    rule: format!("cutoff_time {cutoff}"),
                });
            }
        }
    }

    if channel
        .restrictions
        .closed_to_arrival
        .contains(&request.check_in)
    {
        return Err(EngineError::Closed {
            date: request.check_in,
            rule: "closed_to_arrival".to_string(),
        });
    }
    if channel
        .restrictions
        .closed_to_departure
        .contains(&request.check_out)
    {
        return Err(EngineError::Closed {
            date: request.check_out,
            rule: "closed_to_departure".to_string(),
        });
    }

    Ok(())
}

/// Apply the stay to every night in order, ascending. An error aborts the
/// caller's working copy before any save, which is the rollback path.
fn apply_stay(
    config: &mut AllotmentConfig,
    request: &StayRequest,
    now: DateTime<Utc>,
    direction: Direction,
) -> Result<Vec<DayAllocation>> {
    let defaults = config.defaults.clone();
    let channels = config.channels.clone();
    let tolerance = if defaults.overbooking_allowed {
        i64::from(defaults.overbooking_limit)
    } else {
        0
    };

    let mut nights = Vec::with_capacity(request.nights() as usize);
    for date in request.dates() {
        let record = get_or_seed(config, date);

        match direction {
            Direction::Reserve => {
                if record.blackout {
                    return Err(EngineError::Closed {
                        date,
                        rule: "blackout".to_string(),
                    });
                }
                let stop_sell_today = channels
                    .iter()
                    .find(|c| c.id == request.channel_id)
                    .map(|c| c.restrictions.stop_sell.contains(&date))
                    .unwrap_or(false)
                    || record
                        .channel(request.channel_id)
                        .map(|a| a.restrictions.stop_sell)
                        .unwrap_or(false);
                if stop_sell_today {
                    return Err(EngineError::Closed {
                        date,
                        rule: "stop_sell".to_string(),
                    });
                }

                if record.channel(request.channel_id).is_none() {
                    if !defaults.auto_create_allotments {
                        return Err(EngineError::Closed {
                            date,
                            rule: "no_allotment_for_channel".to_string(),
                        });
                    }
                    let free = u32::try_from(record.free_stock.max(0)).unwrap_or(0);
                    let allotment =
                        ensure_allotment(&channels, record, request.channel_id, now)?;
                    allotment.allocated = free;
                    record.recompute();
                }

                let allotment = record
                    .channel_mut(request.channel_id)
                    .expect("allotment present");
                if allotment.available - i64::from(request.rooms) < -tolerance {
                    return Err(EngineError::InsufficientInventory {
                        date,
                        requested: request.rooms,
                        available: allotment.available,
                    });
                }
                allotment.sold += request.rooms;
                allotment.last_updated = now;
            }
            Direction::Release => {
                let Some(allotment) = record.channel_mut(request.channel_id) else {
                    return Err(EngineError::InvariantViolation {
                        invariant: "sold_non_negative".to_string(),
                        message: format!(
                            "{date}: no rooms sold on {} to release",
                            request.channel_id
                        ),
                    });
                };
                if allotment.sold < request.rooms {
                    return Err(EngineError::InvariantViolation {
                        invariant: "sold_non_negative".to_string(),
                        message: format!(
                            "{date}: releasing {} rooms but only {} sold",
                            request.rooms, allotment.sold
                        ),
                    });
                }
                allotment.sold -= request.rooms;
                allotment.last_updated = now;
            }
        }

        record.recompute();
        record
            .check_invariants(&defaults)
            .map_err(|(invariant, message)| EngineError::InvariantViolation {
                invariant,
                message,
            })?;

        let allotment = record.channel(request.channel_id).expect("allotment present");
        nights.push(DayAllocation {
            date,
            allocated: allotment.allocated,
            sold: allotment.sold,
            available: allotment.available,
            occupancy_rate: record.occupancy_rate,
        });
    }
    Ok(nights)
}
