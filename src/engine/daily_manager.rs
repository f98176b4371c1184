//! Daily record management: locate-or-create records, apply channel
//! patches, keep derived fields consistent.
//!
//! Every mutation goes through here so the conservation invariants are
//! re-established and checked after each edit. Patches are applied to a
//! working copy and only written back once they validate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::domain::{
    AllotmentConfig, ChannelAllotment, ChannelId, DailyRecord, DefaultSettings,
    RestrictionSnapshot,
};
use crate::infra::{EngineError, Result};

/// Partial update to one channel's allotment on one date.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelAllotmentPatch {
    pub allocated: Option<u32>,
    pub sold: Option<u32>,
    pub blocked: Option<u32>,
    pub rate: Option<f64>,
    pub restrictions: Option<RestrictionSnapshot>,
}

impl ChannelAllotmentPatch {
    pub fn is_empty(&self) -> bool {
        self.allocated.is_none()
            && self.sold.is_none()
            && self.blocked.is_none()
            && self.rate.is_none()
            && self.restrictions.is_none()
    }

    /// Names of the fields this patch touches, for the change log.
    pub fn touched_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.allocated.is_some() {
            fields.push("allocated".to_string());
        }
        if self.sold.is_some() {
            fields.push("sold".to_string());
        }
        if self.blocked.is_some() {
            fields.push("blocked".to_string());
        }
        if self.rate.is_some() {
            fields.push("rate".to_string());
        }
        if self.restrictions.is_some() {
            fields.push("restrictions".to_string());
        }
        fields
    }
}

/// Locate the daily record for `date`, creating it from the configuration
/// defaults if absent. Records are keyed and iterated in ascending date
/// order by construction.
pub fn get_or_seed(config: &mut AllotmentConfig, date: NaiveDate) -> &mut DailyRecord {
    let defaults = config.defaults.clone();
    config
        .daily_records
        .entry(date)
        .or_insert_with(|| DailyRecord::seeded(date, &defaults))
}

/// Locate the channel allotment on a record, creating it when the channel is
/// defined on the configuration. New allotments start with zero allocation
/// and the channel's rate and restriction snapshot for the date.
pub fn ensure_allotment<'a>(
    config_channels: &[crate::domain::Channel],
    record: &'a mut DailyRecord,
    channel_id: ChannelId,
    now: DateTime<Utc>,
) -> Result<&'a mut ChannelAllotment> {
    if record.channel(channel_id).is_none() {
        let channel = config_channels
            .iter()
            .find(|c| c.id == channel_id)
            .ok_or(EngineError::ChannelNotFound(channel_id))?;
        let mut allotment =
            ChannelAllotment::new(channel_id, 0, channel.rate_for(record.date, record.holiday), now);
        allotment.restrictions = channel.restrictions.snapshot_for(record.date);
        record.channels.push(allotment);
    }
    Ok(record
        .channel_mut(channel_id)
        .expect("allotment just ensured"))
}

/// Apply a partial update to one channel's entry on one date, creating the
/// entry if absent, then recompute derived fields and validate invariants.
/// On violation the record is left untouched and the violated invariant is
/// named in the error.
pub fn upsert_channel(
    config: &mut AllotmentConfig,
    date: NaiveDate,
    channel_id: ChannelId,
    patch: &ChannelAllotmentPatch,
    now: DateTime<Utc>,
) -> Result<DailyRecord> {
    let defaults = config.defaults.clone();
    let channels = config.channels.clone();

    let record = get_or_seed(config, date);
    let mut working = record.clone();

    if working.blackout {
        if let Some(sold) = patch.sold {
            let current = working.channel(channel_id).map(|c| c.sold).unwrap_or(0);
            if sold > current {
                return Err(EngineError::InvariantViolation {
                    invariant: "blackout_no_sales".to_string(),
                    message: format!("{date} is blacked out; sold cannot increase"),
                });
            }
        }
    }

    {
        let allotment = ensure_allotment(&channels, &mut working, channel_id, now)?;
        if let Some(allocated) = patch.allocated {
            allotment.allocated = allocated;
        }
        if let Some(sold) = patch.sold {
            allotment.sold = sold;
        }
        if let Some(blocked) = patch.blocked {
            allotment.blocked = blocked;
        }
        if let Some(rate) = patch.rate {
            allotment.rate = rate;
        }
        if let Some(restrictions) = patch.restrictions {
            allotment.restrictions = restrictions;
        }
        allotment.last_updated = now;
    }

    working.recompute();
    working
        .check_invariants(&defaults)
        .map_err(|(invariant, message)| EngineError::InvariantViolation { invariant, message })?;

    *get_or_seed(config, date) = working.clone();
    Ok(working)
}

/// If the summed allocation exceeds total inventory and overbooking is
/// disallowed, proportionally scale every allocation down (floor) until the
/// cap holds. Returns a warning describing the adjustment, if one was made.
pub fn enforce_total_cap(record: &mut DailyRecord, defaults: &DefaultSettings) -> Option<String> {
    if defaults.overbooking_allowed {
        return None;
    }
    let allocated = record.allocated_total();
    let cap = u64::from(record.total_inventory);
    if allocated <= cap {
        return None;
    }

    for ch in &mut record.channels {
        let scaled = (u64::from(ch.allocated) * cap) / allocated;
        ch.allocated = u32::try_from(scaled).unwrap_or(u32::MAX);
    }
    record.recompute();

    let warning = format!(
        "{}: allocations scaled from {} to fit inventory {}",
        record.date, allocated, cap
    );
    tracing::warn!(date = %record.date, from = allocated, cap, "allocation cap enforced");
    Some(warning)
}
