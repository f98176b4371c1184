//! Identifier types for the allotment engine.
//!
//! Opaque uuid newtypes for hotels, room types, configurations, rules and
//! bookings, plus the closed set of sales-channel identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hotel identifier (property level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HotelId(pub uuid::Uuid);

impl HotelId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl Default for HotelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HotelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room-type identifier (within a hotel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomTypeId(pub uuid::Uuid);

impl RoomTypeId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl Default for RoomTypeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allotment-configuration identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigId(pub uuid::Uuid);

impl ConfigId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl Default for ConfigId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Allocation-rule identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub uuid::Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Booking identifier assigned by the caller (reservation systems upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub uuid::Uuid);

impl BookingId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sales-channel identifier.
///
/// Closed set: a channel is either the hotel's own direct surface, one of the
/// supported travel portals, or the single custom slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    Direct,
    BookingCom,
    Expedia,
    Airbnb,
    Agoda,
    HotelsCom,
    Custom,
}

impl ChannelId {
    /// All known channel identifiers, useful for validation and iteration.
    pub const ALL: [ChannelId; 7] = [
        ChannelId::Direct,
        ChannelId::BookingCom,
        ChannelId::Expedia,
        ChannelId::Airbnb,
        ChannelId::Agoda,
        ChannelId::HotelsCom,
        ChannelId::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelId::Direct => "direct",
            ChannelId::BookingCom => "booking_com",
            ChannelId::Expedia => "expedia",
            ChannelId::Airbnb => "airbnb",
            ChannelId::Agoda => "agoda",
            ChannelId::HotelsCom => "hotels_com",
            ChannelId::Custom => "custom",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ChannelId::Direct),
            "booking_com" => Ok(ChannelId::BookingCom),
            "expedia" => Ok(ChannelId::Expedia),
            "airbnb" => Ok(ChannelId::Airbnb),
            "agoda" => Ok(ChannelId::Agoda),
            "hotels_com" => Ok(ChannelId::HotelsCom),
            "custom" => Ok(ChannelId::Custom),
            other => Err(format!("unknown channel id: {other}")),
        }
    }
}
