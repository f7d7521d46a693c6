use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coordinates are rounded to this many decimal places when building a
/// subscription identity, so float jitter from repeated geocoding of the
/// same place does not create duplicate subscriptions.
pub const COORD_KEY_DECIMALS: u32 = 4;

const COORD_KEY_SCALE: f64 = 10_000.0; // 10^COORD_KEY_DECIMALS

/// A resolved geographic location. Immutable once resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

impl Location {
    pub fn key(&self) -> LocationKey {
        LocationKey {
            lat_e4: round_coord(self.latitude),
            lon_e4: round_coord(self.longitude),
        }
    }
}

fn round_coord(value: f64) -> i64 {
    (value * COORD_KEY_SCALE).round() as i64
}

/// Rounded coordinates, usable as a hash-map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey {
    pub lat_e4: i64,
    pub lon_e4: i64,
}

/// Notification cadence of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Hourly,
    Daily,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionKind::Hourly => "hourly",
            SubscriptionKind::Daily => "daily",
        }
    }
}

impl std::fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable subscription record. Immutable once created; changing cadence
/// means unsubscribe + resubscribe.
///
/// `utc_offset_seconds` is captured from the conditions provider at
/// subscribe time and anchors the daily 08:00 local fire time. It is not
/// re-resolved afterwards, so a daylight-saving transition shifts the fire
/// time by the DST delta until the user resubscribes. Known limitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub chat_id: i64,
    #[serde(flatten)]
    pub location: Location,
    pub kind: SubscriptionKind,
    pub utc_offset_seconds: i32,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn identity(&self) -> IdentityKey {
        IdentityKey {
            chat_id: self.chat_id,
            location: self.location.key(),
            kind: self.kind,
        }
    }
}

/// Unique identity of a subscription: at most one live subscription may
/// exist per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub chat_id: i64,
    pub location: LocationKey,
    pub kind: SubscriptionKind,
}

/// The three day-parts a forecast is reduced to.
///
/// Declaration order is the rendering order; the derived `Ord` keeps
/// `BTreeMap` iteration in Morning, Afternoon, Evening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SegmentLabel {
    Morning,
    Afternoon,
    Evening,
}

impl SegmentLabel {
    pub const ALL: [SegmentLabel; 3] =
        [SegmentLabel::Morning, SegmentLabel::Afternoon, SegmentLabel::Evening];

    /// The local hour this label aims for.
    pub fn target_hour(&self) -> u32 {
        match self {
            SegmentLabel::Morning => 9,
            SegmentLabel::Afternoon => 15,
            SegmentLabel::Evening => 21,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentLabel::Morning => "Morning",
            SegmentLabel::Afternoon => "Afternoon",
            SegmentLabel::Evening => "Evening",
        }
    }
}

/// One representative forecast sample chosen for a day-part.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSegment {
    pub local_time: String,
    pub temperature: f64,
    pub description: String,
}

/// One raw entry of the provider's fixed-interval forecast series.
#[derive(Debug, Clone)]
pub struct ForecastSample {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub description: String,
}

/// Current weather at a coordinate, including the location's UTC offset.
#[derive(Debug, Clone)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub description: String,
    pub utc_offset_seconds: i32,
}

/// Current air quality at a coordinate. All fields optional: the provider
/// may return an empty sample list.
#[derive(Debug, Clone, Default)]
pub struct AirQuality {
    pub index: Option<i64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
}

/// The structured record behind one rendered report. Built fresh per
/// notification, never persisted. Carries everything the advice generator
/// needs without re-parsing the rendered text.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionsReport {
    pub display_name: String,
    pub local_time: String,
    pub temperature: f64,
    pub description: String,
    pub aqi_index: Option<i64>,
    pub aqi_label: &'static str,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub segments: BTreeMap<SegmentLabel, ForecastSegment>,
}
