//! Domain DTOs for the Sesame API.
//!
//! # Design
//! Field names follow the vendor's JSON exactly through `serde` renames.
//! `LockState` and `HistoryType` are open enums: values the server adds later
//! decode into an `Unknown` variant that keeps the raw wire value instead of
//! failing the whole response.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time reading of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub battery_percentage: i64,
    pub battery_voltage: f64,
    pub position: i64,
    #[serde(rename = "CHSesame2Status")]
    pub lock_state: LockState,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Mechanical lock state reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LockState {
    Locked,
    Unlocked,
    /// Transitional or ambiguous position.
    Moved,
    Unknown(String),
}

impl LockState {
    pub fn as_str(&self) -> &str {
        match self {
            LockState::Locked => "locked",
            LockState::Unlocked => "unlocked",
            LockState::Moved => "moved",
            LockState::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, LockState::Unknown(_))
    }
}

impl From<String> for LockState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "locked" => LockState::Locked,
            "unlocked" => LockState::Unlocked,
            "moved" => LockState::Moved,
            _ => LockState::Unknown(raw),
        }
    }
}

impl From<LockState> for String {
    fn from(state: LockState) -> Self {
        match state {
            LockState::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged event for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "recordID")]
    pub record_id: i64,
    #[serde(rename = "type")]
    pub event_type: HistoryType,
    #[serde(rename = "historyTag")]
    pub tag: String,
    #[serde(rename = "devicePk")]
    pub device_public_key: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Event category of a history record, wire values 0 through 13.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum HistoryType {
    None,
    BleLock,
    BleUnlock,
    TimeChanged,
    AutoLockUpdated,
    MechSettingUpdated,
    AutoLock,
    ManualLocked,
    ManualUnlocked,
    ManualElse,
    DriveLocked,
    DriveUnlocked,
    DriveFailed,
    BleAdvParameterUpdated,
    Unknown(i64),
}

impl HistoryType {
    pub fn code(self) -> i64 {
        match self {
            HistoryType::None => 0,
            HistoryType::BleLock => 1,
            HistoryType::BleUnlock => 2,
            HistoryType::TimeChanged => 3,
            HistoryType::AutoLockUpdated => 4,
            HistoryType::MechSettingUpdated => 5,
            HistoryType::AutoLock => 6,
            HistoryType::ManualLocked => 7,
            HistoryType::ManualUnlocked => 8,
            HistoryType::ManualElse => 9,
            HistoryType::DriveLocked => 10,
            HistoryType::DriveUnlocked => 11,
            HistoryType::DriveFailed => 12,
            HistoryType::BleAdvParameterUpdated => 13,
            HistoryType::Unknown(raw) => raw,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, HistoryType::Unknown(_))
    }
}

impl From<i64> for HistoryType {
    fn from(code: i64) -> Self {
        match code {
            0 => HistoryType::None,
            1 => HistoryType::BleLock,
            2 => HistoryType::BleUnlock,
            3 => HistoryType::TimeChanged,
            4 => HistoryType::AutoLockUpdated,
            5 => HistoryType::MechSettingUpdated,
            6 => HistoryType::AutoLock,
            7 => HistoryType::ManualLocked,
            8 => HistoryType::ManualUnlocked,
            9 => HistoryType::ManualElse,
            10 => HistoryType::DriveLocked,
            11 => HistoryType::DriveUnlocked,
            12 => HistoryType::DriveFailed,
            13 => HistoryType::BleAdvParameterUpdated,
            raw => HistoryType::Unknown(raw),
        }
    }
}

impl From<HistoryType> for i64 {
    fn from(kind: HistoryType) -> Self {
        kind.code()
    }
}

impl fmt::Display for HistoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryType::Unknown(raw) => write!(f, "HistoryType({raw})"),
            known => fmt::Debug::fmt(known, f),
        }
    }
}

/// Timestamps arrive as RFC 3339 strings or as Unix time.
///
/// Numbers at or above 10^11 are read as milliseconds, smaller ones as
/// seconds. Serialization always writes RFC 3339.
pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const MILLIS_THRESHOLD: i64 = 100_000_000_000;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Int(i64),
        Float(f64),
        Text(String),
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Wire::deserialize(deserializer)? {
            Wire::Int(raw) => from_int(raw)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {raw}"))),
            Wire::Float(raw) => from_float(raw)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {raw}"))),
            Wire::Text(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}"))),
        }
    }

    fn from_int(raw: i64) -> Option<DateTime<Utc>> {
        if raw.unsigned_abs() >= MILLIS_THRESHOLD as u64 {
            DateTime::<Utc>::from_timestamp_millis(raw)
        } else {
            DateTime::<Utc>::from_timestamp(raw, 0)
        }
    }

    fn from_float(raw: f64) -> Option<DateTime<Utc>> {
        if !raw.is_finite() {
            return None;
        }
        let raw = if raw.abs() >= MILLIS_THRESHOLD as f64 {
            raw / 1000.0
        } else {
            raw
        };
        let secs = raw.floor();
        let nanos = ((raw - secs) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::<Utc>::from_timestamp(secs as i64, nanos)
    }
}
