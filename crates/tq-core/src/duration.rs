//! Non-negative time spans and their wire representation.
//!
//! Durations are held as integer nanoseconds. On the wire they are written as
//! `{"value": <number>, "unit": "s"}`, where the number is an integer when the
//! span is a whole number of seconds and a float otherwise.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use chrono::TimeDelta;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;

use crate::types::ValidationError;

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// The only unit accepted on the wire.
pub const SECONDS_UNIT: &str = "s";

/// A non-negative span of time with nanosecond precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(i64);

/// Serialized form of a [`Duration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDuration {
    pub value: Number,
    pub unit: String,
}

impl Duration {
    /// The empty span.
    pub const ZERO: Self = Self(0);

    /// Creates a duration from nanoseconds, rejecting negative values.
    pub const fn from_nanos(nanos: i64) -> Result<Self, ValidationError> {
        if nanos < 0 {
            return Err(ValidationError::NegativeDuration { nanos });
        }
        Ok(Self(nanos))
    }

    /// Creates a duration of whole seconds.
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs as i64 * NANOS_PER_SEC)
    }

    /// Creates a duration of whole milliseconds.
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis as i64 * NANOS_PER_MILLI)
    }

    /// Converts a chrono delta, clamping into the representable range.
    pub fn saturating_from_time_delta(delta: TimeDelta) -> Self {
        match delta.num_nanoseconds() {
            Some(nanos) => Self(nanos.max(0)),
            None if delta < TimeDelta::zero() => Self::ZERO,
            None => Self(i64::MAX),
        }
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_time_delta(self) -> TimeDelta {
        TimeDelta::nanoseconds(self.0)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Returns the wire form.
    ///
    /// Whole seconds serialize as an integer, anything else as a float.
    pub fn to_wire(self) -> WireDuration {
        let value = if self.0 % NANOS_PER_SEC == 0 {
            Number::from(self.0 / NANOS_PER_SEC)
        } else {
            // Finite by construction, so from_f64 cannot fail here.
            Number::from_f64(self.as_secs_f64()).unwrap_or_else(|| Number::from(0))
        };
        WireDuration {
            value,
            unit: SECONDS_UNIT.to_string(),
        }
    }

    /// Parses the wire form.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn from_wire(wire: &WireDuration) -> Result<Self, ValidationError> {
        if wire.unit != SECONDS_UNIT {
            return Err(ValidationError::UnsupportedUnit {
                unit: wire.unit.clone(),
            });
        }
        if let Some(secs) = wire.value.as_i64() {
            let nanos = secs
                .checked_mul(NANOS_PER_SEC)
                .ok_or(ValidationError::DurationOutOfRange)?;
            return Self::from_nanos(nanos);
        }
        if wire.value.as_u64().is_some() {
            return Err(ValidationError::DurationOutOfRange);
        }
        let secs = wire.value.as_f64().unwrap_or(f64::NAN);
        let nanos = (secs * NANOS_PER_SEC as f64).round();
        if !nanos.is_finite() || nanos >= i64::MAX as f64 {
            return Err(ValidationError::DurationOutOfRange);
        }
        Self::from_nanos(nanos as i64)
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl Sum for Duration {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

impl<'a> Sum<&'a Self> for Duration {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.to_wire().value)
    }
}

impl Serialize for Duration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = WireDuration::deserialize(deserializer)?;
        Self::from_wire(&wire).map_err(D::Error::custom)
    }
}
