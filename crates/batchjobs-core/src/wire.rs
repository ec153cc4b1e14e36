//! JSON wire encodings used by the Batch REST API
//!
//! The REST surface follows the protobuf JSON mapping: 64-bit integers are
//! written as strings and durations as `"<seconds>s"`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Serde adapter for `u64` fields carried as JSON strings.
///
/// Accepts both `"3"` and `3` on input.
pub mod int64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        deserializer.deserialize_any(Int64Visitor)
    }

    struct Int64Visitor;

    impl<'de> Visitor<'de> for Int64Visitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("negative value: {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            v.parse()
                .map_err(|_| E::custom(format!("invalid integer string: {:?}", v)))
        }
    }
}

/// Skip helper for fields left at their proto3 default
pub fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// A protobuf `Duration`, encoded as `"3600s"` or `"1.5s"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ProtoDuration(pub Duration);

impl ProtoDuration {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for ProtoDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl fmt::Display for ProtoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let nanos = self.0.subsec_nanos();
        if nanos == 0 {
            write!(f, "{}s", secs)
        } else {
            let frac = format!("{:09}", nanos);
            write!(f, "{}.{}s", secs, frac.trim_end_matches('0'))
        }
    }
}

impl std::str::FromStr for ProtoDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_suffix('s')
            .ok_or_else(|| format!("duration {:?} is missing the 's' suffix", s))?;
        let (secs, frac) = match body.split_once('.') {
            Some((secs, frac)) => (secs, frac),
            None => (body, ""),
        };
        let secs: u64 = secs
            .parse()
            .map_err(|_| format!("invalid duration seconds in {:?}", s))?;
        if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid duration fraction in {:?}", s));
        }
        let nanos: u32 = if frac.is_empty() {
            0
        } else {
            format!("{:0<9}", frac)
                .parse()
                .map_err(|_| format!("invalid duration fraction in {:?}", s))?
        };
        Ok(Self(Duration::new(secs, nanos)))
    }
}

impl Serialize for ProtoDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProtoDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
