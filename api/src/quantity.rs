use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{cmp::Ordering, fmt, str::FromStr};

/// An opaque resource magnitude.
///
/// A quantity is stored in milli-units and exposes two projection views:
/// [`Quantity::value`] (whole units, rounded up) and [`Quantity::milli_value`]
/// (thousandths, used for CPU). The format tag records how the quantity was
/// written and only affects display; comparisons are by magnitude alone.
#[derive(Copy, Clone)]
pub struct Quantity {
    millis: i64,
    format: Format,
}

/// The suffix family a quantity is rendered with.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Powers of two: `Ki`, `Mi`, `Gi`, `Ti`, `Pi`.
    BinarySi,
    /// Powers of ten: `m`, `k`, `M`, `G`, `T`, `P`.
    #[default]
    DecimalSi,
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid suffix: {}", EXPECTED_SUFFIXES)]
    InvalidSuffix,

    #[error("quantity overflows a signed 64-bit milli-unit count")]
    Overflow,

    #[error("invalid number: {}", .0)]
    NotANumber(#[from] std::num::ParseIntError),
}

const EXPECTED_SUFFIXES: &str =
    "expected one of 'm', 'k', 'M', 'G', 'T', 'P', 'Ki', 'Mi', 'Gi', 'Ti', or 'Pi'";

const DECIMAL_SUFFIXES: &[&str] = &["", "k", "M", "G", "T", "P"];
const BINARY_SUFFIXES: &[&str] = &["", "Ki", "Mi", "Gi", "Ti", "Pi"];

impl Quantity {
    /// A quantity of `value` whole units.
    pub fn new(value: i64, format: Format) -> Self {
        Self {
            millis: value.saturating_mul(1000),
            format,
        }
    }

    /// A quantity of `millis` thousandths of a unit.
    pub fn from_millis(millis: i64, format: Format) -> Self {
        Self { millis, format }
    }

    /// The whole-unit view, rounding any milli remainder up.
    pub fn value(&self) -> i64 {
        if self.millis.rem_euclid(1000) == 0 {
            self.millis / 1000
        } else {
            self.millis.div_euclid(1000) + 1
        }
    }

    /// The milli-unit view.
    pub fn milli_value(&self) -> i64 {
        self.millis
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self {
            millis: 0,
            format: Format::DecimalSi,
        }
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.millis == other.millis
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.millis.cmp(&other.millis)
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis.rem_euclid(1000) != 0 {
            return write!(f, "{}m", self.millis);
        }

        let mut value = self.millis / 1000;
        let (base, suffixes) = match self.format {
            Format::BinarySi => (1024, BINARY_SUFFIXES),
            Format::DecimalSi => (1000, DECIMAL_SUFFIXES),
        };
        let mut idx = 0;
        while value != 0 && value % base == 0 && idx + 1 < suffixes.len() {
            value /= base;
            idx += 1;
        }
        write!(f, "{}{}", value, suffixes[idx])
    }
}

impl FromStr for Quantity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let suffix_start = s
            .find(|c: char| c.is_alphabetic())
            .unwrap_or_else(|| s.len());
        let (number, suffix) = s.split_at(suffix_start);
        let number = number.parse::<i64>()?;

        let milli = |scale: i64| {
            number
                .checked_mul(scale)
                .and_then(|v| v.checked_mul(1000))
                .ok_or(ParseError::Overflow)
        };
        match suffix {
            "" => Ok(Self::from_millis(milli(1)?, Format::DecimalSi)),
            "m" => Ok(Self::from_millis(number, Format::DecimalSi)),
            "k" => Ok(Self::from_millis(milli(1000)?, Format::DecimalSi)),
            "M" => Ok(Self::from_millis(milli(1000 * 1000)?, Format::DecimalSi)),
            "G" => Ok(Self::from_millis(
                milli(1000 * 1000 * 1000)?,
                Format::DecimalSi,
            )),
            "T" => Ok(Self::from_millis(
                milli(1000i64.pow(4))?,
                Format::DecimalSi,
            )),
            "P" => Ok(Self::from_millis(
                milli(1000i64.pow(5))?,
                Format::DecimalSi,
            )),
            "Ki" => Ok(Self::from_millis(milli(1024)?, Format::BinarySi)),
            "Mi" => Ok(Self::from_millis(milli(1024 * 1024)?, Format::BinarySi)),
            "Gi" => Ok(Self::from_millis(
                milli(1024 * 1024 * 1024)?,
                Format::BinarySi,
            )),
            "Ti" => Ok(Self::from_millis(milli(1024i64.pow(4))?, Format::BinarySi)),
            "Pi" => Ok(Self::from_millis(milli(1024i64.pow(5))?, Format::BinarySi)),
            _ => Err(ParseError::InvalidSuffix),
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a quantity string like '100m', '250', or '512Mi'")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse::<Quantity>().map_err(de::Error::custom)
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Quantity::new(value, Format::DecimalSi))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                i64::try_from(value)
                    .map(|v| Quantity::new(v, Format::DecimalSi))
                    .map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_any(Visitor)
    }
}
