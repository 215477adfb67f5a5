//! Unit dimensional analysis for metric values.
//!
//! Metric units are represented in terms of three base dimensions with
//! per-dimension scales:
//!
//! - **Space**: byte through exabyte, 1024 per step
//! - **Time**: nanosecond through hour (1000/1000/1000/60/60 per step)
//! - **Count**: events, scaled by powers of ten
//!
//! A unit is a triple of small signed exponents plus one scale per dimension.
//! `byte / sec` is `{dim_space: 1, dim_time: -1}` with scales `Byte` and
//! `Sec`. Scales in dimensions with a zero exponent are not significant.
//!
//! # Examples
//!
//! ```
//! use metra_types::units::{Units, SpaceScale, TimeScale};
//!
//! let throughput = Units::space(SpaceScale::KByte).divide(&Units::time(TimeScale::Sec));
//! assert_eq!(throughput.dim_space, 1);
//! assert_eq!(throughput.dim_time, -1);
//! assert_eq!(throughput.to_string(), "kbyte / sec");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale for the space dimension. Successive scales differ by a factor
/// of 1024.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SpaceScale {
    /// Bytes
    #[default]
    Byte = 0,
    /// Kilobytes (1024 bytes)
    KByte,
    /// Megabytes
    MByte,
    /// Gigabytes
    GByte,
    /// Terabytes
    TByte,
    /// Petabytes
    PByte,
    /// Exabytes
    EByte,
}

/// Scale for the time dimension. Steps are not uniform: nsec/usec/msec/sec
/// differ by 1000, sec/min/hour by 60.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TimeScale {
    /// Nanoseconds
    #[default]
    Nsec = 0,
    /// Microseconds
    Usec,
    /// Milliseconds
    Msec,
    /// Seconds
    Sec,
    /// Minutes
    Min,
    /// Hours
    Hour,
}

impl SpaceScale {
    /// Multiplicative factor between this scale and a coarser one.
    ///
    /// Returns 1 when `to` is not coarser.
    pub fn factor_to(self, to: SpaceScale) -> i64 {
        let steps = (to as i64 - self as i64).max(0);
        1024_i64.pow(steps as u32)
    }

    fn keyword(self) -> &'static str {
        match self {
            SpaceScale::Byte => "byte",
            SpaceScale::KByte => "kbyte",
            SpaceScale::MByte => "mbyte",
            SpaceScale::GByte => "gbyte",
            SpaceScale::TByte => "tbyte",
            SpaceScale::PByte => "pbyte",
            SpaceScale::EByte => "ebyte",
        }
    }
}

impl TimeScale {
    /// Multiplicative factor between this scale and a coarser one.
    ///
    /// Returns 1 when `to` is not coarser.
    pub fn factor_to(self, to: TimeScale) -> i64 {
        // Step factors from Nsec upwards.
        const STEPS: [i64; 5] = [1000, 1000, 1000, 60, 60];
        let (from, to) = (self as usize, to as usize);
        if to <= from {
            return 1;
        }
        STEPS[from..to].iter().product()
    }

    /// Length of one unit at this scale, in seconds.
    pub fn seconds_per_unit(self) -> f64 {
        match self {
            TimeScale::Nsec => 1e-9,
            TimeScale::Usec => 1e-6,
            TimeScale::Msec => 1e-3,
            TimeScale::Sec => 1.0,
            TimeScale::Min => 60.0,
            TimeScale::Hour => 3600.0,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            TimeScale::Nsec => "nsec",
            TimeScale::Usec => "usec",
            TimeScale::Msec => "msec",
            TimeScale::Sec => "sec",
            TimeScale::Min => "min",
            TimeScale::Hour => "hour",
        }
    }
}

/// Factor between two powers-of-ten count scales.
///
/// Returns 1 when `to` is not larger than `from`.
pub fn count_factor(from: i8, to: i8) -> i64 {
    let steps = (to as i64 - from as i64).max(0);
    10_i64.pow(steps as u32)
}

/// Unit of a metric value: dimension exponents plus a scale per dimension.
///
/// Scales only carry meaning in dimensions with a non-zero exponent; the
/// analyser keeps them at their defaults elsewhere. `scale_count` is the
/// power of ten applied to the count dimension.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Units {
    /// Space dimension exponent
    pub dim_space: i8,
    /// Time dimension exponent
    pub dim_time: i8,
    /// Count dimension exponent
    pub dim_count: i8,
    /// Scale of the space dimension
    pub scale_space: SpaceScale,
    /// Scale of the time dimension
    pub scale_time: TimeScale,
    /// Scale of the count dimension (power of ten)
    pub scale_count: i8,
}

impl Units {
    /// Dimensionless unit constant (all exponents zero).
    pub const NONE: Units = Units {
        dim_space: 0,
        dim_time: 0,
        dim_count: 0,
        scale_space: SpaceScale::Byte,
        scale_time: TimeScale::Nsec,
        scale_count: 0,
    };

    /// Unit of one space dimension at the given scale.
    pub const fn space(scale: SpaceScale) -> Units {
        Units {
            dim_space: 1,
            scale_space: scale,
            ..Units::NONE
        }
    }

    /// Unit of one time dimension at the given scale.
    pub const fn time(scale: TimeScale) -> Units {
        Units {
            dim_time: 1,
            scale_time: scale,
            ..Units::NONE
        }
    }

    /// Unit of one count dimension at the given power-of-ten scale.
    pub const fn count(scale: i8) -> Units {
        Units {
            dim_count: 1,
            scale_count: scale,
            ..Units::NONE
        }
    }

    /// Check if all dimensions are zero.
    pub fn is_dimensionless(&self) -> bool {
        self.dim_space == 0 && self.dim_time == 0 && self.dim_count == 0
    }

    /// Check if two units have identical dimension exponents.
    ///
    /// Scales are ignored; this is the compatibility test for addition,
    /// subtraction and comparison.
    pub fn same_dimensions(&self, other: &Units) -> bool {
        self.dim_space == other.dim_space
            && self.dim_time == other.dim_time
            && self.dim_count == other.dim_count
    }

    /// Multiply units: dimension exponents add.
    ///
    /// Scales of dimensions contributed only by `other` are inherited from
    /// it; otherwise this unit's scale is kept. Callers reconcile mismatched
    /// scales before multiplying.
    pub fn multiply(&self, other: &Units) -> Units {
        let dims = Units {
            dim_space: self.dim_space + other.dim_space,
            dim_time: self.dim_time + other.dim_time,
            dim_count: self.dim_count + other.dim_count,
            ..*self
        };
        dims.inherit_scales(self, other)
    }

    /// Divide units: dimension exponents subtract.
    pub fn divide(&self, other: &Units) -> Units {
        let dims = Units {
            dim_space: self.dim_space - other.dim_space,
            dim_time: self.dim_time - other.dim_time,
            dim_count: self.dim_count - other.dim_count,
            ..*self
        };
        dims.inherit_scales(self, other)
    }

    /// For each non-zero result dimension where `left` contributed nothing,
    /// take the scale from `right`.
    fn inherit_scales(mut self, left: &Units, right: &Units) -> Units {
        if self.dim_space != 0 && left.dim_space == 0 {
            self.scale_space = right.scale_space;
        }
        if self.dim_time != 0 && left.dim_time == 0 {
            self.scale_time = right.scale_time;
        }
        if self.dim_count != 0 && left.dim_count == 0 {
            self.scale_count = right.scale_count;
        }
        self
    }
}

fn fmt_dim(parts: &mut Vec<String>, keyword: &str, exponent: i8) {
    match exponent {
        1 => parts.push(keyword.to_string()),
        exp => parts.push(format!("{}^{}", keyword, exp)),
    }
}

impl fmt::Display for Units {
    /// Render in the same form the units clause of the DSL accepts, e.g.
    /// `kbyte / sec` or `byte^2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "none");
        }

        let mut num = Vec::new();
        let mut den = Vec::new();

        if self.dim_space > 0 {
            fmt_dim(&mut num, self.scale_space.keyword(), self.dim_space);
        } else if self.dim_space < 0 {
            fmt_dim(&mut den, self.scale_space.keyword(), -self.dim_space);
        }
        if self.dim_time > 0 {
            fmt_dim(&mut num, self.scale_time.keyword(), self.dim_time);
        } else if self.dim_time < 0 {
            fmt_dim(&mut den, self.scale_time.keyword(), -self.dim_time);
        }
        if self.dim_count > 0 {
            fmt_dim(&mut num, "count", self.dim_count);
        } else if self.dim_count < 0 {
            fmt_dim(&mut den, "count", -self.dim_count);
        }

        let mut out = num.join(" ");
        for d in &den {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str("/ ");
            out.push_str(d);
        }
        write!(f, "{}", out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensionless() {
        assert!(Units::NONE.is_dimensionless());
        assert!(!Units::space(SpaceScale::Byte).is_dimensionless());
    }

    #[test]
    fn test_space_factor() {
        assert_eq!(SpaceScale::Byte.factor_to(SpaceScale::KByte), 1024);
        assert_eq!(SpaceScale::Byte.factor_to(SpaceScale::MByte), 1024 * 1024);
        assert_eq!(SpaceScale::MByte.factor_to(SpaceScale::Byte), 1);
        assert_eq!(SpaceScale::GByte.factor_to(SpaceScale::GByte), 1);
    }

    #[test]
    fn test_time_factor() {
        assert_eq!(TimeScale::Nsec.factor_to(TimeScale::Usec), 1000);
        assert_eq!(TimeScale::Msec.factor_to(TimeScale::Sec), 1000);
        assert_eq!(TimeScale::Sec.factor_to(TimeScale::Min), 60);
        assert_eq!(TimeScale::Sec.factor_to(TimeScale::Hour), 3600);
        assert_eq!(TimeScale::Nsec.factor_to(TimeScale::Sec), 1_000_000_000);
        assert_eq!(TimeScale::Hour.factor_to(TimeScale::Sec), 1);
    }

    #[test]
    fn test_count_factor() {
        assert_eq!(count_factor(0, 2), 100);
        assert_eq!(count_factor(-1, 1), 100);
        assert_eq!(count_factor(2, 0), 1);
    }

    #[test]
    fn test_multiply() {
        let rate = Units::space(SpaceScale::Byte).divide(&Units::time(TimeScale::Sec));
        assert_eq!(rate.dim_space, 1);
        assert_eq!(rate.dim_time, -1);
        assert_eq!(rate.scale_time, TimeScale::Sec);

        let restored = rate.multiply(&Units::time(TimeScale::Sec));
        assert_eq!(restored.dim_time, 0);
        assert_eq!(restored.dim_space, 1);
    }

    #[test]
    fn test_scale_inherited_from_right() {
        // Left is dimensionless in time, so time scale comes from right.
        let per_sec = Units::NONE.divide(&Units::time(TimeScale::Sec));
        assert_eq!(per_sec.dim_time, -1);
        assert_eq!(per_sec.scale_time, TimeScale::Sec);
    }

    #[test]
    fn test_display() {
        let tput = Units::space(SpaceScale::KByte).divide(&Units::time(TimeScale::Sec));
        assert_eq!(tput.to_string(), "kbyte / sec");

        let area = Units {
            dim_space: 2,
            ..Units::NONE
        };
        assert_eq!(area.to_string(), "byte^2");

        let hz = Units::NONE.divide(&Units::time(TimeScale::Sec));
        assert_eq!(hz.to_string(), "/ sec");

        assert_eq!(Units::count(0).to_string(), "count");
        assert_eq!(Units::NONE.to_string(), "none");
    }
}
