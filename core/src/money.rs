// core/src/money.rs

//! Whole-cent amounts. The backend speaks dollars as JSON numbers; everything in this crate
//! computes in cents.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
  pub const ZERO: Money = Money(0);

  pub const fn from_cents(cents: i64) -> Self {
    Money(cents)
  }

  pub const fn from_whole(units: i64) -> Self {
    Money(units * 100)
  }

  /// Rounds to the nearest cent.
  pub fn from_dollars(dollars: f64) -> Self {
    Money((dollars * 100.0).round() as i64)
  }

  pub const fn cents(self) -> i64 {
    self.0
  }

  pub fn as_dollars(self) -> f64 {
    self.0 as f64 / 100.0
  }

  pub fn is_positive(self) -> bool {
    self.0 > 0
  }

  pub fn max(self, other: Money) -> Money {
    Money(self.0.max(other.0))
  }

  pub fn min(self, other: Money) -> Money {
    Money(self.0.min(other.0))
  }

  /// Subtraction floored at zero.
  pub fn saturating_sub(self, other: Money) -> Money {
    Money((self.0 - other.0).max(0))
  }

  /// `ceil(self * percent / 100)` to the next whole currency unit.
  pub fn percent_of_ceil_whole(self, percent: u32) -> Money {
    let scaled = self.0 * i64::from(percent);
    // 100 (percent) * 100 (cents per unit)
    let units = (scaled + 9_999).div_euclid(10_000);
    Money::from_whole(units)
  }
}

impl Add for Money {
  type Output = Money;
  fn add(self, rhs: Money) -> Money {
    Money(self.0 + rhs.0)
  }
}

impl AddAssign for Money {
  fn add_assign(&mut self, rhs: Money) {
    self.0 += rhs.0;
  }
}

impl Sub for Money {
  type Output = Money;
  fn sub(self, rhs: Money) -> Money {
    Money(self.0 - rhs.0)
  }
}

impl Sum for Money {
  fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
    iter.fold(Money::ZERO, Add::add)
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.abs();
    write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
  }
}

impl Serialize for Money {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(self.as_dollars())
  }
}

impl<'de> Deserialize<'de> for Money {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    f64::deserialize(deserializer).map(Money::from_dollars)
  }
}
