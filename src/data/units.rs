//! Physical units attached to slot descriptors.
//!
//! A unit is parsed from a compact product/quotient string such as
//! `"kg*m/s^2"` or `"mm/d"` into a map of atom -> exponent. Atoms known to the
//! built-in table reduce to SI base dimensions with a scale factor; unknown
//! atoms (e.g. `"USD"`) are treated as their own base dimension.
//! Example: "kg*m/s^2" -> { "kg": 1, "m": 1, "s": -2 }

use crate::error::{CouplingError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// (factor to SI, base dimensions) for every built-in atom.
fn atom(name: &str) -> Option<(f64, &'static [(&'static str, i32)])> {
    const LENGTH: &[(&str, i32)] = &[("m", 1)];
    const TIME: &[(&str, i32)] = &[("s", 1)];
    const MASS: &[(&str, i32)] = &[("kg", 1)];
    const VOLUME: &[(&str, i32)] = &[("m", 3)];
    const FORCE: &[(&str, i32)] = &[("kg", 1), ("m", 1), ("s", -2)];
    const PRESSURE: &[(&str, i32)] = &[("kg", 1), ("m", -1), ("s", -2)];
    const ENERGY: &[(&str, i32)] = &[("kg", 1), ("m", 2), ("s", -2)];
    const POWER: &[(&str, i32)] = &[("kg", 1), ("m", 2), ("s", -3)];
    const TEMPERATURE: &[(&str, i32)] = &[("K", 1)];
    const AMOUNT: &[(&str, i32)] = &[("mol", 1)];

    let entry = match name {
        "m" => (1.0, LENGTH),
        "km" => (1e3, LENGTH),
        "cm" => (1e-2, LENGTH),
        "mm" => (1e-3, LENGTH),
        "um" => (1e-6, LENGTH),
        "s" => (1.0, TIME),
        "ms" => (1e-3, TIME),
        "min" => (60.0, TIME),
        "h" => (3600.0, TIME),
        "d" => (86400.0, TIME),
        "kg" => (1.0, MASS),
        "g" => (1e-3, MASS),
        "mg" => (1e-6, MASS),
        "L" => (1e-3, VOLUME),
        "N" => (1.0, FORCE),
        "Pa" => (1.0, PRESSURE),
        "hPa" => (1e2, PRESSURE),
        "J" => (1.0, ENERGY),
        "W" => (1.0, POWER),
        "K" => (1.0, TEMPERATURE),
        "mol" => (1.0, AMOUNT),
        _ => return None,
    };
    Some(entry)
}

/// A parsed unit, mapping each atom to its (non-zero) exponent.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Unit {
    terms: BTreeMap<String, i32>,
}

impl Unit {
    pub fn dimensionless() -> Self { Self::default() }

    /// Parses a string like `"kg*m/s^2"`. The empty string and `"1"` are dimensionless.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || CouplingError::Config(format!("invalid unit string '{}'", s));
        let mut terms = BTreeMap::new();
        let mut parts = s.split('/');

        // Numerator
        if let Some(num_str) = parts.next() {
            Self::parse_product(num_str, 1, &mut terms).map_err(|_| invalid())?;
        }

        // Denominator
        if let Some(den_str) = parts.next() {
            if den_str.trim().is_empty() {
                return Err(invalid());
            }
            Self::parse_product(den_str, -1, &mut terms).map_err(|_| invalid())?;
        }

        // Ensure no more than one '/' was present
        if parts.next().is_some() {
            return Err(invalid());
        }

        terms.retain(|_, exp| *exp != 0);
        Ok(Self { terms })
    }

    fn parse_product(product_str: &str, sign: i32, terms: &mut BTreeMap<String, i32>) -> std::result::Result<(), ()> {
        let product_str = product_str.trim();
        if product_str.is_empty() || product_str == "1" {
            return Ok(());
        }

        for factor_str in product_str.split('*') {
            let mut factor_parts = factor_str.split('^');
            let base = factor_parts.next().ok_or(())?.trim();
            if base.is_empty() || base.chars().any(|c| c.is_whitespace() || c.is_ascii_digit()) {
                return Err(());
            }

            let exponent = match factor_parts.next() {
                Some(exp_str) => exp_str.trim().parse::<i32>().map_err(|_| ())?,
                None => 1,
            };
            if factor_parts.next().is_some() {
                return Err(());
            }

            *terms.entry(base.to_string()).or_insert(0) += exponent * sign;
        }
        Ok(())
    }

    pub fn is_dimensionless(&self) -> bool { self.reduce().1.is_empty() }

    /// Reduces the atoms to (factor to base units, base dimensions).
    fn reduce(&self) -> (f64, BTreeMap<String, i32>) {
        let mut factor = 1.0;
        let mut dims: BTreeMap<String, i32> = BTreeMap::new();
        for (name, &exp) in &self.terms {
            match atom(name) {
                Some((scale, base)) => {
                    factor *= scale.powi(exp);
                    for &(dim, dim_exp) in base {
                        *dims.entry(dim.to_string()).or_insert(0) += dim_exp * exp;
                    }
                }
                None => *dims.entry(name.clone()).or_insert(0) += exp,
            }
        }
        dims.retain(|_, exp| *exp != 0);
        (factor, dims)
    }

    /// Dimension-compatible: both reduce to the same base dimensions.
    pub fn compatible_with(&self, other: &Unit) -> bool {
        self.reduce().1 == other.reduce().1
    }

    /// Factor converting a magnitude in `self` into `other`, if compatible.
    pub fn factor_to(&self, other: &Unit) -> Option<f64> {
        let (f_self, d_self) = self.reduce();
        let (f_other, d_other) = other.reduce();
        if d_self != d_other {
            return None;
        }
        Some(f_self / f_other)
    }

    /// Merges another unit into this one, effectively multiplying them.
    pub fn multiply_by(&mut self, other: &Self) {
        for (base, exponent) in &other.terms {
            *self.terms.entry(base.clone()).or_insert(0) += exponent;
        }
        self.terms.retain(|_, exp| *exp != 0);
    }

    /// Merges another unit into this one, effectively dividing by it.
    pub fn divide_by(&mut self, other: &Self) {
        for (base, exponent) in &other.terms {
            *self.terms.entry(base.clone()).or_insert(0) -= exponent;
        }
        self.terms.retain(|_, exp| *exp != 0);
    }

    pub fn times(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.multiply_by(other);
        out
    }
}

impl fmt::Display for Unit {
    /// Canonical form: atoms sorted, numerator then denominator, `""` if dimensionless.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (num_terms, den_terms): (Vec<_>, Vec<_>) =
            self.terms.iter().partition(|&(_, &exp)| exp > 0);

        let format_term = |(base, &exp): (&String, &i32)| {
            if exp.abs() == 1 { base.clone() } else { format!("{}^{}", base, exp.abs()) }
        };
        let format_product = |terms: Vec<(&String, &i32)>| -> String {
            if terms.is_empty() { return "1".to_string(); }
            terms.into_iter().map(format_term).collect::<Vec<_>>().join("*")
        };

        let num_str = format_product(num_terms);
        let den_str = format_product(den_terms);

        if den_str == "1" {
            if num_str == "1" { Ok(()) } else { f.write_str(&num_str) }
        } else {
            write!(f, "{}/{}", num_str, den_str)
        }
    }
}

impl FromStr for Unit {
    type Err = CouplingError;
    fn from_str(s: &str) -> Result<Self> { Unit::parse(s) }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Unit::parse(&s).map_err(serde::de::Error::custom)
    }
}
