//! The slot descriptor (`Info`) and its compatibility rules.
//!
//! Every field is optional: `None` (and `Null` for meta entries) means
//! "unset, to be filled during negotiation". Equality ignores `time`.

use super::domain::{DomainRef, Domain};
use super::mask::Mask;
use super::units::Unit;
use super::value::Value;
use crate::error::{CouplingError, FieldMismatches, Result};
use crate::time::SimTime;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Info {
    pub time: Option<SimTime>,
    pub domain: Option<DomainRef>,
    pub units: Option<Unit>,
    pub mask: Option<Mask>,
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl Info {
    /// Descriptor with dimensionless units and a flexible mask.
    pub fn new(time: Option<SimTime>, domain: Option<DomainRef>) -> Self {
        Self {
            time,
            domain,
            units: Some(Unit::dimensionless()),
            mask: Some(Mask::Flex),
            meta: BTreeMap::new(),
        }
    }

    // --- Derivation ---

    pub fn with_time(mut self, time: impl Into<Option<SimTime>>) -> Self {
        self.time = time.into();
        self
    }

    pub fn with_domain<D: Domain + 'static>(mut self, domain: D) -> Self {
        self.domain = Some(Arc::new(domain));
        self
    }

    pub fn with_domain_ref(mut self, domain: Option<DomainRef>) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_units(mut self, units: impl Into<Option<Unit>>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_mask(mut self, mask: impl Into<Option<Mask>>) -> Self {
        self.mask = mask.into();
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    /// Copy of `self` with every field that is set in `other` taken from `other`.
    pub fn overlay(&self, other: &Info) -> Info {
        let mut out = self.clone();
        if other.time.is_some() { out.time = other.time; }
        if other.domain.is_some() { out.domain = other.domain.clone(); }
        if other.units.is_some() { out.units = other.units.clone(); }
        if other.mask.is_some() { out.mask = other.mask.clone(); }
        for (k, v) in &other.meta {
            if !v.is_null() {
                out.meta.insert(k.clone(), v.clone());
            }
        }
        out
    }

    /// Descriptor agreed by an input: the source's descriptor with the
    /// request's set fields on top. The mask always stays the source's.
    pub fn merged_with_request(&self, request: &Info) -> Info {
        let mut out = self.overlay(request);
        out.mask = self.mask.clone();
        out
    }

    /// Fills unset fields from a downstream request.
    ///
    /// A field unset on both sides is a metadata error. `time` may stay unset
    /// on static slots.
    pub fn fill_from(&mut self, slot: &str, request: &Info, is_static: bool) -> Result<()> {
        let missing = |field: &str| {
            CouplingError::meta(
                slot,
                format!("can't set property '{}' from target info, as it is not provided", field),
            )
        };

        if self.domain.is_none() {
            self.domain = Some(request.domain.clone().ok_or_else(|| missing("domain"))?);
        }
        if self.time.is_none() {
            if !is_static && request.time.is_none() {
                return Err(missing("time"));
            }
            self.time = request.time;
        }
        if self.units.is_none() {
            self.units = Some(request.units.clone().ok_or_else(|| missing("units"))?);
        }
        if self.mask.is_none() {
            self.mask = Some(request.mask.clone().ok_or_else(|| missing("mask"))?);
        }
        for (k, v) in self.meta.iter_mut() {
            if v.is_null() {
                match request.meta.get(k) {
                    Some(r) if !r.is_null() => *v = r.clone(),
                    _ => return Err(missing(&format!("meta.{}", k))),
                }
            }
        }
        Ok(())
    }

    // --- Compatibility ---

    /// Checks whether this descriptor can accept `incoming`.
    ///
    /// Fields unset on `self` are not checked. When `incoming_is_downstream`,
    /// an unset incoming field is accepted, and `self` plays the upstream role
    /// for domain/mask/unit direction. Returns every failing field as
    /// name -> (got, expected).
    pub fn accepts(&self, incoming: &Info, incoming_is_downstream: bool) -> std::result::Result<(), FieldMismatches> {
        let mut failures = FieldMismatches::new();
        let lenient = incoming_is_downstream;

        if let Some(own) = &self.domain {
            let ok = match &incoming.domain {
                None => lenient,
                Some(other) if lenient => own.compatible_with(other.as_ref()),
                Some(other) => other.compatible_with(own.as_ref()),
            };
            if !ok {
                failures.insert("domain".into(), (fmt_domain(&incoming.domain), fmt_domain(&self.domain)));
            }
        }

        if let Some(own) = &self.mask {
            let ok = match &incoming.mask {
                None => lenient,
                Some(other) if lenient => Mask::compatible(own, other),
                Some(other) => Mask::compatible(other, own),
            };
            if !ok {
                failures.insert("mask".into(), (fmt_mask(&incoming.mask), fmt_mask(&self.mask)));
            }
        }

        if let Some(own) = &self.units {
            let ok = match &incoming.units {
                None => lenient,
                Some(other) => own.compatible_with(other),
            };
            if !ok {
                failures.insert("units".into(), (fmt_units(&incoming.units), fmt_units(&self.units)));
            }
        }

        if failures.is_empty() { Ok(()) } else { Err(failures) }
    }

    /// Validates a pushed or pulled value against this descriptor.
    pub fn check_value(&self, slot: &str, value: &Value) -> Result<()> {
        let Some(shape) = self.domain.as_ref().and_then(|d| d.data_shape()) else {
            return Ok(());
        };
        match value {
            Value::Stack(items) => {
                for (_, v) in items.iter() {
                    self.check_value(slot, v)?;
                }
                Ok(())
            }
            _ => match value.shape() {
                Some(s) if s == shape => Ok(()),
                s => Err(CouplingError::data(
                    slot,
                    format!("data shape {:?} does not match domain shape {:?}", s, shape),
                )),
            },
        }
    }

    /// JSON summary used in composition metadata.
    pub fn as_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (k, v) in &self.meta {
            obj.insert(k.clone(), v.clone());
        }
        obj.insert("domain".into(), fmt_domain(&self.domain).into());
        obj.insert("units".into(), fmt_units(&self.units).into());
        obj.insert("mask".into(), fmt_mask(&self.mask).into());
        serde_json::Value::Object(obj)
    }
}

fn fmt_domain(d: &Option<DomainRef>) -> String {
    d.as_ref().map_or_else(|| "None".to_string(), |d| d.name().to_string())
}

fn fmt_units(u: &Option<Unit>) -> String {
    u.as_ref().map_or_else(|| "None".to_string(), |u| format!("'{}'", u))
}

fn fmt_mask(m: &Option<Mask>) -> String {
    m.as_ref().map_or_else(|| "None".to_string(), |m| m.to_string())
}

impl PartialEq for Info {
    fn eq(&self, other: &Self) -> bool {
        let same_domain = match (&self.domain, &other.domain) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_as(b.as_ref()),
            _ => false,
        };
        same_domain && self.units == other.units && self.mask == other.mask && self.meta == other.meta
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Info(domain={}, units={}, mask={}",
            fmt_domain(&self.domain),
            fmt_units(&self.units),
            fmt_mask(&self.mask)
        )?;
        for (k, v) in &self.meta {
            write!(f, ", {}={}", k, v)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::{NoDomain, UniformGrid};

    fn unit(s: &str) -> Unit { Unit::parse(s).unwrap() }

    #[test]
    fn test_equality_ignores_time() {
        let a = Info::new(Some(SimTime(0.0)), None).with_domain(NoDomain);
        let b = a.clone().with_time(SimTime(5.0));
        assert_eq!(a, b);
        assert_ne!(a, b.with_units(unit("m")));
    }

    #[test]
    fn test_accepts_reports_every_failing_field() {
        let target = Info::new(None, None)
            .with_domain(UniformGrid::new(&[2], &[0.0], &[1.0]).unwrap())
            .with_units(unit("m"))
            .with_mask(Mask::None);
        let incoming = Info::new(None, None)
            .with_domain(NoDomain)
            .with_units(unit("s"))
            .with_mask(Mask::Flex);

        let failures = target.accepts(&incoming, false).unwrap_err();
        assert_eq!(failures.len(), 3);
        assert_eq!(failures["units"], ("'s'".to_string(), "'m'".to_string()));
        assert_eq!(failures["domain"].0, "NoDomain");
    }

    #[test]
    fn test_accepts_compatible_units() {
        let target = Info::new(None, Some(Arc::new(NoDomain))).with_units(unit("km"));
        let incoming = Info::new(None, Some(Arc::new(NoDomain))).with_units(unit("m"));
        assert!(target.accepts(&incoming, false).is_ok());
    }

    #[test]
    fn test_unset_incoming_is_lenient_only_downstream() {
        let own = Info::new(None, None).with_domain(NoDomain).with_units(unit("m"));
        let request = Info::default();
        assert!(own.accepts(&request, true).is_ok());
        let failures = own.accepts(&request, false).unwrap_err();
        assert!(failures.contains_key("domain"));
        assert!(failures.contains_key("units"));
        assert!(failures.contains_key("mask"));
    }

    #[test]
    fn test_fill_from_request() {
        let mut out = Info::default().with_units(unit("m")).with_meta("name", serde_json::Value::Null);
        let request = Info::new(Some(SimTime(1.0)), Some(Arc::new(NoDomain))).with_meta("name", "rain");
        out.fill_from("Out", &request, false).unwrap();
        assert_eq!(out.time, Some(SimTime(1.0)));
        assert_eq!(out.units, Some(unit("m")));
        assert_eq!(out.mask, Some(Mask::Flex));
        assert_eq!(out.meta["name"], serde_json::json!("rain"));

        let mut missing = Info::default();
        let err = missing.fill_from("Out", &Info::default(), false).unwrap_err();
        assert!(matches!(err, CouplingError::MetaData { .. }));
    }

    #[test]
    fn test_merge_keeps_source_mask() {
        let src = Info::new(Some(SimTime(0.0)), Some(Arc::new(NoDomain)))
            .with_units(unit("mm"))
            .with_mask(Mask::None)
            .with_meta("source", "a");
        let request = Info::default().with_units(unit("m")).with_mask(Mask::Flex).with_meta("target", "b");
        let merged = src.merged_with_request(&request);
        assert_eq!(merged.units, Some(unit("m")));
        assert_eq!(merged.mask, Some(Mask::None));
        assert_eq!(merged.meta.len(), 2);
    }

    #[test]
    fn test_check_value_shape() {
        let info = Info::new(None, None).with_domain(UniformGrid::new(&[2, 2], &[0.0, 0.0], &[1.0, 1.0]).unwrap());
        assert!(info.check_value("In", &Value::array(&[2, 2], vec![0.0; 4]).unwrap()).is_ok());
        assert!(info.check_value("In", &Value::Scalar(1.0)).is_err());
        assert!(Info::new(None, Some(Arc::new(NoDomain))).check_value("In", &Value::Scalar(1.0)).is_ok());
    }
}
