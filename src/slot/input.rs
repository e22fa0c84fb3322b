//! Input slot state.
use super::types::{ComponentId, InputSpec, SlotId};
use crate::data::{DomainTransform, Info, Value};
use crate::error::{CouplingError, Result};

/// Unit factor and domain transform from a source descriptor to an agreed one.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub factor: f64,
    pub transform: DomainTransform,
}

impl Default for Conversion {
    fn default() -> Self { Self { factor: 1.0, transform: DomainTransform::Identity } }
}

impl Conversion {
    pub fn between(slot: &str, src_info: &Info, agreed: &Info) -> Result<Self> {
        let factor = match (&src_info.units, &agreed.units) {
            (Some(from), Some(to)) => from.factor_to(to).ok_or_else(|| {
                CouplingError::meta(slot, format!("can't convert units '{}' to '{}'", from, to))
            })?,
            _ => 1.0,
        };
        let transform = match (&src_info.domain, &agreed.domain) {
            (Some(from), Some(to)) => from.transform_to(to.as_ref()).ok_or_else(|| {
                CouplingError::meta(
                    slot,
                    format!("no transform from domain {} to {}", from.name(), to.name()),
                )
            })?,
            _ => DomainTransform::Identity,
        };
        Ok(Self { factor, transform })
    }

    pub fn apply(&self, value: Value) -> Result<Value> {
        let value = self.transform.apply(value)?;
        Ok(if self.factor != 1.0 { value.scaled(self.factor) } else { value })
    }
}

/// Exchanges `src_info` against `request` the way every consuming slot does:
/// the request must accept the source, the result is the merged descriptor.
pub(crate) fn agree(slot: &str, src_info: &Info, request: &Info) -> Result<(Info, Conversion)> {
    if let Err(failures) = request.accepts(src_info, false) {
        return Err(CouplingError::Incompatible { slot: slot.to_string(), failures });
    }
    let merged = src_info.merged_with_request(request);
    let conversion = Conversion::between(slot, src_info, &merged)?;
    Ok((merged, conversion))
}

#[derive(Debug, Clone)]
pub struct InputSlot {
    pub name: String,
    pub owner: Option<ComponentId>,
    pub spec: InputSpec,
    pub source: Option<SlotId>,
    pub(crate) info: Option<Info>,
    pub(crate) conversion: Conversion,
    pub(crate) cached: Option<Value>,
}

impl InputSlot {
    pub fn new(name: &str, owner: Option<ComponentId>, spec: InputSpec) -> Self {
        Self {
            name: name.to_string(),
            owner,
            spec,
            source: None,
            info: None,
            conversion: Conversion::default(),
            cached: None,
        }
    }

    pub fn info(&self) -> Option<&Info> { self.info.as_ref() }

    pub fn is_exchanged(&self) -> bool { self.info.is_some() }

    pub(crate) fn accept_info(&mut self, src_info: &Info, request: &Info) -> Result<Info> {
        if self.is_exchanged() {
            return Err(CouplingError::meta(&self.name, "input info was already exchanged"));
        }
        let (merged, conversion) = agree(&self.name, src_info, request)?;
        self.conversion = conversion;
        self.info = Some(merged.clone());
        Ok(merged)
    }

    /// Applies the negotiated conversions to a value coming from the source.
    pub(crate) fn convert(&self, value: Value) -> Result<Value> {
        let value = self.conversion.apply(value)?;
        if let Some(info) = &self.info {
            info.check_value(&self.name, &value)?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{NoDomain, Unit};
    use std::sync::Arc;

    #[test]
    fn test_accept_converts_units() {
        let mut inp = InputSlot::new("In", None, InputSpec::new());
        let src = Info::new(None, Some(Arc::new(NoDomain))).with_units(Unit::parse("km").unwrap());
        let request = Info::default().with_units(Unit::parse("m").unwrap());

        let agreed = inp.accept_info(&src, &request).unwrap();
        assert_eq!(agreed.units, Some(Unit::parse("m").unwrap()));
        assert_eq!(inp.convert(Value::Scalar(2.0)).unwrap(), Value::Scalar(2000.0));

        assert!(matches!(inp.accept_info(&src, &request), Err(CouplingError::MetaData { .. })));
    }

    #[test]
    fn test_accept_rejects_incompatible_units() {
        let mut inp = InputSlot::new("In", None, InputSpec::new());
        let src = Info::new(None, Some(Arc::new(NoDomain))).with_units(Unit::parse("s").unwrap());
        let request = Info::default().with_units(Unit::parse("m").unwrap());
        let err = inp.accept_info(&src, &request).unwrap_err();
        match err {
            CouplingError::Incompatible { slot, failures } => {
                assert_eq!(slot, "In");
                assert!(failures.contains_key("units"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!inp.is_exchanged());
    }
}
