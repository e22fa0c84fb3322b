//! Declarative descriptor derivation rules.
//!
//! A slot's descriptor can be declared as "copy these fields from that peer
//! slot once its descriptor is known" or "set this field to a literal". The
//! negotiator evaluates the rules every round until all peers are available.

use crate::data::{DomainRef, Info, Mask, Unit};
use crate::time::SimTime;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InfoField {
    Time,
    Domain,
    Units,
    Mask,
    Meta(String),
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Time(Option<SimTime>),
    Domain(Option<DomainRef>),
    Units(Option<Unit>),
    Mask(Option<Mask>),
    Meta(String, serde_json::Value),
}

impl FieldValue {
    fn apply(&self, info: &mut Info) {
        match self {
            FieldValue::Time(t) => info.time = *t,
            FieldValue::Domain(d) => info.domain = d.clone(),
            FieldValue::Units(u) => info.units = u.clone(),
            FieldValue::Mask(m) => info.mask = m.clone(),
            FieldValue::Meta(k, v) => {
                info.meta.insert(k.clone(), v.clone());
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum InfoRule {
    FromInput { input: String, fields: Vec<InfoField> },
    FromOutput { output: String, fields: Vec<InfoField> },
    FromValue(FieldValue),
}

impl InfoRule {
    pub fn from_input(input: &str, fields: &[InfoField]) -> Self {
        InfoRule::FromInput { input: input.to_string(), fields: fields.to_vec() }
    }

    pub fn from_output(output: &str, fields: &[InfoField]) -> Self {
        InfoRule::FromOutput { output: output.to_string(), fields: fields.to_vec() }
    }

    pub fn value(value: FieldValue) -> Self { InfoRule::FromValue(value) }

    /// Name of the peer slot this rule waits for.
    pub fn peer(&self) -> Option<(&str, bool)> {
        match self {
            InfoRule::FromInput { input, .. } => Some((input, true)),
            InfoRule::FromOutput { output, .. } => Some((output, false)),
            InfoRule::FromValue(_) => None,
        }
    }
}

fn copy_field(field: &InfoField, from: &Info, to: &mut Info) {
    match field {
        InfoField::Time => to.time = from.time,
        InfoField::Domain => to.domain = from.domain.clone(),
        InfoField::Units => to.units = from.units.clone(),
        InfoField::Mask => to.mask = from.mask.clone(),
        InfoField::Meta(k) => {
            if let Some(v) = from.meta.get(k) {
                to.meta.insert(k.clone(), v.clone());
            }
        }
    }
}

/// Applies `rules` on top of `base`; `None` while a referenced peer descriptor is unknown.
pub fn evaluate(
    rules: &[InfoRule],
    base: Info,
    in_infos: &IndexMap<String, Option<Info>>,
    out_infos: &IndexMap<String, Option<Info>>,
) -> Option<Info> {
    let mut info = base;
    for rule in rules {
        match rule {
            InfoRule::FromInput { input, fields } => {
                let from = in_infos.get(input)?.as_ref()?;
                fields.iter().for_each(|f| copy_field(f, from, &mut info));
            }
            InfoRule::FromOutput { output, fields } => {
                let from = out_infos.get(output)?.as_ref()?;
                fields.iter().for_each(|f| copy_field(f, from, &mut info));
            }
            InfoRule::FromValue(value) => value.apply(&mut info),
        }
    }
    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::NoDomain;
    use std::sync::Arc;

    #[test]
    fn test_rules_wait_for_peer() {
        let rules = vec![
            InfoRule::from_input("In", &[InfoField::Time, InfoField::Domain]),
            InfoRule::value(FieldValue::Units(Some(Unit::parse("m").unwrap()))),
        ];
        let mut in_infos: IndexMap<String, Option<Info>> = IndexMap::new();
        in_infos.insert("In".into(), None);
        let out_infos = IndexMap::new();

        assert!(evaluate(&rules, Info::default(), &in_infos, &out_infos).is_none());

        in_infos.insert("In".into(), Some(Info::new(Some(SimTime(2.0)), Some(Arc::new(NoDomain)))));
        let info = evaluate(&rules, Info::default(), &in_infos, &out_infos).unwrap();
        assert_eq!(info.time, Some(SimTime(2.0)));
        assert!(info.domain.is_some());
        assert_eq!(info.units, Some(Unit::parse("m").unwrap()));
        assert_eq!(info.mask, None);
    }

    #[test]
    fn test_meta_copy_and_literal() {
        let src = Info::default().with_meta("source", "gauge");
        let mut out_infos: IndexMap<String, Option<Info>> = IndexMap::new();
        out_infos.insert("Out".into(), Some(src));
        let rules = vec![
            InfoRule::from_output("Out", &[InfoField::Meta("source".into())]),
            InfoRule::value(FieldValue::Meta("kind".into(), "derived".into())),
        ];
        let info = evaluate(&rules, Info::default(), &IndexMap::new(), &out_infos).unwrap();
        assert_eq!(info.meta["source"], serde_json::json!("gauge"));
        assert_eq!(info.meta["kind"], serde_json::json!("derived"));
    }
}
