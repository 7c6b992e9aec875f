//! Attribute records and the scope-lookup rules shared by `Instance` and
//! `TaskData` (spec §3 "Attribute records", §4.6, §4.7).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AttrError;

/// `{name, type, value}` — the core treats `type` and `value` as opaque
/// strings (spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: value.into(),
        }
    }
}

/// The dynamic (runtime-set) half of an attribute scope. Declared
/// attributes (from a flow or task definition) are held separately and
/// consulted only as a fallback — see [`lookup_value`] / [`lookup_type`].
#[derive(Debug, Clone, Default)]
pub struct AttrTable(HashMap<String, Attribute>);

impl AttrTable {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.values()
    }

    pub(crate) fn insert(&mut self, attr: Attribute) {
        self.0.insert(attr.name.clone(), attr);
    }
}

/// Result of a scope write, used by callers to know what to record on the
/// change tracker (spec §4.9 — Add vs. Upd).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Add,
    Upd,
}

/// `GetAttrValue`: instance-then-declared (or task-local-then-declared)
/// lookup order (spec §4.6, §4.7).
pub fn lookup_value<'a>(
    dynamic: &'a AttrTable,
    declared: &'a [Attribute],
    name: &str,
) -> Option<&'a str> {
    if let Some(a) = dynamic.get(name) {
        return Some(a.value.as_str());
    }
    declared.iter().find(|a| a.name == name).map(|a| a.value.as_str())
}

/// `GetAttrType`: same lookup order as [`lookup_value`].
pub fn lookup_type<'a>(
    dynamic: &'a AttrTable,
    declared: &'a [Attribute],
    name: &str,
) -> Option<&'a str> {
    if let Some(a) = dynamic.get(name) {
        return Some(a.type_name.as_str());
    }
    declared.iter().find(|a| a.name == name).map(|a| a.type_name.as_str())
}

/// `SetAttrValue`: type-preserving update of an already-known name.
///
/// "Known" means present either in the dynamic table or in the declared
/// set. Writing to a declared-only name materializes a dynamic entry that
/// copies the declared type, matching spec §4.6's "preserves the declared
/// type". Returns the [`WriteKind`] so the caller can push the matching
/// change-tracker entry; returns `AttrError::UnknownAttribute` for a name
/// that is neither set nor declared (spec §7 — logged, not silently
/// dropped, by the caller).
pub fn set_value(
    dynamic: &mut AttrTable,
    declared: &[Attribute],
    name: &str,
    value: String,
) -> Result<WriteKind, AttrError> {
    if let Some(existing) = dynamic.0.get_mut(name) {
        existing.value = value;
        return Ok(WriteKind::Upd);
    }

    let type_name = declared
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.type_name.clone())
        .ok_or_else(|| AttrError::UnknownAttribute(name.to_string()))?;

    dynamic.insert(Attribute::new(name, type_name, value));
    Ok(WriteKind::Add)
}

/// `AddAttr`: add a new attribute with an explicit type; a no-op (not an
/// overwrite) when the name already exists at either scope tier (spec
/// §4.7).
pub fn add_attr(
    dynamic: &mut AttrTable,
    declared: &[Attribute],
    name: &str,
    type_name: String,
    value: String,
) -> Result<(), AttrError> {
    if dynamic.contains(name) || declared.iter().any(|a| a.name == name) {
        return Err(AttrError::AlreadyExists(name.to_string()));
    }
    dynamic.insert(Attribute::new(name, type_name, value));
    Ok(())
}

/// `UpdateAttrs`: if `update` is a JSON object of string values, add-or-
/// overwrite each entry as a string-typed attribute (unconditionally,
/// unlike `AddAttr`/`SetAttrValue`); any other shape is ignored (spec
/// §4.7).
pub fn update_attrs(dynamic: &mut AttrTable, update: &serde_json::Value) {
    let Some(map) = update.as_object() else {
        return;
    };
    for (k, v) in map {
        let Some(s) = v.as_str() else { continue };
        dynamic.insert(Attribute::new(k.clone(), "string", s));
    }
}
