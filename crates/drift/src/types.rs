//! Type-equivalence policy.
//!
//! Declared and live types rarely match textually (`integer` vs `int4`,
//! `varchar(255)` vs `character varying`). Both sides are normalized, then
//! compared by equivalence class.

use sqlkeeper_config::DriftConfig;
use sqlkeeper_core::drift::TypeVerdict;
use std::collections::BTreeMap;

/// Built-in classes used unless configuration replaces them.
pub const DEFAULT_TYPE_CLASSES: &[(&str, &[&str])] = &[
    (
        "int",
        &["integer", "int", "int2", "int4", "int8", "smallint", "bigint", "serial", "bigserial"],
    ),
    (
        "text",
        &["text", "varchar", "character varying", "char", "character", "bpchar", "string"],
    ),
    (
        "float",
        &["float", "float4", "float8", "real", "double", "double precision", "numeric", "decimal"],
    ),
    ("bool", &["boolean", "bool"]),
    ("date", &["date"]),
    (
        "timestamp",
        &[
            "timestamp",
            "timestamp without time zone",
            "timestamp with time zone",
            "timestamptz",
        ],
    ),
    ("json", &["json", "jsonb"]),
];

/// Lowercase, drop parenthesised length/precision, collapse whitespace.
/// Array spellings (`integer[]`, `integer ARRAY`, PostgreSQL's `_int4`)
/// become `<element>[]`.
///
/// `"Character Varying(255)"` becomes `"character varying"`,
/// `"timestamp(3) with time zone"` becomes `"timestamp with time zone"` and
/// `"_INT4"` becomes `"int4[]"`.
pub fn normalize_type(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '(' => {
                depth += 1;
                stripped.push(' ');
            }
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(c),
            _ => {}
        }
    }

    let mut ty = stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut array = false;
    if let Some(idx) = ty.find('[') {
        ty.truncate(idx);
        ty = ty.trim_end().to_string();
        array = true;
    } else if let Some(element) = ty.strip_suffix(" array") {
        ty = element.to_string();
        array = true;
    } else if let Some(element) = ty.strip_prefix('_')
        && !element.is_empty()
    {
        ty = element.to_string();
        array = true;
    }

    if array { format!("{ty}[]") } else { ty }
}

/// Split a normalized type into its element type and whether it is an array.
fn split_array(normalized: &str) -> (&str, bool) {
    match normalized.strip_suffix("[]") {
        Some(element) => (element, true),
        None => (normalized, false),
    }
}

#[derive(Debug, Clone)]
pub struct TypeEquivalence {
    /// Normalized member type -> class name.
    members: BTreeMap<String, String>,
}

impl Default for TypeEquivalence {
    fn default() -> Self {
        let mut policy = Self::empty();
        for (class, members) in DEFAULT_TYPE_CLASSES {
            policy.add_class(class, members.iter().copied());
        }
        policy
    }
}

impl TypeEquivalence {
    /// A policy where only identical normalized types match.
    pub fn empty() -> Self {
        Self {
            members: BTreeMap::new(),
        }
    }

    /// Built-in classes, extended or replaced by `[drift]` configuration.
    pub fn from_config(config: &DriftConfig) -> Self {
        let mut policy = if config.replace_default_type_classes {
            Self::empty()
        } else {
            Self::default()
        };
        for class in &config.type_classes {
            policy.add_class(&class.name, class.members.iter().map(String::as_str));
        }
        policy
    }

    /// Add members to `class`. A type already in another class moves.
    pub fn add_class<'a>(&mut self, class: &str, members: impl IntoIterator<Item = &'a str>) {
        for member in members {
            self.members.insert(normalize_type(member), class.to_string());
        }
    }

    /// The class `raw` (or, for an array, its element type) belongs to.
    pub fn class_of(&self, raw: &str) -> Option<&str> {
        let normalized = normalize_type(raw);
        let (element, _) = split_array(&normalized);
        self.members.get(element).map(String::as_str)
    }

    /// `None` when the types are equivalent, otherwise why they differ.
    /// An array never matches a scalar.
    pub fn compare(&self, declared: &str, actual: &str) -> Option<TypeVerdict> {
        let (declared, actual) = (normalize_type(declared), normalize_type(actual));
        if declared == actual {
            return None;
        }
        let (declared_element, declared_array) = split_array(&declared);
        let (actual_element, actual_array) = split_array(&actual);
        match (self.members.get(declared_element), self.members.get(actual_element)) {
            (Some(a), Some(b)) if a == b && declared_array == actual_array => None,
            (Some(_), Some(_)) => Some(TypeVerdict::Incompatible),
            _ => Some(TypeVerdict::Unrecognized),
        }
    }
}
