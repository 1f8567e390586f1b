use super::step::Step;
use crate::clock::parse_date;
use crate::ids;
use crate::status::ProjectStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FIELD_PRODUCT_FAMILY: &str = "Product Family";
pub const FIELD_PRODUCT: &str = "Product";
pub const FIELD_PRODUCT_ID: &str = "Product ID";
pub const FIELD_VERSION: &str = "Version";
pub const FIELD_QR: &str = "QR";
pub const FIELD_SAMPLE_SIZE: &str = "Sample Size";
pub const FIELD_OWNER: &str = "Owner";
pub const FIELD_REMARK: &str = "Remark";
pub const FIELD_CREATED_DATE: &str = "Created Date";

/// Display/export order for the well-known header fields.
pub const CANONICAL_HEADER_FIELDS: [&str; 9] = [
    FIELD_PRODUCT_FAMILY,
    FIELD_PRODUCT,
    FIELD_PRODUCT_ID,
    FIELD_VERSION,
    FIELD_QR,
    FIELD_SAMPLE_SIZE,
    FIELD_OWNER,
    FIELD_REMARK,
    FIELD_CREATED_DATE,
];

/// Free-form identifying fields of a project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header(BTreeMap<String, String>);

impl Header {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Value of `field`, or `""` when absent.
    #[must_use]
    pub fn value(&self, field: &str) -> &str {
        self.get(field).unwrap_or("")
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Required fields that are absent or blank, in the order given.
    #[must_use]
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|field| self.value(field).trim().is_empty())
            .map(String::as_str)
            .collect()
    }

    /// Fields in canonical order first, then any extra fields alphabetically.
    pub fn ordered(&self) -> impl Iterator<Item = (&str, &str)> {
        let canonical = CANONICAL_HEADER_FIELDS
            .iter()
            .filter_map(|field| self.0.get_key_value(*field))
            .map(|(k, v)| (k.as_str(), v.as_str()));
        let extra = self
            .0
            .iter()
            .filter(|(k, _)| !CANONICAL_HEADER_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()));
        canonical.chain(extra)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Header {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A named collection of ordered steps.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StressGroup {
    pub id: String,
    /// Legacy group-level label; the per-step `stress` field is authoritative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress: Option<String>,
    pub row_data: Vec<Step>,
}

impl StressGroup {
    /// A freshly identified group holding one freshly identified empty step.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            id: ids::stress_id(),
            stress: None,
            row_data: vec![Step::empty(ids::step_rid())],
        }
    }

    #[must_use]
    pub fn step(&self, rid: &str) -> Option<&Step> {
        self.row_data.iter().find(|s| s.rid == rid)
    }

    #[must_use]
    pub fn step_index(&self, rid: &str) -> Option<usize> {
        self.row_data.iter().position(|s| s.rid == rid)
    }

    /// Label used for reports: the step's own stress, else the group label.
    #[must_use]
    pub fn stress_label<'a>(&'a self, step: &'a Step) -> &'a str {
        if step.stress.is_empty() {
            self.stress.as_deref().unwrap_or("")
        } else {
            &step.stress
        }
    }
}

/// A user-labelled batch under a project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Lot {
    pub id: String,
    /// User label, not guaranteed unique.
    pub lot_id: String,
    pub stresses: Vec<StressGroup>,
}

impl Lot {
    /// A freshly identified lot with one group and one empty step.
    #[must_use]
    pub fn fresh(label: impl Into<String>) -> Self {
        Self {
            id: ids::lot_id(),
            lot_id: label.into(),
            stresses: vec![StressGroup::fresh()],
        }
    }

    #[must_use]
    pub fn stress(&self, stress_id: &str) -> Option<&StressGroup> {
        self.stresses.iter().find(|s| s.id == stress_id)
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.stresses.iter().flat_map(|s| s.row_data.iter())
    }
}

/// Top-level run card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub lots: Vec<Lot>,
    /// Cached aggregate; always equal to [`crate::status::project_status`].
    #[serde(default)]
    pub status: ProjectStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Project {
    #[must_use]
    pub fn lot(&self, lot_id: &str) -> Option<&Lot> {
        self.lots.iter().find(|l| l.id == lot_id)
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.lots.iter().flat_map(Lot::steps)
    }

    #[must_use]
    pub fn product_id(&self) -> &str {
        self.header.value(FIELD_PRODUCT_ID)
    }

    /// Creation date: the header's `Created Date` when it parses, else
    /// `created_at`.
    #[must_use]
    pub fn created_date(&self) -> NaiveDate {
        self.header
            .get(FIELD_CREATED_DATE)
            .and_then(parse_date)
            .unwrap_or_else(|| self.created_at.date())
    }
}
