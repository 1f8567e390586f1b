//! Product and stress catalog collaborator.
//!
//! The catalog is external reference data: product families, products, and
//! the stress → type → operation → condition table used to fill dependent
//! step fields. [`Catalog`] is the read interface the engines consume;
//! [`FileCatalog`] is the file-backed implementation the CLI maintains.
//!
//! Read failures never block step editing: the `*_or_empty` helpers log a
//! warning and degrade to empty option lists.

use crate::ids;
use crate::model::{Step, StepField, StepPatch};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),

    #[error("no product family with id '{0}'")]
    UnknownFamily(String),

    #[error("no product with id '{0}'")]
    UnknownProduct(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductFamily {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub family_id: String,
    pub internal_name: String,
    pub product_name: String,
    pub version: String,
    pub db_pn: String,
    pub spec: String,
}

/// One row of the stress table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StressEntry {
    #[serde(rename = "Type")]
    pub step_type: String,
    #[serde(rename = "Operation")]
    pub operation: String,
    #[serde(rename = "Condition")]
    pub condition: String,
}

/// Stress name → ordered catalog rows.
pub type StressCatalog = BTreeMap<String, Vec<StressEntry>>;

/// Read interface over the catalog service.
pub trait Catalog {
    /// # Errors
    ///
    /// The service could not be read.
    fn product_families(&self) -> Result<Vec<ProductFamily>, CatalogError>;

    /// # Errors
    ///
    /// The service could not be read.
    fn products(&self) -> Result<Vec<Product>, CatalogError>;

    /// # Errors
    ///
    /// The service could not be read.
    fn stress_catalog(&self) -> Result<StressCatalog, CatalogError>;
}

/// Whole catalog document as persisted by [`FileCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogData {
    pub product_families: Vec<ProductFamily>,
    pub products: Vec<Product>,
    pub stress_catalog: StressCatalog,
}

impl Catalog for CatalogData {
    fn product_families(&self) -> Result<Vec<ProductFamily>, CatalogError> {
        Ok(self.product_families.clone())
    }

    fn products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.clone())
    }

    fn stress_catalog(&self) -> Result<StressCatalog, CatalogError> {
        Ok(self.stress_catalog.clone())
    }
}

impl CatalogData {
    /// Add a family and return its id.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Invalid`] for a blank name.
    pub fn add_family(&mut self, name: &str) -> Result<String, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Invalid("family name is required".into()));
        }
        let id = ids::new_id("pf");
        self.product_families.push(ProductFamily {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    /// # Errors
    ///
    /// [`CatalogError::UnknownFamily`] or a blank name.
    pub fn rename_family(&mut self, id: &str, name: &str) -> Result<(), CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Invalid("family name is required".into()));
        }
        let family = self
            .product_families
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| CatalogError::UnknownFamily(id.to_string()))?;
        family.name = name.to_string();
        Ok(())
    }

    /// Remove a family and every product that belongs to it. Returns the
    /// number of products removed alongside.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownFamily`].
    pub fn delete_family(&mut self, id: &str) -> Result<usize, CatalogError> {
        let before = self.product_families.len();
        self.product_families.retain(|f| f.id != id);
        if self.product_families.len() == before {
            return Err(CatalogError::UnknownFamily(id.to_string()));
        }
        let products_before = self.products.len();
        self.products.retain(|p| p.family_id != id);
        Ok(products_before - self.products.len())
    }

    /// Insert a product (blank id) or replace the product with the same id.
    /// Returns the product id.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Invalid`] without a family or product name,
    /// [`CatalogError::UnknownFamily`] for a dangling family id.
    pub fn upsert_product(&mut self, mut product: Product) -> Result<String, CatalogError> {
        if product.family_id.trim().is_empty() || product.product_name.trim().is_empty() {
            return Err(CatalogError::Invalid(
                "product family and product name are required".into(),
            ));
        }
        if !self.product_families.iter().any(|f| f.id == product.family_id) {
            return Err(CatalogError::UnknownFamily(product.family_id));
        }
        if product.id.is_empty() {
            product.id = ids::new_id("prod");
        }
        let id = product.id.clone();
        match self.products.iter_mut().find(|p| p.id == id) {
            Some(existing) => *existing = product,
            None => self.products.push(product),
        }
        Ok(id)
    }

    /// # Errors
    ///
    /// [`CatalogError::UnknownProduct`].
    pub fn delete_product(&mut self, id: &str) -> Result<(), CatalogError> {
        let before = self.products.len();
        self.products.retain(|p| p.id != id);
        if self.products.len() == before {
            return Err(CatalogError::UnknownProduct(id.to_string()));
        }
        Ok(())
    }

    /// Products of one family, in catalog order.
    pub fn products_in<'a>(&'a self, family_id: &'a str) -> impl Iterator<Item = &'a Product> {
        self.products.iter().filter(move |p| p.family_id == family_id)
    }

    /// Distinct versions for a product name within a family.
    #[must_use]
    pub fn versions(&self, family_id: &str, product_name: &str) -> Vec<String> {
        distinct(
            self.products_in(family_id)
                .filter(|p| p.product_name == product_name)
                .map(|p| p.version.as_str()),
        )
    }
}

/// JSON file catalog with atomic whole-document writes.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document; a missing file is an empty catalog.
    ///
    /// # Errors
    ///
    /// I/O failures other than not-found, and malformed JSON.
    pub fn read(&self) -> Result<CatalogData, CatalogError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "catalog file absent");
                return Ok(CatalogData::default());
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| CatalogError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the whole document.
    ///
    /// # Errors
    ///
    /// I/O failures.
    pub fn write(&self, data: &CatalogData) -> Result<(), CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut body = serde_json::to_vec_pretty(data).map_err(|source| CatalogError::Parse {
            path: self.path.clone(),
            source,
        })?;
        body.push(b'\n');
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(io_err)?;
            file.write_all(&body).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(io_err)
    }

    /// Read, edit in memory, write back. Nothing is written if `edit` fails.
    ///
    /// # Errors
    ///
    /// Read/write failures and whatever `edit` returns.
    pub fn update<T>(
        &self,
        edit: impl FnOnce(&mut CatalogData) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let mut data = self.read()?;
        let out = edit(&mut data)?;
        self.write(&data)?;
        Ok(out)
    }
}

impl Catalog for FileCatalog {
    fn product_families(&self) -> Result<Vec<ProductFamily>, CatalogError> {
        Ok(self.read()?.product_families)
    }

    fn products(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.read()?.products)
    }

    fn stress_catalog(&self) -> Result<StressCatalog, CatalogError> {
        Ok(self.read()?.stress_catalog)
    }
}

/// Family id → display name, empty (with a warning) when the catalog fails.
pub fn family_names_or_empty(catalog: &dyn Catalog) -> HashMap<String, String> {
    match catalog.product_families() {
        Ok(families) => families.into_iter().map(|f| (f.id, f.name)).collect(),
        Err(err) => {
            warn!(error = %err, "product families unavailable; names left unresolved");
            HashMap::new()
        }
    }
}

/// Stress table, empty (with a warning) when the catalog fails.
pub fn stress_catalog_or_empty(catalog: &dyn Catalog) -> StressCatalog {
    catalog.stress_catalog().unwrap_or_else(|err| {
        warn!(error = %err, "stress catalog unavailable; option lists are empty");
        StressCatalog::new()
    })
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values.filter(|v| !v.is_empty()) {
        if !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out
}

/// Option lists for a step's dependent fields, recomputed on every read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StepOptions {
    pub stresses: Vec<String>,
    pub types: Vec<String>,
    pub operations: Vec<String>,
    /// Condition of the catalog row matching the step's type and operation.
    pub condition: Option<String>,
}

impl StepOptions {
    #[must_use]
    pub fn derive(step: &Step, catalog: &StressCatalog) -> Self {
        let rows = catalog.get(&step.stress).map_or(&[][..], Vec::as_slice);
        let of_type = || rows.iter().filter(|r| r.step_type == step.step_type);
        Self {
            stresses: catalog.keys().cloned().collect(),
            types: distinct(rows.iter().map(|r| r.step_type.as_str())),
            operations: distinct(of_type().map(|r| r.operation.as_str())),
            condition: of_type()
                .find(|r| r.operation == step.operation)
                .map(|r| r.condition.clone()),
        }
    }
}

/// Patch for selecting `value` in `field`, with dependent fields reset.
///
/// - stress clears type, operation and condition
/// - type clears operation and condition
/// - operation fills condition from the matching catalog row (or clears it)
///
/// Other fields produce a single-field patch.
#[must_use]
pub fn select_field(step: &Step, field: StepField, value: &str, catalog: &StressCatalog) -> StepPatch {
    let patch = StepPatch::new().set(field, value);
    match field {
        StepField::Stress => patch
            .set(StepField::Type, "")
            .set(StepField::Operation, "")
            .set(StepField::Condition, ""),
        StepField::Type => patch
            .set(StepField::Operation, "")
            .set(StepField::Condition, ""),
        StepField::Operation => {
            let condition = catalog
                .get(&step.stress)
                .and_then(|rows| {
                    rows.iter()
                        .find(|r| r.step_type == step.step_type && r.operation == value)
                })
                .map_or("", |r| r.condition.as_str());
            patch.set(StepField::Condition, condition)
        }
        _ => patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(t: &str, op: &str, cond: &str) -> StressEntry {
        StressEntry {
            step_type: t.into(),
            operation: op.into(),
            condition: cond.into(),
        }
    }

    fn stress_table() -> StressCatalog {
        let mut table = StressCatalog::new();
        table.insert(
            "HTOL".into(),
            vec![
                entry("ALT", "T0", "25C"),
                entry("ALT", "168h", "125C"),
                entry("FT", "Readout", "RT"),
                entry("ALT", "T0", "dup ignored"),
            ],
        );
        table.insert("TC".into(), vec![entry("Env", "500cyc", "-55/125C")]);
        table
    }

    #[test]
    fn stress_entry_uses_catalog_column_names() {
        let json = serde_json::json!({"Stress": "HTOL", "Type": "ALT", "Operation": "T0", "Condition": "25C"});
        let row: StressEntry = serde_json::from_value(json).unwrap();
        assert_eq!(row, entry("ALT", "T0", "25C"));
    }

    #[test]
    fn options_narrow_by_stress_then_type() {
        let mut step = Step::empty("r");
        let all = StepOptions::derive(&step, &stress_table());
        assert_eq!(all.stresses, vec!["HTOL", "TC"]);
        assert!(all.types.is_empty());

        step.stress = "HTOL".into();
        step.step_type = "ALT".into();
        step.operation = "168h".into();
        let opts = StepOptions::derive(&step, &stress_table());
        assert_eq!(opts.types, vec!["ALT", "FT"]);
        assert_eq!(opts.operations, vec!["T0", "168h"]);
        assert_eq!(opts.condition.as_deref(), Some("125C"));
    }

    #[test]
    fn selecting_stress_resets_dependents() {
        let mut step = Step::empty("r");
        step.stress = "HTOL".into();
        step.step_type = "ALT".into();
        step.operation = "T0".into();
        step.condition = "25C".into();
        select_field(&step, StepField::Stress, "TC", &stress_table()).apply_to(&mut step);
        assert_eq!(step.stress, "TC");
        assert_eq!(step.step_type, "");
        assert_eq!(step.operation, "");
        assert_eq!(step.condition, "");
    }

    #[test]
    fn selecting_operation_fills_condition() {
        let mut step = Step::empty("r");
        step.stress = "HTOL".into();
        step.step_type = "ALT".into();
        let patch = select_field(&step, StepField::Operation, "168h", &stress_table());
        assert_eq!(patch.get(StepField::Condition), Some("125C"));

        let unknown = select_field(&step, StepField::Operation, "999h", &stress_table());
        assert_eq!(unknown.get(StepField::Condition), Some(""));

        let plain = select_field(&step, StepField::Note, "x", &stress_table());
        assert_eq!(plain.iter().count(), 1);
    }

    #[test]
    fn deleting_family_cascades_to_products() {
        let mut data = CatalogData::default();
        let keep = data.add_family("Keep").unwrap();
        let drop = data.add_family("Drop").unwrap();
        for (family, name) in [(&keep, "A"), (&drop, "B"), (&drop, "C")] {
            data.upsert_product(Product {
                family_id: family.clone(),
                product_name: name.into(),
                ..Product::default()
            })
            .unwrap();
        }
        assert_eq!(data.delete_family(&drop).unwrap(), 2);
        assert_eq!(data.products.len(), 1);
        assert!(matches!(
            data.delete_family(&drop),
            Err(CatalogError::UnknownFamily(_))
        ));
    }

    #[test]
    fn product_requires_family_and_name() {
        let mut data = CatalogData::default();
        let family = data.add_family("F").unwrap();
        assert!(matches!(
            data.upsert_product(Product {
                family_id: family.clone(),
                ..Product::default()
            }),
            Err(CatalogError::Invalid(_))
        ));
        let id = data
            .upsert_product(Product {
                family_id: family.clone(),
                product_name: "Chip".into(),
                version: "A0".into(),
                ..Product::default()
            })
            .unwrap();
        data.upsert_product(Product {
            id: id.clone(),
            family_id: family.clone(),
            product_name: "Chip".into(),
            version: "B1".into(),
            ..Product::default()
        })
        .unwrap();
        assert_eq!(data.products.len(), 1);
        assert_eq!(data.versions(&family, "Chip"), vec!["B1"]);
    }

    #[test]
    fn file_catalog_missing_is_empty_and_corrupt_degrades() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = FileCatalog::new(dir.path().join("catalog.json"));
        assert_eq!(catalog.read().unwrap(), CatalogData::default());

        let id = catalog.update(|data| data.add_family("PF One")).unwrap();
        assert_eq!(family_names_or_empty(&catalog).get(&id).map(String::as_str), Some("PF One"));

        fs::write(catalog.path(), "[broken").unwrap();
        assert!(matches!(catalog.read(), Err(CatalogError::Parse { .. })));
        assert!(family_names_or_empty(&catalog).is_empty());
        assert!(stress_catalog_or_empty(&catalog).is_empty());
    }
}
