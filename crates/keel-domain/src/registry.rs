//! Field registry
//!
//! Static description of every field of a record: declared data type,
//! required flag, UI hint, the sections used for bulk locking, the dependency
//! graph driving revalidation and the derived ratio formulas.
//!
//! The registry is read-only once built. It can be assembled in code through
//! [`RegistryBuilder`] or loaded from TOML:
//!
//! ```toml
//! tolerance = 0.01
//!
//! [[fields]]
//! id = "loanAmountRequested"
//! data_type = "currency"
//! required = true
//!
//! [[sections]]
//! id = "loan"
//! fields = ["loanAmountRequested"]
//!
//! [dependencies]
//! loanAmountRequested = ["targetLtvPercent"]
//! ```

use crate::error::DomainError;
use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::path::Path;

/// Identifier of one field in a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Create a field id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for FieldId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Declaration of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field identifier
    pub id: FieldId,
    /// Declared data type
    pub data_type: DataType,
    /// Whether the field counts toward completeness
    #[serde(default)]
    pub required: bool,
    /// Rendering hint for the UI (e.g. "textarea", "dropdown")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_hint: Option<String>,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A fixed, named group of fields used for bulk lock/unlock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section identifier
    pub id: String,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Member fields, in display order
    pub fields: Vec<FieldId>,
}

/// Ratio formula: `target = numerator / denominator * scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedField {
    /// Field receiving the computed value
    pub target: FieldId,
    /// Dividend field
    pub numerator: FieldId,
    /// Divisor field
    pub denominator: FieldId,
    /// Multiplier applied to the ratio
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Source id recorded on computed values
    #[serde(default = "default_derived_source")]
    pub source_id: String,
}

fn default_scale() -> f64 {
    100.0
}

fn default_derived_source() -> String {
    "calculated".to_string()
}

fn default_tolerance() -> f64 {
    0.01
}

impl DerivedField {
    /// Ratio field with the default scale (percent) and source
    pub fn ratio(
        target: impl Into<FieldId>,
        numerator: impl Into<FieldId>,
        denominator: impl Into<FieldId>,
    ) -> Self {
        Self {
            target: target.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
            scale: default_scale(),
            source_id: default_derived_source(),
        }
    }

    /// Compute the target value, `None` when an input is missing or the divisor is zero
    pub fn compute(&self, numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
        let (n, d) = (numerator?, denominator?);
        if d == 0.0 {
            return None;
        }
        let value = n / d * self.scale;
        value.is_finite().then_some(value)
    }
}

/// On-disk form of a registry
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    fields: Vec<FieldSpec>,
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    dependencies: BTreeMap<FieldId, Vec<FieldId>>,
    #[serde(default)]
    derived: Vec<DerivedField>,
    #[serde(default = "default_tolerance")]
    tolerance: f64,
}

/// Read-only description of all fields of a record
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: BTreeMap<FieldId, FieldSpec>,
    sections: Vec<Section>,
    dependencies: BTreeMap<FieldId, Vec<FieldId>>,
    derived: Vec<DerivedField>,
    tolerance: f64,
}

impl FieldRegistry {
    /// Start building a registry in code
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Parse a registry from TOML text
    pub fn from_toml(text: &str) -> Result<Self, DomainError> {
        let file: RegistryFile = toml::from_str(text)?;
        Self::from_parts(file)
    }

    /// Load a registry from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Registry(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Serialize the registry back to TOML
    pub fn to_toml(&self) -> Result<String, DomainError> {
        let file = RegistryFile {
            fields: self.fields.values().cloned().collect(),
            sections: self.sections.clone(),
            dependencies: self.dependencies.clone(),
            derived: self.derived.clone(),
            tolerance: self.tolerance,
        };
        toml::to_string_pretty(&file).map_err(|e| DomainError::Registry(e.to_string()))
    }

    fn from_parts(file: RegistryFile) -> Result<Self, DomainError> {
        let mut fields = BTreeMap::new();
        for spec in file.fields {
            if fields.contains_key(&spec.id) {
                return Err(DomainError::Registry(format!(
                    "Field '{}' declared twice",
                    spec.id
                )));
            }
            fields.insert(spec.id.clone(), spec);
        }

        let known = |id: &FieldId, context: &str| -> Result<(), DomainError> {
            if fields.contains_key(id) {
                Ok(())
            } else {
                Err(DomainError::Registry(format!(
                    "{} references unknown field '{}'",
                    context, id
                )))
            }
        };

        let mut section_ids = BTreeSet::new();
        for section in &file.sections {
            if !section_ids.insert(section.id.as_str()) {
                return Err(DomainError::Registry(format!(
                    "Section '{}' declared twice",
                    section.id
                )));
            }
            for field in &section.fields {
                known(field, &format!("Section '{}'", section.id))?;
            }
        }

        for (field, dependents) in &file.dependencies {
            known(field, "Dependency graph")?;
            for dependent in dependents {
                known(dependent, &format!("Dependencies of '{}'", field))?;
            }
        }

        for derived in &file.derived {
            for id in [&derived.target, &derived.numerator, &derived.denominator] {
                known(id, &format!("Derived field '{}'", derived.target))?;
            }
            let target_type = fields[&derived.target].data_type;
            if !target_type.is_numeric() {
                return Err(DomainError::Registry(format!(
                    "Derived field '{}' must be numeric, is {}",
                    derived.target, target_type
                )));
            }
        }

        if !(file.tolerance.is_finite() && file.tolerance >= 0.0) {
            return Err(DomainError::Registry(format!(
                "Tolerance must be a non-negative number, got {}",
                file.tolerance
            )));
        }

        Ok(Self {
            fields,
            sections: file.sections,
            dependencies: file.dependencies,
            derived: file.derived,
            tolerance: file.tolerance,
        })
    }

    /// Declaration of a field
    pub fn spec(&self, field: &FieldId) -> Option<&FieldSpec> {
        self.fields.get(field)
    }

    /// Declared data type of a field
    pub fn data_type(&self, field: &FieldId) -> Option<DataType> {
        self.fields.get(field).map(|s| s.data_type)
    }

    /// Whether the field is declared
    pub fn contains(&self, field: &FieldId) -> bool {
        self.fields.contains_key(field)
    }

    /// All field declarations, ordered by id
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    /// Fields that count toward completeness
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldId> {
        self.fields.values().filter(|s| s.required).map(|s| &s.id)
    }

    /// Look up a section by id
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// All sections, in declaration order
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Fields to re-check when `field` changes
    pub fn dependents(&self, field: &FieldId) -> &[FieldId] {
        self.dependencies
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every field appearing in the dependency graph, as key or dependent
    pub fn tracked_fields(&self) -> BTreeSet<FieldId> {
        self.dependencies
            .iter()
            .flat_map(|(field, dependents)| std::iter::once(field).chain(dependents))
            .cloned()
            .collect()
    }

    /// Transitive closure of `dependents`, excluding `field` itself
    ///
    /// Breadth-first, so nearer dependents come first.
    pub fn transitive_dependents(&self, field: &FieldId) -> Vec<FieldId> {
        let mut seen = BTreeSet::from([field.clone()]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([field.clone()]);

        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(&current) {
                if seen.insert(dependent.clone()) {
                    order.push(dependent.clone());
                    queue.push_back(dependent.clone());
                }
            }
        }

        order
    }

    /// Derived ratio formulas
    pub fn derived(&self) -> &[DerivedField] {
        &self.derived
    }

    /// Numeric tolerance used when comparing derived values
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

/// Builder for [`FieldRegistry`]
///
/// # Examples
///
/// ```
/// use keel_domain::{DataType, FieldRegistry};
///
/// let registry = FieldRegistry::builder()
///     .required_field("loanAmountRequested", DataType::Currency)
///     .field("targetLtvPercent", DataType::Percent)
///     .depends("loanAmountRequested", ["targetLtvPercent"])
///     .build()
///     .unwrap();
///
/// assert_eq!(registry.dependents(&"loanAmountRequested".into()).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    file: RegistryFile,
    tolerance: Option<f64>,
}

impl RegistryBuilder {
    /// Declare an optional field
    pub fn field(self, id: impl Into<FieldId>, data_type: DataType) -> Self {
        self.spec(FieldSpec {
            id: id.into(),
            data_type,
            required: false,
            ui_hint: None,
            label: None,
        })
    }

    /// Declare a required field
    pub fn required_field(self, id: impl Into<FieldId>, data_type: DataType) -> Self {
        self.spec(FieldSpec {
            id: id.into(),
            data_type,
            required: true,
            ui_hint: None,
            label: None,
        })
    }

    /// Declare a field from a full spec
    pub fn spec(mut self, spec: FieldSpec) -> Self {
        self.file.fields.push(spec);
        self
    }

    /// Declare a section
    pub fn section<I, F>(mut self, id: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldId>,
    {
        self.file.sections.push(Section {
            id: id.into(),
            title: None,
            fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Declare the fields to re-check when `field` changes
    pub fn depends<I, F>(mut self, field: impl Into<FieldId>, dependents: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldId>,
    {
        self.file
            .dependencies
            .entry(field.into())
            .or_default()
            .extend(dependents.into_iter().map(Into::into));
        self
    }

    /// Declare a derived ratio field
    pub fn derived(mut self, derived: DerivedField) -> Self {
        self.file.derived.push(derived);
        self
    }

    /// Override the derived-value tolerance
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Validate and build the registry
    pub fn build(mut self) -> Result<FieldRegistry, DomainError> {
        self.file.tolerance = self.tolerance.unwrap_or_else(default_tolerance);
        FieldRegistry::from_parts(self.file)
    }
}
