//! Core data types for the warehouse pipeline.
//!
//! Raw records arrive as loosely typed field maps ([`RawRecord`]); the
//! unification step turns each one into a [`CanonicalRecord`]. The cleaning
//! stages describe what they did through [`DuplicateGroup`] and [`OutlierFlag`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// Identifiers and enumerations
// =============================================================================

/// Which of the three input sources a record came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Job,
    Investment,
    Profile,
}

impl SourceType {
    /// All sources in ingestion order.
    pub const ALL: [SourceType; 3] = [SourceType::Job, SourceType::Investment, SourceType::Profile];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Job => "job",
            SourceType::Investment => "investment",
            SourceType::Profile => "profile",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of countries covered by the warehouse.
///
/// Declaration order is also the tie-break order wherever a "dominant"
/// country has to be picked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Country {
    #[serde(rename = "USA")]
    Usa,
    Spain,
    Colombia,
    Argentina,
    Chile,
    Peru,
    Mexico,
}

impl Country {
    pub const ALL: [Country; 7] = [
        Country::Usa,
        Country::Spain,
        Country::Colombia,
        Country::Argentina,
        Country::Chile,
        Country::Peru,
        Country::Mexico,
    ];

    /// Display name used in reports and the exported snapshot.
    pub fn name(&self) -> &'static str {
        match self {
            Country::Usa => "USA",
            Country::Spain => "Spain",
            Country::Colombia => "Colombia",
            Country::Argentina => "Argentina",
            Country::Chile => "Chile",
            Country::Peru => "Peru",
            Country::Mexico => "Mexico",
        }
    }

    /// Position in [`Country::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordinal seniority scale.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ExperienceLevel {
    Junior,
    Mid,
    Senior,
    Expert,
}

impl ExperienceLevel {
    pub const ALL: [ExperienceLevel; 4] = [
        ExperienceLevel::Junior,
        ExperienceLevel::Mid,
        ExperienceLevel::Senior,
        ExperienceLevel::Expert,
    ];

    /// Zero-based ordinal rank (Junior = 0).
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Bin years of experience: (0,2] Junior, (2,5] Mid, (5,10] Senior, >10 Expert.
    ///
    /// Returns `None` for non-positive or non-finite input.
    pub fn from_years(years: f64) -> Option<Self> {
        if !years.is_finite() || years <= 0.0 {
            return None;
        }
        Some(if years <= 2.0 {
            ExperienceLevel::Junior
        } else if years <= 5.0 {
            ExperienceLevel::Mid
        } else if years <= 10.0 {
            ExperienceLevel::Senior
        } else {
            ExperienceLevel::Expert
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "Junior",
            ExperienceLevel::Mid => "Mid",
            ExperienceLevel::Senior => "Senior",
            ExperienceLevel::Expert => "Expert",
        }
    }
}

/// Stable surrogate key of a warehouse record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric fields subject to outlier handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericField {
    Salary,
    Age,
}

impl NumericField {
    pub fn name(&self) -> &'static str {
        match self {
            NumericField::Salary => "salary",
            NumericField::Age => "age",
        }
    }

    pub fn get(&self, record: &CanonicalRecord) -> Option<f64> {
        match self {
            NumericField::Salary => record.salary,
            NumericField::Age => record.age,
        }
    }

    pub(crate) fn set(&self, record: &mut CanonicalRecord, value: f64) {
        match self {
            NumericField::Salary => record.salary = Some(value),
            NumericField::Age => record.age = Some(value),
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Annual salary bands used by the warehouse summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SalaryBand {
    #[serde(rename = "<50K")]
    Under50K,
    #[serde(rename = "50K-75K")]
    From50KTo75K,
    #[serde(rename = "75K-100K")]
    From75KTo100K,
    #[serde(rename = "100K-150K")]
    From100KTo150K,
    #[serde(rename = "150K+")]
    Over150K,
}

impl SalaryBand {
    pub fn for_salary(salary: f64) -> Self {
        if salary < 50_000.0 {
            SalaryBand::Under50K
        } else if salary < 75_000.0 {
            SalaryBand::From50KTo75K
        } else if salary < 100_000.0 {
            SalaryBand::From75KTo100K
        } else if salary < 150_000.0 {
            SalaryBand::From100KTo150K
        } else {
            SalaryBand::Over150K
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SalaryBand::Under50K => "<50K",
            SalaryBand::From50KTo75K => "50K-75K",
            SalaryBand::From75KTo100K => "75K-100K",
            SalaryBand::From100KTo150K => "100K-150K",
            SalaryBand::Over150K => "150K+",
        }
    }
}

// =============================================================================
// Raw input
// =============================================================================

/// A loosely typed field value as produced by a source reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(value: Vec<String>) -> Self {
        RawValue::List(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(RawValue::Null, Into::into)
    }
}

/// One row of a source, as a flat mapping of field name to value.
///
/// Field names are kept exactly as the source spelled them; the unifier
/// normalizes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy in tests and fixtures.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The three raw inputs of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSources {
    pub jobs: Vec<RawRecord>,
    pub investments: Vec<RawRecord>,
    pub profiles: Vec<RawRecord>,
}

impl RawSources {
    pub fn records(&self, source_type: SourceType) -> &[RawRecord] {
        match source_type {
            SourceType::Job => &self.jobs,
            SourceType::Investment => &self.investments,
            SourceType::Profile => &self.profiles,
        }
    }

    pub fn total(&self) -> usize {
        self.jobs.len() + self.investments.len() + self.profiles.len()
    }
}

// =============================================================================
// Canonical record
// =============================================================================

/// One job, investment or profile observation after unification.
///
/// Numeric fields are `None` when missing, never a zero sentinel. The
/// derived fields (`cluster_id`, `predicted_high_demand`) can only be set
/// through the [`crate::Warehouse`] attach methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: RecordId,
    pub source_type: SourceType,
    /// Identifier the source used for the row, if any.
    pub source_id: Option<String>,
    pub country: Country,
    pub city: Option<String>,
    /// Company for jobs, organization for investments.
    pub organization: Option<String>,
    /// Job title for jobs, current area for profiles.
    pub role: Option<String>,
    pub technology: BTreeSet<String>,
    pub framework: BTreeSet<String>,
    /// Annual salary in USD.
    pub salary: Option<f64>,
    pub experience_level: Option<ExperienceLevel>,
    pub years_experience: Option<f64>,
    pub age: Option<f64>,
    pub investment_usd: Option<f64>,
    pub participants: Option<f64>,
    pub period: Option<NaiveDate>,
    pub(crate) cluster_id: Option<usize>,
    pub(crate) predicted_high_demand: Option<bool>,
}

impl CanonicalRecord {
    /// Create a record with every optional attribute empty.
    pub fn new(id: RecordId, source_type: SourceType, country: Country) -> Self {
        Self {
            id,
            source_type,
            source_id: None,
            country,
            city: None,
            organization: None,
            role: None,
            technology: BTreeSet::new(),
            framework: BTreeSet::new(),
            salary: None,
            experience_level: None,
            years_experience: None,
            age: None,
            investment_usd: None,
            participants: None,
            period: None,
            cluster_id: None,
            predicted_high_demand: None,
        }
    }

    pub fn cluster_id(&self) -> Option<usize> {
        self.cluster_id
    }

    pub fn predicted_high_demand(&self) -> Option<bool> {
        self.predicted_high_demand
    }

    pub fn salary_band(&self) -> Option<SalaryBand> {
        self.salary.map(SalaryBand::for_salary)
    }

    /// Names of the fields that are meaningful for this record's source.
    pub fn applicable_fields(&self) -> &'static [&'static str] {
        match self.source_type {
            SourceType::Job => &[
                "city",
                "organization",
                "role",
                "technology",
                "framework",
                "salary",
                "experience_level",
                "period",
            ],
            SourceType::Investment => &[
                "organization",
                "technology",
                "investment_usd",
                "participants",
                "period",
            ],
            SourceType::Profile => &[
                "role",
                "technology",
                "framework",
                "salary",
                "experience_level",
                "years_experience",
                "age",
            ],
        }
    }

    /// Whether the named field holds a value.
    pub fn has_field(&self, field: &str) -> bool {
        match field {
            "source_id" => self.source_id.is_some(),
            "city" => self.city.is_some(),
            "organization" => self.organization.is_some(),
            "role" => self.role.is_some(),
            "technology" => !self.technology.is_empty(),
            "framework" => !self.framework.is_empty(),
            "salary" => self.salary.is_some(),
            "experience_level" => self.experience_level.is_some(),
            "years_experience" => self.years_experience.is_some(),
            "age" => self.age.is_some(),
            "investment_usd" => self.investment_usd.is_some(),
            "participants" => self.participants.is_some(),
            "period" => self.period.is_some(),
            _ => true,
        }
    }

    /// Applicable fields that hold no value.
    pub fn missing_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.applicable_fields()
            .iter()
            .copied()
            .filter(|field| !self.has_field(field))
    }

    pub fn missing_field_count(&self) -> usize {
        self.missing_fields().count()
    }
}

// =============================================================================
// Cleaning artifacts
// =============================================================================

/// Records judged identical under the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// The single record kept.
    pub survivor: RecordId,
    /// The records removed in favour of the survivor, in id order.
    pub removed: Vec<RecordId>,
}

impl DuplicateGroup {
    pub fn size(&self) -> usize {
        self.removed.len() + 1
    }
}

/// How an outlier was detected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Outside `[Q1 - k*IQR, Q3 + k*IQR]`.
    Iqr { multiplier: f64 },
}

/// What was done with an outlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierAction {
    Capped,
    Removed,
}

/// A value found outside its group's bounds, and its resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierFlag {
    pub record_id: RecordId,
    pub field: NumericField,
    /// Stratification group label, e.g. `job/USA`.
    pub group: String,
    pub method: DetectionMethod,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub original_value: f64,
    pub action: OutlierAction,
    /// Value after capping; `None` when the record was removed.
    pub resolved_value: Option<f64>,
}
