//! Unification module.
//!
//! Maps each source's native field names, units and spellings onto the
//! single [`CanonicalRecord`] schema. Mapping is pure: a raw record either
//! becomes a canonical record or a [`SchemaError`] describing why not.

pub mod vocabulary;

use crate::error::SchemaError;
use crate::types::{
    CanonicalRecord, ExperienceLevel, RawRecord, RawSources, RawValue, RecordId, SourceType,
};
use crate::utils::{
    collapse_whitespace, is_null_marker, normalize_field_name, parse_numeric_string, positive,
    split_list,
};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

pub use vocabulary::{canonical_technology, parse_country, parse_experience};

/// Canonical destination of a raw field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Target {
    SourceId,
    Country,
    City,
    Organization,
    Role,
    Technology,
    Framework,
    SalaryAnnual,
    SalaryMonthly,
    Experience,
    YearsExperience,
    Age,
    InvestmentUsd,
    Participants,
    Period,
}

/// Aliases shared by every source.
const COMMON_ALIASES: &[(&str, Target)] = &[
    ("pais", Target::Country),
    ("country", Target::Country),
    ("pais_residencia", Target::Country),
    ("ciudad", Target::City),
    ("city", Target::City),
];

const JOB_ALIASES: &[(&str, Target)] = &[
    ("id_oferta", Target::SourceId),
    ("id", Target::SourceId),
    ("job_id", Target::SourceId),
    ("empresa", Target::Organization),
    ("company", Target::Organization),
    ("cargo", Target::Role),
    ("puesto", Target::Role),
    ("title", Target::Role),
    ("job_title", Target::Role),
    ("lenguaje", Target::Technology),
    ("lenguajes", Target::Technology),
    ("tecnologia", Target::Technology),
    ("tecnologia_principal", Target::Technology),
    ("language", Target::Technology),
    ("technology", Target::Technology),
    ("framework", Target::Framework),
    ("frameworks", Target::Framework),
    ("nivel_seniority", Target::Experience),
    ("seniority", Target::Experience),
    ("nivel_experiencia", Target::Experience),
    ("experience_level", Target::Experience),
    ("salario_anual_usd", Target::SalaryAnnual),
    ("salario_anual", Target::SalaryAnnual),
    ("salario_usd", Target::SalaryAnnual),
    ("salary", Target::SalaryAnnual),
    ("annual_salary", Target::SalaryAnnual),
    ("salario_mensual_usd", Target::SalaryMonthly),
    ("salario_mensual", Target::SalaryMonthly),
    ("monthly_salary", Target::SalaryMonthly),
    ("fecha_publicacion", Target::Period),
    ("fecha", Target::Period),
    ("date", Target::Period),
    ("posted_at", Target::Period),
];

const INVESTMENT_ALIASES: &[(&str, Target)] = &[
    ("id_programa", Target::SourceId),
    ("id", Target::SourceId),
    ("program_id", Target::SourceId),
    ("organizacion", Target::Organization),
    ("organization", Target::Organization),
    ("area_tecnologica", Target::Technology),
    ("area", Target::Technology),
    ("technology", Target::Technology),
    ("inversion_usd", Target::InvestmentUsd),
    ("inversion", Target::InvestmentUsd),
    ("investment_usd", Target::InvestmentUsd),
    ("participantes", Target::Participants),
    ("participants", Target::Participants),
    ("ano", Target::Period),
    ("anio", Target::Period),
    ("year", Target::Period),
    ("fecha", Target::Period),
    ("date", Target::Period),
];

const PROFILE_ALIASES: &[(&str, Target)] = &[
    ("id_persona", Target::SourceId),
    ("id", Target::SourceId),
    ("person_id", Target::SourceId),
    ("edad", Target::Age),
    ("age", Target::Age),
    ("lenguajes_dominio", Target::Technology),
    ("lenguajes", Target::Technology),
    ("languages", Target::Technology),
    ("frameworks_dominio", Target::Framework),
    ("frameworks", Target::Framework),
    ("anos_experiencia", Target::YearsExperience),
    ("years_experience", Target::YearsExperience),
    ("nivel_experiencia", Target::Experience),
    ("experience_level", Target::Experience),
    ("area_trabajo_actual", Target::Role),
    ("area", Target::Role),
    ("role", Target::Role),
    ("salario_actual_usd", Target::SalaryAnnual),
    ("salario_usd", Target::SalaryAnnual),
    ("salary", Target::SalaryAnnual),
    ("salario_mensual_usd", Target::SalaryMonthly),
    ("monthly_salary", Target::SalaryMonthly),
];

fn resolve_alias(source_type: SourceType, normalized: &str) -> Option<Target> {
    let specific = match source_type {
        SourceType::Job => JOB_ALIASES,
        SourceType::Investment => INVESTMENT_ALIASES,
        SourceType::Profile => PROFILE_ALIASES,
    };
    COMMON_ALIASES
        .iter()
        .chain(specific)
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, target)| *target)
}

/// Outcome of unifying all three sources.
#[derive(Debug, Clone, Default)]
pub struct Unified {
    /// Accepted records in ingestion order, with ids 1..=n.
    pub records: Vec<CanonicalRecord>,
    /// One entry per dropped raw record.
    pub rejections: Vec<SchemaError>,
}

/// Unify every source in ingestion order (jobs, investments, profiles).
///
/// Ids are assigned sequentially from 1 to the accepted records; rejected
/// records are collected and do not consume an id.
pub fn unify_sources(sources: &RawSources) -> Unified {
    let mut unified = Unified::default();
    let mut next_id = 1u64;

    for source_type in SourceType::ALL {
        let raw = sources.records(source_type);
        let before = unified.records.len();
        for (row, record) in raw.iter().enumerate() {
            match unify_record(record, source_type, row, RecordId(next_id)) {
                Ok(canonical) => {
                    unified.records.push(canonical);
                    next_id += 1;
                }
                Err(err) => {
                    debug!("Dropping record: {}", err);
                    unified.rejections.push(err);
                }
            }
        }
        let accepted = unified.records.len() - before;
        if accepted < raw.len() {
            warn!(
                "{}: {} of {} records rejected during unification",
                source_type,
                raw.len() - accepted,
                raw.len()
            );
        }
        info!("Unified {} {} records", accepted, source_type);
    }

    unified
}

/// Map one raw record onto the canonical schema.
pub fn unify_record(
    raw: &RawRecord,
    source_type: SourceType,
    row: usize,
    id: RecordId,
) -> Result<CanonicalRecord, SchemaError> {
    // First non-null value wins when several raw fields share a target.
    let mut values: BTreeMap<Target, &RawValue> = BTreeMap::new();
    for (name, value) in raw.iter() {
        let Some(target) = resolve_alias(source_type, &normalize_field_name(name)) else {
            continue;
        };
        if is_absent(value) {
            continue;
        }
        values.entry(target).or_insert(value);
    }

    let country = match values.get(&Target::Country) {
        None => {
            return Err(SchemaError::MissingField {
                source_type,
                row,
                field: "country",
            });
        }
        Some(RawValue::Text(text)) => {
            parse_country(text).ok_or_else(|| SchemaError::UnknownCountry {
                source_type,
                row,
                value: text.trim().to_string(),
            })?
        }
        Some(other) => {
            return Err(SchemaError::Unparseable {
                source_type,
                row,
                field: "country",
                value: display_raw(other),
            });
        }
    };

    let mut record = CanonicalRecord::new(id, source_type, country);
    let text = |target: Target| values.get(&target).and_then(|v| as_text(v));
    let number = |target: Target, field: &'static str| {
        values.get(&target).and_then(|v| as_number(v, source_type, row, field))
    };

    record.source_id = text(Target::SourceId);
    record.city = text(Target::City);
    record.organization = text(Target::Organization);
    record.role = text(Target::Role);

    record.technology = match values.get(&Target::Technology) {
        Some(value) => as_vocabulary_set(value).ok_or_else(|| SchemaError::Unparseable {
            source_type,
            row,
            field: "technology",
            value: display_raw(value),
        })?,
        None => BTreeSet::new(),
    };
    if source_type == SourceType::Job && record.technology.is_empty() {
        return Err(SchemaError::MissingField {
            source_type,
            row,
            field: "technology",
        });
    }
    record.framework = values
        .get(&Target::Framework)
        .and_then(|v| as_vocabulary_set(v))
        .unwrap_or_default();

    let annual = number(Target::SalaryAnnual, "salary");
    let monthly = number(Target::SalaryMonthly, "salary").map(|m| m * 12.0);
    record.salary = annual.or(monthly).and_then(positive);

    record.years_experience = number(Target::YearsExperience, "years_experience").and_then(positive);
    record.experience_level = match values.get(&Target::Experience) {
        Some(RawValue::Text(label)) => parse_experience(label),
        Some(RawValue::Number(years)) => ExperienceLevel::from_years(*years),
        _ => None,
    }
    .or_else(|| record.years_experience.and_then(ExperienceLevel::from_years));

    record.age = number(Target::Age, "age").and_then(positive);
    record.investment_usd = number(Target::InvestmentUsd, "investment_usd").and_then(positive);
    record.participants = number(Target::Participants, "participants").and_then(positive);
    record.period = values.get(&Target::Period).and_then(|v| as_period(v));

    Ok(record)
}

fn is_absent(value: &RawValue) -> bool {
    match value {
        RawValue::Null => true,
        RawValue::Text(text) => is_null_marker(text),
        RawValue::Number(n) => n.is_nan(),
        RawValue::List(items) => items.iter().all(|item| is_null_marker(item)),
        RawValue::Bool(_) => false,
    }
}

fn display_raw(value: &RawValue) -> String {
    match value {
        RawValue::Null => "null".to_string(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Number(n) => format_number(*n),
        RawValue::Text(text) => text.clone(),
        RawValue::List(items) => items.join(", "),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn as_text(value: &RawValue) -> Option<String> {
    match value {
        RawValue::Text(text) => Some(collapse_whitespace(text)),
        RawValue::Number(n) => Some(format_number(*n)),
        RawValue::List(items) if !items.is_empty() => Some(items.join(", ")),
        _ => None,
    }
}

/// Optional numerics that fail to parse become `None`.
fn as_number(value: &RawValue, source_type: SourceType, row: usize, field: &str) -> Option<f64> {
    let parsed = match value {
        RawValue::Number(n) => Some(*n),
        RawValue::Text(text) => parse_numeric_string(text),
        _ => None,
    };
    if parsed.is_none() {
        debug!(
            "{} row {}: ignoring unparseable {} value '{}'",
            source_type,
            row,
            field,
            display_raw(value)
        );
    }
    parsed
}

/// Parse a technology/framework value into its canonical set.
///
/// Returns `None` when the value has the wrong shape (e.g. a boolean).
fn as_vocabulary_set(value: &RawValue) -> Option<BTreeSet<String>> {
    let tokens: Vec<String> = match value {
        RawValue::Text(text) => split_list(text),
        RawValue::List(items) => items.iter().flat_map(|item| split_list(item)).collect(),
        _ => return None,
    };
    Some(
        tokens
            .iter()
            .filter_map(|token| canonical_technology(token))
            .collect(),
    )
}

fn as_period(value: &RawValue) -> Option<NaiveDate> {
    match value {
        RawValue::Number(n) => year_start(*n),
        RawValue::Text(text) => parse_period(text),
        _ => None,
    }
}

fn year_start(year: f64) -> Option<NaiveDate> {
    if year.fract() != 0.0 || !(1900.0..=2100.0).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year as i32, 1, 1)
}

/// Parse a period from `YYYY-MM-DD`, `DD/MM/YYYY`, `YYYY/MM/DD`, a datetime
/// with one of those date prefixes, or a bare year (January 1st).
pub fn parse_period(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(year) = text.parse::<i32>() {
        return year_start(year as f64);
    }
    let date_part = text.split(['T', ' ']).next().unwrap_or(text);
    ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .filter(|date| (1900..=2100).contains(&date.year()))
}
