use super::Warehouse;
use crate::types::{Country, ExperienceLevel, SalaryBand, SourceType};
use crate::utils::{mean, median};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const TOP_CITIES: usize = 5;
const TOP_STACK: usize = 10;

/// Descriptive statistics of the warehouse contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseSummary {
    pub total_records: usize,
    pub records_by_source: BTreeMap<SourceType, usize>,
    pub records_by_country: BTreeMap<Country, usize>,
    pub top_cities: Vec<(String, usize)>,
    pub records_with_salary: usize,
    pub mean_salary: Option<f64>,
    pub median_salary: Option<f64>,
    pub salary_bands: BTreeMap<SalaryBand, usize>,
    pub experience_levels: BTreeMap<ExperienceLevel, usize>,
    pub top_technologies: Vec<(String, usize)>,
    pub top_frameworks: Vec<(String, usize)>,
}

impl Warehouse {
    /// Summarize counts, salary statistics and the most common stack items.
    pub fn summary(&self) -> WarehouseSummary {
        let records = self.records();

        let mut records_by_source = BTreeMap::new();
        let mut records_by_country = BTreeMap::new();
        let mut salary_bands = BTreeMap::new();
        let mut experience_levels = BTreeMap::new();
        let mut cities: HashMap<&str, usize> = HashMap::new();
        let mut technologies: HashMap<&str, usize> = HashMap::new();
        let mut frameworks: HashMap<&str, usize> = HashMap::new();

        for record in records {
            *records_by_source.entry(record.source_type).or_default() += 1;
            *records_by_country.entry(record.country).or_default() += 1;
            if let Some(band) = record.salary_band() {
                *salary_bands.entry(band).or_default() += 1;
            }
            if let Some(level) = record.experience_level {
                *experience_levels.entry(level).or_default() += 1;
            }
            if let Some(city) = &record.city {
                *cities.entry(city.as_str()).or_default() += 1;
            }
            for tech in &record.technology {
                *technologies.entry(tech.as_str()).or_default() += 1;
            }
            for framework in &record.framework {
                *frameworks.entry(framework.as_str()).or_default() += 1;
            }
        }

        let salaries: Vec<f64> = records.iter().filter_map(|r| r.salary).collect();

        WarehouseSummary {
            total_records: records.len(),
            records_by_source,
            records_by_country,
            top_cities: top_n(cities, TOP_CITIES),
            records_with_salary: salaries.len(),
            mean_salary: mean(salaries.iter().copied()),
            median_salary: median(salaries.iter().copied()),
            salary_bands,
            experience_levels,
            top_technologies: top_n(technologies, TOP_STACK),
            top_frameworks: top_n(frameworks, TOP_STACK),
        }
    }
}

/// Most frequent items, count descending then name ascending.
fn top_n(counts: HashMap<&str, usize>, n: usize) -> Vec<(String, usize)> {
    let mut items: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items.truncate(n);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CanonicalRecord, RecordId};
    use pretty_assertions::assert_eq;

    fn job(id: u64, country: Country, tech: &str, salary: f64) -> CanonicalRecord {
        let mut r = CanonicalRecord::new(RecordId(id), SourceType::Job, country);
        r.technology.insert(tech.to_string());
        r.salary = Some(salary);
        r.experience_level = Some(ExperienceLevel::Senior);
        r
    }

    #[test]
    fn test_summary_counts() {
        let mut profile = CanonicalRecord::new(RecordId(4), SourceType::Profile, Country::Chile);
        profile.city = Some("Santiago".to_string());
        let warehouse = Warehouse::builder()
            .build(vec![
                job(1, Country::Usa, "Python", 120_000.0),
                job(2, Country::Usa, "Go", 160_000.0),
                job(3, Country::Peru, "Python", 20_000.0),
                profile,
            ])
            .unwrap();

        let summary = warehouse.summary();
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.records_by_source.get(&SourceType::Job), Some(&3));
        assert_eq!(summary.records_by_country.get(&Country::Usa), Some(&2));
        assert_eq!(summary.records_with_salary, 3);
        assert_eq!(summary.mean_salary, Some(100_000.0));
        assert_eq!(summary.median_salary, Some(120_000.0));
        assert_eq!(summary.salary_bands.get(&SalaryBand::Over150K), Some(&1));
        assert_eq!(summary.experience_levels.get(&ExperienceLevel::Senior), Some(&3));
        assert_eq!(
            summary.top_technologies,
            vec![("Python".to_string(), 2), ("Go".to_string(), 1)]
        );
        assert_eq!(summary.top_cities, vec![("Santiago".to_string(), 1)]);
    }

    #[test]
    fn test_summary_serializes_enum_keys() {
        let warehouse = Warehouse::builder()
            .build(vec![job(1, Country::Usa, "Rust", 90_000.0)])
            .unwrap();
        let json = serde_json::to_value(warehouse.summary()).unwrap();
        assert_eq!(json["records_by_country"]["USA"], 1);
        assert_eq!(json["salary_bands"]["75K-100K"], 1);
    }
}
