use super::Warehouse;
use crate::types::CanonicalRecord;
use polars::prelude::*;

fn join_set(set: &std::collections::BTreeSet<String>) -> Option<String> {
    (!set.is_empty()).then(|| set.iter().cloned().collect::<Vec<_>>().join("; "))
}

fn text_column<F>(name: &str, records: &[CanonicalRecord], f: F) -> Column
where
    F: Fn(&CanonicalRecord) -> Option<String>,
{
    let values: Vec<Option<String>> = records.iter().map(f).collect();
    Column::new(name.into(), values)
}

fn float_column<F>(name: &str, records: &[CanonicalRecord], f: F) -> Column
where
    F: Fn(&CanonicalRecord) -> Option<f64>,
{
    let values: Vec<Option<f64>> = records.iter().map(f).collect();
    Column::new(name.into(), values)
}

impl Warehouse {
    /// Project the enriched records into a flat `DataFrame`, one row per
    /// record in warehouse order.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let records = self.records();

        let ids: Vec<u64> = records.iter().map(|r| r.id.0).collect();
        let cluster_ids: Vec<Option<u32>> = records
            .iter()
            .map(|r| r.cluster_id().map(|c| c as u32))
            .collect();
        let predictions: Vec<Option<bool>> =
            records.iter().map(|r| r.predicted_high_demand()).collect();

        DataFrame::new(vec![
            Column::new("record_id".into(), ids),
            text_column("source_type", records, |r| Some(r.source_type.to_string())),
            text_column("source_id", records, |r| r.source_id.clone()),
            text_column("country", records, |r| Some(r.country.to_string())),
            text_column("city", records, |r| r.city.clone()),
            text_column("organization", records, |r| r.organization.clone()),
            text_column("role", records, |r| r.role.clone()),
            text_column("technology", records, |r| join_set(&r.technology)),
            text_column("framework", records, |r| join_set(&r.framework)),
            float_column("salary_usd", records, |r| r.salary),
            text_column("salary_band", records, |r| {
                r.salary_band().map(|b| b.label().to_string())
            }),
            text_column("experience_level", records, |r| {
                r.experience_level.map(|l| l.label().to_string())
            }),
            float_column("years_experience", records, |r| r.years_experience),
            float_column("age", records, |r| r.age),
            float_column("investment_usd", records, |r| r.investment_usd),
            float_column("participants", records, |r| r.participants),
            text_column("period", records, |r| {
                r.period.map(|d| d.format("%Y-%m-%d").to_string())
            }),
            Column::new("cluster_id".into(), cluster_ids),
            Column::new("predicted_high_demand".into(), predictions),
        ])
    }
}
