//! The TechWarehouse: the authoritative, ordered set of cleaned records.
//!
//! [`WarehouseBuilder`] assembles and verifies it; downstream stages only
//! read records and attach the additive derived fields through
//! [`Warehouse::attach_cluster`] and [`Warehouse::attach_prediction`].

mod export;
mod summary;

pub use summary::WarehouseSummary;

use crate::error::IntegrityError;
use crate::types::{CanonicalRecord, RecordId, SourceType};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Ordered, verified record set of one run.
#[derive(Debug, Clone, Default)]
pub struct Warehouse {
    records: Vec<CanonicalRecord>,
    index: HashMap<RecordId, usize>,
}

impl Warehouse {
    pub fn builder() -> WarehouseBuilder {
        WarehouseBuilder::default()
    }

    /// Records in ingestion order.
    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&CanonicalRecord> {
        self.index.get(&id).map(|&idx| &self.records[idx])
    }

    /// Records of one source, in ingestion order.
    pub fn by_source(&self, source_type: SourceType) -> impl Iterator<Item = &CanonicalRecord> {
        self.records
            .iter()
            .filter(move |r| r.source_type == source_type)
    }

    /// Attach a cluster label to a record. Each record gets at most one.
    pub fn attach_cluster(&mut self, id: RecordId, cluster: usize) -> Result<(), IntegrityError> {
        let record = self.record_mut(id)?;
        if record.cluster_id.is_some() {
            return Err(IntegrityError::DerivedFieldAlreadySet {
                id,
                field: "cluster_id",
            });
        }
        record.cluster_id = Some(cluster);
        Ok(())
    }

    /// Attach a high-demand prediction to a record. Each record gets at most one.
    pub fn attach_prediction(&mut self, id: RecordId, high_demand: bool) -> Result<(), IntegrityError> {
        let record = self.record_mut(id)?;
        if record.predicted_high_demand.is_some() {
            return Err(IntegrityError::DerivedFieldAlreadySet {
                id,
                field: "predicted_high_demand",
            });
        }
        record.predicted_high_demand = Some(high_demand);
        Ok(())
    }

    fn record_mut(&mut self, id: RecordId) -> Result<&mut CanonicalRecord, IntegrityError> {
        let idx = *self
            .index
            .get(&id)
            .ok_or(IntegrityError::UnknownRecord(id))?;
        Ok(&mut self.records[idx])
    }
}

/// Assembles a [`Warehouse`] and verifies its invariants.
#[derive(Debug, Default)]
pub struct WarehouseBuilder {
    removed: BTreeSet<RecordId>,
}

impl WarehouseBuilder {
    /// Ids the outlier engine removed; none of them may be present.
    pub fn removed(mut self, ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.removed.extend(ids);
        self
    }

    /// Order records by id and verify:
    ///
    /// - ids are unique,
    /// - numeric fields hold no zero, negative or non-finite value,
    /// - no removed record is present.
    ///
    /// Countries are a closed enum, so vocabulary membership holds by type.
    pub fn build(self, mut records: Vec<CanonicalRecord>) -> Result<Warehouse, IntegrityError> {
        records.sort_by_key(|r| r.id);

        let mut index = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            if index.insert(record.id, idx).is_some() {
                return Err(IntegrityError::DuplicateId(record.id));
            }
            if self.removed.contains(&record.id) {
                return Err(IntegrityError::RemovedRecordPresent(record.id));
            }
            check_numeric(record)?;
        }

        debug!("Warehouse invariants verified for {} records", records.len());
        info!("Warehouse assembled with {} records", records.len());
        Ok(Warehouse { records, index })
    }
}

fn check_numeric(record: &CanonicalRecord) -> Result<(), IntegrityError> {
    let fields = [
        ("salary", record.salary),
        ("age", record.age),
        ("years_experience", record.years_experience),
        ("investment_usd", record.investment_usd),
        ("participants", record.participants),
    ];
    for (field, value) in fields {
        if let Some(value) = value
            && (!value.is_finite() || value <= 0.0)
        {
            return Err(IntegrityError::SentinelValue {
                id: record.id,
                field,
                value,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Country;
    use pretty_assertions::assert_eq;

    fn record(id: u64) -> CanonicalRecord {
        CanonicalRecord::new(RecordId(id), SourceType::Profile, Country::Argentina)
    }

    #[test]
    fn test_build_orders_by_id() {
        let warehouse = Warehouse::builder()
            .build(vec![record(3), record(1), record(2)])
            .unwrap();
        let ids: Vec<u64> = warehouse.records().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(warehouse.get(RecordId(2)).map(|r| r.id), Some(RecordId(2)));
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let err = Warehouse::builder()
            .build(vec![record(1), record(1)])
            .unwrap_err();
        assert_eq!(err, IntegrityError::DuplicateId(RecordId(1)));
    }

    #[test]
    fn test_sentinel_zero_is_fatal() {
        let mut bad = record(1);
        bad.salary = Some(0.0);
        assert!(matches!(
            Warehouse::builder().build(vec![bad]),
            Err(IntegrityError::SentinelValue { field: "salary", .. })
        ));
    }

    #[test]
    fn test_removed_record_is_fatal() {
        let err = Warehouse::builder()
            .removed([RecordId(2)])
            .build(vec![record(1), record(2)])
            .unwrap_err();
        assert_eq!(err, IntegrityError::RemovedRecordPresent(RecordId(2)));
    }

    #[test]
    fn test_attach_derived_fields_once() {
        let mut warehouse = Warehouse::builder().build(vec![record(1)]).unwrap();
        warehouse.attach_cluster(RecordId(1), 2).unwrap();
        warehouse.attach_prediction(RecordId(1), true).unwrap();
        assert_eq!(warehouse.records()[0].cluster_id(), Some(2));
        assert_eq!(warehouse.records()[0].predicted_high_demand(), Some(true));

        assert!(matches!(
            warehouse.attach_cluster(RecordId(1), 0),
            Err(IntegrityError::DerivedFieldAlreadySet { .. })
        ));
        assert_eq!(
            warehouse.attach_prediction(RecordId(9), false),
            Err(IntegrityError::UnknownRecord(RecordId(9)))
        );
    }
}
