//! # Bucket Partition Planning
//!
//! Turns a leaf definition's object-set specification into the ordered list
//! of bucket contents that seeds the ledger. Planning is pure; persisting the
//! planned buckets is the claimer's job.

use crate::bucket::bucket::BucketContent;
use crate::definition::work_definition::{ObjectSetSpec, WorkDefinition};
use crate::error::{CoreError, Result};

/// Plan the bucket contents for a leaf definition.
///
/// Composite definitions own no object set and plan nothing. The effective
/// bucket size is the definition's override when present, otherwise the
/// engine default; auto-scaling definitions derive it from the object-set
/// span and their bucket cap instead.
pub fn plan_buckets(
    definition: &WorkDefinition,
    default_bucket_size: u64,
) -> Result<Vec<BucketContent>> {
    let Some(object_set) = definition.object_set() else {
        return Ok(Vec::new());
    };

    match object_set {
        ObjectSetSpec::NumericRange { from, to } => {
            let bucket_size = effective_bucket_size(definition, *from, *to, default_bucket_size)?;
            plan_interval(*from, *to, bucket_size)
        }
        ObjectSetSpec::FilterSet { filters } => Ok(plan_filters(filters)),
    }
}

/// Split `[from, to)` into contiguous half-open intervals of at most
/// `bucket_size` items
pub fn plan_interval(from: i64, to: i64, bucket_size: u64) -> Result<Vec<BucketContent>> {
    if from > to {
        return Err(CoreError::SchemaError(format!(
            "numeric range [{from}, {to}) is inverted"
        )));
    }
    if bucket_size == 0 {
        return Err(CoreError::SchemaError(
            "bucket size must be positive".to_string(),
        ));
    }

    let mut contents = Vec::new();
    let mut cursor = from;
    while cursor < to {
        let end = cursor.saturating_add(bucket_size.min(i64::MAX as u64) as i64).min(to);
        contents.push(BucketContent::Interval {
            from: cursor,
            to: end,
        });
        cursor = end;
    }
    Ok(contents)
}

/// One bucket per predicate, in declaration order
pub fn plan_filters(filters: &[String]) -> Vec<BucketContent> {
    filters
        .iter()
        .map(|predicate| BucketContent::Filter {
            predicate: predicate.clone(),
        })
        .collect()
}

fn effective_bucket_size(
    definition: &WorkDefinition,
    from: i64,
    to: i64,
    default_bucket_size: u64,
) -> Result<u64> {
    if let Some(size) = definition.bucket_size() {
        return Ok(size);
    }
    if let WorkDefinition::AutoScaling(work) = definition {
        if work.max_buckets == 0 {
            return Err(CoreError::SchemaError(
                "auto-scaling max_buckets must be positive".to_string(),
            ));
        }
        let span = (to - from).max(0) as u64;
        // Smallest size that keeps the plan within max_buckets
        return Ok(span.div_ceil(work.max_buckets).max(1));
    }
    Ok(default_bucket_size)
}
