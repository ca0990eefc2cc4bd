//! Proptest strategies for work definitions and bucket planning inputs.

#![allow(dead_code)] // Each test binary uses a different slice of these helpers

use proptest::prelude::*;
use taskgrid_core::definition::WorkKind;

pub fn work_kind_strategy() -> impl Strategy<Value = WorkKind> {
    prop::sample::select(WorkKind::ALL.to_vec())
}

/// Every kind except the composite, which takes a different payload shape
pub fn leaf_kind_strategy() -> impl Strategy<Value = WorkKind> {
    prop::sample::select(
        WorkKind::ALL
            .into_iter()
            .filter(|kind| *kind != WorkKind::Coordinate)
            .collect::<Vec<_>>(),
    )
}

/// Half-open `[from, to)` ranges with assorted spans, including empty ones
pub fn numeric_range_strategy() -> impl Strategy<Value = (i64, i64)> {
    (-1_000_000i64..1_000_000, 0i64..100_000).prop_map(|(from, span)| (from, from + span))
}

pub fn bucket_size_strategy() -> impl Strategy<Value = u64> {
    1u64..=5_000
}

pub fn filters_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z_]{1,12} = '[a-z0-9]{1,8}'", 0..6)
}
