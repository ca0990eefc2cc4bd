//! # Work Buckets
//!
//! Buckets are the unit of claimable work inside an activity. Planning slices an
//! activity's object set into an ordered ledger of buckets, and workers race to claim,
//! process and complete them through version-checked store updates.
//!
//! ## Components
//!
//! - **bucket**: The `WorkBucket` record, its states and lease arithmetic
//! - **partition**: Slicing object sets into bucket contents
//! - **claim**: The `BucketClaimer` protocol over the object store

pub mod bucket;
pub mod claim;
pub mod partition;

pub use bucket::{BucketContent, BucketHolder, BucketState, WorkBucket};
pub use claim::{BucketClaimer, BucketClaimerConfig, LedgerSummary};
pub use partition::plan_buckets;
