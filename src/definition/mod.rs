//! # Work Definitions and Their Factory
//!
//! The typed configuration layer: the closed [`WorkDefinition`] variant enum
//! and the dual-addressed [`WorkDefinitionFactory`] that produces definitions
//! from persisted configuration blobs.

pub mod factory;
pub mod work_definition;

pub use factory::{builtin_legacy_uri, Supplier, TypeTag, WorkConfig, WorkDefinitionFactory};
pub use work_definition::{
    AsyncUpdateWork, AutoScalingWork, ChildWorkRef, CoordinateWork, ExecutionMode, ObjectSetSpec,
    PropagationWork, ScriptingWork, SearchWork, TriggerScanWork, WorkCommon, WorkDefinition,
    WorkKind,
};
