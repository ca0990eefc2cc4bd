//! # Activity Trees
//!
//! ## Architecture: Compiled Execution Shape
//!
//! A task's root configuration blob compiles into a tree of activities. Composite
//! definitions contribute interior nodes whose children are parsed from their embedded
//! config blobs (each child resolving through the factory with its own addressing), and
//! every node is bound to a dot-separated path rooted at a fixed root segment. The
//! compiled tree is immutable; execution walks it, and all mutable run state lives in
//! the store keyed by `(task_id, path)`.
//!
//! Identifier problems surface here as `ConfigurationError` before anything executes,
//! so a running task can trust that every path in its tree resolves.

use crate::activity::definition::ActivityDefinition;
use crate::activity::path::ActivityPath;
use crate::constants::system;
use crate::definition::{WorkConfig, WorkDefinition, WorkDefinitionFactory};
use crate::error::{CoreError, Result};
use std::collections::HashSet;
use tracing::debug;

/// One node of a compiled activity tree
#[derive(Debug, Clone)]
pub struct Activity {
    pub definition: ActivityDefinition,
    pub children: Vec<Activity>,
}

impl Activity {
    fn compile(
        factory: &WorkDefinitionFactory,
        path: ActivityPath,
        work: WorkDefinition,
    ) -> Result<Self> {
        let children = match &work {
            WorkDefinition::Coordinate(coordinate) => {
                let mut seen = HashSet::new();
                let mut children = Vec::with_capacity(coordinate.children.len());

                for child_ref in &coordinate.children {
                    validate_child_id(&path, &child_ref.id)?;
                    if !seen.insert(child_ref.id.as_str()) {
                        return Err(CoreError::ConfigurationError(format!(
                            "Duplicate child id '{}' under activity '{}'",
                            child_ref.id, path
                        )));
                    }

                    let child_work = factory.parse(&child_ref.config)?;
                    children.push(Self::compile(
                        factory,
                        path.child(&child_ref.id),
                        child_work,
                    )?);
                }

                children
            }
            _ => Vec::new(),
        };

        Ok(Self {
            definition: ActivityDefinition::new(path, work),
            children,
        })
    }

    pub fn path(&self) -> &ActivityPath {
        &self.definition.path
    }

    pub fn is_composite(&self) -> bool {
        self.definition.is_composite()
    }
}

fn validate_child_id(parent: &ActivityPath, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CoreError::ConfigurationError(format!(
            "Empty child id under activity '{parent}'"
        )));
    }
    if id.contains('.') {
        return Err(CoreError::ConfigurationError(format!(
            "Child id '{id}' under activity '{parent}' must not contain '.'"
        )));
    }
    Ok(())
}

/// A task's compiled execution shape
#[derive(Debug, Clone)]
pub struct ActivityTree {
    root: Activity,
}

impl ActivityTree {
    /// Compile a root configuration blob into an activity tree.
    ///
    /// Each composite child's config blob resolves through the factory with its own
    /// addressing, so one tree may mix tagged and legacy-addressed definitions.
    pub fn compile(factory: &WorkDefinitionFactory, root_config: &WorkConfig) -> Result<Self> {
        let work = factory.parse(root_config)?;
        let root = Activity::compile(factory, ActivityPath::root(system::ROOT_ACTIVITY_ID), work)?;

        debug!(
            activity_count = count_activities(&root),
            "📚 Compiled activity tree"
        );
        Ok(Self { root })
    }

    pub fn root(&self) -> &Activity {
        &self.root
    }

    /// Look up the activity at a path, erroring on any unknown segment
    pub fn resolve(&self, path: &ActivityPath) -> Result<&Activity> {
        let segments = path.segments();

        if segments.first().map(String::as_str) != Some(self.root.definition.leaf_id()) {
            return Err(CoreError::SchemaError(format!(
                "Activity path '{}' does not start at tree root '{}'",
                path,
                self.root.definition.leaf_id()
            )));
        }

        let mut current = &self.root;
        for segment in &segments[1..] {
            current = current
                .children
                .iter()
                .find(|child| child.definition.leaf_id() == segment)
                .ok_or_else(|| {
                    CoreError::SchemaError(format!(
                        "Unknown activity '{}' under '{}'",
                        segment,
                        current.path()
                    ))
                })?;
        }

        Ok(current)
    }

    /// All activities in preorder, parents before children
    pub fn activities(&self) -> Vec<&Activity> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(activity) = stack.pop() {
            out.push(activity);
            for child in activity.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Leaf activities only, the ones that need handlers
    pub fn leaves(&self) -> Vec<&Activity> {
        self.activities()
            .into_iter()
            .filter(|activity| !activity.is_composite())
            .collect()
    }

    pub fn activity_count(&self) -> usize {
        count_activities(&self.root)
    }
}

fn count_activities(activity: &Activity) -> usize {
    1 + activity.children.iter().map(count_activities).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{builtin_legacy_uri, TypeTag, WorkKind};
    use serde_json::{json, Value};

    fn search_payload(from: i64, to: i64) -> Value {
        json!({"object_set": {"numeric_range": {"from": from, "to": to}}})
    }

    fn search_config(from: i64, to: i64) -> Value {
        json!({
            "type_tag": {"namespace": "core", "name": "search", "version": "1"},
            "payload": search_payload(from, to),
        })
    }

    fn compile(config: &WorkConfig) -> Result<ActivityTree> {
        let factory = WorkDefinitionFactory::with_builtins();
        ActivityTree::compile(&factory, config)
    }

    #[test]
    fn compiles_leaf_root() {
        let config = WorkConfig::typed(
            TypeTag::builtin(WorkKind::Search),
            search_payload(0, 100),
        );
        let tree = compile(&config).unwrap();

        assert_eq!(tree.activity_count(), 1);
        assert_eq!(tree.root().path().to_string(), "root");
        assert!(tree.leaves()[0].path().is_root());
    }

    #[test]
    fn compiles_nested_tree_with_paths() {
        let config = WorkConfig::typed(
            TypeTag::builtin(WorkKind::Coordinate),
            json!({
                "children": [
                    {"id": "scan", "config": search_config(0, 100)},
                    {"id": "phase", "config": {
                        "type_tag": {"namespace": "core", "name": "coordinate", "version": "1"},
                        "payload": {"children": [
                            {"id": "fix", "config": search_config(100, 200)},
                        ]},
                    }},
                ],
            }),
        );

        let tree = compile(&config).unwrap();
        let paths: Vec<String> = tree
            .activities()
            .iter()
            .map(|a| a.path().to_string())
            .collect();

        assert_eq!(paths, vec!["root", "root.scan", "root.phase", "root.phase.fix"]);
        assert_eq!(tree.leaves().len(), 2);
    }

    #[test]
    fn children_may_use_legacy_addressing() {
        let config = WorkConfig::typed(
            TypeTag::builtin(WorkKind::Coordinate),
            json!({
                "children": [
                    {"id": "old", "config": {
                        "legacy_uri": builtin_legacy_uri(WorkKind::Search),
                        "payload": search_payload(0, 10),
                    }},
                ],
            }),
        );

        let tree = compile(&config).unwrap();
        assert_eq!(tree.leaves()[0].definition.kind(), WorkKind::Search);
    }

    #[test]
    fn resolve_walks_to_nested_activities() {
        let config = WorkConfig::typed(
            TypeTag::builtin(WorkKind::Coordinate),
            json!({
                "children": [
                    {"id": "scan", "config": search_config(0, 100)},
                ],
            }),
        );
        let tree = compile(&config).unwrap();

        let scan = tree.resolve(&"root.scan".parse().unwrap()).unwrap();
        assert_eq!(scan.definition.kind(), WorkKind::Search);

        let err = tree.resolve(&"root.missing".parse().unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::SchemaError(_)));

        let err = tree.resolve(&"elsewhere".parse().unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::SchemaError(_)));
    }

    #[test]
    fn duplicate_child_ids_are_rejected() {
        let config = WorkConfig::typed(
            TypeTag::builtin(WorkKind::Coordinate),
            json!({
                "children": [
                    {"id": "scan", "config": search_config(0, 100)},
                    {"id": "scan", "config": search_config(100, 200)},
                ],
            }),
        );

        let err = compile(&config).unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
        assert!(err.to_string().contains("Duplicate child id"));
    }

    #[test]
    fn child_ids_with_dots_are_rejected() {
        let config = WorkConfig::typed(
            TypeTag::builtin(WorkKind::Coordinate),
            json!({
                "children": [
                    {"id": "scan.deep", "config": search_config(0, 100)},
                ],
            }),
        );

        let err = compile(&config).unwrap_err();
        assert!(matches!(err, CoreError::ConfigurationError(_)));
    }
}
