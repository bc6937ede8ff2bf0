//! Workflow catalog
//!
//! Populated once at startup and shared read-only (behind an `Arc`) by the
//! router, executor and harness afterwards.

mod builtin;

pub use builtin::builtin_workflows;

use crate::error::WorkflowError;
use crate::models::{ComplexityTier, ExecutionPattern, WorkflowCategory, WorkflowDefinition};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

pub const REGISTRY_VERSION: &str = "1.0";

/// Insertion-ordered table of workflow definitions.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    workflows: Vec<Arc<WorkflowDefinition>>,
    index: HashMap<String, usize>,
}

/// Optional category/pattern/complexity filter for [`Catalog::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub category: Option<WorkflowCategory>,
    pub pattern: Option<ExecutionPattern>,
    pub complexity: Option<ComplexityTier>,
}

impl CatalogFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: WorkflowCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn pattern(mut self, pattern: ExecutionPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn complexity(mut self, complexity: ComplexityTier) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn matches(&self, definition: &WorkflowDefinition) -> bool {
        self.category.map_or(true, |c| definition.category == c)
            && self.pattern.map_or(true, |p| definition.pattern == p)
            && self.complexity.map_or(true, |c| definition.complexity == c)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogStats {
    pub total_workflows: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_pattern: BTreeMap<String, usize>,
    pub by_complexity: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub export_date: DateTime<Utc>,
    pub total_workflows: usize,
    pub registry_version: String,
    /// Hex sha256 over the serialized workflow list
    pub digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogExport {
    pub metadata: ExportMetadata,
    pub workflows: Vec<WorkflowDefinition>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with the wealth-management workflow set.
    pub fn with_builtin_workflows() -> Result<Self> {
        let mut catalog = Self::new();
        for definition in builtin_workflows() {
            catalog.register(definition)?;
        }
        info!(workflows = catalog.len(), "Built-in workflow catalog loaded");
        Ok(catalog)
    }

    pub fn register(&mut self, definition: WorkflowDefinition) -> Result<Arc<WorkflowDefinition>> {
        definition.validate()?;

        if self.index.contains_key(&definition.workflow_id) {
            return Err(WorkflowError::DuplicateId(definition.workflow_id));
        }

        debug!(
            workflow_id = %definition.workflow_id,
            pattern = %definition.pattern,
            steps = definition.steps.len(),
            "Registering workflow"
        );

        let definition = Arc::new(definition);
        self.index
            .insert(definition.workflow_id.clone(), self.workflows.len());
        self.workflows.push(definition.clone());
        Ok(definition)
    }

    pub fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.index
            .get(workflow_id)
            .map(|&position| self.workflows[position].clone())
    }

    pub fn contains(&self, workflow_id: &str) -> bool {
        self.index.contains_key(workflow_id)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Every definition in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkflowDefinition>> + '_ {
        self.workflows.iter()
    }

    /// Lazy, insertion-ordered view of the definitions matching `filter`.
    /// Each call starts a fresh sequence.
    pub fn list<'a>(
        &'a self,
        filter: &'a CatalogFilter,
    ) -> impl Iterator<Item = &'a Arc<WorkflowDefinition>> + 'a {
        self.workflows.iter().filter(move |d| filter.matches(d))
    }

    pub fn ids_for_pattern(&self, pattern: ExecutionPattern) -> Vec<String> {
        self.list(&CatalogFilter::all().pattern(pattern))
            .map(|d| d.workflow_id.clone())
            .collect()
    }

    /// Case-insensitive search over name, description and triggers.
    pub fn search(&self, query: &str) -> Vec<Arc<WorkflowDefinition>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        self.workflows
            .iter()
            .filter(|d| {
                d.name.to_lowercase().contains(&query)
                    || d.description.to_lowercase().contains(&query)
                    || d.triggers.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let mut by_category: BTreeMap<String, usize> = WorkflowCategory::ALL
            .iter()
            .map(|c| (c.to_string(), 0))
            .collect();
        let mut by_pattern: BTreeMap<String, usize> = ExecutionPattern::ALL
            .iter()
            .map(|p| (p.to_string(), 0))
            .collect();
        let mut by_complexity: BTreeMap<String, usize> = ComplexityTier::ALL
            .iter()
            .map(|c| (c.to_string(), 0))
            .collect();

        for definition in &self.workflows {
            *by_category.entry(definition.category.to_string()).or_default() += 1;
            *by_pattern.entry(definition.pattern.to_string()).or_default() += 1;
            *by_complexity
                .entry(definition.complexity.to_string())
                .or_default() += 1;
        }

        CatalogStats {
            total_workflows: self.workflows.len(),
            by_category,
            by_pattern,
            by_complexity,
        }
    }

    pub fn export(&self) -> Result<CatalogExport> {
        let workflows: Vec<WorkflowDefinition> =
            self.workflows.iter().map(|d| (**d).clone()).collect();

        Ok(CatalogExport {
            metadata: ExportMetadata {
                export_date: Utc::now(),
                total_workflows: workflows.len(),
                registry_version: REGISTRY_VERSION.to_string(),
                digest: compute_digest(&workflows)?,
            },
            workflows,
        })
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export()?)?)
    }

    /// Rebuild a catalog from [`Catalog::export_json`] output. The digest is
    /// verified and every definition goes through normal registration.
    pub fn from_json(json: &str) -> Result<Self> {
        let export: CatalogExport = serde_json::from_str(json)?;

        let digest = compute_digest(&export.workflows)?;
        if digest != export.metadata.digest {
            return Err(WorkflowError::Integrity(format!(
                "digest mismatch: expected {}, computed {}",
                export.metadata.digest, digest
            )));
        }
        if export.metadata.total_workflows != export.workflows.len() {
            return Err(WorkflowError::Integrity(format!(
                "metadata lists {} workflows, payload has {}",
                export.metadata.total_workflows,
                export.workflows.len()
            )));
        }

        let mut catalog = Self::new();
        for definition in export.workflows {
            catalog.register(definition)?;
        }
        Ok(catalog)
    }
}

fn compute_digest(workflows: &[WorkflowDefinition]) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(HashWriter(&mut hasher), workflows)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Adapter to allow writing into a digest via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> Catalog {
        Catalog::with_builtin_workflows().unwrap()
    }

    #[test]
    fn test_builtin_definitions_are_well_formed() {
        let catalog = builtin();
        assert_eq!(catalog.len(), 21);

        for definition in catalog.iter() {
            let fetched = catalog.get(&definition.workflow_id).unwrap();
            assert!(!fetched.steps.is_empty());
            assert!(ExecutionPattern::ALL.contains(&fetched.pattern));
        }
    }

    #[test]
    fn test_every_pattern_is_represented() {
        let stats = builtin().stats();
        assert_eq!(stats.by_pattern.len(), ExecutionPattern::ALL.len());
        assert!(stats.by_pattern.values().all(|&count| count > 0));
        assert_eq!(stats.by_pattern["master_orchestration"], 1);
        assert_eq!(stats.by_category["advisor"], 15);
        assert_eq!(stats.by_category["client"], 3);
        assert_eq!(stats.by_category["operations"], 3);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut catalog = builtin();
        let duplicate = (*catalog.get("ADV001").unwrap()).clone();

        let err = catalog.register(duplicate).unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateId(id) if id == "ADV001"));
        assert_eq!(catalog.len(), 21);
    }

    #[test]
    fn test_invalid_definition_is_rejected() {
        let mut catalog = Catalog::new();
        let empty = WorkflowDefinition::new(
            "EMPTY",
            "No steps",
            WorkflowCategory::Client,
            ExecutionPattern::Sequential,
            ComplexityTier::Simple,
            &[],
        );
        assert!(matches!(
            catalog.register(empty),
            Err(WorkflowError::InvalidDefinition(_))
        ));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_list_is_filtered_ordered_and_restartable() {
        let catalog = builtin();
        let filter = CatalogFilter::all()
            .category(WorkflowCategory::Advisor)
            .pattern(ExecutionPattern::EventDriven);

        let first: Vec<_> = catalog.list(&filter).map(|d| d.workflow_id.clone()).collect();
        assert_eq!(first, vec!["ADV007", "ADV009", "ADV013"]);

        let second: Vec<_> = catalog.list(&filter).map(|d| d.workflow_id.clone()).collect();
        assert_eq!(first, second);

        let simple = CatalogFilter::all().complexity(ComplexityTier::Simple);
        assert_eq!(catalog.list(&simple).count(), 2);
    }

    #[test]
    fn test_search_matches_name_description_and_triggers() {
        let catalog = builtin();

        let by_trigger: Vec<_> = catalog
            .search("vix spike")
            .iter()
            .map(|d| d.workflow_id.clone())
            .collect();
        assert_eq!(by_trigger, vec!["ADV007"]);

        assert!(catalog
            .search("TAX")
            .iter()
            .any(|d| d.workflow_id == "ADV010"));
        assert!(catalog.search("   ").is_empty());
    }

    #[test]
    fn test_export_round_trip() {
        let catalog = builtin();
        let json = catalog.export_json().unwrap();
        let restored = Catalog::from_json(&json).unwrap();

        assert_eq!(restored.len(), catalog.len());
        for (original, copy) in catalog.iter().zip(restored.iter()) {
            assert_eq!(original.workflow_id, copy.workflow_id);
            assert_eq!(original.pattern, copy.pattern);
            assert_eq!(original.steps, copy.steps);
        }
    }

    #[test]
    fn test_tampered_export_fails_integrity() {
        let catalog = builtin();
        let mut export = catalog.export().unwrap();
        export.workflows[0].steps.push("Wire funds offshore".to_string());

        let json = serde_json::to_string(&export).unwrap();
        let err = Catalog::from_json(&json).unwrap_err();
        assert!(matches!(err, WorkflowError::Integrity(_)));
    }
}
