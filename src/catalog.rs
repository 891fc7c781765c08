//! Read-only game content, loaded once from the content tables

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, error};

use crate::costs::{ConstructionCost, FixedCost, ProductionRule, StorageRule};
use crate::db::{QueryDesc, Store};
use crate::error::StoreError;
use crate::models::ElementKind;
use crate::tech_tree::DependencyGraph;

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInfo {
    pub id: String,
    pub name: String,
    pub base_amount: f64,
    pub base_production: f64,
    pub base_storage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementInfo {
    pub id: String,
    pub name: String,
    pub kind: ElementKind,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    resources: Vec<ResourceInfo>,
    elements: HashMap<String, ElementInfo>,
    progress_costs: HashMap<String, ConstructionCost>,
    fixed_costs: HashMap<String, FixedCost>,
    tech_tree: DependencyGraph,
    production: HashMap<String, Vec<ProductionRule>>,
    storage: HashMap<String, Vec<StorageRule>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(store: &dyn Store) -> Result<Self, StoreError> {
        let mut catalog = Catalog::new();

        for row in store.fetch_from_db(&QueryDesc::new(
            "resources",
            &["id", "name", "base_amount", "base_production", "base_storage"],
        ))? {
            catalog.insert_resource(ResourceInfo {
                id: row.str("id")?,
                name: row.str("name")?,
                base_amount: row.f64("base_amount")?,
                base_production: row.f64("base_production")?,
                base_storage: row.f64("base_storage")?,
            });
        }

        for row in store.fetch_from_db(&QueryDesc::new("elements", &["id", "name", "kind"]))? {
            let kind = row.str("kind")?;
            let Some(kind) = ElementKind::parse(&kind) else {
                error!(element = %row.str("id")?, %kind, "catalog.unknown_kind");
                continue;
            };
            catalog.insert_element(ElementInfo {
                id: row.str("id")?,
                name: row.str("name")?,
                kind,
            });
        }

        let mut base_costs: HashMap<String, BTreeMap<String, i64>> = HashMap::new();
        for row in store.fetch_from_db(&QueryDesc::new("element_costs", &["element", "res", "cost"]))? {
            base_costs
                .entry(row.str("element")?)
                .or_default()
                .insert(row.str("res")?, row.i64("cost")?);
        }

        let mut progressions = HashMap::new();
        for row in store.fetch_from_db(&QueryDesc::new("progress_costs", &["element", "progression"]))? {
            progressions.insert(row.str("element")?, row.f64("progression")?);
        }

        let kinds: Vec<(String, ElementKind)> = catalog
            .elements
            .values()
            .map(|e| (e.id.clone(), e.kind))
            .collect();
        for (id, kind) in kinds {
            let base = base_costs.remove(&id);
            match (kind.is_leveled(), progressions.get(&id), base) {
                (true, Some(&progression), base) => {
                    catalog.set_progress_cost(&id, ConstructionCost::new(base.unwrap_or_default(), progression));
                }
                (false, _, Some(base)) => catalog.set_fixed_cost(&id, FixedCost::new(base)),
                _ => debug!(element = %id, %kind, "catalog.no_cost"),
            }
        }

        for row in store.fetch_from_db(&QueryDesc::new(
            "tech_dependencies",
            &["element", "requirement", "level"],
        ))? {
            catalog.add_dependency(&row.str("element")?, &row.str("requirement")?, row.i64("level")?);
        }

        for row in store.fetch_from_db(&QueryDesc::new(
            "production_rules",
            &["element", "res", "base", "progression", "temperature_coeff", "temperature_offset"],
        ))? {
            catalog.add_production_rule(
                &row.str("element")?,
                ProductionRule {
                    resource: row.str("res")?,
                    base: row.f64("base")?,
                    progression: row.f64("progression")?,
                    temperature_coeff: row.f64("temperature_coeff")?,
                    temperature_offset: row.f64("temperature_offset")?,
                },
            );
        }

        for row in store.fetch_from_db(&QueryDesc::new(
            "storage_rules",
            &["element", "res", "base", "progression"],
        ))? {
            catalog.add_storage_rule(
                &row.str("element")?,
                StorageRule {
                    resource: row.str("res")?,
                    base: row.f64("base")?,
                    progression: row.f64("progression")?,
                },
            );
        }

        debug!(
            resources = catalog.resources.len(),
            elements = catalog.elements.len(),
            "catalog.loaded"
        );
        Ok(catalog)
    }

    /// Like [`Catalog::load`], but an unreadable catalog is logged and
    /// replaced by an empty one.
    pub fn load_or_empty(store: &dyn Store) -> Self {
        Self::load(store).unwrap_or_else(|err| {
            error!(%err, "catalog.load_failed");
            Catalog::new()
        })
    }

    pub fn insert_resource(&mut self, resource: ResourceInfo) {
        self.resources.retain(|r| r.id != resource.id);
        self.resources.push(resource);
    }

    /// Elements are registered in the tech tree with no prerequisite.
    pub fn insert_element(&mut self, element: ElementInfo) {
        self.tech_tree.register(&element.id);
        self.elements.insert(element.id.clone(), element);
    }

    pub fn set_progress_cost(&mut self, element: &str, cost: ConstructionCost) {
        self.progress_costs.insert(element.to_string(), cost);
    }

    pub fn set_fixed_cost(&mut self, element: &str, cost: FixedCost) {
        self.fixed_costs.insert(element.to_string(), cost);
    }

    pub fn add_dependency(&mut self, element: &str, requirement: &str, level: i64) {
        self.tech_tree.add_dependency(element, requirement, level);
    }

    pub fn add_production_rule(&mut self, element: &str, rule: ProductionRule) {
        self.production.entry(element.to_string()).or_default().push(rule);
    }

    pub fn add_storage_rule(&mut self, element: &str, rule: StorageRule) {
        self.storage.entry(element.to_string()).or_default().push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.resources.is_empty()
    }

    pub fn resources(&self) -> &[ResourceInfo] {
        &self.resources
    }

    pub fn resource_by_name(&self, name: &str) -> Option<&ResourceInfo> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn element(&self, id: &str) -> Option<&ElementInfo> {
        self.elements.get(id)
    }

    pub fn element_by_name(&self, name: &str) -> Option<&ElementInfo> {
        self.elements.values().find(|e| e.name == name)
    }

    pub fn elements_of(&self, kind: ElementKind) -> impl Iterator<Item = &ElementInfo> {
        self.elements.values().filter(move |e| e.kind == kind)
    }

    pub fn progress_cost(&self, element: &str) -> Option<&ConstructionCost> {
        self.progress_costs.get(element)
    }

    pub fn fixed_cost(&self, element: &str) -> Option<&FixedCost> {
        self.fixed_costs.get(element)
    }

    pub fn tech_tree(&self) -> &DependencyGraph {
        &self.tech_tree
    }

    pub fn production_rules(&self, element: &str) -> &[ProductionRule] {
        self.production.get(element).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn storage_rules(&self, element: &str) -> &[StorageRule] {
        self.storage.get(element).map(Vec::as_slice).unwrap_or_default()
    }
}
