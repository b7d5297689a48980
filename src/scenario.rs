//! Scenario registry, weighted combination and export.
//!
//! A scenario is a named parameter set with string metadata. The store
//! keeps scenarios in insertion order with last-write-wins overwrite
//! semantics (re-adding a name replaces the entry but keeps its original
//! position), plus a registry of named ensembles produced by sampling.
//!
//! There is no import counterpart to [`ScenarioStore::export`]; the
//! asymmetry is inherited from the system this replaces.

use std::collections::{BTreeMap, HashMap};

use jiff::Timestamp;
use serde::Serialize;
use tracing::info;

use crate::error::{AnalysisError, Result};
use crate::model::Parameters;

/// Version tag stamped into default scenario metadata.
pub const SCENARIO_FORMAT_VERSION: &str = "1.0";

/// Free-form scenario metadata (string keys and values).
pub type Metadata = BTreeMap<String, String>;

/// A named parameter set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub name: String,
    pub parameters: Parameters,
    pub metadata: Metadata,
}

/// Default metadata: creation timestamp and format version.
fn default_metadata() -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("created_at".to_string(), Timestamp::now().to_string());
    meta.insert("version".to_string(), SCENARIO_FORMAT_VERSION.to_string());
    meta
}

/// In-memory registry of named scenarios and ensembles.
#[derive(Debug, Clone, Default)]
pub struct ScenarioStore {
    entries: HashMap<String, Scenario>,
    order: Vec<String>,
    ensembles: BTreeMap<String, Vec<String>>,
}

impl ScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite a scenario.
    ///
    /// Omitted metadata defaults to a creation timestamp and the format
    /// version tag. Overwriting keeps the name's original position in
    /// [`list`](Self::list).
    pub fn add(&mut self, name: &str, parameters: Parameters, metadata: Option<Metadata>) {
        let scenario = Scenario {
            name: name.to_string(),
            parameters,
            metadata: metadata.unwrap_or_else(default_metadata),
        };
        if self.entries.insert(name.to_string(), scenario).is_none() {
            self.order.push(name.to_string());
        }
    }

    /// Look up a scenario by name.
    pub fn get(&self, name: &str) -> Result<&Scenario> {
        self.entries
            .get(name)
            .ok_or_else(|| AnalysisError::not_found(name))
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in insertion order.
    pub fn list(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|n| n.as_str())
    }

    /// Number of registered scenarios.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an ensemble's ordered member names.
    pub fn register_ensemble(&mut self, name: &str, members: Vec<String>) {
        info!(ensemble = name, members = members.len(), "ensemble registered");
        self.ensembles.insert(name.to_string(), members);
    }

    /// Members of a named ensemble, in sampling order.
    pub fn ensemble(&self, name: &str) -> Result<&[String]> {
        self.ensembles
            .get(name)
            .map(|m| m.as_slice())
            .ok_or_else(|| AnalysisError::not_found(name))
    }

    /// Export all scenarios, metadata and ensembles as one document.
    pub fn export(&self) -> ScenarioDocument {
        let mut scenarios = BTreeMap::new();
        let mut metadata = BTreeMap::new();
        for scenario in self.entries.values() {
            scenarios.insert(scenario.name.clone(), scenario.parameters.clone());
            metadata.insert(scenario.name.clone(), scenario.metadata.clone());
        }
        ScenarioDocument {
            scenarios,
            metadata,
            ensembles: self.ensembles.clone(),
        }
    }
}

/// JSON-equivalent export document.
///
/// Timestamps appear as strings inside the per-scenario metadata maps.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioDocument {
    /// Scenario name -> parameter mapping.
    pub scenarios: BTreeMap<String, Parameters>,
    /// Scenario name -> metadata mapping.
    pub metadata: BTreeMap<String, Metadata>,
    /// Ensemble name -> ordered member names.
    pub ensembles: BTreeMap<String, Vec<String>>,
}

/// Register a new scenario as the weighted average of existing ones.
///
/// The parameter set is taken from the first listed scenario; every later
/// scenario must carry each of those parameters. Default weights are
/// uniform. Weights are applied literally and never renormalized, so
/// weights that do not sum to 1 scale the result accordingly.
///
/// Returns the new scenario's name (auto-generated from the component
/// names when `output` is `None`).
pub fn combine_scenarios(
    store: &mut ScenarioStore,
    names: &[&str],
    weights: Option<&[f64]>,
    output: Option<&str>,
) -> Result<String> {
    if names.is_empty() {
        return Err(AnalysisError::invalid_parameter(
            "at least one scenario is required",
        ));
    }
    let uniform = vec![1.0 / names.len() as f64; names.len()];
    let weights = match weights {
        Some(w) if w.len() != names.len() => {
            return Err(AnalysisError::invalid_parameter(format!(
                "{} weights for {} scenarios",
                w.len(),
                names.len()
            )))
        }
        Some(w) => w,
        None => &uniform,
    };

    let first = store.get(names[0])?;
    let keys: Vec<String> = first.parameters.keys().cloned().collect();

    let mut combined = Parameters::new();
    for key in &keys {
        let mut value = 0.0;
        for (&name, &weight) in names.iter().zip(weights.iter()) {
            let scenario = store.get(name)?;
            let param = scenario.parameters.get(key).ok_or_else(|| {
                AnalysisError::not_found(format!("parameter '{}' in scenario '{}'", key, name))
            })?;
            value += weight * param;
        }
        combined.insert(key.clone(), value);
    }

    let output = match output {
        Some(name) => name.to_string(),
        None => format!("combined_{}", names.join("_")),
    };
    let mut metadata = default_metadata();
    metadata.insert("combined_from".to_string(), names.join(","));

    info!(scenario = %output, sources = names.len(), "combined scenario registered");
    store.add(&output, combined, Some(metadata));
    Ok(output)
}
