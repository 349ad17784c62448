//! Saga definitions: named, validated step graphs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, SagaError};
use crate::step::StepAction;

/// One step of a saga definition.
#[derive(Clone)]
pub struct StepDefinition {
    id: String,
    action: Arc<dyn StepAction>,
    depends_on: Vec<String>,
    reads: Vec<String>,
    writes: Option<String>,
    timeout: Option<Duration>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, action: impl StepAction) -> Self {
        Self {
            id: id.into(),
            action: Arc::new(action),
            depends_on: Vec::new(),
            reads: Vec::new(),
            writes: None,
            timeout: None,
        }
    }

    /// Waits for `step` to complete before running.
    pub fn depends_on(mut self, step: impl Into<String>) -> Self {
        self.depends_on.push(step.into());
        self
    }

    /// Declares a context key the step reads.
    pub fn reads(mut self, key: impl Into<String>) -> Self {
        self.reads.push(key.into());
        self
    }

    /// Declares the context key the step's result is written under.
    pub fn writes(mut self, key: impl Into<String>) -> Self {
        self.writes = Some(key.into());
        self
    }

    /// Overrides the engine's step timeout for this step.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action(&self) -> &dyn StepAction {
        self.action.as_ref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    pub fn read_keys(&self) -> &[String] {
        &self.reads
    }

    pub fn output_key(&self) -> Option<&str> {
        self.writes.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("depends_on", &self.depends_on)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A named step graph interpreted by the orchestrator.
///
/// Steps are kept in declaration order. A step may only depend on steps
/// declared before it, so the graph is acyclic by construction.
#[derive(Debug, Clone)]
pub struct SagaDefinition {
    name: String,
    steps: Vec<StepDefinition>,
}

impl SagaDefinition {
    pub fn builder(name: impl Into<String>) -> SagaDefinitionBuilder {
        SagaDefinitionBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the declaration index of each step's dependencies.
    pub(crate) fn dependency_indices(&self) -> Vec<Vec<usize>> {
        let index: HashMap<&str, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();
        self.steps
            .iter()
            .map(|s| {
                s.depends_on
                    .iter()
                    .filter_map(|d| index.get(d.as_str()).copied())
                    .collect()
            })
            .collect()
    }
}

/// Builds and validates a [`SagaDefinition`].
#[derive(Debug)]
pub struct SagaDefinitionBuilder {
    name: String,
    steps: Vec<StepDefinition>,
}

impl SagaDefinitionBuilder {
    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Validates the graph.
    ///
    /// Rejects duplicate step IDs, dependencies on unknown or later steps,
    /// keys written by more than one step, and reads of a key by a step
    /// that is not transitively ordered after the key's writer. Keys with
    /// no writer in the definition must be seeded into the context before
    /// the run.
    pub fn build(self) -> Result<SagaDefinition> {
        let mut declared: HashMap<&str, usize> = HashMap::new();
        let all: HashSet<&str> = self.steps.iter().map(|s| s.id.as_str()).collect();
        let mut writers: HashMap<&str, &str> = HashMap::new();
        let mut ancestors: Vec<HashSet<&str>> = Vec::with_capacity(self.steps.len());

        for (i, step) in self.steps.iter().enumerate() {
            if declared.insert(step.id.as_str(), i).is_some() {
                return Err(SagaError::DuplicateStep(step.id.clone()));
            }

            let mut upstream = HashSet::new();
            for dep in &step.depends_on {
                let Some(&j) = declared.get(dep.as_str()).filter(|&&j| j != i) else {
                    return Err(if all.contains(dep.as_str()) {
                        SagaError::DependencyDeclaredLater {
                            step: step.id.clone(),
                            depends_on: dep.clone(),
                        }
                    } else {
                        SagaError::UnknownDependency {
                            step: step.id.clone(),
                            depends_on: dep.clone(),
                        }
                    });
                };
                upstream.insert(self.steps[j].id.as_str());
                upstream.extend(ancestors[j].iter().copied());
            }
            ancestors.push(upstream);

            if let Some(key) = step.writes.as_deref() {
                if let Some(first) = writers.insert(key, step.id.as_str()) {
                    return Err(SagaError::MultipleWriters {
                        key: key.to_string(),
                        first: first.to_string(),
                        second: step.id.clone(),
                    });
                }
            }
        }

        for (i, step) in self.steps.iter().enumerate() {
            for key in &step.reads {
                let Some(&writer) = writers.get(key.as_str()) else {
                    continue;
                };
                if !ancestors[i].contains(writer) {
                    return Err(SagaError::UnorderedRead {
                        step: step.id.clone(),
                        key: key.clone(),
                        writer: writer.to_string(),
                    });
                }
            }
        }

        Ok(SagaDefinition {
            name: self.name,
            steps: self.steps,
        })
    }
}
