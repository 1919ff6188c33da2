//! Ordered step registry.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Result, WorkflowError};
use crate::step::Step;

/// A registered step.
#[derive(Clone)]
pub struct StepDefinition {
    name: &'static str,
    step: Arc<dyn Step>,
}

impl StepDefinition {
    pub fn new(step: impl Step + 'static) -> Self {
        Self {
            name: step.name(),
            step: Arc::new(step),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn step(&self) -> &dyn Step {
        self.step.as_ref()
    }
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("best_effort", &self.step.is_best_effort())
            .field("compensates", &self.step.compensates())
            .finish()
    }
}

/// The steps of one workflow type, in execution order.
///
/// A registry is never empty and step names are unique.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    workflow_type: &'static str,
    steps: Vec<StepDefinition>,
}

impl StepRegistry {
    pub fn new(workflow_type: &'static str, steps: Vec<StepDefinition>) -> Result<Self> {
        if steps.is_empty() {
            return Err(WorkflowError::InvalidRegistry(format!(
                "workflow '{workflow_type}' has no steps"
            )));
        }

        let mut seen = HashSet::new();
        for definition in &steps {
            if !seen.insert(definition.name()) {
                return Err(WorkflowError::InvalidRegistry(format!(
                    "step '{}' registered twice in '{workflow_type}'",
                    definition.name()
                )));
            }
        }

        Ok(Self {
            workflow_type,
            steps,
        })
    }

    /// Starts a registry for `workflow_type`.
    pub fn builder(workflow_type: &'static str) -> StepRegistryBuilder {
        StepRegistryBuilder {
            workflow_type,
            steps: Vec::new(),
        }
    }

    pub fn workflow_type(&self) -> &'static str {
        self.workflow_type
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    /// Position of the step named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|d| d.name() == name)
    }

    pub fn first_step(&self) -> &'static str {
        self.steps.first().map_or("", StepDefinition::name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(StepDefinition::name).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builder for [`StepRegistry`].
pub struct StepRegistryBuilder {
    workflow_type: &'static str,
    steps: Vec<StepDefinition>,
}

impl StepRegistryBuilder {
    /// Appends a step.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(StepDefinition::new(step));
        self
    }

    pub fn build(self) -> Result<StepRegistry> {
        StepRegistry::new(self.workflow_type, self.steps)
    }
}
