use crate::error::PipelineError;
use crate::model::blend::{blend_three, blend_two};
use crate::model::catalog::ModelCatalog;
use crate::model::params::{load_parameter_set, ModelParameterSet};
use crate::session::BlendState;
use std::sync::Arc;

/// Every catalog model's parameters, loaded once at startup.
pub struct ModelBank {
    sets: Vec<Arc<ModelParameterSet>>,
}

impl ModelBank {
    /// Load all catalog entries. Any missing or malformed file is fatal.
    pub fn load(catalog: &ModelCatalog) -> Result<Self, PipelineError> {
        let mut sets = Vec::with_capacity(catalog.len());
        for slot in catalog.slots() {
            let params = load_parameter_set(&slot.path)?;
            log::info!(
                "loaded model '{}' ({} tensors) from {}",
                slot.name,
                params.len(),
                slot.path.display()
            );
            sets.push(Arc::new(params));
        }
        Ok(Self { sets })
    }

    pub fn from_sets(sets: Vec<ModelParameterSet>) -> Self {
        Self {
            sets: sets.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&ModelParameterSet> {
        self.sets.get(slot).map(|s| s.as_ref())
    }

    /// Build the parameter set a blend state describes.
    pub fn compose(&self, blend: &BlendState) -> Result<ModelParameterSet, PipelineError> {
        match *blend {
            BlendState::Single(a) => Ok(self.slot(a)?.clone()),
            BlendState::Dual { a, b, alpha } => {
                Ok(blend_two(self.slot(a)?, self.slot(b)?, alpha))
            }
            BlendState::Triple { a, b, c, weights } => Ok(blend_three(
                self.slot(a)?,
                self.slot(b)?,
                self.slot(c)?,
                weights,
            )),
        }
    }

    fn slot(&self, slot: usize) -> Result<&ModelParameterSet, PipelineError> {
        self.get(slot).ok_or_else(|| {
            PipelineError::InvalidControlState(format!(
                "model slot {slot} out of range (0..{})",
                self.sets.len()
            ))
        })
    }
}
