use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Dense `f32` tensor stored flat in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Option<Self> {
        let t = Self { shape, data };
        t.is_consistent().then_some(t)
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let n = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_consistent(&self) -> bool {
        self.shape.iter().product::<usize>() == self.data.len()
    }

    pub fn same_shape(&self, other: &Tensor) -> bool {
        self.shape == other.shape
    }

    pub fn scaled(&self, k: f32) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|v| v * k).collect(),
        }
    }

    /// `self + t * (other - self)`, written so that lerping a tensor with
    /// itself returns it bit-for-bit.
    pub fn lerp(&self, other: &Tensor, t: f32) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + t * (b - a))
                .collect(),
        }
    }

    /// `self += k * other`; caller guarantees matching shapes.
    pub fn add_scaled(&mut self, other: &Tensor, k: f32) {
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            *dst += k * src;
        }
    }
}

/// Named parameter tensors of one style network.
pub type ModelParameterSet = BTreeMap<String, Tensor>;

const LEGACY_NORM_KEYS: [&str; 2] = ["running_mean", "running_var"];

/// Load a parameter set from a JSON object of `name -> {shape, data}`.
///
/// Legacy instance-norm running statistics are dropped so older checkpoints
/// line up with newer ones.
pub fn load_parameter_set(path: impl AsRef<Path>) -> Result<ModelParameterSet, PipelineError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::model_load(path, e.to_string()))?;
    parse_parameter_set(&text).map_err(|msg| PipelineError::model_load(path, msg))
}

pub fn parse_parameter_set(text: &str) -> Result<ModelParameterSet, String> {
    let raw: BTreeMap<String, Tensor> =
        serde_json::from_str(text).map_err(|e| format!("malformed parameter file: {e}"))?;

    let mut out = ModelParameterSet::new();
    for (name, tensor) in raw {
        if LEGACY_NORM_KEYS.iter().any(|k| name.contains(k)) {
            continue;
        }
        if !tensor.is_consistent() {
            return Err(format!(
                "tensor '{name}' has shape {:?} but {} values",
                tensor.shape,
                tensor.data.len()
            ));
        }
        if tensor.data.iter().any(|v| !v.is_finite()) {
            return Err(format!("tensor '{name}' contains non-finite values"));
        }
        out.insert(name, tensor);
    }

    if out.is_empty() {
        return Err("parameter file holds no tensors".to_string());
    }
    Ok(out)
}

pub fn save_parameter_set(
    params: &ModelParameterSet,
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let body = serde_json::to_string(params)?;
    std::fs::write(path, body)?;
    Ok(())
}
