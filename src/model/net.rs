//! Style network seam and the built-in CPU network.

use crate::error::PipelineError;
use crate::frame::ImageBuffer;
use crate::model::params::{ModelParameterSet, Tensor};

pub const IN_WEIGHT: &str = "conv_in.weight";
pub const IN_BIAS: &str = "conv_in.bias";
pub const OUT_WEIGHT: &str = "conv_out.weight";
pub const OUT_BIAS: &str = "conv_out.bias";
pub const RESIDUAL: &str = "residual.scale";

/// An image-to-image transform driven by a replaceable parameter set.
pub trait StyleNetwork {
    fn name(&self) -> &'static str;

    /// Replace every parameter of the network. On error the previous
    /// parameters stay active.
    fn load_parameters(&mut self, params: ModelParameterSet) -> Result<(), PipelineError>;

    /// Output has the same dimensions as the input.
    fn stylize(&mut self, frame: &ImageBuffer) -> ImageBuffer;
}

/// Per-pixel colour network: two 1x1 convolutions with a ReLU between them
/// and an optional residual mix of the input.
///
/// Expected tensors: `conv_in.weight [H,3]`, `conv_in.bias [H]`,
/// `conv_out.weight [3,H]`, `conv_out.bias [3]`, optionally
/// `residual.scale [1]`.
#[derive(Debug, Clone, Default)]
pub struct PointwiseNet {
    hidden: usize,
    w_in: Vec<f32>,
    b_in: Vec<f32>,
    w_out: Vec<f32>,
    b_out: [f32; 3],
    residual: f32,
    scratch: Vec<f32>,
}

impl PointwiseNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parameters(params: ModelParameterSet) -> Result<Self, PipelineError> {
        let mut net = Self::new();
        net.load_parameters(params)?;
        Ok(net)
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    pub fn is_loaded(&self) -> bool {
        self.hidden > 0
    }

    fn eval(&mut self, rgb: [f32; 3]) -> [f32; 3] {
        let h = self.hidden;
        for j in 0..h {
            let w = &self.w_in[j * 3..j * 3 + 3];
            let v = w[0] * rgb[0] + w[1] * rgb[1] + w[2] * rgb[2] + self.b_in[j];
            self.scratch[j] = v.max(0.0);
        }

        let mut out = [0.0f32; 3];
        for (c, o) in out.iter_mut().enumerate() {
            let w = &self.w_out[c * h..(c + 1) * h];
            let mut acc = self.b_out[c] + self.residual * rgb[c];
            for (wj, hj) in w.iter().zip(&self.scratch) {
                acc += wj * hj;
            }
            *o = acc;
        }
        out
    }
}

impl StyleNetwork for PointwiseNet {
    fn name(&self) -> &'static str {
        "pointwise"
    }

    fn load_parameters(&mut self, params: ModelParameterSet) -> Result<(), PipelineError> {
        let w_in = require(&params, IN_WEIGHT)?;
        if w_in.shape.len() != 2 || w_in.shape[1] != 3 || w_in.shape[0] == 0 {
            return Err(shape_error(IN_WEIGHT, w_in, "[H,3]"));
        }
        let hidden = w_in.shape[0];

        let b_in = require(&params, IN_BIAS)?;
        if b_in.shape != [hidden] {
            return Err(shape_error(IN_BIAS, b_in, "[H]"));
        }
        let w_out = require(&params, OUT_WEIGHT)?;
        if w_out.shape != [3, hidden] {
            return Err(shape_error(OUT_WEIGHT, w_out, "[3,H]"));
        }
        let b_out = require(&params, OUT_BIAS)?;
        if b_out.shape != [3] {
            return Err(shape_error(OUT_BIAS, b_out, "[3]"));
        }
        let residual = match params.get(RESIDUAL) {
            Some(t) if t.len() == 1 => t.data[0],
            Some(t) => return Err(shape_error(RESIDUAL, t, "[1]")),
            None => 0.0,
        };

        self.hidden = hidden;
        self.w_in = w_in.data.clone();
        self.b_in = b_in.data.clone();
        self.w_out = w_out.data.clone();
        self.b_out = [b_out.data[0], b_out.data[1], b_out.data[2]];
        self.residual = residual;
        self.scratch = vec![0.0; hidden];
        Ok(())
    }

    fn stylize(&mut self, frame: &ImageBuffer) -> ImageBuffer {
        if !self.is_loaded() {
            return frame.clone();
        }

        let mut out = frame.clone();
        for px in out.data.chunks_exact_mut(4) {
            let rgb = [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ];
            let y = self.eval(rgb);
            px[0] = to_u8(y[0]);
            px[1] = to_u8(y[1]);
            px[2] = to_u8(y[2]);
            px[3] = 255;
        }
        out
    }
}

/// Random but well-behaved parameters: a softened identity plus a random
/// colour twist. Used by the test-model generator and the test suites.
pub fn random_parameters(hidden: usize, rng: &mut fastrand::Rng) -> ModelParameterSet {
    let hidden = hidden.max(3);
    let mut w_in = Tensor::zeros(vec![hidden, 3]);
    let mut b_in = Tensor::zeros(vec![hidden]);
    let mut w_out = Tensor::zeros(vec![3, hidden]);
    let mut b_out = Tensor::zeros(vec![3]);

    for j in 0..hidden {
        for k in 0..3 {
            w_in.data[j * 3 + k] = rng.f32() * 2.0 - 1.0;
        }
        b_in.data[j] = rng.f32() * 0.4 - 0.2;
    }
    for c in 0..3 {
        for j in 0..hidden {
            w_out.data[c * hidden + j] = (rng.f32() * 2.0 - 1.0) * (1.5 / hidden as f32);
        }
        b_out.data[c] = rng.f32() * 0.3;
    }

    let mut params = ModelParameterSet::new();
    params.insert(IN_WEIGHT.to_string(), w_in);
    params.insert(IN_BIAS.to_string(), b_in);
    params.insert(OUT_WEIGHT.to_string(), w_out);
    params.insert(OUT_BIAS.to_string(), b_out);
    params.insert(
        RESIDUAL.to_string(),
        Tensor::new(vec![1], vec![0.3 + rng.f32() * 0.4]).unwrap_or_else(|| Tensor::zeros(vec![1])),
    );
    params
}

fn require<'a>(params: &'a ModelParameterSet, key: &str) -> Result<&'a Tensor, PipelineError> {
    params.get(key).ok_or_else(|| PipelineError::ModelLoad {
        path: "<active model>".to_string(),
        message: format!("missing tensor '{key}'"),
    })
}

fn shape_error(key: &str, t: &Tensor, expected: &str) -> PipelineError {
    PipelineError::ModelLoad {
        path: "<active model>".to_string(),
        message: format!("tensor '{key}' has shape {:?}, expected {expected}", t.shape),
    }
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}
