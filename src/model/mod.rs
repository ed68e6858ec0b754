pub mod bank;
pub mod blend;
pub mod catalog;
pub mod net;
pub mod params;

pub use bank::ModelBank;
pub use blend::{blend_three, blend_two, normalize_weights};
pub use catalog::{CatalogError, ModelCatalog, ModelSlot};
pub use net::{PointwiseNet, StyleNetwork};
pub use params::{load_parameter_set, ModelParameterSet, Tensor};
