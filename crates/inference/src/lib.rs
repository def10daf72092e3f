pub mod backend;
pub mod error;
pub mod model;
pub mod onnx;

pub use backend::{Backend, BackendConfig, DeviceKind, OptimizationLevel};
pub use error::InferError;
pub use model::{InputSize, Model, Network, WarmedModel, resolve_model_uri};
pub use onnx::OnnxNetwork;

// downstream crates build tensors for `Network::forward` with the same candle
pub use candle_core;
