pub mod error;
pub mod inference;
pub mod model;
pub mod network;
pub mod pretrained;

pub use error::InferError;
pub use inference::Inference;
pub use model::{Config, ContextStage, DetailStage, PyramidPooling, Srm};
pub use network::SrmNetwork;
pub use pretrained::{copy_matching, CopyReport, PretrainedSource};
