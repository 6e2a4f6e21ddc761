pub mod demo;
pub mod huggingface;
pub mod traits;

pub use demo::DemoLabelModel;
pub use huggingface::HuggingFaceModel;
pub use traits::{LabelModel, LabelScore, ModelInput};
