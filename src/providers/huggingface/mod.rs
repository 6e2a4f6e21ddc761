pub mod huggingface;

pub use huggingface::HuggingFaceModel;
