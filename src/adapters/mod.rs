// Adapters layer: concrete implementations of the domain ports (models, network, ffmpeg).

pub mod ffmpeg;
pub mod fetcher;
pub mod forest;
pub mod onnx;
pub mod registry;

pub use fetcher::{MediaDownloader, ReqwestPageFetcher};
pub use forest::ForestClassifier;
pub use registry::{LoadOutcome, ModelRegistry};
