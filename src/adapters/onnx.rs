//! ONNX Runtime backend for the audio classifier (`onnx` feature).

use crate::domain::ports::AudioClassifier;
use crate::utils::error::{GuardError, Result};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "onnx")]
mod backend {
    use super::*;
    use ort::{
        session::{
            builder::{GraphOptimizationLevel, SessionBuilder},
            Session,
        },
        value::{Tensor, Value},
    };
    use std::sync::Mutex;
    use tracing::debug;

    fn ort_error(e: ort::Error) -> GuardError {
        GuardError::inference(e.to_string())
    }

    pub struct OnnxAudioClassifier {
        session: Mutex<Session>,
        input_name: String,
        labels: Vec<String>,
    }

    impl OnnxAudioClassifier {
        pub fn load(model_path: &Path, labels: Vec<String>) -> Result<Self> {
            let session = SessionBuilder::new()
                .map_err(ort_error)?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(ort_error)?
                .commit_from_file(model_path)
                .map_err(ort_error)?;

            let input_name = session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .ok_or_else(|| GuardError::inference("model declares no inputs"))?;
            debug!("ONNX audio model input: {}", input_name);

            Ok(Self {
                session: Mutex::new(session),
                input_name,
                labels,
            })
        }
    }

    impl AudioClassifier for OnnxAudioClassifier {
        fn labels(&self) -> &[String] {
            &self.labels
        }

        fn logits(&self, input: &[f32]) -> Result<Vec<f32>> {
            let value: Value = Tensor::from_array((vec![1, input.len()], input.to_vec()))
                .map_err(ort_error)?
                .into_dyn();

            // session.run 需要獨占存取
            let mut session = self
                .session
                .lock()
                .map_err(|_| GuardError::inference("ONNX session lock poisoned"))?;
            let outputs = session
                .run(vec![(self.input_name.clone(), value)])
                .map_err(ort_error)?;

            let (_, logits) = outputs
                .into_iter()
                .next()
                .ok_or_else(|| GuardError::inference("model returned no outputs"))?;
            let (_shape, data) = logits.try_extract_tensor::<f32>().map_err(ort_error)?;
            Ok(data.to_vec())
        }
    }
}

#[cfg(feature = "onnx")]
pub use backend::OnnxAudioClassifier;

#[cfg(feature = "onnx")]
pub fn load_audio_classifier(model_path: &Path, labels: Vec<String>) -> Result<Arc<dyn AudioClassifier>> {
    Ok(Arc::new(OnnxAudioClassifier::load(model_path, labels)?))
}

#[cfg(not(feature = "onnx"))]
pub fn load_audio_classifier(model_path: &Path, _labels: Vec<String>) -> Result<Arc<dyn AudioClassifier>> {
    Err(GuardError::ModelUnavailableError {
        model: format!("deepfake detector ({})", model_path.display()),
        reason: "this build does not include the ONNX runtime (enable the `onnx` feature)"
            .to_string(),
    })
}
