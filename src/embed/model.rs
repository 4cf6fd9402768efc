//! CLIP visual encoder under ONNX Runtime.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use image::DynamicImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use super::Embedder;
use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};

const INPUT_SIZE: u32 = 224;

pub struct ClipEmbedder {
    config: ModelConfig,
    session: OnceLock<Mutex<Session>>,
    /// Serializes session construction so concurrent callers share one load.
    load_lock: Mutex<()>,
}

impl ClipEmbedder {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            session: OnceLock::new(),
            load_lock: Mutex::new(()),
        }
    }

    /// Resolve the model file on disk, downloading it on first use.
    fn ensure_model_file(&self) -> Result<PathBuf> {
        let models_dir = self.config.models_dir()?;
        std::fs::create_dir_all(&models_dir)
            .map_err(|e| PipelineError::ModelLoad(e.to_string()))?;
        let model_path = models_dir.join(&self.config.file_name);

        if !model_path.exists() {
            tracing::info!(model = %self.config.file_name, "downloading embedding model");
            let response = ureq::get(&self.config.download_url)
                .call()
                .map_err(|e| PipelineError::ModelLoad(format!("model download failed: {e}")))?;

            let mut file = std::fs::File::create(&model_path)
                .map_err(|e| PipelineError::ModelLoad(e.to_string()))?;
            std::io::copy(&mut response.into_reader(), &mut file)
                .map_err(|e| PipelineError::ModelLoad(e.to_string()))?;
            tracing::info!(model = %self.config.file_name, path = ?model_path, "embedding model downloaded");
        }

        Ok(model_path)
    }

    fn build_session(&self) -> Result<Session> {
        let model_path = self.ensure_model_file()?;
        Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(4))
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(|e| PipelineError::ModelLoad(e.to_string()))
    }

    fn run_encoder(&self, img: &DynamicImage) -> Result<Vec<f32>> {
        let mut session = self
            .session
            .get()
            .ok_or_else(|| PipelineError::ModelLoad("model not initialized".to_string()))?
            .lock()
            .map_err(|e| PipelineError::ModelLoad(format!("failed to lock model: {e}")))?;

        let input_tensor = image_to_tensor(img)
            .map_err(|e| PipelineError::Embedding(e))?;

        let outputs = session
            .run(ort::inputs!["pixel_values" => input_tensor])
            .map_err(|e| PipelineError::Embedding(format!("inference failed: {e}")))?;

        let embedding_output = outputs
            .iter()
            .next()
            .ok_or_else(|| PipelineError::Embedding("no embedding output".to_string()))?;

        let (_shape, embedding_data) = embedding_output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Embedding(e.to_string()))?;

        Ok(l2_normalize(embedding_data.to_vec()))
    }
}

impl Embedder for ClipEmbedder {
    fn ensure_loaded(&self) -> Result<()> {
        if self.session.get().is_some() {
            return Ok(());
        }
        let _guard = self
            .load_lock
            .lock()
            .map_err(|e| PipelineError::ModelLoad(format!("failed to lock loader: {e}")))?;
        // A concurrent caller may have finished the load while we waited
        if self.session.get().is_some() {
            return Ok(());
        }
        let session = self.build_session()?;
        let _ = self.session.set(Mutex::new(session));
        Ok(())
    }

    fn embed(&self, uri: &str) -> Result<Vec<f32>> {
        self.ensure_loaded()?;
        let img = load_image(Path::new(uri))?;
        self.run_encoder(&img)
    }

    fn model_version(&self) -> &str {
        &self.config.version
    }
}

fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path)
        .map_err(|e| PipelineError::Embedding(format!("failed to decode {}: {e}", path.display())))
}

/// Resize to the CLIP input size, apply CLIP normalization, and pack as an
/// NCHW tensor.
fn image_to_tensor(img: &DynamicImage) -> std::result::Result<Tensor<f32>, String> {
    let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    // CLIP normalization constants (ImageNet stats)
    let mean = [0.48145466, 0.4578275, 0.40821073];
    let std = [0.26862954, 0.26130258, 0.27577711];

    let size = INPUT_SIZE as usize;
    let mut input_data = vec![0.0f32; 3 * size * size];

    for y in 0..size {
        for x in 0..size {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            let idx = y * size + x;
            input_data[idx] = ((pixel[0] as f32 / 255.0) - mean[0]) / std[0];
            input_data[size * size + idx] = ((pixel[1] as f32 / 255.0) - mean[1]) / std[1];
            input_data[2 * size * size + idx] = ((pixel[2] as f32 / 255.0) - mean[2]) / std[2];
        }
    }

    Tensor::from_array(([1usize, 3, size, size], input_data.into_boxed_slice()))
        .map_err(|e| e.to_string())
}

fn l2_normalize(embedding: Vec<f32>) -> Vec<f32> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        embedding.iter().map(|x| x / norm).collect()
    } else {
        embedding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        // Zero vector passes through unchanged
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_image_to_tensor_accepts_any_input_size() {
        let img = DynamicImage::new_rgb8(64, 48);
        assert!(image_to_tensor(&img).is_ok());
    }
}
