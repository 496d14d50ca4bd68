//! Embedding engine: sentence-transformers BERT models via Candle
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::embedding::EmbeddingModel;
use crate::errors::{BotError, Result};

const SERVICE: &str = "embedding";

/// Embedding engine using a BERT-family sentence model via Candle
pub struct EmbeddingEngine {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
    normalize: bool,
}

impl EmbeddingEngine {
    /// Create new embedding engine (downloads model on first use)
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().map_err(|e| BotError::upstream(SERVICE, e))?;
        let repo = api.repo(Repo::new(config.model_id.clone(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| BotError::upstream(SERVICE, format!("config download: {}", e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| BotError::upstream(SERVICE, format!("tokenizer download: {}", e)))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| BotError::upstream(SERVICE, format!("weights download: {}", e)))?;

        let config_contents = std::fs::read_to_string(config_path)?;
        let bert_config: BertConfig = serde_json::from_str(&config_contents)?;
        let dimension = serde_json::from_str::<serde_json::Value>(&config_contents)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| BotError::upstream(SERVICE, "config.json has no hidden_size"))?
            as usize;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| BotError::upstream(SERVICE, format!("tokenizer load: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_input_length,
                ..Default::default()
            }))
            .map_err(|e| BotError::upstream(SERVICE, format!("truncation: {}", e)))?;

        // SAFETY: the weights file is owned by the hf-hub cache and not mutated while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| BotError::upstream(SERVICE, e))?
        };

        let model = BertModel::load(vb, &bert_config).map_err(|e| BotError::upstream(SERVICE, e))?;

        debug!(model_id = %config.model_id, dimension, "embedding model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
            normalize: config.normalize,
        })
    }

    /// Generate embeddings for multiple texts
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| BotError::upstream(SERVICE, format!("tokenization: {}", e)))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = texts.len();

        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let row = i * max_len;
            flat_ids[row..row + ids.len()].copy_from_slice(ids);
            flat_mask[row..row + mask.len()].copy_from_slice(mask);
        }

        let pooled = self
            .forward(flat_ids, flat_mask, batch_size, max_len)
            .map_err(|e| BotError::upstream(SERVICE, e))?;

        pooled
            .to_vec2::<f32>()
            .map_err(|e| BotError::upstream(SERVICE, e))
    }

    fn forward(
        &self,
        flat_ids: Vec<u32>,
        flat_mask: Vec<u32>,
        batch_size: usize,
        max_len: usize,
    ) -> candle_core::Result<Tensor> {
        let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)?;
        let token_type_ids = token_ids.zeros_like()?;

        let embeddings = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;

        let pooled = Self::mean_pool(&embeddings, &attention_mask)?;

        if self.normalize {
            Self::l2_normalize(&pooled)
        } else {
            Ok(pooled)
        }
    }

    /// Mean pooling with attention mask
    fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        let mask_expanded = attention_mask
            .unsqueeze(2)?
            .expand(embeddings.shape())?
            .to_dtype(embeddings.dtype())?;

        let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;
        let sum_mask = mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;

        sum_embeddings.broadcast_div(&sum_mask)
    }

    fn l2_normalize(pooled: &Tensor) -> candle_core::Result<Tensor> {
        let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12, f64::MAX)?;
        pooled.broadcast_div(&norm)
    }
}

impl EmbeddingModel for EmbeddingEngine {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| BotError::upstream(SERVICE, "model returned no embedding"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
