//! Request types of the audio feature service.

use serde::{Deserialize, Serialize};

/// One feature vector per audio file, as returned by the worker.
pub type FeatureVector = Vec<f64>;

/// Object store credentials forwarded to the worker.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreParams {
    pub base_url: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
}

impl std::fmt::Debug for StoreParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreParams")
            .field("base_url", &self.base_url)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Mfcc,
    Spectrogram,
    #[default]
    Both,
}

/// Projection settings, passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingParams {
    pub method: String,
    #[serde(default)]
    pub perplexity: Option<u32>,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: String,
    #[serde(default = "default_init")]
    pub init: String,
    #[serde(default = "default_early_exaggeration")]
    pub early_exaggeration: f64,
    #[serde(default)]
    pub n_neighbors: Option<u32>,
    #[serde(default = "default_min_dist")]
    pub min_dist: f64,
    #[serde(default = "default_metric")]
    pub metric: String,
}

fn default_learning_rate() -> String {
    "auto".to_string()
}
fn default_init() -> String {
    "pca".to_string()
}
fn default_early_exaggeration() -> f64 {
    1.3
}
fn default_min_dist() -> f64 {
    0.2
}
fn default_metric() -> String {
    "euclidean".to_string()
}

impl EmbeddingParams {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            perplexity: None,
            learning_rate: default_learning_rate(),
            init: default_init(),
            early_exaggeration: default_early_exaggeration(),
            n_neighbors: None,
            min_dist: default_min_dist(),
            metric: default_metric(),
        }
    }

    pub fn with_n_neighbors(mut self, n: u32) -> Self {
        self.n_neighbors = Some(n);
        self
    }

    pub fn with_perplexity(mut self, p: u32) -> Self {
        self.perplexity = Some(p);
        self
    }
}

/// Shared parameters of one feature-extraction request.
///
/// Serialized as-is into every batch call, with the batch's `object_keys` added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessParams {
    pub s3_params: StoreParams,
    #[serde(default)]
    pub feature_type: FeatureType,
    #[serde(default = "default_fixed_length")]
    pub fixed_length: u32,
    #[serde(default = "default_true")]
    pub stretch_and_fold: bool,
    #[serde(default = "default_fft_size")]
    pub fft_size: u32,
    pub embedding_params: EmbeddingParams,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_fixed_length() -> u32 {
    100
}
fn default_true() -> bool {
    true
}
fn default_fft_size() -> u32 {
    512
}
fn default_max_files() -> usize {
    1_000_000
}

impl ProcessParams {
    pub fn new(s3_params: StoreParams, embedding_params: EmbeddingParams) -> Self {
        Self {
            s3_params,
            feature_type: FeatureType::default(),
            fixed_length: default_fixed_length(),
            stretch_and_fold: default_true(),
            fft_size: default_fft_size(),
            embedding_params,
            max_files: default_max_files(),
        }
    }

    pub fn with_feature_type(mut self, t: FeatureType) -> Self {
        self.feature_type = t;
        self
    }

    pub fn with_max_files(mut self, n: usize) -> Self {
        self.max_files = n;
        self
    }
}
