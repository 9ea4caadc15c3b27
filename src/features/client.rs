//! Feature extraction over the dispatcher.

use super::types::{FeatureVector, ProcessParams};
use crate::config::DispatchConfig;
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::worker::HttpWorker;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

/// Feature vectors paired with the keys they were computed from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureSet {
    pub names: Vec<String>,
    pub features: Vec<FeatureVector>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Sends audio keys to the remote feature worker in bounded, retried batches.
pub struct FeatureDispatch {
    dispatcher: Dispatcher<HttpWorker<FeatureVector>>,
}

impl FeatureDispatch {
    pub fn new(config: DispatchConfig) -> Result<Self> {
        let worker = HttpWorker::from_config(&config)?;
        Ok(Self {
            dispatcher: Dispatcher::new(worker, config)?,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        self.dispatcher.config()
    }

    /// One feature vector per key, in key order, for at most `params.max_files` keys.
    pub async fn extract(
        &self,
        keys: Vec<String>,
        params: ProcessParams,
    ) -> Result<Vec<FeatureVector>> {
        self.extract_with_stats(keys, params)
            .await
            .map(|(set, _)| set.features)
    }

    pub async fn extract_with_stats(
        &self,
        mut keys: Vec<String>,
        params: ProcessParams,
    ) -> Result<(FeatureSet, DispatchStats)> {
        validate_params(&params)?;
        keys.truncate(params.max_files);
        let names = keys.clone();
        let (features, stats) = self.dispatcher.dispatch_with_stats(keys, params).await?;
        Ok((FeatureSet { names, features }, stats))
    }
}

fn validate_params(params: &ProcessParams) -> Result<()> {
    if params.fixed_length == 0 {
        return Err(Error::validation_with_context(
            "fixed_length must be positive",
            ErrorContext::new()
                .with_field_path("request.fixed_length")
                .with_source("features"),
        ));
    }
    if params.fft_size == 0 {
        return Err(Error::validation_with_context(
            "fft_size must be positive",
            ErrorContext::new()
                .with_field_path("request.fft_size")
                .with_source("features"),
        ));
    }
    if params.embedding_params.method.trim().is_empty() {
        return Err(Error::validation_with_context(
            "embedding method is required",
            ErrorContext::new()
                .with_field_path("request.embedding_params.method")
                .with_source("features"),
        ));
    }
    Ok(())
}
