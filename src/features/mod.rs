//! 音频特征模块：特征服务的请求模型、音频键过滤以及基于调度器的特征提取入口。
//!
//! # Audio Feature Module
//!
//! Typed request model of the remote feature worker plus a facade that runs a whole
//! extraction through the [`crate::dispatch::Dispatcher`].
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ProcessParams`] | Shared parameters sent with every batch |
//! | [`AudioKeyFilter`] | Keeps keys with audio file extensions |
//! | [`FeatureDispatch`] | Chunk, dispatch and reassemble feature vectors |
//! | [`FeatureSet`] | Feature vectors paired with their keys |

mod client;
mod keys;
mod types;

pub use client::{FeatureDispatch, FeatureSet};
pub use keys::{AudioKeyFilter, AUDIO_EXTENSIONS};
pub use types::{EmbeddingParams, FeatureType, FeatureVector, ProcessParams, StoreParams};
