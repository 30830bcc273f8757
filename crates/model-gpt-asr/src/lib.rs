//! # model-gpt-asr
//!
//! GPT-style ASR: mel-спектрограмма и текстовые токены кодируются одной
//! последовательностью секционированного трансформера (аудио —
//! двунаправленно, текст — каузально).
//!
//! Публичные операции:
//! - [`GptAsr::forward`] — тренировочный teacher-forced проход, скалярный лосс;
//! - [`GptAsr::inference_beam_topk`] / [`GptAsr::inference_beam_sampled`] —
//!   beam search (ширина 16) с детерминированной либо стохастической
//!   стратегией сэмплирования;
//! - [`registry::from_options`] — фабрика для внешнего реестра моделей.

pub mod beam;
pub mod config;
pub mod encoder;
pub mod model;
pub mod registry;

pub use beam::{MultinomialSampler, Sampled, Sampler, TopKSampler, BEAM_WIDTH, TEMPERATURE};
pub use config::{GptAsrConfig, DEFAULT_NUMBER_SYMBOLS, MEL_DOWNSAMPLE_FACTOR};
pub use encoder::{MelEncoder, ResBlock};
pub use model::GptAsr;
pub use registry::{config_from_options, from_options};
