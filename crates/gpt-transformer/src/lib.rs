//! # gpt-transformer
//!
//! Секционированный трансформер для совместного кодирования аудио и текста.
//!
//! Одна последовательность, два режима attention: аудио-префикс обслуживается
//! двунаправленно, текстовый хвост — каузально. Секционирование выражено
//! явной аддитивной маской (см. [`mask::partitioned_attention_mask`]), а не
//! специальным флагом библиотеки.

pub mod config;
pub mod layers;
pub mod mask;
pub mod model;

pub use config::TransformerConfig;
pub use mask::partitioned_attention_mask;
pub use model::GptTransformer;
