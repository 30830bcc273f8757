//! # asr-core
//!
//! Базовые типы, трейты и определения ошибок для gpt-asr.
//!
//! Этот крейт предоставляет фундаментальные абстракции для остальных
//! крейтов в workspace:
//!
//! - Общие типы данных (`PaddedSequence`, `BeamHypothesis`)
//! - Унифицированная обработка ошибок через `AsrError`
//! - Trait [`SequenceTransformer`] — контракт секционированного трансформера
//! - Реестр моделей [`ModelType`]

pub mod error;
pub mod model_registry;
pub mod traits;
pub mod types;

pub use error::{AsrError, AsrResult};
pub use model_registry::ModelType;
pub use traits::SequenceTransformer;
pub use types::{mask_from_lengths, BeamHypothesis, PaddedSequence, PAD_TOKEN};
