//! Реестр поддерживаемых моделей.
//!
//! Перечисление типов моделей и метаданные о каждой. Конструирование
//! выполняют сами крейты моделей (см. фабрику `from_options` в model-gpt-asr).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Тип модели.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    /// GPT-style joint audio/text ASR: mel-энкодер + секционированный
    /// трансформер + beam search.
    GptAsr,
}

impl ModelType {
    /// Все поддерживаемые типы моделей.
    pub fn all() -> &'static [ModelType] {
        &[ModelType::GptAsr]
    }

    /// Строковый идентификатор для CLI/конфигов.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::GptAsr => "gpt-asr",
        }
    }

    /// Полное человекочитаемое название.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::GptAsr => "GPT ASR (joint mel/text transformer)",
        }
    }

    /// Бэкенд инференса.
    pub fn backend(&self) -> &'static str {
        "candle"
    }

    /// Парсинг из строки (без учёта регистра, с синонимами).
    pub fn from_str_loose(s: &str) -> Option<ModelType> {
        match s.to_lowercase().as_str() {
            "gpt-asr" | "gpt_asr" | "gptasr" => Some(ModelType::GptAsr),
            _ => None,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
