//! Конфигурация модели GptAsr.

use serde::{Deserialize, Serialize};

use asr_core::{AsrError, AsrResult};
use gpt_transformer::TransformerConfig;

/// Коэффициент временного даунсемплинга mel-энкодера.
///
/// Жёсткий инвариант: две свёртки со stride 2 — единственный источник
/// сжатия по времени, на него завязаны ёмкости позиционных таблиц.
pub const MEL_DOWNSAMPLE_FACTOR: usize = 4;

/// Размер таблицы символов референсного пайплайна (без start-токена).
pub const DEFAULT_NUMBER_SYMBOLS: usize = 148;

/// Конфигурация GptAsr.
///
/// Размер словаря (`number_symbols`) передаётся явно при конструировании,
/// а не читается из глобальной таблицы символов.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GptAsrConfig {
    /// Глубина трансформера (количество слоёв).
    pub layers: usize,

    /// Размерность модели.
    pub model_dim: usize,

    /// Количество attention-голов.
    pub heads: usize,

    /// Максимальное количество текстовых токенов во фразе (включая start).
    pub max_symbols_per_phrase: usize,

    /// Максимальное количество mel-фреймов на входе энкодера.
    /// Внутри модели делится на [`MEL_DOWNSAMPLE_FACTOR`].
    pub max_mel_frames: usize,

    /// Количество текстовых/фонетических символов словаря (pad включён,
    /// start — нет: его id равен `number_symbols`).
    pub number_symbols: usize,

    /// Количество mel-каналов входной спектрограммы.
    pub mel_channels: usize,

    /// Dropout на attention-весах трансформера.
    pub attn_dropout: f32,

    /// Dropout в feed-forward блоках трансформера.
    pub ff_dropout: f32,
}

impl Default for GptAsrConfig {
    fn default() -> Self {
        Self {
            layers: 8,
            model_dim: 512,
            heads: 8,
            max_symbols_per_phrase: 200,
            max_mel_frames: 1000,
            number_symbols: DEFAULT_NUMBER_SYMBOLS,
            mel_channels: 80,
            attn_dropout: 0.1,
            ff_dropout: 0.1,
        }
    }
}

impl GptAsrConfig {
    /// Маленькая конфигурация для тестов: те же пропорции, быстрый CPU.
    pub fn tiny() -> Self {
        Self {
            layers: 1,
            model_dim: 32,
            heads: 2,
            max_symbols_per_phrase: 12,
            max_mel_frames: 32,
            number_symbols: 40,
            mel_channels: 80,
            attn_dropout: 0.0,
            ff_dropout: 0.0,
        }
    }

    /// Размер словаря с учётом зарезервированного start-токена.
    pub fn number_text_tokens(&self) -> usize {
        self.number_symbols + 1
    }

    /// Идентификатор start-токена.
    pub fn start_token(&self) -> u32 {
        self.number_symbols as u32
    }

    /// Ёмкость аудио-секции: mel-фреймы после 4x-даунсемплинга.
    pub fn max_mel_tokens(&self) -> usize {
        self.max_mel_frames / MEL_DOWNSAMPLE_FACTOR
    }

    /// Полная длина объединённой последовательности трансформера.
    pub fn total_sequence_length(&self) -> usize {
        2 + self.max_symbols_per_phrase + self.max_mel_tokens()
    }

    /// Конфигурация внутреннего трансформера.
    pub fn transformer_config(&self) -> TransformerConfig {
        TransformerConfig {
            dim: self.model_dim,
            depth: self.layers,
            heads: self.heads,
            seq_len: self.total_sequence_length(),
            non_causal_partition: self.max_mel_tokens(),
            attn_dropout: self.attn_dropout,
            ff_dropout: self.ff_dropout,
        }
    }

    /// Проверка согласованности параметров.
    pub fn validate(&self) -> AsrResult<()> {
        if self.model_dim % self.heads != 0 {
            return Err(AsrError::Config(format!(
                "model_dim {} is not divisible by heads {}",
                self.model_dim, self.heads
            )));
        }
        // Канальная лестница энкодера: dim/4 -> dim/2 -> dim.
        if self.model_dim % 4 != 0 {
            return Err(AsrError::Config(format!(
                "model_dim {} must be divisible by 4",
                self.model_dim
            )));
        }
        if self.number_symbols == 0 {
            return Err(AsrError::Config("number_symbols must be positive".into()));
        }
        if self.max_symbols_per_phrase < 2 {
            return Err(AsrError::Config(
                "max_symbols_per_phrase must be at least 2".into(),
            ));
        }
        if self.max_mel_tokens() == 0 {
            return Err(AsrError::Config(format!(
                "max_mel_frames {} is below the downsampling factor",
                self.max_mel_frames
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GptAsrConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.number_text_tokens(), 149);
        assert_eq!(config.start_token(), 148);
        assert_eq!(config.max_mel_tokens(), 250);
        assert_eq!(config.total_sequence_length(), 2 + 200 + 250);
    }

    #[test]
    fn test_transformer_config_partition() {
        let config = GptAsrConfig::tiny();
        let t = config.transformer_config();
        assert_eq!(t.non_causal_partition, config.max_mel_tokens());
        assert_eq!(t.seq_len, config.total_sequence_length());
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_dims() {
        let mut config = GptAsrConfig::tiny();
        config.model_dim = 30; // не делится на 4
        assert!(config.validate().is_err());

        let mut config = GptAsrConfig::tiny();
        config.heads = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_kwargs_deserialization_uses_defaults() {
        // Частичный kwargs-мэппинг: остальные поля — из Default.
        let config: GptAsrConfig =
            serde_json::from_value(serde_json::json!({ "model_dim": 256, "heads": 4 })).unwrap();
        assert_eq!(config.model_dim, 256);
        assert_eq!(config.heads, 4);
        assert_eq!(config.layers, 8);
        assert_eq!(config.max_mel_frames, 1000);
    }
}
