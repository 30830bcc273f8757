//! Конфигурация секционированного трансформера.

use serde::{Deserialize, Serialize};

/// Множитель расширения feed-forward блока.
pub const FF_MULT: usize = 4;

/// Конфигурация трансформера над объединённой аудио/текст-последовательностью.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// Размерность эмбеддингов (model dim).
    pub dim: usize,

    /// Количество слоёв.
    pub depth: usize,

    /// Количество attention-голов.
    pub heads: usize,

    /// Максимальная длина последовательности.
    pub seq_len: usize,

    /// Индекс секционирования: позиции `< partition` (аудио) получают
    /// двунаправленный attention, позиции `>= partition` (текст) — каузальный.
    pub non_causal_partition: usize,

    /// Dropout на attention-весах.
    pub attn_dropout: f32,

    /// Dropout внутри feed-forward блока.
    pub ff_dropout: f32,
}

impl TransformerConfig {
    /// Размерность одной attention-головы.
    pub fn head_dim(&self) -> usize {
        self.dim / self.heads
    }

    /// Проверка согласованности параметров.
    pub fn validate(&self) -> candle_core::Result<()> {
        if self.dim == 0 || self.depth == 0 || self.heads == 0 || self.seq_len == 0 {
            candle_core::bail!("transformer config has zero-sized dimension");
        }
        if self.dim % self.heads != 0 {
            candle_core::bail!(
                "dim {} is not divisible by heads {}",
                self.dim,
                self.heads
            );
        }
        if self.non_causal_partition > self.seq_len {
            candle_core::bail!(
                "non_causal_partition {} exceeds seq_len {}",
                self.non_causal_partition,
                self.seq_len
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> TransformerConfig {
        TransformerConfig {
            dim: 64,
            depth: 2,
            heads: 4,
            seq_len: 32,
            non_causal_partition: 16,
            attn_dropout: 0.1,
            ff_dropout: 0.1,
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(base().validate().is_ok());
        assert_eq!(base().head_dim(), 16);
    }

    #[test]
    fn test_validate_rejects_bad_heads() {
        let mut config = base();
        config.heads = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_partition_overflow() {
        let mut config = base();
        config.non_causal_partition = 33;
        assert!(config.validate().is_err());
    }
}
