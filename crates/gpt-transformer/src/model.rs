//! Секционированный GPT-трансформер.

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;
use tracing::debug;

use asr_core::SequenceTransformer;

use crate::config::TransformerConfig;
use crate::layers::TransformerLayer;
use crate::mask::partitioned_attention_mask;

/// Трансформер над объединённой последовательностью
/// `[аудио-эмбеддинги | текст-эмбеддинги]`.
///
/// Эмбеддинги на входе, эмбеддинги на выходе; без собственных таблиц токенов
/// и без финальной нормализации — это зона ответственности владельца модели.
/// Секционирование attention задаётся маской, построенной один раз на полную
/// ёмкость и сужаемой под фактическую длину входа.
pub struct GptTransformer {
    config: TransformerConfig,
    layers: Vec<TransformerLayer>,
    mask: Tensor,
}

impl GptTransformer {
    /// Построить трансформер из VarBuilder (веса `layers.{i}.*`).
    pub fn new(config: TransformerConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;

        let mask = partitioned_attention_mask(
            config.seq_len,
            config.non_causal_partition,
            vb.device(),
        )?;

        let mut layers = Vec::with_capacity(config.depth);
        for i in 0..config.depth {
            layers.push(TransformerLayer::new(&config, vb.pp(format!("layers.{i}")))?);
        }

        debug!(
            depth = config.depth,
            dim = config.dim,
            seq_len = config.seq_len,
            partition = config.non_causal_partition,
            "built partitioned transformer"
        );

        Ok(Self {
            config,
            layers,
            mask,
        })
    }

    /// Конфигурация трансформера.
    pub fn config(&self) -> &TransformerConfig {
        &self.config
    }

    fn run(&self, embeddings: &Tensor, train: bool) -> Result<Tensor> {
        let (_batch, seq_len, _dim) = embeddings.dims3()?;
        if seq_len > self.config.seq_len {
            candle_core::bail!(
                "sequence length {seq_len} exceeds configured maximum {}",
                self.config.seq_len
            );
        }

        // При инференсе текстовый хвост короче ёмкости; маска для префикса —
        // верхний левый блок полной маски.
        let mask = self.mask.narrow(0, 0, seq_len)?.narrow(1, 0, seq_len)?;

        let mut x = embeddings.clone();
        for layer in &self.layers {
            x = layer.forward_t(&x, &mask, train)?;
        }
        Ok(x)
    }
}

impl SequenceTransformer for GptTransformer {
    fn sequence_length(&self) -> usize {
        self.config.seq_len
    }

    fn partition(&self) -> usize {
        self.config.non_causal_partition
    }

    fn forward_t(&self, embeddings: &Tensor, train: bool) -> Result<Tensor> {
        self.run(embeddings, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn tiny() -> (GptTransformer, Device) {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let config = TransformerConfig {
            dim: 16,
            depth: 2,
            heads: 2,
            seq_len: 10,
            non_causal_partition: 4,
            attn_dropout: 0.0,
            ff_dropout: 0.0,
        };
        (GptTransformer::new(config, vb).unwrap(), device)
    }

    #[test]
    fn test_forward_preserves_shape() {
        let (model, device) = tiny();
        let x = Tensor::randn(0f32, 1f32, (3, 7, 16), &device).unwrap();
        let y = model.forward_t(&x, false).unwrap();
        assert_eq!(y.dims(), x.dims());
    }

    #[test]
    fn test_forward_rejects_overlong_sequence() {
        let (model, device) = tiny();
        let x = Tensor::randn(0f32, 1f32, (1, 11, 16), &device).unwrap();
        assert!(model.forward_t(&x, false).is_err());
    }

    #[test]
    fn test_audio_prefix_output_ignores_text_suffix() {
        // Аудио-секция не видит текст: её выход не должен зависеть от того,
        // какие текстовые эмбеддинги стоят после секции.
        let (model, device) = tiny();
        let audio = Tensor::randn(0f32, 1f32, (1, 4, 16), &device).unwrap();
        let text_a = Tensor::randn(0f32, 1f32, (1, 3, 16), &device).unwrap();
        let text_b = Tensor::randn(0f32, 1f32, (1, 3, 16), &device).unwrap();

        let ya = model
            .forward_t(&Tensor::cat(&[&audio, &text_a], 1).unwrap(), false)
            .unwrap();
        let yb = model
            .forward_t(&Tensor::cat(&[&audio, &text_b], 1).unwrap(), false)
            .unwrap();

        let audio_a: Vec<f32> = ya
            .narrow(1, 0, 4)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        let audio_b: Vec<f32> = yb
            .narrow(1, 0, 4)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        for (a, b) in audio_a.iter().zip(audio_b.iter()) {
            assert!((a - b).abs() < 1e-5, "audio output leaked text info");
        }
    }
}
