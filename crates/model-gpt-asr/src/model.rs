//! GptAsr: совместное кодирование mel-аудио и текста одним трансформером.
//!
//! Тренировочный forward (teacher forcing, кросс-энтропия) живёт здесь;
//! beam search инференс — в [`crate::beam`].

use candle_core::{Module, Tensor};
use candle_nn::{embedding, layer_norm, linear, Embedding, LayerNorm, Linear, VarBuilder};
use tracing::debug;

use asr_core::{AsrError, AsrResult, PaddedSequence, SequenceTransformer};
use gpt_transformer::GptTransformer;

use crate::config::GptAsrConfig;
use crate::encoder::MelEncoder;

/// GPT-style ASR-модель: mel-энкодер + три таблицы эмбеддингов +
/// секционированный трансформер + проекция в словарь.
pub struct GptAsr {
    pub(crate) config: GptAsrConfig,
    pub(crate) text_embedding: Embedding,
    pub(crate) text_pos_embedding: Embedding,
    pub(crate) mel_pos_embedding: Embedding,
    pub(crate) mel_encoder: MelEncoder,
    pub(crate) gpt: Box<dyn SequenceTransformer>,
    pub(crate) final_norm: LayerNorm,
    pub(crate) text_head: Linear,
    pub(crate) device: candle_core::Device,
}

impl GptAsr {
    /// Построить модель со встроенным [`GptTransformer`].
    pub fn new(config: GptAsrConfig, vb: VarBuilder) -> AsrResult<Self> {
        config.validate()?;
        let gpt = GptTransformer::new(config.transformer_config(), vb.pp("gpt"))?;
        Self::with_transformer(config, vb, Box::new(gpt))
    }

    /// Построить модель с внешним трансформером.
    ///
    /// Замена обязана соблюдать контракт секционирования: индекс секции
    /// равен ёмкости аудио-сегмента.
    pub fn with_transformer(
        config: GptAsrConfig,
        vb: VarBuilder,
        gpt: Box<dyn SequenceTransformer>,
    ) -> AsrResult<Self> {
        config.validate()?;
        if gpt.partition() != config.max_mel_tokens() {
            return Err(AsrError::Config(format!(
                "transformer partition {} does not match mel capacity {}",
                gpt.partition(),
                config.max_mel_tokens()
            )));
        }
        let needed = config.max_mel_tokens() + config.max_symbols_per_phrase;
        if gpt.sequence_length() < needed {
            return Err(AsrError::Config(format!(
                "transformer sequence length {} is below required {needed}",
                gpt.sequence_length()
            )));
        }

        let dim = config.model_dim;
        let text_embedding = embedding(config.number_text_tokens(), dim, vb.pp("text_embedding"))?;
        let text_pos_embedding = embedding(
            config.max_symbols_per_phrase + 1,
            dim,
            vb.pp("text_pos_embedding"),
        )?;
        let mel_pos_embedding =
            embedding(config.max_mel_tokens(), dim, vb.pp("mel_pos_embedding"))?;
        let mel_encoder = MelEncoder::new(&config, vb.pp("mel_encoder"))?;
        let final_norm = layer_norm(dim, 1e-5, vb.pp("final_norm"))?;
        let text_head = linear(dim, config.number_text_tokens(), vb.pp("text_head"))?;
        let device = vb.device().clone();

        Ok(Self {
            config,
            text_embedding,
            text_pos_embedding,
            mel_pos_embedding,
            mel_encoder,
            gpt,
            final_norm,
            text_head,
            device,
        })
    }

    /// Конфигурация модели.
    pub fn config(&self) -> &GptAsrConfig {
        &self.config
    }

    /// Устройство, на котором живут параметры.
    pub fn device(&self) -> &candle_core::Device {
        &self.device
    }

    /// Эмбеддинги токенов `[batch, len]` (u32) с позиционной добавкой.
    pub(crate) fn embed_text(&self, tokens: &Tensor) -> AsrResult<Tensor> {
        let (_batch, len) = tokens.dims2()?;
        let emb = self.text_embedding.forward(tokens)?;
        let positions = Tensor::arange(0u32, len as u32, &self.device)?;
        let pos = self.text_pos_embedding.forward(&positions)?;
        Ok(emb.broadcast_add(&pos)?)
    }

    /// Закодировать mel-вход и привести к виду `[batch, mel_tokens, dim]`
    /// с позиционной добавкой. Возвращает эмбеддинги и фактическую
    /// (до дополнения) длину аудио-сегмента.
    pub(crate) fn embed_mel(&self, mel: &Tensor, train: bool) -> AsrResult<(Tensor, usize)> {
        let encoded = self.mel_encoder.forward_t(mel, train)?;
        // Дополнение нулями до фиксированной ёмкости аудио-сегмента;
        // переполнение — фатальная ошибка конфигурации.
        let padded = PaddedSequence::new(encoded, 2, self.config.max_mel_tokens())?;
        let valid_len = padded.valid_len();

        let emb = padded.into_tensor().transpose(1, 2)?.contiguous()?;
        let positions = Tensor::arange(0u32, self.config.max_mel_tokens() as u32, &self.device)?;
        let pos = self.mel_pos_embedding.forward(&positions)?;
        Ok((emb.broadcast_add(&pos)?, valid_len))
    }

    /// Тренировочный forward: teacher-forced кросс-энтропия.
    ///
    /// `mel` — `[batch, mel_channels, T]`, `text_targets` — `[batch, L]`
    /// (u32-идентификаторы символов, `L + 1 <= max_symbols_per_phrase`
    /// с учётом подставляемого start-токена).
    ///
    /// Возвращает скалярный (0-мерный) тензор среднего лосса. Дополненные
    /// позиции из лосса не исключаются — поведение исходной системы.
    pub fn forward(&self, mel: &Tensor, text_targets: &Tensor) -> AsrResult<Tensor> {
        let (batch, target_len) = text_targets.dims2()?;

        // start-токен спереди, pad-нули до фиксированной длины.
        let start = Tensor::full(self.config.start_token(), (batch, 1), &self.device)?;
        let with_start = Tensor::cat(&[&start, text_targets], 1)?;
        let targets = PaddedSequence::new(with_start, 1, self.config.max_symbols_per_phrase)?
            .into_tensor();

        let text_emb = self.embed_text(&targets)?;
        let (mel_emb, mel_valid) = self.embed_mel(mel, true)?;
        debug!(
            batch,
            target_len, mel_valid, "training forward over joint sequence"
        );

        // Аудио-сегмент всегда предшествует текстовому.
        let emb = Tensor::cat(&[&mel_emb, &text_emb], 1)?;
        let enc = self.gpt.forward_t(&emb, true)?;

        let phrase_len = self.config.max_symbols_per_phrase;
        let text_enc = enc.narrow(1, self.config.max_mel_tokens(), phrase_len)?;
        let logits = self.text_head.forward(&self.final_norm.forward(&text_enc)?)?;

        // Next-token сдвиг: логиты позиций [0, P-1) против целей [1, P).
        let shifted_logits = logits.narrow(1, 0, phrase_len - 1)?.contiguous()?;
        let shifted_targets = targets.narrow(1, 1, phrase_len - 1)?.contiguous()?;

        let vocab = self.config.number_text_tokens();
        let flat = batch * (phrase_len - 1);
        let loss = candle_nn::loss::cross_entropy(
            &shifted_logits.reshape((flat, vocab))?,
            &shifted_targets.reshape((flat,))?,
        )?;
        Ok(loss)
    }
}
