//! Beam search инференс с подключаемой стратегией сэмплирования.
//!
//! Обе стратегии выбирают `k = BEAM_WIDTH` кандидатов на шаг из softmax
//! температурно-масштабированных логитов последней текстовой позиции.
//! Усечение лучей глобальное (по всем родителям сразу): сильный родитель
//! может вытеснить разнообразие — поведение исходной системы сохранено.

use candle_core::{IndexOp, Module, Tensor};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

use asr_core::{AsrError, AsrResult, BeamHypothesis};

use crate::model::GptAsr;

/// Количество параллельных гипотез beam search.
pub const BEAM_WIDTH: usize = 16;

/// Температура: множитель логитов перед softmax.
pub const TEMPERATURE: f64 = 0.8;

// ============================================================================
// Стратегии сэмплирования
// ============================================================================

/// Результат одного шага сэмплирования: по `k` кандидатов на каждую строку
/// распределения. Общая форма возврата для обеих стратегий.
#[derive(Debug, Clone)]
pub struct Sampled {
    /// Идентификаторы выбранных токенов, `[строка][k]`.
    pub indices: Vec<Vec<u32>>,

    /// Вероятности выбранных токенов из исходного распределения, `[строка][k]`.
    pub values: Vec<Vec<f32>>,
}

/// Стратегия выбора `k` кандидатов из распределения `[строки, словарь]`.
pub trait Sampler {
    fn sample(&mut self, distribution: &Tensor, k: usize) -> AsrResult<Sampled>;
}

/// Детерминированный top-k: `k` наиболее вероятных токенов по убыванию.
pub struct TopKSampler;

impl Sampler for TopKSampler {
    fn sample(&mut self, distribution: &Tensor, k: usize) -> AsrResult<Sampled> {
        let rows: Vec<Vec<f32>> = distribution.to_vec2()?;
        let mut indices = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            if row.len() < k {
                return Err(AsrError::Inference(format!(
                    "vocabulary of {} is smaller than k={k}",
                    row.len()
                )));
            }
            let mut order: Vec<usize> = (0..row.len()).collect();
            order.sort_unstable_by(|&a, &b| row[b].total_cmp(&row[a]));
            order.truncate(k);
            indices.push(order.iter().map(|&i| i as u32).collect());
            values.push(order.iter().map(|&i| row[i]).collect());
        }
        Ok(Sampled { indices, values })
    }
}

/// Стохастический сэмплер без возвращения: `k` различных токенов,
/// веса — вероятности распределения.
pub struct MultinomialSampler {
    rng: StdRng,
}

impl MultinomialSampler {
    /// Сэмплер с фиксированным сидом (воспроизводимые прогоны).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Сэмплер с энтропийным сидом.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Sampler for MultinomialSampler {
    fn sample(&mut self, distribution: &Tensor, k: usize) -> AsrResult<Sampled> {
        let rows: Vec<Vec<f32>> = distribution.to_vec2()?;
        let mut indices = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            if row.len() < k {
                return Err(AsrError::Inference(format!(
                    "vocabulary of {} is smaller than k={k}",
                    row.len()
                )));
            }
            let mut weights = row.clone();
            let mut row_indices = Vec::with_capacity(k);
            let mut row_values = Vec::with_capacity(k);
            for _ in 0..k {
                let dist = WeightedIndex::new(&weights)
                    .map_err(|e| AsrError::Inference(format!("multinomial sampling: {e}")))?;
                let idx = dist.sample(&mut self.rng);
                row_indices.push(idx as u32);
                // Значение — из исходного распределения, не из остатка.
                row_values.push(row[idx]);
                weights[idx] = 0.0;
            }
            indices.push(row_indices);
            values.push(row_values);
        }
        Ok(Sampled { indices, values })
    }
}

// ============================================================================
// Beam search
// ============================================================================

impl GptAsr {
    /// Beam search с детерминированным top-k сэмплером.
    pub fn inference_beam_topk(&self, mel: &Tensor) -> AsrResult<Vec<BeamHypothesis>> {
        self.inference_beam(mel, &mut TopKSampler)
    }

    /// Beam search со стохастическим сэмплированием без возвращения.
    pub fn inference_beam_sampled(&self, mel: &Tensor) -> AsrResult<Vec<BeamHypothesis>> {
        self.inference_beam(mel, &mut MultinomialSampler::from_entropy())
    }

    /// Общий цикл beam search.
    ///
    /// Возвращает до [`BEAM_WIDTH`] гипотез по убыванию кумулятивной
    /// вероятности. Останов: pad-токен во всех гипотезах либо достигнут
    /// `max_symbols_per_phrase`; во втором случае выдаётся warning,
    /// результат всё равно возвращается.
    ///
    /// # Panics
    /// Батч обязан состоять ровно из одного примера.
    pub fn inference_beam(
        &self,
        mel: &Tensor,
        sampler: &mut dyn Sampler,
    ) -> AsrResult<Vec<BeamHypothesis>> {
        let (batch, _mels, _frames) = mel.dims3()?;
        assert_eq!(batch, 1, "beam search only works on batches of one");

        // Аудио-эмбеддинги не зависят от шага — считаются один раз.
        let (mel_emb, _mel_valid) = self.embed_mel(mel, false)?;
        let mut mel_batch = mel_emb.clone();

        let mut hyps = vec![BeamHypothesis::start(self.config.start_token())];

        while hyps[0].tokens.len() < self.config.max_symbols_per_phrase {
            let n = hyps.len();
            let len = hyps[0].tokens.len();

            let mut flat = Vec::with_capacity(n * len);
            for hyp in &hyps {
                flat.extend_from_slice(&hyp.tokens);
            }
            let tokens = Tensor::from_vec(flat, (n, len), &self.device)?;
            let text_emb = self.embed_text(&tokens)?;

            // Аудио-сегмент раскладывается по лучам, когда их стало больше.
            if mel_batch.dim(0)? != n {
                mel_batch = mel_emb.repeat((n, 1, 1))?;
            }

            let emb = Tensor::cat(&[&mel_batch, &text_emb], 1)?;
            let enc = self.gpt.forward_t(&emb, false)?;

            let last = enc.i((.., emb.dim(1)? - 1, ..))?;
            let logits = self.text_head.forward(&self.final_norm.forward(&last)?)?;
            let dist = candle_nn::ops::softmax_last_dim(&(logits * TEMPERATURE)?)?;

            let sampled = sampler.sample(&dist, BEAM_WIDTH)?;

            // Каждая гипотеза порождает k потомков; усечение — глобальное.
            let mut candidates = Vec::with_capacity(n * BEAM_WIDTH);
            for (parent, (row_indices, row_values)) in hyps
                .iter()
                .zip(sampled.indices.iter().zip(sampled.values.iter()))
            {
                for (&code, &prob) in row_indices.iter().zip(row_values.iter()) {
                    let mut tokens = parent.tokens.clone();
                    tokens.push(code);
                    candidates.push(BeamHypothesis {
                        tokens,
                        probability: parent.probability * prob,
                    });
                }
            }
            candidates.sort_unstable_by(|a, b| b.probability.total_cmp(&a.probability));
            candidates.truncate(BEAM_WIDTH);
            hyps = candidates;

            // PAD совмещает роль стоп-токена.
            if hyps.iter().all(|h| h.finished()) {
                break;
            }
        }

        if !hyps.iter().all(|h| h.finished()) {
            warn!(
                "symbol limit {} reached before a pad token in every hypothesis; \
                 output is likely unreliable",
                self.config.max_symbols_per_phrase
            );
        }

        Ok(hyps)
    }
}
