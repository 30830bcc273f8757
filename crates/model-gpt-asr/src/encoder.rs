//! Mel-энкодер: свёрточный стек с residual-блоками.
//!
//! Структура:
//! - широкая свёртка (kernel 7) в `dim/4` каналов, 2 × ResBlock
//! - strided-свёртка (stride 2) в `dim/2` + BatchNorm + ReLU, 3 × ResBlock
//! - strided-свёртка (stride 2) в `dim`, 3 × ResBlock
//!
//! Две strided-свёртки — единственный источник 4x-сжатия по времени
//! (см. [`crate::config::MEL_DOWNSAMPLE_FACTOR`]).

use candle_core::{Module, Result, Tensor};
use candle_nn::{batch_norm, conv1d, BatchNorm, Conv1d, Conv1dConfig, ModuleT, VarBuilder};

use crate::config::GptAsrConfig;

const BN_EPS: f64 = 1e-5;

/// Свёртка kernel 5 с same-паддингом.
fn conv5(in_c: usize, out_c: usize, stride: usize, vb: VarBuilder) -> Result<Conv1d> {
    let config = Conv1dConfig {
        padding: 2,
        stride,
        ..Default::default()
    };
    conv1d(in_c, out_c, 5, config, vb)
}

// ============================================================================
// Residual-блок
// ============================================================================

/// Двухслойный свёрточный residual-блок: количество каналов не меняется.
#[derive(Debug, Clone)]
pub struct ResBlock {
    conv1: Conv1d,
    bn1: BatchNorm,
    conv2: Conv1d,
    bn2: BatchNorm,
}

impl ResBlock {
    pub fn new(channels: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            conv1: conv5(channels, channels, 1, vb.pp("conv1"))?,
            bn1: batch_norm(channels, BN_EPS, vb.pp("bn1"))?,
            conv2: conv5(channels, channels, 1, vb.pp("conv2"))?,
            bn2: batch_norm(channels, BN_EPS, vb.pp("bn2"))?,
        })
    }

    /// `[batch, channels, time]` -> та же форма.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let h = self.conv1.forward(x)?;
        let h = self.bn1.forward_t(&h, train)?;
        let h = h.relu()?;
        let h = self.conv2.forward(&h)?;
        let h = self.bn2.forward_t(&h, train)?;
        (h + x)?.relu()
    }
}

// ============================================================================
// Mel-энкодер
// ============================================================================

/// Энкодер mel-спектрограммы: `[batch, mel_channels, T]` ->
/// `[batch, model_dim, T/4]`.
#[derive(Debug, Clone)]
pub struct MelEncoder {
    conv_in: Conv1d,
    res_in: Vec<ResBlock>,
    down1: Conv1d,
    down1_bn: BatchNorm,
    res_mid: Vec<ResBlock>,
    down2: Conv1d,
    res_out: Vec<ResBlock>,
}

impl MelEncoder {
    pub fn new(config: &GptAsrConfig, vb: VarBuilder) -> Result<Self> {
        let dim = config.model_dim;
        let (quarter, half) = (dim / 4, dim / 2);

        let conv_in = conv1d(
            config.mel_channels,
            quarter,
            7,
            Conv1dConfig {
                padding: 3,
                ..Default::default()
            },
            vb.pp("conv_in"),
        )?;

        let mut res_in = Vec::with_capacity(2);
        for i in 0..2 {
            res_in.push(ResBlock::new(quarter, vb.pp(format!("res_in.{i}")))?);
        }

        let down1 = conv5(quarter, half, 2, vb.pp("down1"))?;
        let down1_bn = batch_norm(half, BN_EPS, vb.pp("down1_bn"))?;

        let mut res_mid = Vec::with_capacity(3);
        for i in 0..3 {
            res_mid.push(ResBlock::new(half, vb.pp(format!("res_mid.{i}")))?);
        }

        // Вторая strided-свёртка идёт без нормализации и активации:
        // сразу за ней residual-блоки.
        let down2 = conv5(half, dim, 2, vb.pp("down2"))?;

        let mut res_out = Vec::with_capacity(3);
        for i in 0..3 {
            res_out.push(ResBlock::new(dim, vb.pp(format!("res_out.{i}")))?);
        }

        Ok(Self {
            conv_in,
            res_in,
            down1,
            down1_bn,
            res_mid,
            down2,
            res_out,
        })
    }

    /// Длина выхода по времени для входной длины `input_len`.
    ///
    /// Для длин, кратных 4, равна ровно `input_len / 4`.
    pub fn output_len(input_len: usize) -> usize {
        if input_len == 0 {
            return 0;
        }
        // Каждая strided-свёртка (kernel 5, stride 2, padding 2):
        // out = (in + 2*2 - 5) / 2 + 1.
        let down = |t: usize| (t + 4 - 5) / 2 + 1;
        down(down(input_len))
    }

    /// `[batch, mel_channels, T]` -> `[batch, model_dim, T/4]`.
    pub fn forward_t(&self, mel: &Tensor, train: bool) -> Result<Tensor> {
        let mut x = self.conv_in.forward(mel)?;
        for block in &self.res_in {
            x = block.forward_t(&x, train)?;
        }

        x = self.down1.forward(&x)?;
        x = self.down1_bn.forward_t(&x, train)?;
        x = x.relu()?;
        for block in &self.res_mid {
            x = block.forward_t(&x, train)?;
        }

        x = self.down2.forward(&x)?;
        for block in &self.res_out {
            x = block.forward_t(&x, train)?;
        }
        Ok(x)
    }
}
