//! Слои трансформера: multi-head attention, feed-forward, pre-norm блок.

use candle_core::{Result, Tensor};
use candle_nn::{layer_norm, linear, Dropout, LayerNorm, Linear, Module, VarBuilder};

use crate::config::{TransformerConfig, FF_MULT};

const LAYER_NORM_EPS: f64 = 1e-5;

// ============================================================================
// Multi-head attention
// ============================================================================

/// Multi-head self-attention с аддитивной маской.
#[derive(Debug, Clone)]
pub struct MultiHeadAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    o_proj: Linear,
    heads: usize,
    head_dim: usize,
    dropout: Dropout,
}

impl MultiHeadAttention {
    pub fn new(config: &TransformerConfig, vb: VarBuilder) -> Result<Self> {
        let dim = config.dim;
        let q_proj = linear(dim, dim, vb.pp("q_proj"))?;
        let k_proj = linear(dim, dim, vb.pp("k_proj"))?;
        let v_proj = linear(dim, dim, vb.pp("v_proj"))?;
        let o_proj = linear(dim, dim, vb.pp("o_proj"))?;

        Ok(Self {
            q_proj,
            k_proj,
            v_proj,
            o_proj,
            heads: config.heads,
            head_dim: config.head_dim(),
            dropout: Dropout::new(config.attn_dropout),
        })
    }

    /// Attention по входу `[batch, seq, dim]` с маской `[seq, seq]`.
    pub fn forward_t(&self, x: &Tensor, mask: &Tensor, train: bool) -> Result<Tensor> {
        let (batch_size, seq_len, _) = x.dims3()?;

        let q = self.q_proj.forward(x)?;
        let k = self.k_proj.forward(x)?;
        let v = self.v_proj.forward(x)?;

        // [batch, seq, dim] -> [batch, heads, seq, head_dim]
        let q = q
            .reshape((batch_size, seq_len, self.heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let k = k
            .reshape((batch_size, seq_len, self.heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let v = v
            .reshape((batch_size, seq_len, self.heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;

        let scale = (self.head_dim as f64).sqrt();
        let attn = (q.matmul(&k.transpose(2, 3)?)? / scale)?;

        // Маска транслируется на [batch, heads, seq, seq].
        let attn = attn.broadcast_add(mask)?;
        let attn = candle_nn::ops::softmax_last_dim(&attn)?;
        let attn = self.dropout.forward(&attn, train)?;

        let out = attn.matmul(&v)?;
        let out = out
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch_size, seq_len, self.heads * self.head_dim))?;

        self.o_proj.forward(&out)
    }
}

// ============================================================================
// Feed-forward
// ============================================================================

/// Позиционно-независимый feed-forward блок: linear -> GELU -> linear.
#[derive(Debug, Clone)]
pub struct FeedForward {
    fc1: Linear,
    fc2: Linear,
    dropout: Dropout,
}

impl FeedForward {
    pub fn new(config: &TransformerConfig, vb: VarBuilder) -> Result<Self> {
        let inner = config.dim * FF_MULT;
        let fc1 = linear(config.dim, inner, vb.pp("fc1"))?;
        let fc2 = linear(inner, config.dim, vb.pp("fc2"))?;
        Ok(Self {
            fc1,
            fc2,
            dropout: Dropout::new(config.ff_dropout),
        })
    }

    pub fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let x = self.fc1.forward(x)?.gelu()?;
        let x = self.dropout.forward(&x, train)?;
        self.fc2.forward(&x)
    }
}

// ============================================================================
// Pre-norm блок
// ============================================================================

/// Один слой трансформера: pre-norm attention + pre-norm feed-forward,
/// оба с residual-связью.
#[derive(Debug, Clone)]
pub struct TransformerLayer {
    attn_norm: LayerNorm,
    attn: MultiHeadAttention,
    ff_norm: LayerNorm,
    ff: FeedForward,
}

impl TransformerLayer {
    pub fn new(config: &TransformerConfig, vb: VarBuilder) -> Result<Self> {
        let attn_norm = layer_norm(config.dim, LAYER_NORM_EPS, vb.pp("attn_norm"))?;
        let attn = MultiHeadAttention::new(config, vb.pp("attn"))?;
        let ff_norm = layer_norm(config.dim, LAYER_NORM_EPS, vb.pp("ff_norm"))?;
        let ff = FeedForward::new(config, vb.pp("ff"))?;
        Ok(Self {
            attn_norm,
            attn,
            ff_norm,
            ff,
        })
    }

    pub fn forward_t(&self, x: &Tensor, mask: &Tensor, train: bool) -> Result<Tensor> {
        let residual = x;
        let h = self.attn.forward_t(&self.attn_norm.forward(x)?, mask, train)?;
        let x = (residual + h)?;

        let residual = &x;
        let h = self.ff.forward_t(&self.ff_norm.forward(&x)?, train)?;
        residual + h
    }
}
