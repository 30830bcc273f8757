//! Построение секционированной attention-маски.
//!
//! Маска объединяет два режима в одном forward pass:
//! - аудио-секция (позиции `< partition`) — двунаправленный attention внутри
//!   себя, текст ей не виден;
//! - текст-секция (позиции `>= partition`) — видит всю аудио-секцию плюс
//!   каузально-предшествующие текстовые позиции (включая себя).
//!
//! Маска аддитивная: 0 для разрешённых пар, `-inf` для запрещённых —
//! прибавляется к attention-логитам до softmax.

use candle_core::{Device, Result, Tensor};

/// Построить аддитивную маску `[seq_len, seq_len]`.
///
/// Пара `(i, j)` разрешена, когда `(i < p && j < p) || j <= i`.
pub fn partitioned_attention_mask(
    seq_len: usize,
    partition: usize,
    device: &Device,
) -> Result<Tensor> {
    let mut data = vec![0f32; seq_len * seq_len];
    for i in 0..seq_len {
        for j in 0..seq_len {
            let within_audio = i < partition && j < partition;
            if !(within_audio || j <= i) {
                data[i * seq_len + j] = f32::NEG_INFINITY;
            }
        }
    }
    Tensor::from_vec(data, (seq_len, seq_len), device)
}
