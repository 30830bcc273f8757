//! Общие типы для модели и декодирования.
//!
//! Содержит структуры данных, разделяемые крейтами workspace: буферы
//! фиксированной ёмкости, гипотезы beam search и маску валидных длин.

use candle_core::{Device, Tensor};

use crate::error::{AsrError, AsrResult};

/// Зарезервированный pad-токен. Совмещает роль конца последовательности.
pub const PAD_TOKEN: u32 = 0;

// ---------------------------------------------------------------------------
// Буфер фиксированной ёмкости
// ---------------------------------------------------------------------------

/// Тензор, дополненный нулями до фиксированной ёмкости по одной оси,
/// с явным счётчиком реально заполненных позиций.
///
/// Attention-маска модели не исключает дополненные позиции из вычислений
/// (поведение исходной системы сохранено); `valid_len` фиксирует границу
/// для потребителей, которым она нужна.
#[derive(Debug, Clone)]
pub struct PaddedSequence {
    tensor: Tensor,
    valid_len: usize,
    capacity: usize,
}

impl PaddedSequence {
    /// Дополнить `tensor` нулями по оси `dim` до ёмкости `capacity`.
    ///
    /// # Ошибки
    /// `AsrError::Config`, если последовательность длиннее ёмкости —
    /// это фатальная ошибка конфигурации, а не повод для усечения.
    pub fn new(tensor: Tensor, dim: usize, capacity: usize) -> AsrResult<Self> {
        let valid_len = tensor.dim(dim)?;
        let pad = capacity.checked_sub(valid_len).ok_or_else(|| {
            AsrError::Config(format!(
                "sequence of length {valid_len} does not fit fixed capacity {capacity} (dim {dim})"
            ))
        })?;
        let tensor = if pad > 0 {
            tensor.pad_with_zeros(dim, 0, pad)?
        } else {
            tensor
        };
        Ok(Self {
            tensor,
            valid_len,
            capacity,
        })
    }

    /// Дополненный тензор (длина по оси равна ёмкости).
    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    /// Забрать тензор, потребляя буфер.
    pub fn into_tensor(self) -> Tensor {
        self.tensor
    }

    /// Количество реально заполненных позиций.
    pub fn valid_len(&self) -> usize {
        self.valid_len
    }

    /// Фиксированная ёмкость буфера.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Гипотеза beam search
// ---------------------------------------------------------------------------

/// Одна гипотеза beam search: накопленная последовательность токенов и
/// кумулятивная вероятность (произведение вероятностей выбранных шагов).
#[derive(Debug, Clone)]
pub struct BeamHypothesis {
    /// Токены гипотезы. Первый элемент — start-токен.
    pub tokens: Vec<u32>,

    /// Кумулятивная вероятность гипотезы.
    pub probability: f32,
}

impl BeamHypothesis {
    /// Начальная гипотеза из одного start-токена.
    pub fn start(start_token: u32) -> Self {
        Self {
            tokens: vec![start_token],
            probability: 1.0,
        }
    }

    /// Содержит ли гипотеза pad-токен (признак завершения).
    pub fn finished(&self) -> bool {
        self.tokens.iter().any(|&t| t == PAD_TOKEN)
    }

    /// Текстовые токены: без начального start-токена, до первого pad.
    ///
    /// Всё после первого pad — артефакт достройки гипотез, уже содержащих
    /// pad, пока остальные лучи не завершились.
    pub fn text_tokens(&self) -> &[u32] {
        let body = match self.tokens.split_first() {
            Some((_, rest)) => rest,
            None => return &[],
        };
        match body.iter().position(|&t| t == PAD_TOKEN) {
            Some(end) => &body[..end],
            None => body,
        }
    }
}

// ---------------------------------------------------------------------------
// Маска валидных длин
// ---------------------------------------------------------------------------

/// Построить маску валидных позиций по длинам последовательностей.
///
/// Возвращает тензор `[batch, max_len]` типа `u8`: 1 для позиций `< length`,
/// 0 для дополнения. Утилита объявлена для внешних потребителей
/// (батчевание/лоссы); ядро модели её не использует.
pub fn mask_from_lengths(lengths: &[usize], max_len: usize, device: &Device) -> AsrResult<Tensor> {
    for &len in lengths {
        if len > max_len {
            return Err(AsrError::Shape(format!(
                "length {len} exceeds max_len {max_len}"
            )));
        }
    }
    let mut data = Vec::with_capacity(lengths.len() * max_len);
    for &len in lengths {
        for pos in 0..max_len {
            data.push(u8::from(pos < len));
        }
    }
    Ok(Tensor::from_vec(data, (lengths.len(), max_len), device)?)
}
