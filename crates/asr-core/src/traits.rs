//! Контракт секционированного трансформера.
//!
//! Модель GptAsr не реализует attention самостоятельно — она получает
//! трансформер как внедряемую зависимость. Любая замена обязана соблюдать
//! инвариант секционирования: первые `partition()` позиций последовательности
//! (аудио) обслуживаются двунаправленным attention, остальные (текст) —
//! каузальным, и всё это за один forward pass.

use candle_core::Tensor;

/// Трансформер над объединённой аудио/текст-последовательностью.
///
/// # Пример
/// ```ignore
/// let enc = transformer.forward_t(&embeddings, false)?;
/// assert_eq!(enc.dims(), embeddings.dims());
/// ```
pub trait SequenceTransformer: Send {
    /// Максимальная длина последовательности, на которую рассчитан трансформер.
    fn sequence_length(&self) -> usize;

    /// Индекс секционирования: позиции `< partition` — аудио (двунаправленный
    /// attention), позиции `>= partition` — текст (каузальный attention).
    fn partition(&self) -> usize;

    /// Прогнать эмбеддинги `[batch, seq, dim]` через стек слоёв.
    ///
    /// Форма выхода совпадает с формой входа. Длина `seq` может быть меньше
    /// [`Self::sequence_length`] (при инференсе текстовый хвост растёт
    /// пошагово), но не больше.
    fn forward_t(&self, embeddings: &Tensor, train: bool) -> candle_core::Result<Tensor>;
}
