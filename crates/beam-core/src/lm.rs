//! Интерфейс внешней языковой модели.
//!
//! Декодер видит LM как источник непрозрачных состояний с пошаговыми
//! запросами. Состояния обязаны допускать полный порядок ([`LanguageModel::compare`]):
//! он нужен шагу слияния гипотез.

use std::cmp::Ordering;

/// Адаптер внешней языковой модели.
///
/// # Пример
/// ```ignore
/// let (state, delta) = lm.score(&prev_state, word_id);
/// let (_, finish_delta) = lm.finish(&state);
/// ```
pub trait LanguageModel {
    /// Непрозрачное состояние контекста LM.
    type State: Clone;

    /// Начальное состояние. `with_nothing` — стартовать без контекста
    /// начала предложения.
    fn start(&mut self, with_nothing: bool) -> Self::State;

    /// Оценить токен или слово из данного состояния.
    ///
    /// Возвращает новое состояние и дельту log-оценки.
    fn score(&mut self, state: &Self::State, token_or_word: i32) -> (Self::State, f64);

    /// Завершить последовательность (оценка конца предложения).
    fn finish(&mut self, state: &Self::State) -> (Self::State, f64);

    /// Полный порядок на состояниях; `Equal` — состояния эквивалентны
    /// для декодирования и подлежат слиянию.
    fn compare(&self, a: &Self::State, b: &Self::State) -> Ordering;

    /// Хук кэша: вызывается ровно раз на фрейм со списком состояний,
    /// на которые ссылается выживший beam. Адаптер может выбросить
    /// записи, не попавшие в список.
    fn update_cache(&mut self, _live_states: &[&Self::State]) {}
}

/// Тривиальная LM: каждая дельта равна нулю, состояние единично.
///
/// Используется для декодирования только по лексикону и в тестах.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroLm;

impl LanguageModel for ZeroLm {
    type State = ();

    fn start(&mut self, _with_nothing: bool) -> Self::State {}

    fn score(&mut self, _state: &Self::State, _token_or_word: i32) -> (Self::State, f64) {
        ((), 0.0)
    }

    fn finish(&mut self, _state: &Self::State) -> (Self::State, f64) {
        ((), 0.0)
    }

    fn compare(&self, _a: &Self::State, _b: &Self::State) -> Ordering {
        Ordering::Equal
    }
}
