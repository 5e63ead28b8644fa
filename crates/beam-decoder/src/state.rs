//! Состояние гипотезы beam-search.

use std::cmp::Ordering;

use beam_core::{log_add, LanguageModel, TrieNodeId};

/// Частичная гипотеза, завершающаяся на некотором фрейме.
///
/// Ссылка на родителя — слот в beam непосредственно предыдущего фрейма.
/// Фреймы хранит декодер и переносит целиком при компактации, поэтому
/// слоты переживают `prune`.
#[derive(Debug, Clone)]
pub struct Hypothesis<S> {
    /// Состояние языковой модели.
    pub lm_state: S,
    /// Текущий узел префиксного дерева (лексический префикс).
    pub lex: TrieNodeId,
    /// Слот родителя в beam предыдущего фрейма.
    pub parent: Option<usize>,
    /// Накопленная log-оценка: акустика + LM + бонусы.
    pub score: f64,
    /// Токен, которым достигнуто состояние.
    pub token: i32,
    /// Только что завершённое слово (−1 — нет).
    pub word: i32,
    /// Последний переход был по blank (только CTC).
    pub prev_blank: bool,
}

/// Сравнение по ключу дедупликации `(lm_state, lex, token, prev_blank)`.
///
/// Гипотезы, равные по этому ключу, представляют один продолжаемый
/// контекст и подлежат слиянию.
pub fn cmp_dedup_key<L: LanguageModel>(
    lm: &L,
    a: &Hypothesis<L::State>,
    b: &Hypothesis<L::State>,
) -> Ordering {
    lm.compare(&a.lm_state, &b.lm_state)
        .then_with(|| a.lex.cmp(&b.lex))
        .then_with(|| a.token.cmp(&b.token))
        .then_with(|| a.prev_blank.cmp(&b.prev_blank))
}

/// Слияние оценок двух гипотез с одинаковым ключом дедупликации.
pub fn merge_scores(a: f64, b: f64, use_log_add: bool) -> f64 {
    if use_log_add {
        log_add(a, b)
    } else {
        a.max(b)
    }
}

#[cfg(test)]
mod tests {
    use beam_core::ZeroLm;

    use super::*;

    fn hyp(lex: TrieNodeId, token: i32, prev_blank: bool) -> Hypothesis<()> {
        Hypothesis {
            lm_state: (),
            lex,
            parent: None,
            score: 0.0,
            token,
            word: -1,
            prev_blank,
        }
    }

    #[test]
    fn test_dedup_key_ignores_score_and_parent() {
        let lm = ZeroLm;
        let mut a = hyp(1, 0, false);
        let mut b = hyp(1, 0, false);
        a.score = -3.0;
        b.score = -40.0;
        b.parent = Some(5);
        assert_eq!(cmp_dedup_key(&lm, &a, &b), Ordering::Equal);
    }

    #[test]
    fn test_dedup_key_distinguishes_fields() {
        let lm = ZeroLm;
        let base = hyp(1, 0, false);
        assert_ne!(cmp_dedup_key(&lm, &base, &hyp(2, 0, false)), Ordering::Equal);
        assert_ne!(cmp_dedup_key(&lm, &base, &hyp(1, 3, false)), Ordering::Equal);
        assert_ne!(cmp_dedup_key(&lm, &base, &hyp(1, 0, true)), Ordering::Equal);
    }

    #[test]
    fn test_merge_scores_max_and_log_add() {
        assert_eq!(merge_scores(-3.0, -4.0, false), -3.0);
        let merged = merge_scores(-3.0, -4.0, true);
        assert!((merged - (-2.686_738_3)).abs() < 1e-6);
    }
}
