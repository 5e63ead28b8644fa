//! Буфер кандидатов одного фрейма.
//!
//! Владеет свежесгенерированными гипотезами и параллельным списком
//! индексов, по которому идут прореживание, сортировка и слияние —
//! сами гипотезы при этом не копируются. Буфер переиспользуется между
//! фреймами: `reset` чистит содержимое, сохраняя аллокации.

use std::cmp::Ordering;

use beam_core::LanguageModel;

use crate::state::{cmp_dedup_key, merge_scores, Hypothesis};

/// Скретч-буфер кандидатов на переходе между фреймами.
pub struct CandidateBuffer<S> {
    candidates: Vec<Hypothesis<S>>,
    ptrs: Vec<usize>,
    best_score: f64,
}

impl<S: Clone> CandidateBuffer<S> {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
            ptrs: Vec::new(),
            best_score: f64::NEG_INFINITY,
        }
    }

    /// Очистить буфер перед новым фреймом.
    pub fn reset(&mut self) {
        self.candidates.clear();
        self.ptrs.clear();
        self.best_score = f64::NEG_INFINITY;
    }

    /// Лучшая оценка среди добавленных кандидатов.
    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    /// Добавить кандидата, если он проходит порог относительно лучшего.
    pub fn add(&mut self, beam_threshold: f64, hyp: Hypothesis<S>) {
        if hyp.score >= self.best_score - beam_threshold {
            if hyp.score > self.best_score {
                self.best_score = hyp.score;
            }
            self.candidates.push(hyp);
        }
    }

    /// Прореживание, слияние дубликатов и top-K в beam следующего фрейма.
    ///
    /// Полная сортировка результата нужна только финальному beam
    /// (`return_sorted`), промежуточным хватает неупорядоченного top-K.
    pub fn store_into<L>(
        &mut self,
        lm: &L,
        beam_size: usize,
        beam_threshold: f64,
        use_log_add: bool,
        next_beam: &mut Vec<Hypothesis<S>>,
        return_sorted: bool,
    ) where
        L: LanguageModel<State = S>,
    {
        next_beam.clear();
        if self.candidates.is_empty() {
            return;
        }

        let Self {
            candidates,
            ptrs,
            best_score,
        } = self;
        let cutoff = *best_score - beam_threshold;

        // Отбор кандидатов, оставшихся над итоговым порогом.
        ptrs.clear();
        for (i, c) in candidates.iter().enumerate() {
            if c.score >= cutoff {
                ptrs.push(i);
            }
        }

        // Сортировка по ключу дедупликации; равные ключи — по убыванию
        // оценки, чтобы представителем серии стал лучший кандидат.
        ptrs.sort_unstable_by(|&a, &b| {
            cmp_dedup_key(lm, &candidates[a], &candidates[b])
                .then_with(|| candidates[b].score.total_cmp(&candidates[a].score))
        });

        // Слияние подряд идущих дубликатов в представителя серии.
        let mut n_merged = 1;
        for i in 1..ptrs.len() {
            let cur = ptrs[i];
            let kept = ptrs[n_merged - 1];
            if cmp_dedup_key(lm, &candidates[cur], &candidates[kept]) != Ordering::Equal {
                ptrs[n_merged] = cur;
                n_merged += 1;
            } else {
                candidates[kept].score =
                    merge_scores(candidates[kept].score, candidates[cur].score, use_log_add);
            }
        }
        ptrs.truncate(n_merged);

        // Top-K по оценке.
        if ptrs.len() > beam_size {
            pdqselect::select_by(ptrs, beam_size, |&a, &b| {
                candidates[b].score.total_cmp(&candidates[a].score)
            });
            ptrs.truncate(beam_size);
        }
        if return_sorted {
            ptrs.sort_unstable_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score));
        }

        next_beam.extend(ptrs.iter().map(|&p| candidates[p].clone()));
    }
}

impl<S: Clone> Default for CandidateBuffer<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use beam_core::ZeroLm;

    use super::*;

    fn hyp(score: f64, lex: usize, token: i32) -> Hypothesis<()> {
        Hypothesis {
            lm_state: (),
            lex,
            parent: None,
            score,
            token,
            word: -1,
            prev_blank: false,
        }
    }

    fn store(buffer: &mut CandidateBuffer<()>, beam_size: usize, log_add: bool) -> Vec<Hypothesis<()>> {
        let mut beam = Vec::new();
        buffer.store_into(&ZeroLm, beam_size, 5.0, log_add, &mut beam, true);
        beam
    }

    #[test]
    fn test_add_gates_on_running_best() {
        let mut buffer = CandidateBuffer::new();
        buffer.add(5.0, hyp(0.0, 1, 0));
        buffer.add(5.0, hyp(10.0, 2, 1));
        assert_eq!(buffer.best_score(), 10.0);
        // уже ниже порога после появления лучшего
        buffer.add(5.0, hyp(4.9, 3, 2));
        let beam = store(&mut buffer, 10, false);
        // кандидат с 0.0 прошёл при добавлении, но выпал на итоговом отборе
        assert_eq!(beam.len(), 1);
        assert_eq!(beam[0].score, 10.0);
    }

    #[test]
    fn test_duplicates_merge_log_add() {
        let mut buffer = CandidateBuffer::new();
        buffer.add(5.0, hyp(-3.0, 1, 0));
        buffer.add(5.0, hyp(-4.0, 1, 0));
        let beam = store(&mut buffer, 10, true);
        assert_eq!(beam.len(), 1);
        assert!((beam[0].score - (-2.686_738_3)).abs() < 1e-6);
    }

    #[test]
    fn test_duplicates_merge_keeps_best_representative() {
        let mut buffer = CandidateBuffer::new();
        let mut worse = hyp(-4.0, 1, 0);
        worse.word = 8;
        let mut better = hyp(-3.0, 1, 0);
        better.word = 9;
        buffer.add(5.0, worse);
        buffer.add(5.0, better);
        let beam = store(&mut buffer, 10, false);
        assert_eq!(beam.len(), 1);
        assert_eq!(beam[0].score, -3.0);
        // поля представителя (лучшего) не трогаются при слиянии
        assert_eq!(beam[0].word, 9);
    }

    #[test]
    fn test_top_k_bounds_beam() {
        let mut buffer = CandidateBuffer::new();
        for i in 0..10 {
            buffer.add(100.0, hyp(f64::from(i), 1, i));
        }
        let mut beam = Vec::new();
        buffer.store_into(&ZeroLm, 3, 100.0, false, &mut beam, true);
        let scores: Vec<f64> = beam.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![9.0, 8.0, 7.0]);
    }

    #[test]
    fn test_empty_buffer_clears_next_beam() {
        let mut buffer: CandidateBuffer<()> = CandidateBuffer::new();
        let mut beam = vec![hyp(1.0, 1, 0)];
        buffer.store_into(&ZeroLm, 3, 100.0, false, &mut beam, false);
        assert!(beam.is_empty());
    }
}
