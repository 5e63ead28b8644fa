//! Лексиконный beam-search декодер.
//!
//! Пошаговый движок: на каждом фрейме эмиссий расширяет живые гипотезы
//! переходами по префиксному дереву (новый токен, self-loop, blank),
//! складывает акустические, LM- и бонусные оценки, сливает дубликаты по
//! ключу `(lm_state, lex, token, prev_blank)` и удерживает не более
//! `beam_size` гипотез. Потоковое декодирование идёт чанками через
//! `decode_step`; `prune` ретроспективно фиксирует общий префикс и
//! освобождает старые фреймы.

use std::sync::Arc;

use tracing::debug;

use beam_core::{CriterionType, DecodeResult, DecoderOptions, Emissions, LanguageModel, Trie};

use crate::candidate::CandidateBuffer;
use crate::state::Hypothesis;

/// Служебные индексы алфавита, фиксируемые при создании декодера.
#[derive(Debug, Clone, Copy)]
pub struct SpecialTokens {
    /// Токен тишины.
    pub sil: i32,
    /// Blank (только CTC; для ASG не используется).
    pub blank: i32,
    /// Идентификатор неизвестного слова.
    pub unk: i32,
}

/// Лексиконный декодер CTC/ASG-эмиссий.
///
/// Один экземпляр — одно однопоточное декодирование; независимые
/// экземпляры могут работать параллельно, разделяя дерево через [`Arc`].
pub struct LexiconDecoder<L: LanguageModel> {
    options: DecoderOptions,
    trie: Arc<Trie>,
    lm: L,
    tokens: SpecialTokens,
    /// Матрица переходов токен×токен, row-major `[token, prev_token]`
    /// (только ASG; для CTC пустая).
    transitions: Vec<f32>,
    /// LM оценивает токены, а не слова.
    is_token_lm: bool,
    candidates: CandidateBuffer<L::State>,
    /// Beam на каждый относительный фрейм живого окна.
    hyp: Vec<Vec<Hypothesis<L::State>>>,
    n_decoded_frames: usize,
    n_pruned_frames: usize,
}

impl<L: LanguageModel> LexiconDecoder<L> {
    pub fn new(
        options: DecoderOptions,
        trie: Arc<Trie>,
        lm: L,
        tokens: SpecialTokens,
        transitions: Vec<f32>,
        is_token_lm: bool,
    ) -> Self {
        Self {
            options,
            trie,
            lm,
            tokens,
            transitions,
            is_token_lm,
            candidates: CandidateBuffer::new(),
            hyp: Vec::new(),
            n_decoded_frames: 0,
            n_pruned_frames: 0,
        }
    }

    /// Опции декодера.
    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Сбросить декодер и положить начальное состояние в фрейм 0.
    pub fn decode_begin(&mut self) {
        self.hyp.clear();
        self.hyp.push(vec![Hypothesis {
            lm_state: self.lm.start(false),
            lex: self.trie.root(),
            parent: None,
            score: 0.0,
            token: self.tokens.sil,
            word: -1,
            prev_blank: false,
        }]);
        self.n_decoded_frames = 0;
        self.n_pruned_frames = 0;
    }

    /// Продекодировать `t_total` фреймов эмиссий по `n` оценок на фрейм.
    ///
    /// `emissions` — row-major блок `[t_total × n]`; `n` должен совпадать
    /// с размером алфавита лексикона и LM.
    pub fn decode_step(&mut self, emissions: &[f32], t_total: usize, n: usize) {
        let start_frame = self.n_decoded_frames - self.n_pruned_frames;
        while self.hyp.len() < start_frame + t_total + 2 {
            self.hyp.push(Vec::new());
        }

        let root = self.trie.root();
        let top_tokens = self.options.beam_size_token.min(n);
        let mut idx: Vec<usize> = (0..n).collect();

        for t in 0..t_total {
            let frame = &emissions[t * n..(t + 1) * n];

            // Частичный top-K токенов фрейма. Порядок восстанавливается
            // заново на каждом фрейме, чтобы разбиение потока на чанки
            // не влияло на разрешение ничьих.
            for (i, v) in idx.iter_mut().enumerate() {
                *v = i;
            }
            if n > self.options.beam_size_token {
                pdqselect::select_by(&mut idx, self.options.beam_size_token, |&a, &b| {
                    frame[b].total_cmp(&frame[a])
                });
            }

            self.candidates.reset();
            let prev_beam = &self.hyp[start_frame + t];
            for (prev_slot, prev) in prev_beam.iter().enumerate() {
                let prev_lex = prev.lex;
                let prev_token = prev.token;
                let lex_max_score = if prev_lex == root {
                    0.0
                } else {
                    f64::from(self.trie.node(prev_lex).max_score)
                };

                // (1) Переходы к детям текущего узла по top-токенам.
                for &tok in idx.iter().take(top_tokens) {
                    let token = tok as i32;
                    let Some(&child) = self.trie.node(prev_lex).children.get(&token) else {
                        continue;
                    };
                    let child_node = self.trie.node(child);

                    let mut score = prev.score + f64::from(frame[tok]);
                    if self.n_decoded_frames + t > 0
                        && self.options.criterion == CriterionType::Asg
                    {
                        score += f64::from(self.transitions[tok * n + prev_token as usize]);
                    }
                    if token == self.tokens.sil {
                        score += self.options.sil_score;
                    }

                    let token_lm = if self.is_token_lm {
                        Some(self.lm.score(&prev.lm_state, token))
                    } else {
                        None
                    };

                    // Съесть новый токен — продолжить лексический префикс.
                    // Для CTC повтор токена требует разделителя-blank.
                    let can_extend = self.options.criterion != CriterionType::Ctc
                        || prev.prev_blank
                        || token != prev_token;
                    if can_extend && !child_node.children.is_empty() {
                        let (lm_state, lm_score) = match &token_lm {
                            Some((state, delta)) => (state.clone(), *delta),
                            // Словарная LM: прирост эвристики дерева,
                            // состояние LM не меняется до конца слова.
                            None => (
                                prev.lm_state.clone(),
                                f64::from(child_node.max_score) - lex_max_score,
                            ),
                        };
                        self.candidates.add(
                            self.options.beam_threshold,
                            Hypothesis {
                                lm_state,
                                lex: child,
                                parent: Some(prev_slot),
                                score: score + self.options.lm_weight * lm_score,
                                token,
                                word: -1,
                                prev_blank: false,
                            },
                        );
                    }

                    // Завершение настоящего слова: возврат в корень.
                    for &label in &child_node.labels {
                        let (lm_state, lm_score) = match &token_lm {
                            Some((state, delta)) => (state.clone(), *delta),
                            None => {
                                let (state, delta) = self.lm.score(&prev.lm_state, label);
                                (state, delta - lex_max_score)
                            }
                        };
                        self.candidates.add(
                            self.options.beam_threshold,
                            Hypothesis {
                                lm_state,
                                lex: root,
                                parent: Some(prev_slot),
                                score: score
                                    + self.options.lm_weight * lm_score
                                    + self.options.word_score,
                                token,
                                word: label,
                                prev_blank: false,
                            },
                        );
                    }

                    // Неизвестное слово: префикс без словарных меток.
                    if child_node.labels.is_empty()
                        && self.options.unk_score > f64::NEG_INFINITY
                    {
                        let (lm_state, lm_score) = match &token_lm {
                            Some((state, delta)) => (state.clone(), *delta),
                            None => {
                                let (state, delta) =
                                    self.lm.score(&prev.lm_state, self.tokens.unk);
                                (state, delta - lex_max_score)
                            }
                        };
                        self.candidates.add(
                            self.options.beam_threshold,
                            Hypothesis {
                                lm_state,
                                lex: root,
                                parent: Some(prev_slot),
                                score: score
                                    + self.options.lm_weight * lm_score
                                    + self.options.unk_score,
                                token,
                                word: self.tokens.unk,
                                prev_blank: false,
                            },
                        );
                    }
                }

                // (2) Self-loop: тот же узел дерева, тот же токен.
                if self.options.criterion != CriterionType::Ctc || !prev.prev_blank {
                    let tok = prev_token as usize;
                    let mut score = prev.score + f64::from(frame[tok]);
                    if self.n_decoded_frames + t > 0
                        && self.options.criterion == CriterionType::Asg
                    {
                        score += f64::from(self.transitions[tok * n + tok]);
                    }
                    if prev_token == self.tokens.sil {
                        score += self.options.sil_score;
                    }
                    self.candidates.add(
                        self.options.beam_threshold,
                        Hypothesis {
                            lm_state: prev.lm_state.clone(),
                            lex: prev_lex,
                            parent: Some(prev_slot),
                            score,
                            token: prev_token,
                            word: -1,
                            prev_blank: false,
                        },
                    );
                }

                // (3) Blank (только CTC).
                if self.options.criterion == CriterionType::Ctc {
                    let score = prev.score + f64::from(frame[self.tokens.blank as usize]);
                    self.candidates.add(
                        self.options.beam_threshold,
                        Hypothesis {
                            lm_state: prev.lm_state.clone(),
                            lex: prev_lex,
                            parent: Some(prev_slot),
                            score,
                            token: self.tokens.blank,
                            word: -1,
                            prev_blank: true,
                        },
                    );
                }
            }

            let next = start_frame + t + 1;
            self.candidates.store_into(
                &self.lm,
                self.options.beam_size,
                self.options.beam_threshold,
                self.options.log_add,
                &mut self.hyp[next],
                false,
            );

            // Хук кэша LM: раз на фрейм, после сохранения нового beam.
            let live: Vec<&L::State> = self.hyp[next].iter().map(|h| &h.lm_state).collect();
            self.lm.update_cache(&live);
        }

        self.n_decoded_frames += t_total;
        debug!(
            "decode_step: {} фреймов, в beam {} гипотез",
            t_total,
            self.hyp[start_frame + t_total].len()
        );
    }

    /// Завершить декодирование: терминальные кандидаты с оценкой конца
    /// предложения от LM.
    ///
    /// Если хоть одна гипотеза стоит на границе слова (в корне дерева),
    /// завершаются только такие; иначе — все.
    pub fn decode_end(&mut self) {
        let last = self.n_decoded_frames - self.n_pruned_frames;
        while self.hyp.len() < last + 2 {
            self.hyp.push(Vec::new());
        }

        self.candidates.reset();
        let root = self.trie.root();
        let has_nice_ending = self.hyp[last].iter().any(|h| h.lex == root);
        for (prev_slot, prev) in self.hyp[last].iter().enumerate() {
            if !has_nice_ending || prev.lex == root {
                let (lm_state, lm_score) = self.lm.finish(&prev.lm_state);
                self.candidates.add(
                    self.options.beam_threshold,
                    Hypothesis {
                        lm_state,
                        lex: prev.lex,
                        parent: Some(prev_slot),
                        score: prev.score + self.options.lm_weight * lm_score,
                        token: self.tokens.sil,
                        word: -1,
                        prev_blank: false,
                    },
                );
            }
        }

        self.candidates.store_into(
            &self.lm,
            self.options.beam_size,
            self.options.beam_threshold,
            self.options.log_add,
            &mut self.hyp[last + 1],
            true,
        );
        self.n_decoded_frames += 1;
    }

    /// Полное декодирование блока эмиссий: begin → step → end.
    ///
    /// Возвращает все финальные гипотезы, лучшая первой.
    pub fn decode(&mut self, emissions: &Emissions) -> Vec<DecodeResult> {
        self.decode_begin();
        self.decode_step(emissions.data(), emissions.frames(), emissions.tokens());
        self.decode_end();
        self.get_all_final_hypothesis()
    }

    /// Зафиксировать фреймы старше `n_decoded_frames − look_back`.
    ///
    /// Живое окно переезжает в начало буфера, обратные ссылки обрываются
    /// на фрейме фиксации, а из всех оценок вычитается лучшая оценка этого
    /// фрейма — ранжирование не меняется, но в длинных потоках оценки
    /// остаются ограниченными.
    pub fn prune(&mut self, look_back: usize) {
        let window = self.n_decoded_frames - self.n_pruned_frames;
        if window < look_back + 1 {
            return; // недостаточно фреймов
        }
        if self.find_best_ancestor(look_back).is_none() {
            return;
        }
        let start = window - look_back;
        if start < 1 {
            return;
        }

        // Фреймы переезжают целиком, слоты родителей остаются валидными.
        for i in 0..=look_back {
            self.hyp.swap(i, start + i);
        }
        self.hyp.truncate(look_back + 1);

        for h in &mut self.hyp[0] {
            h.parent = None;
        }

        let committed = self.hyp[0]
            .iter()
            .map(|h| h.score)
            .fold(f64::NEG_INFINITY, f64::max);
        for beam in &mut self.hyp {
            for h in beam {
                h.score -= committed;
            }
        }

        self.n_pruned_frames = self.n_decoded_frames - look_back;
        debug!(
            "prune: окно {} фреймов, нормализация на {:.3}",
            look_back + 1,
            committed
        );
    }

    /// Лучшая гипотеза, извлечённая на `look_back` фреймов назад от конца.
    pub fn get_best_hypothesis(&self, look_back: usize) -> DecodeResult {
        let window = self.n_decoded_frames - self.n_pruned_frames;
        if window < look_back + 1 {
            return DecodeResult::default();
        }
        match self.find_best_ancestor(look_back) {
            Some((frame, slot)) => self.hypothesis_at(frame, slot),
            None => DecodeResult::default(),
        }
    }

    /// Все финальные гипотезы последнего beam.
    pub fn get_all_final_hypothesis(&self) -> Vec<DecodeResult> {
        let last = self.n_decoded_frames - self.n_pruned_frames;
        if last < 1 {
            return Vec::new();
        }
        let beam = match self.hyp.get(last) {
            Some(beam) => beam,
            None => return Vec::new(),
        };
        (0..beam.len())
            .map(|slot| self.hypothesis_at(last, slot))
            .collect()
    }

    /// Количество гипотез в последнем beam.
    pub fn n_hypothesis(&self) -> usize {
        let last = self.n_decoded_frames - self.n_pruned_frames;
        self.hyp.get(last).map_or(0, Vec::len)
    }

    /// Количество фреймов в живом окне буфера.
    pub fn n_decoded_frames_in_buffer(&self) -> usize {
        self.n_decoded_frames - self.n_pruned_frames + 1
    }

    /// Предок лучшей живой гипотезы на `look_back` фреймов назад.
    ///
    /// `None`, если beam пуст или цепочка родителей короче `look_back`.
    fn find_best_ancestor(&self, look_back: usize) -> Option<(usize, usize)> {
        let last = self.n_decoded_frames - self.n_pruned_frames;
        let beam = self.hyp.get(last)?;
        if beam.is_empty() {
            return None;
        }
        let mut slot = 0;
        for (i, h) in beam.iter().enumerate().skip(1) {
            if h.score > beam[slot].score {
                slot = i;
            }
        }
        let mut frame = last;
        for _ in 0..look_back {
            slot = self.hyp[frame][slot].parent?;
            frame -= 1;
        }
        Some((frame, slot))
    }

    /// Восстановить результат обратным проходом по ссылкам родителей.
    fn hypothesis_at(&self, frame: usize, slot: usize) -> DecodeResult {
        let mut result = DecodeResult::with_frames(frame + 1);
        result.score = self.hyp[frame][slot].score;

        let mut cursor = Some((frame, slot));
        let mut depth = 0;
        while let Some((f, s)) = cursor {
            let node = &self.hyp[f][s];
            result.tokens[frame - depth] = node.token;
            result.words[frame - depth] = node.word;
            let parent_score = node.parent.map_or(0.0, |p| self.hyp[f - 1][p].score);
            result.frame_scores[frame - depth] = node.score - parent_score;
            cursor = node.parent.map(|p| (f - 1, p));
            depth += 1;
        }
        result
    }
}
