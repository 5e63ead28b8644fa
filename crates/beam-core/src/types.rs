//! Общие типы данных декодера: эмиссии и результаты.

use candle_core::{DType, Tensor};

use crate::error::{BeamError, BeamResult};

// ---------------------------------------------------------------------------
// Эмиссии
// ---------------------------------------------------------------------------

/// Блок эмиссий акустической модели.
///
/// Row-major матрица `[frames × tokens]` из log-оценок: `frame(t)[n]` —
/// оценка токена `n` на фрейме `t`.
#[derive(Debug, Clone)]
pub struct Emissions {
    data: Vec<f32>,
    frames: usize,
    tokens: usize,
}

impl Emissions {
    /// Создать блок из готового буфера.
    pub fn new(data: Vec<f32>, frames: usize, tokens: usize) -> BeamResult<Self> {
        if data.len() != frames * tokens {
            return Err(BeamError::Emissions(format!(
                "ожидалось {} значений ({}×{}), получено {}",
                frames * tokens,
                frames,
                tokens,
                data.len()
            )));
        }
        Ok(Self {
            data,
            frames,
            tokens,
        })
    }

    /// Построить из тензора log-вероятностей формы `[frames, tokens]`.
    pub fn from_tensor(log_probs: &Tensor) -> BeamResult<Self> {
        let (frames, tokens) = log_probs.dims2()?;
        let rows: Vec<Vec<f32>> = log_probs.to_dtype(DType::F32)?.to_vec2()?;
        let data: Vec<f32> = rows.into_iter().flatten().collect();
        Ok(Self {
            data,
            frames,
            tokens,
        })
    }

    /// Количество фреймов.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Размер алфавита токенов.
    pub fn tokens(&self) -> usize {
        self.tokens
    }

    /// Весь буфер (row-major).
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Оценки одного фрейма.
    pub fn frame(&self, t: usize) -> &[f32] {
        &self.data[t * self.tokens..(t + 1) * self.tokens]
    }
}

// ---------------------------------------------------------------------------
// Результат декодирования
// ---------------------------------------------------------------------------

/// Одна декодированная гипотеза.
///
/// Все векторы параллельны и покрывают фреймы живого окна, включая
/// начальное состояние и терминальный фрейм `decode_end`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeResult {
    /// Полная накопленная log-оценка.
    pub score: f64,

    /// Токен на каждом фрейме.
    pub tokens: Vec<i32>,

    /// Идентификатор слова на каждом фрейме (−1 — слова нет).
    pub words: Vec<i32>,

    /// Вклад каждого фрейма в оценку (разность с родителем).
    pub frame_scores: Vec<f64>,
}

impl DecodeResult {
    /// Пустой результат на `len` фреймов (токены и слова −1, вклады 0).
    pub fn with_frames(len: usize) -> Self {
        Self {
            score: 0.0,
            tokens: vec![-1; len],
            words: vec![-1; len],
            frame_scores: vec![0.0; len],
        }
    }

    /// Токены без blank и подряд идущих повторов (CTC-схлопывание).
    pub fn reduced_tokens(&self, blank: i32) -> Vec<i32> {
        let mut out = Vec::new();
        let mut last = blank;
        for &tok in &self.tokens {
            if tok != last && tok != blank && tok >= 0 {
                out.push(tok);
            }
            last = tok;
        }
        out
    }

    /// Только реально выпущенные слова (без −1).
    pub fn emitted_words(&self) -> Vec<i32> {
        self.words.iter().copied().filter(|&w| w >= 0).collect()
    }
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    #[test]
    fn test_emissions_shape_checked() {
        assert!(Emissions::new(vec![0.0; 6], 2, 3).is_ok());
        assert!(Emissions::new(vec![0.0; 5], 2, 3).is_err());
    }

    #[test]
    fn test_emissions_frame_slice() {
        let e = Emissions::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        assert_eq!(e.frame(0), &[1.0, 2.0, 3.0]);
        assert_eq!(e.frame(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_emissions_from_tensor() {
        let tensor =
            Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3), &Device::Cpu).unwrap();
        let e = Emissions::from_tensor(&tensor).unwrap();
        assert_eq!(e.frames(), 2);
        assert_eq!(e.tokens(), 3);
        assert_eq!(e.frame(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_reduced_tokens_collapses_repeats() {
        let result = DecodeResult {
            score: 0.0,
            tokens: vec![2, 0, 0, 3, 0, 1, 1, 3],
            words: vec![-1; 8],
            frame_scores: vec![0.0; 8],
        };
        // повтор `0` без blank схлопывается, после blank — нет
        assert_eq!(result.reduced_tokens(3), vec![2, 0, 0, 1]);
    }

    #[test]
    fn test_emitted_words_skips_sentinels() {
        let result = DecodeResult {
            score: 0.0,
            tokens: vec![-1; 4],
            words: vec![-1, 7, -1, 2],
            frame_scores: vec![0.0; 4],
        };
        assert_eq!(result.emitted_words(), vec![7, 2]);
    }
}
