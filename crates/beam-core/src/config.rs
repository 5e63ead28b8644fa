//! Конфигурация beam-search декодера.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BeamError, BeamResult};

/// Критерий акустической модели.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriterionType {
    /// CTC: повторы токена схлопываются, если не разделены blank.
    Ctc,
    /// ASG: явные веса переходов токен→токен, без blank.
    Asg,
}

impl CriterionType {
    /// Строковый идентификатор.
    pub fn as_str(&self) -> &'static str {
        match self {
            CriterionType::Ctc => "ctc",
            CriterionType::Asg => "asg",
        }
    }
}

impl fmt::Display for CriterionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Опции лексиконного декодера.
///
/// Все оценки — натуральные логарифмы; бонусы аддитивные.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderOptions {
    /// Максимум гипотез в beam одного фрейма после слияния.
    pub beam_size: usize,

    /// Максимум токенов, рассматриваемых на каждую гипотезу за фрейм.
    pub beam_size_token: usize,

    /// Кандидаты с оценкой ниже `best − beam_threshold` отбрасываются.
    pub beam_threshold: f64,

    /// Вес дельт языковой модели.
    pub lm_weight: f64,

    /// Бонус за завершение слова из лексикона.
    pub word_score: f64,

    /// Бонус за выпуск неизвестного слова; `-inf` подавляет unk-выход.
    pub unk_score: f64,

    /// Бонус за токен тишины.
    pub sil_score: f64,

    /// Слияние дубликатов: log-sum-exp (`true`) или максимум (`false`).
    pub log_add: bool,

    /// Критерий модели.
    pub criterion: CriterionType,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            beam_size: 100,
            beam_size_token: 50,
            beam_threshold: 25.0,
            lm_weight: 1.0,
            word_score: 0.0,
            unk_score: f64::NEG_INFINITY,
            sil_score: 0.0,
            log_add: false,
            criterion: CriterionType::Ctc,
        }
    }
}

impl DecoderOptions {
    /// Задать размер beam.
    pub fn with_beam_size(mut self, beam_size: usize) -> Self {
        self.beam_size = beam_size;
        self
    }

    /// Задать вес языковой модели.
    pub fn with_lm_weight(mut self, lm_weight: f64) -> Self {
        self.lm_weight = lm_weight;
        self
    }

    /// Задать критерий.
    pub fn with_criterion(mut self, criterion: CriterionType) -> Self {
        self.criterion = criterion;
        self
    }

    /// Проверка корректности опций.
    pub fn validate(&self) -> BeamResult<()> {
        if self.beam_size < 1 {
            return Err(BeamError::Config("beam_size должен быть >= 1".into()));
        }
        if self.beam_size_token < 1 {
            return Err(BeamError::Config("beam_size_token должен быть >= 1".into()));
        }
        if self.beam_threshold.is_nan() || self.beam_threshold < 0.0 {
            return Err(BeamError::Config(
                "beam_threshold должен быть неотрицательным".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        let options = DecoderOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.criterion, CriterionType::Ctc);
        assert!(!options.log_add);
        assert_eq!(options.unk_score, f64::NEG_INFINITY);
    }

    #[test]
    fn test_zero_beam_size_rejected() {
        let options = DecoderOptions::default().with_beam_size(0);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let mut options = DecoderOptions::default();
        options.beam_threshold = -1.0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_criterion_display() {
        assert_eq!(CriterionType::Ctc.to_string(), "ctc");
        assert_eq!(CriterionType::Asg.to_string(), "asg");
    }
}
