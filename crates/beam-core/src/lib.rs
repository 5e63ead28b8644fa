//! # beam-core
//!
//! Базовые типы для RustBeam — лексиконного beam-search декодера
//! выходов акустических классификаторов.
//!
//! Этот крейт предоставляет фундаментальные абстракции для остальных
//! крейтов workspace:
//!
//! - Блок эмиссий ([`Emissions`]) и результаты декодирования
//!   ([`DecodeResult`])
//! - Конфигурация декодера ([`DecoderOptions`], [`CriterionType`])
//! - Префиксное дерево лексикона ([`Trie`]) и его загрузка из JSON
//!   ([`Lexicon`])
//! - Trait [`LanguageModel`] — единый интерфейс внешних языковых моделей
//! - Унифицированная обработка ошибок через [`BeamError`]

pub mod config;
pub mod error;
pub mod lexicon;
pub mod lm;
pub mod math;
pub mod trie;
pub mod types;

pub use config::{CriterionType, DecoderOptions};
pub use error::{BeamError, BeamResult};
pub use lexicon::{Lexicon, LexiconEntry};
pub use lm::{LanguageModel, ZeroLm};
pub use math::log_add;
pub use trie::{SmearingMode, Trie, TrieNode, TrieNodeId};
pub use types::{DecodeResult, Emissions};
