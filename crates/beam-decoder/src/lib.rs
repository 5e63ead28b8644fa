//! # beam-decoder
//!
//! Движок лексиконного beam-search поверх [`beam_core`]: генерация
//! кандидатов по префиксному дереву, слияние по ключу дедупликации,
//! двухуровневый top-K и потоковый буфер фреймов с ретроспективной
//! фиксацией префикса.
//!
//! Точка входа — [`LexiconDecoder`]:
//!
//! ```ignore
//! let mut decoder = LexiconDecoder::new(options, trie, lm, tokens, Vec::new(), false);
//! decoder.decode_begin();
//! decoder.decode_step(chunk.data(), chunk.frames(), chunk.tokens());
//! decoder.prune(look_back);
//! let partial = decoder.get_best_hypothesis(look_back);
//! ```

pub mod candidate;
pub mod decoder;
pub mod state;

pub use candidate::CandidateBuffer;
pub use decoder::{LexiconDecoder, SpecialTokens};
pub use state::Hypothesis;
