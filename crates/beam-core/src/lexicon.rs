//! Загрузка лексикона из JSON.
//!
//! Формат файла — массив записей:
//!
//! ```json
//! [
//!   { "word": "да", "spelling": [3, 7] },
//!   { "word": "нет", "spelling": [5, 1, 8] }
//! ]
//! ```
//!
//! Идентификатор слова — позиция записи в списке.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BeamError, BeamResult};
use crate::trie::{SmearingMode, Trie};

/// Одна запись лексикона: слово и его написание в токенах.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconEntry {
    /// Слово в орфографическом виде.
    pub word: String,
    /// Написание: последовательность индексов токенов.
    pub spelling: Vec<i32>,
}

/// Лексикон: упорядоченный список слов с написаниями.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: Vec<LexiconEntry>,
}

impl Lexicon {
    /// Создать лексикон из готового списка записей.
    pub fn new(entries: Vec<LexiconEntry>) -> Self {
        Self { entries }
    }

    /// Разобрать JSON-строку.
    pub fn from_json_str(json: &str) -> BeamResult<Self> {
        let entries: Vec<LexiconEntry> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// Прочитать лексикон из файла.
    pub fn from_json_file(path: impl AsRef<Path>) -> BeamResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            BeamError::Lexicon(format!("не удалось прочитать лексикон из {:?}: {e}", path))
        })?;
        let lexicon = Self::from_json_str(&data)?;
        debug!("лексикон загружен: {} слов из {:?}", lexicon.len(), path);
        Ok(lexicon)
    }

    /// Все записи.
    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    /// Количество слов.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Пуст ли лексикон.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Слово по идентификатору.
    pub fn word(&self, id: i32) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.entries.get(i))
            .map(|e| e.word.as_str())
    }

    /// Построить префиксное дерево по лексикону.
    ///
    /// `word_scores` — LM-оценки слов, параллельные записям; `None` — нули.
    /// Идентификатором слова в дереве служит позиция записи.
    pub fn build_trie(
        &self,
        max_children: usize,
        root_idx: i32,
        smearing: SmearingMode,
        word_scores: Option<&[f32]>,
    ) -> BeamResult<Trie> {
        if let Some(scores) = word_scores {
            if scores.len() != self.entries.len() {
                return Err(BeamError::Lexicon(format!(
                    "оценок слов {}, а записей {}",
                    scores.len(),
                    self.entries.len()
                )));
            }
        }

        let mut trie = Trie::new(max_children, root_idx);
        for (id, entry) in self.entries.iter().enumerate() {
            let score = word_scores.map_or(0.0, |s| s[id]);
            trie.insert(&entry.spelling, id as i32, score)?;
        }
        trie.smear(smearing);
        debug!(
            "префиксное дерево: {} узлов на {} слов",
            trie.num_nodes(),
            self.len()
        );
        Ok(trie)
    }
}
