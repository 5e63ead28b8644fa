//! Префиксное дерево лексикона.
//!
//! Узлы лежат в арене и связаны индексами: обратные ссылки декодера на
//! узлы остаются валидными без подсчёта ссылок, а сравнение узлов в ключе
//! дедупликации сводится к сравнению индексов.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{BeamError, BeamResult};
use crate::math::log_add;

/// Индекс узла в арене дерева.
pub type TrieNodeId = usize;

/// Режим «размазывания» LM-оценок слов вверх по дереву.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmearingMode {
    /// Не заполнять `max_score`.
    None,
    /// Максимум по поддереву.
    Max,
    /// Log-sum-exp по поддереву.
    LogAdd,
}

/// Узел префиксного дерева.
#[derive(Debug, Clone)]
pub struct TrieNode {
    /// Дети: токен входящего ребра → узел.
    pub children: HashMap<i32, TrieNodeId>,
    /// Токен входящего ребра (для корня — токен тишины).
    pub idx: i32,
    /// Идентификаторы слов, заканчивающихся в узле.
    pub labels: Vec<i32>,
    /// LM-оценки слов из `labels` (параллельный список).
    pub scores: Vec<f32>,
    /// Лучшая достижимая оценка в поддереве; заполняется `smear`.
    pub max_score: f32,
}

impl TrieNode {
    fn new(idx: i32) -> Self {
        Self {
            children: HashMap::new(),
            idx,
            labels: Vec::new(),
            scores: Vec::new(),
            max_score: 0.0,
        }
    }
}

/// Префиксное дерево над алфавитом токенов.
#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<TrieNode>,
    max_children: usize,
    root: TrieNodeId,
}

impl Trie {
    /// Пустое дерево. `max_children` — размер алфавита токенов,
    /// `root_idx` — токен, приписанный корню (обычно тишина).
    pub fn new(max_children: usize, root_idx: i32) -> Self {
        Self {
            nodes: vec![TrieNode::new(root_idx)],
            max_children,
            root: 0,
        }
    }

    /// Корневой узел.
    pub fn root(&self) -> TrieNodeId {
        self.root
    }

    /// Узел по индексу.
    pub fn node(&self, id: TrieNodeId) -> &TrieNode {
        &self.nodes[id]
    }

    /// Количество узлов в арене.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Вставить написание слова; возвращает узел конца написания.
    pub fn insert(&mut self, spelling: &[i32], label: i32, score: f32) -> BeamResult<TrieNodeId> {
        let mut cur = self.root;
        for &token in spelling {
            if token < 0 || token as usize >= self.max_children {
                return Err(BeamError::Lexicon(format!(
                    "токен {} вне алфавита (0..{})",
                    token, self.max_children
                )));
            }
            cur = match self.nodes[cur].children.get(&token) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::new(token));
                    self.nodes[cur].children.insert(token, child);
                    child
                }
            };
        }
        self.nodes[cur].labels.push(label);
        self.nodes[cur].scores.push(score);
        Ok(cur)
    }

    /// Найти узел по написанию.
    pub fn search(&self, spelling: &[i32]) -> Option<TrieNodeId> {
        let mut cur = self.root;
        for &token in spelling {
            cur = *self.nodes[cur].children.get(&token)?;
        }
        Some(cur)
    }

    /// Заполнить `max_score` по всему дереву.
    pub fn smear(&mut self, mode: SmearingMode) {
        if mode == SmearingMode::None {
            return;
        }
        self.smear_node(self.root, mode);
        debug!("smear дерева: {} узлов, режим {:?}", self.nodes.len(), mode);
    }

    fn smear_node(&mut self, id: TrieNodeId, mode: SmearingMode) -> f32 {
        let mut acc = f32::NEG_INFINITY;
        for i in 0..self.nodes[id].scores.len() {
            acc = combine(acc, self.nodes[id].scores[i], mode);
        }
        // порядок обхода фиксируем по индексам арены, чтобы log-add
        // давал воспроизводимый результат
        let mut children: Vec<TrieNodeId> = self.nodes[id].children.values().copied().collect();
        children.sort_unstable();
        for child in children {
            let child_max = self.smear_node(child, mode);
            acc = combine(acc, child_max, mode);
        }
        self.nodes[id].max_score = acc;
        acc
    }
}

fn combine(a: f32, b: f32, mode: SmearingMode) -> f32 {
    match mode {
        SmearingMode::LogAdd => log_add(f64::from(a), f64::from(b)) as f32,
        _ => a.max(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_search() {
        let mut trie = Trie::new(10, 9);
        let end = trie.insert(&[0, 1], 7, -0.5).unwrap();
        assert_eq!(trie.search(&[0, 1]), Some(end));
        assert_eq!(trie.node(end).labels, vec![7]);
        assert_eq!(trie.node(end).idx, 1);
        assert_eq!(trie.search(&[0, 2]), None);
        assert_eq!(trie.search(&[]), Some(trie.root()));
    }

    #[test]
    fn test_insert_rejects_out_of_range_token() {
        let mut trie = Trie::new(4, 3);
        assert!(trie.insert(&[0, 4], 0, 0.0).is_err());
        assert!(trie.insert(&[-1], 0, 0.0).is_err());
    }

    #[test]
    fn test_shared_prefix_reuses_nodes() {
        let mut trie = Trie::new(10, 9);
        trie.insert(&[0, 1], 0, 0.0).unwrap();
        trie.insert(&[0, 2], 1, 0.0).unwrap();
        // корень + "0" + два листа
        assert_eq!(trie.num_nodes(), 4);
        let mid = trie.search(&[0]).unwrap();
        assert_eq!(trie.node(mid).children.len(), 2);
    }

    #[test]
    fn test_smear_max_propagates_best_score() {
        let mut trie = Trie::new(10, 9);
        trie.insert(&[0, 1], 0, -2.0).unwrap();
        trie.insert(&[0, 2], 1, -1.0).unwrap();
        trie.insert(&[3], 2, -4.0).unwrap();
        trie.smear(SmearingMode::Max);

        let mid = trie.search(&[0]).unwrap();
        assert_eq!(trie.node(mid).max_score, -1.0);
        assert_eq!(trie.node(trie.root()).max_score, -1.0);
        let leaf = trie.search(&[0, 1]).unwrap();
        assert_eq!(trie.node(leaf).max_score, -2.0);
    }

    #[test]
    fn test_smear_log_add_accumulates() {
        let mut trie = Trie::new(10, 9);
        trie.insert(&[0, 1], 0, -1.0).unwrap();
        trie.insert(&[0, 2], 1, -1.0).unwrap();
        trie.smear(SmearingMode::LogAdd);

        let mid = trie.search(&[0]).unwrap();
        // log(exp(-1) + exp(-1)) = -1 + ln 2
        let expected = -1.0 + std::f32::consts::LN_2;
        assert!((trie.node(mid).max_score - expected).abs() < 1e-5);
    }
}
