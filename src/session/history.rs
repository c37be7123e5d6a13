//! Rolling window of prior question/answer pairs.
//!
//! The prompt builder renders the most recent pairs (oldest first) so the
//! model can keep answers consistent across a session without the prompt
//! growing unboundedly.

use std::collections::VecDeque;

/// One answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Bounded most-recent-N history of answered questions.
#[derive(Debug)]
pub struct QaHistory {
    window: usize,
    pairs: VecDeque<QaPair>,
}

impl QaHistory {
    /// Create a history keeping at most `window` pairs.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            pairs: VecDeque::with_capacity(window),
        }
    }

    /// Record an answered question, evicting the oldest pair when full.
    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        if self.window == 0 {
            return;
        }
        if self.pairs.len() == self.window {
            self.pairs.pop_front();
        }
        self.pairs.push_back(QaPair {
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// The retained pairs, oldest first.
    pub fn pairs(&self) -> Vec<QaPair> {
        self.pairs.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Forget everything (new interview, new topic).
    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_most_recent_pairs() {
        let mut history = QaHistory::new(3);
        for i in 1..=5 {
            history.push(format!("q{i}"), format!("a{i}"));
        }

        let pairs = history.pairs();
        assert_eq!(pairs.len(), 3);
        // Oldest first: q3, q4, q5.
        assert_eq!(pairs[0].question, "q3");
        assert_eq!(pairs[2].question, "q5");
    }

    #[test]
    fn zero_window_keeps_nothing() {
        let mut history = QaHistory::new(0);
        history.push("q", "a");
        assert!(history.is_empty());
    }

    #[test]
    fn clear_empties_the_window() {
        let mut history = QaHistory::new(3);
        history.push("q1", "a1");
        assert_eq!(history.len(), 1);
        history.clear();
        assert!(history.is_empty());
    }
}
