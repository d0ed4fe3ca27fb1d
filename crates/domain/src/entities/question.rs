//! Questions and the per-battle draw deck
//!
//! The question bank itself is external; the core receives an ordered set of
//! questions for a category and cycles through it. Draws avoid immediate
//! repetition where possible: the deck deals every question once in a
//! shuffled order before reshuffling for the next pass.

use serde::{Deserialize, Serialize};

use crate::error::BattleError;
use crate::ids::{CategoryId, QuestionId};

/// A single trivia question with its choices and the designated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub category_id: CategoryId,
    pub text: String,
    pub choices: Vec<String>,
    pub correct_choice: u32,
    /// Answer window in milliseconds
    pub time_limit_ms: u64,
}

impl Question {
    /// True when the given choice index is the designated correct one.
    pub fn is_correct(&self, choice_index: u32) -> bool {
        self.correct_choice == choice_index
    }
}

/// Per-battle draw state over a category's questions.
///
/// Deals each question once per pass in a shuffled order; when the pass is
/// exhausted the pool restarts with a fresh shuffle. With two or more
/// questions the last card of a pass is never the first of the next one.
#[derive(Debug, Clone)]
pub struct QuestionDeck {
    questions: Vec<Question>,
    /// Indices into `questions`, consumed from the back
    order: Vec<usize>,
    last_dealt: Option<usize>,
}

impl QuestionDeck {
    /// Build a deck over a category's questions.
    ///
    /// # Errors
    ///
    /// Returns `BattleError::NoQuestionsLeft` when the category is empty,
    /// and `BattleError::Validation` when a question has no choices or an
    /// out-of-range correct index.
    pub fn new(questions: Vec<Question>) -> Result<Self, BattleError> {
        if questions.is_empty() {
            return Err(BattleError::NoQuestionsLeft);
        }
        for q in &questions {
            if q.choices.is_empty() || q.correct_choice as usize >= q.choices.len() {
                return Err(BattleError::validation(format!(
                    "question {} has an invalid correct choice",
                    q.id
                )));
            }
        }
        Ok(Self {
            questions,
            order: Vec::new(),
            last_dealt: None,
        })
    }

    /// Number of questions in the underlying pool.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Deal the next question. RNG is injected as a closure returning a
    /// value in `0..bound`.
    pub fn deal(&mut self, mut rng: impl FnMut(usize) -> usize) -> &Question {
        if self.order.is_empty() {
            self.reshuffle(&mut rng);
        }
        // reshuffle always leaves at least one index
        let idx = self.order.pop().unwrap_or(0);
        self.last_dealt = Some(idx);
        &self.questions[idx]
    }

    fn reshuffle(&mut self, rng: &mut impl FnMut(usize) -> usize) {
        self.order = (0..self.questions.len()).collect();
        // Fisher-Yates with injected RNG
        for i in (1..self.order.len()).rev() {
            let j = rng(i + 1) % (i + 1);
            self.order.swap(i, j);
        }
        // Avoid dealing the same question back-to-back across pass
        // boundaries when the pool allows it.
        if self.order.len() > 1 {
            if let Some(last) = self.last_dealt {
                let top = self.order.len() - 1;
                if self.order[top] == last {
                    self.order.swap(0, top);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(n: usize) -> Question {
        Question {
            id: QuestionId::new(),
            category_id: CategoryId::new(),
            text: format!("Question {}", n),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_choice: 1,
            time_limit_ms: 15_000,
        }
    }

    #[test]
    fn test_rejects_empty_category() {
        assert_eq!(
            QuestionDeck::new(Vec::new()).err(),
            Some(BattleError::NoQuestionsLeft)
        );
    }

    #[test]
    fn test_rejects_out_of_range_correct_choice() {
        let mut q = question(0);
        q.correct_choice = 9;
        assert!(QuestionDeck::new(vec![q]).is_err());
    }

    #[test]
    fn test_deals_every_question_once_per_pass() {
        let questions: Vec<_> = (0..5).map(question).collect();
        let ids: Vec<_> = questions.iter().map(|q| q.id).collect();
        let mut deck = QuestionDeck::new(questions).expect("non-empty deck");

        let mut seed = 17usize;
        let mut rng = move |bound: usize| {
            seed = seed.wrapping_mul(31).wrapping_add(7);
            seed % bound
        };

        let mut dealt: Vec<QuestionId> = (0..5).map(|_| deck.deal(&mut rng).id).collect();
        dealt.sort_by_key(|id| id.to_uuid());
        let mut expected = ids.clone();
        expected.sort_by_key(|id| id.to_uuid());
        assert_eq!(dealt, expected);
    }

    #[test]
    fn test_no_immediate_repeat_across_pass_boundary() {
        let questions: Vec<_> = (0..3).map(question).collect();
        let mut deck = QuestionDeck::new(questions).expect("non-empty deck");

        let mut seed = 3usize;
        let mut rng = move |bound: usize| {
            seed = seed.wrapping_mul(13).wrapping_add(5);
            seed % bound
        };

        let mut previous = None;
        for _ in 0..30 {
            let id = deck.deal(&mut rng).id;
            assert_ne!(previous, Some(id), "dealt the same question twice in a row");
            previous = Some(id);
        }
    }

    #[test]
    fn test_single_question_pool_restarts() {
        let mut deck = QuestionDeck::new(vec![question(0)]).expect("non-empty deck");
        let first = deck.deal(|_| 0).id;
        let second = deck.deal(|_| 0).id;
        assert_eq!(first, second);
    }
}
