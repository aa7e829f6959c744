use rand::Rng;

use crate::model::QuestionBank;
use crate::shuffle;

/// Display ordering for one session.
///
/// `question_permutation` maps display position → bank index, and
/// `option_permutations[position]` maps display slot → original option
/// index for the question shown at that position. Both tables are derived
/// on explicit (re)start only and never change mid-session; when shuffling
/// is off they are identity permutations, so every consumer goes through
/// the same mapping path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOrder {
    question_permutation: Vec<usize>,
    option_permutations: Vec<Vec<usize>>,
}

impl SessionOrder {
    /// Identity ordering: display order equals bank order.
    #[must_use]
    pub fn identity(bank: &QuestionBank) -> Self {
        let question_permutation = shuffle::identity(bank.len());
        let option_permutations = question_permutation
            .iter()
            .map(|&index| shuffle::identity(option_count(bank, index)))
            .collect();
        Self {
            question_permutation,
            option_permutations,
        }
    }

    /// Randomized ordering: questions and, independently, each question's
    /// options.
    #[must_use]
    pub fn shuffled<R: Rng + ?Sized>(bank: &QuestionBank, rng: &mut R) -> Self {
        let question_permutation = shuffle::permutation(bank.len(), rng);
        let option_permutations = question_permutation
            .iter()
            .map(|&index| shuffle::permutation(option_count(bank, index), rng))
            .collect();
        Self {
            question_permutation,
            option_permutations,
        }
    }

    /// Rebuilds the option tables for a restored question permutation, for
    /// snapshots that predate per-question option shuffling.
    #[must_use]
    pub fn regenerate_options<R: Rng + ?Sized>(
        bank: &QuestionBank,
        question_permutation: Vec<usize>,
        rng: &mut R,
    ) -> Self {
        let option_permutations = question_permutation
            .iter()
            .map(|&index| shuffle::permutation(option_count(bank, index), rng))
            .collect();
        Self {
            question_permutation,
            option_permutations,
        }
    }

    /// Reassembles an ordering restored from a snapshot. Callers must
    /// check `fits` before trusting it against a freshly loaded bank.
    #[must_use]
    pub fn from_parts(
        question_permutation: Vec<usize>,
        option_permutations: Vec<Vec<usize>>,
    ) -> Self {
        Self {
            question_permutation,
            option_permutations,
        }
    }

    /// Whether this ordering is a valid bijection over the given bank:
    /// right sizes, every table a permutation, option tables matching each
    /// mapped question's option count.
    #[must_use]
    pub fn fits(&self, bank: &QuestionBank) -> bool {
        if self.question_permutation.len() != bank.len()
            || self.option_permutations.len() != bank.len()
        {
            return false;
        }
        if !shuffle::is_permutation(&self.question_permutation) {
            return false;
        }
        self.question_permutation
            .iter()
            .zip(&self.option_permutations)
            .all(|(&index, options)| {
                options.len() == option_count(bank, index) && shuffle::is_permutation(options)
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.question_permutation.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.question_permutation.is_empty()
    }

    /// Bank index of the question shown at a display position.
    #[must_use]
    pub fn bank_index(&self, position: usize) -> Option<usize> {
        self.question_permutation.get(position).copied()
    }

    /// Option ordering (display slot → original option index) for the
    /// question shown at a display position.
    #[must_use]
    pub fn option_order(&self, position: usize) -> Option<&[usize]> {
        self.option_permutations.get(position).map(Vec::as_slice)
    }

    #[must_use]
    pub fn question_permutation(&self) -> &[usize] {
        &self.question_permutation
    }

    #[must_use]
    pub fn option_permutations(&self) -> &[Vec<usize>] {
        &self.option_permutations
    }
}

fn option_count(bank: &QuestionBank, index: usize) -> usize {
    bank.question(index).map_or(0, super::Question::option_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, Question, SubjectId};

    fn bank(option_counts: &[usize]) -> QuestionBank {
        let questions = option_counts
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let options = (0..n)
                    .map(|o| AnswerOption::new(format!("o{o}"), o == 0))
                    .collect();
                Question::new(format!("q{i}"), options)
            })
            .collect();
        QuestionBank::new(SubjectId::new("t.json"), questions)
    }

    #[test]
    fn identity_order_maps_positions_straight_through() {
        let bank = bank(&[3, 2, 4]);
        let order = SessionOrder::identity(&bank);
        assert_eq!(order.question_permutation(), &[0, 1, 2]);
        assert_eq!(order.option_order(1), Some(&[0, 1][..]));
        assert!(order.fits(&bank));
    }

    #[test]
    fn shuffled_order_fits_its_bank() {
        let bank = bank(&[4, 4, 2, 3, 5]);
        let mut rng = rand::rng();
        let order = SessionOrder::shuffled(&bank, &mut rng);
        assert!(order.fits(&bank));
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn fits_rejects_mismatched_tables() {
        let bank = bank(&[3, 2]);
        let wrong_len = SessionOrder::from_parts(vec![0], vec![vec![0, 1, 2]]);
        assert!(!wrong_len.fits(&bank));

        let not_bijective = SessionOrder::from_parts(vec![0, 0], vec![vec![0, 1, 2], vec![0, 1]]);
        assert!(!not_bijective.fits(&bank));

        let wrong_option_len =
            SessionOrder::from_parts(vec![1, 0], vec![vec![0, 1, 2], vec![0, 1]]);
        assert!(!wrong_option_len.fits(&bank));

        let good = SessionOrder::from_parts(vec![1, 0], vec![vec![1, 0], vec![2, 0, 1]]);
        assert!(good.fits(&bank));
    }

    #[test]
    fn regenerated_options_keep_the_question_permutation() {
        let bank = bank(&[3, 2, 4]);
        let mut rng = rand::rng();
        let order = SessionOrder::regenerate_options(&bank, vec![2, 0, 1], &mut rng);
        assert_eq!(order.question_permutation(), &[2, 0, 1]);
        assert!(order.fits(&bank));
    }
}
