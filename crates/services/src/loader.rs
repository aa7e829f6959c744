//! Question-bank loading and wire-format normalization.
//!
//! The accepted documents carry their list under `questions` or the legacy
//! `question`, and options under `answerOptions`, `answeroption`, or
//! `answer_options`. The tolerance lives entirely in the wire structs here;
//! the rest of the engine only ever sees the canonical model.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, HeaderValue};
use serde::Deserialize;
use std::collections::HashMap;

use quiz_core::model::{AnswerOption, Question, QuestionBank, SubjectId};

use crate::error::LoadError;

/// Source of question banks, keyed by subject identifier.
#[async_trait]
pub trait BankLoader: Send + Sync {
    /// Fetch and parse the bank for one subject.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` when the fetch fails, the document does not
    /// parse, or the question list is empty.
    async fn load(&self, subject: &SubjectId) -> Result<QuestionBank, LoadError>;
}

/// Loads bank documents over HTTP.
///
/// Requests carry `Cache-Control: no-store` so intermediaries never serve a
/// stale bank after the source data changed.
#[derive(Clone)]
pub struct HttpBankLoader {
    client: Client,
    base_url: String,
}

impl HttpBankLoader {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn resource_url(&self, subject: &SubjectId) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), subject)
    }
}

#[async_trait]
impl BankLoader for HttpBankLoader {
    async fn load(&self, subject: &SubjectId) -> Result<QuestionBank, LoadError> {
        let response = self
            .client
            .get(self.resource_url(subject))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LoadError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        parse_bank(subject.clone(), &body)
    }
}

/// In-memory loader for tests and prototyping.
#[derive(Clone, Default)]
pub struct FixtureBankLoader {
    banks: HashMap<SubjectId, QuestionBank>,
}

impl FixtureBankLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bank: QuestionBank) {
        self.banks.insert(bank.subject().clone(), bank);
    }
}

#[async_trait]
impl BankLoader for FixtureBankLoader {
    async fn load(&self, subject: &SubjectId) -> Result<QuestionBank, LoadError> {
        let bank = self
            .banks
            .get(subject)
            .cloned()
            .ok_or_else(|| LoadError::Missing(subject.clone()))?;
        if bank.is_empty() {
            return Err(LoadError::EmptyBank(subject.clone()));
        }
        Ok(bank)
    }
}

/// Parse a raw bank document into the canonical model.
///
/// # Errors
///
/// Returns `LoadError::Parse` for malformed JSON and
/// `LoadError::EmptyBank` when the document carries no questions.
pub fn parse_bank(subject: SubjectId, body: &str) -> Result<QuestionBank, LoadError> {
    let document: BankDocument = serde_json::from_str(body)?;
    if document.questions.is_empty() {
        return Err(LoadError::EmptyBank(subject));
    }
    let questions = document
        .questions
        .into_iter()
        .map(QuestionWire::into_question)
        .collect();
    Ok(QuestionBank::new(subject, questions))
}

//
// ─── WIRE FORMAT ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct BankDocument {
    #[serde(alias = "question")]
    questions: Vec<QuestionWire>,
}

#[derive(Debug, Deserialize)]
struct QuestionWire {
    question: String,
    #[serde(default)]
    hint: Option<String>,
    #[serde(
        rename = "answerOptions",
        alias = "answeroption",
        alias = "answer_options",
        default
    )]
    options: Vec<OptionWire>,
}

impl QuestionWire {
    fn into_question(self) -> Question {
        let options = self.options.into_iter().map(OptionWire::into_option).collect();
        let question = Question::new(self.question, options);
        match self.hint {
            Some(hint) if !hint.trim().is_empty() => question.with_hint(hint),
            _ => question,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OptionWire {
    text: String,
    #[serde(rename = "isCorrect", default)]
    is_correct: bool,
    #[serde(default)]
    rationale: Option<String>,
}

impl OptionWire {
    fn into_option(self) -> AnswerOption {
        let option = AnswerOption::new(self.text, self.is_correct);
        match self.rationale {
            Some(rationale) => option.with_rationale(rationale),
            None => option,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SubjectId {
        SubjectId::new("c.json")
    }

    #[test]
    fn parses_the_canonical_shape() {
        let body = r#"{
            "questions": [
                {
                    "question": "2 + 2?",
                    "hint": "count on your fingers",
                    "answerOptions": [
                        { "text": "3", "isCorrect": false },
                        { "text": "4", "isCorrect": true, "rationale": "basic sum" }
                    ]
                }
            ]
        }"#;

        let bank = parse_bank(subject(), body).unwrap();
        assert_eq!(bank.len(), 1);
        let question = bank.question(0).unwrap();
        assert_eq!(question.text(), "2 + 2?");
        assert_eq!(question.hint(), Some("count on your fingers"));
        assert_eq!(question.correct_index(), Some(1));
        assert_eq!(question.options()[1].rationale(), Some("basic sum"));
    }

    #[test]
    fn accepts_the_legacy_field_spellings() {
        let body = r#"{
            "question": [
                {
                    "question": "legacy?",
                    "answeroption": [
                        { "text": "yes", "isCorrect": true },
                        { "text": "no", "isCorrect": false }
                    ]
                },
                {
                    "question": "snake?",
                    "answer_options": [
                        { "text": "yes", "isCorrect": true },
                        { "text": "no" }
                    ]
                }
            ]
        }"#;

        let bank = parse_bank(subject(), body).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.question(0).unwrap().option_count(), 2);
        assert_eq!(bank.question(1).unwrap().correct_index(), Some(0));
        // Missing isCorrect defaults to false.
        assert!(!bank.question(1).unwrap().options()[1].is_correct());
    }

    #[test]
    fn blank_hints_are_dropped() {
        let body = r#"{
            "questions": [
                { "question": "q", "hint": "   ", "answerOptions": [
                    { "text": "a", "isCorrect": true } ] }
            ]
        }"#;
        let bank = parse_bank(subject(), body).unwrap();
        assert_eq!(bank.question(0).unwrap().hint(), None);
    }

    #[test]
    fn empty_documents_are_a_load_failure() {
        let err = parse_bank(subject(), r#"{ "questions": [] }"#).unwrap_err();
        assert!(matches!(err, LoadError::EmptyBank(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_failure() {
        let err = parse_bank(subject(), "{ not json").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[tokio::test]
    async fn fixture_loader_serves_inserted_banks() {
        let mut loader = FixtureBankLoader::new();
        let bank = QuestionBank::new(
            subject(),
            vec![Question::new("q", vec![AnswerOption::new("a", true)])],
        );
        loader.insert(bank.clone());

        assert_eq!(loader.load(&subject()).await.unwrap(), bank);
        let missing = loader.load(&SubjectId::new("other.json")).await.unwrap_err();
        assert!(matches!(missing, LoadError::Missing(_)));
    }
}
