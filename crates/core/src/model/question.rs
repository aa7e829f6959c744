//
// ─── ANSWER OPTION ─────────────────────────────────────────────────────────────
//

/// One selectable answer for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    text: String,
    is_correct: bool,
    rationale: Option<String>,
}

impl AnswerOption {
    #[must_use]
    pub fn new(text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            text: text.into(),
            is_correct,
            rationale: None,
        }
    }

    /// Attach the explanation shown after the question is answered.
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    #[must_use]
    pub fn rationale(&self) -> Option<&str> {
        self.rationale.as_deref()
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// One quiz item: display text, an optional hint, and its answer options in
/// authoring order.
///
/// Well-formed data carries exactly one correct option, but nothing here
/// enforces that; consumers resolve `correct_index` and degrade gracefully
/// when it is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    hint: Option<String>,
    options: Vec<AnswerOption>,
}

impl Question {
    #[must_use]
    pub fn new(text: impl Into<String>, options: Vec<AnswerOption>) -> Self {
        Self {
            text: text.into(),
            hint: None,
            options,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    /// Index of the first option flagged correct, `None` when the source
    /// data carries no correct option at all.
    #[must_use]
    pub fn correct_index(&self) -> Option<usize> {
        self.options.iter().position(AnswerOption::is_correct)
    }
}
