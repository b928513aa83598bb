// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDateTime;

/// One row of a block catalog.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionnaireItem {
    pub section: String,
    /// Unique within a block.
    pub code: String,
    pub theme: String,
    pub prompt: String,
    /// The answer options shown with the prompt, if the instrument has any.
    pub reference_answers: String,
}

/// A dichotomous answer (applicability, acceptance).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// The label written in submission files.
    pub fn label(&self) -> &'static str {
        match self {
            Answer::Yes => "Sim",
            Answer::No => "Não",
        }
    }

    pub fn parse(s: &str) -> Result<Answer, ReviewErrors> {
        match s.trim().to_lowercase().as_str() {
            "sim" | "s" | "yes" | "y" | "true" => Ok(Answer::Yes),
            "não" | "nao" | "n" | "no" | "false" => Ok(Answer::No),
            _ => Err(ReviewErrors::UnknownAnswer(s.to_string())),
        }
    }

    pub fn from_flag(flag: bool) -> Answer {
        if flag {
            Answer::Yes
        } else {
            Answer::No
        }
    }
}

impl Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Likert relevance score, 1 (not relevant) to 5 (very relevant).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct Relevance(u8);

impl Relevance {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(score: u8) -> Result<Relevance, ReviewErrors> {
        if (Relevance::MIN..=Relevance::MAX).contains(&score) {
            Ok(Relevance(score))
        } else {
            Err(ReviewErrors::InvalidRelevance(score as i64))
        }
    }

    pub fn score(&self) -> u8 {
        self.0
    }
}

/// One evaluator's judgment on one item.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ItemEvaluation {
    pub item_code: String,
    pub relevance: Relevance,
    pub national_applicability: Answer,
    pub item_acceptance: Answer,
    pub comment: Option<String>,
}

impl ItemEvaluation {
    /// The comment with surrounding whitespace removed, empty when absent.
    pub fn trimmed_comment(&self) -> &str {
        self.comment.as_deref().map(str::trim).unwrap_or("")
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Evaluator {
    pub name: String,
    pub email: String,
    pub tax_id: Option<String>,
}

/// A catalog item together with the evaluation given to it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Response {
    pub item: QuestionnaireItem,
    pub evaluation: ItemEvaluation,
}

/// The complete response set of one evaluator for one block.
///
/// Responses are kept in catalog order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Submission {
    pub block_id: String,
    pub evaluator: Evaluator,
    pub consent_given: bool,
    pub instructions_acknowledged: bool,
    pub submitted_at: NaiveDateTime,
    pub responses: Vec<Response>,
    /// Additional submission-level fields, written after the fixed columns.
    pub extra_fields: Vec<(String, String)>,
}

impl Submission {
    pub fn evaluations(&self) -> impl Iterator<Item = &ItemEvaluation> {
        self.responses.iter().map(|r| &r.evaluation)
    }
}

// ******** Output data structures *********

/// A reason preventing a submission from being persisted.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ViolationKind {
    MissingConsent,
    MissingName,
    MissingEmail,
    InstructionsNotAcknowledged,
    /// The item codes that need a comment and have none.
    MissingComments(Vec<String>),
}

impl Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::MissingConsent => write!(f, "consent was not given"),
            ViolationKind::MissingName => write!(f, "evaluator name is empty"),
            ViolationKind::MissingEmail => write!(f, "evaluator e-mail is empty"),
            ViolationKind::InstructionsNotAcknowledged => {
                write!(f, "the Delphi instructions were not acknowledged")
            }
            ViolationKind::MissingComments(codes) => write!(
                f,
                "items requiring a comment have none: {}",
                codes.join(", ")
            ),
        }
    }
}

/// Errors raised by the core data structures.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ReviewErrors {
    InvalidRelevance(i64),
    UnknownAnswer(String),
    /// A row does not have as many cells as the table has columns.
    RowLength {
        expected: usize,
        found: usize,
    },
    MissingColumn(String),
}

impl Error for ReviewErrors {}

impl Display for ReviewErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewErrors::InvalidRelevance(x) => {
                write!(f, "relevance must be between 1 and 5, got {}", x)
            }
            ReviewErrors::UnknownAnswer(s) => write!(f, "cannot read {:?} as Sim/Não", s),
            ReviewErrors::RowLength { expected, found } => {
                write!(f, "row has {} cells, expected {}", found, expected)
            }
            ReviewErrors::MissingColumn(c) => write!(f, "missing column {:?}", c),
        }
    }
}

// ********* Configuration **********

/// When a free-text comment becomes mandatory for an item.
///
/// The rule changed across the rounds of the questionnaire, hence a policy
/// instead of a fixed condition.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CommentPolicy {
    /// Require a comment when the item is not accepted.
    pub on_rejection: bool,
    /// Require a comment when the item is judged not applicable nationally.
    pub on_not_applicable: bool,
    /// Require a comment when the relevance is at most this score.
    pub low_relevance_max: Option<u8>,
}

impl CommentPolicy {
    /// Rejection or non-applicability trigger the comment, relevance does not.
    pub const DEFAULT: CommentPolicy = CommentPolicy {
        on_rejection: true,
        on_not_applicable: true,
        low_relevance_max: None,
    };

    /// The earlier rule: relevance 1 or 2 also requires a comment.
    pub const STRICT: CommentPolicy = CommentPolicy {
        on_rejection: true,
        on_not_applicable: true,
        low_relevance_max: Some(2),
    };
}

impl Default for CommentPolicy {
    fn default() -> Self {
        CommentPolicy::DEFAULT
    }
}
