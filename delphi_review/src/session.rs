//! The evaluation session of one evaluator on one block.
//!
//! A session walks through a fixed sequence of states:
//!
//! ```text
//! AwaitingInstructions -> AwaitingIdentification -> Evaluating -> Submitted
//! ```
//!
//! Every transition checks the current state and is refused otherwise.
//! Identification is recorded as given: consent and empty names are only
//! checked at submission time so that all the problems are reported together.

use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDateTime;
use log::{debug, info};

use crate::config::*;
use crate::validate_submission_preconditions;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SessionState {
    AwaitingInstructions,
    AwaitingIdentification,
    Evaluating,
    Submitted,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SessionError {
    /// The action is not allowed in the current state.
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },
    /// The evaluation refers to an item that is not in the block.
    UnknownItem(String),
    /// Some items of the block have not been evaluated.
    Incomplete(Vec<String>),
    /// The submission does not satisfy its preconditions.
    Rejected(Vec<ViolationKind>),
}

impl Error for SessionError {}

impl Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidTransition { from, action } => {
                write!(f, "cannot {} while in state {:?}", action, from)
            }
            SessionError::UnknownItem(code) => write!(f, "item {} is not part of this block", code),
            SessionError::Incomplete(codes) => {
                write!(f, "items without evaluation: {}", codes.join(", "))
            }
            SessionError::Rejected(violations) => {
                let msgs: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                write!(f, "submission rejected: {}", msgs.join("; "))
            }
        }
    }
}

pub struct Session {
    block_id: String,
    items: Vec<QuestionnaireItem>,
    policy: CommentPolicy,
    state: SessionState,
    evaluator: Option<Evaluator>,
    consent_given: bool,
    // Indexed like `items`.
    evaluations: Vec<Option<ItemEvaluation>>,
    extra_fields: Vec<(String, String)>,
}

impl Session {
    pub fn new(block_id: &str, items: &[QuestionnaireItem], policy: &CommentPolicy) -> Session {
        Session {
            block_id: block_id.to_string(),
            items: items.to_vec(),
            policy: *policy,
            state: SessionState::AwaitingInstructions,
            evaluator: None,
            consent_given: false,
            evaluations: vec![None; items.len()],
            extra_fields: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn block_id(&self) -> &str {
        &self.block_id
    }

    pub fn items(&self) -> &[QuestionnaireItem] {
        &self.items
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }

    fn move_to(&mut self, next: SessionState) {
        debug!(
            "session {}: {:?} -> {:?}",
            self.block_id, self.state, next
        );
        self.state = next;
    }

    pub fn acknowledge_instructions(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::AwaitingInstructions, "acknowledge the instructions")?;
        self.move_to(SessionState::AwaitingIdentification);
        Ok(())
    }

    pub fn identify(&mut self, evaluator: &Evaluator, consent_given: bool) -> Result<(), SessionError> {
        self.expect_state(SessionState::AwaitingIdentification, "identify the evaluator")?;
        self.evaluator = Some(Evaluator {
            name: evaluator.name.trim().to_string(),
            email: evaluator.email.trim().to_string(),
            tax_id: evaluator
                .tax_id
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        });
        self.consent_given = consent_given;
        self.move_to(SessionState::Evaluating);
        Ok(())
    }

    /// Records the evaluation of one item, replacing any earlier one for the same item.
    pub fn record(&mut self, evaluation: ItemEvaluation) -> Result<(), SessionError> {
        self.expect_state(SessionState::Evaluating, "record an evaluation")?;
        let idx = self
            .items
            .iter()
            .position(|it| it.code == evaluation.item_code)
            .ok_or_else(|| SessionError::UnknownItem(evaluation.item_code.clone()))?;
        let comment = evaluation
            .comment
            .as_ref()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self.evaluations[idx] = Some(ItemEvaluation {
            comment,
            ..evaluation
        });
        Ok(())
    }

    /// Adds a submission-level field that is not part of the fixed layout.
    pub fn add_extra_field(&mut self, name: &str, value: &str) {
        self.extra_fields.push((name.to_string(), value.to_string()));
    }

    /// The codes of the items recorded so far that still need a comment.
    pub fn pending_comments(&self) -> Vec<String> {
        crate::validate(self.evaluations.iter().flatten(), &self.policy)
            .into_iter()
            .collect()
    }

    /// The submission as it stands, with the items evaluated so far.
    ///
    /// Nothing is checked and the state does not change. Useful to report
    /// every violation of an answer set that cannot be submitted.
    pub fn draft(&self, submitted_at: NaiveDateTime) -> Submission {
        let evaluator = self.evaluator.clone().unwrap_or(Evaluator {
            name: String::new(),
            email: String::new(),
            tax_id: None,
        });
        let responses: Vec<Response> = self
            .items
            .iter()
            .zip(self.evaluations.iter())
            .filter_map(|(item, evaluation)| {
                evaluation.as_ref().map(|ev| Response {
                    item: item.clone(),
                    evaluation: ev.clone(),
                })
            })
            .collect();
        Submission {
            block_id: self.block_id.clone(),
            evaluator,
            consent_given: self.consent_given,
            // Only reachable through the instructions gate.
            instructions_acknowledged: self.state != SessionState::AwaitingInstructions,
            submitted_at,
            responses,
            extra_fields: self.extra_fields.clone(),
        }
    }

    /// Closes the session and produces the submission.
    ///
    /// On failure the session stays in the evaluating state, so that the
    /// missing pieces can be recorded and the submission attempted again.
    pub fn submit(&mut self, submitted_at: NaiveDateTime) -> Result<Submission, SessionError> {
        self.expect_state(SessionState::Evaluating, "submit")?;

        let missing: Vec<String> = self
            .items
            .iter()
            .zip(self.evaluations.iter())
            .filter(|(_, ev)| ev.is_none())
            .map(|(it, _)| it.code.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SessionError::Incomplete(missing));
        }

        let submission = self.draft(submitted_at);
        let violations = validate_submission_preconditions(&submission, &self.policy);
        if !violations.is_empty() {
            return Err(SessionError::Rejected(violations));
        }
        info!(
            "session {}: submission accepted with {} responses",
            self.block_id,
            submission.responses.len()
        );
        self.move_to(SessionState::Submitted);
        Ok(submission)
    }
}
