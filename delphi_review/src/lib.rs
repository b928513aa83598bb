mod config;
pub mod manual;
pub mod session;
pub mod summary;
pub mod table;

use log::debug;

use std::collections::BTreeSet;

pub use crate::config::*;

/// Whether the policy makes a comment mandatory for this evaluation,
/// regardless of the comment actually given.
pub fn requires_comment(evaluation: &ItemEvaluation, policy: &CommentPolicy) -> bool {
    let rejected = policy.on_rejection && evaluation.item_acceptance == Answer::No;
    let not_applicable =
        policy.on_not_applicable && evaluation.national_applicability == Answer::No;
    let low_relevance = policy
        .low_relevance_max
        .map(|max| evaluation.relevance.score() <= max)
        .unwrap_or(false);
    rejected || not_applicable || low_relevance
}

/// Returns the codes of the items whose mandatory comment is missing.
///
/// The result does not depend on the order of the evaluations.
///
/// ```
/// use delphi_review::*;
///
/// let eval = |code: &str, acceptance: Answer, comment: &str| ItemEvaluation {
///     item_code: code.to_string(),
///     relevance: Relevance::new(4).unwrap(),
///     national_applicability: Answer::Yes,
///     item_acceptance: acceptance,
///     comment: Some(comment.to_string()),
/// };
/// let flagged = validate(
///     &[eval("A1", Answer::No, ""), eval("A2", Answer::Yes, "")],
///     &CommentPolicy::DEFAULT,
/// );
/// assert_eq!(flagged.into_iter().collect::<Vec<_>>(), vec!["A1".to_string()]);
/// ```
pub fn validate<'a, I>(evaluations: I, policy: &CommentPolicy) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a ItemEvaluation>,
{
    let flagged: BTreeSet<String> = evaluations
        .into_iter()
        .filter(|ev| requires_comment(ev, policy) && ev.trimmed_comment().is_empty())
        .map(|ev| ev.item_code.clone())
        .collect();
    debug!("validate: flagged items: {:?}", flagged);
    flagged
}

/// Checks everything that must hold before a submission can be persisted.
///
/// All the violations are returned, not only the first one. The submission
/// can be written if and only if the list is empty.
pub fn validate_submission_preconditions(
    submission: &Submission,
    policy: &CommentPolicy,
) -> Vec<ViolationKind> {
    let mut res: Vec<ViolationKind> = Vec::new();
    if !submission.consent_given {
        res.push(ViolationKind::MissingConsent);
    }
    if submission.evaluator.name.trim().is_empty() {
        res.push(ViolationKind::MissingName);
    }
    if submission.evaluator.email.trim().is_empty() {
        res.push(ViolationKind::MissingEmail);
    }
    if !submission.instructions_acknowledged {
        res.push(ViolationKind::InstructionsNotAcknowledged);
    }
    let flagged = validate(submission.evaluations(), policy);
    if !flagged.is_empty() {
        res.push(ViolationKind::MissingComments(flagged.into_iter().collect()));
    }
    debug!(
        "validate_submission_preconditions: block {}: {:?}",
        submission.block_id, res
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn eval(code: &str, rel: u8, app: Answer, acc: Answer, comment: &str) -> ItemEvaluation {
        ItemEvaluation {
            item_code: code.to_string(),
            relevance: Relevance::new(rel).unwrap(),
            national_applicability: app,
            item_acceptance: acc,
            comment: if comment.is_empty() {
                None
            } else {
                Some(comment.to_string())
            },
        }
    }

    fn item(code: &str) -> QuestionnaireItem {
        QuestionnaireItem {
            section: "1".to_string(),
            code: code.to_string(),
            theme: "Renda".to_string(),
            prompt: format!("Pergunta {}", code),
            reference_answers: "".to_string(),
        }
    }

    fn submission(evals: Vec<ItemEvaluation>) -> Submission {
        Submission {
            block_id: "bloco1".to_string(),
            evaluator: Evaluator {
                name: "Ana Souza".to_string(),
                email: "ana@example.org".to_string(),
                tax_id: None,
            },
            consent_given: true,
            instructions_acknowledged: true,
            submitted_at: NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap(),
            responses: evals
                .into_iter()
                .map(|e| Response {
                    item: item(&e.item_code),
                    evaluation: e,
                })
                .collect(),
            extra_fields: vec![],
        }
    }

    #[test]
    fn rejection_without_comment_is_flagged() {
        let evals = vec![
            eval("A1", 4, Answer::Yes, Answer::No, ""),
            eval("A2", 4, Answer::Yes, Answer::Yes, ""),
        ];
        let flagged = validate(&evals, &CommentPolicy::DEFAULT);
        assert_eq!(flagged, BTreeSet::from(["A1".to_string()]));
    }

    #[test]
    fn adding_a_comment_clears_the_flag() {
        let evals = vec![
            eval("A1", 4, Answer::Yes, Answer::No, "needs rewording"),
            eval("A2", 4, Answer::Yes, Answer::Yes, ""),
        ];
        assert!(validate(&evals, &CommentPolicy::DEFAULT).is_empty());
        let sub = submission(evals);
        assert!(validate_submission_preconditions(&sub, &CommentPolicy::DEFAULT).is_empty());
    }

    #[test]
    fn not_applicable_without_comment_is_flagged() {
        let evals = vec![eval("B7", 5, Answer::No, Answer::Yes, "")];
        let flagged = validate(&evals, &CommentPolicy::DEFAULT);
        assert!(flagged.contains("B7"));
    }

    #[test]
    fn whitespace_comment_counts_as_empty() {
        let evals = vec![eval("A1", 3, Answer::No, Answer::No, "   \n\t")];
        assert_eq!(validate(&evals, &CommentPolicy::DEFAULT).len(), 1);
    }

    #[test]
    fn low_relevance_only_matters_under_strict_policy() {
        let evals = vec![eval("A3", 1, Answer::Yes, Answer::Yes, "")];
        assert!(validate(&evals, &CommentPolicy::DEFAULT).is_empty());
        assert_eq!(
            validate(&evals, &CommentPolicy::STRICT),
            BTreeSet::from(["A3".to_string()])
        );
        let evals = vec![eval("A4", 3, Answer::Yes, Answer::Yes, "")];
        assert!(validate(&evals, &CommentPolicy::STRICT).is_empty());
    }

    #[test]
    fn validation_ignores_order_and_duplicates() {
        let mut evals = vec![
            eval("C1", 2, Answer::No, Answer::Yes, ""),
            eval("C2", 5, Answer::Yes, Answer::Yes, ""),
            eval("C3", 4, Answer::Yes, Answer::No, ""),
            eval("C1", 2, Answer::No, Answer::Yes, ""),
        ];
        let first = validate(&evals, &CommentPolicy::DEFAULT);
        evals.reverse();
        let second = validate(&evals, &CommentPolicy::DEFAULT);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn all_precondition_violations_are_reported() {
        let mut sub = submission(vec![eval("A1", 4, Answer::Yes, Answer::No, "")]);
        sub.consent_given = false;
        sub.instructions_acknowledged = false;
        sub.evaluator.name = "  ".to_string();
        sub.evaluator.email = "".to_string();
        let violations = validate_submission_preconditions(&sub, &CommentPolicy::DEFAULT);
        assert_eq!(
            violations,
            vec![
                ViolationKind::MissingConsent,
                ViolationKind::MissingName,
                ViolationKind::MissingEmail,
                ViolationKind::InstructionsNotAcknowledged,
                ViolationKind::MissingComments(vec!["A1".to_string()]),
            ]
        );
    }

    #[test]
    fn relevance_out_of_range() {
        assert_eq!(Relevance::new(0), Err(ReviewErrors::InvalidRelevance(0)));
        assert_eq!(Relevance::new(6), Err(ReviewErrors::InvalidRelevance(6)));
        assert_eq!(Relevance::new(5).map(|r| r.score()), Ok(5));
    }

    #[test]
    fn answers_parse_both_languages() {
        assert_eq!(Answer::parse("Sim"), Ok(Answer::Yes));
        assert_eq!(Answer::parse(" Não "), Ok(Answer::No));
        assert_eq!(Answer::parse("nao"), Ok(Answer::No));
        assert_eq!(Answer::parse("YES"), Ok(Answer::Yes));
        assert!(Answer::parse("talvez").is_err());
    }
}
