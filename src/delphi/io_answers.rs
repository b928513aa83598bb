// The JSON answer sheet read by the `submit` command.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;

use serde::Deserialize;
use snafu::prelude::*;

use crate::delphi::*;

#[derive(Deserialize, Debug, Clone)]
pub struct EvaluatorEntry {
    pub name: String,
    pub email: String,
    #[serde(rename = "taxId", default)]
    pub tax_id: Option<String>,
}

impl EvaluatorEntry {
    pub fn to_evaluator(&self) -> Evaluator {
        Evaluator {
            name: self.name.clone(),
            email: self.email.clone(),
            tax_id: self.tax_id.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct EvaluationEntry {
    pub code: String,
    pub relevance: i64,
    #[serde(rename = "nationalApplicability")]
    pub national_applicability: String,
    #[serde(rename = "itemAcceptance")]
    pub item_acceptance: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl EvaluationEntry {
    pub fn to_evaluation(&self) -> Result<ItemEvaluation, ReviewErrors> {
        let score = u8::try_from(self.relevance)
            .map_err(|_| ReviewErrors::InvalidRelevance(self.relevance))?;
        Ok(ItemEvaluation {
            item_code: self.code.trim().to_string(),
            relevance: Relevance::new(score)?,
            national_applicability: Answer::parse(&self.national_applicability)?,
            item_acceptance: Answer::parse(&self.item_acceptance)?,
            comment: self.comment.clone(),
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AnswerSheet {
    pub evaluator: EvaluatorEntry,
    #[serde(rename = "consentGiven", default)]
    pub consent_given: bool,
    #[serde(rename = "instructionsAcknowledged", default)]
    pub instructions_acknowledged: bool,
    pub evaluations: Vec<EvaluationEntry>,
    #[serde(rename = "extraFields", default)]
    pub extra_fields: BTreeMap<String, String>,
}

pub fn read_answer_sheet(path: &str) -> DelphiResult<AnswerSheet> {
    let file = File::open(path).context(OpeningJsonSnafu { path })?;
    let reader = BufReader::new(file);
    let sheet: AnswerSheet = serde_json::from_reader(reader).context(ParsingJsonSnafu { path })?;
    info!(
        "Read answer sheet {}: {} evaluations",
        path,
        sheet.evaluations.len()
    );
    Ok(sheet)
}
