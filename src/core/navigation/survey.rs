use crate::core::error::AppError;
use crate::core::navigation::rules::CohortMutation;
use crate::core::navigation::sentinel;
use crate::core::task::answer::{convert_scalar, convert_sequence, AnswerType, BaseType, ComparableValue};
use crate::core::task::result::AnswerResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Default tolerance for decimal equality comparisons.
pub const DEFAULT_ACCURACY: f64 = 1e-5;

/// Comparison applied by a survey rule, identified on the wire by a
/// two-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurveyRuleOperator {
    /// Match when the question was skipped (no answer value).
    #[serde(rename = "de")]
    Skip,
    #[serde(rename = "eq")]
    Equal,
    #[serde(rename = "ne")]
    NotEqual,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "le")]
    LessThanEqual,
    #[serde(rename = "ge")]
    GreaterThanEqual,
    /// Match when the answer is anything other than the matching value. For
    /// sequence answers this is non-membership.
    #[serde(rename = "ot")]
    OtherThan,
}

/// A single declarative rule attached to an input field.
///
/// A rule can redirect navigation (`skip_to_identifier`), assign or retract
/// a cohort (`cohort`), or both.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComparableSurveyRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_to_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_answer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_operator: Option<SurveyRuleOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl ComparableSurveyRule {
    /// The operator to apply: an explicit one, else `equal` when there is a
    /// matching answer, else `skip`.
    pub fn effective_operator(&self) -> SurveyRuleOperator {
        self.rule_operator.unwrap_or(if self.matching_answer.is_some() {
            SurveyRuleOperator::Equal
        } else {
            SurveyRuleOperator::Skip
        })
    }

    /// Check decode-time consistency of the rule.
    pub fn validate(&self) -> Result<(), AppError> {
        let op = self.effective_operator();
        if op == SurveyRuleOperator::Skip && self.matching_answer.is_some() {
            return Err(AppError::validation(
                "a skip-operator rule cannot carry a matching answer",
            ));
        }
        if op != SurveyRuleOperator::Skip && self.matching_answer.is_none() {
            return Err(AppError::validation(
                "a comparison rule requires a matching answer",
            ));
        }
        if op == SurveyRuleOperator::Skip
            && self.skip_to_identifier.is_none()
            && self.cohort.is_none()
        {
            return Err(AppError::validation(
                "a skip rule without a target or cohort has no effect",
            ));
        }
        Ok(())
    }

    /// Evaluate the navigation effect of this rule, returning the identifier
    /// to skip to when the rule fires.
    pub fn evaluate_rule(&self, answer: Option<&AnswerResult>) -> Option<String> {
        if !self.matches(answer) {
            return None;
        }
        if answer_value(answer).is_none() {
            // A skipped question uses the declared target as-is.
            return self.skip_to_identifier.clone();
        }
        if self.cohort.is_some() && self.skip_to_identifier.is_none() {
            return None;
        }
        Some(
            self.skip_to_identifier
                .clone()
                .unwrap_or_else(|| sentinel::EXIT.to_string()),
        )
    }

    /// Evaluate the cohort effect of this rule. A match adds the cohort, a
    /// non-match retracts it.
    pub fn evaluate_cohorts(&self, answer: Option<&AnswerResult>) -> Option<CohortMutation> {
        let cohort = self.cohort.clone()?;
        let mut mutation = CohortMutation::default();
        if self.matches(answer) {
            mutation.add.insert(cohort);
        } else {
            mutation.remove.insert(cohort);
        }
        Some(mutation)
    }

    /// Whether the recorded answer satisfies this rule's comparison.
    pub fn matches(&self, answer: Option<&AnswerResult>) -> bool {
        let op = self.effective_operator();
        let Some(value) = answer_value(answer) else {
            return op == SurveyRuleOperator::Skip;
        };
        if op == SurveyRuleOperator::Skip {
            return false;
        }
        let Some(matching) = self.matching_answer.as_ref() else {
            return false;
        };
        let answer_type = answer
            .map(|a| a.answer_type.clone())
            .unwrap_or_default();
        if answer_type.base_type == BaseType::Data {
            return false;
        }
        if answer_type.is_array() || value.is_array() || matching.is_array() {
            return self.matches_sequence(value, matching, &answer_type, op);
        }
        self.matches_scalar(value, matching, &answer_type, op)
    }

    fn matches_scalar(
        &self,
        value: &Value,
        matching: &Value,
        answer_type: &AnswerType,
        op: SurveyRuleOperator,
    ) -> bool {
        let (Some(answer), Some(matching)) = (
            convert_scalar(value, answer_type),
            convert_scalar(matching, answer_type),
        ) else {
            return false;
        };
        let is_equal = self.values_equal(&answer, &matching, answer_type);
        match op {
            SurveyRuleOperator::Skip => false,
            SurveyRuleOperator::Equal => is_equal,
            SurveyRuleOperator::NotEqual | SurveyRuleOperator::OtherThan => !is_equal,
            SurveyRuleOperator::LessThan => answer.compare(&matching) == Some(Ordering::Less),
            SurveyRuleOperator::GreaterThan => answer.compare(&matching) == Some(Ordering::Greater),
            SurveyRuleOperator::LessThanEqual => {
                matches!(answer.compare(&matching), Some(Ordering::Less | Ordering::Equal))
            }
            SurveyRuleOperator::GreaterThanEqual => {
                matches!(answer.compare(&matching), Some(Ordering::Greater | Ordering::Equal))
            }
        }
    }

    /// Membership comparison for sequence answers. `equal` fires when the
    /// answer and matching sets intersect, `otherThan` when they do not.
    /// Ordering operators do not apply to sequences.
    fn matches_sequence(
        &self,
        value: &Value,
        matching: &Value,
        answer_type: &AnswerType,
        op: SurveyRuleOperator,
    ) -> bool {
        let (Some(answers), Some(matches)) = (
            convert_sequence(value, answer_type),
            convert_sequence(matching, answer_type),
        ) else {
            return false;
        };
        let intersects = answers.iter().any(|answer| {
            matches
                .iter()
                .any(|matching| self.values_equal(answer, matching, answer_type))
        });
        match op {
            SurveyRuleOperator::Equal => intersects,
            SurveyRuleOperator::NotEqual | SurveyRuleOperator::OtherThan => !intersects,
            _ => false,
        }
    }

    fn values_equal(
        &self,
        answer: &ComparableValue,
        matching: &ComparableValue,
        answer_type: &AnswerType,
    ) -> bool {
        match (answer, matching) {
            (ComparableValue::Number(a), ComparableValue::Number(b))
                if answer_type.base_type == BaseType::Decimal || self.accuracy.is_some() =>
            {
                (a - b).abs() <= self.accuracy.unwrap_or(DEFAULT_ACCURACY)
            }
            _ => answer.compare(matching) == Some(Ordering::Equal),
        }
    }
}

fn answer_value(answer: Option<&AnswerResult>) -> Option<&Value> {
    answer
        .and_then(|a| a.value.as_ref())
        .filter(|v| !v.is_null())
}

/// Union the cohort effects of a list of rules over one answer.
pub fn evaluate_cohorts(
    rules: &[ComparableSurveyRule],
    answer: Option<&AnswerResult>,
) -> Option<CohortMutation> {
    let mut combined = CohortMutation::default();
    for rule in rules {
        if let Some(mutation) = rule.evaluate_cohorts(answer) {
            combined.merge(mutation);
        }
    }
    (!combined.is_empty()).then_some(combined)
}

/// Identifiers of cohorts named by any rule in the list.
pub fn cohorts_in(rules: &[ComparableSurveyRule]) -> HashSet<String> {
    rules.iter().filter_map(|rule| rule.cohort.clone()).collect()
}
