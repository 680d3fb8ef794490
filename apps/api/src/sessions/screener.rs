//! Screener evaluation: checks a candidate's pre-interview answers against
//! the job's qualifying rules. The result is recorded on the session; it does
//! not block the interview.

use serde_json::Value;

use crate::models::job::{ScreenerCondition, ScreenerRule};
use crate::models::session::{RuleOutcome, ScreenerAnswer, ScreenerEvaluation};

/// Returns `None` when the job has no screener rules.
pub fn evaluate_screener(
    rules: &[ScreenerRule],
    answers: &[ScreenerAnswer],
) -> Option<ScreenerEvaluation> {
    if rules.is_empty() {
        return None;
    }

    let results: Vec<RuleOutcome> = rules
        .iter()
        .map(|rule| {
            let answer = answers
                .iter()
                .find(|a| a.question_id == rule.question_id)
                .map(|a| &a.answer);
            evaluate_rule(rule, answer)
        })
        .collect();

    Some(ScreenerEvaluation {
        passed: results.iter().all(|r| r.passed),
        results,
    })
}

fn evaluate_rule(rule: &ScreenerRule, answer: Option<&Value>) -> RuleOutcome {
    let outcome = |passed: bool, reason: Option<String>| RuleOutcome {
        question_id: rule.question_id.clone(),
        passed,
        reason,
    };

    let Some(answer) = answer.filter(|a| !is_blank(a)) else {
        return outcome(false, Some("No answer provided".to_string()));
    };

    match &rule.condition {
        ScreenerCondition::Required => outcome(true, None),
        ScreenerCondition::YesNo { expected } => match as_bool(answer) {
            Some(value) if value == *expected => outcome(true, None),
            Some(_) => outcome(
                false,
                Some(format!("Expected '{}'", if *expected { "yes" } else { "no" })),
            ),
            None => outcome(false, Some("Answer must be yes or no".to_string())),
        },
        ScreenerCondition::MinNumber { min } => match as_number(answer) {
            Some(value) if value >= *min => outcome(true, None),
            Some(value) => outcome(false, Some(format!("{value} is below the minimum of {min}"))),
            None => outcome(false, Some("Answer must be a number".to_string())),
        },
        ScreenerCondition::OneOf { options } => {
            let text = as_text(answer);
            if options
                .iter()
                .any(|opt| opt.trim().eq_ignore_ascii_case(text.trim()))
            {
                outcome(true, None)
            } else {
                outcome(false, Some(format!("'{text}' is not an accepted option")))
            }
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" => Some(true),
            "no" | "n" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
