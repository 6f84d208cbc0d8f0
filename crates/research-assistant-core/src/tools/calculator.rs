//! Restricted arithmetic evaluator.
//!
//! Synchronous only. The async dispatcher moves it onto a blocking worker.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ToolError, ToolInvocation, ToolName};

const ALLOWED: &str = "0123456789+-*/.() ";

/// A `.` opening a number, e.g. `.5` or `(-.25`.
static BARE_FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[^0-9.])\.([0-9])").expect("invalid fraction regex"));

/// Evaluate `expression` after checking its character set.
pub fn calculate(expression: &str) -> ToolInvocation {
    match evaluate(expression) {
        Ok(value) => ToolInvocation::ok(
            ToolName::Calculate,
            expression,
            format!("{expression} = {}", format_number(value)),
        ),
        Err(ToolError::Validation(message)) => {
            tracing::debug!(%expression, "calculator rejected input");
            ToolInvocation::failed(ToolName::Calculate, expression, format!("Error: {message}"))
        }
        Err(err) => ToolInvocation::failed(
            ToolName::Calculate,
            expression,
            format!("Error evaluating expression: {err}"),
        ),
    }
}

fn evaluate(expression: &str) -> Result<f64, ToolError> {
    // Must run before anything interprets the input.
    if !expression.chars().all(|c| ALLOWED.contains(c)) {
        return Err(ToolError::Validation(
            "Invalid characters in expression".into(),
        ));
    }
    if expression.trim().is_empty() {
        return Err(ToolError::Evaluation("empty expression".into()));
    }
    if expression.contains("//") {
        return Err(ToolError::Evaluation(
            "floor division `//` is not supported; use `/`".into(),
        ));
    }

    let normalized = BARE_FRACTION
        .replace_all(&expression.replace("**", "^"), "${1}0.${2}")
        .into_owned();
    let value =
        meval::eval_str(&normalized).map_err(|err| ToolError::Evaluation(err.to_string()))?;

    if value.is_nan() || value.is_infinite() {
        return Err(ToolError::Evaluation(
            "division by zero or result out of range".into(),
        ));
    }
    Ok(value)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
