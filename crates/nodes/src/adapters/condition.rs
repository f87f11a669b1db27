//! Branch evaluation. No external call is made.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use super::{parse_inputs, AdapterOutput, CapabilityAdapter};
use crate::template::{self, Variables};
use crate::{AdapterError, ConditionConfig};

#[derive(Debug, Default)]
pub struct ConditionAdapter;

impl ConditionAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CapabilityAdapter for ConditionAdapter {
    async fn invoke(
        &self,
        _operation: &str,
        inputs: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> Result<AdapterOutput, AdapterError> {
        if cancel.is_cancelled() {
            return Err(AdapterError::cancelled());
        }

        let config: ConditionConfig = parse_inputs(inputs)?;
        let result = match &config.comparison {
            Some(comparison) => comparison.evaluate(),
            None => evaluate(&config.expression),
        };
        let decision = if result { &config.if_true } else { &config.if_false };

        Ok(AdapterOutput::new(
            json!({
                "expression": config.expression,
                "result": result,
                "decision": decision.to_string(),
            }),
            0.0,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "contains")]
    Contains,
}

impl Operator {
    /// Match order at a single position; two-character operators precede
    /// their one-character prefixes.
    const ALL: [Operator; 7] = [
        Operator::Ge,
        Operator::Le,
        Operator::Eq,
        Operator::Ne,
        Operator::Contains,
        Operator::Gt,
        Operator::Lt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq       => "==",
            Self::Ne       => "!=",
            Self::Ge       => ">=",
            Self::Le       => "<=",
            Self::Gt       => ">",
            Self::Lt       => "<",
            Self::Contains => "contains",
        }
    }

    /// Text matched in an expression. `contains` needs surrounding spaces.
    fn token(self) -> &'static str {
        match self {
            Self::Contains => " contains ",
            other => other.as_str(),
        }
    }
}

/// An expression split into operands around the operator the author wrote.
///
/// Splitting happens before template resolution, so operator characters in
/// substituted data never move the split point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub lhs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<Operator>,
    #[serde(default)]
    pub rhs: String,
}

impl Comparison {
    /// Split on the leftmost operator found outside `{{…}}` tokens and
    /// quoted operands. Without an operator the whole expression is a bare
    /// operand.
    pub fn parse(expression: &str) -> Self {
        let expr = expression.trim();
        match find_operator(expr) {
            Some((pos, op)) => Self {
                lhs: expr[..pos].trim().to_owned(),
                op: Some(op),
                rhs: expr[pos + op.token().len()..].trim().to_owned(),
            },
            None => Self { lhs: expr.to_owned(), op: None, rhs: String::new() },
        }
    }

    /// Resolve each operand on its own; the operator is kept as parsed.
    pub fn resolve(&self, vars: &Variables, warnings: &mut Vec<String>) -> Self {
        Self {
            lhs: template::resolve_str(&self.lhs, vars, warnings),
            op: self.op,
            rhs: template::resolve_str(&self.rhs, vars, warnings),
        }
    }

    /// Both sides compare numerically when they parse as numbers, otherwise
    /// as strings with surrounding quotes removed. A bare operand is false
    /// when empty, `false`, `0` or `null`.
    pub fn evaluate(&self) -> bool {
        let lhs = operand(&self.lhs);
        match self.op {
            Some(op) => compare(lhs, op, operand(&self.rhs)),
            None => truthy(lhs),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Some(op) => write!(f, "{} {} {}", self.lhs, op.as_str(), self.rhs),
            None => f.write_str(&self.lhs),
        }
    }
}

/// Evaluate a literal expression with `==`, `!=`, `>=`, `<=`, `>`, `<` or
/// `contains`, or a bare operand. See [`Comparison::evaluate`].
pub fn evaluate(expression: &str) -> bool {
    Comparison::parse(expression).evaluate()
}

fn find_operator(expr: &str) -> Option<(usize, Operator)> {
    let bytes = expr.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let rest = &expr[i..];
        match quote {
            Some(q) => {
                if bytes[i] == q {
                    quote = None;
                }
            }
            None => {
                if rest.starts_with("{{") {
                    if let Some(end) = rest.find("}}") {
                        i += end + 2;
                        continue;
                    }
                }
                if opens_quote(expr, i) {
                    quote = Some(bytes[i]);
                } else if let Some(op) =
                    Operator::ALL.into_iter().find(|op| rest.starts_with(op.token()))
                {
                    return Some((i, op));
                }
            }
        }
        i += rest.chars().next().map_or(1, char::len_utf8);
    }

    None
}

/// A quote opens a quoted operand only at the start of a word and only when
/// it is closed later, so apostrophes inside prose are ignored.
fn opens_quote(expr: &str, i: usize) -> bool {
    let bytes = expr.as_bytes();
    let q = bytes[i];
    (q == b'"' || q == b'\'')
        && (i == 0 || bytes[i - 1].is_ascii_whitespace())
        && bytes[i + 1..].contains(&q)
}

fn operand(raw: &str) -> &str {
    let s = raw.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn compare(lhs: &str, op: Operator, rhs: &str) -> bool {
    if op == Operator::Contains {
        return lhs.contains(rhs);
    }

    match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(l), Ok(r)) => match op {
            Operator::Eq => l == r,
            Operator::Ne => l != r,
            Operator::Ge => l >= r,
            Operator::Le => l <= r,
            Operator::Gt => l > r,
            Operator::Lt => l < r,
            Operator::Contains => false,
        },
        _ => match op {
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Lt => lhs < rhs,
            Operator::Contains => false,
        },
    }
}

fn truthy(value: &str) -> bool {
    !(value.is_empty()
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("null")
        || value.parse::<f64>().map(|n| n == 0.0).unwrap_or(false))
}
