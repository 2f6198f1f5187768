//! Rendering of `where` / `join_where` predicates.
//!
//! | value                         | predicate                         |
//! |-------------------------------|-----------------------------------|
//! | scalar                        | `$eq`                             |
//! | `null`                        | is null                           |
//! | array                         | `$in`                             |
//! | object of `$` operators       | every operator, ANDed             |
//! | any other object              | JSON containment (`@>`)           |

use super::{Params, Predicate, QueryBuildError};
use searchcore_types::SqlParam;
use serde_json::Value;

struct Target<'p> {
    alias: String,
    path: &'p [String],
    source: &'p str,
}

impl Target<'_> {
    fn is_id(&self) -> bool {
        self.path.len() == 1 && self.path[0] == "id"
    }

    fn json(&self, params: &mut Params) -> String {
        let path = params.bind(SqlParam::TextArray(self.path.to_vec()));
        format!("{}.data #> {path}", self.alias)
    }

    fn text(&self, params: &mut Params) -> String {
        let path = params.bind(SqlParam::TextArray(self.path.to_vec()));
        format!("{}.data #>> {path}", self.alias)
    }

    /// Numeric view of the value; non-number values read as NULL.
    fn numeric(&self, params: &mut Params) -> String {
        let path = params.bind(SqlParam::TextArray(self.path.to_vec()));
        format!(
            "CASE WHEN jsonb_typeof({alias}.data #> {path}) = 'number' THEN ({alias}.data #>> {path})::numeric END",
            alias = self.alias
        )
    }

    fn invalid(&self, detail: impl Into<String>) -> QueryBuildError {
        QueryBuildError::InvalidFilter {
            path: self.source.to_string(),
            detail: detail.into(),
        }
    }
}

pub(super) fn render(predicate: &Predicate, params: &mut Params) -> Result<String, QueryBuildError> {
    let target = Target {
        alias: format!("t{}", predicate.node),
        path: &predicate.path,
        source: &predicate.source,
    };

    match &predicate.value {
        Value::Object(entries) if entries.keys().any(|key| key.starts_with('$')) => {
            if !entries.keys().all(|key| key.starts_with('$')) {
                return Err(target.invalid("operators cannot be mixed with fields"));
            }
            let mut clauses = entries
                .iter()
                .map(|(operator, operand)| render_operator(&target, operator, operand, params))
                .collect::<Result<Vec<_>, _>>()?;
            if clauses.len() == 1 {
                Ok(clauses.remove(0))
            } else {
                Ok(format!("({})", clauses.join(" AND ")))
            }
        }
        Value::Object(_) => {
            let column = target.json(params);
            let value = params.bind(SqlParam::Json(predicate.value.clone()));
            Ok(format!("({column}) @> {value}"))
        }
        Value::Array(_) => render_operator(&target, "$in", &predicate.value, params),
        scalar => render_operator(&target, "$eq", scalar, params),
    }
}

fn comparison(operator: &str) -> Option<&'static str> {
    match operator {
        "$gt" => Some(">"),
        "$gte" => Some(">="),
        "$lt" => Some("<"),
        "$lte" => Some("<="),
        _ => None,
    }
}

fn render_operator(
    target: &Target<'_>,
    operator: &str,
    operand: &Value,
    params: &mut Params,
) -> Result<String, QueryBuildError> {
    match (operator, operand) {
        ("$eq", Value::String(id)) if target.is_id() => {
            let id = params.bind(SqlParam::Text(id.clone()));
            Ok(format!("{}.id = {id}", target.alias))
        }
        ("$eq", Value::Null) => {
            let column = target.json(params);
            Ok(format!("({column} IS NULL OR {column} = 'null'::jsonb)"))
        }
        ("$eq", _) => {
            let column = target.json(params);
            let value = params.bind(SqlParam::Json(operand.clone()));
            Ok(format!("({column}) = {value}"))
        }
        ("$ne", Value::Null) => {
            let column = target.json(params);
            Ok(format!("({column} IS NOT NULL AND {column} <> 'null'::jsonb)"))
        }
        ("$ne", _) => {
            let column = target.json(params);
            let value = params.bind(SqlParam::Json(operand.clone()));
            Ok(format!("({column}) IS DISTINCT FROM {value}"))
        }
        ("$in" | "$nin", Value::Array(items)) => {
            let negated = operator == "$nin";
            if target.is_id() && items.iter().all(Value::is_string) {
                let ids = items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                let ids = params.bind(SqlParam::TextArray(ids));
                let clause = format!("{}.id = ANY({ids})", target.alias);
                return Ok(if negated { format!("NOT ({clause})") } else { clause });
            }
            if items.is_empty() {
                return Ok(if negated { "TRUE" } else { "FALSE" }.to_string());
            }
            let column = target.json(params);
            let values = params.bind(SqlParam::Json(operand.clone()));
            if negated {
                Ok(format!(
                    "({column} IS NULL OR ({column}) NOT IN (SELECT jsonb_array_elements({values})))"
                ))
            } else {
                Ok(format!("({column}) IN (SELECT jsonb_array_elements({values}))"))
            }
        }
        ("$in" | "$nin", _) => Err(target.invalid(format!("{operator} expects an array"))),
        ("$like" | "$ilike", Value::String(pattern)) => {
            let keyword = if operator == "$like" { "LIKE" } else { "ILIKE" };
            let column = target.text(params);
            let pattern = params.bind(SqlParam::Text(pattern.clone()));
            Ok(format!("({column}) {keyword} {pattern}"))
        }
        ("$like" | "$ilike", _) => Err(target.invalid(format!("{operator} expects a string"))),
        _ => {
            let Some(symbol) = comparison(operator) else {
                return Err(QueryBuildError::UnknownOperator {
                    path: target.source.to_string(),
                    operator: operator.to_string(),
                });
            };
            match operand {
                Value::Number(number) => {
                    let column = target.numeric(params);
                    let value = params.bind(SqlParam::Text(number.to_string()));
                    Ok(format!("({column}) {symbol} ({value})::numeric"))
                }
                Value::String(text) => {
                    let column = target.text(params);
                    let value = params.bind(SqlParam::Text(text.clone()));
                    Ok(format!("({column}) {symbol} {value}"))
                }
                _ => Err(target.invalid(format!("{operator} expects a number or a string"))),
            }
        }
    }
}
