//! Named-placeholder rewriting.
//!
//! Statements are written with `%(name)s` placeholders. `PostgreSQL` only
//! understands positional `$n` parameters, so before execution the
//! statement is rewritten and the matching values are collected in
//! position order for binding. Values are never spliced into the SQL.
//!
//! `%%` stands for a literal `%`. A name used twice maps to the same
//! position.

use butler_types::{Params, Value};

use crate::error::DbError;

/// A statement rewritten to positional parameters.
#[derive(Debug, PartialEq)]
pub struct BoundStatement<'p> {
    /// SQL with `$1..$n` placeholders.
    pub sql: String,
    /// Values in placeholder order.
    pub values: Vec<&'p Value>,
}

/// Rewrite `%(name)s` placeholders to `$n` and collect their values.
///
/// # Errors
///
/// Returns [`DbError::Statement`] if a placeholder is malformed or names a
/// parameter missing from `params`, or if a lone `%` appears.
pub fn bind_named<'p>(statement: &str, params: &'p Params) -> Result<BoundStatement<'p>, DbError> {
    let mut sql = String::with_capacity(statement.len());
    let mut names: Vec<&str> = Vec::new();
    let mut values: Vec<&'p Value> = Vec::new();
    let mut chars = statement.char_indices();

    while let Some((pos, c)) = chars.next() {
        if c != '%' {
            sql.push(c);
            continue;
        }
        match chars.next() {
            Some((_, '%')) => sql.push('%'),
            Some((open, '(')) => {
                let start = open.saturating_add(1);
                let mut end = None;
                for (i, ch) in chars.by_ref() {
                    if ch == ')' {
                        end = Some(i);
                        break;
                    }
                }
                let end = end.ok_or_else(|| {
                    DbError::statement(format!("unterminated placeholder at offset {pos}"))
                })?;
                if !matches!(chars.next(), Some((_, 's'))) {
                    return Err(DbError::statement(format!(
                        "placeholder at offset {pos} must end in ')s'"
                    )));
                }
                let name = statement.get(start..end).unwrap_or_default();
                let index = if let Some(existing) = names.iter().position(|n| *n == name) {
                    existing
                } else {
                    let value = params.get(name).ok_or_else(|| {
                        DbError::statement(format!("missing value for parameter '{name}'"))
                    })?;
                    names.push(name);
                    values.push(value);
                    names.len().saturating_sub(1)
                };
                sql.push('$');
                sql.push_str(&index.saturating_add(1).to_string());
            }
            _ => {
                return Err(DbError::statement(format!(
                    "unescaped '%' at offset {pos} (use '%%' for a literal)"
                )));
            }
        }
    }

    Ok(BoundStatement { sql, values })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn rewrites_in_first_use_order() {
        let p = params(&[("id", Value::Int(5)), ("name", Value::from("ann"))]);
        let bound = bind_named(
            "INSERT INTO users (id, name) VALUES (%(id)s, %(name)s)",
            &p,
        )
        .unwrap();
        assert_eq!(bound.sql, "INSERT INTO users (id, name) VALUES ($1, $2)");
        assert_eq!(bound.values, vec![&Value::Int(5), &Value::from("ann")]);
    }

    #[test]
    fn repeated_name_reuses_position() {
        let p = params(&[("c", Value::from("Rent"))]);
        let bound = bind_named("SELECT %(c)s WHERE a = %(c)s", &p).unwrap();
        assert_eq!(bound.sql, "SELECT $1 WHERE a = $1");
        assert_eq!(bound.values.len(), 1);
    }

    #[test]
    fn double_percent_is_literal() {
        let p = params(&[("c", Value::from("Ren"))]);
        let bound = bind_named("SELECT 1 WHERE c LIKE %(c)s || '%%'", &p).unwrap();
        assert_eq!(bound.sql, "SELECT 1 WHERE c LIKE $1 || '%'");
    }

    #[test]
    fn values_are_never_spliced() {
        let p = params(&[("c", Value::from("x'; DROP TABLE spend_log; --"))]);
        let bound = bind_named("SELECT * FROM spend_log WHERE category = %(c)s", &p).unwrap();
        assert!(!bound.sql.contains("DROP"));
    }

    #[test]
    fn missing_parameter_is_a_statement_error() {
        let err = bind_named("SELECT %(nope)s", &Params::new()).unwrap_err();
        assert!(matches!(err, DbError::Statement { .. }));
    }

    #[test]
    fn malformed_placeholders_are_rejected() {
        let p = params(&[("a", Value::Int(1))]);
        assert!(bind_named("SELECT %(a)d", &p).is_err());
        assert!(bind_named("SELECT %(a", &p).is_err());
        assert!(bind_named("SELECT 5 % 2", &p).is_err());
    }
}
