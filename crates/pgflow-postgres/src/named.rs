//! Named-parameter translation
//!
//! Rewrites `$name` and `:name` placeholders into `$1..$n` and collects the
//! matching values in order. Text inside string literals, quoted
//! identifiers, dollar-quoted bodies and comments is left alone, as are
//! `::` casts and existing positional placeholders. Inside array subscripts
//! a colon is a slice bound, so only `$name` is rewritten there.

use pgflow_core::{CoreError, QueryParameters};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// SQL text with positional placeholders and the values to bind to them
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    /// Rewritten statement
    pub sql: String,
    /// Values for `$1..$n`, in order
    pub values: Vec<Value>,
}

/// Translate `sql` against `parameters`
///
/// Positional parameters are passed through unchanged. A named placeholder
/// with no matching key fails with `Missing Parameters: a, b`.
pub fn bind(sql: &str, parameters: &QueryParameters) -> Result<BoundQuery, CoreError> {
    match parameters {
        QueryParameters::Positional(values) => Ok(BoundQuery {
            sql: sql.to_string(),
            values: values.clone(),
        }),
        QueryParameters::Named(map) => bind_named(sql, map),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn bind_named(sql: &str, map: &Map<String, Value>) -> Result<BoundQuery, CoreError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut order: Vec<String> = Vec::new();
    let mut missing: BTreeSet<String> = BTreeSet::new();
    let mut subscript_depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                let escaped = i > 0 && matches!(chars[i - 1], 'E' | 'e');
                let end = skip_quoted(&chars, i, '\'', escaped);
                out.extend(&chars[i..end]);
                i = end;
            }
            '"' => {
                let end = skip_quoted(&chars, i, '"', false);
                out.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = find(&chars, i + 2, &['*', '/']).map_or(chars.len(), |p| p + 2);
                out.extend(&chars[i..end]);
                i = end;
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            '[' | ']' => {
                subscript_depth = if c == '[' {
                    subscript_depth + 1
                } else {
                    subscript_depth.saturating_sub(1)
                };
                out.push(c);
                i += 1;
            }
            '$' | ':'
                if (c == '$' || subscript_depth == 0)
                    && chars.get(i + 1).copied().is_some_and(is_ident_start) =>
            {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();

                // $tag$ opens a dollar-quoted body
                if c == '$' && chars.get(end) == Some(&'$') {
                    let tag: Vec<char> = chars[i..=end].to_vec();
                    let close = find(&chars, end + 1, &tag).map_or(chars.len(), |p| p + tag.len());
                    out.extend(&chars[i..close]);
                    i = close;
                    continue;
                }

                if map.contains_key(&name) {
                    let index = match order.iter().position(|n| *n == name) {
                        Some(pos) => pos + 1,
                        None => {
                            order.push(name);
                            order.len()
                        }
                    };
                    out.push('$');
                    out.push_str(&index.to_string());
                } else {
                    missing.insert(name);
                }
                i = end;
            }
            '$' if chars.get(i + 1) == Some(&'$') => {
                let close = find(&chars, i + 2, &['$', '$']).map_or(chars.len(), |p| p + 2);
                out.extend(&chars[i..close]);
                i = close;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    if !missing.is_empty() {
        let names: Vec<String> = missing.into_iter().collect();
        return Err(CoreError::ExecutionError(format!(
            "Missing Parameters: {}",
            names.join(", ")
        )));
    }

    let values = order
        .iter()
        .map(|name| map.get(name).cloned().unwrap_or(Value::Null))
        .collect();
    Ok(BoundQuery { sql: out, values })
}

/// Index just past the closing quote of the literal opened at `start`
fn skip_quoted(chars: &[char], start: usize, quote: char, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if backslash_escapes && c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            // doubled quote is an escaped quote
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn find(chars: &[char], from: usize, needle: &[char]) -> Option<usize> {
    if from >= chars.len() {
        return None;
    }
    chars[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(value: Value) -> QueryParameters {
        match value {
            Value::Object(map) => QueryParameters::Named(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_dollar_names() {
        let bound = bind(
            "SELECT * FROM users WHERE id = $id AND name = $name",
            &named(json!({"id": 1, "name": "a"})),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM users WHERE id = $1 AND name = $2");
        assert_eq!(bound.values, vec![json!(1), json!("a")]);
    }

    #[test]
    fn test_colon_names_and_repeats() {
        let bound = bind(
            "SELECT :a, :b, :a",
            &named(json!({"a": true, "b": null, "unused": 3})),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT $1, $2, $1");
        assert_eq!(bound.values, vec![json!(true), Value::Null]);
    }

    #[test]
    fn test_casts_and_positional_untouched() {
        let bound = bind("SELECT 1::int, :v::text", &named(json!({"v": "x"}))).unwrap();
        assert_eq!(bound.sql, "SELECT 1::int, $1::text");
        assert_eq!(bound.values, vec![json!("x")]);

        let bound = bind("SELECT $1", &QueryParameters::default()).unwrap();
        assert_eq!(bound.sql, "SELECT $1");
        assert!(bound.values.is_empty());
    }

    #[test]
    fn test_literals_and_comments_untouched() {
        let sql = "SELECT ':a', \"$b\", E'it\\'s :c', 'it''s $d' -- :e\n/* $f */ FROM t WHERE x = $x";
        let bound = bind(sql, &named(json!({"x": 1}))).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT ':a', \"$b\", E'it\\'s :c', 'it''s $d' -- :e\n/* $f */ FROM t WHERE x = $1"
        );
    }

    #[test]
    fn test_dollar_quoted_bodies_untouched() {
        let sql = "DO $body$ BEGIN PERFORM $x; END $body$; SELECT $$ :y $$, :z";
        let bound = bind(sql, &named(json!({"z": 2}))).unwrap();
        assert_eq!(bound.sql, "DO $body$ BEGIN PERFORM $x; END $body$; SELECT $$ :y $$, $1");
        assert_eq!(bound.values, vec![json!(2)]);
    }

    #[test]
    fn test_array_slices_keep_their_colon() {
        let bound = bind("SELECT arr[1:n], arr[:n] FROM t WHERE k = :k", &named(json!({"k": 1}))).unwrap();
        assert_eq!(bound.sql, "SELECT arr[1:n], arr[:n] FROM t WHERE k = $1");

        let bound = bind("SELECT arr[$lo:$hi]", &named(json!({"lo": 1, "hi": 2}))).unwrap();
        assert_eq!(bound.sql, "SELECT arr[$1:$2]");
        assert_eq!(bound.values, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_missing_parameters_are_listed() {
        let err = bind("SELECT $b, $a, $b, $c", &named(json!({"c": 1}))).unwrap_err();
        assert_eq!(err, CoreError::ExecutionError("Missing Parameters: a, b".to_string()));
    }

    #[test]
    fn test_no_parameters() {
        let bound = bind("SELECT 1", &QueryParameters::default()).unwrap();
        assert_eq!(bound.sql, "SELECT 1");
        assert!(bound.values.is_empty());
    }

    #[test]
    fn test_positional_passthrough() {
        let params = QueryParameters::Positional(vec![json!(1), json!("two")]);
        let bound = bind("SELECT $1, $2", &params).unwrap();
        assert_eq!(bound.sql, "SELECT $1, $2");
        assert_eq!(bound.values, vec![json!(1), json!("two")]);
    }
}
