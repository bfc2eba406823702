use std::borrow::Cow;

mod parsers;
mod scanner;

use parsers::{BLOCK_CLOSE, BLOCK_OPEN, LINE_COMMENT, closes_dollar_quote, dollar_tag, token_at};
use scanner::{State, scan_identifier};

use crate::error::SqlMapperError;
use crate::params::NamedParams;
use crate::types::RowValues;

/// Native positional placeholder style of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
}

impl PlaceholderStyle {
    fn push_marker(self, buf: &mut String, position: usize) {
        buf.push(match self {
            PlaceholderStyle::Postgres => '$',
            PlaceholderStyle::Sqlite => '?',
        });
        buf.push_str(&position.to_string());
    }
}

/// A template whose `:name` placeholders were rewritten to positional markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement<'a> {
    /// SQL with positional markers. Borrowed when the template had no placeholders.
    pub sql: Cow<'a, str>,
    /// Placeholder names in marker order; marker `N` binds `names[N - 1]`.
    pub names: Vec<String>,
}

/// A statement ready for the driver: positional SQL plus values in marker order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement<'a> {
    pub sql: Cow<'a, str>,
    pub values: Vec<RowValues>,
}

impl<'a> BoundStatement<'a> {
    /// Rewrite `template` for `style` and pull each placeholder's value from `params`.
    ///
    /// A name used several times binds once and reuses its marker. Entries in `params` that
    /// the template never references are ignored.
    ///
    /// # Errors
    /// Returns `SqlMapperError::MissingParameter` naming the first placeholder without a value.
    pub fn bind(
        template: &'a str,
        params: &NamedParams,
        style: PlaceholderStyle,
    ) -> Result<Self, SqlMapperError> {
        let parsed = parse_named(template, style);
        let values = parsed
            .names
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| SqlMapperError::MissingParameter(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BoundStatement {
            sql: parsed.sql,
            values,
        })
    }
}

/// Rewrite `:name` placeholders into `style` markers.
///
/// The scanner leaves quoted strings, quoted identifiers, comments, dollar-quoted bodies and
/// `::type` casts untouched. Returns a borrowed `Cow` when no placeholder was found.
#[must_use]
pub fn parse_named(sql: &str, style: PlaceholderStyle) -> ParsedStatement<'_> {
    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    let mut names: Vec<String> = Vec::new();
    let mut copied = 0;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if token_at(bytes, idx, LINE_COMMENT) => {
                    state = State::LineComment;
                    idx += 1;
                }
                _ if token_at(bytes, idx, BLOCK_OPEN) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, close)) = dollar_tag(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = close;
                    }
                }
                b':' => {
                    if bytes.get(idx + 1) == Some(&b':') {
                        idx += 1; // `::type` cast
                    } else if let Some((end, name)) = scan_identifier(bytes, idx + 1) {
                        let position = match names.iter().position(|n| n == name) {
                            Some(existing) => existing + 1,
                            None => {
                                names.push(name.to_owned());
                                names.len()
                            }
                        };
                        let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
                        buf.push_str(&sql[copied..idx]);
                        style.push_marker(buf, position);
                        copied = end;
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if token_at(bytes, idx, BLOCK_OPEN) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if token_at(bytes, idx, BLOCK_CLOSE) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if closes_dollar_quote(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    let sql = match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    };
    ParsedStatement { sql, names }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::named_params;

    #[test]
    fn rewrites_for_sqlite_and_postgres() {
        let sql = "select * from users where id = :id and name = :name";
        let lite = parse_named(sql, PlaceholderStyle::Sqlite);
        assert_eq!(lite.sql, "select * from users where id = ?1 and name = ?2");
        assert_eq!(lite.names, ["id", "name"]);
        let pg = parse_named(sql, PlaceholderStyle::Postgres);
        assert_eq!(pg.sql, "select * from users where id = $1 and name = $2");
    }

    #[test]
    fn repeated_names_share_a_marker() {
        let parsed = parse_named(
            "select :a, :b where x = :a",
            PlaceholderStyle::Postgres,
        );
        assert_eq!(parsed.sql, "select $1, $2 where x = $1");
        assert_eq!(parsed.names, ["a", "b"]);
    }

    #[test]
    fn skips_literals_comments_and_casts() {
        let sql = "select ':id', \":col\", x::text -- :c\n/* :d /* :e */ */ from t where a = :id";
        let parsed = parse_named(sql, PlaceholderStyle::Sqlite);
        assert_eq!(
            parsed.sql,
            "select ':id', \":col\", x::text -- :c\n/* :d /* :e */ */ from t where a = ?1"
        );
        assert_eq!(parsed.names, ["id"]);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$fn$ select :x $fn$ where a = :x";
        let parsed = parse_named(sql, PlaceholderStyle::Postgres);
        assert_eq!(parsed.sql, "$fn$ select :x $fn$ where a = $1");
    }

    #[test]
    fn untouched_sql_is_borrowed_and_unicode_survives() {
        let sql = "select '사용자' as label";
        let parsed = parse_named(sql, PlaceholderStyle::Sqlite);
        assert!(matches!(parsed.sql, Cow::Borrowed(_)));

        let parsed = parse_named("select '사용자', :이름x, :name", PlaceholderStyle::Sqlite);
        assert_eq!(parsed.sql, "select '사용자', :이름x, ?1");
    }

    #[test]
    fn bind_orders_values_and_reports_missing() {
        let params = named_params! { "name" => "kim", "id" => 3, "unused" => true };
        let bound = BoundStatement::bind(
            "update users set name = :name where id = :id",
            &params,
            PlaceholderStyle::Sqlite,
        )
        .unwrap();
        assert_eq!(bound.values, vec![RowValues::Text("kim".into()), RowValues::Int(3)]);

        let err = BoundStatement::bind(
            "select * from users where id = :user_id",
            &params,
            PlaceholderStyle::Sqlite,
        )
        .unwrap_err();
        assert!(matches!(err, SqlMapperError::MissingParameter(name) if name == "user_id"));
    }
}
