//! SQL statement classification
//!
//! A keyword and shape check, not a parser. The statement's leading keyword
//! (after whitespace, comments and opening parentheses) decides the class.
//! A `SELECT` that calls a side-effecting function still classifies as
//! read-only; the read-only session mode set up by the connection covers
//! that gap.

use std::fmt;

/// Keywords that start a statement which writes data, changes schema or
/// touches server state.
const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "MERGE", "COPY", "COMMENT", "VACUUM", "REINDEX", "CLUSTER", "LOCK", "CALL", "DO", "REFRESH",
    "SECURITY", "IMPORT",
];

/// Result of classifying a piece of SQL text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A single SELECT statement, possibly behind a WITH clause
    ReadOnly,
    /// A statement that would modify data or schema
    Mutating { keyword: String },
    /// Empty input, multiple statements, or an unsupported statement shape
    Malformed { reason: String },
}

impl Classification {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Classification::ReadOnly)
    }

    fn malformed(reason: impl Into<String>) -> Self {
        Classification::Malformed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::ReadOnly => write!(f, "read-only"),
            Classification::Mutating { keyword } => {
                write!(f, "{} statements are not allowed; only SELECT queries are accepted", keyword)
            }
            Classification::Malformed { reason } => write!(f, "{}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare word, upper-cased
    Word(String),
    /// String literal, quoted identifier or dollar-quoted body
    Literal,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Other,
}

/// Classify SQL text as read-only, mutating or malformed
pub fn classify(sql: &str) -> Classification {
    let tokens = match tokenize(sql) {
        Ok(tokens) => tokens,
        Err(reason) => return Classification::malformed(reason),
    };

    // Only one statement; trailing semicolons are fine.
    let statement_end = tokens
        .iter()
        .position(|t| *t == Token::Semicolon)
        .unwrap_or(tokens.len());
    if tokens[statement_end..].iter().any(|t| *t != Token::Semicolon) {
        return Classification::malformed("Multiple statements are not allowed");
    }

    let statement = &tokens[..statement_end];
    let body_start = statement
        .iter()
        .position(|t| *t != Token::LParen)
        .unwrap_or(statement.len());

    let leading = match statement.get(body_start) {
        None => return Classification::malformed("Query is empty"),
        Some(Token::Word(word)) => word.as_str(),
        Some(_) => return Classification::malformed("Query must start with SELECT or WITH"),
    };

    match leading {
        "SELECT" => check_select_into(statement),
        "WITH" => classify_with(&statement[body_start + 1..]),
        keyword if is_mutating(keyword) => Classification::Mutating {
            keyword: keyword.to_string(),
        },
        other => Classification::malformed(format!(
            "Unsupported statement '{}'; only SELECT queries are accepted",
            other
        )),
    }
}

fn is_mutating(word: &str) -> bool {
    MUTATING_KEYWORDS.contains(&word)
}

/// `SELECT ... INTO new_table` creates a table in PostgreSQL.
fn check_select_into(statement: &[Token]) -> Classification {
    let has_into = statement
        .iter()
        .any(|t| matches!(t, Token::Word(w) if w == "INTO"));

    if has_into {
        Classification::Mutating {
            keyword: "SELECT INTO".to_string(),
        }
    } else {
        Classification::ReadOnly
    }
}

fn is_word(token: Option<&Token>, expected: &str) -> bool {
    matches!(token, Some(Token::Word(word)) if word == expected)
}

/// Index of the `)` matching the `(` at `open`
fn closing_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Walk `name [(columns)] AS [[NOT] MATERIALIZED] (body)` entries, then
/// classify the statement that follows the CTE list.
fn classify_with(after_with: &[Token]) -> Classification {
    let mut i = usize::from(is_word(after_with.first(), "RECURSIVE"));

    loop {
        match after_with.get(i) {
            Some(Token::Word(_)) | Some(Token::Literal) => i += 1,
            _ => return Classification::malformed("Expected a CTE name after WITH"),
        }

        if after_with.get(i) == Some(&Token::LParen) {
            match closing_paren(after_with, i) {
                Some(end) => i = end + 1,
                None => return Classification::malformed("Unbalanced parentheses"),
            }
        }

        if !is_word(after_with.get(i), "AS") {
            return Classification::malformed("Expected AS in WITH clause");
        }
        i += 1;
        if is_word(after_with.get(i), "NOT") {
            i += 1;
        }
        if is_word(after_with.get(i), "MATERIALIZED") {
            i += 1;
        }
        if after_with.get(i) != Some(&Token::LParen) {
            return Classification::malformed("Expected '(' after AS in WITH clause");
        }

        // Data-modifying CTE: `name AS (DELETE ... RETURNING *)`
        if let Some(Token::Word(word)) = after_with.get(i + 1) {
            if is_mutating(word) {
                return Classification::Mutating {
                    keyword: word.clone(),
                };
            }
        }
        match closing_paren(after_with, i) {
            Some(end) => i = end + 1,
            None => return Classification::malformed("Unbalanced parentheses"),
        }

        // SEARCH / CYCLE clauses of a recursive CTE
        if is_word(after_with.get(i), "SEARCH") || is_word(after_with.get(i), "CYCLE") {
            while let Some(token) = after_with.get(i) {
                match token {
                    Token::Comma => break,
                    Token::Word(word) if word == "SELECT" || is_mutating(word) => break,
                    _ => i += 1,
                }
            }
        }

        if after_with.get(i) == Some(&Token::Comma) {
            i += 1;
        } else {
            break;
        }
    }

    let main = &after_with[i..];
    let body_start = main
        .iter()
        .position(|t| *t != Token::LParen)
        .unwrap_or(main.len());

    match main.get(body_start) {
        Some(Token::Word(word)) if word == "SELECT" => check_select_into(main),
        Some(Token::Word(word)) if is_mutating(word) => Classification::Mutating {
            keyword: word.clone(),
        },
        _ => Classification::malformed("WITH clause must be followed by a SELECT statement"),
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            c if c.is_whitespace() => i += 1,
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => i = skip_block_comment(&chars, i)?,
            '\'' => {
                i = skip_quoted(&chars, i, '\'', false)?;
                tokens.push(Token::Literal);
            }
            '"' => {
                i = skip_quoted(&chars, i, '"', false)?;
                tokens.push(Token::Literal);
            }
            '$' if next.is_some_and(|n| n == '$' || n.is_alphabetic() || n == '_') => {
                match skip_dollar_quoted(&chars, i)? {
                    Some(end) => {
                        i = end;
                        tokens.push(Token::Literal);
                    }
                    None => {
                        tokens.push(Token::Other);
                        i += 1;
                    }
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_uppercase();

                // E'...' escape strings allow backslash escapes
                if word == "E" && chars.get(i) == Some(&'\'') {
                    i = skip_quoted(&chars, i, '\'', true)?;
                    tokens.push(Token::Literal);
                } else {
                    tokens.push(Token::Word(word));
                }
            }
            _ => {
                tokens.push(Token::Other);
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// Skip a `/* ... */` comment; PostgreSQL allows nesting.
fn skip_block_comment(chars: &[char], start: usize) -> Result<usize, String> {
    let mut depth = 0usize;
    let mut i = start;

    while i < chars.len() {
        match (chars[i], chars.get(i + 1)) {
            ('/', Some('*')) => {
                depth += 1;
                i += 2;
            }
            ('*', Some('/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => i += 1,
        }
    }

    Err("Unterminated block comment".to_string())
}

/// Skip a quoted run starting at `start`; a doubled quote is an escape.
fn skip_quoted(chars: &[char], start: usize, quote: char, backslash: bool) -> Result<usize, String> {
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if backslash && c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }

    Err(if quote == '"' {
        "Unterminated quoted identifier".to_string()
    } else {
        "Unterminated string literal".to_string()
    })
}

/// Skip `$tag$ ... $tag$`. Returns `None` when `$` does not open a tag.
fn skip_dollar_quoted(chars: &[char], start: usize) -> Result<Option<usize>, String> {
    let mut i = start + 1;
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        i += 1;
    }
    if chars.get(i) != Some(&'$') {
        return Ok(None);
    }

    let tag = &chars[start..=i];
    let mut j = i + 1;
    while j + tag.len() <= chars.len() {
        if &chars[j..j + tag.len()] == tag {
            return Ok(Some(j + tag.len()));
        }
        j += 1;
    }

    Err("Unterminated dollar-quoted string".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_mutating_class(sql: &str) -> bool {
        matches!(classify(sql), Classification::Mutating { .. })
    }

    fn is_malformed(sql: &str) -> bool {
        matches!(classify(sql), Classification::Malformed { .. })
    }

    #[test]
    fn test_plain_select_is_read_only() {
        assert_eq!(
            classify("SELECT nct_id FROM ctgov.studies LIMIT 1"),
            Classification::ReadOnly
        );
        assert_eq!(classify("select 1"), Classification::ReadOnly);
        assert_eq!(classify("SELECT 1;"), Classification::ReadOnly);
        assert_eq!(classify("(SELECT 1) UNION (SELECT 2)"), Classification::ReadOnly);
    }

    #[test]
    fn test_leading_whitespace_and_comments_skipped() {
        assert_eq!(classify("   \n\tSELECT 1"), Classification::ReadOnly);
        assert_eq!(classify("-- top count\nSELECT 1"), Classification::ReadOnly);
        assert_eq!(classify("/* a /* nested */ note */ SELECT 1"), Classification::ReadOnly);
        assert!(is_mutating_class("-- harmless\n  drop table ctgov.studies"));
        assert!(is_mutating_class("/* SELECT */ DELETE FROM ctgov.studies"));
    }

    #[test]
    fn test_mutating_keywords_rejected() {
        for sql in [
            "DROP TABLE ctgov.studies",
            "insert into ctgov.studies values (1)",
            "UPDATE ctgov.studies SET phase = 'x'",
            "DELETE FROM ctgov.studies",
            "ALTER TABLE ctgov.studies ADD COLUMN x int",
            "CREATE TABLE t (x int)",
            "TRUNCATE ctgov.studies",
            "GRANT SELECT ON ctgov.studies TO public",
            "REVOKE SELECT ON ctgov.studies FROM public",
            "COPY ctgov.studies TO '/tmp/out'",
        ] {
            assert!(is_mutating_class(sql), "expected mutating: {}", sql);
        }
    }

    #[test]
    fn test_mutating_reports_keyword() {
        assert_eq!(
            classify("drop table ctgov.studies"),
            Classification::Mutating {
                keyword: "DROP".to_string()
            }
        );
    }

    #[test]
    fn test_with_select_is_read_only() {
        let sql = "WITH recent AS (SELECT nct_id FROM ctgov.studies WHERE start_date > '2020-01-01') \
                   SELECT count(*) FROM recent";
        assert_eq!(classify(sql), Classification::ReadOnly);

        let recursive = "WITH RECURSIVE t(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM t WHERE n < 5) \
                         SELECT n FROM t";
        assert_eq!(classify(recursive), Classification::ReadOnly);
    }

    #[test]
    fn test_with_unreserved_keyword_names_are_read_only() {
        for sql in [
            "WITH comment AS (SELECT 1 AS x) SELECT x FROM comment",
            "WITH t(copy) AS (SELECT 1) SELECT copy FROM t",
            "WITH lock AS NOT MATERIALIZED (SELECT 1), call(refresh) AS (SELECT 2) \
             SELECT * FROM lock, call",
            "WITH \"merge\" AS (SELECT 1) (SELECT * FROM \"merge\")",
        ] {
            assert_eq!(classify(sql), Classification::ReadOnly, "{}", sql);
        }
    }

    #[test]
    fn test_with_search_clause_is_read_only() {
        let sql = "WITH RECURSIVE t(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM t WHERE n < 5) \
                   SEARCH DEPTH FIRST BY n SET ordercol SELECT n FROM t ORDER BY ordercol";
        assert_eq!(classify(sql), Classification::ReadOnly);
    }

    #[test]
    fn test_with_missing_as_is_malformed() {
        assert!(is_malformed("WITH t SELECT 1"));
        assert!(is_malformed("WITH t AS SELECT 1"));
        assert!(is_malformed("WITH t AS (SELECT 1 SELECT 2"));
    }

    #[test]
    fn test_with_mutating_main_statement() {
        assert!(is_mutating_class(
            "WITH old AS (SELECT nct_id FROM ctgov.studies) DELETE FROM ctgov.studies WHERE nct_id IN (SELECT nct_id FROM old)"
        ));
    }

    #[test]
    fn test_data_modifying_cte_rejected() {
        assert!(is_mutating_class(
            "WITH gone AS (DELETE FROM ctgov.studies RETURNING *) SELECT count(*) FROM gone"
        ));
        assert!(is_mutating_class(
            "WITH a AS MATERIALIZED (SELECT 1), b AS (UPDATE ctgov.studies SET phase = NULL RETURNING 1) SELECT * FROM a"
        ));
    }

    #[test]
    fn test_select_into_rejected() {
        assert!(is_mutating_class("SELECT * INTO scratch FROM ctgov.studies"));
    }

    #[test]
    fn test_multiple_statements_rejected() {
        assert!(is_malformed("SELECT 1; DROP TABLE ctgov.studies"));
        assert!(is_malformed("SELECT 1; SELECT 2"));
    }

    #[test]
    fn test_semicolons_inside_literals_ignored() {
        assert_eq!(
            classify("SELECT 'a;b' AS x, \"weird;col\" FROM t -- trailing; comment"),
            Classification::ReadOnly
        );
        assert_eq!(classify("SELECT $$; DROP TABLE t$$"), Classification::ReadOnly);
        assert_eq!(classify("SELECT $body$;$body$"), Classification::ReadOnly);
        assert_eq!(classify("SELECT E'it\\'s; fine'"), Classification::ReadOnly);
        assert_eq!(classify("SELECT 'it''s; fine'"), Classification::ReadOnly);
    }

    #[test]
    fn test_trailing_comment_after_semicolon_allowed() {
        assert_eq!(classify("SELECT 1; -- done"), Classification::ReadOnly);
        assert_eq!(classify("SELECT 1;;  "), Classification::ReadOnly);
    }

    #[test]
    fn test_empty_and_comment_only_input_malformed() {
        assert!(is_malformed(""));
        assert!(is_malformed("   \n\t "));
        assert!(is_malformed("-- nothing here"));
        assert!(is_malformed(";"));
    }

    #[test]
    fn test_unterminated_input_malformed() {
        assert!(is_malformed("SELECT 'open"));
        assert!(is_malformed("SELECT 1 /* open"));
        assert!(is_malformed("SELECT \"open"));
        assert!(is_malformed("SELECT $x$ open"));
    }

    #[test]
    fn test_other_statements_malformed() {
        assert!(is_malformed("EXPLAIN ANALYZE SELECT 1"));
        assert!(is_malformed("SHOW search_path"));
        assert!(is_malformed("BEGIN"));
        assert!(is_malformed("VALUES (1)"));
        assert!(is_malformed("WITH t AS (SELECT 1)"));
    }

    #[test]
    fn test_positional_params_are_not_dollar_quotes() {
        assert_eq!(classify("SELECT $1"), Classification::ReadOnly);
    }

    #[test]
    fn test_keyword_in_identifier_not_matched() {
        assert_eq!(
            classify("SELECT updated_at, deleted FROM ctgov.studies"),
            Classification::ReadOnly
        );
    }
}
