//! Sql placeholder rewriting.

/// Rewrite every occurrence of `token` in `sql` to a positional placeholder
/// `$1`, `$2`, … in left-to-right order.
///
/// This is a pure, total, byte-level scan. It does not interpret SQL syntax,
/// so it will happily rewrite a token that appears inside a string literal —
/// avoiding that is the caller's responsibility.
///
/// # Example
///
/// ```
/// use connpool::sql::replace_sql_placeholder;
///
/// let out = replace_sql_placeholder("SELECT * FROM t WHERE a=? AND b=?", "?");
/// assert_eq!(out, "SELECT * FROM t WHERE a=$1 AND b=$2");
/// ```
pub fn replace_sql_placeholder(sql: &str, token: &str) -> String {
    use std::fmt::Write;

    if token.is_empty() {
        return sql.to_owned();
    }

    let mut out = String::with_capacity(sql.len());
    let mut start = 0;
    let mut count = 1usize;

    while let Some(pos) = sql[start..].find(token) {
        let pos = start + pos;
        out.push_str(&sql[start..pos]);
        let _ = write!(out, "${count}");
        count += 1;
        start = pos + token.len();
    }

    out.push_str(&sql[start..]);
    out
}
