use regex::Regex;
use std::collections::HashSet;

lazy_static::lazy_static! {
    static ref UNQUOTED_IDENTIFIER: Regex = Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "add", "aggregate", "all", "allow", "alter", "and", "any", "apply", "asc",
        "authorize", "batch", "begin", "by", "columnfamily", "create", "delete", "desc",
        "describe", "drop", "entries", "execute", "from", "full", "grant", "if", "in",
        "index", "infinity", "insert", "into", "is", "key", "keyspace", "limit", "modify",
        "nan", "norecursive", "not", "null", "of", "on", "or", "order", "primary",
        "rename", "replace", "revoke", "schema", "select", "set", "table", "to", "token",
        "truncate", "unlogged", "update", "use", "using", "view", "where", "with",
    ]
    .into_iter()
    .collect();
}

/// Renders an identifier for statement text.
///
/// Lower-case identifiers pass through unless they are reserved words;
/// anything else is double-quoted so the store keeps its case.
pub fn quote_identifier(name: &str) -> String {
    if UNQUOTED_IDENTIFIER.is_match(name) && !RESERVED_WORDS.contains(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Renders `keyspace.table`, or the bare table when no keyspace is known.
pub fn qualified_table(keyspace: Option<&str>, table: &str) -> String {
    match keyspace {
        Some(keyspace) => format!("{}.{}", quote_identifier(keyspace), quote_identifier(table)),
        None => quote_identifier(table),
    }
}
