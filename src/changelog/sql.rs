//! SQL rendering for structured changes, plus statement splitting

use crate::changelog::{Change, ColumnSpec};

/// Words that must be quoted when used as identifiers
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "both", "case", "cast",
    "check", "collate", "column", "constraint", "create", "current_date", "current_time",
    "current_timestamp", "current_user", "default", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "from", "grant", "group", "having", "in",
    "initially", "intersect", "into", "leading", "limit", "not", "null", "offset", "on", "only",
    "or", "order", "primary", "references", "returning", "select", "session_user", "some",
    "table", "then", "to", "trailing", "true", "union", "unique", "user", "using", "when",
    "where", "window", "with",
];

/// Quote an identifier when PostgreSQL would otherwise fold or reject it
pub fn quote_ident(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$');

    if simple && !RESERVED.contains(&name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// `schema.table`, or just `table` when no schema is given
pub fn qualified_name(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) if !schema.is_empty() => format!("{}.{}", quote_ident(schema), quote_ident(table)),
        _ => quote_ident(table),
    }
}

/// Render a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Translate a changelog data type into its PostgreSQL spelling
///
/// Unknown types pass through unchanged so native PostgreSQL types keep working.
pub fn map_type(data_type: &str) -> String {
    let trimmed = data_type.trim();
    let (base, args) = match trimmed.find('(') {
        Some(idx) => (trimmed[..idx].trim(), &trimmed[idx..]),
        None => (trimmed, ""),
    };

    let mapped = match base.to_ascii_lowercase().as_str() {
        "int" | "integer" | "int4" => "INTEGER",
        "bigint" | "int8" | "long" => "BIGINT",
        "smallint" | "int2" | "tinyint" | "mediumint" => "SMALLINT",
        "boolean" | "bool" | "bit" => "BOOLEAN",
        "datetime" | "timestamp" => "TIMESTAMP",
        "timestamptz" => "TIMESTAMP WITH TIME ZONE",
        "clob" | "nclob" | "text" | "longtext" | "mediumtext" => "TEXT",
        "blob" | "longblob" | "binary" | "varbinary" | "bytea" | "image" => "BYTEA",
        "double" | "double precision" | "float8" => "DOUBLE PRECISION",
        "float" | "real" | "float4" => "REAL",
        "currency" | "decimal" | "numeric" | "number" => "DECIMAL",
        "varchar" | "nvarchar" | "varchar2" | "character varying" => "VARCHAR",
        "char" | "nchar" | "character" => "CHAR",
        "uuid" | "uniqueidentifier" => "UUID",
        "date" => "DATE",
        "time" => "TIME",
        _ => return trimmed.to_string(),
    };

    // Parameters are meaningless on these types in PostgreSQL
    let drops_args = matches!(
        mapped,
        "INTEGER" | "BIGINT" | "SMALLINT" | "BOOLEAN" | "TEXT" | "BYTEA" | "DOUBLE PRECISION" | "UUID"
    );
    if args.is_empty() || drops_args {
        mapped.to_string()
    } else {
        format!("{}{}", mapped, args)
    }
}

/// A rendered unit of SQL and how it is sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// One statement, run through the extended query protocol
    Single(String),
    /// An unsplit script, possibly several statements, run as a simple query
    Script(String),
}

impl Statement {
    pub fn sql(&self) -> &str {
        match self {
            Statement::Single(sql) | Statement::Script(sql) => sql,
        }
    }
}

/// Render a change into the statements that apply it, in order
pub fn render_change(change: &Change) -> Vec<Statement> {
    match change {
        Change::Sql {
            sql,
            split_statements,
            strip_comments: strip,
        }
        | Change::SqlFile {
            sql,
            split_statements,
            strip_comments: strip,
            ..
        } => {
            let sql = if *strip { strip_comments(sql) } else { sql.clone() };
            if *split_statements {
                self::split_statements(&sql).into_iter().map(Statement::Single).collect()
            } else if has_content(&sql) {
                vec![Statement::Script(sql.trim().to_string())]
            } else {
                Vec::new()
            }
        }
        Change::CreateTable {
            schema_name,
            table_name,
            remarks,
            columns,
        } => single(render_create_table(schema_name.as_deref(), table_name, remarks.as_deref(), columns)),
        Change::AddColumn {
            schema_name,
            table_name,
            columns,
        } => single(render_add_column(schema_name.as_deref(), table_name, columns)),
        Change::DropTable {
            schema_name,
            table_name,
            cascade_constraints,
        } => {
            let mut sql = format!("DROP TABLE {}", qualified_name(schema_name.as_deref(), table_name));
            if *cascade_constraints {
                sql.push_str(" CASCADE");
            }
            vec![Statement::Single(sql)]
        }
        Change::CreateIndex {
            schema_name,
            table_name,
            index_name,
            unique,
            columns,
        } => {
            let columns = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
            vec![Statement::Single(format!(
                "CREATE {}INDEX {} ON {} ({})",
                if *unique { "UNIQUE " } else { "" },
                quote_ident(index_name),
                qualified_name(schema_name.as_deref(), table_name),
                columns
            ))]
        }
    }
}

fn single(statements: Vec<String>) -> Vec<Statement> {
    statements.into_iter().map(Statement::Single).collect()
}

fn column_definition(column: &ColumnSpec) -> String {
    let mut def = format!("{} {}", quote_ident(&column.name), map_type(&column.data_type));

    if column.auto_increment {
        def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
    } else if let Some(default) = &column.default_sql {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    }
    if !column.nullable || column.primary_key {
        def.push_str(" NOT NULL");
    }
    if column.unique && !column.primary_key {
        def.push_str(" UNIQUE");
    }
    def
}

fn column_comments(table: &str, columns: &[ColumnSpec]) -> Vec<String> {
    columns
        .iter()
        .filter_map(|column| {
            let remarks = column.remarks.as_deref()?;
            Some(format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                table,
                quote_ident(&column.name),
                quote_literal(remarks)
            ))
        })
        .collect()
}

fn render_create_table(
    schema: Option<&str>,
    table: &str,
    remarks: Option<&str>,
    columns: &[ColumnSpec],
) -> Vec<String> {
    let full_name = qualified_name(schema, table);

    let mut lines: Vec<String> = columns.iter().map(column_definition).collect();
    let primary_key: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quote_ident(&c.name))
        .collect();
    if !primary_key.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }

    let mut statements = vec![format!(
        "CREATE TABLE {} (\n    {}\n)",
        full_name,
        lines.join(",\n    ")
    )];
    if let Some(remarks) = remarks {
        statements.push(format!("COMMENT ON TABLE {} IS {}", full_name, quote_literal(remarks)));
    }
    statements.extend(column_comments(&full_name, columns));
    statements
}

fn render_add_column(schema: Option<&str>, table: &str, columns: &[ColumnSpec]) -> Vec<String> {
    let full_name = qualified_name(schema, table);

    let mut statements: Vec<String> = columns
        .iter()
        .map(|column| format!("ALTER TABLE {} ADD COLUMN {}", full_name, column_definition(column)))
        .collect();

    let primary_key: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quote_ident(&c.name))
        .collect();
    if !primary_key.is_empty() {
        statements.push(format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            full_name,
            primary_key.join(", ")
        ));
    }
    statements.extend(column_comments(&full_name, columns));
    statements
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Normal,
    SingleQuote,
    /// `E'...'`, where backslash escapes the next character
    EscapeString,
    DoubleQuote,
    LineComment,
    BlockComment(usize),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Token {
    Code(char),
    Comment,
    Separator,
}

/// Classify every character of `sql` as code, comment or a top-level `;`
fn tokenize(sql: &str) -> Vec<Token> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut state = Scan::Normal;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let after_identifier = i > 0 && is_identifier_char(chars[i - 1]);

        match state {
            Scan::Normal => match c {
                'E' | 'e' if next == Some('\'') && !after_identifier => {
                    state = Scan::EscapeString;
                    tokens.extend([Token::Code(c), Token::Code('\'')]);
                    i += 2;
                    continue;
                }
                '\'' => state = Scan::SingleQuote,
                '"' => state = Scan::DoubleQuote,
                '-' if next == Some('-') => {
                    state = Scan::LineComment;
                    tokens.extend([Token::Comment, Token::Comment]);
                    i += 2;
                    continue;
                }
                '/' if next == Some('*') => {
                    state = Scan::BlockComment(1);
                    tokens.extend([Token::Comment, Token::Comment]);
                    i += 2;
                    continue;
                }
                '$' if !after_identifier => {
                    if let Some(tag_len) = dollar_tag_len(&chars[i..]) {
                        let tag = &chars[i..i + tag_len];
                        let body_start = i + tag_len;
                        let close = chars[body_start..]
                            .windows(tag_len)
                            .position(|w| w == tag)
                            .map(|p| body_start + p + tag_len)
                            .unwrap_or(chars.len());
                        tokens.extend(chars[i..close].iter().map(|&c| Token::Code(c)));
                        i = close;
                        continue;
                    }
                }
                ';' => {
                    tokens.push(Token::Separator);
                    i += 1;
                    continue;
                }
                _ => {}
            },
            Scan::SingleQuote => {
                if c == '\'' {
                    if next == Some('\'') {
                        tokens.extend([Token::Code(c), Token::Code(c)]);
                        i += 2;
                        continue;
                    }
                    state = Scan::Normal;
                }
            }
            Scan::EscapeString => {
                if c == '\\' || (c == '\'' && next == Some('\'')) {
                    tokens.push(Token::Code(c));
                    if let Some(escaped) = next {
                        tokens.push(Token::Code(escaped));
                    }
                    i += 2;
                    continue;
                }
                if c == '\'' {
                    state = Scan::Normal;
                }
            }
            Scan::DoubleQuote => {
                if c == '"' {
                    state = Scan::Normal;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    state = Scan::Normal;
                }
            }
            Scan::BlockComment(depth) => {
                if c == '*' && next == Some('/') {
                    state = if depth == 1 {
                        Scan::Normal
                    } else {
                        Scan::BlockComment(depth - 1)
                    };
                    tokens.extend([Token::Comment, Token::Comment]);
                    i += 2;
                    continue;
                }
                if c == '/' && next == Some('*') {
                    state = Scan::BlockComment(depth + 1);
                    tokens.extend([Token::Comment, Token::Comment]);
                    i += 2;
                    continue;
                }
            }
        }

        tokens.push(match state {
            Scan::LineComment | Scan::BlockComment(_) => Token::Comment,
            _ => Token::Code(c),
        });
        i += 1;
    }
    tokens
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Length of a `$tag$` opener at the start of `chars`, if there is one
fn dollar_tag_len(chars: &[char]) -> Option<usize> {
    for (len, &c) in chars.iter().enumerate().skip(1) {
        if c == '$' {
            return Some(len + 1);
        }
        let valid = if len == 1 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            return None;
        }
    }
    None
}

/// Remove `--` and `/* */` comments, leaving quoted text untouched
pub fn strip_comments(sql: &str) -> String {
    tokenize(sql)
        .into_iter()
        .filter_map(|token| match token {
            Token::Code(c) => Some(c),
            Token::Separator => Some(';'),
            Token::Comment => None,
        })
        .collect()
}

/// Split a script on top-level semicolons
///
/// Semicolons inside quotes, dollar-quoted bodies and comments do not split.
/// Segments containing only whitespace or comments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;

    let chars: Vec<char> = sql.chars().collect();
    for (token, original) in tokenize(sql).into_iter().zip(chars) {
        match token {
            Token::Separator => {
                if has_code {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_code = false;
            }
            Token::Code(c) => {
                has_code |= !c.is_whitespace();
                current.push(c);
            }
            Token::Comment => current.push(original),
        }
    }
    if has_code {
        statements.push(current.trim().to_string());
    }
    statements
}

/// Whether `sql` contains anything besides whitespace and comments
fn has_content(sql: &str) -> bool {
    tokenize(sql)
        .into_iter()
        .any(|token| matches!(token, Token::Code(c) if !c.is_whitespace()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "users");
        assert_eq!(quote_ident("user_id2"), "user_id2");
        assert_eq!(quote_ident("User"), "\"User\"");
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_ident("my\"col"), "\"my\"\"col\"");
        assert_eq!(qualified_name(Some("app"), "users"), "app.users");
        assert_eq!(qualified_name(None, "users"), "users");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_map_type() {
        assert_eq!(map_type("int"), "INTEGER");
        assert_eq!(map_type("datetime"), "TIMESTAMP");
        assert_eq!(map_type("varchar(255)"), "VARCHAR(255)");
        assert_eq!(map_type("decimal(10, 2)"), "DECIMAL(10, 2)");
        assert_eq!(map_type("clob"), "TEXT");
        assert_eq!(map_type("int(11)"), "INTEGER");
        assert_eq!(map_type("jsonb"), "jsonb");
    }

    #[test]
    fn test_render_create_table() {
        let mut id = ColumnSpec::new("id", "bigint");
        id.primary_key = true;
        id.auto_increment = true;
        let mut email = ColumnSpec::new("email", "varchar(255)");
        email.nullable = false;
        email.unique = true;
        let mut active = ColumnSpec::new("active", "boolean");
        active.default_sql = Some("TRUE".to_string());
        active.remarks = Some("Soft delete flag".to_string());

        let statements = render_change(&Change::CreateTable {
            schema_name: None,
            table_name: "users".to_string(),
            remarks: Some("Application users".to_string()),
            columns: vec![id, email, active],
        });

        let statements: Vec<&str> = statements.iter().map(Statement::sql).collect();
        assert_eq!(
            statements[0],
            "CREATE TABLE users (\n    \
             id BIGINT GENERATED BY DEFAULT AS IDENTITY NOT NULL,\n    \
             email VARCHAR(255) NOT NULL UNIQUE,\n    \
             active BOOLEAN DEFAULT TRUE,\n    \
             PRIMARY KEY (id)\n)"
        );
        assert_eq!(statements[1], "COMMENT ON TABLE users IS 'Application users'");
        assert_eq!(statements[2], "COMMENT ON COLUMN users.active IS 'Soft delete flag'");
    }

    #[test]
    fn test_render_index_and_drop() {
        let index = render_change(&Change::CreateIndex {
            schema_name: Some("app".to_string()),
            table_name: "users".to_string(),
            index_name: "idx_users_email".to_string(),
            unique: true,
            columns: vec!["email".to_string()],
        });
        assert_eq!(
            index,
            vec![Statement::Single("CREATE UNIQUE INDEX idx_users_email ON app.users (email)".to_string())]
        );

        let drop = render_change(&Change::DropTable {
            schema_name: None,
            table_name: "users".to_string(),
            cascade_constraints: true,
        });
        assert_eq!(drop, vec![Statement::Single("DROP TABLE users CASCADE".to_string())]);
    }

    #[test]
    fn test_split_respects_quotes_and_comments() {
        let sql = "INSERT INTO t VALUES ('a;b');\n\
                   -- a comment; with semicolon\n\
                   /* block; comment */\n\
                   SELECT \"odd;name\" FROM t;";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "INSERT INTO t VALUES ('a;b')");
        assert!(statements[1].ends_with("SELECT \"odd;name\" FROM t"));
    }

    #[test]
    fn test_split_respects_dollar_quotes() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $body$ BEGIN RETURN 1; END; $body$ LANGUAGE plpgsql;\nSELECT 1;";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("RETURN 1; END;"));
        assert_eq!(statements[1], "SELECT 1");
    }

    #[test]
    fn test_dollar_inside_identifier_is_not_a_quote() {
        let statements = split_statements("SELECT a$b$c FROM t; SELECT 2;");
        assert_eq!(statements, vec!["SELECT a$b$c FROM t", "SELECT 2"]);

        let statements = split_statements("SELECT $1::int; SELECT $$a;b$$;");
        assert_eq!(statements, vec!["SELECT $1::int", "SELECT $$a;b$$"]);
    }

    #[test]
    fn test_split_respects_escape_strings() {
        let sql = "INSERT INTO t VALUES (E'it\\'s; fine\\\\'); SELECT e'\\n;'; SELECT 'plain\\'; SELECT 3";
        let statements = split_statements(sql);
        assert_eq!(
            statements,
            vec![
                "INSERT INTO t VALUES (E'it\\'s; fine\\\\')",
                "SELECT e'\\n;'",
                "SELECT 'plain\\'",
                "SELECT 3",
            ]
        );
        // a trailing E is part of the identifier, not an escape prefix
        assert_eq!(split_statements("SELECT some'a;b'"), vec!["SELECT some'a;b'"]);
    }

    #[test]
    fn test_split_drops_comment_only_segments() {
        let statements = split_statements("SELECT 1;\n-- trailing comment\n");
        assert_eq!(statements, vec!["SELECT 1"]);
        assert!(split_statements("  \n-- nothing\n").is_empty());
    }

    #[test]
    fn test_strip_comments_keeps_quoted_text() {
        let stripped = strip_comments("SELECT '--not a comment' -- real comment\nFROM t; /* x */ SELECT 2");
        assert_eq!(split_statements(&stripped), vec!["SELECT '--not a comment' \nFROM t", "SELECT 2"]);
    }

    #[test]
    fn test_unsplit_sql_is_one_script() {
        let statements = render_change(&Change::Sql {
            sql: "  SELECT 1; SELECT 2;\n".to_string(),
            split_statements: false,
            strip_comments: false,
        });
        assert_eq!(statements, vec![Statement::Script("SELECT 1; SELECT 2;".to_string())]);

        let statements = render_change(&Change::Sql {
            sql: "SELECT 1; SELECT 2;".to_string(),
            split_statements: true,
            strip_comments: false,
        });
        assert_eq!(
            statements,
            vec![
                Statement::Single("SELECT 1".to_string()),
                Statement::Single("SELECT 2".to_string())
            ]
        );
    }
}
