//! # Migration Path Parser
//!
//! Derives migration metadata from repository file paths using a template
//! mini-language.
//!
//! ## Template syntax
//!
//! - `{{ENV_NAME}}`, `{{VERSION}}`, `{{DB_NAME}}`, `{{TYPE}}`, `{{DESCRIPTION}}`
//!   capture one filename-safe run of characters each
//! - `/*/` matches exactly one path segment
//! - `**` matches any depth
//! - every other character, `.` included, matches itself
//!
//! A template must match the whole path. A path that does not match is not an
//! error: the parser returns `Ok(None)`.

use regex::Regex;
use thiserror::Error;

use crate::models::{MigrationInfo, MigrationSource, MigrationType};

/// Characters a placeholder may capture in a migration path
const PLACEHOLDER_PATTERN: &str = r#"[^\\/?%*:|"<>]+"#;

/// Characters a placeholder may capture in a schema snapshot path
const SCHEMA_PLACEHOLDER_PATTERN: &str = r"[a-zA-Z0-9+-=/_#?!$. ]+";

const MIGRATION_PLACEHOLDERS: [&str; 5] = ["ENV_NAME", "VERSION", "DB_NAME", "TYPE", "DESCRIPTION"];
const SCHEMA_PLACEHOLDERS: [&str; 2] = ["ENV_NAME", "DB_NAME"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid file path template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("file path {path:?} does not contain {{{{VERSION}}}}, configured file path template {template:?}")]
    MissingVersion { path: String, template: String },

    #[error("file path {path:?} does not contain {{{{DB_NAME}}}}, configured file path template {template:?}")]
    MissingDatabaseName { path: String, template: String },

    #[error("file path {path:?} contains invalid migration type {token:?}, must be 'migrate', 'ddl', 'data' or 'dml'")]
    InvalidMigrationType { path: String, token: String },
}

/// Environment and database named by a "latest schema" snapshot file
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SchemaFileInfo {
    pub environment: Option<String>,
    pub database: Option<String>,
}

/// Translate a template into an anchored regular expression
fn compile_template(
    template: &str,
    placeholders: &[&str],
    capture: &str,
    prefix: &str,
) -> Result<Regex, ParseError> {
    let mut pattern = String::with_capacity(template.len() * 2 + prefix.len() + 2);
    pattern.push('^');
    pattern.push_str(&regex::escape(prefix));

    let mut rest = template;
    'scan: while !rest.is_empty() {
        for name in placeholders {
            let token = format!("{{{{{name}}}}}");
            if let Some(after) = rest.strip_prefix(token.as_str()) {
                pattern.push_str(&format!("(?P<{name}>{capture})"));
                rest = after;
                continue 'scan;
            }
        }
        if rest.starts_with("/*/") {
            // leave the closing slash in place so "/*/*/" chains
            pattern.push_str("/[^/]*");
            rest = &rest[2..];
            continue;
        }
        if let Some(after) = rest.strip_prefix("**") {
            pattern.push_str(".*");
            rest = after;
            continue;
        }

        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            pattern.push_str(&regex::escape(ch.encode_utf8(&mut [0u8; 4])));
        }
        rest = chars.as_str();
    }
    pattern.push('$');

    Regex::new(&pattern).map_err(|e| ParseError::InvalidTemplate {
        template: template.to_string(),
        reason: e.to_string(),
    })
}

/// Match a file path against a migration path template
///
/// Returns `Ok(None)` when the path does not match. A match that lacks
/// `{{VERSION}}`, or `{{DB_NAME}}` unless `allow_omit_database_name` is set, is
/// an error, as is a `{{TYPE}}` token other than `migrate`, `ddl`, `data` or
/// `dml`.
pub fn parse_migration_info(
    file_path: &str,
    template: &str,
    allow_omit_database_name: bool,
) -> Result<Option<MigrationInfo>, ParseError> {
    let re = compile_template(template, &MIGRATION_PLACEHOLDERS, PLACEHOLDER_PATTERN, "")?;
    let Some(captures) = re.captures(file_path) else {
        return Ok(None);
    };
    let group = |name: &str| captures.name(name).map(|m| m.as_str().to_string());

    let mut info = MigrationInfo {
        source: MigrationSource::Vcs,
        migration_type: MigrationType::Migrate,
        ..Default::default()
    };

    if let Some(environment) = group("ENV_NAME") {
        info.environment = environment;
    }
    if let Some(database) = group("DB_NAME") {
        info.namespace = database.clone();
        info.database = database;
    }
    if let Some(token) = group("TYPE") {
        info.migration_type = match token.as_str() {
            "data" | "dml" => MigrationType::Data,
            "migrate" | "ddl" => MigrationType::Migrate,
            _ => {
                return Err(ParseError::InvalidMigrationType {
                    path: file_path.to_string(),
                    token,
                })
            }
        };
    }

    info.version = group("VERSION").ok_or_else(|| ParseError::MissingVersion {
        path: file_path.to_string(),
        template: template.to_string(),
    })?;
    if info.namespace.is_empty() && !allow_omit_database_name {
        return Err(ParseError::MissingDatabaseName {
            path: file_path.to_string(),
            template: template.to_string(),
        });
    }

    info.description = match group("DESCRIPTION") {
        Some(description) => humanize_description(&description),
        None => default_description(info.migration_type, &info.database),
    };

    Ok(Some(info))
}

/// Match a file path against a schema snapshot template rooted at `base_dir`
///
/// An empty template never matches.
pub fn parse_schema_file_info(
    base_dir: &str,
    schema_path_template: &str,
    file_path: &str,
) -> Result<Option<SchemaFileInfo>, ParseError> {
    if schema_path_template.is_empty() {
        return Ok(None);
    }

    let base = base_dir.trim_end_matches('/');
    let prefix = if base.is_empty() {
        String::new()
    } else {
        format!("{base}/")
    };
    let re = compile_template(
        schema_path_template.trim_start_matches('/'),
        &SCHEMA_PLACEHOLDERS,
        SCHEMA_PLACEHOLDER_PATTERN,
        &prefix,
    )?;

    Ok(re.captures(file_path).map(|captures| SchemaFileInfo {
        environment: captures.name("ENV_NAME").map(|m| m.as_str().to_string()),
        database: captures.name("DB_NAME").map(|m| m.as_str().to_string()),
    }))
}

fn default_description(migration_type: MigrationType, database: &str) -> String {
    match migration_type {
        MigrationType::Baseline => format!("Create {database} baseline"),
        MigrationType::Data => format!("Create {database} data change"),
        _ => format!("Create {database} schema migration"),
    }
}

/// Underscores become spaces and the first letter is upper-cased
fn humanize_description(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}
