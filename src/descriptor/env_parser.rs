//! Parser for the connection block format.
//!
//! Connections are written as env-file-like blocks, one connection per
//! blank-line-separated block:
//!
//! ```text
//! POSTGRES_TYPE_TENANT_A = "postgres"
//! POSTGRES_HOST_TENANT_A = "db-a.internal"
//! POSTGRES_DB_TENANT_A = "tenant_a"
//! POSTGRES_PORT_TENANT_A = 5432
//!
//! POSTGRES_HOST_TENANT_B = "db-b.internal"
//! POSTGRES_DB_TENANT_B = "tenant_b"
//! ```
//!
//! Values may be wrapped in single or double quotes, including the Unicode
//! curly variants that word processors substitute when users paste blocks
//! around. Quotes are stripped before the value reaches the engine.

use crate::descriptor::{ConnectionDescriptor, DatabaseKind};
use crate::error::{ForgeError, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Matches `POSTGRES_{FIELD}_{KEY} = value` lines.
fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^POSTGRES_(TYPE|HOST|DB|SCHEMA|USER|PASSWORD|PORT)_(.+?)\s*=\s*(.+)$")
            .expect("line regex is valid")
    })
}

/// Quote characters stripped from value edges, ASCII and Unicode curly.
const QUOTE_CHARS: [char; 6] = ['\'', '"', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'];

/// Safety bound for nested-quote stripping.
const MAX_CLEAN_ITERATIONS: usize = 10;

/// Strips surrounding quote characters (ASCII or Unicode curly) and
/// whitespace from a value, iterating to handle nested quoting.
fn clean_quotes(value: &str) -> String {
    let mut cleaned = value.trim();

    for _ in 0..MAX_CLEAN_ITERATIONS {
        let stripped = cleaned
            .trim_matches(|c| QUOTE_CHARS.contains(&c))
            .trim();
        if stripped == cleaned {
            break;
        }
        cleaned = stripped;
    }

    cleaned.to_string()
}

/// One connection block accumulated during parsing.
#[derive(Default)]
struct BlockFields {
    kind: Option<String>,
    host: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    user: Option<String>,
    password: Option<String>,
    port: Option<String>,
    base_key: Option<String>,
}

/// Parses a connection block text into validated descriptors.
///
/// Each blank-line-separated block yields one descriptor. The descriptor id
/// is the database name when present, otherwise `{KEY}_{block_number}`; ids
/// that collide across blocks are disambiguated with port/host suffixes so
/// every target stays individually addressable in the results.
pub fn parse_connections(content: &str) -> Result<Vec<ConnectionDescriptor>> {
    let blocks = split_blocks(content);
    let mut descriptors = Vec::with_capacity(blocks.len());

    for (index, block) in blocks.iter().enumerate() {
        if let Some(descriptor) = parse_block(block, index)? {
            descriptors.push(descriptor);
        }
    }

    disambiguate_ids(&mut descriptors);

    for descriptor in &descriptors {
        descriptor.validate()?;
    }

    Ok(descriptors)
}

/// Groups non-comment lines into blank-line-separated blocks.
fn split_blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else if !trimmed.starts_with('#') {
            current.push(trimmed);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Parses one block into a descriptor. Blocks with no matching lines are
/// skipped (stray non-connection env vars are tolerated).
fn parse_block(block: &[&str], index: usize) -> Result<Option<ConnectionDescriptor>> {
    let mut fields = BlockFields::default();

    for line in block {
        let Some(captures) = line_regex().captures(line) else {
            continue;
        };

        let field = captures[1].to_uppercase();
        let key = clean_quotes(&captures[2]);
        let value = clean_quotes(&captures[3]);

        if fields.base_key.is_none() {
            fields.base_key = Some(key);
        }

        match field.as_str() {
            "TYPE" => fields.kind = Some(value),
            "HOST" => fields.host = Some(value),
            "DB" => fields.database = Some(value),
            "SCHEMA" => fields.schema = Some(value),
            "USER" => fields.user = Some(value),
            "PASSWORD" => fields.password = Some(value),
            "PORT" => fields.port = Some(value),
            _ => unreachable!("regex only matches known fields"),
        }
    }

    let Some(base_key) = fields.base_key else {
        return Ok(None);
    };

    let kind = match &fields.kind {
        Some(raw) => DatabaseKind::parse(raw).ok_or_else(|| {
            ForgeError::validation(format!(
                "Connection '{base_key}' has unsupported database type '{raw}'"
            ))
        })?,
        None => DatabaseKind::default(),
    };

    let port = match &fields.port {
        Some(raw) => raw.parse::<u16>().map_err(|_| {
            ForgeError::validation(format!(
                "Connection '{base_key}' has invalid port '{raw}'"
            ))
        })?,
        None => kind.default_port(),
    };

    let database = fields.database.unwrap_or_default();
    let id = if database.is_empty() {
        format!("{}_{}", base_key, index + 1)
    } else {
        database.clone()
    };

    Ok(Some(ConnectionDescriptor {
        id,
        kind,
        host: fields.host.unwrap_or_default(),
        port,
        database,
        schema: fields.schema,
        user: fields.user,
        password: fields.password,
    }))
}

/// Rewrites repeated ids (same database on different hosts/ports) so each
/// target remains identifiable in the result set.
fn disambiguate_ids(descriptors: &mut [ConnectionDescriptor]) {
    let mut id_count: HashMap<String, usize> = HashMap::new();
    for descriptor in descriptors.iter() {
        *id_count.entry(descriptor.id.clone()).or_default() += 1;
    }

    let mut used: HashSet<String> = HashSet::new();
    for descriptor in descriptors.iter_mut() {
        if id_count.get(&descriptor.id).copied().unwrap_or(0) <= 1 {
            used.insert(descriptor.id.clone());
            continue;
        }

        let mut candidate = format!("{}_{}", descriptor.id, descriptor.port);
        if used.contains(&candidate) {
            candidate = format!("{}_{}_{}", descriptor.id, descriptor.host, descriptor.port);
        }
        let mut suffix = 0;
        while used.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}_{}", descriptor.id, suffix);
        }

        descriptor.id = candidate;
        used.insert(descriptor.id.clone());
    }
}

/// Serializes descriptors back to the connection block format.
pub fn serialize_connections(descriptors: &[ConnectionDescriptor]) -> String {
    descriptors
        .iter()
        .enumerate()
        .map(|(index, descriptor)| {
            let suffix = if descriptor.id.is_empty() {
                format!("CONNECTION_{}", index + 1)
            } else {
                descriptor.id.to_uppercase()
            };

            let mut lines = vec![
                format!("POSTGRES_TYPE_{suffix} = \"{}\"", descriptor.kind.as_str()),
                format!("POSTGRES_HOST_{suffix} = \"{}\"", descriptor.host),
                format!("POSTGRES_DB_{suffix} = \"{}\"", descriptor.database),
            ];
            if let Some(schema) = &descriptor.schema {
                lines.push(format!("POSTGRES_SCHEMA_{suffix} = \"{schema}\""));
            }
            if let Some(user) = &descriptor.user {
                lines.push(format!("POSTGRES_USER_{suffix} = \"{user}\""));
            }
            if let Some(password) = &descriptor.password {
                lines.push(format!("POSTGRES_PASSWORD_{suffix} = \"{password}\""));
            }
            lines.push(format!("POSTGRES_PORT_{suffix} = {}", descriptor.port));
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
