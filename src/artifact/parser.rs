use super::record::{Column, NodeKind, NodeRecord, non_empty, parse_next_nodes, parse_what_next};
use itertools::Itertools;
use std::fmt;
use tracing::debug;

/// Why a data line did not become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The first field is not an integer.
    InvalidNumber(String),
    /// The node type column is neither Decision nor Action.
    UnknownKind(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidNumber(raw) => write!(f, "node number '{}' is not an integer", raw),
            SkipReason::UnknownKind(raw) => write!(f, "unknown node type '{}'", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the source text.
    pub line_number: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Record(usize),
    Verbatim(String),
}

/// A parsed tabular artifact.
///
/// Parsing never fails: malformed lines are skipped (and kept verbatim so they
/// survive serialization), blank lines are dropped. Records keep input order,
/// which is not necessarily sorted by node number.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Artifact {
    header: Option<String>,
    records: Vec<NodeRecord>,
    layout: Vec<Entry>,
    skipped: Vec<SkippedLine>,
}

impl Artifact {
    pub fn parse(text: &str) -> Self {
        let mut artifact = Artifact::default();
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        if let Some((_, header)) = lines.next() {
            artifact.header = Some(header.to_string());
        }

        for (index, line) in lines {
            match parse_record(line) {
                Ok(record) => artifact.push_record(record),
                Err(reason) => {
                    debug!(line = index + 1, %reason, "skipping malformed artifact line");
                    artifact.layout.push(Entry::Verbatim(line.to_string()));
                    artifact.skipped.push(SkippedLine {
                        line_number: index + 1,
                        reason,
                    });
                }
            }
        }
        artifact
    }

    /// Builds an artifact with the canonical header from in-memory records.
    pub fn from_records(records: impl IntoIterator<Item = NodeRecord>) -> Self {
        let mut artifact = Artifact {
            header: Some(Column::header_line()),
            ..Default::default()
        };
        for record in records {
            artifact.push_record(record);
        }
        artifact
    }

    pub fn push_record(&mut self, record: NodeRecord) {
        self.layout.push(Entry::Record(self.records.len()));
        self.records.push(record);
    }

    pub fn records(&self) -> &[NodeRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<NodeRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    /// The first record with this number.
    pub fn get(&self, number: i64) -> Option<&NodeRecord> {
        self.records.iter().find(|r| r.number == number)
    }

    /// Mutable access to the first record with this number. The row is re-encoded
    /// on the next serialization.
    pub fn record_mut(&mut self, number: i64) -> Option<&mut NodeRecord> {
        let record = self.records.iter_mut().find(|r| r.number == number)?;
        record.mark_dirty();
        Some(record)
    }

    pub(crate) fn record_at_mut(&mut self, position: usize) -> Option<&mut NodeRecord> {
        let record = self.records.get_mut(position)?;
        record.mark_dirty();
        Some(record)
    }

    /// Mutable access to every record. All of them are re-encoded afterwards.
    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut NodeRecord> {
        self.records.iter_mut().map(|record| {
            record.mark_dirty();
            record
        })
    }

    /// Writes the artifact back to text. Untouched rows and skipped lines are
    /// emitted exactly as they were read.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(self.header.as_deref().unwrap_or(&Column::header_line()));
        out.push('\n');
        for entry in &self.layout {
            match entry {
                Entry::Verbatim(line) => out.push_str(line),
                Entry::Record(index) => {
                    let record = &self.records[*index];
                    match &record.source_line {
                        Some(line) => out.push_str(line),
                        None => out.push_str(&encode_row(&record.encoded_columns())),
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

fn parse_record(line: &str) -> Result<NodeRecord, SkipReason> {
    let fields = split_fields(line);
    let field = |column: Column| fields.get(column.index()).map(String::as_str).unwrap_or("");

    let raw_number = field(Column::Number);
    let number = raw_number
        .trim()
        .parse::<i64>()
        .map_err(|_| SkipReason::InvalidNumber(raw_number.to_string()))?;
    let raw_kind = field(Column::Kind);
    let kind = NodeKind::parse(raw_kind).ok_or_else(|| SkipReason::UnknownKind(raw_kind.to_string()))?;

    let mut columns = fields.clone();
    if columns.len() < Column::ALL.len() {
        columns.resize(Column::ALL.len(), String::new());
    }

    Ok(NodeRecord {
        number,
        kind,
        name: field(Column::Name).to_string(),
        message: non_empty(field(Column::Message)),
        rich_content_type: non_empty(field(Column::RichContentType)),
        rich_content: non_empty(field(Column::RichContent)),
        next_nodes: parse_next_nodes(field(Column::NextNodes)),
        command: non_empty(field(Column::Command)).map(|c| c.trim().to_string()),
        what_next: parse_what_next(field(Column::WhatNext)),
        columns,
        source_line: Some(line.to_string()),
    })
}

/// Splits one line on commas outside of quotes.
///
/// Quotes toggle the inside-field state and are not doubled-quote escaped; one
/// leading and one trailing quote are stripped from each field.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => fields.push(strip_quotes(std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    fields.push(strip_quotes(current));
    fields
}

fn strip_quotes(field: String) -> String {
    let field = field.strip_prefix('"').unwrap_or(&field);
    field.strip_suffix('"').unwrap_or(field).to_string()
}

/// Writes a field so that [`split_fields`] reads it back unchanged. A value whose own
/// quotes already guard its commas is written as-is; anything else with a separator
/// or a quote is wrapped. Line breaks cannot be represented in the line-based format
/// and are flattened to spaces.
pub fn encode_field(value: &str) -> String {
    let value = value.replace(['\r', '\n'], " ");
    if !value.contains(',') && !value.contains('"') {
        return value;
    }
    if reads_back_as(&value, &value) {
        return value;
    }
    format!("\"{}\"", value)
}

fn reads_back_as(encoded: &str, value: &str) -> bool {
    let fields = split_fields(encoded);
    fields.len() == 1 && fields[0] == value
}

fn encode_row(columns: &[String]) -> String {
    columns.iter().map(|c| encode_field(c)).join(",")
}
