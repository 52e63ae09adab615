use crate::constants::{LIST_SEPARATOR, ROUTE_SEPARATOR, SYSTEM_NODE_THRESHOLD};
use itertools::Itertools;
use serde::Serialize;
use std::fmt;

/// The columns of the tabular artifact, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Number,
    Kind,
    Name,
    Intent,
    EntityType,
    Entity,
    NluDisabled,
    NextNodes,
    Message,
    RichContentType,
    RichContent,
    AnswerRequired,
    Behaviors,
    Command,
    Description,
    Output,
    NodeInput,
    ParamInput,
    DecisionVariable,
    WhatNext,
    NodeTags,
    SkillTag,
    Variable,
    PlatformFlag,
    Flows,
    CssClass,
}

impl Column {
    pub const ALL: [Column; 26] = [
        Column::Number,
        Column::Kind,
        Column::Name,
        Column::Intent,
        Column::EntityType,
        Column::Entity,
        Column::NluDisabled,
        Column::NextNodes,
        Column::Message,
        Column::RichContentType,
        Column::RichContent,
        Column::AnswerRequired,
        Column::Behaviors,
        Column::Command,
        Column::Description,
        Column::Output,
        Column::NodeInput,
        Column::ParamInput,
        Column::DecisionVariable,
        Column::WhatNext,
        Column::NodeTags,
        Column::SkillTag,
        Column::Variable,
        Column::PlatformFlag,
        Column::Flows,
        Column::CssClass,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The header text the runtime compiler expects for this column.
    pub fn header(self) -> &'static str {
        match self {
            Column::Number => "Node Number",
            Column::Kind => "Node Type",
            Column::Name => "Node Name",
            Column::Intent => "Intent",
            Column::EntityType => "Entity Type",
            Column::Entity => "Entity",
            Column::NluDisabled => "NLU Disabled?",
            Column::NextNodes => "Next Nodes",
            Column::Message => "Message",
            Column::RichContentType => "Rich Asset Type",
            Column::RichContent => "Rich Asset Content",
            Column::AnswerRequired => "Answer Required?",
            Column::Behaviors => "Behaviors",
            Column::Command => "Command",
            Column::Description => "Description",
            Column::Output => "Output",
            Column::NodeInput => "Node Input",
            Column::ParamInput => "Parameter Input",
            Column::DecisionVariable => "Decision Variable",
            Column::WhatNext => "What Next?",
            Column::NodeTags => "Node Tags",
            Column::SkillTag => "Skill Tag",
            Column::Variable => "Variable",
            Column::PlatformFlag => "Platform Flag",
            Column::Flows => "Flows",
            Column::CssClass => "CSS Classname",
        }
    }

    /// The full header line, comma-joined.
    pub fn header_line() -> String {
        Column::ALL.iter().map(|c| c.header()).join(",")
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Whether a node presents content to the user or runs a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Decision,
    Action,
}

impl NodeKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "d" | "decision" => Some(NodeKind::Decision),
            "a" | "action" => Some(NodeKind::Action),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            NodeKind::Decision => "D",
            NodeKind::Action => "A",
        }
    }
}

/// A labeled entry of a what-next routing table, e.g. `true~105`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WhatNextRoute {
    pub label: String,
    pub target: i64,
}

impl fmt::Display for WhatNextRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.label, ROUTE_SEPARATOR, self.target)
    }
}

/// One row of the artifact.
///
/// The interpreted columns are held as typed fields. Every column, interpreted or
/// not, is also kept in `columns` so that rows can be written back without losing
/// the passthrough data (tags, variables, platform flags, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub number: i64,
    pub kind: NodeKind,
    pub name: String,
    pub message: Option<String>,
    pub rich_content_type: Option<String>,
    pub rich_content: Option<String>,
    pub next_nodes: Vec<i64>,
    pub command: Option<String>,
    pub what_next: Vec<WhatNextRoute>,
    pub(crate) columns: Vec<String>,
    pub(crate) source_line: Option<String>,
}

impl NodeRecord {
    /// Creates a record with only the key columns populated.
    pub fn new(number: i64, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            number,
            kind,
            name: name.into(),
            message: None,
            rich_content_type: None,
            rich_content: None,
            next_nodes: Vec::new(),
            command: None,
            what_next: Vec::new(),
            columns: vec![String::new(); Column::ALL.len()],
            source_line: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_next_nodes(mut self, next: impl IntoIterator<Item = i64>) -> Self {
        self.next_nodes = next.into_iter().collect();
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_route(mut self, label: impl Into<String>, target: i64) -> Self {
        self.what_next.push(WhatNextRoute {
            label: label.into(),
            target,
        });
        self
    }

    pub fn with_rich_content(mut self, kind: impl Into<String>, payload: impl Into<String>) -> Self {
        self.rich_content_type = Some(kind.into());
        self.rich_content = Some(payload.into());
        self
    }

    pub fn with_column(mut self, column: Column, value: impl Into<String>) -> Self {
        self.columns[column.index()] = value.into();
        self
    }

    /// Negative numbers and numbers at/above the threshold are runtime-owned.
    pub fn is_system(&self) -> bool {
        is_system_number(self.number)
    }

    /// Raw text of any column, including the passthrough ones.
    pub fn column(&self, column: Column) -> &str {
        self.columns
            .get(column.index())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Whitespace/comma/pipe separated tokens of a passthrough column.
    pub fn column_tokens(&self, column: Column) -> impl Iterator<Item = &str> {
        self.column(column)
            .split(|c: char| c == ',' || c == LIST_SEPARATOR || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Whether this row will be written back verbatim.
    pub fn is_pristine(&self) -> bool {
        self.source_line.is_some()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.source_line = None;
    }

    /// All columns in file order, with the interpreted ones taken from the typed fields.
    pub(crate) fn encoded_columns(&self) -> Vec<String> {
        let mut columns = self.columns.clone();
        if columns.len() < Column::ALL.len() {
            columns.resize(Column::ALL.len(), String::new());
        }
        let separator = LIST_SEPARATOR.to_string();
        columns[Column::Number.index()] = self.number.to_string();
        columns[Column::Kind.index()] = self.kind.code().to_string();
        columns[Column::Name.index()] = self.name.clone();
        columns[Column::Message.index()] = self.message.clone().unwrap_or_default();
        columns[Column::RichContentType.index()] =
            self.rich_content_type.clone().unwrap_or_default();
        columns[Column::RichContent.index()] = self.rich_content.clone().unwrap_or_default();
        columns[Column::NextNodes.index()] = self.next_nodes.iter().join(&separator);
        columns[Column::Command.index()] = self.command.clone().unwrap_or_default();
        columns[Column::WhatNext.index()] = self.what_next.iter().join(&separator);
        columns
    }
}

pub fn is_system_number(number: i64) -> bool {
    number < 0 || number >= SYSTEM_NODE_THRESHOLD
}

/// Parses a next-node list. Tokens that are not integers are dropped.
pub(crate) fn parse_next_nodes(raw: &str) -> Vec<i64> {
    raw.split(|c: char| c == LIST_SEPARATOR || c == ',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse().ok())
        .collect()
}

/// Parses a what-next table of `label~number` pairs. Malformed pairs are dropped.
pub(crate) fn parse_what_next(raw: &str) -> Vec<WhatNextRoute> {
    raw.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|pair| {
            let (label, target) = pair.rsplit_once(ROUTE_SEPARATOR)?;
            Some(WhatNextRoute {
                label: label.trim().to_string(),
                target: target.trim().parse().ok()?,
            })
        })
        .collect()
}

pub(crate) fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
