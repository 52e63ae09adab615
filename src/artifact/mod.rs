//! The tabular bot definition: row records, the line parser/serializer, and the
//! typed view over rich-content payloads.

pub mod parser;
pub mod record;
pub mod rich_content;

pub use parser::{Artifact, SkipReason, SkippedLine, encode_field, split_fields};
pub use record::{Column, NodeKind, NodeRecord, WhatNextRoute, is_system_number};
pub use rich_content::{CarouselCard, RichContent, RichContentKind, RichOption};
