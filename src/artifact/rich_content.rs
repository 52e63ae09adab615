use serde_json::Value;

/// The rich-content kinds the runtime renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RichContentKind {
    Carousel,
    ListPicker,
    DatePicker,
    FileUpload,
    FreeText,
    Generic,
}

impl RichContentKind {
    pub fn from_tag(tag: &str) -> Self {
        let normalized: String = tag
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "carousel" => RichContentKind::Carousel,
            "listpicker" | "buttons" | "quickreplies" => RichContentKind::ListPicker,
            "datepicker" | "calendar" => RichContentKind::DatePicker,
            "fileupload" | "upload" => RichContentKind::FileUpload,
            "freetext" | "textbox" | "text" => RichContentKind::FreeText,
            _ => RichContentKind::Generic,
        }
    }
}

/// A selectable option. `destination` is set when the option jumps to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichOption {
    pub label: String,
    pub destination: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselCard {
    pub title: String,
    pub buttons: Vec<RichOption>,
}

/// A decoded rich-content payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RichContent {
    Carousel { cards: Vec<CarouselCard> },
    ListPicker { options: Vec<RichOption>, multi_select: bool },
    DatePicker,
    FileUpload,
    FreeText,
    Generic(Value),
}

const LABEL_KEYS: [&str; 3] = ["label", "title", "text"];
const DESTINATION_KEYS: [&str; 4] = ["dest", "destination", "node", "action"];
const OPTION_COLLECTIONS: [&str; 3] = ["options", "buttons", "choices"];

impl RichContent {
    /// Decodes a payload for the given type tag.
    ///
    /// Returns `None` when there is no payload at all. A payload that is not valid
    /// structured data decodes to an option-less value of its kind.
    pub fn parse(tag: Option<&str>, payload: Option<&str>) -> Option<Self> {
        let payload = payload.map(str::trim).filter(|p| !p.is_empty());
        let kind = tag
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(RichContentKind::from_tag);
        if payload.is_none() && kind.is_none() {
            return None;
        }
        let value = payload.and_then(decode_payload);

        Some(match kind.unwrap_or(RichContentKind::Generic) {
            RichContentKind::Carousel => RichContent::Carousel {
                cards: value.as_ref().map(parse_cards).unwrap_or_default(),
            },
            RichContentKind::ListPicker => RichContent::ListPicker {
                options: value
                    .as_ref()
                    .map(|v| {
                        let mut out = Vec::new();
                        collect_options(v, &mut out);
                        out
                    })
                    .unwrap_or_default(),
                multi_select: value
                    .as_ref()
                    .and_then(|v| v.get("multi_select"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
            RichContentKind::DatePicker => RichContent::DatePicker,
            RichContentKind::FileUpload => RichContent::FileUpload,
            RichContentKind::FreeText => RichContent::FreeText,
            RichContentKind::Generic => RichContent::Generic(value.unwrap_or(Value::Null)),
        })
    }

    pub fn kind(&self) -> RichContentKind {
        match self {
            RichContent::Carousel { .. } => RichContentKind::Carousel,
            RichContent::ListPicker { .. } => RichContentKind::ListPicker,
            RichContent::DatePicker => RichContentKind::DatePicker,
            RichContent::FileUpload => RichContentKind::FileUpload,
            RichContent::FreeText => RichContentKind::FreeText,
            RichContent::Generic(_) => RichContentKind::Generic,
        }
    }

    /// Every option in declaration order, whether or not it has a destination.
    pub fn options(&self) -> Vec<RichOption> {
        match self {
            RichContent::Carousel { cards } => cards
                .iter()
                .flat_map(|card| card.buttons.iter().cloned())
                .collect(),
            RichContent::ListPicker { options, .. } => options.clone(),
            RichContent::Generic(value) => {
                let mut out = Vec::new();
                collect_options(value, &mut out);
                out
            }
            RichContent::DatePicker | RichContent::FileUpload | RichContent::FreeText => {
                Vec::new()
            }
        }
    }

    /// `(label, node)` for the options that route to a node.
    pub fn destinations(&self) -> Vec<(String, i64)> {
        self.options()
            .into_iter()
            .filter_map(|o| o.destination.map(|d| (o.label, d)))
            .collect()
    }
}

/// Accepts both toggle-quoted JSON and JSON whose quotes were doubled for CSV.
fn decode_payload(payload: &str) -> Option<Value> {
    serde_json::from_str(payload)
        .ok()
        .or_else(|| serde_json::from_str(&payload.replace("\"\"", "\"")).ok())
        .filter(|v: &Value| v.is_object() || v.is_array())
}

fn parse_cards(value: &Value) -> Vec<CarouselCard> {
    let cards = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("cards").or_else(|| map.get("items")) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    cards
        .iter()
        .filter(|card| card.is_object())
        .map(|card| {
            let mut buttons = Vec::new();
            collect_options(card, &mut buttons);
            CarouselCard {
                title: first_string(card, &LABEL_KEYS).unwrap_or_default(),
                buttons,
            }
        })
        .collect()
}

/// Walks a payload collecting the members of every option collection.
fn collect_options(value: &Value, out: &mut Vec<RichOption>) {
    match value {
        Value::Array(items) => {
            for item in items {
                if let Some(option) = parse_option(item) {
                    out.push(option);
                } else {
                    collect_options(item, out);
                }
            }
        }
        Value::Object(map) => {
            for key in OPTION_COLLECTIONS {
                if let Some(Value::Array(items)) = map.get(key) {
                    for item in items {
                        if let Some(option) = parse_option(item) {
                            out.push(option);
                        }
                    }
                }
            }
            for (key, nested) in map {
                if !OPTION_COLLECTIONS.contains(&key.as_str()) && !nested.is_string() {
                    collect_options(nested, out);
                }
            }
        }
        _ => {}
    }
}

fn parse_option(item: &Value) -> Option<RichOption> {
    if !item.is_object() || OPTION_COLLECTIONS.iter().any(|key| item.get(*key).is_some()) {
        return None;
    }
    let destination = DESTINATION_KEYS
        .iter()
        .filter_map(|key| item.get(*key))
        .find_map(as_node_number);
    let has_destination_key = DESTINATION_KEYS.iter().any(|key| item.get(*key).is_some());
    let label = first_string(item, &LABEL_KEYS);
    if label.is_none() && !has_destination_key {
        return None;
    }
    Some(RichOption {
        label: label.unwrap_or_default(),
        destination,
    })
}

fn as_node_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_string(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .find_map(Value::as_str)
        .map(str::to_string)
}
