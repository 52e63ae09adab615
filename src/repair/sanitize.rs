/// Characters the compiler rejects outright and that carry no meaning in an artifact.
const INVISIBLE: &[char] = &['\u{FEFF}', '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}'];

/// What a sanitizing pass changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sanitized {
    pub text: String,
    /// Invisible and control characters dropped.
    pub removed: usize,
    /// Non-breaking spaces turned into plain spaces.
    pub replaced: usize,
    /// `\r\n` and lone `\r` sequences turned into `\n`.
    pub line_endings: usize,
}

impl Sanitized {
    pub fn changed(&self) -> bool {
        self.removed + self.replaced + self.line_endings > 0
    }

    /// A fix-log line, or `None` when nothing changed.
    pub fn describe(&self) -> Option<String> {
        if !self.changed() {
            return None;
        }
        let mut parts = Vec::new();
        if self.removed > 0 {
            parts.push(format!("removed {} invisible or control characters", self.removed));
        }
        if self.replaced > 0 {
            parts.push(format!("replaced {} non-breaking spaces", self.replaced));
        }
        if self.line_endings > 0 {
            parts.push(format!("normalized {} line endings", self.line_endings));
        }
        Some(format!("Sanitized artifact: {}", parts.join(", ")))
    }
}

/// Normalizes artifact text for the compiler: line endings become `\n`, invisible
/// and control characters (other than tab and newline) are dropped, and
/// non-breaking spaces become plain spaces. Applying it twice changes nothing.
pub fn sanitize(text: &str) -> Sanitized {
    let mut out = Sanitized {
        text: String::with_capacity(text.len()),
        ..Default::default()
    };
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.text.push('\n');
                out.line_endings += 1;
            }
            '\n' | '\t' => out.text.push(c),
            '\u{00A0}' => {
                out.text.push(' ');
                out.replaced += 1;
            }
            c if INVISIBLE.contains(&c) || c.is_control() => out.removed += 1,
            c => out.text.push(c),
        }
    }
    out
}
