//! Entry formatters.
//!
//! # Responsibilities
//! - Render a [`LogEntry`] into the text a sink writes
//! - Template formatting with `{token}` placeholders
//! - Self-contained XML and JSON records for structured files
//!
//! # Template tokens
//! `{message}`, `{category}`, `{severity}`, `{priority}`, `{eventid}`,
//! `{title}`, `{newline}`, `{tab}`, `{property(Name)}`, `{timestamp}`,
//! `{timestamp(local)}`, `{timestamp(local:%H:%M)}`, `{timestamp(%Y)}`.
//! Anything else is copied through verbatim.

use std::fmt::{self, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::Local;

use crate::pipeline::entry::LogEntry;

/// Template used by the flat and rolling file sinks unless configured otherwise.
pub const DEFAULT_TEMPLATE: &str = "Timestamp: {timestamp(local)}{newline}\
Message: {message}{newline}\
Category: {category}{newline}\
Priority: {priority}{newline}\
EventId: {eventid}{newline}\
ActivityId: {property(ActivityId)}{newline}\
Severity: {severity}{newline}\
Title:{title}{newline}";

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Renders an entry to text.
pub trait Formatter: Send + Sync + fmt::Debug {
    fn format(&self, entry: &LogEntry) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Message,
    Category,
    Severity,
    Priority,
    EventId,
    Title,
    Newline,
    Tab,
    Property(String),
    Timestamp { local: bool, format: String },
}

/// Formatter driven by a `{token}` template.
#[derive(Debug, Clone)]
pub struct TextFormatter {
    tokens: Vec<Token>,
}

impl TextFormatter {
    pub fn new(template: &str) -> Self {
        Self {
            tokens: parse_template(template),
        }
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl Formatter for TextFormatter {
    fn format(&self, entry: &LogEntry) -> String {
        let mut out = String::with_capacity(256);
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Message => out.push_str(entry.message()),
                Token::Category => out.push_str(&entry.categories().join(", ")),
                Token::Severity => out.push_str(entry.severity().as_str()),
                Token::Priority => {
                    let _ = write!(out, "{}", entry.priority());
                }
                Token::EventId => {
                    let _ = write!(out, "{}", entry.event_id());
                }
                Token::Title => out.push_str(entry.title()),
                Token::Newline => out.push('\n'),
                Token::Tab => out.push('\t'),
                Token::Property(key) => out.push_str(entry.property(key).unwrap_or_default()),
                Token::Timestamp { local, format } => {
                    let _ = if *local {
                        write!(out, "{}", entry.timestamp().with_timezone(&Local).format(format))
                    } else {
                        write!(out, "{}", entry.timestamp().format(format))
                    };
                }
            }
        }
        out
    }
}

fn parse_template(template: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        let close = open + len;

        push_literal(&mut tokens, &rest[..open]);
        match parse_token(&rest[open + 1..close]) {
            Some(token) => tokens.push(token),
            None => push_literal(&mut tokens, &rest[open..=close]),
        }
        rest = &rest[close + 1..];
    }

    push_literal(&mut tokens, rest);
    tokens
}

fn push_literal(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::Literal(last)) = tokens.last_mut() {
        last.push_str(text);
    } else {
        tokens.push(Token::Literal(text.to_string()));
    }
}

fn parse_token(inner: &str) -> Option<Token> {
    let (name, arg) = match inner.find('(') {
        Some(i) if inner.ends_with(')') => (&inner[..i], Some(&inner[i + 1..inner.len() - 1])),
        _ => (inner, None),
    };

    let token = match (name.to_ascii_lowercase().as_str(), arg) {
        ("message", None) => Token::Message,
        ("category", None) => Token::Category,
        ("severity", None) => Token::Severity,
        ("priority", None) => Token::Priority,
        ("eventid", None) => Token::EventId,
        ("title", None) => Token::Title,
        ("newline", None) => Token::Newline,
        ("tab", None) => Token::Tab,
        ("property", Some(key)) if !key.is_empty() => Token::Property(key.to_string()),
        ("timestamp", arg) => {
            let (local, format) = timestamp_parts(arg);
            if !is_valid_time_format(format) {
                return None;
            }
            Token::Timestamp {
                local,
                format: format.to_string(),
            }
        }
        _ => return None,
    };
    Some(token)
}

fn timestamp_parts(arg: Option<&str>) -> (bool, &str) {
    match arg {
        None | Some("") => (false, DEFAULT_TIME_FORMAT),
        Some("local") => (true, DEFAULT_TIME_FORMAT),
        Some(arg) => match arg.strip_prefix("local:") {
            Some(format) => (true, format),
            None => (false, arg),
        },
    }
}

/// True if chrono can render `pattern` without error.
pub fn is_valid_time_format(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

/// Date formats in `{timestamp(...)}` tokens of `template` that chrono rejects.
///
/// Such tokens are copied through verbatim by [`TextFormatter`].
pub fn invalid_time_formats(template: &str) -> Vec<String> {
    let mut invalid = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        let inner = &rest[open + 1..open + len];
        if let Some(arg) = inner
            .split_once('(')
            .filter(|(name, arg)| name.eq_ignore_ascii_case("timestamp") && arg.ends_with(')'))
            .map(|(_, arg)| &arg[..arg.len() - 1])
        {
            let (_, format) = timestamp_parts(Some(arg));
            if !is_valid_time_format(format) {
                invalid.push(format.to_string());
            }
        }
        rest = &rest[open + len + 1..];
    }
    invalid
}

/// Renders each entry as one standalone `<LogEntry>` element.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFormatter;

impl Formatter for XmlFormatter {
    fn format(&self, entry: &LogEntry) -> String {
        let mut out = String::with_capacity(512);
        out.push_str("<LogEntry>");
        let _ = write!(
            out,
            "<Timestamp>{}</Timestamp>",
            entry.timestamp().to_rfc3339()
        );
        let _ = write!(out, "<Severity>{}</Severity>", entry.severity());
        let _ = write!(out, "<EventId>{}</EventId>", entry.event_id());
        let _ = write!(out, "<Priority>{}</Priority>", entry.priority());
        let _ = write!(out, "<Title>{}</Title>", xml_escape(entry.title()));
        out.push_str("<Categories>");
        for category in entry.categories() {
            let _ = write!(out, "<Category>{}</Category>", xml_escape(category));
        }
        out.push_str("</Categories>");
        let _ = write!(out, "<Message>{}</Message>", xml_escape(entry.message()));
        if !entry.properties().is_empty() {
            out.push_str("<Properties>");
            for (key, value) in entry.properties() {
                let _ = write!(
                    out,
                    "<Property name=\"{}\">{}</Property>",
                    xml_escape(key),
                    xml_escape(value)
                );
            }
            out.push_str("</Properties>");
        }
        let _ = write!(out, "<Process id=\"{}\"/>", std::process::id());
        out.push_str("</LogEntry>");
        out
    }
}

/// Escape text for use in XML content and attribute values.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders each entry as one JSON object on a single line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, entry: &LogEntry) -> String {
        serde_json::json!({
            "timestamp": entry.timestamp().to_rfc3339(),
            "severity": entry.severity().as_str(),
            "message": entry.message(),
            "categories": entry.categories(),
            "title": entry.title(),
            "priority": entry.priority(),
            "event_id": entry.event_id(),
            "properties": entry.properties(),
            "process_id": std::process::id(),
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::entry::Severity;
    use chrono::{TimeZone, Utc};

    fn entry() -> LogEntry {
        LogEntry::builder("Testing")
            .severity(Severity::Error)
            .categories(["Simple", "Rolling"])
            .timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
            .property("ActivityId", "1234")
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_template() {
        let text = TextFormatter::default().format(&entry());
        assert!(text.contains("Message: Testing\n"));
        assert!(text.contains("Category: Simple, Rolling\n"));
        assert!(text.contains("Priority: -1\n"));
        assert!(text.contains("EventId: 1\n"));
        assert!(text.contains("ActivityId: 1234\n"));
        assert!(text.contains("Severity: Error\n"));
        assert!(text.ends_with("Title:\n"));
    }

    #[test]
    fn test_utc_timestamp_format() {
        let text = TextFormatter::new("{timestamp(%Y-%m-%d %H:%M)}").format(&entry());
        assert_eq!(text, "2024-03-01 12:30");
    }

    #[test]
    fn test_unknown_tokens_pass_through() {
        let text = TextFormatter::new("{nope} {message} {property()} {").format(&entry());
        assert_eq!(text, "{nope} Testing {property()} {");
    }

    #[test]
    fn test_missing_property_is_empty() {
        let text = TextFormatter::new("[{property(User)}]").format(&entry());
        assert_eq!(text, "[]");
    }

    #[test]
    fn test_xml_record_is_escaped() {
        let entry = LogEntry::builder("a < b & \"c\"")
            .category("xml")
            .build()
            .unwrap();
        let xml = XmlFormatter.format(&entry);
        assert!(xml.starts_with("<LogEntry>"));
        assert!(xml.ends_with("</LogEntry>"));
        assert!(xml.contains("<Message>a &lt; b &amp; &quot;c&quot;</Message>"));
        assert!(!xml.contains('\n'));
    }

    #[test]
    fn test_invalid_timestamp_format_passes_through() {
        let text = TextFormatter::new("[{timestamp(%Q)}] {message}").format(&entry());
        assert_eq!(text, "[{timestamp(%Q)}] Testing");
    }

    #[test]
    fn test_invalid_time_formats_reported() {
        assert!(invalid_time_formats(DEFAULT_TEMPLATE).is_empty());
        assert_eq!(
            invalid_time_formats("{timestamp(local:%Q)} {timestamp(%Y)} {TIMESTAMP(%!)}"),
            vec!["%Q", "%!"]
        );
        assert!(is_valid_time_format("%Y-%m-%d-%H-%M"));
        assert!(!is_valid_time_format("%Q"));
    }

    #[test]
    fn test_xml_record_stays_on_one_line() {
        let entry = LogEntry::builder("first\r\nsecond")
            .category("xml")
            .title("multi\nline")
            .property("Trace", "a\nb")
            .build()
            .unwrap();
        let xml = XmlFormatter.format(&entry);
        assert!(!xml.contains('\n'));
        assert!(!xml.contains('\r'));
        assert!(xml.contains("<Message>first&#13;&#10;second</Message>"));
        assert!(xml.contains("<Title>multi&#10;line</Title>"));
    }

    #[test]
    fn test_json_record() {
        let line = JsonFormatter.format(&entry());
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["severity"], "Error");
        assert_eq!(value["categories"][1], "Rolling");
        assert_eq!(value["properties"]["ActivityId"], "1234");
    }
}
