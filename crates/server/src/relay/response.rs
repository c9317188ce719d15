//! Reply decoding for the external order API.
//!
//! The upstream service answers with JSON that is frequently wrapped in HTML,
//! Windows-1252 encoded, or written with typographic quotes. Decoding runs in
//! stages and stops at the first one that yields an object: the cleaned body
//! as JSON, the first balanced `{...}` block, the block starting at
//! `{"result"`, and finally regex extraction of the known keys.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Fields the relay reads from a reply. Missing fields are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RelayReply {
    pub result: String,
    pub token: Option<String>,
    pub code: String,
    pub total: String,
    pub message: String,
}

impl RelayReply {
    pub fn is_success(&self) -> bool {
        self.result == "1"
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            result: field(object, "result"),
            token: Some(field(object, "token")).filter(|token| !token.is_empty()),
            code: field(object, "code"),
            total: field(object, "total"),
            message: field(object, "message"),
        }
    }
}

fn field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(value)) => value.trim().to_string(),
        Some(Value::Number(value)) => value.to_string(),
        Some(Value::Bool(value)) => String::from(if *value { "1" } else { "0" }),
        _ => String::new(),
    }
}

/// Parses a raw reply body, or `None` when not even a result flag can be found.
pub fn parse_reply(body: &[u8]) -> Option<RelayReply> {
    let text = clean(&decode_body(body));
    decode_json(&text).or_else(|| soft_extract(&text))
}

/// First characters of the decoded body, for error details.
pub fn body_excerpt(body: &[u8], limit: usize) -> String {
    decode_body(body).chars().take(limit).collect()
}

/// UTF-8 when valid, otherwise Windows-1252.
pub fn decode_body(body: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(body) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(body);
            text
        }
    }
}

fn clean(text: &str) -> String {
    let mut text = normalize_quotes(text);
    if text.contains("&#") {
        text = decode_numeric_entities(&text);
    }
    text.trim_start_matches(['\u{feff}', ' ', '\t', '\n', '\r', '\0', '\u{0b}']).trim().to_string()
}

fn normalize_quotes(text: &str) -> String {
    const ENTITIES: [&str; 7] =
        ["&laquo;", "&raquo;", "&ldquo;", "&rdquo;", "&lsquo;", "&rsquo;", "&quot;"];

    let mut text = text.to_string();
    for entity in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, "\"");
        }
    }

    text.chars()
        .map(|ch| match ch {
            '\u{ab}' | '\u{bb}' | '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{201c}'
            | '\u{201d}' | '\u{201e}' | '\u{2032}' | '\u{2033}' => '"',
            other => other,
        })
        .collect()
}

fn decode_numeric_entities(text: &str) -> String {
    static ENTITY: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) =
        ENTITY.get_or_init(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").ok())
    else {
        return text.to_string();
    };

    pattern
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (_, Some(dec)) => dec.as_str().parse::<u32>().ok(),
                _ => None,
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_json(text: &str) -> Option<RelayReply> {
    if let Some(reply) = parse_object(text) {
        return Some(reply);
    }

    if let Some(candidate) = first_balanced_object(text) {
        if let Some(reply) = parse_object(candidate.trim()) {
            return Some(reply);
        }
    }

    let start = text.find("{\"result\"")?;
    let tail = &text[start..];
    let end = tail.rfind('}')?;
    parse_object(&tail[..=end])
}

fn parse_object(candidate: &str) -> Option<RelayReply> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(object) => Some(RelayReply::from_object(&object)),
        _ => None,
    }
}

/// Leftmost `{` whose braces balance, ignoring string literals like the upstream does.
fn first_balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    for (start, _) in text.match_indices('{') {
        let mut depth = 0usize;
        for (offset, byte) in bytes[start..].iter().enumerate() {
            match byte {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=start + offset]);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

struct SoftPatterns {
    tags: Regex,
    whitespace: Regex,
    result: Regex,
    code: Regex,
    total: Regex,
    message: Regex,
    token: Regex,
}

fn soft_patterns() -> Option<&'static SoftPatterns> {
    static PATTERNS: OnceLock<Option<SoftPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(SoftPatterns {
                tags: Regex::new(r"<[^>]*>").ok()?,
                whitespace: Regex::new(r"\s+").ok()?,
                result: Regex::new(r#"(?i)"result"\s*:\s*"?(1|0)"?"#).ok()?,
                code: Regex::new(r#"(?i)"code"\s*:\s*"?(.*?)"?(?:,|\s|\})"#).ok()?,
                total: Regex::new(r#"(?i)"total"\s*:\s*"?([0-9.,]+)"?"#).ok()?,
                message: Regex::new(r#"(?i)"message"\s*:\s*"?(.*?)"?(?:,|\s|\})"#).ok()?,
                token: Regex::new(r#"(?i)"token"\s*:\s*"?(.*?)"?(?:,|\s|\})"#).ok()?,
            })
        })
        .as_ref()
}

/// Last resort: pull the known keys out of whatever text is left.
fn soft_extract(text: &str) -> Option<RelayReply> {
    let patterns = soft_patterns()?;
    let stripped = patterns.tags.replace_all(text, "");
    let flat = patterns.whitespace.replace_all(stripped.trim(), " ");

    let capture = |pattern: &Regex| {
        pattern
            .captures(&flat)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    };

    let result = capture(&patterns.result);
    if result.is_empty() {
        return None;
    }

    Some(RelayReply {
        result,
        token: Some(capture(&patterns.token)).filter(|token| !token.is_empty()),
        code: capture(&patterns.code),
        total: capture(&patterns.total).replace(',', "."),
        message: capture(&patterns.message),
    })
}

#[cfg(test)]
mod tests {
    use super::{body_excerpt, parse_reply, RelayReply};

    #[test]
    fn plain_json_reply() {
        let reply = parse_reply(br#"{"result":"1","code":"P-7781","total":"181.50","message":""}"#)
            .expect("reply");
        assert!(reply.is_success());
        assert_eq!(reply.code, "P-7781");
        assert_eq!(reply.total, "181.50");
        assert_eq!(reply.token, None);
    }

    #[test]
    fn numeric_fields_are_read_as_text() {
        let reply = parse_reply(br#"{"result":1,"code":7781,"total":181.5}"#).expect("reply");
        assert_eq!(reply.result, "1");
        assert_eq!(reply.code, "7781");
        assert_eq!(reply.total, "181.5");
    }

    #[test]
    fn json_wrapped_in_html_with_bom() {
        let body = "\u{feff}<html><body><p>Notice: undefined index</p>\
                    {\"result\":\"1\",\"token\":\"abc123\"}</body></html>";
        let reply = parse_reply(body.as_bytes()).expect("reply");
        assert_eq!(reply.token.as_deref(), Some("abc123"));
    }

    #[test]
    fn typographic_quotes_and_entities_are_normalised() {
        let body = "\u{201c}result\u{201d}:&quot;1&quot;";
        let wrapped = format!("{{{body},\u{201c}token\u{201d}:\u{201c}tok-9\u{201d}}}");
        let reply = parse_reply(wrapped.as_bytes()).expect("reply");
        assert!(reply.is_success());
        assert_eq!(reply.token.as_deref(), Some("tok-9"));
    }

    #[test]
    fn windows_1252_body_is_decoded() {
        // 0x93/0x94 are curly double quotes, 0xED is í
        let mut body = b"{\x93result\x94:\x930\x94,\x93message\x94:\x93Art\xedculo no encontrado\x94,".to_vec();
        body.extend_from_slice(b"\x93code\x94:\x93P-1\x94}");
        let reply = parse_reply(&body).expect("reply");
        assert_eq!(reply.result, "0");
        assert_eq!(reply.message, "Artículo no encontrado");
        assert_eq!(reply.code, "P-1");
    }

    #[test]
    fn numeric_entities_are_decoded() {
        let reply = parse_reply(br#"{"result":"0","message":"Cliente &#x27;X&#x27; err&#243;neo"}"#)
            .expect("reply");
        assert_eq!(reply.message, "Cliente 'X' erróneo");
    }

    #[test]
    fn result_object_after_broken_prefix() {
        let body = br#"{ warning {"result":"1","code":"P-2","total":"10"} trailing"#;
        let reply = parse_reply(body).expect("reply");
        assert_eq!(reply.code, "P-2");
    }

    #[test]
    fn soft_extraction_from_malformed_json() {
        let body = br#"<b>Warning</b> {"result":"1", "code":"P-9", "total":"1.234,50", "message":"ok" "#;
        let reply = parse_reply(body).expect("reply");
        assert_eq!(
            reply,
            RelayReply {
                result: "1".to_string(),
                token: None,
                code: "P-9".to_string(),
                total: "1.234.50".to_string(),
                message: "ok".to_string(),
            }
        );
    }

    #[test]
    fn garbage_yields_nothing() {
        assert_eq!(parse_reply(b"<html>502 Bad Gateway</html>"), None);
        assert_eq!(parse_reply(b""), None);
    }

    #[test]
    fn excerpt_is_bounded() {
        assert_eq!(body_excerpt(b"abcdef", 3), "abc");
    }
}
