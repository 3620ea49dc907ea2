//! Output escaping modes and the escaping context threaded through compilation.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// How a produced value is neutralized before it is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escape {
    /// Emit as-is.
    Raw,
    /// HTML entity escaping. The default for variable output.
    #[default]
    Html,
    /// Percent-encoding for URL components.
    Url,
    /// Escaping for the inside of a JavaScript string literal.
    Js,
}

impl Escape {
    /// Look up a mode by the name used in templates (`escape({$x}, url)`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "raw" | "none" | "false" => Some(Escape::Raw),
            "html" | "true" => Some(Escape::Html),
            "url" | "urlencode" => Some(Escape::Url),
            "js" | "javascript" => Some(Escape::Js),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Escape::Raw => "raw",
            Escape::Html => "html",
            Escape::Url => "url",
            Escape::Js => "js",
        }
    }

    /// Apply this escaping mode to a string.
    pub fn apply(self, input: &str) -> Cow<'_, str> {
        match self {
            Escape::Raw => Cow::Borrowed(input),
            Escape::Html => html_escape(input),
            Escape::Url => url_encode(input),
            Escape::Js => js_escape(input),
        }
    }
}

impl fmt::Display for Escape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The ambient escaping instruction for the next emitted expression.
///
/// A bare variable compiles under the context it is found in. Functions
/// such as `raw` and `urlencode` compile their argument under a forced
/// context; `if` and `helper` compile some arguments unescaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EscapeContext {
    mode: Escape,
}

impl EscapeContext {
    pub const HTML: EscapeContext = EscapeContext { mode: Escape::Html };
    pub const RAW: EscapeContext = EscapeContext { mode: Escape::Raw };

    pub fn new(mode: Escape) -> Self {
        Self { mode }
    }

    #[inline]
    pub fn mode(self) -> Escape {
        self.mode
    }

    #[inline]
    pub fn is_raw(self) -> bool {
        self.mode == Escape::Raw
    }
}

impl From<Escape> for EscapeContext {
    fn from(mode: Escape) -> Self {
        Self::new(mode)
    }
}

fn html_escape(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 16);
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn url_encode(input: &str) -> Cow<'_, str> {
    let unreserved = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~');
    if input.bytes().all(unreserved) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() * 3);
    for b in input.bytes() {
        if unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    Cow::Owned(out)
}

fn js_escape(input: &str) -> Cow<'_, str> {
    if !input.contains(['\\', '\'', '"', '\n', '\r', '<', '>', '\u{2028}', '\u{2029}']) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 16);
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            // keeps `</script>` from terminating an inline script block
            '<' => out.push_str("\\x3C"),
            '>' => out.push_str("\\x3E"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
