//! A minimal executor for generated code.
//!
//! [`Renderer`] walks a [`Code`] tree against a [`Value`] data context.
//! Everything that depends on the installation (number and date formats,
//! URL layout, page navigation markup, helper callbacks) is asked of a
//! [`RenderHost`]; [`DefaultHost`] provides plain implementations driven by
//! a [`LocaleFormat`].

use std::cmp::Ordering;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::DateTime;
use chrono::format::{Item, StrftimeItems};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use vellum_compiler::{Code, CompareOp, FormatKind, Test};
use vellum_core::{Escape, Value};

use crate::error::RenderError;

type Result<T> = std::result::Result<T, RenderError>;

// ============================================================================
// Locale
// ============================================================================

/// Number and date conventions of one locale. Date formats use `strftime`
/// syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleFormat {
    pub thousands_separator: String,
    pub decimal_point: String,
    pub date_format: String,
    pub time_format: String,
    pub datetime_format: String,
}

impl Default for LocaleFormat {
    fn default() -> Self {
        Self {
            thousands_separator: ",".into(),
            decimal_point: ".".into(),
            date_format: "%Y-%m-%d".into(),
            time_format: "%H:%M".into(),
            datetime_format: "%Y-%m-%d %H:%M".into(),
        }
    }
}

impl LocaleFormat {
    /// Check that every date format parses.
    pub fn validate(&self) -> Result<()> {
        for format in [&self.date_format, &self.time_format, &self.datetime_format] {
            check_format(format)?;
        }
        Ok(())
    }

    /// The default format for a date-like [`FormatKind`].
    pub fn date_format_for(&self, kind: FormatKind) -> &str {
        match kind {
            FormatKind::Time => &self.time_format,
            FormatKind::DateTime => &self.datetime_format,
            _ => &self.date_format,
        }
    }

    /// Group the integer part and round to `decimals` places.
    pub fn format_number(&self, value: f64, decimals: usize) -> String {
        let fixed = format!("{:.*}", decimals, value.abs());
        let (int_part, frac_part) = match fixed.split_once('.') {
            Some((int, frac)) => (int, Some(frac)),
            None => (fixed.as_str(), None),
        };

        let mut out = String::with_capacity(fixed.len() + int_part.len() / 3);
        let negative = value < 0.0 && fixed.bytes().any(|b| matches!(b, b'1'..=b'9'));
        if negative {
            out.push('-');
        }
        for (i, digit) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                out.push_str(&self.thousands_separator);
            }
            out.push(digit);
        }
        if let Some(frac) = frac_part {
            out.push_str(&self.decimal_point);
            out.push_str(frac);
        }
        out
    }
}

fn check_format(format: &str) -> Result<Vec<Item<'_>>> {
    let items: Vec<_> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(RenderError::DateFormat(format.to_string()));
    }
    Ok(items)
}

// ============================================================================
// Host
// ============================================================================

/// Arguments of a `pagenav` call, evaluated.
#[derive(Debug, Clone, Copy)]
pub struct PageNavRequest<'a> {
    pub link: &'a str,
    pub data: &'a Value,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub params: &'a [(String, String)],
}

impl PageNavRequest<'_> {
    pub fn page_count(&self) -> u64 {
        if self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(self.per_page).max(1)
    }
}

/// Execution-time services.
pub trait RenderHost: Send + Sync {
    /// Locale-format a number with `decimals` fractional digits.
    fn format_number(&self, value: f64, decimals: usize) -> String;

    /// Format a unix timestamp. `format` overrides the locale's default for
    /// `kind`.
    fn format_date(&self, kind: FormatKind, timestamp: i64, format: Option<&str>) -> Result<String>;

    /// Build a URL for a symbolic link type.
    fn link(&self, kind: &str, data: &Value, params: &[(String, String)]) -> String;

    /// Page navigation markup.
    fn page_nav(&self, request: &PageNavRequest<'_>) -> String;

    /// Call an external helper. Unknown helpers render nothing.
    fn helper(&self, name: &str, args: &[Value]) -> String;
}

/// Pages [`DefaultHost`] lists on either side of the current one.
pub const PAGE_NAV_RADIUS: u64 = 2;

const PAGE_NAV_GAP: &str = "<span class=\"gap\">&hellip;</span>";

/// A helper callback.
pub type HelperFn = Arc<dyn Fn(&[Value]) -> String + Send + Sync>;

/// [`RenderHost`] with a fixed locale, a URL prefix and a helper table.
#[derive(Clone, Default)]
pub struct DefaultHost {
    locale: LocaleFormat,
    base_url: String,
    helpers: FxHashMap<String, HelperFn>,
}

impl fmt::Debug for DefaultHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut helpers: Vec<_> = self.helpers.keys().collect();
        helpers.sort();
        f.debug_struct("DefaultHost")
            .field("locale", &self.locale)
            .field("base_url", &self.base_url)
            .field("helpers", &helpers)
            .finish()
    }
}

impl DefaultHost {
    pub fn new(locale: LocaleFormat) -> Self {
        Self {
            locale,
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_helper(
        mut self,
        name: impl Into<String>,
        helper: impl Fn(&[Value]) -> String + Send + Sync + 'static,
    ) -> Self {
        self.helpers.insert(name.into(), Arc::new(helper));
        self
    }

    pub fn locale(&self) -> &LocaleFormat {
        &self.locale
    }

    fn page_link(&self, out: &mut String, request: &PageNavRequest<'_>, page: u64) {
        let mut params = request.params.to_vec();
        if page > 1 {
            params.push(("page".into(), page.to_string()));
        }
        let url = self.link(request.link, request.data, &params);
        let _ = write!(out, "<a href=\"{}\">{page}</a>", Escape::Html.apply(&url));
    }
}

impl RenderHost for DefaultHost {
    fn format_number(&self, value: f64, decimals: usize) -> String {
        self.locale.format_number(value, decimals)
    }

    fn format_date(
        &self,
        kind: FormatKind,
        timestamp: i64,
        format: Option<&str>,
    ) -> Result<String> {
        let format = format.unwrap_or_else(|| self.locale.date_format_for(kind));
        let items = check_format(format)?;
        let at = DateTime::from_timestamp(timestamp, 0)
            .ok_or(RenderError::Timestamp(timestamp))?;
        Ok(at.format_with_items(items.into_iter()).to_string())
    }

    /// `{base}/{kind}[/{id}][?k=v&...]`. The id is the data's `id` field,
    /// or the data itself when it is a scalar.
    fn link(&self, kind: &str, data: &Value, params: &[(String, String)]) -> String {
        let mut url = format!("{}/{}", self.base_url, kind.trim_matches('/'));
        let id = match data {
            Value::Map(_) => data.get("id").cloned().unwrap_or(Value::Null),
            Value::List(_) => Value::Null,
            other => other.clone(),
        };
        let id = id.to_string();
        if !id.is_empty() {
            url.push('/');
            url.push_str(&Escape::Url.apply(&id));
        }
        for (i, (key, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&Escape::Url.apply(key));
            url.push('=');
            url.push_str(&Escape::Url.apply(value));
        }
        url
    }

    /// The first and last pages plus [`PAGE_NAV_RADIUS`] pages either side
    /// of the current one, with a gap marker between runs.
    fn page_nav(&self, request: &PageNavRequest<'_>) -> String {
        let pages = request.page_count();
        if pages <= 1 {
            return String::new();
        }
        let current = request.page.clamp(1, pages);
        let low = current.saturating_sub(PAGE_NAV_RADIUS).max(1);
        let high = current.saturating_add(PAGE_NAV_RADIUS).min(pages);

        let mut out = String::from("<nav class=\"pagenav\">");
        if low > 1 {
            self.page_link(&mut out, request, 1);
            if low > 2 {
                out.push_str(PAGE_NAV_GAP);
            }
        }
        for page in low..=high {
            if page == current {
                let _ = write!(out, "<span class=\"current\">{page}</span>");
            } else {
                self.page_link(&mut out, request, page);
            }
        }
        if high < pages {
            if high + 1 < pages {
                out.push_str(PAGE_NAV_GAP);
            }
            self.page_link(&mut out, request, pages);
        }
        out.push_str("</nav>");
        out
    }

    fn helper(&self, name: &str, args: &[Value]) -> String {
        match self.helpers.get(name) {
            Some(helper) => helper(args),
            None => {
                tracing::debug!(helper = name, "unknown helper");
                String::new()
            }
        }
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Evaluates generated code.
pub struct Renderer<'h> {
    host: &'h dyn RenderHost,
}

impl<'h> Renderer<'h> {
    pub fn new(host: &'h dyn RenderHost) -> Self {
        Self { host }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn render(&self, code: &Code, data: &Value) -> Result<String> {
        let mut scope = Scope {
            data,
            bindings: Vec::new(),
        };
        let mut out = String::new();
        self.write(code, &mut scope, &mut out)?;
        Ok(out)
    }

    fn write(&self, code: &Code, scope: &mut Scope<'_>, out: &mut String) -> Result<()> {
        match code {
            Code::Text(text) => out.push_str(text),
            Code::Const(value) => {
                let _ = write!(out, "{value}");
            }
            Code::Var(path) => {
                if let Some(value) = scope.lookup(path) {
                    let _ = write!(out, "{value}");
                }
            }
            Code::Concat(parts) => {
                for part in parts {
                    self.write(part, scope, out)?;
                }
            }
            Code::Escape { mode, inner } => {
                let text = self.text(inner, scope)?;
                out.push_str(&mode.apply(&text));
            }
            Code::Cond {
                test,
                then,
                otherwise,
            } => {
                let branch = if self.test(test, scope)? { then } else { otherwise };
                self.write(branch, scope, out)?;
            }
            Code::Each {
                source,
                key,
                value,
                body,
            } => {
                let items: Vec<(Value, Value)> = match self.value(source, scope)? {
                    Value::List(items) => items
                        .into_iter()
                        .enumerate()
                        .map(|(i, item)| (Value::Number(i as f64), item))
                        .collect(),
                    Value::Map(map) => map
                        .into_iter()
                        .map(|(k, v)| (Value::String(k), v))
                        .collect(),
                    _ => Vec::new(),
                };
                for (item_key, item) in items {
                    let depth = scope.bindings.len();
                    if let Some(key) = key {
                        scope.bindings.push((key.clone(), item_key));
                    }
                    scope.bindings.push((value.clone(), item));
                    let result = self.write(body, scope, out);
                    scope.bindings.truncate(depth);
                    result?;
                }
            }
            Code::Arith(arith) => {
                let mut number =
                    |code: &Code| -> Result<f64> { Ok(self.value(code, scope)?.as_f64()) };
                let result = arith.evaluate::<RenderError>(&mut number)?;
                let _ = write!(out, "{}", Value::Number(result));
            }
            Code::Format {
                kind,
                value,
                option,
            } => {
                let value = self.value(value, scope)?;
                let option = match option {
                    Some(option) => Some(self.value(option, scope)?),
                    None => None,
                };
                out.push_str(&self.format(*kind, &value, option.as_ref())?);
            }
            Code::Link { kind, data, params } => {
                let kind = self.text(kind, scope)?;
                let data = match data {
                    Some(data) => self.value(data, scope)?,
                    None => Value::Null,
                };
                let params = self.params(params, scope)?;
                out.push_str(&self.host.link(&kind, &data, &params));
            }
            Code::PageNav {
                link,
                data,
                page,
                per_page,
                total,
                params,
            } => {
                let link = self.text(link, scope)?;
                let data = self.value(data, scope)?;
                let params = self.params(params, scope)?;
                let request = PageNavRequest {
                    link: &link,
                    data: &data,
                    page: count_of(self.value(page, scope)?.as_f64()),
                    per_page: count_of(self.value(per_page, scope)?.as_f64()),
                    total: count_of(self.value(total, scope)?.as_f64()),
                    params: &params,
                };
                out.push_str(&self.host.page_nav(&request));
            }
            Code::Helper { name, args } => {
                let name = self.text(name, scope)?;
                let args = args
                    .iter()
                    .map(|arg| self.value(arg, scope))
                    .collect::<Result<Vec<_>>>()?;
                out.push_str(&self.host.helper(&name, &args));
            }
            Code::Include { name } => return Err(RenderError::UnexpandedInclude(name.clone())),
        }
        Ok(())
    }

    fn text(&self, code: &Code, scope: &mut Scope<'_>) -> Result<String> {
        let mut out = String::new();
        self.write(code, scope, &mut out)?;
        Ok(out)
    }

    /// The value behind `code`: data lookups and constants keep their type,
    /// anything else is its rendered text.
    fn value(&self, code: &Code, scope: &mut Scope<'_>) -> Result<Value> {
        match code {
            Code::Const(value) => Ok(value.clone()),
            Code::Var(path) => Ok(scope.lookup(path).cloned().unwrap_or(Value::Null)),
            Code::Text(text) => Ok(Value::String(text.clone())),
            other => self.text(other, scope).map(Value::String),
        }
    }

    fn params(
        &self,
        params: &[(String, Code)],
        scope: &mut Scope<'_>,
    ) -> Result<Vec<(String, String)>> {
        params
            .iter()
            .map(|(name, code)| Ok((name.clone(), self.text(code, scope)?)))
            .collect()
    }

    fn test(&self, test: &Test, scope: &mut Scope<'_>) -> Result<bool> {
        Ok(match test {
            Test::Truthy(code) => self.value(code, scope)?.is_truthy(),
            Test::Not(inner) => !self.test(inner, scope)?,
            Test::And(left, right) => self.test(left, scope)? && self.test(right, scope)?,
            Test::Or(left, right) => self.test(left, scope)? || self.test(right, scope)?,
            Test::Compare { op, left, right } => {
                let left = self.value(left, scope)?;
                let right = self.value(right, scope)?;
                match op {
                    CompareOp::Eq => left.loose_eq(&right),
                    CompareOp::Ne => !left.loose_eq(&right),
                    CompareOp::Lt => left.loose_cmp(&right) == Some(Ordering::Less),
                    CompareOp::Le => matches!(
                        left.loose_cmp(&right),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    CompareOp::Gt => left.loose_cmp(&right) == Some(Ordering::Greater),
                    CompareOp::Ge => matches!(
                        left.loose_cmp(&right),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                }
            }
        })
    }

    fn format(&self, kind: FormatKind, value: &Value, option: Option<&Value>) -> Result<String> {
        match kind {
            FormatKind::Count => Ok(self
                .host
                .format_number(value.count() as f64, decimals(option))),
            FormatKind::Number => Ok(self.host.format_number(value.as_f64(), decimals(option))),
            FormatKind::Date | FormatKind::Time | FormatKind::DateTime => {
                let format = option.map(Value::to_string).filter(|f| !f.is_empty());
                self.host
                    .format_date(kind, value.as_f64() as i64, format.as_deref())
            }
        }
    }
}

impl fmt::Debug for Renderer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer").finish_non_exhaustive()
    }
}

const MAX_DECIMALS: usize = 12;

fn decimals(option: Option<&Value>) -> usize {
    option
        .map_or(0, |v| count_of(v.as_f64()) as usize)
        .min(MAX_DECIMALS)
}

fn count_of(n: f64) -> u64 {
    if n.is_finite() && n > 0.0 { n as u64 } else { 0 }
}

/// Loop bindings shadowing the data context.
struct Scope<'d> {
    data: &'d Value,
    bindings: Vec<(String, Value)>,
}

impl Scope<'_> {
    fn lookup(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let root = self
            .bindings
            .iter()
            .rev()
            .find(|(name, _)| name == first)
            .map(|(_, value)| value)
            .or_else(|| self.data.get(first))?;
        root.lookup(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_compiler::{Arith, ArithOp};

    fn render(code: &Code, data: &Value) -> Result<String> {
        Renderer::new(&DefaultHost::default()).render(code, data)
    }

    fn data(pairs: &[(&str, Value)]) -> Value {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn escapes_variables() {
        let code = Code::concat([
            Code::text("Hello "),
            Code::escape(Escape::Html, Code::var(["name"])),
            Code::text("!"),
        ]);
        let out = render(&code, &data(&[("name", "<b>".into())])).unwrap();
        assert_eq!(out, "Hello &lt;b&gt;!");
    }

    #[test]
    fn missing_values_render_empty() {
        let code = Code::var(["user", "name"]);
        assert_eq!(render(&code, &Value::Null).unwrap(), "");
    }

    #[test]
    fn loops_bind_key_and_value() {
        let code = Code::Each {
            source: Box::new(Code::var(["items"])),
            key: Some("i".into()),
            value: "item".into(),
            body: Box::new(Code::concat([
                Code::var(["i"]),
                Code::text("="),
                Code::var(["item", "name"]),
                Code::text(";"),
            ])),
        };
        let items = Value::List(vec![
            data(&[("name", "a".into())]),
            data(&[("name", "b".into())]),
        ]);
        assert_eq!(
            render(&code, &data(&[("items", items)])).unwrap(),
            "0=a;1=b;"
        );
    }

    #[test]
    fn loop_bindings_shadow_and_unwind() {
        let code = Code::concat([
            Code::Each {
                source: Box::new(Code::var(["names"])),
                key: None,
                value: "name".into(),
                body: Box::new(Code::var(["name"])),
            },
            Code::text("|"),
            Code::var(["name"]),
        ]);
        let input = data(&[
            ("names", Value::from(vec!["x", "y"])),
            ("name", "outer".into()),
        ]);
        assert_eq!(render(&code, &input).unwrap(), "xy|outer");
    }

    #[test]
    fn conditions_compare_loosely() {
        let code = Code::Cond {
            test: Box::new(Test::Compare {
                op: CompareOp::Ge,
                left: Code::var(["count"]),
                right: Code::Const(Value::Number(10.0)),
            }),
            then: Box::new(Code::text("many")),
            otherwise: Box::new(Code::text("few")),
        };
        assert_eq!(
            render(&code, &data(&[("count", "12".into())])).unwrap(),
            "many"
        );
        assert_eq!(render(&code, &data(&[("count", 3.into())])).unwrap(), "few");
    }

    #[test]
    fn arithmetic_coerces_and_rejects_division_by_zero() {
        let code = Code::Arith(Box::new(Arith::Binary {
            op: ArithOp::Div,
            left: Box::new(Arith::Num(10.0)),
            right: Box::new(Arith::Value(Code::var(["n"]))),
        }));
        assert_eq!(render(&code, &data(&[("n", 4.into())])).unwrap(), "2.5");
        assert!(matches!(
            render(&code, &data(&[("n", "abc".into())])),
            Err(RenderError::Arith(_))
        ));
    }

    #[test]
    fn number_formatting() {
        let locale = LocaleFormat::default();
        assert_eq!(locale.format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(locale.format_number(-1000.0, 0), "-1,000");
        assert_eq!(locale.format_number(-0.001, 1), "0.0");
        assert_eq!(locale.format_number(999.0, 0), "999");

        let european = LocaleFormat {
            thousands_separator: ".".into(),
            decimal_point: ",".into(),
            ..LocaleFormat::default()
        };
        assert_eq!(european.format_number(12345.5, 1), "12.345,5");
    }

    #[test]
    fn count_formats_collection_size() {
        let code = Code::Format {
            kind: FormatKind::Count,
            value: Box::new(Code::var(["posts"])),
            option: None,
        };
        let posts = Value::List((0..1200).map(Value::from).collect());
        assert_eq!(render(&code, &data(&[("posts", posts)])).unwrap(), "1,200");
    }

    #[test]
    fn dates_use_locale_or_explicit_format() {
        let host = DefaultHost::default();
        assert_eq!(
            host.format_date(FormatKind::Date, 0, None).unwrap(),
            "1970-01-01"
        );
        assert_eq!(
            host.format_date(FormatKind::DateTime, 86_400 + 3_600, None)
                .unwrap(),
            "1970-01-02 01:00"
        );
        assert_eq!(
            host.format_date(FormatKind::Date, 0, Some("%d/%m/%Y"))
                .unwrap(),
            "01/01/1970"
        );
        assert!(matches!(
            host.format_date(FormatKind::Date, 0, Some("%Q")),
            Err(RenderError::DateFormat(_))
        ));
        assert!(matches!(
            host.format_date(FormatKind::Date, i64::MAX, None),
            Err(RenderError::Timestamp(_))
        ));
    }

    #[test]
    fn links_and_page_navigation() {
        let host = DefaultHost::default().with_base_url("https://forum.test/");
        let thread = data(&[("id", 5.into()), ("title", "Hi".into())]);
        assert_eq!(
            host.link("threads", &thread, &[("page".into(), "2".into())]),
            "https://forum.test/threads/5?page=2"
        );
        assert_eq!(
            host.link("members", &Value::Null, &[]),
            "https://forum.test/members"
        );

        let nav = host.page_nav(&PageNavRequest {
            link: "threads",
            data: &thread,
            page: 2,
            per_page: 10,
            total: 25,
            params: &[],
        });
        assert!(nav.starts_with("<nav class=\"pagenav\">"));
        assert!(nav.contains("<a href=\"https://forum.test/threads/5\">1</a>"));
        assert!(nav.contains("<span class=\"current\">2</span>"));
        assert!(nav.contains("threads/5?page=3\">3</a>"));

        let single = PageNavRequest {
            link: "threads",
            data: &thread,
            page: 1,
            per_page: 10,
            total: 4,
            params: &[],
        };
        assert_eq!(host.page_nav(&single), "");
    }

    #[test]
    fn page_navigation_is_windowed() {
        let host = DefaultHost::default();
        let forum = Value::Null;
        let request = |page| PageNavRequest {
            link: "forums",
            data: &forum,
            page,
            per_page: 1,
            total: 200_000,
            params: &[],
        };

        let nav = host.page_nav(&request(1000));
        assert_eq!(nav.matches("<a ").count(), 6);
        assert_eq!(nav.matches("class=\"gap\"").count(), 2);
        assert!(nav.contains("<a href=\"/forums\">1</a>"));
        assert!(nav.contains("?page=998\">998</a>"));
        assert!(nav.contains("<span class=\"current\">1000</span>"));
        assert!(nav.contains("?page=1002\">1002</a>"));
        assert!(nav.contains("?page=200000\">200000</a>"));
        assert!(!nav.contains(">997<"));

        // no gap next to an adjacent first or last page
        let nav = host.page_nav(&request(4));
        assert_eq!(nav.matches("class=\"gap\"").count(), 1);
        assert!(nav.contains("/forums\">1</a><a href=\"/forums?page=2\">2</a>"));

        let nav = host.page_nav(&request(u64::MAX));
        assert!(nav.contains("<span class=\"current\">200000</span>"));
        assert_eq!(nav.matches("<a ").count(), 3);
    }

    #[test]
    fn helpers_dispatch_by_name() {
        let host = DefaultHost::default().with_helper("shout", |args: &[Value]| {
            args.iter().map(|a| a.to_string().to_uppercase()).collect()
        });
        let code = Code::Helper {
            name: Box::new(Code::text("shout")),
            args: vec![Code::var(["word"]), Code::text("!")],
        };
        let out = Renderer::new(&host)
            .render(&code, &data(&[("word", "hey".into())]))
            .unwrap();
        assert_eq!(out, "HEY!");

        let unknown = Code::Helper {
            name: Box::new(Code::text("nope")),
            args: vec![],
        };
        assert_eq!(render(&unknown, &Value::Null).unwrap(), "");
    }

    #[test]
    fn unexpanded_includes_do_not_render() {
        let code = Code::Include {
            name: "header".into(),
        };
        assert_eq!(
            render(&code, &Value::Null),
            Err(RenderError::UnexpandedInclude("header".into()))
        );
    }
}
