//! Field converters: turning raw field text into typed values.

use crate::datatypes::{Field, FieldInfo};
use crate::error::Error;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};

pub type ConvertError = Box<dyn std::error::Error + Send + Sync>;
pub type ConvertResult = Result<Option<Field>, ConvertError>;

pub type FieldConverter = dyn Fn(&str) -> ConvertResult + Send + Sync;
pub type InfoConverter = dyn Fn(&str, &FieldInfo) -> ConvertResult + Send + Sync;

/// A value transformer applied to one field at a time.
///
/// A converter returns `Ok(Some(value))` when it claims the field, `Ok(None)`
/// when the field does not match what it converts, and `Err` only for a
/// failure the caller wants to abort the read with.
#[derive(Clone)]
pub enum Converter {
    Field(Arc<FieldConverter>),
    WithInfo(Arc<InfoConverter>),
}

impl Converter {
    #[must_use]
    pub fn new<F>(converter: F) -> Self
    where
        F: Fn(&str) -> Option<Field> + Send + Sync + 'static,
    {
        Self::Field(Arc::new(move |v| Ok(converter(v))))
    }

    #[must_use]
    pub fn try_new<F>(converter: F) -> Self
    where
        F: Fn(&str) -> ConvertResult + Send + Sync + 'static,
    {
        Self::Field(Arc::new(converter))
    }

    /// Creates a converter that also receives the position of the field.
    #[must_use]
    pub fn with_info<F>(converter: F) -> Self
    where
        F: Fn(&str, &FieldInfo) -> Option<Field> + Send + Sync + 'static,
    {
        Self::WithInfo(Arc::new(move |v, info| Ok(converter(v, info))))
    }

    #[must_use]
    pub fn try_with_info<F>(converter: F) -> Self
    where
        F: Fn(&str, &FieldInfo) -> ConvertResult + Send + Sync + 'static,
    {
        Self::WithInfo(Arc::new(converter))
    }

    #[must_use]
    pub fn integer() -> Self {
        Self::new(|v| parse_integer(v).map(Field::Int))
    }

    #[must_use]
    pub fn float() -> Self {
        Self::new(|v| parse_float(v).map(Field::Float))
    }

    #[must_use]
    pub fn date() -> Self {
        Self::new(|v| parse_date(v).map(Field::Date))
    }

    #[must_use]
    pub fn date_time() -> Self {
        Self::new(|v| parse_date_time(v).map(Field::DateTime))
    }

    #[must_use]
    pub fn downcase() -> Self {
        Self::new(|v| Some(Field::Text(v.to_lowercase())))
    }

    /// Normalizes a header into an identifier-like name: `" First Name "`
    /// becomes `"first_name"`.
    #[must_use]
    pub fn symbol() -> Self {
        Self::new(|v| Some(Field::Text(symbolize(v))))
    }

    fn apply(&self, value: &str, info: &FieldInfo) -> ConvertResult {
        match self {
            Self::Field(convert) => convert(value),
            Self::WithInfo(convert) => convert(value, info),
        }
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(_) => write!(f, "Field"),
            Self::WithInfo(_) => write!(f, "WithInfo"),
        }
    }
}

/// Converters every field registry starts with.
#[derive(AsRefStr, Clone, Copy, Debug, EnumIter, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    Integer,
    Float,
    Numeric,
    Date,
    DateTime,
    All,
}

impl Builtin {
    fn entry(self) -> Entry {
        match self {
            Self::Integer => Entry::Single(Converter::integer()),
            Self::Float => Entry::Single(Converter::float()),
            Self::Numeric => Entry::Combo(vec!["integer".to_string(), "float".to_string()]),
            Self::Date => Entry::Single(Converter::date()),
            Self::DateTime => Entry::Single(Converter::date_time()),
            Self::All => Entry::Combo(vec!["date_time".to_string(), "numeric".to_string()]),
        }
    }
}

/// Converters only the header registry starts with.
#[derive(AsRefStr, Clone, Copy, Debug, EnumIter, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum HeaderBuiltin {
    Downcase,
    Symbol,
}

impl HeaderBuiltin {
    fn entry(self) -> Entry {
        match self {
            Self::Downcase => Entry::Single(Converter::downcase()),
            Self::Symbol => Entry::Single(Converter::symbol()),
        }
    }
}

#[derive(Clone, Debug)]
enum Entry {
    Single(Converter),
    Combo(Vec<String>),
}

/// A table of named converters.
///
/// Registries are plain values: extending one never affects sessions built
/// from another.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    entries: HashMap<String, Entry>,
}

impl Registry {
    /// Creates a registry with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in field converters.
    #[must_use]
    pub fn fields() -> Self {
        let entries = Builtin::iter()
            .map(|b| (b.as_ref().to_string(), b.entry()))
            .collect();
        Self { entries }
    }

    /// Creates a registry holding the built-in field converters plus the
    /// header-only ones.
    #[must_use]
    pub fn headers() -> Self {
        let mut registry = Self::fields();
        for b in HeaderBuiltin::iter() {
            registry.entries.insert(b.as_ref().to_string(), b.entry());
        }
        registry
    }

    /// Adds or replaces a named converter.
    #[must_use]
    pub fn register(mut self, name: &str, converter: Converter) -> Self {
        self.entries
            .insert(name.to_string(), Entry::Single(converter));
        self
    }

    /// Adds or replaces a name standing for other entries, applied in the
    /// given order.
    #[must_use]
    pub fn register_combo<I, S>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            name.to_string(),
            Entry::Combo(members.into_iter().map(Into::into).collect()),
        );
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Expands `name` into the converters it stands for.
    ///
    /// # Errors
    ///
    /// Returns an error if `name`, or any combo member reachable from it, is
    /// not registered, or if a combo refers back to itself.
    pub fn resolve(&self, name: &str) -> Result<Vec<Converter>, Error> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.expand(name, &mut path, &mut out)?;
        Ok(out)
    }

    fn expand<'a>(
        &'a self,
        name: &'a str,
        path: &mut Vec<&'a str>,
        out: &mut Vec<Converter>,
    ) -> Result<(), Error> {
        if path.contains(&name) {
            return Err(Error::config(format!(
                "converter `{}` refers to itself",
                name
            )));
        }
        match self.entries.get(name) {
            None => Err(Error::config(format!("unknown converter `{}`", name))),
            Some(Entry::Single(converter)) => {
                out.push(converter.clone());
                Ok(())
            }
            Some(Entry::Combo(members)) => {
                path.push(name);
                for member in members {
                    self.expand(member, path, out)?;
                }
                path.pop();
                Ok(())
            }
        }
    }
}

/// The field and header registries a session resolves names against.
#[derive(Clone, Debug)]
pub struct Registries {
    pub fields: Registry,
    pub headers: Registry,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            fields: Registry::fields(),
            headers: Registry::headers(),
        }
    }
}

/// One entry in a converter option: a registry name, or a converter given
/// directly.
#[derive(Clone, Debug)]
pub enum ConverterSpec {
    Named(String),
    Custom(Converter),
}

impl From<&str> for ConverterSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<Builtin> for ConverterSpec {
    fn from(b: Builtin) -> Self {
        Self::Named(b.as_ref().to_string())
    }
}

impl From<HeaderBuiltin> for ConverterSpec {
    fn from(b: HeaderBuiltin) -> Self {
        Self::Named(b.as_ref().to_string())
    }
}

impl From<Converter> for ConverterSpec {
    fn from(c: Converter) -> Self {
        Self::Custom(c)
    }
}

impl<'de> Deserialize<'de> for ConverterSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::Named)
    }
}

/// An ordered list of converters applied to every field of a record.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    converters: Vec<Converter>,
}

impl Pipeline {
    /// Builds a pipeline from converter specs, expanding names against
    /// `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a name cannot be resolved.
    pub fn resolve(specs: &[ConverterSpec], registry: &Registry) -> Result<Self, Error> {
        let mut converters = Vec::with_capacity(specs.len());
        for spec in specs {
            match spec {
                ConverterSpec::Named(name) => converters.extend(registry.resolve(name)?),
                ConverterSpec::Custom(converter) => converters.push(converter.clone()),
            }
        }
        Ok(Self { converters })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Converts the raw fields of the record on `line`.
    ///
    /// # Errors
    ///
    /// Returns an error if a custom converter fails.
    pub fn convert(
        &self,
        fields: Vec<Option<String>>,
        line: usize,
    ) -> Result<Vec<Option<Field>>, Error> {
        fields
            .into_iter()
            .enumerate()
            .map(|(index, field)| match field {
                Some(text) => self
                    .convert_field(text, FieldInfo::new(index, line))
                    .map(Some),
                None => Ok(None),
            })
            .collect()
    }

    fn convert_field(&self, text: String, info: FieldInfo) -> Result<Field, Error> {
        let mut field = Field::Text(text);
        for converter in &self.converters {
            let Field::Text(current) = &field else {
                break;
            };
            let converted = converter
                .apply(current, &info)
                .map_err(|source| Error::Convert {
                    line: info.line(),
                    index: info.index(),
                    source,
                })?;
            if let Some(value) = converted {
                field = value;
            }
        }
        Ok(field)
    }
}

// `%B` and `%A` accept both abbreviated and full names when parsing.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%A, %B %d, %Y",
    "%A, %B %d %Y",
    "%A %B %d %Y",
];

const DATE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%A %B %d %H:%M:%S %Y",
    "%B %d %H:%M:%S %Y",
    "%A, %B %d %H:%M:%S %Y",
];

fn parse_integer(v: &str) -> Option<i64> {
    let v = v.trim();
    let (sign, body) = match v.as_bytes().first()? {
        b'-' => ("-", &v[1..]),
        b'+' => ("", &v[1..]),
        _ => ("", v),
    };
    let prefix = body.get(..2).map(str::to_ascii_lowercase);
    let (radix, digits) = match prefix.as_deref() {
        Some("0x") => (16, &body[2..]),
        Some("0o") => (8, &body[2..]),
        Some("0b") => (2, &body[2..]),
        _ => (10, body),
    };
    let digits = strip_digit_separators(digits, |c| c.is_digit(radix))?;
    i64::from_str_radix(&format!("{}{}", sign, digits), radix).ok()
}

fn parse_float(v: &str) -> Option<f64> {
    let v = v.trim();
    if !v
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E' | '_'))
        || !v.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }
    let v = if v.contains('_') {
        strip_underscores_between_digits(v)?
    } else {
        v.to_string()
    };
    v.parse::<f64>().ok()
}

/// Removes `_` separators from a digit run, rejecting misplaced ones.
fn strip_digit_separators(digits: &str, is_digit: impl Fn(char) -> bool) -> Option<String> {
    if digits.is_empty() || digits.starts_with('_') || digits.ends_with('_') {
        return None;
    }
    let mut out = String::with_capacity(digits.len());
    let mut prev_underscore = false;
    for c in digits.chars() {
        if c == '_' {
            if prev_underscore {
                return None;
            }
            prev_underscore = true;
        } else if is_digit(c) {
            prev_underscore = false;
            out.push(c);
        } else {
            return None;
        }
    }
    Some(out)
}

fn strip_underscores_between_digits(v: &str) -> Option<String> {
    let chars: Vec<char> = v.chars().collect();
    let mut out = String::with_capacity(v.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' {
            let before = i.checked_sub(1).and_then(|j| chars.get(j));
            let after = chars.get(i + 1);
            match (before, after) {
                (Some(b), Some(a)) if b.is_ascii_digit() && a.is_ascii_digit() => continue,
                _ => return None,
            }
        }
        out.push(c);
    }
    Some(out)
}

fn parse_date(v: &str) -> Option<NaiveDate> {
    let v = v.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(v, fmt).ok())
}

fn parse_date_time(v: &str) -> Option<NaiveDateTime> {
    let v = v.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Some(dt.naive_utc());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(v, fmt).ok())
        .or_else(|| parse_date(v).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

fn symbolize(v: &str) -> String {
    v.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn text(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn field(v: &str) -> Option<Field> {
        Some(Field::from(v))
    }

    fn pipeline(specs: &[ConverterSpec]) -> Pipeline {
        Pipeline::resolve(specs, &Registry::headers()).unwrap()
    }

    #[test]
    fn integers() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer(" -17 "), Some(-17));
        assert_eq!(parse_integer("+3"), Some(3));
        assert_eq!(parse_integer("1_000"), Some(1000));
        assert_eq!(parse_integer("0x1F"), Some(31));
        assert_eq!(parse_integer("0b101"), Some(5));
        assert_eq!(parse_integer("0o17"), Some(15));
        assert_eq!(parse_integer("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_integer("9223372036854775808"), None);
        assert_eq!(parse_integer("1__0"), None);
        assert_eq!(parse_integer("_1"), None);
        assert_eq!(parse_integer("1.5"), None);
        assert_eq!(parse_integer("x"), None);
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("--1"), None);
    }

    #[test]
    fn floats() {
        assert_eq!(parse_float("1.5"), Some(1.5));
        assert_eq!(parse_float("-2e3"), Some(-2000.0));
        assert_eq!(parse_float(" 1_000.25 "), Some(1000.25));
        assert_eq!(parse_float("42"), Some(42.0));
        assert_eq!(parse_float("inf"), None);
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_float("1._5"), None);
        assert_eq!(parse_float("e"), None);
        assert_eq!(parse_float("1.2.3"), None);
    }

    #[test]
    fn dates() {
        let d = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap();
        assert_eq!(parse_date("2001-02-03"), Some(d));
        assert_eq!(parse_date("Feb 3, 2001"), Some(d));
        assert_eq!(parse_date("February 3 2001"), Some(d));
        assert_eq!(parse_date("Saturday, February 3, 2001"), Some(d));
        assert_eq!(parse_date("2001-02-30"), None);
        assert_eq!(parse_date("tomorrow"), None);
    }

    #[test]
    fn date_times() {
        let dt = NaiveDate::from_ymd_opt(2001, 2, 3)
            .unwrap()
            .and_hms_opt(4, 5, 6)
            .unwrap();
        assert_eq!(parse_date_time("2001-02-03 04:05:06"), Some(dt));
        assert_eq!(parse_date_time("2001-02-03T04:05:06"), Some(dt));
        assert_eq!(parse_date_time("2001-02-03T06:05:06+02:00"), Some(dt));
        assert_eq!(parse_date_time("Sat Feb 3 04:05:06 2001"), Some(dt));
        let midnight = dt.date().and_hms_opt(0, 0, 0);
        assert_eq!(parse_date_time("2001-02-03"), midnight);
        assert_eq!(parse_date_time("Feb 3 2001"), midnight);
        assert_eq!(parse_date_time("2001-02-03 25:00:00"), None);
    }

    #[test]
    fn symbols() {
        assert_eq!(symbolize(" First  Name "), "first_name");
        assert_eq!(symbolize("E-Mail (work)"), "email_work");
    }

    #[test]
    fn builtin_names() {
        assert_eq!(Builtin::DateTime.as_ref(), "date_time");
        assert_eq!(Builtin::from_str("numeric").unwrap(), Builtin::Numeric);
        assert!(HeaderBuiltin::from_str("integer").is_err());
        let fields = Registry::fields();
        assert!(Builtin::iter().all(|b| fields.contains(b.as_ref())));
        assert!(!fields.contains("symbol"));
        assert!(Registry::headers().contains("symbol"));
    }

    #[test]
    fn combos_expand_in_order() {
        let registry = Registry::fields();
        assert_eq!(registry.resolve("numeric").unwrap().len(), 2);
        // all = date_time, integer, float
        let all = Pipeline::resolve(&["all".into()], &registry).unwrap();
        assert_eq!(all.len(), 3);
        let out = all
            .convert(vec![text("2001-02-03 04:05:06"), text("7"), text("0.5")], 1)
            .unwrap();
        assert!(matches!(out[0], Some(Field::DateTime(_))));
        assert_eq!(out[1], Some(Field::Int(7)));
        assert_eq!(out[2], Some(Field::Float(0.5)));
    }

    #[test]
    fn nested_custom_combo() {
        let shout = Converter::new(|v| Some(Field::Text(v.to_uppercase())));
        let registry = Registry::fields()
            .register("shout", shout)
            .register_combo("loud_numbers", ["shout", "numeric"]);
        let p = Pipeline::resolve(&["loud_numbers".into()], &registry).unwrap();
        assert_eq!(p.len(), 3);
        let out = p.convert(vec![text("0x10"), text("abc")], 1).unwrap();
        assert_eq!(out, vec![Some(Field::Int(16)), Some(Field::from("ABC"))]);
    }

    #[test]
    fn unknown_and_cyclic_names() {
        let registry = Registry::fields();
        assert!(matches!(registry.resolve("nope"), Err(Error::Config(_))));
        let registry = registry
            .register_combo("a", ["b"])
            .register_combo("b", ["integer", "a"]);
        assert!(matches!(registry.resolve("a"), Err(Error::Config(_))));
    }

    #[test]
    fn empty_registry_holds_only_registered() {
        let shout = Converter::new(|v| Some(Field::from(v.to_uppercase())));
        let registry = Registry::empty().register("shout", shout);
        assert!(!registry.contains("integer"));
        assert!(matches!(registry.resolve("integer"), Err(Error::Config(_))));
        let p = Pipeline::resolve(&["shout".into()], &registry).unwrap();
        assert_eq!(p.convert(vec![text("1")], 1).unwrap(), vec![field("1")]);
    }

    #[test]
    fn all_converts_date_only_values() {
        let registry = Registry::fields();
        let p = Pipeline::resolve(&["all".into()], &registry).unwrap();
        let raw = vec![text("2001-02-03"), text("Feb 3 2001")];
        let out = p.convert(raw, 1).unwrap();
        let day = NaiveDate::from_ymd_opt(2001, 2, 3).unwrap();
        let midnight = day.and_hms_opt(0, 0, 0).map(Field::DateTime);
        assert_eq!(out, vec![midnight.clone(), midnight]);
    }

    #[test]
    fn registries_are_independent() {
        let base = Registry::fields();
        let extended = base
            .clone()
            .register("twice", Converter::new(|v| Some(Field::Text(v.repeat(2)))));
        assert!(extended.contains("twice"));
        assert!(!base.contains("twice"));
    }

    #[test]
    fn short_circuit_after_typed_value() {
        let bang = Converter::new(|v| Some(Field::Text(format!("{}!", v))));
        let p = pipeline(&[Builtin::Integer.into(), bang.into()]);
        let out = p.convert(vec![text("42"), text("x")], 1).unwrap();
        assert_eq!(out, vec![Some(Field::Int(42)), Some(Field::from("x!"))]);
    }

    #[test]
    fn declined_conversion_keeps_text() {
        let p = pipeline(&["numeric".into(), "date".into()]);
        let out = p.convert(vec![text("abc"), None, text("")], 1).unwrap();
        assert_eq!(out, vec![field("abc"), None, field("")]);
    }

    #[test]
    fn converters_see_field_info() {
        let tag = Converter::with_info(|v, info| {
            let tagged = format!("{}@{}:{}", v, info.line(), info.index());
            Some(Field::Text(tagged))
        });
        let out = pipeline(&[tag.into()])
            .convert(vec![None, text("b")], 4)
            .unwrap();
        assert_eq!(out, vec![None, Some(Field::from("b@4:1"))]);
    }

    #[test]
    fn custom_failures_propagate() {
        let strict = Converter::try_new(|v| {
            if v == "bad" {
                Err("rejected".into())
            } else {
                Ok(None)
            }
        });
        let err = pipeline(&[strict.into()])
            .convert(vec![text("ok"), text("bad")], 9)
            .unwrap_err();
        match err {
            Error::Convert { line, index, source } => {
                assert_eq!((line, index), (9, 1));
                assert_eq!(source.to_string(), "rejected");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn header_converters() {
        let p = pipeline(&[HeaderBuiltin::Symbol.into()]);
        let out = p.convert(vec![text("Zip Code"), text("ID")], 1).unwrap();
        assert_eq!(out, vec![field("zip_code"), field("id")]);
        let p = pipeline(&["downcase".into()]);
        assert_eq!(
            p.convert(vec![text("NAME")], 1).unwrap(),
            vec![Some(Field::from("NAME".to_lowercase()))]
        );
    }
}
