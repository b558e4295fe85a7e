//! Definitions to help handling CSV data as header-addressable records.

use crate::csv::separator::DEFAULT_ROW_SEP;
use crate::csv::writer::encode_line;
use crate::datatypes::Field;
use itertools::{EitherOrBoth, Itertools};
use std::collections::HashMap;
use std::fmt;
use std::slice;
use std::vec;

/// A header and the field stored under it. Either side may be absent.
pub type Pair = (Option<Field>, Option<Field>);

/// Selects a pair in a [`Row`].
#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    /// The pair at this position.
    Index(usize),
    /// The first pair at or after position `from` whose header is `name`.
    /// `from` tells duplicate headers apart.
    Header { name: Field, from: usize },
}

impl Key {
    #[must_use]
    pub fn header<H: Into<Field>>(name: H, from: usize) -> Self {
        Self::Header {
            name: name.into(),
            from,
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::header(name, 0)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::header(name, 0)
    }
}

impl From<Field> for Key {
    fn from(name: Field) -> Self {
        Self::header(name, 0)
    }
}

impl<H: Into<Field>> From<(H, usize)> for Key {
    fn from((name, from): (H, usize)) -> Self {
        Self::header(name, from)
    }
}

/// What [`Row::push`] appends.
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    /// A field without a header.
    Field(Option<Field>),
    /// A header and its field.
    Pair(Option<Field>, Option<Field>),
    /// Several header/field pairs, appended in order.
    Batch(Vec<Pair>),
}

/// A record whose fields can be addressed both by position and by header.
///
/// Headers need not be unique; lookups by header find the first match at or
/// after a given position.
#[derive(Clone, Debug, Default)]
pub struct Row {
    pairs: Vec<Pair>,
    header_row: bool,
}

impl Row {
    /// Pairs `headers` with `fields`. If one is shorter, it is padded with
    /// absent values.
    #[must_use]
    pub fn new(headers: Vec<Option<Field>>, fields: Vec<Option<Field>>, header_row: bool) -> Self {
        let pairs = headers
            .into_iter()
            .zip_longest(fields)
            .map(|pair| match pair {
                EitherOrBoth::Both(h, f) => (h, f),
                EitherOrBoth::Left(h) => (h, None),
                EitherOrBoth::Right(f) => (None, f),
            })
            .collect();
        Self { pairs, header_row }
    }

    /// Returns `true` if this row holds the header record itself.
    #[must_use]
    pub fn is_header_row(&self) -> bool {
        self.header_row
    }

    #[must_use]
    pub fn is_field_row(&self) -> bool {
        !self.header_row
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns the field selected by `key`, or `None` if there is no such
    /// pair or its field is absent.
    pub fn field<K: Into<Key>>(&self, key: K) -> Option<&Field> {
        let index = self.position(&key.into())?;
        self.pairs[index].1.as_ref()
    }

    /// Stores `value` in the pair selected by `key`.
    ///
    /// An index past the end grows the row with absent pairs up to it. A
    /// header that is not found is appended as a new pair.
    ///
    /// # Panics
    ///
    /// Panics if the row cannot grow to hold the given index.
    pub fn set_field<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Key>,
        V: Into<Option<Field>>,
    {
        let value = value.into();
        match key.into() {
            Key::Index(i) => {
                if i >= self.pairs.len() {
                    self.pairs.resize(i.saturating_add(1), (None, None));
                }
                self.pairs[i].1 = value;
            }
            key @ Key::Header { .. } => match self.position(&key) {
                Some(i) => self.pairs[i].1 = value,
                None => {
                    if let Key::Header { name, .. } = key {
                        self.pairs.push((Some(name), value));
                    }
                }
            },
        }
    }

    /// Appends `item` and returns the row, so calls can be chained.
    pub fn push(&mut self, item: Item) -> &mut Self {
        match item {
            Item::Field(field) => self.pairs.push((None, field)),
            Item::Pair(header, field) => self.pairs.push((header, field)),
            Item::Batch(pairs) => self.pairs.extend(pairs),
        }
        self
    }

    /// Removes and returns the pair selected by `key`.
    pub fn delete<K: Into<Key>>(&mut self, key: K) -> Option<Pair> {
        let index = self.position(&key.into())?;
        Some(self.pairs.remove(index))
    }

    /// Removes every pair for which `pred` returns `true`.
    pub fn delete_if<P>(&mut self, mut pred: P) -> &mut Self
    where
        P: FnMut(Option<&Field>, Option<&Field>) -> bool,
    {
        self.pairs.retain(|(h, f)| !pred(h.as_ref(), f.as_ref()));
        self
    }

    /// Returns all headers in order, duplicates included.
    #[must_use]
    pub fn headers(&self) -> Vec<Option<&Field>> {
        self.pairs.iter().map(|(h, _)| h.as_ref()).collect()
    }

    /// Returns all fields in order.
    #[must_use]
    pub fn fields(&self) -> Vec<Option<&Field>> {
        self.pairs.iter().map(|(_, f)| f.as_ref()).collect()
    }

    /// Looks up each key in turn, as [`field`](Self::field) does.
    pub fn values_at<I, K>(&self, keys: I) -> Vec<Option<&Field>>
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        keys.into_iter().map(|k| self.field(k)).collect()
    }

    /// Returns the position of the first pair at or after `from` whose header
    /// is `name`.
    pub fn index_of<H: Into<Field>>(&self, name: H, from: usize) -> Option<usize> {
        self.position(&Key::header(name, from))
    }

    pub fn has_header<H: Into<Field>>(&self, name: H) -> bool {
        let name = name.into();
        self.pairs.iter().any(|(h, _)| h.as_ref() == Some(&name))
    }

    pub fn has_field<V: Into<Field>>(&self, value: V) -> bool {
        let value = value.into();
        self.pairs.iter().any(|(_, f)| f.as_ref() == Some(&value))
    }

    /// Collapses the row into a map from header text to field. Order is lost,
    /// a later duplicate header overwrites an earlier one, and an absent
    /// header is keyed by `""`.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, Option<Field>> {
        self.pairs
            .iter()
            .map(|(h, f)| {
                let key = h.as_ref().map_or_else(String::new, ToString::to_string);
                (key, f.clone())
            })
            .collect()
    }

    /// Renders the fields, without headers, as one CSV line using `,` and
    /// `"\n"`.
    #[must_use]
    pub fn to_csv(&self) -> String {
        encode_line(self.fields(), ",", DEFAULT_ROW_SEP)
    }

    pub fn iter(&self) -> slice::Iter<'_, Pair> {
        self.pairs.iter()
    }

    fn position(&self, key: &Key) -> Option<usize> {
        match key {
            Key::Index(i) if *i < self.pairs.len() => Some(*i),
            Key::Index(_) => None,
            Key::Header { name, from } => self
                .pairs
                .iter()
                .enumerate()
                .skip(*from)
                .find(|(_, (h, _))| h.as_ref() == Some(name))
                .map(|(i, _)| i),
        }
    }
}

/// Rows are equal when their pairs are; whether either is a header row does
/// not matter.
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.pairs == other.pairs
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csv())
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Pair;
    type IntoIter = slice::Iter<'a, Pair>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for Row {
    type Item = Pair;
    type IntoIter = vec::IntoIter<Pair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl FromIterator<Pair> for Row {
    fn from_iter<I: IntoIterator<Item = Pair>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
            header_row: false,
        }
    }
}

impl Extend<Pair> for Row {
    fn extend<I: IntoIterator<Item = Pair>>(&mut self, iter: I) {
        self.pairs.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: &str) -> Option<Field> {
        Some(Field::from(v))
    }

    fn i(v: i64) -> Option<Field> {
        Some(Field::Int(v))
    }

    fn owned(fields: Vec<Option<&Field>>) -> Vec<Option<Field>> {
        fields.into_iter().map(Option::<&Field>::cloned).collect()
    }

    fn dup_row() -> Row {
        Row::new(vec![t("a"), t("b"), t("a")], vec![i(1), i(2), i(3)], false)
    }

    #[test]
    fn pads_shorter_side() {
        let row = Row::new(vec![t("a"), t("b"), t("c")], vec![i(1), i(2)], false);
        assert_eq!(
            row.iter().cloned().collect::<Vec<_>>(),
            vec![(t("a"), i(1)), (t("b"), i(2)), (t("c"), None)]
        );
        let row = Row::new(vec![t("a")], vec![i(1), i(2)], false);
        assert_eq!(row.headers(), vec![Some(&Field::from("a")), None]);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn duplicate_headers() {
        let row = dup_row();
        assert_eq!(row.field("a"), Some(&Field::Int(1)));
        assert_eq!(row.field(("a", 1)), Some(&Field::Int(3)));
        assert_eq!(row.field(("a", 3)), None);
        assert_eq!(row.field(1_usize), Some(&Field::Int(2)));
        assert_eq!(row.field(5_usize), None);
        assert_eq!(row.field("z"), None);
        assert_eq!(row.index_of("a", 0), Some(0));
        assert_eq!(row.index_of("a", 1), Some(2));
        assert_eq!(row.index_of("b", 2), None);
    }

    #[test]
    fn set_by_index_grows_row() {
        let mut row = Row::new(vec![t("a")], vec![i(1)], false);
        row.set_field(3_usize, Field::Int(4));
        assert_eq!(
            row.iter().cloned().collect::<Vec<_>>(),
            vec![(t("a"), i(1)), (None, None), (None, None), (None, i(4))]
        );
        row.set_field(0_usize, None::<Field>);
        assert_eq!(row.field(0_usize), None);
        assert_eq!(row.headers()[0], Some(&Field::from("a")));
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn set_at_largest_index_cannot_grow() {
        let mut row = Row::default();
        row.set_field(usize::MAX, Field::Int(1));
    }

    #[test]
    fn set_by_header() {
        let mut row = dup_row();
        row.set_field(("a", 1), Field::Int(30));
        assert_eq!(row.fields()[2], Some(&Field::Int(30)));
        row.set_field("c", Field::from("new"));
        assert_eq!(row.len(), 4);
        assert_eq!(row.field("c"), Some(&Field::from("new")));
        row.set_field(("b", 2), Field::Int(0));
        assert_eq!(row.len(), 5);
        assert_eq!(row.field("b"), Some(&Field::Int(2)));
        assert_eq!(row.field(("b", 2)), Some(&Field::Int(0)));
    }

    #[test]
    fn push_items_and_chain() {
        let mut row = Row::default();
        row.push(Item::Field(i(1)))
            .push(Item::Pair(t("h"), i(2)))
            .push(Item::Batch(vec![(t("x"), i(3)), (t("y"), None)]));
        assert_eq!(owned(row.headers()), vec![None, t("h"), t("x"), t("y")]);
        assert_eq!(owned(row.fields()), vec![i(1), i(2), i(3), None]);
    }

    #[test]
    fn delete_pairs() {
        let mut row = dup_row();
        assert_eq!(row.delete(("a", 1)), Some((t("a"), i(3))));
        assert_eq!(row.delete("missing"), None);
        assert_eq!(row.delete(7_usize), None);
        assert_eq!(row.delete(0_usize), Some((t("a"), i(1))));
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn delete_matching_pairs() {
        let mut row = dup_row();
        row.delete_if(|h, _| h == Some(&Field::from("a")));
        assert_eq!(row.headers(), vec![Some(&Field::from("b"))]);
        let mut row = dup_row();
        row.delete_if(|_, f| f.and_then(Field::as_i64) > Some(1));
        assert_eq!(row.fields(), vec![Some(&Field::Int(1))]);
    }

    #[test]
    fn bulk_lookup() {
        let row = dup_row();
        let keys: Vec<Key> = vec!["b".into(), ("a", 1).into(), 0_usize.into(), "q".into()];
        assert_eq!(owned(row.values_at(keys)), vec![i(2), i(3), i(1), None]);
        assert_eq!(owned(row.values_at(["a", "b"])), vec![i(1), i(2)]);
    }

    #[test]
    fn membership() {
        let row = dup_row();
        assert!(row.has_header("b"));
        assert!(!row.has_header("c"));
        assert!(row.has_field(3_i64));
        assert!(!row.has_field("3"));
    }

    #[test]
    fn map_is_lossy() {
        let map = dup_row().to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], i(3));
        assert_eq!(map["b"], i(2));
        let mut row = Row::default();
        row.push(Item::Field(i(9)));
        assert_eq!(row.to_map()[""], i(9));
    }

    #[test]
    fn csv_text_has_fields_only() {
        let headers = vec![t("x"), t("y"), t("z")];
        let row = Row::new(headers, vec![t("a,b"), None, i(3)], false);
        assert_eq!(row.to_csv(), "\"a,b\",,3\n");
        assert_eq!(row.to_string(), row.to_csv());
    }

    #[test]
    fn iteration() {
        let row = dup_row();
        let total: i64 = (&row)
            .into_iter()
            .filter(|(h, _)| h.as_ref().map_or(false, |h| *h == "a"))
            .filter_map(|(_, f)| f.as_ref().and_then(Field::as_i64))
            .sum();
        assert_eq!(total, 4);
        let found = row.iter().find(|(_, f)| *f == i(2));
        assert_eq!(found, Some(&(t("b"), i(2))));
        let named = row.clone().into_iter().filter(|(h, _)| h.is_some());
        let mut rebuilt: Row = named.collect();
        rebuilt.extend(vec![(t("c"), None)]);
        assert_eq!(rebuilt.len(), 4);
        assert!(rebuilt.is_field_row());
    }

    #[test]
    fn equality_ignores_role() {
        let header = Row::new(vec![t("a")], vec![t("a")], true);
        let field = Row::new(vec![t("a")], vec![t("a")], false);
        assert!(header.is_header_row());
        assert_eq!(header, field);
    }
}
