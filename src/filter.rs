//! Filters: predicates selecting zero or more documents.
//!
//! A `Filter` maps field names either to a literal value (equality) or to
//! a comparison expression. Each field appears at most once; several
//! comparisons on the same field are merged into a single operator
//! document, which means they must all hold.

use std::fmt;
use bson::{ Bson, Document };
use crate::bsn::is_operator_doc;

/// A comparison operator usable in a filter expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Equal to, `$eq`.
    Eq,
    /// Not equal to, `$ne`.
    Ne,
    /// Strictly greater than, `$gt`.
    Gt,
    /// Greater than or equal to, `$gte`.
    Gte,
    /// Strictly less than, `$lt`.
    Lt,
    /// Less than or equal to, `$lte`.
    Lte,
    /// Equal to any member of an array, `$in`.
    In,
}

impl Comparison {
    /// The operator key as it appears in a filter document.
    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Eq  => "$eq",
            Comparison::Ne  => "$ne",
            Comparison::Gt  => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt  => "$lt",
            Comparison::Lte => "$lte",
            Comparison::In  => "$in",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter document, built field by field.
/// ```
/// # use bson::doc;
/// # use folio::filter::Filter;
/// #
/// let filter = Filter::new()
///     .eq("in_stock", true)
///     .gt("published_year", 2010);
///
/// assert_eq!(filter.into_document(), doc!{
///     "in_stock": true,
///     "published_year": { "$gt": 2010 },
/// });
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Document);

impl Filter {
    /// Creates an empty filter, matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `field` to be equal to `value`. Replaces any previous
    /// condition on the same field.
    pub fn eq<K, V>(mut self, field: K, value: V) -> Self
        where K: Into<String>,
              V: Into<Bson>,
    {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Requires `field` to compare to `value` as specified by `op`.
    /// Comparisons on the same field accumulate; a comparison replaces a
    /// previous literal equality on that field.
    pub fn compare<K, V>(mut self, field: K, op: Comparison, value: V) -> Self
        where K: Into<String>,
              V: Into<Bson>,
    {
        let field = field.into();
        let value = value.into();

        if let Some(Bson::Document(ops)) = self.0.get_mut(&field) {
            if is_operator_doc(ops) {
                ops.insert(op.as_str(), value);
                return self;
            }
        }

        let mut ops = Document::new();
        ops.insert(op.as_str(), value);
        self.0.insert(field, ops);
        self
    }

    /// Requires `field` to be different from `value`.
    pub fn ne<K: Into<String>, V: Into<Bson>>(self, field: K, value: V) -> Self {
        self.compare(field, Comparison::Ne, value)
    }

    /// Requires `field` to be strictly greater than `value`.
    pub fn gt<K: Into<String>, V: Into<Bson>>(self, field: K, value: V) -> Self {
        self.compare(field, Comparison::Gt, value)
    }

    /// Requires `field` to be greater than or equal to `value`.
    pub fn gte<K: Into<String>, V: Into<Bson>>(self, field: K, value: V) -> Self {
        self.compare(field, Comparison::Gte, value)
    }

    /// Requires `field` to be strictly less than `value`.
    pub fn lt<K: Into<String>, V: Into<Bson>>(self, field: K, value: V) -> Self {
        self.compare(field, Comparison::Lt, value)
    }

    /// Requires `field` to be less than or equal to `value`.
    pub fn lte<K: Into<String>, V: Into<Bson>>(self, field: K, value: V) -> Self {
        self.compare(field, Comparison::Lte, value)
    }

    /// Requires `field` to be equal to one of `values`.
    pub fn one_of<K, I>(self, field: K, values: I) -> Self
        where K: Into<String>,
              I: IntoIterator,
              I::Item: Into<Bson>,
    {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        self.compare(field, Comparison::In, values)
    }

    /// Returns `true` if the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying filter document.
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    /// Converts the filter into the raw document sent to the store.
    pub fn into_document(self) -> Document {
        self.0
    }
}

impl From<Filter> for Document {
    fn from(filter: Filter) -> Self {
        filter.into_document()
    }
}

impl From<Document> for Filter {
    fn from(doc: Document) -> Self {
        Filter(doc)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().is_empty());
        assert_eq!(Filter::new().into_document(), doc!{});
    }

    #[test]
    fn comparisons_on_one_field_are_merged() {
        let filter = Filter::new()
            .gte("published_year", 2010)
            .lt("published_year", 2020)
            .eq("genre", "Fiction");

        assert_eq!(filter.into_document(), doc!{
            "published_year": { "$gte": 2010, "$lt": 2020 },
            "genre": "Fiction",
        });
    }

    #[test]
    fn later_conditions_replace_earlier_ones() {
        let eq_then_gt = Filter::new()
            .eq("price", 10)
            .gt("price", 5);
        assert_eq!(eq_then_gt.into_document(), doc!{ "price": { "$gt": 5 } });

        let gt_then_eq = Filter::new()
            .gt("price", 5)
            .eq("price", 10);
        assert_eq!(gt_then_eq.into_document(), doc!{ "price": 10 });

        let same_op_twice = Filter::new()
            .gt("price", 5)
            .gt("price", 7);
        assert_eq!(same_op_twice.into_document(), doc!{ "price": { "$gt": 7 } });
    }

    #[test]
    fn embedded_document_equality_is_not_mistaken_for_operators() {
        let filter = Filter::new()
            .eq("dimensions", doc!{ "width": 10 })
            .gt("dimensions", doc!{ "width": 5 });

        assert_eq!(filter.into_document(), doc!{
            "dimensions": { "$gt": { "width": 5 } },
        });
    }

    #[test]
    fn membership_and_inequality() {
        let filter = Filter::new()
            .one_of("author", vec!["John Doe", "Jane Roe"])
            .ne("in_stock", false);

        assert_eq!(Document::from(filter), doc!{
            "author": { "$in": ["John Doe", "Jane Roe"] },
            "in_stock": { "$ne": false },
        });
    }
}
