//! Index declarations.

use bson::{ Bson, Document };
use mongodb::IndexModel;
use mongodb::options::IndexOptions;
use crate::{
    literal::Order,
    error::{ Error, ErrorKind, Result },
};

/// An ordered mapping from field names to directions, declaring a durable
/// lookup structure maintained by the store.
/// ```
/// # use bson::doc;
/// # use folio::index::IndexSpec;
/// #
/// let spec = IndexSpec::new()
///     .ascending("author")
///     .descending("published_year");
///
/// assert_eq!(spec.keys(), doc!{ "author": 1, "published_year": -1 });
/// assert_eq!(spec.name(), "author_1_published_year_-1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    /// Indexed fields, most significant first.
    keys: Vec<(String, Order)>,
    /// Explicit name; derived from the keys when absent.
    name: Option<String>,
    /// Whether the index rejects duplicate keys.
    unique: bool,
}

impl IndexSpec {
    /// Creates an index declaration without any keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a single-field ascending index declaration.
    pub fn on<K: Into<String>>(field: K) -> Self {
        Self::new().ascending(field)
    }

    /// Adds a key. Adding a field again changes its direction only.
    pub fn key<K: Into<String>>(mut self, field: K, order: Order) -> Self {
        let field = field.into();

        match self.keys.iter_mut().find(|(existing, _)| *existing == field) {
            Some(key) => key.1 = order,
            None => self.keys.push((field, order)),
        }

        self
    }

    /// Adds an ascending key.
    pub fn ascending<K: Into<String>>(self, field: K) -> Self {
        self.key(field, Order::Ascending)
    }

    /// Adds a descending key.
    pub fn descending<K: Into<String>>(self, field: K) -> Self {
        self.key(field, Order::Descending)
    }

    /// Overrides the default name.
    pub fn named<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Makes the index reject documents with duplicate keys.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Returns whether duplicate keys are rejected.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// The key document, fields in order of significance.
    pub fn keys(&self) -> Document {
        self.keys
            .iter()
            .map(|(field, order)| (field.clone(), Bson::from(*order)))
            .collect()
    }

    /// The name of the index: either the explicit one, or the store's
    /// conventional `field_direction` pairs joined by underscores.
    pub fn name(&self) -> String {
        match self.name {
            Some(ref name) => name.clone(),
            None => self.keys
                .iter()
                .map(|(field, order)| format!("{}_{}", field, order.as_i32()))
                .collect::<Vec<_>>()
                .join("_"),
        }
    }

    /// Checks that the declaration names at least one non-empty field.
    pub fn validate(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(Error::new(ErrorKind::Index, "index must have at least one key"));
        }

        if self.keys.iter().any(|(field, _)| field.is_empty()) {
            return Err(Error::new(ErrorKind::Index, "index key has an empty field name"));
        }

        if let Some(ref name) = self.name {
            if name.is_empty() {
                return Err(Error::new(ErrorKind::Index, "index name is empty"));
            }
        }

        Ok(())
    }

    /// Validates the declaration and converts it into a driver index model.
    /// The name is always explicit, so that creating the same declaration
    /// twice resolves to the same index.
    pub fn to_model(&self) -> Result<IndexModel> {
        self.validate()?;

        let mut options = IndexOptions::default();
        options.name = Some(self.name());

        if self.unique {
            options.unique = Some(true);
        }

        Ok(IndexModel::builder().keys(self.keys()).options(options).build())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use crate::error::ErrorExt;
    use super::*;

    #[test]
    fn single_field_index() -> Result<()> {
        let spec = IndexSpec::on("title");
        let model = spec.to_model()?;

        assert_eq!(model.keys, doc!{ "title": 1 });
        assert_eq!(model.options.and_then(|o| o.name).as_deref(), Some("title_1"));

        Ok(())
    }

    #[test]
    fn compound_index_keeps_key_order() {
        let spec = IndexSpec::new()
            .descending("published_year")
            .ascending("author")
            .ascending("published_year");

        assert_eq!(spec.keys(), doc!{ "published_year": 1, "author": 1 });
        assert_eq!(spec.name(), "published_year_1_author_1");
    }

    #[test]
    fn explicit_name_and_uniqueness() -> Result<()> {
        let spec = IndexSpec::on("isbn").named("isbn_unique").unique();
        let options = spec.to_model()?.options.unwrap_or_default();

        assert!(spec.is_unique());
        assert_eq!(options.name.as_deref(), Some("isbn_unique"));
        assert_eq!(options.unique, Some(true));

        Ok(())
    }

    #[test]
    fn malformed_declarations_are_index_errors() {
        let empty = IndexSpec::new().to_model().unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::Index);

        let blank_field = IndexSpec::on("").validate().unwrap_err();
        assert_eq!(blank_field.kind(), ErrorKind::Index);

        let blank_name = IndexSpec::on("title").named("").validate().unwrap_err();
        assert_eq!(blank_name.kind(), ErrorKind::Index);
    }
}
