//! Update specifications: partial mutations applied to a matched document.

use bson::{ Bson, Document };
use crate::bsn::is_operator_doc;
use crate::error::{ Error, ErrorKind, Result };

/// A partial mutation made of update operators.
/// ```
/// # use bson::doc;
/// # use folio::update::UpdateSpec;
/// #
/// let change = UpdateSpec::new()
///     .set("price", 19.99)
///     .inc("copies_sold", 1);
///
/// assert_eq!(change.into_document(), doc!{
///     "$set": { "price": 19.99 },
///     "$inc": { "copies_sold": 1 },
/// });
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSpec(Document);

impl UpdateSpec {
    /// Creates an empty update specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` to `value`.
    pub fn set<K: Into<String>, V: Into<Bson>>(self, field: K, value: V) -> Self {
        self.with_operator("$set", field.into(), value.into())
    }

    /// Increments the numeric `field` by `amount`.
    pub fn inc<K: Into<String>, V: Into<Bson>>(self, field: K, amount: V) -> Self {
        self.with_operator("$inc", field.into(), amount.into())
    }

    /// Removes `field` from the document.
    pub fn unset<K: Into<String>>(self, field: K) -> Self {
        self.with_operator("$unset", field.into(), Bson::String(String::new()))
    }

    /// Adds `field: value` under the given operator.
    fn with_operator(mut self, operator: &str, field: String, value: Bson) -> Self {
        if let Some(Bson::Document(fields)) = self.0.get_mut(operator) {
            fields.insert(field, value);
            return self;
        }

        let mut fields = Document::new();
        fields.insert(field, value);
        self.0.insert(operator, fields);
        self
    }

    /// Returns `true` if the specification changes nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the specification into the raw update document.
    pub fn into_document(self) -> Document {
        self.0
    }
}

impl From<UpdateSpec> for Document {
    fn from(spec: UpdateSpec) -> Self {
        spec.into_document()
    }
}

/// Checks that a raw update document consists of update operators only.
/// Whole-document replacements are not updates and are rejected.
pub fn validate_update(update: &Document) -> Result<()> {
    if update.is_empty() {
        Err(Error::new(ErrorKind::Query, "update specification is empty"))
    } else if is_operator_doc(update) {
        Ok(())
    } else {
        let offending: Vec<&str> = update
            .keys()
            .filter(|key| !key.starts_with('$'))
            .map(String::as_str)
            .collect();

        Err(Error::new(
            ErrorKind::Query,
            format!("update must only contain operators, found field(s) {:?}", offending),
        ))
    }
}
