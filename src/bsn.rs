//! BSON serialization and rendering helpers.

use std::borrow::Borrow;
use bson::{ Bson, Document };
use serde::Serialize;
use crate::error::{ Error, ErrorKind, Result, ResultExt };

/// Methods for dynamically type-checking BSON.
pub trait BsonExt: Sized {
    /// Ensures that the BSON value is a `Document` and unwraps it.
    fn try_into_doc(self) -> Result<Document>;

    /// Returns `true` if this value is a document whose keys are all
    /// operators, i.e. start with a `$` sign.
    fn is_operator_doc(&self) -> bool;
}

impl BsonExt for Bson {
    fn try_into_doc(self) -> Result<Document> {
        match self {
            Bson::Document(doc) => Ok(doc),
            value => Err(Error::new(
                ErrorKind::IllTypedDocumentField,
                format!("expected Document, got {:?}", value.element_type()),
            ))
        }
    }

    fn is_operator_doc(&self) -> bool {
        match *self {
            Bson::Document(ref doc) => is_operator_doc(doc),
            _ => false,
        }
    }
}

/// Returns `true` if the document is non-empty and every key in it is an
/// operator, i.e. starts with a `$` sign.
pub fn is_operator_doc(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|key| key.starts_with('$'))
}

/// Creates a BSON `Document` out of a serializable value.
pub fn serialize_document<T: Serialize>(value: &T) -> Result<Document> {
    bson::to_bson(value)
        .chain("can't serialize value to BSON")
        .and_then(BsonExt::try_into_doc)
}

/// Creates an array of `Document`s from an iterator over serializable values.
pub fn serialize_documents<T, I>(values: I) -> Result<Vec<Document>>
    where T: Serialize,
          I: IntoIterator,
          I::Item: Borrow<T>,
{
    values
        .into_iter()
        .map(|val| serialize_document(val.borrow()))
        .collect()
}

/// Renders documents as pretty-printed relaxed extended JSON, the way they
/// are shown on the console.
/// ```
/// # use bson::doc;
/// # use folio::bsn::render_documents;
/// #
/// let text = render_documents(vec![doc!{ "title": "Dune", "price": 9.5 }]).unwrap();
/// assert!(text.contains("\"title\": \"Dune\""));
/// ```
pub fn render_documents<I>(docs: I) -> Result<String>
    where I: IntoIterator<Item = Document>
{
    let values: Vec<_> = docs
        .into_iter()
        .map(|doc| Bson::Document(doc).into_relaxed_extjson())
        .collect();

    serde_json::to_string_pretty(&values).map_err(From::from)
}
