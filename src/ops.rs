//! High-level database operations: query, update, delete, aggregate.

use std::fmt::Debug;
use serde::de::DeserializeOwned;
use bson::{ Bson, Document };
use mongodb::options::{ FindOptions, AggregateOptions };
use crate::{
    filter::Filter,
    update::UpdateSpec,
    pipeline::{ Pipeline, validate_raw_stage },
    error::Result,
};

/// A read of many documents.
pub trait Query: Debug {
    /// The type of the results obtained by executing the query.
    type Output: DeserializeOwned;

    /// Filter for restricting returned values. Defaults to an empty filter,
    /// resulting in *all* documents of the collection being returned.
    fn filter(&self) -> Document {
        Default::default()
    }

    /// Optional transform applied to each returned raw document. Can be used
    /// to adjust the structure of the loosely-typed data so that it fits
    /// what is expected by `<Self::Output as Deserialize>::deserialize()`.
    ///
    /// The default implementation just returns its argument verbatim.
    fn transform(raw: Document) -> Result<Bson> {
        Ok(raw.into())
    }

    /// Projection, sort and pagination options for this query.
    fn options(&self) -> Result<FindOptions> {
        Ok(FindOptions::default())
    }
}

/// A single-document update (but not an upsert) operation.
pub trait Update: Debug {
    /// Filter selecting the document to update. Only the first match,
    /// in the store's natural order, is modified.
    fn filter(&self) -> Document;

    /// The update operators to apply to the matching document.
    fn update(&self) -> Document;
}

/// A single-document deletion operation.
pub trait Delete: Debug {
    /// Filter selecting the document to delete. Only the first match,
    /// in the store's natural order, is removed.
    fn filter(&self) -> Document;
}

/// An aggregation pipeline.
pub trait Aggregate: Debug {
    /// The type of the values obtained by running this pipeline.
    type Output: DeserializeOwned;

    /// The validated stages of the aggregation pipeline, in order.
    fn stages(&self) -> Result<Vec<Document>>;

    /// Optional transform applied to each returned raw document. Can be used
    /// to adjust the structure of the loosely-typed data so that it fits
    /// what is expected by `<Self::Output as Deserialize>::deserialize()`.
    ///
    /// The default implementation just returns its argument verbatim.
    fn transform(raw: Document) -> Result<Bson> {
        Ok(raw.into())
    }

    /// Options for this pipeline.
    fn options(&self) -> AggregateOptions {
        AggregateOptions::default()
    }
}

/////////////////////////////////////////////
// Blanket and convenience implementations //
/////////////////////////////////////////////

impl Query for Document {
    type Output = Document;

    fn filter(&self) -> Document {
        self.clone()
    }
}

impl Query for Filter {
    type Output = Document;

    fn filter(&self) -> Document {
        self.as_document().clone()
    }
}

impl Delete for Document {
    fn filter(&self) -> Document {
        self.clone()
    }
}

impl Delete for Filter {
    fn filter(&self) -> Document {
        self.as_document().clone()
    }
}

impl Update for (Document, Document) {
    fn filter(&self) -> Document {
        self.0.clone()
    }

    fn update(&self) -> Document {
        self.1.clone()
    }
}

impl Update for (Filter, UpdateSpec) {
    fn filter(&self) -> Document {
        self.0.as_document().clone()
    }

    fn update(&self) -> Document {
        self.1.clone().into_document()
    }
}

impl Aggregate for Vec<Document> {
    type Output = Document;

    fn stages(&self) -> Result<Vec<Document>> {
        for stage in self {
            validate_raw_stage(stage)?;
        }

        Ok(self.clone())
    }
}

impl Aggregate for Pipeline {
    type Output = Document;

    fn stages(&self) -> Result<Vec<Document>> {
        Pipeline::stages(self)
    }
}

impl<Q: Query> Query for &Q {
    type Output = Q::Output;

    fn filter(&self) -> Document {
        (**self).filter()
    }

    fn transform(raw: Document) -> Result<Bson> {
        Q::transform(raw)
    }

    fn options(&self) -> Result<FindOptions> {
        (**self).options()
    }
}

impl<U: Update> Update for &U {
    fn filter(&self) -> Document {
        (**self).filter()
    }

    fn update(&self) -> Document {
        (**self).update()
    }
}

impl<D: Delete> Delete for &D {
    fn filter(&self) -> Document {
        (**self).filter()
    }
}

impl<A: Aggregate> Aggregate for &A {
    type Output = A::Output;

    fn stages(&self) -> Result<Vec<Document>> {
        (**self).stages()
    }

    fn transform(raw: Document) -> Result<Bson> {
        A::transform(raw)
    }

    fn options(&self) -> AggregateOptions {
        (**self).options()
    }
}
