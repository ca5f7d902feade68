//! The Folio prelude provides re-exports of the most commonly used traits
//! and types for convenience, including ones from crate `bson`.

pub use crate::{
    gateway::QueryGateway,
    store::{ Store, UpdateOutcome },
    db::MongoStore,
    cursor::Cursor,
    ops::*,
    filter::{ Filter, Comparison },
    update::UpdateSpec,
    query::{ Find, Projection, Page },
    pipeline::{ Pipeline, Stage, Accumulator, average_by, most_frequent, count_by_decade },
    index::IndexSpec,
    literal::{ Order, Verbosity },
    config::Config,
    bsn::{ BsonExt, render_documents },
    error::{ ErrorExt, ResultExt },
    error::Error as FolioError,
    error::ErrorKind as FolioErrorKind,
    error::Result as FolioResult,
};
pub use bson::{ Bson, Document, oid::ObjectId, doc, bson };
