//! The `Store` backed by the official MongoDB driver.

use bson::{ doc, Document };
use futures::stream::{ StreamExt, TryStreamExt };
use log::debug;
use mongodb::{ Client, Database, Collection, IndexModel };
use mongodb::options::{ ClientOptions, FindOptions, AggregateOptions };
use crate::{
    config::Config,
    literal::Verbosity,
    store::{ Store, DocumentStream, UpdateOutcome },
    error::{ Error, ErrorKind, Result, ResultExt },
};

/// Driver options for `config`. A server selection timeout given in the
/// connection string takes precedence over `config.connect_timeout`.
async fn client_options(config: &Config) -> Result<ClientOptions> {
    let mut options = ClientOptions::parse(&config.uri)
        .await
        .chain_as(ErrorKind::Connection, || format!("invalid connection string `{}`", config.uri))?;

    options.app_name = Some(String::from("folio"));

    if options.server_selection_timeout.is_none() {
        options.server_selection_timeout = config.connect_timeout;
    }

    Ok(options)
}

/// One client connection and the collection it operates on.
#[derive(Debug, Clone)]
pub struct MongoStore {
    /// The driver's connection pool.
    client: Client,
    /// The database holding the collection.
    database: Database,
    /// The collection every operation targets.
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connects to the configured server and verifies that it is reachable
    /// by pinging it. Every failure here is a `Connection` error.
    pub async fn connect(config: &Config) -> Result<Self> {
        let options = client_options(config).await?;
        let client = Client::with_options(options)
            .chain_as(ErrorKind::Connection, "can't create client")?;
        let database = client.database(&config.database);

        database
            .run_command(doc!{ "ping": 1 })
            .await
            .chain_as(ErrorKind::Connection, || format!("server at `{}` is unreachable", config.uri))?;

        debug!("ping to {} succeeded", config.uri);

        let collection = database.collection(&config.collection);

        Ok(MongoStore { client, database, collection })
    }
}

impl Store for MongoStore {
    fn namespace(&self) -> String {
        self.collection.namespace().to_string()
    }

    async fn find(&self, filter: Document, options: FindOptions) -> Result<DocumentStream> {
        let cursor = self.collection
            .find(filter)
            .with_options(options)
            .await?;

        Ok(cursor.map_err(Error::from).boxed())
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64> {
        if docs.is_empty() {
            return Ok(0);
        }

        let result = self.collection.insert_many(docs).await?;

        Ok(result.inserted_ids.len() as u64)
    }

    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateOutcome> {
        let result = self.collection.update_one(filter, update).await?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, filter: Document) -> Result<u64> {
        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count)
    }

    async fn aggregate(&self, stages: Vec<Document>, options: AggregateOptions) -> Result<DocumentStream> {
        let cursor = self.collection
            .aggregate(stages)
            .with_options(options)
            .await?;

        Ok(cursor.map_err(Error::from).boxed())
    }

    async fn create_index(&self, index: IndexModel) -> Result<String> {
        let result = self.collection.create_index(index).await?;
        Ok(result.index_name)
    }

    async fn explain(&self, filter: Document, verbosity: Verbosity) -> Result<Document> {
        let command = doc!{
            "explain": {
                "find": self.collection.name(),
                "filter": filter,
            },
            "verbosity": verbosity,
        };

        self.database.run_command(command).await.map_err(From::from)
    }

    async fn drop_collection(&self) -> Result<()> {
        self.collection.drop().await.map_err(From::from)
    }

    async fn shutdown(self) -> Result<()> {
        let MongoStore { client, database, collection } = self;

        drop(collection);
        drop(database);
        client.shutdown().await;

        Ok(())
    }
}
