//! MongoDB change stream source.

use crate::error::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::change_stream::ChangeStream;
use mongodb::{Client, Collection};
use serde_json::{Map, Value};

use super::source::{ChangeCursor, ChangeSource};

/// Watches one MongoDB collection.
pub struct MongoSource {
    collection: Collection<Document>,
}

impl MongoSource {
    /// Connect and verify the server answers a ping.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }).await?;

        tracing::info!(database, collection, "connected to mongodb");

        Ok(Self {
            collection: db.collection::<Document>(collection),
        })
    }
}

#[async_trait]
impl ChangeSource for MongoSource {
    async fn watch(&self) -> Result<Box<dyn ChangeCursor>> {
        let stream = self.collection.watch().with_type::<Document>().await?;
        Ok(Box::new(MongoCursor {
            stream: Some(stream),
        }))
    }
}

struct MongoCursor {
    stream: Option<ChangeStream<Document>>,
}

#[async_trait]
impl ChangeCursor for MongoCursor {
    async fn next(&mut self) -> Result<Option<Value>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match stream.next().await {
            Some(Ok(event)) => Ok(Some(document_to_json(event))),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the stream kills the server-side cursor.
        self.stream = None;
        Ok(())
    }
}

fn document_to_json(document: Document) -> Value {
    Value::Object(
        document
            .into_iter()
            .map(|(key, value)| (key, bson_to_json(value)))
            .collect::<Map<String, Value>>(),
    )
}

/// ObjectIds, dates, decimals and non-finite doubles become plain strings so
/// they project as readable text rather than extended-JSON wrappers.
fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Document(document) => document_to_json(document),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(text) => Value::String(text),
            Err(_) => Value::from(dt.timestamp_millis()),
        },
        Bson::Decimal128(decimal) => Value::String(decimal.to_string()),
        Bson::Double(n) if n.is_nan() => Value::String("NaN".to_string()),
        Bson::Double(n) if n.is_infinite() => {
            Value::String(if n > 0.0 { "+Inf" } else { "-Inf" }.to_string())
        }
        other => other.into_relaxed_extjson(),
    }
}
