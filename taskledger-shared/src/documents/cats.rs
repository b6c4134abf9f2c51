/// Cat records in the document store
///
/// Records are keyed by `name`, a natural key the collection does not
/// declare unique. Every lookup and mutation targets the first document
/// with a matching name; callers that insert duplicates get whichever one
/// the server finds first.
///
/// A missing record is never an error: lookups return `None`, mutations
/// return an [`UpdateOutcome`] or `false`.
///
/// # Document shape
///
/// ```json
/// { "_id": ObjectId, "name": "Tom", "age": 3, "features": ["fluffy"] }
/// ```
///
/// Only `name` is required when reading; see [`CatRecord`].
///
/// # Example
///
/// ```no_run
/// use taskledger_shared::documents::cats::CatCollection;
///
/// # async fn example(cats: CatCollection) -> Result<(), taskledger_shared::error::DataError> {
/// let outcome = cats.add_feature("Tom", "fluffy").await?;
/// if !outcome.matched {
///     println!("no cat named Tom");
/// }
/// # Ok(())
/// # }
/// ```
use crate::error::{DataError, DataResult};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::Collection;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

/// Field holding the natural key
pub const KEY_FIELD: &str = "name";

/// Set-valued tag field
pub const FEATURES_FIELD: &str = "features";

/// Integer attribute
pub const AGE_FIELD: &str = "age";

/// One cat document
///
/// Decoding follows what the collection actually holds rather than what
/// this crate writes. `age` keeps whatever BSON value is stored (or `None`
/// when absent), `features` accepts an array, a single string or nothing,
/// and unknown fields land in `extra` so they survive a read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatRecord {
    /// Assigned by the store on insert
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub name: String,

    /// Stored as written; see [`age_value`](Self::age_value)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<Bson>,

    /// Distinct tags
    #[serde(default, deserialize_with = "lenient_features")]
    pub features: Vec<String>,

    /// Fields this type does not model
    #[serde(flatten)]
    pub extra: Document,
}

impl CatRecord {
    /// A record not yet stored
    pub fn new(name: impl Into<String>, age: i32, features: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: None,
            name: name.into(),
            age: Some(Bson::Int32(age)),
            features: features.into_iter().map(Into::into).collect(),
            extra: Document::new(),
        }
    }

    /// Age as a whole number
    ///
    /// # Returns
    ///
    /// `None` when the field is missing, not numeric, or a fractional double.
    pub fn age_value(&self) -> Option<i64> {
        match self.age.as_ref()? {
            Bson::Int32(n) => Some(i64::from(*n)),
            Bson::Int64(n) => Some(*n),
            Bson::Double(d) if d.is_finite() && d.fract() == 0.0 => Some(*d as i64),
            _ => None,
        }
    }
}

fn lenient_features<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let features = match Option::<Bson>::deserialize(deserializer)? {
        None | Some(Bson::Null) => Vec::new(),
        Some(Bson::Array(items)) => items.into_iter().map(feature_text).collect(),
        Some(other) => vec![feature_text(other)],
    };
    Ok(features)
}

fn feature_text(value: Bson) -> String {
    match value {
        Bson::String(s) => s,
        other => other.to_string(),
    }
}

/// Result of a single-record update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// A record with the key exists
    pub matched: bool,

    /// The record changed (false when the value was already in place)
    pub modified: bool,
}

/// Typed handle on the cats collection
#[derive(Debug, Clone)]
pub struct CatCollection {
    collection: Collection<CatRecord>,
}

impl CatCollection {
    pub fn new(collection: Collection<CatRecord>) -> Self {
        Self { collection }
    }

    /// Name of the underlying collection
    pub fn name(&self) -> &str {
        self.collection.name()
    }

    /// Streams every record in store order
    ///
    /// Each call issues a fresh query, so the stream can be restarted by
    /// calling again.
    pub async fn find_all(&self) -> DataResult<BoxStream<'static, DataResult<CatRecord>>> {
        debug!(collection = %self.name(), "Querying all records");
        let cursor = self.collection.find(None, None).await?;
        Ok(cursor.map_err(DataError::from).boxed())
    }

    /// Collects [`find_all`](Self::find_all) into a vector
    pub async fn find_all_vec(&self) -> DataResult<Vec<CatRecord>> {
        self.find_all().await?.try_collect().await
    }

    /// Finds a record by name
    pub async fn find_one(&self, name: &str) -> DataResult<Option<CatRecord>> {
        Ok(self.collection.find_one(key_filter(name), None).await?)
    }

    /// Sets `field` to `value` on the record named `name`
    ///
    /// # Errors
    ///
    /// `ValidationError` for an empty or operator-like field name,
    /// `StoreError` for store faults.
    pub async fn update_field(&self, name: &str, field: &str, value: impl Into<Bson>) -> DataResult<UpdateOutcome> {
        let update = update_document("$set", field, value.into())?;
        self.update_one(name, update).await
    }

    /// Sets the age of the record named `name`
    pub async fn update_age(&self, name: &str, age: i32) -> DataResult<UpdateOutcome> {
        self.update_field(name, AGE_FIELD, age).await
    }

    /// Adds `value` to the set held in `field`, without duplicates
    ///
    /// # Errors
    ///
    /// Same as [`update_field`](Self::update_field).
    pub async fn append_to_set(&self, name: &str, field: &str, value: impl Into<Bson>) -> DataResult<UpdateOutcome> {
        let update = update_document("$addToSet", field, value.into())?;
        self.update_one(name, update).await
    }

    /// Adds a tag to the record's `features`
    pub async fn add_feature(&self, name: &str, feature: &str) -> DataResult<UpdateOutcome> {
        self.append_to_set(name, FEATURES_FIELD, feature).await
    }

    /// Deletes the record named `name`; `false` if there was none
    pub async fn delete_one(&self, name: &str) -> DataResult<bool> {
        let result = self.collection.delete_one(key_filter(name), None).await?;
        let deleted = result.deleted_count > 0;
        if deleted {
            info!(name = %name, "Record deleted");
        } else {
            info!(name = %name, "No record to delete");
        }
        Ok(deleted)
    }

    /// Deletes every record, returning how many were removed
    pub async fn delete_all(&self) -> DataResult<u64> {
        let result = self.collection.delete_many(doc! {}, None).await?;
        info!(collection = %self.name(), deleted = result.deleted_count, "Collection emptied");
        Ok(result.deleted_count)
    }

    /// Inserts one record, returning its id
    pub async fn insert_one(&self, record: &CatRecord) -> DataResult<Bson> {
        let result = self.collection.insert_one(record, None).await?;
        debug!(name = %record.name, id = %result.inserted_id, "Record inserted");
        Ok(result.inserted_id)
    }

    /// Inserts several records, returning their ids in input order
    pub async fn insert_many(&self, records: &[CatRecord]) -> DataResult<Vec<Bson>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let result = self.collection.insert_many(records, None).await?;
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);

        info!(count = ids.len(), "Records inserted");
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn update_one(&self, name: &str, update: Document) -> DataResult<UpdateOutcome> {
        let result = self.collection.update_one(key_filter(name), update, None).await?;
        let outcome = UpdateOutcome {
            matched: result.matched_count > 0,
            modified: result.modified_count > 0,
        };

        if !outcome.matched {
            info!(name = %name, "No record matched the update");
        } else if !outcome.modified {
            debug!(name = %name, "Record already up to date");
        }
        Ok(outcome)
    }
}

fn key_filter(name: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(KEY_FIELD, name);
    filter
}

/// Builds `{ <operator>: { <field>: <value> } }` for a caller-chosen field
fn update_document(operator: &str, field: &str, value: Bson) -> DataResult<Document> {
    if field.is_empty() || field.starts_with('$') {
        return Err(DataError::ValidationError(format!("Invalid field name: {:?}", field)));
    }

    let mut inner = Document::new();
    inner.insert(field, value);

    let mut update = Document::new();
    update.insert(operator, inner);
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    #[test]
    fn test_set_document() {
        let update = update_document("$set", AGE_FIELD, Bson::Int32(4)).unwrap();
        assert_eq!(update, doc! { "$set": { "age": 4 } });
    }

    #[test]
    fn test_add_to_set_document() {
        let update = update_document("$addToSet", FEATURES_FIELD, Bson::from("fluffy")).unwrap();
        assert_eq!(update, doc! { "$addToSet": { "features": "fluffy" } });
    }

    #[test]
    fn test_operator_field_rejected() {
        assert!(matches!(
            update_document("$set", "$where", Bson::Null),
            Err(DataError::ValidationError(_))
        ));
        assert!(matches!(
            update_document("$set", "", Bson::Null),
            Err(DataError::ValidationError(_))
        ));
    }

    #[test]
    fn test_new_record_serializes_without_id() {
        let record = CatRecord::new("Tom", 3, ["fluffy"]);
        let document = bson::to_document(&record).unwrap();
        assert_eq!(
            document,
            doc! { "name": "Tom", "age": 3, "features": ["fluffy"] }
        );
    }

    #[test]
    fn test_missing_features_default_empty() {
        let record: CatRecord = bson::from_document(doc! { "name": "Barsik", "age": 2 }).unwrap();
        assert!(record.features.is_empty());
        assert!(record.id.is_none());
    }

    #[test]
    fn test_whole_double_age_reads_as_integer() {
        let record: CatRecord = bson::from_document(doc! { "name": "Tom", "age": 3.0 }).unwrap();
        assert_eq!(record.age_value(), Some(3));

        let record: CatRecord = bson::from_document(doc! { "name": "Tom", "age": 2.5 }).unwrap();
        assert_eq!(record.age_value(), None);
        assert_eq!(record.age, Some(Bson::Double(2.5)));
    }

    #[test]
    fn test_missing_age_is_none() {
        let record: CatRecord = bson::from_document(doc! { "name": "B" }).unwrap();
        assert!(record.age.is_none());
        assert_eq!(record.age_value(), None);
        assert!(record.features.is_empty());
    }

    #[test]
    fn test_int64_and_text_ages_are_kept() {
        let record: CatRecord = bson::from_document(doc! { "name": "Old", "age": 5_000_000_000i64 }).unwrap();
        assert_eq!(record.age_value(), Some(5_000_000_000));

        let record: CatRecord = bson::from_document(doc! { "name": "Tom", "age": "seven" }).unwrap();
        assert_eq!(record.age, Some(Bson::String("seven".to_string())));
        assert_eq!(record.age_value(), None);
    }

    #[test]
    fn test_unknown_fields_are_preserved() {
        let id = ObjectId::new();
        let record: CatRecord = bson::from_document(doc! {
            "_id": id,
            "name": "Tom",
            "age": 3,
            "color": "grey",
            "owner": { "name": "Ann" },
        })
        .unwrap();

        assert_eq!(record.id, Some(id));
        assert_eq!(record.extra, doc! { "color": "grey", "owner": { "name": "Ann" } });

        let document = bson::to_document(&record).unwrap();
        assert_eq!(document.get_str("color").unwrap(), "grey");
        assert_eq!(document.get_i32("age").unwrap(), 3);
    }

    #[test]
    fn test_features_accept_mixed_shapes() {
        let record: CatRecord =
            bson::from_document(doc! { "name": "Tom", "features": ["fluffy", 7, null] }).unwrap();
        assert_eq!(record.features, vec!["fluffy", "7", "null"]);

        let record: CatRecord = bson::from_document(doc! { "name": "Tom", "features": "fluffy" }).unwrap();
        assert_eq!(record.features, vec!["fluffy"]);

        let record: CatRecord = bson::from_document(doc! { "name": "Tom", "features": null }).unwrap();
        assert!(record.features.is_empty());
    }

    #[test]
    fn test_key_filter() {
        assert_eq!(key_filter("Tom"), doc! { "name": "Tom" });
    }
}
