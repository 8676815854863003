use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{read_json_file, write_json_file, Document, DocumentStore, RemoteError, RemoteResult};

type Collections = BTreeMap<String, Vec<Document>>;

/// Document store persisted as a single JSON file.
///
/// With a backing path, every call re-reads the file first so writes made by
/// other devices sharing the folder are seen. Without one, documents live in
/// memory only.
pub struct JsonDocumentStore {
    path: Option<PathBuf>,
    cache: Collections,
    available: bool,
}

impl JsonDocumentStore {
    pub fn open(path: &Path) -> Self {
        JsonDocumentStore {
            path: Some(path.to_path_buf()),
            cache: Collections::new(),
            available: true,
        }
    }

    pub fn in_memory() -> Self {
        JsonDocumentStore {
            path: None,
            cache: Collections::new(),
            available: true,
        }
    }

    /// Simulate losing the connection; every call fails while unavailable.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    fn snapshot(&self) -> RemoteResult<Collections> {
        if !self.available {
            return Err(RemoteError::Unavailable("offline".into()));
        }
        match &self.path {
            Some(path) => read_json_file(path),
            None => Ok(self.cache.clone()),
        }
    }

    fn commit(&mut self, collections: Collections) -> RemoteResult<()> {
        if let Some(path) = &self.path {
            write_json_file(path, &collections)?;
        }
        self.cache = collections;
        Ok(())
    }
}

impl DocumentStore for JsonDocumentStore {
    fn add(&mut self, collection: &str, data: serde_json::Value) -> RemoteResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut all = self.snapshot()?;
        all.entry(collection.to_string()).or_default().push(Document {
            id: id.clone(),
            data,
        });
        self.commit(all)?;
        Ok(id)
    }

    fn set(&mut self, collection: &str, id: &str, data: serde_json::Value) -> RemoteResult<()> {
        let mut all = self.snapshot()?;
        let docs = all.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.data = data,
            None => docs.push(Document {
                id: id.to_string(),
                data,
            }),
        }
        self.commit(all)
    }

    fn get(&self, collection: &str, id: &str) -> RemoteResult<Option<Document>> {
        let all = self.snapshot()?;
        Ok(all
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    fn get_all(&self, collection: &str) -> RemoteResult<Vec<Document>> {
        let mut all = self.snapshot()?;
        Ok(all.remove(collection).unwrap_or_default())
    }

    fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> RemoteResult<Vec<Document>> {
        Ok(self
            .get_all(collection)?
            .into_iter()
            .filter(|d| d.data.get(field) == Some(value))
            .collect())
    }

    fn delete_by_id(&mut self, collection: &str, id: &str) -> RemoteResult<()> {
        let mut all = self.snapshot()?;
        if let Some(docs) = all.get_mut(collection) {
            docs.retain(|d| d.id != id);
        }
        self.commit(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_get_and_order() {
        let mut store = JsonDocumentStore::in_memory();
        let a = store.add("expenses", json!({"n": 1})).unwrap();
        let b = store.add("expenses", json!({"n": 2})).unwrap();

        let all = store.get_all("expenses").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a);
        assert_eq!(all[1].id, b);
        assert_eq!(store.get("expenses", &b).unwrap().unwrap().data["n"], 2);
        assert!(store.get_all("users").unwrap().is_empty());
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut store = JsonDocumentStore::in_memory();
        store.set("users", "u1", json!({"username": "ana"})).unwrap();
        store.set("users", "u1", json!({"username": "ana2"})).unwrap();

        let all = store.get_all("users").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].data["username"], "ana2");
    }

    #[test]
    fn test_query_and_delete() {
        let mut store = JsonDocumentStore::in_memory();
        store.add("expenses", json!({"uid": "u1", "ts": 1})).unwrap();
        let target = store.add("expenses", json!({"uid": "u2", "ts": 2})).unwrap();
        store.add("expenses", json!({"uid": "u1", "ts": 3})).unwrap();

        let u1 = store.query_by_field("expenses", "uid", &json!("u1")).unwrap();
        assert_eq!(u1.len(), 2);

        store.delete_by_id("expenses", &target).unwrap();
        store.delete_by_id("expenses", "missing").unwrap();
        assert!(store
            .query_by_field("expenses", "uid", &json!("u2"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_unavailable_store_fails_every_call() {
        let mut store = JsonDocumentStore::in_memory();
        store.set_available(false);

        assert!(matches!(
            store.get_all("expenses"),
            Err(RemoteError::Unavailable(_))
        ));
        assert!(store.add("expenses", json!({})).is_err());
    }

    #[test]
    fn test_file_store_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documents.json");

        let mut writer = JsonDocumentStore::open(&path);
        let reader = JsonDocumentStore::open(&path);

        writer.add("expenses", json!({"uid": "u1"})).unwrap();
        assert_eq!(reader.get_all("expenses").unwrap().len(), 1);
    }
}
