use crate::error::{AppError, AppResult};
use crate::logic::merge::SetInstruction;
use crate::model::{Document, ObjectId};
use crate::store::DocumentSession;

/// Document operations over one named collection, borrowing a request's session.
pub struct Collection<'s, S: DocumentSession> {
    session: &'s mut S,
    name: &'s str,
}

impl<'s, S: DocumentSession> Collection<'s, S> {
    pub fn new(session: &'s mut S, name: &'s str) -> Self {
        Self { session, name }
    }

    pub async fn read_all(&mut self, sort_field: Option<&str>) -> AppResult<Vec<Document>> {
        log::debug!("reading all documents from {}", self.name);
        self.session.find(self.name, sort_field).await
    }

    pub async fn read_by_id(&mut self, id: &ObjectId) -> AppResult<Document> {
        self.session
            .find_one(self.name, id)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    /// Insert under a fresh identifier and return the document as re-read from the store.
    pub async fn insert(&mut self, fields: Document) -> AppResult<Document> {
        let id = ObjectId::new();
        self.session.insert_one(self.name, &id, fields).await?;
        log::info!("inserted {} into {}", id, self.name);

        match self.session.find_one(self.name, &id).await {
            Ok(Some(doc)) => Ok(doc),
            Ok(None) => Err(AppError::StoreUnavailable(format!(
                "inserted {} into {} but it could not be read back",
                id, self.name
            ))),
            Err(e) => Err(AppError::StoreUnavailable(format!(
                "inserted {} into {} but re-reading it failed: {}",
                id, self.name, e
            ))),
        }
    }

    /// Apply a partial update and return the document as it was *before* the update.
    ///
    /// An empty instruction is never sent to the store; the current document is
    /// returned unchanged.
    pub async fn update_merge(&mut self, id: &ObjectId, set: &SetInstruction) -> AppResult<Document> {
        if set.is_empty() {
            log::debug!("empty merge for {} in {}, reading only", id, self.name);
            return self.read_by_id(id).await;
        }

        let prior = self
            .session
            .find_one_and_update(self.name, id, set)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        log::info!("updated {} field(s) of {} in {}", set.len(), id, self.name);
        Ok(prior)
    }

    /// Delete a document and return its last stored state.
    pub async fn delete_and_return(&mut self, id: &ObjectId) -> AppResult<Document> {
        let prior = self
            .session
            .find_one_and_delete(self.name, id)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        log::info!("deleted {} from {}", id, self.name);
        Ok(prior)
    }

    pub async fn count(&mut self) -> AppResult<u64> {
        self.session.count(self.name).await
    }

    fn not_found(&self, id: &ObjectId) -> AppError {
        AppError::NotFound(format!("no document {} in {}", id, self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::merge::{FieldValue, MergePatch};
    use crate::model::{FormFields, QuestionPatch};
    use crate::store::{Connector, MemoryStore};
    use serde_json::json;

    async fn seeded() -> (MemoryStore, ObjectId) {
        let store = MemoryStore::new();
        let mut session = store.open_session().await.unwrap();
        let doc = Document::from_record(&json!({
            "questionString": "Allergies?",
            "description": "",
            "pin": false,
            "appointmentIDs": []
        }))
        .unwrap();
        let inserted = Collection::new(&mut session, "questions")
            .insert(doc)
            .await
            .unwrap();
        session.close().await.unwrap();
        (store, inserted.id().unwrap())
    }

    #[tokio::test]
    async fn test_insert_returns_fresh_id_and_fields() {
        let (store, id) = seeded().await;
        let mut session = store.open_session().await.unwrap();
        let doc = Collection::new(&mut session, "questions")
            .read_by_id(&id)
            .await
            .unwrap();
        assert_eq!(doc.id(), Some(id));
        assert_eq!(doc.get("questionString"), Some(&json!("Allergies?")));
        assert_eq!(doc.get("description"), Some(&json!("")));
        assert_eq!(doc.get("pin"), Some(&json!(false)));
        assert_eq!(doc.get("appointmentIDs"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_update_returns_prior_state() {
        let (store, id) = seeded().await;
        let mut session = store.open_session().await.unwrap();
        let mut questions = Collection::new(&mut session, "questions");

        let form = FormFields::from_pairs(vec![("pin".to_string(), "true".to_string())]);
        let set = QuestionPatch::from_form(&form).unwrap().into_instruction();
        let prior = questions.update_merge(&id, &set).await.unwrap();
        assert_eq!(prior.get("pin"), Some(&json!(false)));

        let now = questions.read_by_id(&id).await.unwrap();
        assert_eq!(now.get("pin"), Some(&json!(true)));
        assert_eq!(now.get("questionString"), Some(&json!("Allergies?")));
        assert_eq!(now.get("description"), Some(&json!("")));
    }

    #[tokio::test]
    async fn test_empty_update_is_a_read() {
        let (store, id) = seeded().await;
        let mut session = store.open_session().await.unwrap();
        let mut questions = Collection::new(&mut session, "questions");

        let before = questions.read_by_id(&id).await.unwrap();
        let returned = questions.update_merge(&id, &SetInstruction::new()).await.unwrap();
        assert_eq!(returned, before);
        assert_eq!(questions.read_by_id(&id).await.unwrap(), before);
        assert_eq!(store.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (store, _) = seeded().await;
        let mut session = store.open_session().await.unwrap();
        let mut set = SetInstruction::new();
        set.set_if("pin", Some(true), FieldValue::Flag);
        let err = Collection::new(&mut session, "questions")
            .update_merge(&ObjectId::new(), &set)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_leaves_count_unchanged() {
        let (store, id) = seeded().await;
        let mut session = store.open_session().await.unwrap();
        let mut questions = Collection::new(&mut session, "questions");

        assert_eq!(questions.count().await.unwrap(), 1);
        let err = questions.delete_and_return(&ObjectId::new()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(questions.count().await.unwrap(), 1);

        let deleted = questions.delete_and_return(&id).await.unwrap();
        assert_eq!(deleted.id(), Some(id));
        assert_eq!(questions.count().await.unwrap(), 0);
        assert!(matches!(
            questions.read_by_id(&id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_all_sorted() {
        let store = MemoryStore::new();
        let mut session = store.open_session().await.unwrap();
        let mut appointments = Collection::new(&mut session, "appointments");
        for date in ["2021-05-01T09:00:00Z", "1995-01-01T12:00:00+00:00", "2003-07-15T14:30:00Z"] {
            appointments
                .insert(Document::from_record(&json!({ "RC3339date": date })).unwrap())
                .await
                .unwrap();
        }

        let sorted = appointments.read_all(Some("RC3339date")).await.unwrap();
        let dates: Vec<_> = sorted
            .iter()
            .map(|d| d.get("RC3339date").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            dates,
            vec!["1995-01-01T12:00:00+00:00", "2003-07-15T14:30:00Z", "2021-05-01T09:00:00Z"]
        );
        assert_eq!(appointments.read_all(None).await.unwrap().len(), 3);
    }
}
