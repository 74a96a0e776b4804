use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use directory_upload::services::attachment_store::{
    AttachmentStore, PersistedAttachment, PersistedFile, ThumbnailVariant,
};
use directory_upload::services::blob_store::{BlobStoreClient, BlobStoreError, RemoteFile};
use directory_upload::services::entry_catalog::{
    Entry, EntryCatalog, FieldKind, InMemoryEntryCatalog,
};
use directory_upload::services::field_validator::UploadPolicy;
use directory_upload::services::staging::{
    StagedUpload, StagingError, StagingRegistry, UploadForm, UploadStagingService,
};
use directory_upload::utils::i18n::Locale;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

const KB: usize = 1024;

fn file(name: &str, size: usize) -> StagedUpload {
    StagedUpload::new(name, vec![b'x'; size])
}

fn setup_service() -> UploadStagingService {
    let catalog: InMemoryEntryCatalog = [
        Entry::new(
            42,
            "Attachments",
            FieldKind::StoredFile,
            UploadPolicy::unlimited()
                .with_max_files(2)
                .with_max_file_size(1024 * 1024),
        ),
        Entry::new(
            7,
            "Pictures",
            FieldKind::StoredFile,
            UploadPolicy::unlimited(),
        ),
        Entry::new(
            8,
            "Remote",
            FieldKind::ExternalReference,
            UploadPolicy::unlimited(),
        ),
        Entry::new(9, "Comment", FieldKind::Other, UploadPolicy::unlimited()),
    ]
    .into_iter()
    .collect();

    UploadStagingService::new(StagingRegistry::new(), Arc::new(catalog))
}

fn names(uploads: &[StagedUpload]) -> Vec<&str> {
    uploads.iter().map(|u| u.name()).collect()
}

/// Keeps committed bytes in memory, keyed by the attachment id.
#[derive(Default)]
struct MockAttachmentStore {
    files: Mutex<HashMap<i32, (PersistedAttachment, Bytes)>>,
}

impl MockAttachmentStore {
    fn with_file(self, id: i32, entry_id: i32, title: &str, content: &[u8], thumbnail: ThumbnailVariant) -> Self {
        let attachment = PersistedAttachment {
            id,
            record_id: 1,
            entry_id,
            field_kind: FieldKind::StoredFile,
            value: None,
            file: Some(PersistedFile {
                id,
                title: title.to_string(),
                size: content.len() as i64,
                mime_type: None,
            }),
            thumbnail,
        };
        self.files
            .lock()
            .unwrap()
            .insert(id, (attachment, Bytes::copy_from_slice(content)));
        self
    }

    fn attachments(&self) -> Vec<PersistedAttachment> {
        let mut list: Vec<_> = self
            .files
            .lock()
            .unwrap()
            .values()
            .map(|(a, _)| a.clone())
            .collect();
        list.sort_by_key(|a| a.id);
        list
    }
}

#[async_trait]
impl AttachmentStore for MockAttachmentStore {
    async fn store(
        &self,
        record_id: i32,
        entry: &Entry,
        upload: &StagedUpload,
    ) -> anyhow::Result<PersistedAttachment> {
        let mut files = self.files.lock().unwrap();
        let id = files.len() as i32 + 1;
        let attachment = PersistedAttachment {
            id,
            record_id,
            entry_id: entry.id,
            field_kind: entry.kind,
            value: None,
            file: Some(PersistedFile {
                id,
                title: upload.name().to_string(),
                size: upload.size() as i64,
                mime_type: Some(upload.content_type().to_string()),
            }),
            thumbnail: ThumbnailVariant::None,
        };
        files.insert(id, (attachment.clone(), upload.content().clone()));
        Ok(attachment)
    }

    async fn fetch_bytes(&self, attachment: &PersistedAttachment) -> anyhow::Result<Bytes> {
        self.files
            .lock()
            .unwrap()
            .get(&attachment.id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| anyhow!("Attachment not found: {}", attachment.id))
    }

    async fn list_for_record(&self, record_id: i32) -> anyhow::Result<Vec<PersistedAttachment>> {
        Ok(self
            .attachments()
            .into_iter()
            .filter(|a| a.record_id == record_id)
            .collect())
    }

    async fn remove(&self, attachment: &PersistedAttachment) -> anyhow::Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(&attachment.id)
            .map(|_| ())
            .ok_or_else(|| anyhow!("Attachment not found: {}", attachment.id))
    }
}

struct StaticBlobStore;

#[async_trait]
impl BlobStoreClient for StaticBlobStore {
    async fn upload(&self, upload: &StagedUpload) -> Result<String, BlobStoreError> {
        Ok(format!("https://blobs.example.com/{}", upload.name()))
    }

    async fn delete(&self, _url: &str) -> Result<(), BlobStoreError> {
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<RemoteFile, BlobStoreError> {
        if url.contains("missing") {
            return Err(BlobStoreError::Status(404));
        }
        Ok(RemoteFile {
            name: "remote.pdf".to_string(),
            content: Bytes::from_static(b"%PDF-1.4 remote"),
        })
    }
}

fn external(id: i32, entry_id: i32, url: &str) -> PersistedAttachment {
    PersistedAttachment {
        id,
        record_id: 1,
        entry_id,
        field_kind: FieldKind::ExternalReference,
        value: Some(url.to_string()),
        file: None,
        thumbnail: ThumbnailVariant::None,
    }
}

#[tokio::test]
async fn test_staging_respects_field_limits() {
    let service = setup_service();
    let (a, b, c) = (file("a.txt", 500 * KB), file("b.txt", 500 * KB), file("c.txt", 500 * KB));

    let admitted = service
        .stage_uploads("s1", "entry_42", vec![a.clone()], Locale::En)
        .await
        .unwrap();
    assert_eq!(admitted, 1);
    assert_eq!(service.staged_uploads("s1", "entry_42").await, vec![a.clone()]);

    service
        .stage_uploads("s1", "entry_42", vec![b.clone()], Locale::En)
        .await
        .unwrap();
    assert_eq!(
        service.staged_uploads("s1", "entry_42").await,
        vec![a.clone(), b.clone()]
    );

    let err = service
        .stage_uploads("s1", "entry_42", vec![c], Locale::En)
        .await
        .unwrap_err();
    match err {
        StagingError::Validation(e) => assert!(e.message.contains("more than 2")),
        other => panic!("Expected a validation error, got {:?}", other),
    }
    assert_eq!(service.staged_uploads("s1", "entry_42").await, vec![a, b]);
}

#[tokio::test]
async fn test_rejected_batch_is_not_partially_admitted() {
    let service = setup_service();

    let err = service
        .stage_uploads(
            "s1",
            "entry_42",
            vec![file("small.txt", KB), file("huge.txt", 2 * 1024 * KB)],
            Locale::Fr,
        )
        .await
        .unwrap_err();

    match err {
        StagingError::Validation(e) => assert!(e.message.contains("huge.txt")),
        other => panic!("Expected a validation error, got {:?}", other),
    }
    assert!(service.staged_uploads("s1", "entry_42").await.is_empty());
}

#[tokio::test]
async fn test_empty_and_unknown_uploads() {
    let service = setup_service();

    assert!(matches!(
        service.stage_uploads("s1", "entry_42", vec![], Locale::En).await,
        Err(StagingError::EmptyUpload)
    ));
    assert!(matches!(
        service
            .stage_uploads("s1", "entry_404", vec![file("a.txt", 10)], Locale::En)
            .await,
        Err(StagingError::UnknownField(_))
    ));
    assert!(matches!(
        service
            .stage_uploads("s1", "title", vec![file("a.txt", 10)], Locale::En)
            .await,
        Err(StagingError::UnknownField(_))
    ));
}

#[tokio::test]
async fn test_remove_staged_shifts_items() {
    let service = setup_service();
    service
        .stage_uploads(
            "s1",
            "entry_42",
            vec![file("a.txt", 10), file("b.txt", 20)],
            Locale::En,
        )
        .await
        .unwrap();

    assert!(!service.remove_staged("s1", "entry_42", 5).await);
    assert_eq!(names(&service.staged_uploads("s1", "entry_42").await), vec!["a.txt", "b.txt"]);

    assert!(service.remove_staged("s1", "entry_42", 0).await);
    assert_eq!(names(&service.staged_uploads("s1", "entry_42").await), vec!["b.txt"]);

    // Unknown sessions and fields are ignored
    assert!(!service.remove_staged("nope", "entry_42", 0).await);
    assert!(!service.remove_staged("s1", "entry_7", 0).await);
}

#[tokio::test]
async fn test_discard_then_ensure_gives_fresh_area() {
    let service = setup_service();
    service
        .stage_uploads("s1", "entry_7", vec![file("a.txt", 10)], Locale::En)
        .await
        .unwrap();

    service.ensure_session("s1", "entry_7");
    assert_eq!(service.staged_uploads("s1", "entry_7").await.len(), 1);

    assert!(service.discard_session("s1"));
    assert!(!service.discard_session("s1"));

    service.ensure_session("s1", "entry_7");
    assert!(service.staged_uploads("s1", "entry_7").await.is_empty());
}

#[tokio::test]
async fn test_process_outcomes() {
    let service = setup_service();

    let outcome = service
        .process(Some("s1"), Some("entry_42"), vec![file("a.txt", 10)], Locale::En)
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.items.len(), 1);
    assert_eq!(outcome.items[0].name, "a.txt");

    let outcome = service
        .process(
            Some("s1"),
            Some("entry_42"),
            vec![file("b.txt", 10), file("c.txt", 10)],
            Locale::En,
        )
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.unwrap().contains("more than 2"));
    assert_eq!(service.staged_items("s1", "entry_42").await.len(), 1);

    let outcome = service
        .process(None, Some("entry_42"), vec![file("a.txt", 10)], Locale::Fr)
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.unwrap().contains("session"));

    let outcome = service
        .process(Some("s1"), Some("entry_404"), vec![file("a.txt", 10)], Locale::En)
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.is_none());

    let outcome = service
        .process(Some("s1"), Some("entry_9"), vec![file("a.txt", 10)], Locale::En)
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.is_some());

    assert!(matches!(
        service.process(Some("s1"), Some("entry_42"), vec![], Locale::En).await,
        Err(StagingError::EmptyUpload)
    ));
    assert!(matches!(
        service
            .process(Some("s1"), None, vec![file("a.txt", 10)], Locale::En)
            .await,
        Err(StagingError::MissingField)
    ));
}

#[tokio::test]
async fn test_form_actions() {
    let service = setup_service();

    let form = UploadForm {
        params: vec!["title".to_string(), "_directory_upload_submit_entry_7".to_string()],
        files: vec![
            ("entry_7".to_string(), file("a.txt", 10)),
            ("entry_7".to_string(), file("b.txt", 10)),
            ("entry_7".to_string(), file("c.txt", 10)),
            ("entry_42".to_string(), file("other.txt", 10)),
        ],
    };
    let field = service
        .do_upload_action("s1", &form, Locale::En)
        .await
        .unwrap();
    assert_eq!(field.as_deref(), Some("entry_7"));
    assert_eq!(
        names(&service.staged_uploads("s1", "entry_7").await),
        vec!["a.txt", "b.txt", "c.txt"]
    );
    assert!(service.staged_uploads("s1", "entry_42").await.is_empty());

    let form = UploadForm {
        params: vec![
            "_directory_upload_delete_entry_7".to_string(),
            "_directory_upload_checkbox_entry_7_0".to_string(),
            "_directory_upload_checkbox_entry_7_2".to_string(),
        ],
        files: vec![],
    };
    service
        .do_upload_action("s1", &form, Locale::En)
        .await
        .unwrap();
    assert_eq!(names(&service.staged_uploads("s1", "entry_7").await), vec!["b.txt"]);

    let form = UploadForm {
        params: vec!["title".to_string()],
        files: vec![],
    };
    assert_eq!(
        service.do_upload_action("s1", &form, Locale::En).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn test_form_submit_surfaces_validation_errors() {
    let service = setup_service();
    let form = UploadForm {
        params: vec!["_directory_upload_submit_entry_42".to_string()],
        files: vec![
            ("entry_42".to_string(), file("a.txt", 10)),
            ("entry_42".to_string(), file("b.txt", 10)),
            ("entry_42".to_string(), file("c.txt", 10)),
        ],
    };

    assert!(matches!(
        service.do_upload_action("s1", &form, Locale::En).await,
        Err(StagingError::Validation(_))
    ));
    assert!(service.staged_uploads("s1", "entry_42").await.is_empty());
}

#[tokio::test]
async fn test_commit_preserves_order_and_staging() {
    let service = setup_service();
    let store = MockAttachmentStore::default();
    service
        .stage_uploads(
            "s1",
            "entry_7",
            vec![file("first.txt", 3), file("second.txt", 5)],
            Locale::En,
        )
        .await
        .unwrap();

    let persisted = service
        .commit_field("s1", "entry_7", 11, &store)
        .await
        .unwrap();

    let titles: Vec<_> = persisted
        .iter()
        .map(|a| a.file.as_ref().unwrap().title.as_str())
        .collect();
    assert_eq!(titles, vec!["first.txt", "second.txt"]);
    assert!(persisted.iter().all(|a| a.record_id == 11 && a.entry_id == 7));
    assert_eq!(persisted[1].file.as_ref().unwrap().size, 5);

    // Committing leaves the staging area untouched
    assert_eq!(service.staged_uploads("s1", "entry_7").await.len(), 2);
}

#[tokio::test]
async fn test_rehydrate_skips_thumbnails() {
    let service = setup_service();
    let store = MockAttachmentStore::default()
        .with_file(1, 7, "photo.jpg", b"original bytes", ThumbnailVariant::None)
        .with_file(2, 7, "photo_small.jpg", b"thumb", ThumbnailVariant::Little)
        .with_file(3, 7, "photo_big.jpg", b"big thumb", ThumbnailVariant::Big);

    let restaged = service
        .rehydrate("s2", &store.attachments(), &store, None)
        .await
        .unwrap();

    assert_eq!(restaged, 1);
    let staged = service.staged_uploads("s2", "entry_7").await;
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].name(), "photo.jpg");
    assert_eq!(staged[0].size(), b"original bytes".len() as u64);
}

#[tokio::test]
async fn test_rehydrate_replaces_session_and_survives_fetch_errors() {
    let service = setup_service();
    let store = MockAttachmentStore::default()
        .with_file(1, 7, "photo.jpg", b"original bytes", ThumbnailVariant::None);

    service
        .stage_uploads("s3", "entry_42", vec![file("stale.txt", 10)], Locale::En)
        .await
        .unwrap();

    let mut persisted = store.attachments();
    persisted.push(external(10, 8, "https://blobs.example.com/missing.pdf"));
    persisted.push(external(11, 8, "https://blobs.example.com/report.pdf"));

    let restaged = service
        .rehydrate("s3", &persisted, &store, Some(&StaticBlobStore as &dyn BlobStoreClient))
        .await
        .unwrap();

    assert_eq!(restaged, 2);
    assert!(service.staged_uploads("s3", "entry_42").await.is_empty());
    assert_eq!(service.staged_uploads("s3", "entry_7").await.len(), 1);
    assert_eq!(names(&service.staged_uploads("s3", "entry_8").await), vec!["remote.pdf"]);
}

#[tokio::test]
async fn test_rehydrate_skips_unreadable_attachment() {
    let service = setup_service();
    let store = MockAttachmentStore::default()
        .with_file(1, 7, "first.jpg", b"first", ThumbnailVariant::None)
        .with_file(3, 7, "third.jpg", b"third", ThumbnailVariant::None);

    service
        .stage_uploads("s9", "entry_42", vec![file("kept.txt", 10)], Locale::En)
        .await
        .unwrap();

    // Listed by the record but its bytes are gone from the store
    let mut lost = store.attachments()[0].clone();
    lost.id = 2;
    lost.file.as_mut().unwrap().title = "second.jpg".to_string();

    let mut persisted = store.attachments();
    persisted.insert(1, lost);

    let restaged = service
        .rehydrate("s9", &persisted, &store, None)
        .await
        .unwrap();

    assert_eq!(restaged, 2);
    assert_eq!(
        names(&service.staged_uploads("s9", "entry_7").await),
        vec!["first.jpg", "third.jpg"]
    );
    assert!(service.staged_uploads("s9", "entry_42").await.is_empty());
}

#[tokio::test]
async fn test_rehydrate_without_blob_store_skips_references() {
    let service = setup_service();
    let store = MockAttachmentStore::default();

    let restaged = service
        .rehydrate(
            "s4",
            &[external(1, 8, "https://blobs.example.com/report.pdf")],
            &store,
            None,
        )
        .await
        .unwrap();

    assert_eq!(restaged, 0);
    assert!(service.staged_uploads("s4", "entry_8").await.is_empty());
}

#[tokio::test]
async fn test_concurrent_double_submit_keeps_limit() {
    let service = Arc::new(setup_service());
    let mut handles = Vec::new();

    for i in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .stage_uploads(
                    "s5",
                    "entry_42",
                    vec![file(&format!("f{}.txt", i), 10)],
                    Locale::En,
                )
                .await
                .is_ok()
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 2);
    assert_eq!(service.staged_uploads("s5", "entry_42").await.len(), 2);
    assert_eq!(service.registry().len(), 1);
}

/// Holds the first lookup until released, so a discard can run while a
/// stage is between resolving its entry and touching the staging area.
struct GatedCatalog {
    inner: InMemoryEntryCatalog,
    gate: tokio::sync::Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
}

#[async_trait]
impl EntryCatalog for GatedCatalog {
    async fn find_entry(&self, entry_id: i32) -> anyhow::Result<Option<Entry>> {
        let gate = self.gate.lock().await.take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.await;
        }
        self.inner.find_entry(entry_id).await
    }
}

#[tokio::test]
async fn test_stage_after_concurrent_discard_is_not_lost() {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    let inner: InMemoryEntryCatalog = [Entry::new(
        42,
        "Attachments",
        FieldKind::StoredFile,
        UploadPolicy::unlimited(),
    )]
    .into_iter()
    .collect();
    let catalog = GatedCatalog {
        inner,
        gate: tokio::sync::Mutex::new(Some((entered_tx, release_rx))),
    };
    let service = Arc::new(UploadStagingService::new(
        StagingRegistry::new(),
        Arc::new(catalog),
    ));
    service.ensure_session("s1", "entry_42");

    let staging = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .stage_uploads("s1", "entry_42", vec![file("late.txt", 10)], Locale::En)
                .await
        })
    };

    entered_rx.await.unwrap();
    assert!(service.discard_session("s1"));
    release_tx.send(()).unwrap();

    assert_eq!(staging.await.unwrap().unwrap(), 1);
    assert_eq!(
        names(&service.staged_uploads("s1", "entry_42").await),
        vec!["late.txt"]
    );
}
