//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the store backend, the blob backend, and the parsed config.
//! There is no per-user state here: sessions are resolved per request.

use std::sync::Arc;

use crate::blob::BlobStore;
use crate::config::AppConfig;
use crate::store::Store;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>, config: AppConfig) -> Self {
        Self { store, blobs, config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use uuid::Uuid;

    use super::*;
    use crate::blob::BlobError;
    use crate::services::auth::{self, SignedIn};
    use crate::services::category::Category;
    use crate::store::{MemoryStore, NewReport, ReportStore};

    /// Blob fake that records uploads and returns predictable URLs.
    #[derive(Default)]
    pub struct RecordingBlobStore {
        pub uploads: Mutex<Vec<(String, Vec<u8>, String)>>,
        pub fail: AtomicBool,
    }

    impl RecordingBlobStore {
        pub fn upload_count(&self) -> usize {
            self.uploads.lock().expect("uploads mutex should lock").len()
        }
    }

    #[async_trait::async_trait]
    impl BlobStore for RecordingBlobStore {
        async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BlobError::Http("503 Service Unavailable".into()));
            }
            self.uploads
                .lock()
                .expect("uploads mutex should lock")
                .push((path.to_owned(), bytes, content_type.to_owned()));
            Ok(format!("https://blobs.test/{path}"))
        }
    }

    /// State wired to in-memory fakes, with handles to inspect them.
    pub struct TestApp {
        pub state: AppState,
        pub store: Arc<MemoryStore>,
        pub blobs: Arc<RecordingBlobStore>,
    }

    #[must_use]
    pub fn test_config() -> AppConfig {
        AppConfig::from_lookup(|_| None).expect("default config should parse")
    }

    #[must_use]
    pub fn test_app() -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(RecordingBlobStore::default());
        let state = AppState::new(store.clone(), blobs.clone(), test_config());
        TestApp { state, store, blobs }
    }

    /// Register a user and return its session and token.
    pub async fn seed_user(store: &MemoryStore, email: &str) -> SignedIn {
        auth::sign_up(store, email, "password1", time::Duration::hours(1))
            .await
            .expect("seed user should register")
    }

    /// Insert a report directly, bypassing validation.
    pub async fn seed_report(store: &MemoryStore, user_id: Uuid, title: &str, category: Category) -> Uuid {
        store
            .insert_report(NewReport {
                user_id,
                title: title.to_owned(),
                description: format!("{title} description"),
                category,
                location: "Main St & 3rd".into(),
                image_url: None,
            })
            .await
            .expect("seed report should insert")
            .id
    }
}
