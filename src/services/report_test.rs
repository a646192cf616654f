use std::sync::atomic::Ordering;

use super::*;
use crate::services::vote;
use crate::state::test_helpers::{RecordingBlobStore, seed_report, seed_user};
use crate::store::MemoryStore;

const MAX_IMAGE: usize = 1024;

fn draft() -> ReportDraft {
    ReportDraft {
        title: "  Fallen oak  ".into(),
        description: "Blocking the bike lane".into(),
        category: "Fallen Tree".into(),
        location: "Elm Park north gate".into(),
    }
}

fn png(len: usize) -> ImageUpload {
    ImageUpload { filename: Some("Photo.PNG".into()), content_type: "image/png".into(), bytes: vec![7; len] }
}

// =============================================================================
// list / get
// =============================================================================

#[tokio::test]
async fn list_is_newest_first_and_filters_by_category() {
    let store = MemoryStore::new();
    let user = seed_user(&store, "a@example.com").await.session;
    let first = seed_report(&store, user.user_id, "one", Category::Traffic).await;
    let second = seed_report(&store, user.user_id, "two", Category::GarbageDumping).await;
    let third = seed_report(&store, user.user_id, "three", Category::Traffic).await;

    let all = list(&store, None, None).await.unwrap();
    let ids: Vec<Uuid> = all.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![third, second, first]);

    let traffic = list(&store, None, Some(Category::Traffic)).await.unwrap();
    let ids: Vec<Uuid> = traffic.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![third, first]);

    let none = list(&store, None, Some(Category::IllegalParking)).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn list_attaches_tally_and_session_vote() {
    let store = MemoryStore::new();
    let alice = seed_user(&store, "alice@example.com").await.session;
    let bob = seed_user(&store, "bob@example.com").await.session;
    let voted = seed_report(&store, alice.user_id, "voted", Category::Other).await;
    let untouched = seed_report(&store, alice.user_id, "untouched", Category::Other).await;

    vote::apply(&store, Some(&alice), voted, Polarity::Up).await.unwrap();
    vote::apply(&store, Some(&bob), voted, Polarity::Down).await.unwrap();

    let anonymous = list(&store, None, None).await.unwrap();
    assert!(anonymous.iter().all(|r| r.user_vote.is_none()));

    let for_bob = list(&store, Some(&bob), None).await.unwrap();
    let voted_view = for_bob.iter().find(|r| r.id == voted).unwrap();
    assert_eq!(voted_view.votes, Tally { up: 1, down: 1 });
    assert_eq!(voted_view.user_vote, Some(Polarity::Down));
    let untouched_view = for_bob.iter().find(|r| r.id == untouched).unwrap();
    assert_eq!(untouched_view.votes, Tally::default());
    assert_eq!(untouched_view.user_vote, None);
}

#[tokio::test]
async fn get_missing_report_is_not_found() {
    let store = MemoryStore::new();
    let err = get(&store, None, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn get_includes_session_vote() {
    let store = MemoryStore::new();
    let user = seed_user(&store, "a@example.com").await.session;
    let report = seed_report(&store, user.user_id, "lamp", Category::StreetLightIssue).await;
    vote::apply(&store, Some(&user), report, Polarity::Down).await.unwrap();

    let view = get(&store, Some(&user), report).await.unwrap();
    assert_eq!(view.user_vote, Some(Polarity::Down));
    assert_eq!(view.votes, Tally { up: 0, down: 1 });
    assert_eq!(get(&store, None, report).await.unwrap().user_vote, None);
}

#[tokio::test]
async fn view_serializes_category_label_and_rfc3339_time() {
    let store = MemoryStore::new();
    let user = seed_user(&store, "a@example.com").await.session;
    let report = seed_report(&store, user.user_id, "water", Category::WaterDrainage).await;

    let json = serde_json::to_value(get(&store, None, report).await.unwrap()).unwrap();
    assert_eq!(json["category"], "Water Drainage");
    assert_eq!(json["votes"], serde_json::json!({ "up": 0, "down": 0 }));
    assert!(json["user_vote"].is_null());
    let created = json["created_at"].as_str().unwrap();
    assert!(created.contains('T') && created.ends_with('Z'), "not rfc3339: {created}");
}

// =============================================================================
// create
// =============================================================================

#[tokio::test]
async fn create_persists_trimmed_fields_without_image() {
    let store = MemoryStore::new();
    let blobs = RecordingBlobStore::default();
    let user = seed_user(&store, "a@example.com").await.session;

    let view = create(&store, &blobs, Some(&user), draft(), None, MAX_IMAGE).await.unwrap();
    assert_eq!(view.title, "Fallen oak");
    assert_eq!(view.category, Category::FallenTree);
    assert_eq!(view.user_id, user.user_id);
    assert_eq!(view.image_url, None);
    assert_eq!(view.votes, Tally::default());
    assert_eq!(blobs.upload_count(), 0);

    let listed = list(&store, None, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, view.id);
}

#[tokio::test]
async fn create_uploads_image_under_public_prefix() {
    let store = MemoryStore::new();
    let blobs = RecordingBlobStore::default();
    let user = seed_user(&store, "a@example.com").await.session;

    let view = create(&store, &blobs, Some(&user), draft(), Some(png(16)), MAX_IMAGE).await.unwrap();

    let uploads = blobs.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    let (path, bytes, content_type) = &uploads[0];
    assert!(path.starts_with("public/"), "unexpected path {path}");
    assert!(path.ends_with(".png"), "unexpected path {path}");
    assert_eq!(bytes.len(), 16);
    assert_eq!(content_type, "image/png");
    assert_eq!(view.image_url.as_deref(), Some(format!("https://blobs.test/{path}").as_str()));
}

#[tokio::test]
async fn create_without_session_touches_nothing() {
    let store = MemoryStore::new();
    let blobs = RecordingBlobStore::default();
    let before = store.writes();

    let err = create(&store, &blobs, None, draft(), Some(png(16)), MAX_IMAGE).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unauthenticated));
    assert_eq!(store.writes(), before);
    assert_eq!(blobs.upload_count(), 0);
}

#[tokio::test]
async fn create_rejects_invalid_fields_before_upload() {
    let store = MemoryStore::new();
    let blobs = RecordingBlobStore::default();
    let user = seed_user(&store, "a@example.com").await.session;

    let cases = [
        ReportDraft { title: "   ".into(), ..draft() },
        ReportDraft { description: String::new(), ..draft() },
        ReportDraft { location: "\t".into(), ..draft() },
        ReportDraft { category: "Potholes".into(), ..draft() },
        ReportDraft { title: "x".repeat(MAX_TITLE_CHARS + 1), ..draft() },
    ];
    for case in cases {
        let err = create(&store, &blobs, Some(&user), case.clone(), Some(png(8)), MAX_IMAGE)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)), "expected validation error for {case:?}");
    }
    assert_eq!(blobs.upload_count(), 0);
    assert!(list(&store, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_rejects_unacceptable_images() {
    let store = MemoryStore::new();
    let blobs = RecordingBlobStore::default();
    let user = seed_user(&store, "a@example.com").await.session;

    let not_image = ImageUpload { filename: Some("notes.txt".into()), content_type: "text/plain".into(), bytes: vec![1; 4] };
    let too_big = png(MAX_IMAGE + 1);
    let empty = png(0);
    for image in [not_image, too_big, empty] {
        let err = create(&store, &blobs, Some(&user), draft(), Some(image), MAX_IMAGE).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
    assert_eq!(blobs.upload_count(), 0);
}

#[tokio::test]
async fn blob_failure_is_transient_and_no_row_is_written() {
    let store = MemoryStore::new();
    let blobs = RecordingBlobStore::default();
    blobs.fail.store(true, Ordering::SeqCst);
    let user = seed_user(&store, "a@example.com").await.session;

    let err = create(&store, &blobs, Some(&user), draft(), Some(png(8)), MAX_IMAGE).await.unwrap_err();
    assert!(matches!(err, ServiceError::TransientStoreFailure(_)));
    assert!(list(&store, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn insert_failure_after_upload_is_transient() {
    let store = MemoryStore::new();
    let blobs = RecordingBlobStore::default();
    let user = seed_user(&store, "a@example.com").await.session;
    store.set_unavailable(true);

    let err = create(&store, &blobs, Some(&user), draft(), Some(png(8)), MAX_IMAGE).await.unwrap_err();
    assert!(matches!(err, ServiceError::TransientStoreFailure(_)));
    assert_eq!(blobs.upload_count(), 1);
}

// =============================================================================
// image helpers
// =============================================================================

fn upload(filename: Option<&str>, content_type: &str) -> ImageUpload {
    ImageUpload { filename: filename.map(str::to_owned), content_type: content_type.into(), bytes: vec![1] }
}

#[test]
fn extension_prefers_allowed_filename_then_content_type() {
    assert_eq!(image_extension(&png(1)), Some("png"));
    assert_eq!(image_extension(&upload(Some("shot.JPEG"), "image/jpeg")), Some("jpeg"));
    assert_eq!(image_extension(&upload(None, "image/jpeg")), Some("jpg"));
    assert_eq!(image_extension(&upload(Some("../../etc/passwd"), "image/webp")), Some("webp"));
    assert_eq!(image_extension(&upload(Some("anim.gif"), "Image/GIF; charset=binary")), Some("gif"));
}

#[test]
fn markup_filename_is_stored_with_image_extension() {
    assert_eq!(image_extension(&upload(Some("evil.html"), "image/png")), Some("png"));
    assert_eq!(image_extension(&upload(Some("evil.svg"), "image/gif")), Some("gif"));
}

#[test]
fn scriptable_content_types_are_not_accepted() {
    for content_type in ["image/svg+xml", "text/html", "image/x-icon", ""] {
        assert_eq!(image_extension(&upload(Some("a.png"), content_type)), None, "{content_type:?}");
    }
}

#[tokio::test]
async fn create_stores_html_named_upload_as_image() {
    let store = MemoryStore::new();
    let blobs = RecordingBlobStore::default();
    let user = seed_user(&store, "a@example.com").await.session;
    let image = ImageUpload { filename: Some("evil.html".into()), content_type: "image/png".into(), bytes: vec![1; 8] };

    let view = create(&store, &blobs, Some(&user), draft(), Some(image), MAX_IMAGE).await.unwrap();
    assert!(view.image_url.unwrap().ends_with(".png"));
    let uploads = blobs.uploads.lock().unwrap();
    assert!(uploads[0].0.ends_with(".png"), "unexpected path {}", uploads[0].0);
}

#[tokio::test]
async fn create_rejects_svg_upload() {
    let store = MemoryStore::new();
    let blobs = RecordingBlobStore::default();
    let user = seed_user(&store, "a@example.com").await.session;
    let svg = ImageUpload {
        filename: Some("logo.svg".into()),
        content_type: "image/svg+xml".into(),
        bytes: b"<svg onload=alert(1)>".to_vec(),
    };

    let err = create(&store, &blobs, Some(&user), draft(), Some(svg), MAX_IMAGE).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(blobs.upload_count(), 0);
}

#[test]
fn blob_names_are_lowercase_base36() {
    let a = random_blob_name();
    let b = random_blob_name();
    assert_eq!(a.len(), 13);
    assert!(a.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    assert_ne!(a, b);
}
