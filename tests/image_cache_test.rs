//! Integration tests for the image dedup cache.

mod common;

use chrono::Utc;
use common::{
    image_post, mount_image, mount_page, setup_db, test_config, thread_page, RecordingTransport,
    SentPhoto, TOPIC,
};
use forum_photo_courier::courier;
use forum_photo_courier::scrape::{ImageRef, ThreadScraper};
use forum_photo_courier::store::ImageCache;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_create_is_idempotent_first_handle_wins() {
    let (db, _guard) = setup_db().await;

    db.create("https://cdn.example/x.jpg", "handle-one", Utc::now())
        .await
        .expect("first create");
    db.create("https://cdn.example/x.jpg", "handle-two", Utc::now())
        .await
        .expect("second create is a no-op");

    let entry = db
        .lookup("https://cdn.example/x.jpg")
        .await
        .expect("lookup")
        .expect("entry exists");
    assert_eq!(entry.file_id, "handle-one");
}

#[tokio::test]
async fn test_concurrent_creates_both_succeed() {
    let (db, _guard) = setup_db().await;

    let (a, b) = tokio::join!(
        db.create("https://cdn.example/race.jpg", "handle-a", Utc::now()),
        db.create("https://cdn.example/race.jpg", "handle-b", Utc::now()),
    );
    a.expect("create a");
    b.expect("create b");

    let entry = db
        .lookup("https://cdn.example/race.jpg")
        .await
        .expect("lookup")
        .expect("exactly one entry persisted");
    assert!(entry.file_id == "handle-a" || entry.file_id == "handle-b");
}

#[tokio::test]
async fn test_lookup_misses_unknown_urls() {
    let (db, _guard) = setup_db().await;

    let entry = db.lookup("https://cdn.example/unknown.jpg").await.expect("lookup");
    assert!(entry.is_none());
}

/// The dedup guarantee end to end: once delivered, an image is never fetched
/// or uploaded again — the second window reuses the cached handles.
#[tokio::test]
async fn test_delivered_images_are_never_refetched() {
    let server = MockServer::start().await;
    let (db, guard) = setup_db().await;

    let posts = vec![
        image_post(1, "/uploads/p1.jpg"),
        image_post(2, "/uploads/p2.jpg"),
    ];
    mount_page(&server, &format!("/{TOPIC}"), &thread_page(TOPIC, 1, &posts)).await;
    mount_page(
        &server,
        &format!("/{TOPIC}/page-1"),
        &thread_page(TOPIC, 1, &posts),
    )
    .await;
    // Each image may be downloaded exactly once across both windows;
    // the expectation is verified when the mock server shuts down.
    for name in ["p1", "p2"] {
        Mock::given(method("GET"))
            .and(path(format!("/uploads/{name}.jpg")))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(b"jpegbytes".to_vec(), "image/jpeg"),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = test_config(&server.uri(), guard.path());
    let scraper = ThreadScraper::new(&config);
    let transport = RecordingTransport::new();

    let first = scraper.get_window(&db, TOPIC, 1, 0).await.expect("first window");
    courier::deliver_window(&transport, &db, 42, &first)
        .await
        .expect("delivery");

    let second = scraper.get_window(&db, TOPIC, 1, 0).await.expect("second window");

    // Identical windows, now served from the cache.
    let first_permalinks: Vec<_> = first.iter().map(|p| p.permalink.clone()).collect();
    let second_permalinks: Vec<_> = second.iter().map(|p| p.permalink.clone()).collect();
    assert_eq!(first_permalinks, second_permalinks);

    for post in &second {
        let ImageRef::Cached { file_id, .. } = &post.image else {
            panic!("second window should be fully cached");
        };
        assert!(file_id.starts_with("file-id-"), "handle minted by delivery");
    }

    // Re-delivery goes through send_cached, no upload.
    courier::deliver_window(&transport, &db, 42, &second)
        .await
        .expect("cached delivery");
    let sent = transport.sent();
    assert_eq!(sent.len(), 4);
    assert!(matches!(sent[0], SentPhoto::Uploaded { .. }));
    assert!(matches!(sent[2], SentPhoto::Cached { .. }));
}

/// Staging the same image twice in one scrape writes the file once and the
/// first delivery consumes it; the second delivery falls back to the cache.
#[tokio::test]
async fn test_repeat_delivery_of_a_staged_post_uses_the_cache() {
    let server = MockServer::start().await;
    let (db, guard) = setup_db().await;

    let posts = vec![image_post(1, "/uploads/p1.jpg")];
    mount_page(&server, &format!("/{TOPIC}"), &thread_page(TOPIC, 1, &posts)).await;
    mount_page(
        &server,
        &format!("/{TOPIC}/page-1"),
        &thread_page(TOPIC, 1, &posts),
    )
    .await;
    mount_image(&server, "/uploads/p1.jpg").await;

    let config = test_config(&server.uri(), guard.path());
    let scraper = ThreadScraper::new(&config);
    let transport = RecordingTransport::new();

    let window = scraper.get_window(&db, TOPIC, 1, 0).await.expect("window");
    assert_eq!(window.len(), 1);

    // Two subscribers receive the same staged post.
    courier::deliver_post(&transport, &db, 42, &window[0])
        .await
        .expect("first delivery");
    courier::deliver_post(&transport, &db, 43, &window[0])
        .await
        .expect("second delivery");

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(matches!(sent[0], SentPhoto::Uploaded { .. }));
    assert!(
        matches!(sent[1], SentPhoto::Cached { .. }),
        "second delivery must not reopen the consumed staged file"
    );
}
