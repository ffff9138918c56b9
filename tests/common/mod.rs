//! Shared fixtures for the integration tests: thread-page markup builders,
//! a recording transport fake, and database setup.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use forum_photo_courier::config::{Config, ForumTopic};
use forum_photo_courier::db::Database;
use forum_photo_courier::delivery::{ImageTransport, TransportError};

pub const TOPIC: &str = "threads/test-topic.1";

/// Configuration pointed at a mock forum, staging into `work_dir`.
pub fn test_config(forum_uri: &str, work_dir: &Path) -> Config {
    Config {
        forum_base_url: Url::parse(forum_uri).expect("mock server URI parses"),
        topics: vec![ForumTopic {
            name: "Test".to_string(),
            path: TOPIC.to_string(),
        }],
        work_dir: work_dir.to_path_buf(),
        ..Config::for_testing()
    }
}

pub async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

/// A post block holding one lightbox image, in the forum's markup shape.
pub fn image_post(post_id: u32, image_url: &str) -> String {
    format!(
        r#"<li class="message">
             <div class="messageInfo">
               <div class="messageContent"><article><blockquote class="messageText">
                 <img class="LbImage" src="{image_url}" alt=""/>
               </blockquote></article></div>
               <div class="messageMeta"><a class="postNumber hashPermalink" href="posts/{post_id}/">#{post_id}</a></div>
             </div>
           </li>"#
    )
}

/// A post block whose image sits inside a quote.
pub fn quoted_image_post(post_id: u32, image_url: &str) -> String {
    format!(
        r#"<li class="message">
             <div class="messageInfo">
               <div class="messageContent"><article><blockquote class="messageText">
                 <div class="quote"><img class="LbImage" src="{image_url}" alt=""/></div>
               </blockquote></article></div>
               <div class="messageMeta"><a class="postNumber hashPermalink" href="posts/{post_id}/">#{post_id}</a></div>
             </div>
           </li>"#
    )
}

/// A post block whose image resolves to a thumbnail container.
pub fn thumbnail_post(post_id: u32, image_url: &str) -> String {
    format!(
        r#"<li class="message">
             <div class="messageInfo">
               <div class="messageContent"><article><blockquote class="messageText">
                 <div class="thumbnail"><div class="LbTrigger" data-url="{image_url}">
                   <img class="LbImage" src="{image_url}" alt=""/>
                 </div></div>
               </blockquote></article></div>
               <div class="messageMeta"><a class="postNumber hashPermalink" href="posts/{post_id}/">#{post_id}</a></div>
             </div>
           </li>"#
    )
}

/// The pagination control: numbered anchors plus the forum's trailing
/// "next" link.
pub fn page_nav(topic_path: &str, last_page: u32) -> String {
    let mut nav = String::from(r#"<div class="PageNav">"#);
    for n in 1..=last_page {
        nav.push_str(&format!(r#"<a href="{topic_path}/page-{n}">{n}</a>"#));
    }
    nav.push_str(&format!(
        r#"<a href="{topic_path}/page-2" class="text">Weiter</a>"#
    ));
    nav.push_str("</div>");
    nav
}

/// One full thread page. `last_page == 1` renders without a pagination
/// control, like a single-page thread.
pub fn thread_page(topic_path: &str, last_page: u32, posts: &[String]) -> String {
    let nav = if last_page > 1 {
        page_nav(topic_path, last_page)
    } else {
        String::new()
    };
    format!(
        r#"<html><body><div class="mainContent">{nav}<ol class="messageList">{}</ol></div></body></html>"#,
        posts.concat()
    )
}

pub async fn mount_page(server: &MockServer, url_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html"))
        .mount(server)
        .await;
}

pub async fn mount_image(server: &MockServer, url_path: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"\xff\xd8jpegbytes".to_vec(), "image/jpeg"))
        .mount(server)
        .await;
}

/// What the recording transport saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentPhoto {
    Cached {
        chat_id: i64,
        file_id: String,
        caption: String,
    },
    Uploaded {
        chat_id: i64,
        file_name: String,
        caption: String,
    },
}

impl SentPhoto {
    pub fn caption(&self) -> &str {
        match self {
            Self::Cached { caption, .. } | Self::Uploaded { caption, .. } => caption,
        }
    }
}

/// Transport fake: records every send and mints deterministic handles.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentPhoto>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentPhoto> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::MalformedResponse);
        }
        Ok(())
    }
}

#[async_trait]
impl ImageTransport for RecordingTransport {
    async fn send_cached(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: &str,
    ) -> Result<String, TransportError> {
        self.check_failing()?;
        self.sent.lock().unwrap().push(SentPhoto::Cached {
            chat_id,
            file_id: file_id.to_string(),
            caption: caption.to_string(),
        });
        Ok(file_id.to_string())
    }

    async fn send_file(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
    ) -> Result<String, TransportError> {
        self.check_failing()?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.sent.lock().unwrap().push(SentPhoto::Uploaded {
            chat_id,
            file_name: file_name.clone(),
            caption: caption.to_string(),
        });
        Ok(format!("file-id-{file_name}"))
    }
}
