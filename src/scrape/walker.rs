use std::path::PathBuf;

use async_stream::try_stream;
use futures_util::{pin_mut, Stream, TryStreamExt};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::extract::extract_image_posts;
use super::fetch::PageFetcher;
use super::resolve::ImageResolver;
use super::{Post, ScrapeError};
use crate::config::Config;
use crate::store::ImageCache;

static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Walks thread pages backward from the last page to build post windows.
pub struct ThreadScraper {
    fetcher: PageFetcher,
    base_url: Url,
    work_dir: PathBuf,
}

impl ThreadScraper {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            fetcher: PageFetcher::new(config.fetch_timeout),
            base_url: config.forum_base_url.clone(),
            work_dir: config.work_dir.clone(),
        }
    }

    /// The latest image posts of a thread, oldest first.
    ///
    /// Collects posts newest-first until more than `num + skip` are found or
    /// every page has been scanned, then drops the `skip` newest and reverses
    /// the rest. A thread with fewer qualifying posts returns everything it
    /// has; callers must accept a short window.
    ///
    /// # Errors
    ///
    /// Returns an error when a page cannot be fetched or its pagination
    /// control cannot be parsed. Individual malformed candidates and failed
    /// image downloads are dropped, not errors.
    pub async fn get_window(
        &self,
        cache: &dyn ImageCache,
        topic_path: &str,
        num: usize,
        skip: usize,
    ) -> Result<Vec<Post>, ScrapeError> {
        let threshold = num + skip;
        let mut collected: Vec<Post> = Vec::new();

        let posts = self.post_stream(cache, topic_path, threshold + 1);
        pin_mut!(posts);
        while let Some(post) = posts.try_next().await? {
            collected.push(post);
            if collected.len() > threshold {
                break;
            }
        }

        Ok(build_window(collected, skip))
    }

    /// Lazy stream of qualifying posts, newest first, walking pages backward
    /// from the thread's last page. `wanted` bounds how many posts the stream
    /// produces in total and how much of each page is scanned.
    fn post_stream<'a>(
        &'a self,
        cache: &'a dyn ImageCache,
        topic_path: &'a str,
        wanted: usize,
    ) -> impl Stream<Item = Result<Post, ScrapeError>> + 'a {
        try_stream! {
            let resolver = ImageResolver::new(&self.fetcher, cache, &self.base_url, &self.work_dir);

            let topic_url = join_path(&self.base_url, topic_path);
            let landing = self.fetcher.fetch_page(&topic_url).await?;
            let mut page = last_page_number(&landing, topic_path, &topic_url)?;

            let mut yielded = 0usize;
            loop {
                let page_url = format!("{topic_url}/page-{page}");
                debug!(page = %page_url, "scanning thread page");
                let html = self.fetcher.fetch_page(&page_url).await?;

                let budget = wanted - yielded;
                for candidate in extract_image_posts(&html, &page_url, &self.base_url, budget) {
                    if let Some(image) = resolver.resolve(&candidate.image_source).await? {
                        yielded += 1;
                        yield Post {
                            permalink: candidate.permalink,
                            image,
                        };
                    }
                }

                if yielded >= wanted || page <= 1 {
                    break;
                }
                page -= 1;
            }
        }
    }
}

/// The highest reachable page number of a thread, read from its pagination
/// control. The control's trailing slot is the forum's own "next" link, so
/// the page count sits second to last. No matching anchor means a
/// single-page thread.
///
/// # Errors
///
/// Returns an error when the chosen anchor's label is not a page number.
pub fn last_page_number(
    html: &str,
    topic_path: &str,
    page_url: &str,
) -> Result<u32, ScrapeError> {
    let document = Html::parse_document(html);
    let marker = format!("{topic_path}/page");

    let labels: Vec<String> = document
        .select(&ANCHORS)
        .filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| href.contains(&marker))
        })
        .map(|a| a.text().collect::<String>())
        .collect();

    let label = match labels.len() {
        0 => return Ok(1),
        1 => &labels[0],
        n => &labels[n - 2],
    };

    label.trim().parse().map_err(|_| ScrapeError::Malformed {
        url: page_url.to_string(),
        reason: format!("pagination anchor '{}' is not a page number", label.trim()),
    })
}

/// Drop the `skip` newest posts and order the rest oldest first, ready for
/// delivery (the latest post comes last).
fn build_window(collected: Vec<Post>, skip: usize) -> Vec<Post> {
    let mut window: Vec<Post> = collected.into_iter().skip(skip).collect();
    window.reverse();
    window
}

fn join_path(base: &Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}
