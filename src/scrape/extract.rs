use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

static LIGHTBOX_IMAGES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img.LbImage").expect("valid selector"));
static POST_NUMBER_ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.postNumber").expect("valid selector"));

/// Attributes that may carry the image source, in priority order.
const IMAGE_SOURCE_ATTRS: &[&str] = &["data-url", "src", "href"];

/// An image post candidate found on one thread page: the permalink of the
/// enclosing post and the raw (unnormalized) image source string.
#[derive(Debug, Clone)]
pub struct PostCandidate {
    pub permalink: Url,
    pub image_source: String,
}

/// Extract image-post candidates from one page of thread markup, newest
/// (bottom of page) first, stopping after `budget` candidates.
///
/// Quoted images never surface as posts; thumbnails are discarded. A
/// candidate missing its permalink anchor or any usable source attribute is
/// dropped with a warning and the scan continues.
#[must_use]
pub fn extract_image_posts(
    html: &str,
    page_url: &str,
    base_url: &Url,
    budget: usize,
) -> Vec<PostCandidate> {
    let document = Html::parse_document(html);
    let mut candidates = Vec::new();

    let images: Vec<ElementRef> = document.select(&LIGHTBOX_IMAGES).collect();
    for image in images.into_iter().rev() {
        if candidates.len() >= budget {
            break;
        }
        if let Some(candidate) = candidate_from_image(image, page_url, base_url) {
            candidates.push(candidate);
        }
    }

    candidates
}

fn candidate_from_image(
    image: ElementRef,
    page_url: &str,
    base_url: &Url,
) -> Option<PostCandidate> {
    let mut element = image;
    let mut container = parent_element(element)?;

    // A quoted post's image is never an original image post.
    if has_class(container, "quote") {
        return None;
    }
    // A lightbox trigger wraps the real image reference; work with the
    // wrapper instead and re-derive the container.
    if has_class(container, "LbTrigger") {
        element = container;
        container = parent_element(container)?;
    }
    if has_class(container, "externalLink") {
        container = parent_element(container)?;
    }
    if has_class(container, "thumbnail") {
        return None;
    }

    let Some(post_block) = enclosing_post_block(container) else {
        warn!(page = %page_url, "image candidate has no enclosing post block");
        return None;
    };
    let Some(href) = post_block
        .select(&POST_NUMBER_ANCHOR)
        .next()
        .and_then(|a| a.value().attr("href"))
    else {
        warn!(page = %page_url, "post block has no post-number permalink, dropping candidate");
        return None;
    };
    let Ok(permalink) = base_url.join(href) else {
        warn!(page = %page_url, href = %href, "post permalink does not resolve, dropping candidate");
        return None;
    };

    let Some(source) = IMAGE_SOURCE_ATTRS
        .iter()
        .find_map(|attr| element.value().attr(attr))
    else {
        warn!(page = %page_url, post = %permalink, "image has no usable source attribute, dropping candidate");
        return None;
    };

    Some(PostCandidate {
        permalink,
        image_source: source.to_string(),
    })
}

/// The enclosing post block for a resolved image container: the nearest
/// `li.message` ancestor, falling back to the fixed five-level ancestor walk
/// that matches older markup without the marker class.
fn enclosing_post_block(container: ElementRef) -> Option<ElementRef> {
    let mut current = container.parent();
    while let Some(node) = current {
        if let Some(element) = ElementRef::wrap(node) {
            if element.value().name() == "li" && has_class(element, "message") {
                return Some(element);
            }
        }
        current = node.parent();
    }

    nth_ancestor(container, 5)
}

fn nth_ancestor(element: ElementRef, n: usize) -> Option<ElementRef> {
    let mut current = element;
    for _ in 0..n {
        current = parent_element(current)?;
    }
    Some(current)
}

fn parent_element(element: ElementRef) -> Option<ElementRef> {
    element.parent().and_then(ElementRef::wrap)
}

fn has_class(element: ElementRef, class: &str) -> bool {
    element
        .value()
        .attr("class")
        .unwrap_or("")
        .split_whitespace()
        .any(|c| c == class)
}
