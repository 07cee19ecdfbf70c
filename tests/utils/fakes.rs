/// Scripted content source for driving the worker in tests
use async_trait::async_trait;
use mangaq::modules::catalog::Direction;
use mangaq::modules::source::{ContentSource, PageImage, SourceChapter, SourceManga, SourcePage};
use mangaq::shared::errors::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Serves titles registered with `with_manga`.
///
/// Chapter `c` of `http://x/a` lives at `http://x/a/c{c}` and its page `p`
/// at `http://x/a/c{c}/p{p}`.
pub struct ScriptedSource {
    titles: Mutex<HashMap<String, ScriptedTitle>>,
    failing_pages: Mutex<HashSet<String>>,
    /// When set, each page fetch consumes one permit and waits for more
    gate: Option<Semaphore>,
    pages_fetched: AtomicUsize,
}

struct ScriptedTitle {
    title: String,
    direction: Direction,
    chapters: usize,
    pages_per_chapter: usize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            titles: Mutex::new(HashMap::new()),
            failing_pages: Mutex::new(HashSet::new()),
            gate: None,
            pages_fetched: AtomicUsize::new(0),
        }
    }

    /// Only `permits` page fetches go through until `release_pages` is called
    pub fn gated(permits: usize) -> Self {
        Self {
            gate: Some(Semaphore::new(permits)),
            ..Self::new()
        }
    }

    pub fn with_manga(self, url: &str, title: &str, chapters: usize, pages_per_chapter: usize) -> Self {
        self.titles.lock().unwrap().insert(
            url.to_string(),
            ScriptedTitle {
                title: title.to_string(),
                direction: Direction::Horizontal,
                chapters,
                pages_per_chapter,
            },
        );
        self
    }

    /// Make one page fail with a source error
    pub fn fail_page(self, url: &str, chapter: usize, page: usize) -> Self {
        self.failing_pages
            .lock()
            .unwrap()
            .insert(page_url(url, chapter, page));
        self
    }

    /// Publish more chapters for a title
    pub fn add_chapters(&self, url: &str, count: usize) {
        if let Some(title) = self.titles.lock().unwrap().get_mut(url) {
            title.chapters += count;
        }
    }

    pub fn release_pages(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched.load(Ordering::SeqCst)
    }
}

pub fn chapter_url(url: &str, chapter: usize) -> String {
    format!("{}/c{}", url, chapter)
}

pub fn page_url(url: &str, chapter: usize, page: usize) -> String {
    format!("{}/p{}", chapter_url(url, chapter), page)
}

pub fn error_message(url: &str) -> String {
    format!("HTTP 503 while fetching {}", url)
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn fetch_manga(&self, url: &str) -> AppResult<SourceManga> {
        let titles = self.titles.lock().unwrap();
        let title = titles
            .get(url)
            .ok_or_else(|| AppError::SourceError(error_message(url)))?;

        Ok(SourceManga {
            title: title.title.clone(),
            direction: title.direction,
            chapters: (0..title.chapters)
                .map(|c| SourceChapter {
                    id: c.to_string(),
                    title: Some(format!("Ch. {}", c + 1)),
                    index: c as i32,
                    url: chapter_url(url, c),
                })
                .collect(),
        })
    }

    async fn fetch_pages(&self, chapter: &SourceChapter) -> AppResult<Vec<SourcePage>> {
        let titles = self.titles.lock().unwrap();
        let pages = titles
            .iter()
            .find(|(url, _)| chapter.url.starts_with(&format!("{}/c", url)))
            .map(|(_, title)| title.pages_per_chapter)
            .ok_or_else(|| AppError::SourceError(error_message(&chapter.url)))?;

        Ok((0..pages)
            .map(|p| SourcePage {
                name: format!("{:03}.jpg", p + 1),
                url: format!("{}/p{}", chapter.url, p),
            })
            .collect())
    }

    async fn fetch_page(&self, page: &SourcePage) -> AppResult<PageImage> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| AppError::SourceError(e.to_string()))?
                .forget();
        }

        if self.failing_pages.lock().unwrap().contains(&page.url) {
            return Err(AppError::SourceError(error_message(&page.url)));
        }

        self.pages_fetched.fetch_add(1, Ordering::SeqCst);
        Ok(PageImage {
            bytes: page.url.as_bytes().to_vec(),
            width: 800,
            height: 1200,
        })
    }
}
