/// Which source chapters a job still has to download
use crate::modules::catalog::Chapter;
use crate::modules::source::SourceChapter;
use std::collections::HashMap;

/// Source chapters that are missing from the catalog or were never finished,
/// in ascending ordinal order. Chapters are matched by URL; `Downloaded`,
/// `Archived` and `Ignored` chapters are skipped.
pub fn chapters_to_download(available: &[SourceChapter], stored: &[Chapter]) -> Vec<SourceChapter> {
    let stored_by_url: HashMap<&str, &Chapter> =
        stored.iter().map(|c| (c.url.as_str(), c)).collect();

    let mut wanted: Vec<SourceChapter> = available
        .iter()
        .filter(|chapter| match stored_by_url.get(chapter.url.as_str()) {
            Some(existing) => existing.download_status.needs_download(),
            None => true,
        })
        .cloned()
        .collect();
    wanted.sort_by_key(|chapter| chapter.index);
    wanted
}
