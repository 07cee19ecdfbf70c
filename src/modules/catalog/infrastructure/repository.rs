/// Diesel/SQLite implementation of CatalogStore
use crate::modules::catalog::domain::entities::{Chapter, Manga, NewPage, PageSummary};
use crate::modules::catalog::domain::repository::{CatalogStore, NewChapter};
use crate::modules::catalog::domain::value_objects::{Direction, DownloadStatus};
use crate::modules::catalog::infrastructure::models::{
    ChapterModel, MangaModel, NewPageModel, PageSummaryModel,
};
use crate::schema::{chapters, manga, pages};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::Database;
use crate::{log_debug, log_info};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

pub struct CatalogStoreImpl {
    db: Arc<Database>,
}

impl CatalogStoreImpl {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for CatalogStoreImpl {
    async fn get_or_create_manga(
        &self,
        title: &str,
        direction: Direction,
        url: &str,
    ) -> AppResult<Manga> {
        let mut conn = self.db.get_connection()?;

        let model = conn.immediate_transaction::<_, AppError, _>(|conn| {
            let existing = manga::table
                .filter(manga::title.eq(title))
                .select(MangaModel::as_select())
                .first(conn)
                .optional()?;

            if let Some(existing) = existing {
                log_debug!("Catalog already has '{}' ({})", title, existing.id);
                return Ok(existing);
            }

            let model = MangaModel {
                id: Uuid::new_v4().to_string(),
                title: title.to_string(),
                direction: direction.to_string(),
                url: url.to_string(),
                created_at: Utc::now().naive_utc(),
            };
            diesel::insert_into(manga::table)
                .values(&model)
                .execute(conn)?;

            log_info!("Added '{}' to the catalog ({})", title, model.id);
            Ok(model)
        })?;

        model.to_manga()
    }

    async fn get_manga(&self, manga_id: Uuid) -> AppResult<Option<Manga>> {
        let mut conn = self.db.get_connection()?;

        let model = manga::table
            .find(manga_id.to_string())
            .select(MangaModel::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get manga: {}", e)))?;

        model.map(MangaModel::to_manga).transpose()
    }

    async fn get_chapters(&self, manga_id: Uuid) -> AppResult<Vec<Chapter>> {
        let mut conn = self.db.get_connection()?;

        let models: Vec<ChapterModel> = chapters::table
            .filter(chapters::manga_id.eq(manga_id.to_string()))
            .order(chapters::chapter_index.asc())
            .select(ChapterModel::as_select())
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to get chapters: {}", e)))?;

        models.into_iter().map(ChapterModel::to_chapter).collect()
    }

    async fn append_chapter(&self, manga_id: Uuid, chapter: &NewChapter) -> AppResult<Chapter> {
        let mut conn = self.db.get_connection()?;
        let manga_key = manga_id.to_string();

        let model = conn
            .immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                let existing = chapters::table
                    .filter(chapters::manga_id.eq(&manga_key))
                    .filter(chapters::url.eq(&chapter.url))
                    .select(ChapterModel::as_select())
                    .first(conn)
                    .optional()?;

                match existing {
                    Some(existing)
                        if existing.download_status == DownloadStatus::NotDownloaded.as_str() =>
                    {
                        let dropped = diesel::delete(
                            pages::table.filter(pages::chapter_id.eq(&existing.id)),
                        )
                        .execute(conn)?;
                        if dropped > 0 {
                            log_debug!(
                                "Dropped {} partial pages of chapter {}",
                                dropped,
                                existing.id
                            );
                        }
                        diesel::update(chapters::table.find(&existing.id))
                            .set((
                                chapters::title.eq(&chapter.title),
                                chapters::chapter_index.eq(chapter.index),
                            ))
                            .execute(conn)?;
                        Ok(ChapterModel {
                            title: chapter.title.clone(),
                            chapter_index: chapter.index,
                            ..existing
                        })
                    }
                    Some(existing) => Ok(existing),
                    None => {
                        let model = ChapterModel {
                            id: Uuid::new_v4().to_string(),
                            manga_id: manga_key.clone(),
                            url: chapter.url.clone(),
                            title: chapter.title.clone(),
                            chapter_index: chapter.index,
                            download_status: DownloadStatus::NotDownloaded.to_string(),
                            created_at: Utc::now().naive_utc(),
                        };
                        diesel::insert_into(chapters::table)
                            .values(&model)
                            .execute(conn)?;
                        Ok(model)
                    }
                }
            })
            .map_err(|e| AppError::CatalogError(format!("Failed to append chapter: {}", e)))?;

        model.to_chapter()
    }

    async fn append_page(&self, chapter_id: Uuid, page: NewPage) -> AppResult<Uuid> {
        let mut conn = self.db.get_connection()?;
        let id = Uuid::new_v4();

        let model = NewPageModel {
            id: id.to_string(),
            chapter_id: chapter_id.to_string(),
            name: page.name,
            page_index: page.index,
            width: page.width,
            height: page.height,
            data: page.data,
        };

        diesel::insert_into(pages::table)
            .values(&model)
            .execute(&mut conn)
            .map_err(|e| AppError::CatalogError(format!("Failed to append page: {}", e)))?;

        Ok(id)
    }

    async fn set_chapter_status(&self, chapter_id: Uuid, status: DownloadStatus) -> AppResult<()> {
        let mut conn = self.db.get_connection()?;

        let updated = diesel::update(chapters::table.find(chapter_id.to_string()))
            .set(chapters::download_status.eq(status.as_str()))
            .execute(&mut conn)
            .map_err(|e| {
                AppError::CatalogError(format!("Failed to update chapter status: {}", e))
            })?;

        if updated == 0 {
            return Err(AppError::NotFound(format!("Chapter {} not found", chapter_id)));
        }
        Ok(())
    }

    async fn get_pages(&self, chapter_id: Uuid) -> AppResult<Vec<PageSummary>> {
        let mut conn = self.db.get_connection()?;

        let models: Vec<PageSummaryModel> = pages::table
            .filter(pages::chapter_id.eq(chapter_id.to_string()))
            .order(pages::page_index.asc())
            .select(PageSummaryModel::as_select())
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to get pages: {}", e)))?;

        models.into_iter().map(PageSummaryModel::to_summary).collect()
    }
}
