/// Diesel models for the manga, chapters and pages tables
use crate::modules::catalog::domain::entities::{Chapter, Manga, PageSummary};
use crate::schema::{chapters, manga, pages};
use crate::shared::errors::{AppError, AppResult};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = manga)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MangaModel {
    pub id: String,
    pub title: String,
    pub direction: String,
    pub url: String,
    pub created_at: NaiveDateTime,
}

impl MangaModel {
    pub fn to_manga(self) -> AppResult<Manga> {
        Ok(Manga {
            id: Uuid::parse_str(&self.id)?,
            title: self.title,
            direction: self.direction.parse().map_err(AppError::DatabaseError)?,
            url: self.url,
            created_at: self.created_at.and_utc(),
        })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = chapters)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ChapterModel {
    pub id: String,
    pub manga_id: String,
    pub url: String,
    pub title: Option<String>,
    pub chapter_index: i32,
    pub download_status: String,
    pub created_at: NaiveDateTime,
}

impl ChapterModel {
    pub fn to_chapter(self) -> AppResult<Chapter> {
        Ok(Chapter {
            id: Uuid::parse_str(&self.id)?,
            manga_id: Uuid::parse_str(&self.manga_id)?,
            url: self.url,
            title: self.title,
            index: self.chapter_index,
            download_status: self
                .download_status
                .parse()
                .map_err(AppError::DatabaseError)?,
            created_at: self.created_at.and_utc(),
        })
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = pages)]
pub struct NewPageModel {
    pub id: String,
    pub chapter_id: String,
    pub name: String,
    pub page_index: i32,
    pub width: i32,
    pub height: i32,
    pub data: Vec<u8>,
}

/// Page row without the blob column
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = pages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PageSummaryModel {
    pub id: String,
    pub chapter_id: String,
    pub name: String,
    pub page_index: i32,
    pub width: i32,
    pub height: i32,
}

impl PageSummaryModel {
    pub fn to_summary(self) -> AppResult<PageSummary> {
        Ok(PageSummary {
            id: Uuid::parse_str(&self.id)?,
            chapter_id: Uuid::parse_str(&self.chapter_id)?,
            name: self.name,
            index: self.page_index,
            width: self.width,
            height: self.height,
        })
    }
}
