use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{CommerceError, CommerceResult};
use crate::models::{Chapter, ChapterId, Content, ContentId, Course, CourseId, Viewer};
use crate::store::{CatalogStore, ContentStore};
use super::resolver::{AccessDecision, AccessResolver};

// ============================================================================
// Content Gateway
// ============================================================================
//
// Every content-serving path goes through here so the access rule is
// applied exactly once per request. Each call returns fully populated views;
// nothing is loaded lazily afterwards.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentView {
    pub id: ContentId,
    pub chapter_id: ChapterId,
    pub title: String,
    pub order_index: Option<i32>,
    pub is_preview: bool,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub duration_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterView {
    pub id: ChapterId,
    pub course_id: CourseId,
    pub course_title: String,
    pub title: String,
    pub description: Option<String>,
    pub order_index: Option<i32>,
    pub document_url: Option<String>,
    pub video_url: Option<String>,
    /// `None` when the viewer only gets metadata
    pub contents: Option<Vec<ContentView>>,
    pub content_count: usize,
    pub total_duration_minutes: u32,
    pub full_access: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ascending order index, unordered items last
fn by_order_index(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn content_view(content: Content, full: bool) -> ContentView {
    ContentView {
        id: content.id,
        chapter_id: content.chapter_id,
        title: content.title,
        order_index: content.order_index,
        is_preview: content.is_preview,
        description: if full { content.description } else { None },
        file_url: if full { content.file_url } else { None },
        duration_minutes: if full { content.duration_minutes } else { None },
        created_at: content.created_at,
    }
}

fn chapter_view(chapter: Chapter, course: &Course, contents: Option<Vec<Content>>) -> ChapterView {
    let full = contents.is_some();

    let contents = contents.map(|mut items| {
        items.sort_by(|a, b| by_order_index(a.order_index, b.order_index));
        items
            .into_iter()
            .map(|content| content_view(content, true))
            .collect::<Vec<_>>()
    });

    let content_count = contents.as_ref().map(Vec::len).unwrap_or(0);
    let total_duration_minutes = contents
        .as_ref()
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.duration_minutes)
                .fold(0u32, u32::saturating_add)
        })
        .unwrap_or(0);

    ChapterView {
        id: chapter.id,
        course_id: chapter.course_id,
        course_title: course.title.clone(),
        title: chapter.title,
        description: chapter.description,
        order_index: chapter.order_index,
        document_url: if full { chapter.document_url } else { None },
        video_url: if full { chapter.video_url } else { None },
        contents,
        content_count,
        total_duration_minutes,
        full_access: full,
        created_at: chapter.created_at,
        updated_at: chapter.updated_at,
    }
}

pub struct ContentGateway {
    content: Arc<dyn ContentStore>,
    catalog: Arc<dyn CatalogStore>,
    resolver: Arc<AccessResolver>,
}

impl ContentGateway {
    pub fn new(
        content: Arc<dyn ContentStore>,
        catalog: Arc<dyn CatalogStore>,
        resolver: Arc<AccessResolver>,
    ) -> Self {
        Self {
            content,
            catalog,
            resolver,
        }
    }

    async fn course(&self, course_id: CourseId) -> CommerceResult<Course> {
        self.catalog
            .get_course(course_id)
            .await?
            .ok_or(CommerceError::CourseNotFound(course_id))
    }

    async fn decide(&self, viewer: &Viewer, course_id: CourseId) -> CommerceResult<(Course, AccessDecision)> {
        let course = self.course(course_id).await?;
        let decision = self.resolver.resolve(viewer, &course).await?;
        Ok((course, decision))
    }

    async fn build_chapter(&self, chapter: Chapter, course: &Course, decision: AccessDecision) -> CommerceResult<ChapterView> {
        let contents = if decision.is_full() {
            Some(self.content.contents_for_chapter(chapter.id).await?)
        } else {
            None
        };
        Ok(chapter_view(chapter, course, contents))
    }

    /// All chapters of a course in display order
    pub async fn chapters_for_course(&self, viewer: &Viewer, course_id: CourseId) -> CommerceResult<Vec<ChapterView>> {
        let (course, decision) = self.decide(viewer, course_id).await?;

        let mut chapters = self.content.chapters_for_course(course_id).await?;
        chapters.sort_by(|a, b| {
            by_order_index(a.order_index, b.order_index).then(a.created_at.cmp(&b.created_at))
        });

        let mut views = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            views.push(self.build_chapter(chapter, &course, decision).await?);
        }
        Ok(views)
    }

    pub async fn chapter(&self, viewer: &Viewer, chapter_id: ChapterId) -> CommerceResult<ChapterView> {
        let chapter = self
            .content
            .get_chapter(chapter_id)
            .await?
            .ok_or(CommerceError::ChapterNotFound(chapter_id))?;

        let (course, decision) = self.decide(viewer, chapter.course_id).await?;
        self.build_chapter(chapter, &course, decision).await
    }

    /// Lesson list of one chapter; `None` for metadata-only viewers
    pub async fn chapter_contents(
        &self,
        viewer: &Viewer,
        chapter_id: ChapterId,
    ) -> CommerceResult<Option<Vec<ContentView>>> {
        Ok(self.chapter(viewer, chapter_id).await?.contents)
    }

    pub async fn content(&self, viewer: &Viewer, content_id: ContentId) -> CommerceResult<ContentView> {
        let content = self
            .content
            .get_content(content_id)
            .await?
            .ok_or(CommerceError::ContentNotFound(content_id))?;

        let chapter = self
            .content
            .get_chapter(content.chapter_id)
            .await?
            .ok_or(CommerceError::ChapterNotFound(content.chapter_id))?;

        let (_, decision) = self.decide(viewer, chapter.course_id).await?;
        Ok(content_view(content, decision.is_full()))
    }
}
