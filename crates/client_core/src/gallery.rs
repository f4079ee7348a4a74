//! Ordered photo sequence plus the page the viewer is currently on.

use shared::domain::Photo;

use crate::{error::StoreError, input::NavIntent, store::PhotoStore};

/// Width of one page, in percent of the viewport.
pub const PAGE_WIDTH_PERCENT: i64 = 100;

/// What the presentation layer needs to lay out one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub photo: Photo,
    /// Horizontal translation from the gallery origin, in percent.
    pub offset_percent: i64,
    pub alt: String,
    pub deletable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryState {
    photos: Vec<Photo>,
    current: usize,
}

impl GalleryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_photos(photos: Vec<Photo>) -> Self {
        let mut state = Self::new();
        state.replace(photos);
        state
    }

    /// Re-reads the sequence from the store. On failure the current sequence is kept.
    pub async fn reload(&mut self, store: &dyn PhotoStore) -> Result<(), StoreError> {
        let photos = store.list().await?;
        self.replace(photos);
        Ok(())
    }

    /// Installs a fresh listing, renumbering positions and clamping the current page.
    pub fn replace(&mut self, photos: Vec<Photo>) {
        self.photos = photos
            .into_iter()
            .enumerate()
            .map(|(position, photo)| Photo { position, ..photo })
            .collect();
        self.current = match self.photos.len() {
            0 => 0,
            len => self.current.min(len - 1),
        };
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_photo(&self) -> Option<&Photo> {
        self.photos.get(self.current)
    }

    pub fn photo_at(&self, position: usize) -> Option<&Photo> {
        self.photos.get(position)
    }

    pub fn first_photo(&self) -> Option<&Photo> {
        self.photos.first()
    }

    pub fn prev(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    pub fn next(&mut self) -> bool {
        if self.current + 1 >= self.photos.len() {
            return false;
        }
        self.current += 1;
        true
    }

    pub fn apply(&mut self, intent: NavIntent) -> bool {
        match intent {
            NavIntent::Prev => self.prev(),
            NavIntent::Next => self.next(),
        }
    }

    /// `"{current+1} / {len}"`; an empty gallery reads `"1 / 0"`.
    pub fn position_label(&self) -> String {
        format!("{} / {}", self.current + 1, self.photos.len())
    }

    pub fn page_offset(position: usize) -> i64 {
        position as i64 * PAGE_WIDTH_PERCENT
    }

    /// Viewport translation that brings the current page into view.
    pub fn viewport_offset(&self) -> i64 {
        -Self::page_offset(self.current)
    }

    pub fn pages(&self, show_delete: bool) -> Vec<PageView> {
        self.photos
            .iter()
            .map(|photo| PageView {
                photo: photo.clone(),
                offset_percent: Self::page_offset(photo.position),
                alt: format!("Photo {}", photo.position + 1),
                deletable: show_delete,
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/gallery_tests.rs"]
mod tests;
