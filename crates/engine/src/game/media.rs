//! Textures and meshes shipped with the game, keyed by file name.

use std::collections::HashMap;
use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::mesh::Model;

/// 2×2 magenta/black checkerboard used for anything that failed to load.
pub fn placeholder_texture() -> RgbaImage {
    let magenta = Rgba([255, 0, 255, 255]);
    let black = Rgba([0, 0, 0, 255]);
    RgbaImage::from_fn(2, 2, |x, y| if x == y { magenta } else { black })
}

pub struct MediaCache {
    images: HashMap<String, Arc<RgbaImage>>,
    models: HashMap<String, Arc<Model>>,
    placeholder: Arc<RgbaImage>,
}

impl MediaCache {
    pub fn new() -> Self {
        Self {
            images: HashMap::new(),
            models: HashMap::new(),
            placeholder: Arc::new(placeholder_texture()),
        }
    }

    pub fn insert_image(&mut self, name: impl Into<String>, image: RgbaImage) {
        self.images.insert(name.into(), Arc::new(image));
    }

    pub fn insert_model(&mut self, name: impl Into<String>, model: Model) {
        self.models.insert(name.into(), Arc::new(model));
    }

    /// Texture by name. Modifiers (`^...`) are ignored; unknown textures
    /// resolve to the placeholder.
    pub fn image(&self, name: &str) -> Arc<RgbaImage> {
        let base = name.split('^').next().unwrap_or(name);
        match self.images.get(base) {
            Some(image) => Arc::clone(image),
            None => {
                tracing::warn!("Unknown texture `{}`", name);
                Arc::clone(&self.placeholder)
            }
        }
    }

    pub fn model(&self, name: &str) -> Option<Arc<Model>> {
        let model = self.models.get(name).cloned();
        if model.is_none() {
            tracing::warn!("Unknown mesh `{}`", name);
        }
        model
    }

    pub fn placeholder(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.placeholder)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}

impl Default for MediaCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_stripped() {
        let mut media = MediaCache::new();
        media.insert_image("default_stone.png", RgbaImage::from_pixel(1, 1, Rgba([9, 9, 9, 255])));
        let img = media.image("default_stone.png^[crack:1:2");
        assert_eq!(img.get_pixel(0, 0), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_unknown_texture_is_checkerboard() {
        let media = MediaCache::new();
        let img = media.image("nope.png");
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0), &Rgba([255, 0, 255, 255]));
        assert_eq!(img.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(1, 1), &Rgba([255, 0, 255, 255]));
    }
}
