use std::{collections::HashMap, fmt::Debug, sync::Arc};

use log::{error, warn};

use super::BakeDiagnostic;
use crate::{index::AssetId, mesh::Mesh};

/// Name of the sprite that stands in for anything unresolved.
pub const MISSING_TEXTURE: &str = "missingno";

/// A region of the host's texture atlas.
pub trait Sprite: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn min_u(&self) -> f32;
    fn max_u(&self) -> f32;
    fn min_v(&self) -> f32;
    fn max_v(&self) -> f32;

    /// Atlas u for a sprite-local coordinate in sixteenths.
    fn interpolated_u(&self, u: f32) -> f32 {
        self.min_u() + (self.max_u() - self.min_u()) * u / 16.0
    }

    fn interpolated_v(&self, v: f32) -> f32 {
        self.min_v() + (self.max_v() - self.min_v()) * v / 16.0
    }

    /// Texels per unit of atlas coordinate along the denser axis.
    fn texels_per_unit(&self) -> f32 {
        let span_u = self.max_u() - self.min_u();
        let span_v = self.max_v() - self.min_v();
        let texels_u = if span_u > 0.0 { self.width() as f32 / span_u } else { 0.0 };
        let texels_v = if span_v > 0.0 { self.height() as f32 / span_v } else { 0.0 };
        texels_u.max(texels_v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtlasSprite {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub min_u: f32,
    pub max_u: f32,
    pub min_v: f32,
    pub max_v: f32,
}

impl AtlasSprite {
    /// A sprite covering the whole atlas.
    pub fn full(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            min_u: 0.0,
            max_u: 1.0,
            min_v: 0.0,
            max_v: 1.0,
        }
    }
}

impl Sprite for AtlasSprite {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn min_u(&self) -> f32 {
        self.min_u
    }

    fn max_u(&self) -> f32 {
        self.max_u
    }

    fn min_v(&self) -> f32 {
        self.min_v
    }

    fn max_v(&self) -> f32 {
        self.max_v
    }
}

/// Atlas location for a mesh texture key: the key without its `.png` suffix.
pub fn texture_location(key: &str) -> &str {
    key.strip_suffix(".png").unwrap_or(key)
}

/// Sprites for every texture key of a model, resolved once per bake.
#[derive(Debug, Clone)]
pub struct TextureTable {
    sprites: HashMap<String, Arc<dyn Sprite>>,
    missing: Arc<dyn Sprite>,
    particle: Arc<dyn Sprite>,
    diagnostics: Vec<BakeDiagnostic>,
}

impl TextureTable {
    pub fn resolve<F>(model: &AssetId, meshes: &[Mesh], mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Arc<dyn Sprite>,
    {
        let missing = lookup(MISSING_TEXTURE);
        let mut sprites = HashMap::new();
        let mut diagnostics = Vec::new();
        let mut particle = None;
        for mesh in meshes {
            let sprite = sprites
                .entry(mesh.texture.clone())
                .or_insert_with(|| {
                    let location = texture_location(&mesh.texture);
                    if location.starts_with('#') {
                        error!("unresolved texture '{}' for model '{}'", location, model);
                        diagnostics.push(BakeDiagnostic {
                            model: model.clone(),
                            texture: location.to_owned(),
                        });
                        missing.clone()
                    } else {
                        let sprite = lookup(location);
                        if sprite.name() == MISSING_TEXTURE {
                            warn!("sprite '{}' for model '{}' not found", location, model);
                        }
                        sprite
                    }
                })
                .clone();
            particle.get_or_insert(sprite);
        }
        Self {
            sprites,
            particle: particle.unwrap_or_else(|| missing.clone()),
            missing,
            diagnostics,
        }
    }

    /// Sprite of a mesh texture key, the missing sprite if it was never
    /// resolved.
    pub fn sprite(&self, key: &str) -> &Arc<dyn Sprite> {
        self.sprites.get(key).unwrap_or(&self.missing)
    }

    pub fn missing(&self) -> &Arc<dyn Sprite> {
        &self.missing
    }

    /// Sprite of the first mesh.
    pub fn particle(&self) -> &Arc<dyn Sprite> {
        &self.particle
    }

    pub fn diagnostics(&self) -> &[BakeDiagnostic] {
        &self.diagnostics
    }
}
