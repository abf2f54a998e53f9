use std::{
    collections::{HashMap, HashSet},
    error::Error,
    fmt::{self, Display, Formatter},
    sync::{Arc, Mutex, PoisonError},
};

use glam::Mat4;
use log::{debug, info, warn};

use crate::{
    animation::AnimationClip,
    bake::{
        facing::Facing,
        format::VertexFormat,
        sprite::{texture_location, Sprite, TextureTable},
        view::ViewTransformKind,
        BakeDiagnostic, BakedQuad, QuadBaker,
    },
    index::AssetId,
    loader::{self, LoaderParams, ParseError},
    model::AssetModel,
    pose::{PoseResolver, PoseState},
    source::AssetSource,
};

const BLOCK_MODELS: &str = "models/block/";
const ITEM_MODELS: &str = "models/item/";

#[derive(Debug)]
pub enum LoadError<E> {
    NotFound(AssetId),
    Io(E),
    Parse {
        id: AssetId,
        source: Arc<ParseError>,
    },
    /// The asset failed to parse on an earlier load. Holds that cause.
    PreviouslyFailed {
        id: AssetId,
        source: Arc<ParseError>,
    },
}

impl<E> LoadError<E> {
    /// The parse failure behind this error, if any.
    pub fn parse_error(&self) -> Option<&Arc<ParseError>> {
        match self {
            LoadError::Parse { source, .. } | LoadError::PreviouslyFailed { source, .. } => {
                Some(source)
            }
            LoadError::NotFound(_) | LoadError::Io(_) => None,
        }
    }
}

impl<E: Display> Display for LoadError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(id) => write!(f, "Model {} not found", id),
            LoadError::Io(error) => write!(f, "Failed to read model: {}", error),
            LoadError::Parse { id, source } => {
                write!(f, "Failed to parse model {}: {}", id, source)
            }
            LoadError::PreviouslyFailed { id, .. } => {
                write!(f, "Error loading model {} previously", id)
            }
        }
    }
}

impl<E: Error + 'static> Error for LoadError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::NotFound(_) => None,
            LoadError::Io(error) => Some(error),
            LoadError::Parse { source, .. } | LoadError::PreviouslyFailed { source, .. } => {
                Some(source.as_ref())
            }
        }
    }
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Loaded(Arc<AssetModel>),
    Failed(Arc<ParseError>),
}

/// The other model folder to try when a block or item model is missing.
fn fallback_id(id: &AssetId) -> Option<AssetId> {
    if let Some(rest) = id.path().strip_prefix(BLOCK_MODELS) {
        Some(id.with_path(format!("{}{}", ITEM_MODELS, rest)))
    } else {
        id.path()
            .strip_prefix(ITEM_MODELS)
            .map(|rest| id.with_path(format!("{}{}", BLOCK_MODELS, rest)))
    }
}

/// Parsed models by requested id, failures included, until the next reload.
pub struct ModelCache<S> {
    source: S,
    params: Arc<LoaderParams>,
    namespaces: HashSet<String>,
    entries: HashMap<AssetId, CacheEntry>,
}

impl<S: AssetSource> ModelCache<S> {
    pub fn new(source: S, params: LoaderParams) -> Self {
        Self {
            source,
            params: Arc::new(params),
            namespaces: HashSet::new(),
            entries: HashMap::new(),
        }
    }

    pub fn params(&self) -> &LoaderParams {
        &self.params
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn add_namespace(&mut self, namespace: &str) {
        let namespace = namespace.to_lowercase();
        info!("Namespace {} registered for md5 models", namespace);
        self.namespaces.insert(namespace);
    }

    pub fn accepts(&self, id: &AssetId) -> bool {
        self.namespaces.contains(id.namespace())
            && id
                .extension()
                .is_some_and(|extension| self.params.accepts_extension(extension))
    }

    fn read(&mut self, id: &AssetId) -> Result<Vec<u8>, LoadError<S::Error>> {
        if let Some(buffer) = self.source.read(id).map_err(LoadError::Io)? {
            return Ok(buffer);
        }
        let Some(fallback) = fallback_id(id) else {
            return Err(LoadError::NotFound(id.clone()));
        };
        info!("Model {} not found, trying {}", id, fallback);
        self.source
            .read(&fallback)
            .map_err(LoadError::Io)?
            .ok_or_else(|| LoadError::NotFound(id.clone()))
    }

    pub fn load(&mut self, id: &AssetId) -> Result<ModelHandle, LoadError<S::Error>> {
        debug!("Loading model {}", id);
        let entry = match self.entries.get(id) {
            Some(entry) => entry.clone(),
            None => {
                let buffer = self.read(id)?;
                match loader::parse(&buffer) {
                    Ok(model) => {
                        let model = Arc::new(model);
                        self.entries
                            .insert(id.clone(), CacheEntry::Loaded(model.clone()));
                        CacheEntry::Loaded(model)
                    }
                    Err(error) => {
                        warn!("Failed to parse model {}: {}", id, error);
                        let source = Arc::new(error);
                        self.entries
                            .insert(id.clone(), CacheEntry::Failed(source.clone()));
                        return Err(LoadError::Parse {
                            id: id.clone(),
                            source,
                        });
                    }
                }
            }
        };
        match entry {
            CacheEntry::Loaded(model) => {
                Ok(ModelHandle::new(id.clone(), model, self.params.clone()))
            }
            CacheEntry::Failed(source) => Err(LoadError::PreviouslyFailed {
                id: id.clone(),
                source,
            }),
        }
    }

    /// Forget every parsed model and failure.
    pub fn reload(&mut self) {
        debug!("Dropping {} cached models", self.entries.len());
        self.entries.clear();
    }

    /// Swap in a new asset source and forget everything read from the old
    /// one.
    pub fn replace_source(&mut self, source: S) -> S {
        let previous = std::mem::replace(&mut self.source, source);
        self.reload();
        previous
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed model ready to bake, with the clip poses resolve against.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    id: AssetId,
    model: Arc<AssetModel>,
    params: Arc<LoaderParams>,
    clip: Option<usize>,
}

impl ModelHandle {
    fn new(id: AssetId, model: Arc<AssetModel>, params: Arc<LoaderParams>) -> Self {
        let clip = if model.clips().is_empty() { None } else { Some(0) };
        Self {
            id,
            model,
            params,
            clip,
        }
    }

    pub fn id(&self) -> &AssetId {
        &self.id
    }

    pub fn model(&self) -> &Arc<AssetModel> {
        &self.model
    }

    pub fn clip(&self) -> Option<&AnimationClip> {
        self.clip.and_then(|index| self.model.clips().get(index))
    }

    /// Same model with another clip active. `None` if no clip has that name.
    pub fn with_clip(&self, name: &str) -> Option<ModelHandle> {
        let (index, _) = self.model.clip(name)?;
        Some(Self {
            clip: Some(index),
            ..self.clone()
        })
    }

    pub fn default_state(&self) -> PoseState {
        PoseState::Identity
    }

    /// Distinct texture locations in mesh order, in the model's namespace.
    pub fn texture_references(&self) -> Vec<AssetId> {
        let mut seen = HashSet::new();
        self.model
            .meshes()
            .iter()
            .map(|mesh| texture_location(&mesh.texture))
            .filter(|location| seen.insert(*location))
            .map(|location| self.id.with_path(location))
            .collect()
    }

    pub fn bake<F>(&self, state: PoseState, format: &VertexFormat, lookup: F) -> BakedModel
    where
        F: FnMut(&str) -> Arc<dyn Sprite>,
    {
        let textures = TextureTable::resolve(&self.id, self.model.meshes(), lookup);
        BakedModel::new(self.clone(), state, format.clone(), textures)
    }
}

/// Per-draw state the host hands to [`BakedModel::quads`].
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub animation: Option<PoseState>,
}

/// Baked geometry for one vertex format and texture set, re-baked on demand
/// for other poses.
#[derive(Debug)]
pub struct BakedModel {
    handle: ModelHandle,
    state: PoseState,
    format: VertexFormat,
    textures: TextureTable,
    quads: Arc<[BakedQuad]>,
    poses: Mutex<HashMap<PoseState, Arc<[BakedQuad]>>>,
}

impl BakedModel {
    fn new(
        handle: ModelHandle,
        state: PoseState,
        format: VertexFormat,
        textures: TextureTable,
    ) -> Self {
        let mut baked = Self {
            handle,
            state,
            format,
            textures,
            quads: Arc::from(Vec::new()),
            poses: Mutex::new(HashMap::new()),
        };
        baked.quads = baked.bake_state(&baked.state).into();
        baked
    }

    fn bake_state(&self, state: &PoseState) -> Vec<BakedQuad> {
        let model = &self.handle.model;
        let joints =
            PoseResolver::new(self.handle.clip()).joint_transforms(state, model.joints());
        QuadBaker::new(&self.format, &self.textures)
            .with_contract_uvs(self.handle.params.contract_uvs)
            .bake(model.meshes(), &joints)
    }

    pub fn id(&self) -> &AssetId {
        &self.handle.id
    }

    pub fn state(&self) -> &PoseState {
        &self.state
    }

    pub fn format(&self) -> &VertexFormat {
        &self.format
    }

    /// Pose to draw for a context: the context animation layered on the
    /// baked state's parent.
    pub fn effective_state(&self, context: &RenderContext) -> PoseState {
        let Some(animation) = &context.animation else {
            return self.state.clone();
        };
        match self.state.parent().unwrap_or(&self.state) {
            PoseState::Identity => animation.clone(),
            parent => PoseState::composed(parent.clone(), animation.clone()),
        }
    }

    /// Geometry for the context. Every triangle is general, so face culled
    /// requests get nothing.
    pub fn quads(
        &self,
        context: &RenderContext,
        side: Option<Facing>,
        _seed: u64,
    ) -> Arc<[BakedQuad]> {
        if side.is_some() {
            return Arc::from(Vec::new());
        }
        let state = self.effective_state(context);
        if state == self.state {
            return self.quads.clone();
        }
        let capacity = self.handle.params.pose_cache_capacity;
        if capacity == 0 {
            return self.bake_state(&state).into();
        }

        let mut poses = self.poses.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(quads) = poses.get(&state) {
            return quads.clone();
        }
        let quads: Arc<[BakedQuad]> = self.bake_state(&state).into();
        if poses.len() >= capacity {
            debug!("Pose cache of {} full, clearing", self.handle.id);
            poses.clear();
        }
        poses.insert(state, quads.clone());
        quads
    }

    /// Number of extra poses currently remembered.
    pub fn cached_poses(&self) -> usize {
        self.poses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn particle_texture(&self) -> &Arc<dyn Sprite> {
        self.textures.particle()
    }

    pub fn handle_perspective(&self, kind: ViewTransformKind) -> (&Self, Mat4) {
        let matrix = self
            .handle
            .params
            .view_transforms
            .get(&kind)
            .map(|transform| Mat4::from(*transform))
            .unwrap_or(Mat4::IDENTITY);
        (self, matrix)
    }

    pub fn is_ambient_occlusion(&self) -> bool {
        self.handle.params.ambient_occlusion
    }

    pub fn is_gui3d(&self) -> bool {
        self.handle.params.gui3d
    }

    pub fn is_builtin_renderer(&self) -> bool {
        false
    }

    pub fn diagnostics(&self) -> &[BakeDiagnostic] {
        self.textures.diagnostics()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use glam::{Mat4, Vec3};

    use super::{fallback_id, ModelCache, RenderContext};
    use crate::{
        bake::{
            facing::Facing, format::VertexFormat, sprite::test::tiled_lookup,
            view::ViewTransformKind,
        },
        index::AssetId,
        loader::{text::test::LAMP, LoaderParams},
        pose::PoseState,
        source::MemorySource,
        transform::DecomposedTransform,
    };

    const LAMP_ID: &str = "demo:models/block/lamp.md5mesh";

    fn cache(params: LoaderParams) -> ModelCache<MemorySource> {
        let mut source = MemorySource::new();
        source.insert(LAMP_ID, LAMP);
        let mut cache = ModelCache::new(source, params);
        cache.add_namespace("Demo");
        cache
    }

    #[test]
    fn test_fallback_id() {
        let id = AssetId::parse("demo:models/block/lamp.md5mesh");
        assert_eq!(
            fallback_id(&id),
            Some(AssetId::parse("demo:models/item/lamp.md5mesh"))
        );
        assert_eq!(fallback_id(&fallback_id(&id).unwrap()), Some(id));
        assert_eq!(
            fallback_id(&AssetId::parse("demo:models/lamp.md5mesh")),
            None
        );
    }

    #[test]
    fn test_accepts() {
        let cache = cache(LoaderParams::default());
        assert!(cache.accepts(&AssetId::parse(LAMP_ID)));
        assert!(cache.accepts(&AssetId::parse("DEMO:models/item/lamp.MD5B")));
        assert!(!cache.accepts(&AssetId::parse("demo:models/block/lamp.obj")));
        assert!(!cache.accepts(&AssetId::parse("other:models/block/lamp.md5mesh")));
        assert!(!cache.accepts(&AssetId::parse("demo:models/block.md5mesh/lamp")));
    }

    #[test]
    fn test_handle() {
        let mut cache = cache(LoaderParams::default());
        let handle = cache.load(&AssetId::parse(LAMP_ID)).unwrap();
        assert_eq!(handle.clip().map(|clip| clip.name.as_str()), Some("swing"));
        assert!(handle.with_clip("swing").is_some());
        assert!(handle.with_clip("jump").is_none());
        assert_eq!(handle.default_state(), PoseState::Identity);
        assert_eq!(
            handle.texture_references(),
            vec![AssetId::parse("demo:blocks/lamp")]
        );
    }

    #[test]
    fn test_effective_state() {
        let mut cache = cache(LoaderParams::default());
        let handle = cache.load(&AssetId::parse(LAMP_ID)).unwrap();
        let format = VertexFormat::block();
        let animation = PoseState::ExplicitFrame(1);
        let context = RenderContext {
            animation: Some(animation.clone()),
        };

        let mut requests = Vec::new();
        let identity = handle.bake(PoseState::Identity, &format, tiled_lookup(&mut requests));
        assert_eq!(
            identity.effective_state(&RenderContext::default()),
            PoseState::Identity
        );
        assert_eq!(identity.effective_state(&context), animation);

        let base = PoseState::ExplicitFrame(0);
        let framed = handle.bake(base.clone(), &format, tiled_lookup(&mut requests));
        assert_eq!(
            framed.effective_state(&context),
            PoseState::composed(base.clone(), animation.clone())
        );

        let composed = handle.bake(
            PoseState::composed(base.clone(), PoseState::ExplicitFrame(1)),
            &format,
            tiled_lookup(&mut requests),
        );
        assert_eq!(
            composed.effective_state(&context),
            PoseState::composed(base, animation.clone())
        );

        let over_identity = handle.bake(
            PoseState::composed(PoseState::Identity, PoseState::ExplicitFrame(0)),
            &format,
            tiled_lookup(&mut requests),
        );
        assert_eq!(over_identity.effective_state(&context), animation);
    }

    #[test]
    fn test_quads_per_pose() {
        let mut cache = cache(LoaderParams {
            pose_cache_capacity: 2,
            ..LoaderParams::default()
        });
        let handle = cache.load(&AssetId::parse(LAMP_ID)).unwrap();
        let format = VertexFormat::block();
        let mut requests = Vec::new();
        let baked = handle.bake(PoseState::Identity, &format, tiled_lookup(&mut requests));

        let rest = baked.quads(&RenderContext::default(), None, 0);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].face, Facing::South);
        assert!(baked.quads(&RenderContext::default(), Some(Facing::Up), 0).is_empty());
        assert_eq!(baked.cached_poses(), 0);

        let context = |frame| RenderContext {
            animation: Some(PoseState::ExplicitFrame(frame)),
        };
        let posed = baked.quads(&context(0), None, 0);
        // the shade joint lifts the apex by half a unit at frame 0
        assert!(posed[0].vertices[1].elements[0]
            .truncate()
            .abs_diff_eq(Vec3::new(0.0, 1.25, 0.0), 1e-5));
        assert!(rest[0].vertices[1].elements[0]
            .truncate()
            .abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-5));
        assert!(Arc::ptr_eq(&posed, &baked.quads(&context(0), None, 0)));
        assert_eq!(baked.cached_poses(), 1);

        baked.quads(&context(1), None, 0);
        assert_eq!(baked.cached_poses(), 2);
        baked.quads(&context(2), None, 0);
        assert_eq!(baked.cached_poses(), 1);
    }

    #[test]
    fn test_pose_cache_disabled() {
        let mut cache = cache(LoaderParams {
            pose_cache_capacity: 0,
            ..LoaderParams::default()
        });
        let handle = cache.load(&AssetId::parse(LAMP_ID)).unwrap();
        let mut requests = Vec::new();
        let baked = handle.bake(
            PoseState::Identity,
            &VertexFormat::block(),
            tiled_lookup(&mut requests),
        );
        let context = RenderContext {
            animation: Some(PoseState::ExplicitFrame(0)),
        };
        let first = baked.quads(&context, None, 0);
        let second = baked.quads(&context, None, 0);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(baked.cached_poses(), 0);
    }

    #[test]
    fn test_model_flags() {
        let scale = DecomposedTransform {
            scale: Vec3::splat(0.5),
            ..DecomposedTransform::IDENTITY
        };
        let mut params = LoaderParams {
            ambient_occlusion: false,
            ..LoaderParams::default()
        };
        params.view_transforms.insert(ViewTransformKind::Gui, scale);
        let mut cache = cache(params);
        let handle = cache.load(&AssetId::parse(LAMP_ID)).unwrap();
        let mut requests = Vec::new();
        let baked = handle.bake(
            PoseState::Identity,
            &VertexFormat::item(),
            tiled_lookup(&mut requests),
        );
        assert!(!baked.is_ambient_occlusion());
        assert!(baked.is_gui3d());
        assert!(!baked.is_builtin_renderer());
        assert!(baked.diagnostics().is_empty());
        assert_eq!(baked.particle_texture().name(), "blocks/lamp");
        assert_eq!(
            baked.handle_perspective(ViewTransformKind::Gui).1,
            Mat4::from_scale(Vec3::splat(0.5))
        );
        assert_eq!(
            baked.handle_perspective(ViewTransformKind::Ground).1,
            Mat4::IDENTITY
        );
    }
}
