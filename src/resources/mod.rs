//! Loading of model assets.
//!
//! The viewer talks to loaders through the [`AssetLoader`] trait so hosts can
//! plug in their own fetching and decoding. [`FileAssetLoader`] is the
//! default: it fetches bytes (filesystem on native, HTTP relative to the page
//! on the web) and decodes glTF/GLB or OBJ/MTL depending on the extension.

use std::{path::PathBuf, rc::Rc};

use futures::future::LocalBoxFuture;

use crate::{
    data_structures::{animation::AnimationClip, scene_graph::SceneTree},
    loading::LoadProgress,
};

pub mod fetch;
pub mod gltf;
pub mod obj;

/// A decoded model: its scene graph and animation clips (possibly none).
#[derive(Debug, Default)]
pub struct LoadedAsset {
    pub scene: SceneTree,
    pub clips: Vec<AnimationClip>,
}

/// Receives advisory progress updates of a running load.
pub type ProgressFn = Rc<dyn Fn(LoadProgress)>;

pub trait AssetLoader {
    /// Starts loading `url`. The returned future is polled on the viewer's
    /// thread and may complete in any order relative to other loads.
    fn load(&self, url: &str, progress: ProgressFn) -> LocalBoxFuture<'static, anyhow::Result<LoadedAsset>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Gltf,
    Obj,
}

impl ModelFormat {
    /// Detects the format from the extension, ignoring query strings and fragments.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match extension.as_str() {
            "gltf" | "glb" => Some(ModelFormat::Gltf),
            "obj" => Some(ModelFormat::Obj),
            _ => None,
        }
    }

    /// Falls back to sniffing the GLB magic for extension-less URLs.
    pub fn detect(url: &str, bytes: &[u8]) -> Option<Self> {
        Self::from_url(url).or_else(|| bytes.starts_with(b"glTF").then_some(ModelFormat::Gltf))
    }
}

/// Loads models from the filesystem (native) or over HTTP (web).
#[derive(Clone, Debug)]
pub struct FileAssetLoader {
    root: PathBuf,
}

impl FileAssetLoader {
    /// Native paths are resolved below `./assets`.
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("./").join("assets"))
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(&self, url: &str) -> String {
        if cfg!(target_arch = "wasm32") || url.contains("://") {
            return url.to_string();
        }
        let path = std::path::Path::new(url);
        if path.is_absolute() {
            url.to_string()
        } else {
            self.root.join(path).to_string_lossy().into_owned()
        }
    }
}

impl Default for FileAssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLoader for FileAssetLoader {
    fn load(&self, url: &str, progress: ProgressFn) -> LocalBoxFuture<'static, anyhow::Result<LoadedAsset>> {
        let location = self.locate(url);
        Box::pin(async move {
            let bytes = fetch::load_binary(&location).await?;
            let size = bytes.len() as u64;
            progress(LoadProgress {
                loaded: size,
                total: Some(size),
            });
            match ModelFormat::detect(&location, &bytes) {
                Some(ModelFormat::Gltf) => gltf::parse_gltf(&bytes, &location).await,
                Some(ModelFormat::Obj) => {
                    let text = String::from_utf8(bytes)?;
                    obj::parse_obj(&text, &location).await
                }
                None => anyhow::bail!("unsupported model format: {}", location),
            }
        })
    }
}
