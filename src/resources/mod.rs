//! Loading settings files and model assets from the asset root.
//!
//! Every fetch goes through an [`AssetLoader`], which is constructed by the
//! host and handed to the configurator. Natively the default [`FileLoader`]
//! reads from a directory on disk; on the web it issues HTTP GETs relative
//! to the page.

use anyhow::Context as _;

pub mod glb;
pub mod obj;

pub use glb::load_model_glb;
pub use obj::load_model_obj;

/// Fetches raw asset bytes. Paths use `/` separators and are relative to the loader's root.
#[allow(async_fn_in_trait)]
pub trait AssetLoader {
    async fn load_string(&self, path: &str) -> anyhow::Result<String>;

    async fn load_binary(&self, path: &str) -> anyhow::Result<Vec<u8>>;
}

/// Reads assets from `root`: a directory natively, a URL prefix relative to the page on wasm32.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: String,
}

impl FileLoader {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    #[cfg(target_arch = "wasm32")]
    fn url(&self, file_name: &str) -> anyhow::Result<reqwest::Url> {
        let window = web_sys::window().context("No window available")?;
        let href = window
            .location()
            .href()
            .map_err(|e| anyhow::anyhow!("Could not read the page location: {:?}", e))?;
        let root = format!("{}/", self.root.trim_end_matches('/'));
        let base = reqwest::Url::parse(&href)?.join(&root)?;
        Ok(base.join(file_name)?)
    }
}

impl AssetLoader for FileLoader {
    async fn load_string(&self, path: &str) -> anyhow::Result<String> {
        #[cfg(target_arch = "wasm32")]
        let txt = {
            let url = self.url(path)?;
            reqwest::get(url).await?.error_for_status()?.text().await?
        };
        #[cfg(not(target_arch = "wasm32"))]
        let txt = {
            let path = std::path::Path::new(&self.root).join(path);
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Could not read {}", path.display()))?
        };

        Ok(txt)
    }

    async fn load_binary(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = self.url(path)?;
            reqwest::get(url)
                .await?
                .error_for_status()?
                .bytes()
                .await?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = {
            let path = std::path::Path::new(&self.root).join(path);
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("Could not read {}", path.display()))?
        };

        Ok(data)
    }
}

/// Splits `dir/name.ext` into `("dir/", "name.ext")`. The directory keeps its trailing slash.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    }
}

/// The material library that belongs to an OBJ file: same directory, same stem, `.mtl`.
pub fn mtl_path_for(obj_path: &str) -> String {
    let (dir, file) = split_path(obj_path);
    let stem = match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    };
    format!("{}{}.mtl", dir, stem)
}

/// Resolves `relative` against the directory of `base`.
pub fn sibling_path(base: &str, relative: &str) -> String {
    let (dir, _) = split_path(base);
    format!("{}{}", dir, relative)
}

/// Decodes an image file into RGBA8, e.g. a diffuse map referenced by a material.
pub fn decode_texture(bytes: &[u8], label: &str) -> anyhow::Result<image::RgbaImage> {
    let img = image::load_from_memory(bytes)
        .with_context(|| format!("Could not decode texture {}", label))?;
    Ok(img.to_rgba8())
}

/// Fetches and decodes a texture, logging and skipping it if either step fails.
pub(crate) async fn load_texture_or_skip(
    loader: &impl AssetLoader,
    path: &str,
) -> Option<image::RgbaImage> {
    let result = match loader.load_binary(path).await {
        Ok(bytes) => decode_texture(&bytes, path),
        Err(e) => Err(e),
    };
    match result {
        Ok(img) => Some(img),
        Err(e) => {
            log::warn!("Texture {} could not be loaded and is skipped: {:#}", path, e);
            None
        }
    }
}
