//! Deduplicated, hash-keyed resource cache with hot-reload (C2).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use log::{debug, warn};
use notify::{RecursiveMode, Watcher};

use crate::error::CacheError;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LoadFlags: u32 {
        /// Keep the decoded bytes around after decode (e.g. for re-upload on device loss).
        const RETAIN_FILE_DATA = 1 << 0;
        /// Flip the image vertically while decoding.
        const IMAGE_FLIP = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Shader,
    Sound,
}

fn resource_type_for_extension(ext: &str) -> Option<ResourceType> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "png" | "dds" | "tga" | "bmp" => Some(ResourceType::Image),
        "frag" | "vert" | "geom" | "comp" | "spv" => Some(ResourceType::Shader),
        "wav" | "ogg" => Some(ResourceType::Sound),
        _ => None,
    }
}

/// Decoded payload. Image decode always normalizes to RGBA8; shaders are kept as opaque bytes
/// (SPIR-V compile happens downstream, in the RHI layer); sound decoding is reserved.
#[derive(Debug)]
pub enum Payload {
    Image {
        width: u32,
        height: u32,
        rgba8: Vec<u8>,
    },
    Shader(Vec<u8>),
    Sound(Vec<u8>),
}

struct ResourceInner {
    name: String,
    hash: u64,
    payload: RwLock<Payload>,
    raw_bytes: RwLock<Option<Vec<u8>>>,
    generation: std::sync::atomic::AtomicU64,
}

/// A strong reference to a loaded resource. Cheap to clone (an `Arc` underneath).
#[derive(Clone)]
pub struct Resource(Option<Arc<ResourceInner>>);

impl Resource {
    fn valid(inner: Arc<ResourceInner>) -> Self {
        Self(Some(inner))
    }

    pub fn invalid() -> Self {
        Self(None)
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.as_ref().map(|i| i.name.as_str())
    }

    pub fn hash(&self) -> Option<u64> {
        self.0.as_ref().map(|i| i.hash)
    }

    /// Bumped every time the watcher re-runs a loader for this resource's hash.
    pub fn generation(&self) -> u64 {
        self.0
            .as_ref()
            .map(|i| i.generation.load(std::sync::atomic::Ordering::Acquire))
            .unwrap_or(0)
    }

    pub fn with_payload<R>(&self, f: impl FnOnce(&Payload) -> R) -> Option<R> {
        self.0.as_ref().map(|i| f(&i.payload.read().unwrap()))
    }
}

fn hash_name(name: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

fn decode(ty: ResourceType, name: &str, bytes: &[u8], flags: LoadFlags) -> Result<Payload, CacheError> {
    match ty {
        ResourceType::Image => decode_image(name, bytes, flags),
        ResourceType::Shader => Ok(Payload::Shader(bytes.to_vec())),
        ResourceType::Sound => Ok(Payload::Sound(bytes.to_vec())),
    }
}

/// Decodes jpg/jpeg/png/tga/bmp through `image`, normalizing every format to RGBA8 (§4.2,
/// §6). `dds` is routed through the same call; `image` does not decode it, so a `.dds` file
/// always surfaces as a decode failure here (no dedicated DDS codec is in this engine's
/// dependency stack — see DESIGN.md).
fn decode_image(name: &str, bytes: &[u8], flags: LoadFlags) -> Result<Payload, CacheError> {
    let dynamic = image::load_from_memory(bytes).map_err(|e| CacheError::Decode {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let mut rgba = dynamic.to_rgba8();
    let (width, height) = rgba.dimensions();
    if flags.contains(LoadFlags::IMAGE_FLIP) {
        image::imageops::flip_vertical_in_place(&mut rgba);
    }
    Ok(Payload::Image { width, height, rgba8: rgba.into_raw() })
}

struct Entry {
    weak: Weak<ResourceInner>,
}

/// Hash-keyed weak-reference cache. `load` returns an existing strong reference when the
/// weak slot still upgrades; otherwise it walks the search paths, decodes, and installs a
/// fresh strong reference. A directory watcher can be attached to force-reload resources
/// whose backing file changes on disk.
pub struct ResourceCache {
    search_paths: Vec<PathBuf>,
    entries: Mutex<HashMap<u64, Entry>>,
    name_by_hash: Mutex<HashMap<u64, String>>,
    _watcher: Mutex<Option<notify::RecommendedWatcher>>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("search_paths", &self.search_paths)
            .finish_non_exhaustive()
    }
}

impl ResourceCache {
    pub fn new(search_paths: Vec<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            search_paths,
            entries: Mutex::new(HashMap::new()),
            name_by_hash: Mutex::new(HashMap::new()),
            _watcher: Mutex::new(None),
        })
    }

    fn find_file(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_absolute() && direct.exists() {
            return Some(direct.to_path_buf());
        }
        self.search_paths
            .iter()
            .map(|base| base.join(name))
            .find(|p| p.exists())
    }

    pub fn load_file(&self, name: &str, flags: LoadFlags) -> Resource {
        let hash = hash_name(name);
        if let Some(existing) = self.upgrade(hash) {
            return existing;
        }
        match self.load_uncached(name, hash, flags) {
            Ok(resource) => resource,
            Err(err) => {
                warn!("resource cache: failed to load '{name}': {err}");
                Resource::invalid()
            }
        }
    }

    fn upgrade(&self, hash: u64) -> Option<Resource> {
        let entries = self.entries.lock().unwrap();
        entries.get(&hash).and_then(|e| e.weak.upgrade()).map(Resource::valid)
    }

    fn load_uncached(&self, name: &str, hash: u64, flags: LoadFlags) -> Result<Resource, CacheError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| CacheError::UnknownExtension(name.to_string()))?;
        let ty = resource_type_for_extension(ext).ok_or_else(|| CacheError::UnknownExtension(ext.to_string()))?;
        let path = self.find_file(name).ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        let bytes = std::fs::read(&path).map_err(|source| CacheError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let payload = decode(ty, name, &bytes, flags)?;
        let inner = Arc::new(ResourceInner {
            name: name.to_string(),
            hash,
            payload: RwLock::new(payload),
            raw_bytes: RwLock::new(if flags.contains(LoadFlags::RETAIN_FILE_DATA) { Some(bytes) } else { None }),
            generation: std::sync::atomic::AtomicU64::new(0),
        });
        self.entries.lock().unwrap().insert(hash, Entry { weak: Arc::downgrade(&inner) });
        self.name_by_hash.lock().unwrap().insert(hash, name.to_string());
        debug!("resource cache: loaded '{name}' ({:?}, hash={hash:#x})", ty);
        Ok(Resource::valid(inner))
    }

    /// Force a reload of `name` if a strong reference is still live, replacing its payload
    /// in place so existing `Resource` clones observe the new data.
    fn force_reload(self: &Arc<Self>, name: &str, flags: LoadFlags) {
        let hash = hash_name(name);
        let Some(resource) = self.upgrade(hash) else {
            return;
        };
        let Some(inner) = resource.0 else { return };
        match self.load_uncached_payload(name, flags) {
            Ok(payload) => {
                *inner.payload.write().unwrap() = payload;
                inner.generation.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
                debug!("resource cache: hot-reloaded '{name}'");
            }
            Err(err) => warn!("resource cache: hot-reload of '{name}' failed: {err}"),
        }
    }

    fn load_uncached_payload(&self, name: &str, flags: LoadFlags) -> Result<Payload, CacheError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| CacheError::UnknownExtension(name.to_string()))?;
        let ty = resource_type_for_extension(ext).ok_or_else(|| CacheError::UnknownExtension(ext.to_string()))?;
        let path = self.find_file(name).ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        let bytes = std::fs::read(&path).map_err(|source| CacheError::Io {
            path: path.display().to_string(),
            source,
        })?;
        decode(ty, name, &bytes, flags)
    }

    /// Start watching every search path for modifications. Bursts of events for the same file
    /// are coalesced by holding the event until `debounce` has passed with no further changes.
    pub fn watch(self: &Arc<Self>, debounce: Duration, flags: LoadFlags) -> notify::Result<()> {
        let cache = self.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = notify::RecommendedWatcher::new(tx, notify::Config::default())?;
        for path in &self.search_paths {
            let _ = watcher.watch(path, RecursiveMode::Recursive);
        }
        std::thread::spawn(move || {
            let mut pending: HashMap<PathBuf, std::time::Instant> = HashMap::new();
            loop {
                match rx.recv_timeout(debounce) {
                    Ok(Ok(event)) => {
                        for path in event.paths {
                            pending.insert(path, std::time::Instant::now());
                        }
                    }
                    Ok(Err(_)) => {}
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                }
                let now = std::time::Instant::now();
                let ready: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, t)| now.duration_since(**t) >= debounce)
                    .map(|(p, _)| p.clone())
                    .collect();
                for path in ready {
                    pending.remove(&path);
                    if let Some(name) = cache.name_for_path(&path) {
                        cache.force_reload(&name, flags);
                    }
                }
            }
        });
        *self._watcher.lock().unwrap() = Some(watcher);
        Ok(())
    }

    fn name_for_path(&self, path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        let names = self.name_by_hash.lock().unwrap();
        names.values().find(|n| n.as_str() == file_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture_image(dir: &Path, name: &str, w: u32, h: u32, fill: u8) -> PathBuf {
        let path = dir.join(name);
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([fill, fill, fill, 255]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn load_and_dedup_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_image(dir.path(), "a.png", 2, 2, 7);
        let cache = ResourceCache::new(vec![dir.path().to_path_buf()]);
        let r1 = cache.load_file("a.png", LoadFlags::empty());
        let r2 = cache.load_file("a.png", LoadFlags::empty());
        assert!(r1.is_valid());
        assert_eq!(r1.hash(), r2.hash());
    }

    #[test]
    fn missing_file_is_invalid() {
        let cache = ResourceCache::new(vec![PathBuf::from("/nonexistent")]);
        let r = cache.load_file("missing.png", LoadFlags::empty());
        assert!(!r.is_valid());
    }

    #[test]
    fn unknown_extension_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.unknown"), b"bytes").unwrap();
        let cache = ResourceCache::new(vec![dir.path().to_path_buf()]);
        let r = cache.load_file("x.unknown", LoadFlags::empty());
        assert!(!r.is_valid());
    }

    #[test]
    fn image_flip_reverses_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grad.png");
        // Row 0 = black, row 1 = white.
        let mut img = image::RgbaImage::new(2, 2);
        for x in 0..2 {
            img.put_pixel(x, 0, image::Rgba([0, 0, 0, 255]));
            img.put_pixel(x, 1, image::Rgba([0xFF, 0xFF, 0xFF, 255]));
        }
        img.save(&path).unwrap();
        let cache = ResourceCache::new(vec![dir.path().to_path_buf()]);
        let r = cache.load_file("grad.png", LoadFlags::IMAGE_FLIP);
        let top_row = r
            .with_payload(|p| match p {
                Payload::Image { rgba8, .. } => rgba8[0],
                _ => unreachable!(),
            })
            .unwrap();
        assert_eq!(top_row, 0xFF);
    }

    #[test]
    fn retain_file_data_flag_keeps_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_image(dir.path(), "b.png", 1, 1, 1);
        let cache = ResourceCache::new(vec![dir.path().to_path_buf()]);
        let r = cache.load_file("b.png", LoadFlags::RETAIN_FILE_DATA);
        let inner = r.0.unwrap();
        assert!(inner.raw_bytes.read().unwrap().is_some());
    }
}
