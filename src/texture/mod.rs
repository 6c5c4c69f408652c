//! Texture loading and caching
//!
//! Decodes overlay and base images on background tasks and surfaces the
//! results as events drained on frame boundaries. Accepts file paths and
//! `data:` URIs interchangeably.

mod gpu;

pub use gpu::GpuTexture;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

/// Errors raised while resolving an image source.
#[derive(Debug, Error)]
pub enum TextureError {
    /// The file could not be read
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The bytes were read but could not be decoded as an image
    #[error("decode error: {0}")]
    Decode(#[from] image::ImageError),
    /// The source looked like a data URI but was malformed
    #[error("malformed data uri: {0}")]
    DataUri(String),
    /// The loader's background runtime could not be created
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// A decoded RGBA8 image ready for GPU upload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Decode from an encoded image byte stream (PNG, JPEG, ...).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TextureError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }
}

/// Completion event for one requested source.
#[derive(Debug)]
pub enum LoadEvent {
    /// The source decoded successfully
    Loaded {
        path: String,
        image: Arc<DecodedImage>,
    },
    /// The source could not be read or decoded
    Failed { path: String, error: TextureError },
}

impl LoadEvent {
    /// The source key this event belongs to.
    pub fn path(&self) -> &str {
        match self {
            LoadEvent::Loaded { path, .. } | LoadEvent::Failed { path, .. } => path,
        }
    }
}

/// Asynchronous image loader with an in-memory cache.
///
/// `request` is idempotent: a source that is cached or already in flight is
/// not fetched again, so two composites racing on the same path can never
/// resolve it into inconsistent slots.
pub struct TextureLoader {
    runtime: tokio::runtime::Runtime,
    tx: Sender<LoadEvent>,
    rx: Receiver<LoadEvent>,
    in_flight: HashSet<String>,
    cache: HashMap<String, Arc<DecodedImage>>,
}

impl TextureLoader {
    /// Create a loader with its own background runtime.
    pub fn new() -> Result<Self, TextureError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| TextureError::Runtime(e.to_string()))?;
        let (tx, rx) = crossbeam_channel::unbounded();
        Ok(Self {
            runtime,
            tx,
            rx,
            in_flight: HashSet::new(),
            cache: HashMap::new(),
        })
    }

    /// Look up a previously resolved source.
    pub fn get(&self, path: &str) -> Option<Arc<DecodedImage>> {
        self.cache.get(path).cloned()
    }

    /// True if the source is resolved in the cache.
    pub fn is_resolved(&self, path: &str) -> bool {
        self.cache.contains_key(path)
    }

    /// Begin resolving a source unless it is cached or already in flight.
    pub fn request(&mut self, path: &str) {
        if self.cache.contains_key(path) || self.in_flight.contains(path) {
            return;
        }
        self.in_flight.insert(path.to_string());

        let tx = self.tx.clone();
        let path = path.to_string();
        self.runtime.spawn(async move {
            let event = match fetch_bytes(&path).await.and_then(|bytes| {
                DecodedImage::from_bytes(&bytes)
            }) {
                Ok(image) => LoadEvent::Loaded {
                    path,
                    image: Arc::new(image),
                },
                Err(error) => LoadEvent::Failed { path, error },
            };
            // The receiver disappearing just means the loader was dropped.
            let _ = tx.send(event);
        });
    }

    /// Drain completion events, updating the cache.
    ///
    /// Call once per frame; loads never complete mid-frame.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            self.in_flight.remove(event.path());
            if let LoadEvent::Loaded { path, image } = &event {
                self.cache.insert(path.clone(), image.clone());
            }
            events.push(event);
        }
        events
    }

    /// Number of sources still being resolved.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// Fetch the encoded bytes behind a path or data URI.
async fn fetch_bytes(path: &str) -> Result<Vec<u8>, TextureError> {
    if let Some(rest) = path.strip_prefix("data:") {
        let start = rest
            .find(";base64,")
            .ok_or_else(|| TextureError::DataUri("missing \";base64,\" marker".into()))?;
        let encoded = &rest[start + ";base64,".len()..];
        STANDARD
            .decode(encoded)
            .map_err(|e| TextureError::DataUri(e.to_string()))
    } else {
        Ok(tokio::fs::read(path).await?)
    }
}
