//! Material compositor
//!
//! Bridges asynchronous texture resolution with synchronous shader
//! regeneration. Every overlay-set change snapshots the set under a new
//! version; once all of a snapshot's sources have an outcome, the
//! compositor generates the program, builds the material, and installs it
//! on the target surfaces. Only the newest snapshot can install: an older
//! in-flight one is replaced wholesale, and resolutions arriving for it
//! merely warm the cache.
//!
//! All of this runs on the render thread between frames; the loader is the
//! only thing off-thread, and it communicates by events drained here.

use std::collections::HashMap;
use std::sync::Arc;

use super::material::CompositeMaterial;
use super::overlay_set::{OverlayEntry, OverlaySet, Toggle};
use super::shader_gen::{composite_shader, validate, BlendProfile, ShaderSource};
use super::snapshot::{CompositeSnapshot, PendingComposite};
use crate::error::CompositeError;
use crate::scene::RenderContext;
use crate::texture::{DecodedImage, GpuTexture, LoadEvent, TextureError, TextureLoader};

/// The settled, pre-GPU description of one composite: what `update` decided
/// to build. Kept for introspection; the UI shows the entry list and tests
/// assert on the generated program.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeBuild {
    pub version: u64,
    pub context: u64,
    pub base_path: String,
    pub entries: Vec<OverlayEntry>,
    pub shader: ShaderSource,
}

/// Orchestrates overlay toggles into installed composite materials.
pub struct Compositor {
    device: Option<Arc<wgpu::Device>>,
    queue: Option<Arc<wgpu::Queue>>,
    target_format: wgpu::TextureFormat,
    /// Material-name convention selecting the surfaces to install on
    target_material: String,
    profile: BlendProfile,

    loader: TextureLoader,
    overlays: OverlaySet,
    base_path: String,
    context: u64,
    next_version: u64,
    pending: Option<PendingComposite>,

    /// Base image captured once per context, immutable until the next switch
    base_image: Option<Arc<DecodedImage>>,
    base_texture: Option<Arc<GpuTexture>>,
    gpu_cache: HashMap<String, Arc<GpuTexture>>,

    current: Option<Arc<CompositeMaterial>>,
    last_build: Option<CompositeBuild>,
}

impl Compositor {
    /// Create a compositor targeting surfaces with the given material name.
    pub fn new(target_material: &str) -> Result<Self, TextureError> {
        Ok(Self {
            device: None,
            queue: None,
            target_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            target_material: target_material.to_string(),
            profile: BlendProfile::default(),
            loader: TextureLoader::new()?,
            overlays: OverlaySet::new(),
            base_path: String::new(),
            context: 0,
            next_version: 0,
            pending: None,
            base_image: None,
            base_texture: None,
            gpu_cache: HashMap::new(),
            current: None,
            last_build: None,
        })
    }

    /// Supply GPU handles and the render-target format.
    pub fn initialize(
        &mut self,
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        target_format: wgpu::TextureFormat,
    ) {
        self.device = Some(device);
        self.queue = Some(queue);
        self.target_format = target_format;
        log::info!("compositor initialized ({target_format:?})");
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some() && self.queue.is_some()
    }

    pub fn overlays(&self) -> &OverlaySet {
        &self.overlays
    }

    pub fn blend_profile(&self) -> BlendProfile {
        self.profile
    }

    /// Switch the fragment alpha mode; takes effect with the next composite.
    pub fn set_blend_profile(&mut self, profile: BlendProfile) {
        if self.profile != profile {
            self.profile = profile;
            self.request_composite();
        }
    }

    /// Toggle an overlay in or out and request a re-composite.
    pub fn toggle_overlay(&mut self, path: &str, weight: f32) {
        match self.overlays.toggle(path, weight) {
            Toggle::Added => log::info!("overlay added: {path} (weight {weight})"),
            Toggle::Removed => log::info!("overlay removed: {path}"),
        }
        self.request_composite();
    }

    /// Enter a new mesh context: the overlay set empties and the next
    /// composite captures a fresh base texture from `base_path`.
    ///
    /// `generation` is the render context's generation; snapshots carry it
    /// so an attempt from a discarded context can never install.
    pub fn switch_context(&mut self, base_path: &str, generation: u64) {
        self.overlays.clear();
        self.base_path = base_path.to_string();
        self.context = generation;
        self.base_image = None;
        self.base_texture = None;
        log::info!("compositor context {generation}: base {base_path}");
        self.request_composite();
    }

    /// The material most recently installed.
    pub fn current_material(&self) -> Option<&Arc<CompositeMaterial>> {
        self.current.as_ref()
    }

    /// The most recently settled composite description.
    pub fn last_build(&self) -> Option<&CompositeBuild> {
        self.last_build.as_ref()
    }

    /// Base image captured for the current context, if any composite has
    /// settled since the last switch.
    pub fn base_image(&self) -> Option<&Arc<DecodedImage>> {
        self.base_image.as_ref()
    }

    /// A snapshot is still waiting on texture resolutions.
    pub fn is_settling(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of sources still being decoded.
    pub fn pending_loads(&self) -> usize {
        self.loader.in_flight()
    }

    /// Snapshot the current set under the next version, superseding any
    /// in-flight snapshot (last writer wins).
    fn request_composite(&mut self) {
        self.next_version += 1;
        let snapshot = CompositeSnapshot {
            version: self.next_version,
            context: self.context,
            base_path: self.base_path.clone(),
            entries: self.overlays.entries().to_vec(),
        };

        let mut involved: Vec<String> = Vec::with_capacity(snapshot.entries.len() + 1);
        involved.push(snapshot.base_path.clone());
        involved.extend(snapshot.entries.iter().map(|e| e.path.clone()));

        let mut pending = PendingComposite::new(snapshot);
        for path in involved {
            if self.loader.is_resolved(&path) {
                pending.note_resolved(&path);
            } else {
                self.loader.request(&path);
            }
        }
        self.pending = Some(pending);
    }

    /// Frame-boundary pump: drain decode completions, and if the pending
    /// snapshot has settled, build and install its material.
    ///
    /// Returns the newly installed material, if this frame produced one.
    /// Failures never escape: a failed overlay was already dropped by the
    /// snapshot, and a failed base or rejected shader aborts the attempt
    /// while the previously installed material stays untouched.
    pub fn update(&mut self, ctx: &mut RenderContext) -> Option<Arc<CompositeMaterial>> {
        for event in self.loader.poll() {
            let Some(pending) = &mut self.pending else {
                // No snapshot wants this; it only warmed the cache.
                continue;
            };
            match event {
                LoadEvent::Loaded { path, .. } => pending.note_resolved(&path),
                LoadEvent::Failed { path, error } => {
                    if pending.involves(&path) {
                        let err = CompositeError::LoadFailure {
                            path: path.clone(),
                            source: error,
                        };
                        log::warn!("{err}; entry dropped from composite");
                        pending.note_failed(&path);
                    }
                    // A failure for a superseded snapshot or discarded
                    // context is stale; nothing to report.
                }
            }
        }

        match &self.pending {
            Some(pending) if pending.is_settled() => {}
            _ => return None,
        }
        let Some(pending) = self.pending.take() else {
            return None;
        };

        // Settled after its context was discarded: drop without comment.
        if pending.snapshot().context != ctx.generation() {
            return None;
        }

        let snapshot = pending.snapshot();
        if !pending.base_resolved() {
            log::error!(
                "base image {} failed to load; keeping previous material",
                snapshot.base_path
            );
            return None;
        }

        // Lazy one-time capture: the base of this context never changes
        // afterwards, even across overlay churn.
        if self.base_image.is_none() {
            self.base_image = self.loader.get(&snapshot.base_path);
        }

        let entries = pending.surviving_entries();
        let weights: Vec<f32> = entries.iter().map(|e| e.weight).collect();
        let shader = composite_shader(&weights, self.profile);

        let build = CompositeBuild {
            version: snapshot.version,
            context: snapshot.context,
            base_path: snapshot.base_path.clone(),
            entries: entries.clone(),
            shader: shader.clone(),
        };
        let version = build.version;
        self.last_build = Some(build);

        // Without GPU handles (startup frames, tests) the attempt ends at
        // the bookkeeping stage.
        let (Some(device), Some(queue)) = (self.device.clone(), self.queue.clone()) else {
            return None;
        };

        if let Err(e) = validate(&shader) {
            log::error!("composite v{version} aborted: {e}");
            return None;
        }

        if self.base_texture.is_none() {
            let Some(image) = self.base_image.as_ref() else {
                return None;
            };
            self.base_texture = Some(GpuTexture::upload(&device, &queue, image, "Base Texture"));
        }
        let Some(base) = self.base_texture.clone() else {
            return None;
        };

        let mut overlay_textures = Vec::with_capacity(entries.len());
        for entry in &entries {
            let texture = match self.gpu_cache.get(&entry.path) {
                Some(texture) => texture.clone(),
                None => {
                    let Some(image) = self.loader.get(&entry.path) else {
                        log::error!(
                            "composite v{version} aborted: {} vanished from the cache",
                            entry.path
                        );
                        return None;
                    };
                    let texture =
                        GpuTexture::upload(&device, &queue, &image, "Overlay Texture");
                    self.gpu_cache.insert(entry.path.clone(), texture.clone());
                    texture
                }
            };
            overlay_textures.push(texture);
        }

        let material = Arc::new(CompositeMaterial::new(
            &device,
            &queue,
            self.target_format,
            &shader,
            &base,
            &overlay_textures,
            version,
        ));
        let installed = ctx.install_material(&self.target_material, material.clone());
        log::info!(
            "composite v{version} installed on {installed} surface(s), {} overlay(s)",
            overlay_textures.len()
        );
        self.current = Some(material.clone());
        Some(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{EyeSide, MATERIAL_BACK};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::io::Cursor;
    use std::time::Duration;

    fn png_data_uri(rgba: [u8; 4]) -> String {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba(rgba));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(&bytes))
    }

    /// Pump updates until the pending snapshot settles.
    fn settle(comp: &mut Compositor, ctx: &mut RenderContext) {
        for _ in 0..500 {
            comp.update(ctx);
            if !comp.is_settling() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("composite never settled");
    }

    fn fresh() -> (Compositor, RenderContext, String) {
        let base = png_data_uri([40, 40, 40, 255]);
        let mut ctx = RenderContext::new(EyeSide::Left);
        let mut comp = Compositor::new(MATERIAL_BACK).unwrap();
        comp.switch_context(&base, ctx.generation());
        settle(&mut comp, &mut ctx);
        (comp, ctx, base)
    }

    #[test]
    fn test_initial_composite_is_base_only() {
        let (comp, _ctx, base) = fresh();
        let build = comp.last_build().unwrap();
        assert_eq!(build.base_path, base);
        assert!(build.entries.is_empty());
        assert!(!build.shader.fragment.contains("overlay_0"));
        assert!(comp.base_image().is_some());
    }

    #[test]
    fn test_double_toggle_restores_program_text() {
        let (mut comp, mut ctx, _base) = fresh();
        let a = png_data_uri([200, 0, 0, 255]);
        let b = png_data_uri([0, 200, 0, 255]);

        comp.toggle_overlay(&a, 1.0);
        settle(&mut comp, &mut ctx);
        let before = comp.last_build().unwrap().shader.clone();

        comp.toggle_overlay(&b, 0.5);
        comp.toggle_overlay(&b, 0.5);
        settle(&mut comp, &mut ctx);
        let after = comp.last_build().unwrap().shader.clone();

        assert_eq!(before, after);
    }

    #[test]
    fn test_unit_count_tracks_set_size() {
        let (mut comp, mut ctx, _base) = fresh();
        let a = png_data_uri([1, 0, 0, 255]);
        let b = png_data_uri([2, 0, 0, 255]);
        let c = png_data_uri([3, 0, 0, 255]);

        comp.toggle_overlay(&a, 1.0);
        comp.toggle_overlay(&b, 0.5);
        comp.toggle_overlay(&c, 0.25);
        comp.toggle_overlay(&b, 0.5);
        settle(&mut comp, &mut ctx);

        let build = comp.last_build().unwrap();
        assert_eq!(build.entries.len(), comp.overlays().len());
        assert_eq!(build.entries.len(), 2);
        assert!(build.shader.fragment.contains("overlay_1"));
        assert!(!build.shader.fragment.contains("overlay_2"));
    }

    #[test]
    fn test_failed_load_drops_only_that_entry() {
        let (mut comp, mut ctx, _base) = fresh();
        let a = png_data_uri([1, 0, 0, 255]);
        let c = png_data_uri([3, 0, 0, 255]);

        comp.toggle_overlay(&a, 1.0);
        comp.toggle_overlay("missing/overlay.png", 0.5);
        comp.toggle_overlay(&c, 0.25);
        settle(&mut comp, &mut ctx);

        let build = comp.last_build().unwrap();
        let paths: Vec<&str> = build.entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec![a.as_str(), c.as_str()]);
    }

    #[test]
    fn test_context_switch_clears_set_and_recaptures_base() {
        let (mut comp, mut ctx, left_base) = fresh();
        let a = png_data_uri([1, 0, 0, 255]);
        let b = png_data_uri([2, 0, 0, 255]);

        comp.toggle_overlay(&a, 1.0);
        comp.toggle_overlay(&b, 0.5);
        settle(&mut comp, &mut ctx);
        let left_capture = comp.base_image().unwrap().clone();

        let right_base = png_data_uri([90, 90, 90, 255]);
        ctx.switch_side(EyeSide::Right);
        comp.switch_context(&right_base, ctx.generation());
        assert!(comp.overlays().is_empty());

        settle(&mut comp, &mut ctx);
        let build = comp.last_build().unwrap();
        assert_eq!(build.context, ctx.generation());
        assert_eq!(build.base_path, right_base);
        assert!(build.entries.is_empty());

        let right_capture = comp.base_image().unwrap();
        assert_ne!(left_capture.pixels, right_capture.pixels);
        assert_ne!(left_base, right_base);
    }

    #[test]
    fn test_stale_snapshot_for_old_context_never_lands() {
        let (mut comp, mut ctx, _left_base) = fresh();
        let a = png_data_uri([1, 0, 0, 255]);
        comp.toggle_overlay(&a, 1.0);

        // The context moves on before the snapshot settles, without the
        // compositor being told (the race window). The settled attempt
        // must be discarded silently.
        ctx.switch_side(EyeSide::Right);
        let before = comp.last_build().cloned();
        settle(&mut comp, &mut ctx);
        assert_eq!(comp.last_build().cloned(), before);
    }

    #[test]
    fn test_blend_profile_change_regenerates() {
        let (mut comp, mut ctx, _base) = fresh();
        comp.set_blend_profile(BlendProfile::BlackKey);
        settle(&mut comp, &mut ctx);
        assert!(comp.last_build().unwrap().shader.fragment.contains("select"));
    }
}
