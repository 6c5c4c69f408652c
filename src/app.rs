//! Main application state and UI
//!
//! The scene shell: owns the render context, queues operator intents from
//! the UI, and pumps the compositor and fade controller once per frame so
//! material swaps only ever happen on frame boundaries. A live preview of
//! the installed composite renders off-screen and is shown through egui.

use std::sync::Arc;
use std::time::Instant;

use eframe::egui;

use crate::command::SceneCommand;
use crate::composite::{fullscreen_quad, BlendProfile, CompositeMaterial, Compositor, Vertex};
use crate::config::ViewerConfig;
use crate::scene::{EyeSide, RenderContext, MATERIAL_CORNEA, MATERIAL_IRIS, MATERIAL_SCLERA};
use crate::visibility::{FadeController, FadePhase, VisibilityGroup};

/// Group of anterior surfaces hidden for fundus inspection.
pub const ANTERIOR_GROUP: &str = "anterior";

const PREVIEW_SIZE: u32 = 1024;

/// Off-screen target the current composite is drawn into for display.
struct PreviewPane {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    /// Kept alive for the registered view's whole lifetime
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    vertex_buffer: wgpu::Buffer,
    texture_id: egui::TextureId,
}

impl PreviewPane {
    fn new(render_state: &eframe::egui_wgpu::RenderState) -> Self {
        let device = render_state.device.clone();
        let queue = render_state.queue.clone();

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Preview Texture"),
            size: wgpu::Extent3d {
                width: PREVIEW_SIZE,
                height: PREVIEW_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let vertices = fullscreen_quad();
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Preview Vertex Buffer"),
            size: (std::mem::size_of::<Vertex>() * vertices.len()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&vertex_buffer, 0, bytemuck::cast_slice(&vertices));

        let texture_id = render_state.renderer.write().register_native_texture(
            &device,
            &view,
            wgpu::FilterMode::Linear,
        );

        Self {
            device,
            queue,
            _texture: texture,
            view,
            vertex_buffer,
            texture_id,
        }
    }

    /// Draw the composite onto the preview target.
    fn render(&self, material: &CompositeMaterial) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Preview Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Preview Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            material.draw(&mut pass, &self.vertex_buffer, 6);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Main application state.
pub struct FundusViewerApp {
    config: ViewerConfig,
    context: RenderContext,
    compositor: Compositor,
    fades: FadeController,

    /// Intents queued by UI widgets, dispatched at the next frame boundary
    commands: Vec<SceneCommand>,
    inspection: bool,

    preview: Option<PreviewPane>,
    last_update: Instant,
}

impl FundusViewerApp {
    /// Create the application and kick off the first composite.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: ViewerConfig,
        mut compositor: Compositor,
    ) -> Self {
        log::info!("Initializing Fundus Viewer...");

        let context = RenderContext::new(EyeSide::Left);

        let preview = if let Some(render_state) = cc.wgpu_render_state.as_ref() {
            compositor.initialize(
                render_state.device.clone(),
                render_state.queue.clone(),
                wgpu::TextureFormat::Rgba8UnormSrgb,
            );
            Some(PreviewPane::new(render_state))
        } else {
            log::warn!("WGPU render state not available - compositing will be inactive");
            None
        };

        let mut fades = FadeController::new();
        fades.add_group(VisibilityGroup::new(
            ANTERIOR_GROUP,
            &[MATERIAL_SCLERA, MATERIAL_IRIS, MATERIAL_CORNEA],
            config.fade_duration,
        ));

        compositor.switch_context(
            config.base_image_for(context.side()),
            context.generation(),
        );

        Self {
            config,
            context,
            compositor,
            fades,
            commands: Vec::new(),
            inspection: false,
            preview,
            last_update: Instant::now(),
        }
    }

    /// Apply one operator intent to the core components.
    fn handle_command(&mut self, command: SceneCommand) {
        match command {
            SceneCommand::ToggleOverlay { path, weight } => {
                self.compositor.toggle_overlay(&path, weight);
            }
            SceneCommand::SwitchSide { side } => {
                if side != self.context.side() {
                    self.context.switch_side(side);
                    self.compositor.switch_context(
                        self.config.base_image_for(side),
                        self.context.generation(),
                    );
                }
            }
            SceneCommand::EnterInspection => {
                self.inspection = true;
                if let Some(group) = self.fades.group_mut(ANTERIOR_GROUP) {
                    group.hide();
                }
                // Viewed from inside, mask-like overlays need the near-black
                // base keyed out so the background shows through.
                self.compositor.set_blend_profile(BlendProfile::BlackKey);
            }
            SceneCommand::ToggleGroupVisibility { group } => {
                if let Some(group) = self.fades.group_mut(&group) {
                    group.toggle();
                }
            }
        }
    }

    fn show_controls(&mut self, ui: &mut egui::Ui) {
        let mut queued: Vec<SceneCommand> = Vec::new();

        ui.heading("Fundus Viewer");
        ui.separator();

        ui.label("Eye");
        ui.horizontal(|ui| {
            for side in [EyeSide::Left, EyeSide::Right] {
                if ui
                    .selectable_label(self.context.side() == side, side.label())
                    .clicked()
                {
                    queued.push(SceneCommand::SwitchSide { side });
                }
            }
        });

        ui.separator();
        ui.label("Overlays");
        for preset in &self.config.overlays {
            let active = self.compositor.overlays().contains(&preset.path);
            if ui.selectable_label(active, &preset.label).clicked() {
                queued.push(SceneCommand::ToggleOverlay {
                    path: preset.path.clone(),
                    weight: preset.weight,
                });
            }
        }
        if ui.button("Load overlay…").clicked() {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("image", &["png", "jpg", "jpeg"])
                .pick_file()
            {
                queued.push(SceneCommand::ToggleOverlay {
                    path: path.to_string_lossy().to_string(),
                    weight: self.config.default_overlay_weight,
                });
            }
        }

        ui.separator();
        if ui.button("Inspect fundus").clicked() {
            queued.push(SceneCommand::EnterInspection);
        }
        if self.inspection {
            ui.label("inspection mode: anterior hidden, black keyed out");
        }
        if ui.button("Toggle anterior surfaces").clicked() {
            queued.push(SceneCommand::ToggleGroupVisibility {
                group: ANTERIOR_GROUP.to_string(),
            });
        }
        for group in self.fades.groups() {
            let phase = match group.phase() {
                FadePhase::Hidden => "hidden",
                FadePhase::FadingIn => "fading in",
                FadePhase::Visible => "visible",
                FadePhase::FadingOut => "fading out",
            };
            ui.label(format!("{}: {phase}", group.name()));
            ui.add(egui::ProgressBar::new(group.opacity()).show_percentage());
        }

        ui.separator();
        if ui.button("Save settings").clicked() {
            if let Err(e) = self.config.save(std::path::Path::new("fundus-viewer.json")) {
                log::error!("failed to save config: {e}");
            }
        }

        ui.separator();
        ui.label(format!(
            "{} overlay(s) active",
            self.compositor.overlays().len()
        ));
        if self.compositor.is_settling() {
            ui.label(format!(
                "compositing… ({} load(s) pending)",
                self.compositor.pending_loads()
            ));
        }

        self.commands.extend(queued);
    }

    fn show_preview(&self, ui: &mut egui::Ui) {
        if let Some(preview) = &self.preview {
            if self.compositor.current_material().is_some() {
                let side = ui.available_width().min(ui.available_height());
                ui.centered_and_justified(|ui| {
                    ui.image((preview.texture_id, egui::Vec2::splat(side)));
                });
                return;
            }
        }
        ui.centered_and_justified(|ui| {
            ui.label("Waiting for the first composite…");
        });
    }
}

impl eframe::App for FundusViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let dt = self.last_update.elapsed().as_secs_f32();
        self.last_update = Instant::now();

        // Frame boundary: dispatch intents, then let the compositor swap
        // materials before anything draws.
        let commands = std::mem::take(&mut self.commands);
        for command in commands {
            self.handle_command(command);
        }

        self.compositor.update(&mut self.context);
        self.fades.update(dt, &mut self.context);

        if let (Some(preview), Some(material)) =
            (&self.preview, self.compositor.current_material())
        {
            preview.render(material);
        }

        egui::SidePanel::left("controls")
            .default_width(260.0)
            .show(ctx, |ui| self.show_controls(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.show_preview(ui));

        // Fades animate without input events.
        ctx.request_repaint();
    }
}
