use std::sync::{Arc, Weak};

use chrono::Utc;
use glam::Vec3;
use image::RgbaImage;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::alignment::{AlignmentInput, ModelBounds, SpatialAligner, SpatialTransform};
use crate::config::{DebugFlags, PipelineSettings, SegmentationParams};
use crate::error::{PipelineError, PipelineResult};
use crate::geometry::{carve_alpha, overlay_mesh, OverlayMesh};
use crate::models::{
    BaseImage, ImagePoint, ImageSize, Mask, MaskBounds, PipelineStatus, SessionSnapshot,
};
use crate::scene::{ComposedScene, SceneComposer, SceneResources};
use crate::segmentation::{filter_masks, MaskSelector};
use crate::services::{
    encode_png, final_image_url, PipelineBackend, ReconstructionRequest, SegmentationRequest,
};
use crate::{log_debug, log_error, log_info, log_warn};

use super::debounce::CoalescingTimer;
use super::events::{PipelineEvent, Stage, EVENT_CAPACITY};
use super::state::{MaskSet, ReconstructedModel, SessionState};

const ENABLE_LOGS: bool = true;

/// Everything behind the coordinator's lock.
struct Pipeline {
    session: SessionState,
    settings: PipelineSettings,
    composer: SceneComposer,
    aligner: SpatialAligner,
    debounce: CoalescingTimer<u64>,
    /// The one live reconstruction. Replaced, never queued.
    reconstruction: Option<CancellationToken>,
}

impl Pipeline {
    fn cancel_reconstruction(&mut self) {
        if let Some(token) = self.reconstruction.take() {
            token.cancel();
        }
    }

    fn image_size(&self) -> Option<ImageSize> {
        self.session.image.as_ref().map(BaseImage::size)
    }

    fn current_transform(&mut self) -> Option<SpatialTransform> {
        let model = self.session.displayed_model()?;
        let image_size = self.session.image.as_ref()?.size();
        let placement = self.settings.placement;

        let input = AlignmentInput {
            mask_bounds: model.mask_bounds,
            image_size,
            model_bounds: model.bounds,
            flip_x: placement.flip_x,
            vertical_adjustment: placement.vertical_adjustment,
            rotation: Vec3::from_array(placement.rotation),
        };

        match self.aligner.align(input) {
            Ok(transform) => Some(transform),
            Err(err) => {
                log_warn!("cannot place model: {}", err);
                None
            }
        }
    }

    fn compose(&mut self) -> ComposedScene {
        let transform = self.current_transform();
        self.composer.compose(transform.as_ref(), self.settings.debug)
    }

    fn seed_auto_prompts(&mut self) -> usize {
        let count = self.settings.auto_prompt_points;
        let Some(size) = self.image_size() else {
            return 0;
        };
        if count == 0 {
            return 0;
        }
        let mut rng = rand::thread_rng();
        self.session.prompts.seed_random(size, count, &mut rng)
    }
}

struct Shared<B> {
    backend: B,
    pipeline: Mutex<Pipeline>,
    events: broadcast::Sender<PipelineEvent>,
}

/// Drives one interactive session: point prompts in, placed model out.
///
/// Segmentation is debounced and superseded by epoch; a late response for an
/// older point list is dropped on arrival. Reconstruction is cancelled
/// outright through a single token slot whenever a newer one starts.
pub struct PipelineController<B: PipelineBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: PipelineBackend> Clone for PipelineController<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: PipelineBackend> PipelineController<B> {
    pub fn new(backend: B, resources: Box<dyn SceneResources>, settings: PipelineSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let window = settings.debounce_window();

        let shared = Arc::new_cyclic(|weak: &Weak<Shared<B>>| {
            let weak = weak.clone();
            let debounce = CoalescingTimer::new(window, move |epoch: u64| {
                if let Some(shared) = weak.upgrade() {
                    let controller = PipelineController { shared };
                    tokio::spawn(controller.run_segmentation(epoch));
                }
            });

            Shared {
                backend,
                pipeline: Mutex::new(Pipeline {
                    session: SessionState::new(),
                    settings,
                    composer: SceneComposer::new(resources),
                    aligner: SpatialAligner::new(),
                    debounce,
                    reconstruction: None,
                }),
                events,
            }
        });

        Self { shared }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.shared.pipeline.lock().await.session.snapshot()
    }

    pub async fn settings(&self) -> PipelineSettings {
        self.shared.pipeline.lock().await.settings.clone()
    }

    pub async fn scene(&self) -> ComposedScene {
        self.shared.pipeline.lock().await.compose()
    }

    /// Generates an image from `prompt` and starts a session on the final one.
    pub async fn generate_image(&self, prompt: &str) -> PipelineResult<SessionSnapshot> {
        match self.fetch_generated(prompt).await {
            Ok((bytes, url)) => self.load_image(bytes, Some(url)).await,
            Err(err) => {
                self.report_failure(Stage::ImageGeneration, &err);
                Err(err)
            }
        }
    }

    async fn fetch_generated(&self, prompt: &str) -> PipelineResult<(Vec<u8>, String)> {
        let urls = self.shared.backend.generate_image(prompt.to_string()).await?;
        let url = final_image_url(urls)?;
        log_info!("fetching generated image {}", url);
        let bytes = self.shared.backend.fetch_image(url.clone()).await?;
        Ok((bytes, url))
    }

    /// Starts a new session on `bytes`. A decode failure leaves the current
    /// session untouched.
    pub async fn load_image(
        &self,
        bytes: Vec<u8>,
        source_url: Option<String>,
    ) -> PipelineResult<SessionSnapshot> {
        let decoded = tokio::task::spawn_blocking(move || BaseImage::decode(bytes, source_url))
            .await
            .map_err(|err| PipelineError::decode("base image", err));

        let image = match decoded {
            Ok(Ok(image)) => image,
            Ok(Err(err)) | Err(err) => {
                self.report_failure(Stage::ImageLoad, &err);
                return Err(err);
            }
        };

        let mut guard = self.shared.pipeline.lock().await;
        let pipeline = &mut *guard;

        pipeline.debounce.cancel();
        pipeline.cancel_reconstruction();
        pipeline.aligner.invalidate();
        pipeline.composer.set_base_image(image.pixels());

        let size = image.size();
        let session_id = pipeline.session.begin(image);
        log_info!("session {} started on {} image", session_id, size);

        self.emit(PipelineEvent::MasksUpdated {
            masks: Vec::new(),
            selected: None,
        });
        self.set_status(pipeline, PipelineStatus::Idle);

        let seeded = pipeline.seed_auto_prompts();
        if seeded > 0 {
            log_debug!("seeded {} random prompt point(s)", seeded);
            self.schedule_segmentation(pipeline);
        }

        self.publish_scene(pipeline);
        Ok(pipeline.session.snapshot())
    }

    /// Records a click and restarts the debounce window. Returns the number
    /// of points now in the prompt.
    pub async fn add_point(&self, point: ImagePoint) -> usize {
        let mut guard = self.shared.pipeline.lock().await;
        let pipeline = &mut *guard;

        pipeline.session.prompts.add_point(point);
        self.schedule_segmentation(pipeline);
        pipeline.session.prompts.points().len()
    }

    /// Overrides the automatic choice. Ignored while a newer mask set is
    /// pending or when `index` is out of range.
    pub async fn select_mask(&self, index: usize) -> bool {
        self.select_with(|masks| MaskSelector::select_explicit(masks, index))
            .await
    }

    /// Selects the best-scoring mask under `point`.
    pub async fn select_mask_at(&self, point: ImagePoint) -> bool {
        self.select_with(|masks| MaskSelector::select_at(masks, point))
            .await
    }

    pub async fn set_flip_x(&self, flip_x: bool) -> ComposedScene {
        self.update_view(|settings| settings.placement.flip_x = flip_x)
            .await
    }

    pub async fn set_vertical_adjustment(&self, adjustment: f32) -> ComposedScene {
        self.update_view(|settings| settings.placement.vertical_adjustment = adjustment)
            .await
    }

    pub async fn set_rotation(&self, rotation: Vec3) -> ComposedScene {
        self.update_view(|settings| settings.placement.rotation = rotation.to_array())
            .await
    }

    pub async fn set_debug_flags(&self, flags: DebugFlags) -> ComposedScene {
        self.update_view(|settings| settings.debug = flags).await
    }

    /// Swaps in reloaded settings. Endpoints are fixed by the backend and
    /// are not re-read here.
    pub async fn apply_settings(&self, settings: PipelineSettings) -> ComposedScene {
        let mut guard = self.shared.pipeline.lock().await;
        let pipeline = &mut *guard;

        pipeline.debounce.set_window(settings.debounce_window());
        pipeline.settings = settings;
        self.publish_scene(pipeline)
    }

    pub async fn set_viewport(&self, width: u32, height: u32) -> ComposedScene {
        let mut guard = self.shared.pipeline.lock().await;
        let pipeline = &mut *guard;

        pipeline.composer.set_viewport(width, height);
        self.publish_scene(pipeline)
    }

    /// Stops the pending debounce and any live reconstruction.
    pub async fn shutdown(&self) {
        let mut guard = self.shared.pipeline.lock().await;
        guard.debounce.cancel();
        guard.cancel_reconstruction();
    }

    async fn select_with(&self, pick: impl FnOnce(&[Arc<Mask>]) -> Option<usize>) -> bool {
        let (index, mask, size, mask_epoch) = {
            let guard = self.shared.pipeline.lock().await;
            if guard.session.status.is_segmenting() {
                return false;
            }
            let Some(index) = pick(guard.session.masks.masks()) else {
                return false;
            };
            let (Some(mask), Some(size)) = (guard.session.masks.get(index).cloned(), guard.image_size())
            else {
                return false;
            };
            (index, mask, size, guard.session.mask_epoch)
        };

        let overlay = match build_overlay(mask, size).await {
            Ok(overlay) => overlay,
            Err(err) => {
                log_error!("cannot outline mask {}: {}", index, err);
                return false;
            }
        };

        let mut guard = self.shared.pipeline.lock().await;
        let pipeline = &mut *guard;

        // The mask set may have moved on while the overlay was built.
        if pipeline.session.mask_epoch != mask_epoch || pipeline.session.status.is_segmenting() {
            log_debug!("selection of mask {} superseded", index);
            return false;
        }
        self.commit_selection(pipeline, index, Some(overlay));
        true
    }

    async fn update_view(&self, apply: impl FnOnce(&mut PipelineSettings)) -> ComposedScene {
        let mut guard = self.shared.pipeline.lock().await;
        let pipeline = &mut *guard;

        apply(&mut pipeline.settings);
        self.publish_scene(pipeline)
    }

    fn schedule_segmentation(&self, pipeline: &mut Pipeline) {
        // Masks for the old point list are about to be replaced, and so is
        // anything reconstructed from them.
        pipeline.cancel_reconstruction();
        let epoch = pipeline.session.bump_epoch();
        pipeline.debounce.schedule(epoch);
        self.set_status(pipeline, PipelineStatus::AwaitingDebounce);
    }

    async fn run_segmentation(self, epoch: u64) {
        let (request, image_size, params) = {
            let mut guard = self.shared.pipeline.lock().await;
            let pipeline = &mut *guard;

            if pipeline.session.epoch != epoch {
                log_debug!("debounce for epoch {} superseded", epoch);
                return;
            }

            let request = pipeline.session.image.as_ref().and_then(|image| {
                SegmentationRequest::new(
                    image.bytes(),
                    &pipeline.session.prompts,
                    &pipeline.settings.segmentation,
                )
                .map(|request| (request, image.size()))
            });

            match request {
                Some((request, size)) => {
                    self.set_status(pipeline, PipelineStatus::SegmentationInFlight);
                    (request, size, pipeline.settings.segmentation.clone())
                }
                None => {
                    log_warn!("nothing to segment: no image or no points");
                    self.set_status(pipeline, PipelineStatus::Idle);
                    return;
                }
            }
        };

        let prepared = match self.shared.backend.segment(request).await {
            Ok(masks) => {
                tokio::task::spawn_blocking(move || prepare_masks(masks, image_size, &params))
                    .await
                    .unwrap_or_else(|err| Err(PipelineError::decode("segmentation response", err)))
            }
            Err(err) => Err(err),
        };

        let mut guard = self.shared.pipeline.lock().await;
        let pipeline = &mut *guard;

        if pipeline.session.epoch != epoch {
            log_info!("discarding segmentation response for superseded epoch {}", epoch);
            return;
        }

        match prepared {
            Ok(prepared) => {
                log_info!("received {} mask(s) for epoch {}", prepared.masks.len(), epoch);
                pipeline.session.replace_masks(prepared.masks, epoch);
                self.commit_selection(pipeline, prepared.selected, prepared.overlay);
            }
            Err(err) => {
                self.report_failure(Stage::Segmentation, &err);
                self.set_status(pipeline, PipelineStatus::Idle);
            }
        }
    }

    fn commit_selection(
        &self,
        pipeline: &mut Pipeline,
        index: usize,
        overlay: Option<Arc<OverlayMesh>>,
    ) {
        pipeline.session.selected_mask = Some(index);
        pipeline.composer.set_overlay(overlay);

        self.emit(PipelineEvent::MasksUpdated {
            masks: pipeline.session.mask_summaries(),
            selected: pipeline.session.selected_mask,
        });
        self.set_status(pipeline, PipelineStatus::MaskReady);

        self.start_reconstruction(pipeline, index);
        self.publish_scene(pipeline);
    }

    fn start_reconstruction(&self, pipeline: &mut Pipeline, index: usize) {
        pipeline.cancel_reconstruction();

        let Some(mask) = pipeline.session.masks.get(index).cloned() else {
            return;
        };
        let Some(image) = pipeline.session.image.clone() else {
            return;
        };
        let Some(mask_bounds) = pipeline.session.masks.bounds(index) else {
            log_info!("mask {} skipped: mask has no set pixels", index);
            return;
        };

        let token = CancellationToken::new();
        pipeline.reconstruction = Some(token.clone());
        self.set_status(pipeline, PipelineStatus::ReconstructionInFlight);

        let source = MaskSource {
            epoch: pipeline.session.mask_epoch,
            index,
            bounds: mask_bounds,
        };
        let controller = self.clone();
        tokio::spawn(async move {
            controller.run_reconstruction(token, source, mask, image).await;
        });
    }

    async fn run_reconstruction(
        self,
        token: CancellationToken,
        source: MaskSource,
        mask: Arc<Mask>,
        image: BaseImage,
    ) {
        let index = source.index;
        let outcome = self.reconstruct(&token, mask, image).await;

        let mut guard = self.shared.pipeline.lock().await;
        let pipeline = &mut *guard;

        if token.is_cancelled() {
            log_debug!("dropping reconstruction for mask {}: superseded", index);
            return;
        }
        pipeline.reconstruction = None;

        match outcome {
            Ok((payload, bounds, texture)) => {
                pipeline.composer.set_model(&payload, &texture);

                let model = ReconstructedModel {
                    payload: Arc::new(payload),
                    bounds,
                    mask_epoch: source.epoch,
                    mask_index: index,
                    mask_bounds: source.bounds,
                    texture: Arc::new(texture),
                    received_at: Utc::now(),
                };
                log_info!(
                    "model ready for mask {} ({} bytes)",
                    index,
                    model.payload.len()
                );
                self.emit(PipelineEvent::ModelReady {
                    model: model.summary(),
                });
                pipeline.session.model = Some(model);

                self.set_status(pipeline, PipelineStatus::ModelReady);
                self.publish_scene(pipeline);
            }
            Err(err) => {
                self.report_failure(Stage::Reconstruction, &err);
                self.set_status(pipeline, PipelineStatus::MaskReady);
            }
        }
    }

    async fn reconstruct(
        &self,
        token: &CancellationToken,
        mask: Arc<Mask>,
        image: BaseImage,
    ) -> PipelineResult<(Vec<u8>, ModelBounds, RgbaImage)> {
        let carved = tokio::task::spawn_blocking(move || -> PipelineResult<(RgbaImage, Vec<u8>)> {
            let texture = carve_alpha(image.pixels(), &mask)?;
            let png = encode_png(&texture)?;
            Ok((texture, png))
        })
        .await
        .map_err(|err| PipelineError::decode("carved image", err))?;
        let (texture, png) = carved?;

        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let payload = self
            .shared
            .backend
            .reconstruct(ReconstructionRequest::from_png(&png), token.clone())
            .await?;
        let bounds = ModelBounds::from_gltf_bytes(&payload)?;
        Ok((payload, bounds, texture))
    }

    fn publish_scene(&self, pipeline: &mut Pipeline) -> ComposedScene {
        let scene = pipeline.compose();
        self.emit(PipelineEvent::SceneUpdated {
            scene: scene.clone(),
        });
        scene
    }

    fn set_status(&self, pipeline: &mut Pipeline, status: PipelineStatus) {
        pipeline.session.status = status;
        log_debug!("status -> {}", status.as_str());
        self.emit(PipelineEvent::StatusChanged {
            session_id: pipeline.session.session_id,
            status,
        });
    }

    fn report_failure(&self, stage: Stage, err: &PipelineError) {
        if err.is_cancelled() {
            return;
        }
        log_error!("{} failed: {}", stage.as_str(), err);
        self.emit(PipelineEvent::StageFailed {
            stage,
            message: err.to_string(),
        });
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is not an error.
        let _ = self.shared.events.send(event);
    }
}

/// Which mask a reconstruction was started from.
#[derive(Debug, Clone, Copy)]
struct MaskSource {
    epoch: u64,
    index: usize,
    bounds: MaskBounds,
}

/// A segmentation response that passed validation, with its pick and outline.
struct PreparedMasks {
    masks: MaskSet,
    selected: usize,
    overlay: Option<Arc<OverlayMesh>>,
}

/// Validates, filters and summarises a response. Scans every mask, so it
/// runs on the blocking pool.
fn prepare_masks(
    masks: Vec<Mask>,
    image_size: ImageSize,
    params: &SegmentationParams,
) -> PipelineResult<PreparedMasks> {
    check_mask_dimensions(&masks, image_size)?;

    let masks = if params.filter_locally {
        filter_masks(masks, params)
    } else {
        masks
    };
    if masks.is_empty() {
        return Err(PipelineError::decode("segmentation response", "no masks returned"));
    }

    let masks = MaskSet::new(masks);
    let Some(selected) = MaskSelector::select(masks.masks()) else {
        return Err(PipelineError::decode("segmentation response", "no mask has a usable score"));
    };
    let overlay = masks
        .get(selected)
        .map(|mask| Arc::new(overlay_mesh(mask, image_size)));

    Ok(PreparedMasks {
        masks,
        selected,
        overlay,
    })
}

async fn build_overlay(mask: Arc<Mask>, size: ImageSize) -> PipelineResult<Arc<OverlayMesh>> {
    tokio::task::spawn_blocking(move || Arc::new(overlay_mesh(&mask, size)))
        .await
        .map_err(|err| PipelineError::decode("mask overlay", err))
}

fn check_mask_dimensions(masks: &[Mask], expected: ImageSize) -> PipelineResult<()> {
    match masks.iter().find(|mask| mask.size() != expected) {
        Some(mask) => {
            let mismatch = PipelineError::DimensionMismatch {
                expected,
                actual: mask.size(),
            };
            Err(PipelineError::decode("segmentation response", mismatch))
        }
        None => Ok(()),
    }
}
