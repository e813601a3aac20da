//! Scripted replay of editing sessions.
//!
//! A replay script lists the views of an item and a sequence of interaction
//! commands (pointer events, zoom changes, commits). Replaying it drives an
//! [`EditingSession`] exactly as a front end would, and the resulting
//! changes are written to an [`ObjectStore`].

use std::io::Write;
use std::path::PathBuf;

use mask_rle::{Rle, from_luma};
use serde::{Deserialize, Serialize};

use crate::collab::{BackendError, DatasetItem, NavigationContext, ObjectStore, StaticDataset};
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::geometry::{Point, VertexRef, ViewDimensions};
use crate::session::{EditingSession, FlushReport};
use crate::shape::{Features, ItemObject, MaskOrigin, ObjectCollection, ShapeType};

/// Page size used when navigating a script's dataset.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

// ============================================================================
// Script Format
// ============================================================================

/// A view declared by a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSpec {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

impl ViewSpec {
    fn entry(&self) -> (String, ViewDimensions) {
        (self.id.clone(), ViewDimensions::new(self.width, self.height))
    }
}

/// Items available for previous/next navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub id: String,
    pub items: Vec<DatasetItem>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// One recorded interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReplayCommand {
    Start {
        shape: ShapeType,
        view: String,
    },
    Down {
        view: String,
        x: f32,
        y: f32,
    },
    Move {
        view: String,
        x: f32,
        y: f32,
    },
    Up {
        view: String,
        x: f32,
        y: f32,
    },
    CloseRing {
        view: String,
    },
    DeleteVertex {
        view: String,
        ring: usize,
        point_id: u32,
    },
    /// Mask given as uncompressed RLE counts
    Mask {
        view: String,
        rle: Rle,
        #[serde(default = "default_manual")]
        manual: bool,
        /// Model score for a mask that is not manual
        #[serde(default)]
        confidence: Option<f32>,
    },
    /// Mask given as a COCO compressed RLE string
    CompressedMask {
        view: String,
        counts: String,
        height: u32,
        width: u32,
        #[serde(default = "default_manual")]
        manual: bool,
        /// Model score for a mask that is not manual
        #[serde(default)]
        confidence: Option<f32>,
    },
    /// Mask read from a grayscale image file
    MaskImage {
        view: String,
        path: PathBuf,
        /// Pixels brighter than this are foreground
        #[serde(default)]
        threshold: u8,
        #[serde(default = "default_manual")]
        manual: bool,
        /// Model score for a mask that is not manual
        #[serde(default)]
        confidence: Option<f32>,
    },
    Zoom {
        view: String,
        zoom: f32,
        /// Zoom around this pointer position instead of keeping the pan
        #[serde(default)]
        cursor: Option<[f32; 2]>,
    },
    Pan {
        view: String,
        dx: f32,
        dy: f32,
    },
    Commit {
        #[serde(default)]
        features: Features,
    },
    Cancel,
    Delete {
        object_id: String,
    },
    Flush,
    NextItem,
    PreviousItem,
}

fn default_manual() -> bool {
    true
}

fn mask_origin(manual: bool, confidence: Option<f32>) -> MaskOrigin {
    if manual {
        MaskOrigin::Manual
    } else {
        MaskOrigin::Model {
            confidence: confidence.unwrap_or(1.0),
        }
    }
}

/// A complete replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    pub item_id: String,
    pub views: Vec<ViewSpec>,
    /// Objects already stored for the item
    #[serde(default)]
    pub objects: Vec<ItemObject>,
    #[serde(default)]
    pub dataset: Option<DatasetSpec>,
    pub commands: Vec<ReplayCommand>,
}

impl ReplayScript {
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, EditorError> {
        let json = std::fs::read_to_string(path)?;
        let script = Self::from_json(&json)?;
        log::info!(
            "Loaded replay script {:?} with {} command(s)",
            path,
            script.commands.len()
        );
        Ok(script)
    }
}

// ============================================================================
// Replay
// ============================================================================

/// Outcome of a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    /// Item open when the script ended
    pub item_id: String,
    /// Ids of objects committed during the replay
    pub committed: Vec<String>,
    /// Commands rejected by the editor
    pub rejected: usize,
    /// Objects of the final item
    pub objects: ObjectCollection,
    /// Result of the final flush
    pub flush: FlushReport,
}

/// Replay a script against a fresh session, persisting into `store`.
///
/// Commands the editor rejects are logged and skipped, as a user's invalid
/// click would be. Pending changes are flushed once more at the end.
pub fn run(
    script: &ReplayScript,
    config: EditorConfig,
    store: &mut dyn ObjectStore,
) -> Result<ReplayReport, EditorError> {
    let views: Vec<(String, ViewDimensions)> = script.views.iter().map(ViewSpec::entry).collect();
    let mut session = EditingSession::open(script.item_id.as_str(), views.clone(), config);
    session.load_objects(script.objects.iter().cloned());

    let dataset = script
        .dataset
        .as_ref()
        .map(|spec| (spec, StaticDataset::new(spec.items.clone())));
    let mut navigation = match &dataset {
        Some((spec, source)) => Some(NavigationContext::start(
            source,
            spec.id.as_str(),
            spec.page_size,
            None,
        )?),
        None => None,
    };

    let mut committed = Vec::new();
    let mut rejected = 0;

    for (index, command) in script.commands.iter().enumerate() {
        log::trace!("Command {}: {:?}", index, command);
        let result = match command {
            ReplayCommand::NextItem | ReplayCommand::PreviousItem => {
                match (&mut navigation, &dataset) {
                    (Some(nav), Some((_, source))) => {
                        let item = if *command == ReplayCommand::NextItem {
                            nav.next(source)
                        } else {
                            nav.previous(source)
                        };
                        item.map(|item| {
                            if let Some(item) = item {
                                session.switch_item(item.id.as_str(), views.clone());
                            } else {
                                log::info!("No more items in that direction");
                            }
                        })
                    }
                    _ => Err(BackendError::NotFound("no dataset in script".to_string()).into()),
                }
            }
            ReplayCommand::Commit { features } => session
                .commit(features.clone())
                .map(|ids| committed.extend(ids)),
            other => apply(&mut session, other, store),
        };

        if let Err(e) = result {
            log::warn!("Command {} rejected: {}", index, e);
            rejected += 1;
        }
    }

    let flush = session.flush(store);
    Ok(ReplayReport {
        item_id: session.item_id().to_string(),
        committed,
        rejected,
        objects: session.objects().clone(),
        flush,
    })
}

fn apply(
    session: &mut EditingSession,
    command: &ReplayCommand,
    store: &mut dyn ObjectStore,
) -> Result<(), EditorError> {
    match command {
        ReplayCommand::Start { shape, view } => session.start_shape(*shape, view),
        ReplayCommand::Down { view, x, y } => {
            session.pointer_down(view, Point::new(*x, *y)).map(|_| ())
        }
        ReplayCommand::Move { view, x, y } => session.pointer_move(view, Point::new(*x, *y)),
        ReplayCommand::Up { view, x, y } => session.pointer_up(view, Point::new(*x, *y)),
        ReplayCommand::CloseRing { view } => session.close_ring(view).map(|_| ()),
        ReplayCommand::DeleteVertex {
            view,
            ring,
            point_id,
        } => session
            .delete_vertex(
                view,
                VertexRef {
                    ring: *ring,
                    point_id: *point_id,
                },
            )
            .map(|_| ()),
        ReplayCommand::Mask {
            view,
            rle,
            manual,
            confidence,
        } => session.set_mask(view, rle.clone(), mask_origin(*manual, *confidence)),
        ReplayCommand::CompressedMask {
            view,
            counts,
            height,
            width,
            manual,
            confidence,
        } => {
            let rle = Rle::from_compressed_string(counts, *height, *width)?;
            session.set_mask(view, rle, mask_origin(*manual, *confidence))
        }
        ReplayCommand::MaskImage {
            view,
            path,
            threshold,
            manual,
            confidence,
        } => {
            let image = image::open(path)?.to_luma8();
            log::debug!("Read {}x{} mask image {:?}", image.width(), image.height(), path);
            let rle = from_luma(&image, *threshold)?;
            session.set_mask(view, rle, mask_origin(*manual, *confidence))
        }
        ReplayCommand::Zoom { view, zoom, cursor } => match cursor {
            Some([x, y]) => session
                .zoom_to_cursor(view, *zoom, Point::new(*x, *y))
                .map(|_| ()),
            None => session.set_zoom(view, *zoom).map(|_| ()),
        },
        ReplayCommand::Pan { view, dx, dy } => session.pan_by(view, *dx, *dy),
        ReplayCommand::Cancel => {
            session.cancel();
            Ok(())
        }
        ReplayCommand::Delete { object_id } => session.delete_object(object_id).map(|_| ()),
        ReplayCommand::Flush => match session.flush(store).error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        },
        ReplayCommand::Commit { .. } | ReplayCommand::NextItem | ReplayCommand::PreviousItem => {
            Ok(())
        }
    }
}

// ============================================================================
// JSON Lines Store
// ============================================================================

/// One line written by [`JsonLinesStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoredChange {
    Save { object: ItemObject },
    Delete { item_id: String, object_id: String },
}

/// Object store writing every change as one JSON line.
pub struct JsonLinesStore<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesStore<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, change: &StoredChange) -> Result<(), BackendError> {
        let line = serde_json::to_string(change)
            .map_err(|e| BackendError::rejected(e.to_string()))?;
        writeln!(self.writer, "{}", line)
            .and_then(|()| self.writer.flush())
            .map_err(|e| BackendError::unavailable(e.to_string()))
    }
}

impl<W: Write> ObjectStore for JsonLinesStore<W> {
    fn save_object(&mut self, object: &ItemObject) -> Result<(), BackendError> {
        self.write(&StoredChange::Save {
            object: object.clone(),
        })
    }

    fn delete_object(&mut self, item_id: &str, object_id: &str) -> Result<(), BackendError> {
        self.write(&StoredChange::Delete {
            item_id: item_id.to_string(),
            object_id: object_id.to_string(),
        })
    }
}
