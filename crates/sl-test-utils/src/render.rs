//! Renderer that remembers what it was asked to draw

use parking_lot::Mutex;
use sl_composition::{FeatureHit, MapPoint, RenderLayer, Renderer};
use sl_remote::Extent;
use std::sync::Arc;

/// One `draw` call
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub layers: Vec<RenderLayer>,
    pub extent: Option<Extent>,
}

#[derive(Debug, Default)]
struct Log {
    frames: Vec<Frame>,
    hits: Vec<FeatureHit>,
    picks: Vec<MapPoint>,
}

/// Cloneable recording renderer; clones share the log
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    log: Arc<Mutex<Log>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Features every subsequent `pick` returns
    pub fn set_hits(&self, hits: Vec<FeatureHit>) {
        self.log.lock().hits = hits;
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.log.lock().frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.log.lock().frames.len()
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.log.lock().frames.last().cloned()
    }

    pub fn picks(&self) -> Vec<MapPoint> {
        self.log.lock().picks.clone()
    }
}

impl Renderer for RecordingRenderer {
    fn draw(&self, layers: &[RenderLayer], extent: Option<Extent>) {
        self.log.lock().frames.push(Frame {
            layers: layers.to_vec(),
            extent,
        });
    }

    fn pick(&self, point: MapPoint) -> Vec<FeatureHit> {
        let mut log = self.log.lock();
        log.picks.push(point);
        log.hits.clone()
    }
}
