//! Everything the renderer reads each frame.
//!
//! The stage is the single mutable presentation state: blob uniforms,
//! background, one label per preset, the wipe value and the clock. Only the
//! [`Showcase`](crate::Showcase) (directly, or through its tweens) writes it.

use glam::Vec3;

use crate::catalog::{Catalog, MaterialParams, ShapeParams};
use crate::color::Color;
use crate::mesh::Transform;
use crate::sequencer::Sequencer;

/// Depth at which labels float, between the camera and the blob's centre.
pub const LABEL_DEPTH: f32 = 2.0;

/// Live uniforms of the morphing mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlobState {
    pub shape: ShapeParams,
    pub material: MaterialParams,
    /// Rotation about the vertical axis, in radians. Unbounded.
    pub rotation_y: f32,
}

/// A preset's floating name. Scale 0 means hidden.
#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub text: &'static str,
    pub position: Vec3,
    pub scale: f32,
}

impl Label {
    pub fn is_visible(&self) -> bool {
        self.scale > 0.0
    }

    pub fn transform(&self) -> Transform {
        Transform::from_position(self.position).uniform_scale(self.scale)
    }
}

/// Parameters of the label reveal effect.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Wipe {
    pub progress: f32,
    /// Sign of the last transition, `+1.0` or `-1.0`.
    pub direction: f32,
}

#[derive(Clone, Debug)]
pub struct Stage {
    /// Seconds since the render loop started.
    pub time: f32,
    pub blob: BlobState,
    /// sRGB-encoded clear colour.
    pub background: Color,
    pub labels: Vec<Label>,
    pub wipe: Wipe,
    pub sequencer: Sequencer,
}

impl Stage {
    /// Initial state: preset 0 applied, its label centred, the rest hidden.
    pub fn new(catalog: &Catalog) -> Self {
        let first = catalog.preset(0);
        let labels = catalog
            .iter()
            .enumerate()
            .map(|(i, preset)| Label {
                text: preset.name,
                position: Vec3::new(0.0, 0.0, LABEL_DEPTH),
                scale: if i == 0 { 1.0 } else { 0.0 },
            })
            .collect();

        Self {
            time: 0.0,
            blob: BlobState {
                shape: first.shape,
                material: first.material,
                rotation_y: 0.0,
            },
            background: first.background,
            labels,
            wipe: Wipe {
                progress: 0.0,
                direction: 1.0,
            },
            sequencer: Sequencer::new(),
        }
    }

    /// Indices of labels with a non-zero scale.
    pub fn visible_labels(&self) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| label.is_visible())
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_first_preset() {
        let catalog = Catalog::builtin();
        let stage = Stage::new(&catalog);

        assert_eq!(stage.labels.len(), catalog.len());
        assert_eq!(stage.visible_labels().collect::<Vec<_>>(), vec![0]);
        assert_eq!(stage.labels[0].position, Vec3::new(0.0, 0.0, LABEL_DEPTH));
        assert_eq!(stage.blob.material.map, "cd");
        assert_eq!(stage.background, catalog.preset(0).background);
        assert_eq!(stage.wipe.progress, 0.0);
        assert!(!stage.sequencer.is_animating());
    }

    #[test]
    fn label_transform_carries_scale() {
        let label = Label {
            text: "Foil",
            position: Vec3::new(1.0, 0.0, LABEL_DEPTH),
            scale: 0.5,
        };
        let m = label.transform().matrix();
        assert_eq!(m.w_axis.truncate(), label.position);
        assert!((m.x_axis.x - 0.5).abs() < 1e-6);
    }
}
