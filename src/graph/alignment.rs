//! Per-image alignment parameters for image-stack input nodes.
//!
//! Each image in a stack carries a position, resize, and rotation triple so
//! the acquisition can be registered before analysis. The orchestrator never
//! interprets these values; it only stores them, ships them with the run
//! request, and knows how to reset them.

use serde::{Deserialize, Serialize};

/// One value per spatial axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Axes {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// All three components exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

/// Alignment record for a single image within an image-stack node.
///
/// `reset` zeroes every numeric field but never touches the image identity,
/// so a record stays attached to its image across any number of resets.
///
/// # Examples
///
/// ```rust
/// use skein::graph::{Axes, ImageAlignment};
///
/// let mut alignment = ImageAlignment::new("frame_000")
///     .with_position(Axes::new(1.5, -2.0, 0.25));
/// alignment.reset();
/// assert!(alignment.is_reset());
/// assert_eq!(alignment.image_id(), "frame_000");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAlignment {
    image_id: String,
    position: Axes,
    resize: Axes,
    rotation: Axes,
}

impl ImageAlignment {
    /// Fresh record for `image_id` with all parameters zeroed.
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            position: Axes::default(),
            resize: Axes::default(),
            rotation: Axes::default(),
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: Axes) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_resize(mut self, resize: Axes) -> Self {
        self.resize = resize;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Axes) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn position(&self) -> Axes {
        self.position
    }

    pub fn resize(&self) -> Axes {
        self.resize
    }

    pub fn rotation(&self) -> Axes {
        self.rotation
    }

    /// Zero all nine numeric fields, preserving the image identity.
    /// Idempotent.
    pub fn reset(&mut self) {
        self.position = Axes::default();
        self.resize = Axes::default();
        self.rotation = Axes::default();
    }

    /// All parameters zero.
    #[must_use]
    pub fn is_reset(&self) -> bool {
        self.position.is_zero() && self.resize.is_zero() && self.rotation.is_zero()
    }
}
