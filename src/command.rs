//! Operator intents
//!
//! The named commands the shell dispatches into the compositing core and
//! the visibility controller. Each maps 1:1 onto a component call; there is
//! no other command surface.

use serde::{Deserialize, Serialize};

use crate::scene::EyeSide;

/// A single operator intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SceneCommand {
    /// Toggle an overlay image in or out of the composite
    ToggleOverlay { path: String, weight: f32 },
    /// Display the other eye's model and base image
    SwitchSide { side: EyeSide },
    /// Hide the anterior surfaces to inspect the fundus from inside
    EnterInspection,
    /// Fade a visibility group toward its opposite state
    ToggleGroupVisibility { group: String },
}
