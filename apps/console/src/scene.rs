use control_core::SceneProjector;
use shared::domain::{DoorCommand, DoorSide};
use tracing::info;

/// Stands in for the 3D scene: renders state changes as log lines.
pub struct TerminalScene;

impl SceneProjector for TerminalScene {
    fn door(&self, side: DoorSide, command: DoorCommand) {
        info!(target: "scene", ?side, state = command.label(), "door");
    }

    fn light_mode(&self, mode: u8) {
        info!(target: "scene", mode = mode + 1, "light strip");
    }

    fn fan_level(&self, level: u8) {
        info!(target: "scene", level, "fan");
    }

    fn drive_active(&self, driving: bool) {
        info!(target: "scene", driving, "drive state");
    }
}
