use shared::domain::{DoorCommand, DoorSide, TrackedVariable};
use tracing::warn;

/// Receives discrete scene updates derived one-to-one from successful
/// reads and writes. An implementation mirrors vehicle state into a 3D
/// scene, a status panel, or anything else that wants it.
pub trait SceneProjector: Send + Sync {
    fn door(&self, side: DoorSide, command: DoorCommand);
    fn light_mode(&self, mode: u8);
    fn fan_level(&self, level: u8);
    fn drive_active(&self, driving: bool);
}

/// Projector that drops every update.
pub struct NullSceneProjector;

impl SceneProjector for NullSceneProjector {
    fn door(&self, _side: DoorSide, _command: DoorCommand) {}
    fn light_mode(&self, _mode: u8) {}
    fn fan_level(&self, _level: u8) {}
    fn drive_active(&self, _driving: bool) {}
}

/// Fan a confirmed variable value out to the matching projector call.
/// Values the scene cannot express are logged and skipped.
pub(crate) fn project_variable(
    projector: &dyn SceneProjector,
    variable: TrackedVariable,
    value: i64,
) {
    match variable {
        TrackedVariable::LeftDoor | TrackedVariable::RightDoor => {
            let side = if variable == TrackedVariable::LeftDoor {
                DoorSide::Left
            } else {
                DoorSide::Right
            };
            match DoorCommand::try_from(value) {
                Ok(command) => projector.door(side, command),
                Err(value) => warn!(
                    variable = variable.wire_name(),
                    value, "door value not projectable"
                ),
            }
        }
        TrackedVariable::LightMode => match u8::try_from(value) {
            Ok(mode) => projector.light_mode(mode),
            Err(_) => warn!(value, "light mode not projectable"),
        },
        TrackedVariable::FanLevel => match u8::try_from(value) {
            Ok(level) => projector.fan_level(level),
            Err(_) => warn!(value, "fan level not projectable"),
        },
    }
}
