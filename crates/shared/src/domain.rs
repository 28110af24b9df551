use serde::{Deserialize, Serialize};

/// One of the polled vehicle variables the console keeps in sync with
/// the instrumentation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedVariable {
    LeftDoor,
    RightDoor,
    LightMode,
    FanLevel,
}

impl TrackedVariable {
    pub const ALL: [TrackedVariable; 4] = [
        TrackedVariable::LeftDoor,
        TrackedVariable::RightDoor,
        TrackedVariable::LightMode,
        TrackedVariable::FanLevel,
    ];

    /// Namespaced name the endpoint knows this variable by.
    pub fn wire_name(self) -> &'static str {
        match self {
            TrackedVariable::LeftDoor => "CAN_DW.CAN_LeftDoor",
            TrackedVariable::RightDoor => "CAN_DW.CAN_RightDoor",
            TrackedVariable::LightMode => "CAN_DW.CAN_LightStatus",
            TrackedVariable::FanLevel => "CAN_DW.CAN_FanStatus",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|variable| variable.wire_name() == name)
    }

    /// Whether `value` lies inside this variable's value domain.
    /// Doors accept {0,1,2}, the light strip {0..=3}, the fan {0..=2}.
    pub fn accepts(self, value: i64) -> bool {
        let max = match self {
            TrackedVariable::LeftDoor | TrackedVariable::RightDoor => 2,
            TrackedVariable::LightMode => 3,
            TrackedVariable::FanLevel => 2,
        };
        (0..=max).contains(&value)
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackedVariable::LeftDoor => "left door",
            TrackedVariable::RightDoor => "right door",
            TrackedVariable::LightMode => "light strip",
            TrackedVariable::FanLevel => "fan",
        }
    }

    /// Operator-facing rendering of a value, using the demo rig's
    /// vocabulary: doors report motion, the light strip is shown as
    /// mode 1-4, the fan as gear 0-2.
    pub fn describe_value(self, value: i64) -> String {
        match self {
            TrackedVariable::LeftDoor | TrackedVariable::RightDoor => {
                match DoorCommand::try_from(value) {
                    Ok(command) => command.label().to_string(),
                    Err(_) => format!("value {value}"),
                }
            }
            TrackedVariable::LightMode => format!("mode {}", value + 1),
            TrackedVariable::FanLevel => format!("gear {value}"),
        }
    }
}

/// Write-only command signals. Never polled, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSignal {
    /// Drive start/stop flag; 1 while the vehicle is driving.
    DriveActive,
    /// One-shot trigger asking the rig to refresh its CAN data.
    DataRefresh,
}

impl CommandSignal {
    pub fn wire_name(self) -> &'static str {
        match self {
            CommandSignal::DriveActive => "CAN_DW.startdriving",
            CommandSignal::DataRefresh => "CAN_DW.updata",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        [CommandSignal::DriveActive, CommandSignal::DataRefresh]
            .into_iter()
            .find(|signal| signal.wire_name() == name)
    }

    pub fn accepts(self, value: i64) -> bool {
        match self {
            CommandSignal::DriveActive => value == 0 || value == 1,
            CommandSignal::DataRefresh => value == 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorSide {
    Left,
    Right,
}

impl DoorSide {
    pub fn variable(self) -> TrackedVariable {
        match self {
            DoorSide::Left => TrackedVariable::LeftDoor,
            DoorSide::Right => TrackedVariable::RightDoor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorCommand {
    Stop,
    Open,
    Close,
}

impl DoorCommand {
    pub fn value(self) -> i64 {
        match self {
            DoorCommand::Stop => 0,
            DoorCommand::Open => 1,
            DoorCommand::Close => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DoorCommand::Stop => "stopped",
            DoorCommand::Open => "opening",
            DoorCommand::Close => "closing",
        }
    }
}

impl TryFrom<i64> for DoorCommand {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, i64> {
        match value {
            0 => Ok(DoorCommand::Stop),
            1 => Ok(DoorCommand::Open),
            2 => Ok(DoorCommand::Close),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_for_all_tracked_variables() {
        for variable in TrackedVariable::ALL {
            assert_eq!(
                TrackedVariable::from_wire_name(variable.wire_name()),
                Some(variable)
            );
        }
        assert_eq!(TrackedVariable::from_wire_name("CAN_DW.Bogus"), None);
    }

    #[test]
    fn door_domain_excludes_out_of_range_values() {
        assert!(TrackedVariable::LeftDoor.accepts(0));
        assert!(TrackedVariable::LeftDoor.accepts(2));
        assert!(!TrackedVariable::LeftDoor.accepts(3));
        assert!(!TrackedVariable::LeftDoor.accepts(-1));
    }

    #[test]
    fn light_mode_accepts_four_modes() {
        assert!(TrackedVariable::LightMode.accepts(3));
        assert!(!TrackedVariable::LightMode.accepts(4));
    }

    #[test]
    fn fan_domain_is_three_gears() {
        assert!(TrackedVariable::FanLevel.accepts(2));
        assert!(!TrackedVariable::FanLevel.accepts(3));
    }

    #[test]
    fn refresh_signal_only_accepts_trigger_value() {
        assert!(CommandSignal::DataRefresh.accepts(1));
        assert!(!CommandSignal::DataRefresh.accepts(0));
        assert!(CommandSignal::DriveActive.accepts(0));
        assert!(!CommandSignal::DriveActive.accepts(2));
    }

    #[test]
    fn light_mode_is_displayed_one_based() {
        assert_eq!(TrackedVariable::LightMode.describe_value(0), "mode 1");
        assert_eq!(TrackedVariable::FanLevel.describe_value(2), "gear 2");
        assert_eq!(TrackedVariable::LeftDoor.describe_value(1), "opening");
    }
}
