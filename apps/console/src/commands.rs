//! Operator commands typed at the console prompt.

use shared::domain::{DoorCommand, DoorSide};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Door { side: DoorSide, command: DoorCommand },
    Light { mode: i64 },
    Fan { level: i64 },
    Read { name: String },
    ToggleDrive,
    Refresh,
    Connect,
    Disconnect,
    Status,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command".to_string());
    };
    let command = match head {
        "left" | "right" => {
            let side = if head == "left" {
                DoorSide::Left
            } else {
                DoorSide::Right
            };
            let action = parts
                .next()
                .ok_or_else(|| format!("usage: {head} open|close|stop"))?;
            let command = match action {
                "open" => DoorCommand::Open,
                "close" => DoorCommand::Close,
                "stop" => DoorCommand::Stop,
                other => return Err(format!("unknown door action '{other}'")),
            };
            ConsoleCommand::Door { side, command }
        }
        "light" => ConsoleCommand::Light {
            mode: parse_value(parts.next(), "light <0-3>")?,
        },
        "fan" => ConsoleCommand::Fan {
            level: parse_value(parts.next(), "fan <0-2>")?,
        },
        "read" => ConsoleCommand::Read {
            name: parts
                .next()
                .ok_or_else(|| "usage: read <variable name>".to_string())?
                .to_string(),
        },
        "drive" => ConsoleCommand::ToggleDrive,
        "refresh" => ConsoleCommand::Refresh,
        "connect" => ConsoleCommand::Connect,
        "disconnect" => ConsoleCommand::Disconnect,
        "status" => ConsoleCommand::Status,
        "help" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}'; try 'help'")),
    };
    Ok(command)
}

fn parse_value(raw: Option<&str>, usage: &str) -> Result<i64, String> {
    raw.ok_or_else(|| format!("usage: {usage}"))?
        .parse()
        .map_err(|_| format!("usage: {usage}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn door_commands_parse() {
        assert_eq!(
            parse_command("left open"),
            Ok(ConsoleCommand::Door {
                side: DoorSide::Left,
                command: DoorCommand::Open,
            })
        );
        assert_eq!(
            parse_command("right stop"),
            Ok(ConsoleCommand::Door {
                side: DoorSide::Right,
                command: DoorCommand::Stop,
            })
        );
    }

    #[test]
    fn select_style_commands_carry_their_value() {
        assert_eq!(parse_command("light 3"), Ok(ConsoleCommand::Light { mode: 3 }));
        assert_eq!(parse_command("fan 0"), Ok(ConsoleCommand::Fan { level: 0 }));
        // Range checks live in the dispatcher, not the parser.
        assert_eq!(parse_command("fan 9"), Ok(ConsoleCommand::Fan { level: 9 }));
    }

    #[test]
    fn read_takes_a_wire_name() {
        assert_eq!(
            parse_command("read CAN_DW.CAN_FanStatus"),
            Ok(ConsoleCommand::Read {
                name: "CAN_DW.CAN_FanStatus".to_string(),
            })
        );
        assert!(parse_command("read").is_err());
    }

    #[test]
    fn drive_is_a_toggle_word() {
        assert_eq!(parse_command("drive"), Ok(ConsoleCommand::ToggleDrive));
    }

    #[test]
    fn junk_is_reported_with_a_hint() {
        let err = parse_command("flyy").expect_err("must fail");
        assert!(err.contains("help"));
        assert!(parse_command("light banana").is_err());
        assert!(parse_command("left sideways").is_err());
    }
}
