//! In-app command mode: the `:` commands.

/// A parsed `:` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    Connect(Option<String>),
    Disconnect,
    Theme(Option<String>),
    Run,
    /// `run!`: execute without leaving insert mode.
    RunStay,
    SetProcessWorker(bool),
    SetProcessWorkerWarm(bool),
    /// `None` disables the auto-shutdown timer.
    SetProcessWorkerAutoShutdown(Option<u64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError(pub String);

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse command-mode input (without the leading `:`).
pub fn parse_command(input: &str) -> Result<Command, CommandError> {
    let input = input.trim();
    let mut words = input.split_whitespace();
    let head = words
        .next()
        .ok_or_else(|| CommandError("empty command".into()))?;
    let rest: Vec<&str> = words.collect();

    match head {
        "q" | "quit" | "exit" => Ok(Command::Quit),
        "help" | "h" => Ok(Command::Help),
        "connect" | "c" => Ok(Command::Connect(rest.first().map(|s| s.to_string()))),
        "disconnect" | "dc" => Ok(Command::Disconnect),
        "theme" => Ok(Command::Theme(rest.first().map(|s| s.to_string()))),
        "run" | "r" => Ok(Command::Run),
        "run!" | "r!" => Ok(Command::RunStay),
        "set" => parse_set(&rest),
        other => Err(CommandError(format!("unknown command: {}", other))),
    }
}

fn parse_set(rest: &[&str]) -> Result<Command, CommandError> {
    let (setting, value) = match rest {
        [setting, value] => (*setting, *value),
        _ => {
            return Err(CommandError(
                "usage: set <setting> <value>".into(),
            ));
        }
    };

    match setting {
        "process_worker" => Ok(Command::SetProcessWorker(parse_toggle(value)?)),
        "process_worker_warm" => Ok(Command::SetProcessWorkerWarm(parse_toggle(value)?)),
        "process_worker_auto_shutdown" => {
            if value == "off" {
                return Ok(Command::SetProcessWorkerAutoShutdown(None));
            }
            let seconds: u64 = value.parse().map_err(|_| {
                CommandError(format!(
                    "expected seconds or 'off' for process_worker_auto_shutdown, got {}",
                    value
                ))
            })?;
            Ok(Command::SetProcessWorkerAutoShutdown(
                (seconds > 0).then_some(seconds),
            ))
        }
        other => Err(CommandError(format!("unknown setting: {}", other))),
    }
}

fn parse_toggle(value: &str) -> Result<bool, CommandError> {
    match value {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(CommandError(format!("expected on|off, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_aliases() {
        for input in ["q", "quit", "exit"] {
            assert_eq!(parse_command(input).unwrap(), Command::Quit);
        }
    }

    #[test]
    fn run_variants() {
        assert_eq!(parse_command("run").unwrap(), Command::Run);
        assert_eq!(parse_command("r!").unwrap(), Command::RunStay);
    }

    #[test]
    fn connect_takes_an_optional_target() {
        assert_eq!(parse_command("c").unwrap(), Command::Connect(None));
        assert_eq!(
            parse_command("connect postgres://localhost/app").unwrap(),
            Command::Connect(Some("postgres://localhost/app".into()))
        );
    }

    #[test]
    fn set_process_worker() {
        assert_eq!(
            parse_command("set process_worker on").unwrap(),
            Command::SetProcessWorker(true)
        );
        assert_eq!(
            parse_command("set process_worker_warm off").unwrap(),
            Command::SetProcessWorkerWarm(false)
        );
        assert_eq!(
            parse_command("set process_worker_auto_shutdown 30").unwrap(),
            Command::SetProcessWorkerAutoShutdown(Some(30))
        );
        assert_eq!(
            parse_command("set process_worker_auto_shutdown off").unwrap(),
            Command::SetProcessWorkerAutoShutdown(None)
        );
    }

    #[test]
    fn bad_input_is_an_error() {
        assert!(parse_command("").is_err());
        assert!(parse_command("warp").is_err());
        assert!(parse_command("set process_worker maybe").is_err());
        assert!(parse_command("set unknown on").is_err());
    }
}
