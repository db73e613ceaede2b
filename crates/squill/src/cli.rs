use std::path::PathBuf;

/// Parsed command-line options. Every flag has an upper-snake environment
/// override (`SQUILL_MAX_ROWS`, ...); the flag wins when both are set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliArgs {
    /// Override for the settings file path.
    pub settings: Option<PathBuf>,
    /// Row cap applied to query results.
    pub max_rows: Option<usize>,
    pub debug: bool,
    pub debug_idle_scheduler: bool,
    pub profile_startup: bool,
    /// Epoch timestamp recorded by the launcher, for startup profiling.
    pub startup_mark: Option<f64>,
    /// Hidden worker mode: socket to serve as the process worker.
    pub worker_socket: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError(pub String);

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn parse_args<I>(args: I) -> Result<CliArgs, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = from_env();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                parsed.settings = Some(PathBuf::from(required(&mut args, "--settings")?));
            }
            "--max-rows" => {
                let raw = required(&mut args, "--max-rows")?;
                parsed.max_rows = Some(
                    raw.parse()
                        .map_err(|_| CliError(format!("invalid --max-rows value: {}", raw)))?,
                );
            }
            "--debug" => parsed.debug = true,
            "--debug-idle-scheduler" => parsed.debug_idle_scheduler = true,
            "--profile-startup" => parsed.profile_startup = true,
            "--startup-mark" => {
                let raw = required(&mut args, "--startup-mark")?;
                parsed.startup_mark = Some(
                    raw.parse()
                        .map_err(|_| CliError(format!("invalid --startup-mark value: {}", raw)))?,
                );
            }
            "--worker-socket" => {
                parsed.worker_socket = Some(required(&mut args, "--worker-socket")?);
            }
            "--help" | "-h" => return Err(CliError(usage())),
            other => return Err(CliError(format!("unknown argument: {}", other))),
        }
    }

    Ok(parsed)
}

fn required(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, CliError> {
    args.next()
        .ok_or_else(|| CliError(format!("{} requires a value", flag)))
}

fn from_env() -> CliArgs {
    CliArgs {
        settings: std::env::var("SQUILL_SETTINGS").ok().map(PathBuf::from),
        max_rows: std::env::var("SQUILL_MAX_ROWS")
            .ok()
            .and_then(|v| v.parse().ok()),
        debug: env_flag("SQUILL_DEBUG"),
        debug_idle_scheduler: env_flag("SQUILL_DEBUG_IDLE_SCHEDULER"),
        profile_startup: env_flag("SQUILL_PROFILE_STARTUP"),
        startup_mark: std::env::var("SQUILL_STARTUP_MARK")
            .ok()
            .and_then(|v| v.parse().ok()),
        worker_socket: None,
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| !matches!(v.as_str(), "" | "0" | "false"))
        .unwrap_or(false)
}

pub fn usage() -> String {
    "Usage: squill [OPTIONS]\n\
     \n\
     Options:\n\
     \x20 --settings PATH          Settings file to use\n\
     \x20 --max-rows N             Cap query results at N rows\n\
     \x20 --debug                  Verbose logging\n\
     \x20 --debug-idle-scheduler   Log idle scheduler activity\n\
     \x20 --profile-startup        Print startup timings\n\
     \x20 --startup-mark FLOAT     Launcher start timestamp\n"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        parse_args(args.iter().map(|s| s.to_string())).unwrap()
    }

    #[test]
    fn defaults_are_empty() {
        let args = parse(&[]);
        assert!(args.settings.is_none());
        assert!(!args.debug);
        assert!(args.worker_socket.is_none());
    }

    #[test]
    fn flags_parse() {
        let args = parse(&[
            "--settings",
            "/tmp/s.json",
            "--max-rows",
            "500",
            "--debug",
            "--startup-mark",
            "1722500000.25",
        ]);
        assert_eq!(args.settings, Some(PathBuf::from("/tmp/s.json")));
        assert_eq!(args.max_rows, Some(500));
        assert!(args.debug);
        assert_eq!(args.startup_mark, Some(1722500000.25));
    }

    #[test]
    fn worker_socket_is_hidden_mode() {
        let args = parse(&["--worker-socket", "squill-worker-1.sock"]);
        assert_eq!(args.worker_socket.as_deref(), Some("squill-worker-1.sock"));
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = parse_args(["--max-rows".to_string(), "lots".to_string()]).unwrap_err();
        assert!(err.0.contains("--max-rows"));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(parse_args(["--frobnicate".to_string()]).is_err());
    }
}
