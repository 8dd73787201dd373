use crate::domain::{DayStat, SessionQueryResult, SyncAction, format_duration};
use crate::infra::{Config, ConfigError, SyncClient, SyncError, default_config_json};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    /// `page` is the raw `DATE|PATH` argument; resolved once logging is up.
    Tui {
        config: Option<PathBuf>,
        page: Option<String>,
    },
    Command {
        config: Option<PathBuf>,
        command: CliCommand,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CliCommand {
    Status,
    Start,
    Stop,
    Week,
    Config,
}

impl CliCommand {
    /// Commands that never talk to the server.
    pub fn is_offline(self) -> bool {
        matches!(self, Self::Config)
    }
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut config: Option<PathBuf> = None;
    let mut positional: Vec<&String> = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = iter
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--config".to_string()))?;
                config = Some(PathBuf::from(value));
            }
            "--" => {
                positional.extend(iter.by_ref());
                break;
            }
            _ if arg.starts_with('-') && arg.len() > 1 => {
                return Err(CliParseError::UnknownFlag(arg.to_string()));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let Some(first) = positional.next() else {
        return Ok(CliInvocation::Tui { config, page: None });
    };

    let command = match first.as_str() {
        "status" => CliCommand::Status,
        "start" => CliCommand::Start,
        "stop" => CliCommand::Stop,
        "week" => CliCommand::Week,
        "config" => CliCommand::Config,
        other if looks_like_page(other) => {
            if let Some(extra) = positional.next() {
                return Err(CliParseError::UnexpectedArgument(extra.to_string()));
            }
            return Ok(CliInvocation::Tui {
                config,
                page: Some(other.to_string()),
            });
        }
        other => return Err(CliParseError::UnknownSubcommand(other.to_string())),
    };

    if let Some(extra) = positional.next() {
        return Err(CliParseError::UnexpectedArgument(extra.to_string()));
    }
    Ok(CliInvocation::Command { config, command })
}

/// Anything date- or path-shaped is handed to the page resolver, which falls
/// back to the live view when it is not a valid date.
fn looks_like_page(arg: &str) -> bool {
    arg.contains('/') || arg.starts_with(|ch: char| ch.is_ascii_digit())
}

pub fn run(command: CliCommand, config: &Config) -> Result<(), CliRunError> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    run_with_output(command, config, &mut out)?;
    out.flush()?;
    Ok(())
}

fn run_with_output<W: Write>(
    command: CliCommand,
    config: &Config,
    out: &mut W,
) -> Result<(), CliRunError> {
    if command == CliCommand::Config {
        writeln!(out, "{}", default_config_json()?)?;
        return Ok(());
    }

    let client = SyncClient::new(config);
    match command {
        CliCommand::Status | CliCommand::Start | CliCommand::Stop => {
            let action = match command {
                CliCommand::Start => SyncAction::Start,
                CliCommand::Stop => SyncAction::Stop,
                _ => SyncAction::Query,
            };
            let result = client.send_action(action)?;
            log::info!("{action:?}: {result:?}");
            writeln!(out, "{}", status_line(&result))?;
        }
        CliCommand::Week => {
            let stats = client.fetch_day_stats()?;
            write_week(out, &stats)?;
        }
        CliCommand::Config => {}
    }
    Ok(())
}

pub fn status_line(result: &SessionQueryResult) -> String {
    let state = if result.running { "Running" } else { "Stopped" };
    format!("{state}. duration: {}", format_duration(result.elapsed()))
}

fn write_week<W: Write>(out: &mut W, stats: &[DayStat]) -> io::Result<()> {
    let mut total = Duration::ZERO;
    for stat in stats {
        total = total.saturating_add(stat.elapsed);
        writeln!(
            out,
            "{}\t{}",
            stat.date.format("%Y-%m-%d %a"),
            format_duration(stat.elapsed)
        )?;
    }
    writeln!(out, "total\t{}", format_duration(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn parse_defaults_to_live_tui() {
        let parsed = parse_invocation(&args(&["stopwatch"])).expect("parse");
        assert_eq!(
            parsed,
            CliInvocation::Tui {
                config: None,
                page: None
            }
        );
    }

    #[test]
    fn parse_help_flag_wins() {
        let parsed = parse_invocation(&args(&["stopwatch", "status", "--help"])).expect("parse");
        assert_eq!(parsed, CliInvocation::PrintHelp);
    }

    #[test]
    fn parse_date_and_path_select_a_page() {
        let parsed = parse_invocation(&args(&["stopwatch", "2024-05-01"])).expect("parse");
        assert_eq!(
            parsed,
            CliInvocation::Tui {
                config: None,
                page: Some("2024-05-01".to_string())
            }
        );

        let parsed = parse_invocation(&args(&[
            "stopwatch",
            "--config",
            "/tmp/sw.json",
            "/stopwatch/2024-05-01",
        ]))
        .expect("parse");
        assert_eq!(
            parsed,
            CliInvocation::Tui {
                config: Some(PathBuf::from("/tmp/sw.json")),
                page: Some("/stopwatch/2024-05-01".to_string())
            }
        );
    }

    #[test]
    fn parse_subcommands() {
        for (word, command) in [
            ("status", CliCommand::Status),
            ("start", CliCommand::Start),
            ("stop", CliCommand::Stop),
            ("week", CliCommand::Week),
            ("config", CliCommand::Config),
        ] {
            let parsed = parse_invocation(&args(&["stopwatch", word])).expect("parse");
            assert_eq!(
                parsed,
                CliInvocation::Command {
                    config: None,
                    command
                }
            );
        }
    }

    #[test]
    fn parse_rejects_unknown_input() {
        assert!(matches!(
            parse_invocation(&args(&["stopwatch", "pause"])),
            Err(CliParseError::UnknownSubcommand(_))
        ));
        assert!(matches!(
            parse_invocation(&args(&["stopwatch", "--verbose"])),
            Err(CliParseError::UnknownFlag(_))
        ));
        assert!(matches!(
            parse_invocation(&args(&["stopwatch", "--config"])),
            Err(CliParseError::MissingFlagValue(_))
        ));
        assert!(matches!(
            parse_invocation(&args(&["stopwatch", "status", "now"])),
            Err(CliParseError::UnexpectedArgument(_))
        ));
    }

    #[test]
    fn status_line_reports_state_and_duration() {
        let running = SessionQueryResult {
            time: 3_723_004_000,
            running: true,
        };
        assert_eq!(status_line(&running), "Running. duration: 1:02:03.004");

        let stopped = SessionQueryResult {
            time: 0,
            running: false,
        };
        assert_eq!(status_line(&stopped), "Stopped. duration: 0:00:00.000");
    }

    #[test]
    fn week_lists_days_and_total() {
        let stats = vec![
            DayStat {
                date: NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"),
                elapsed: Duration::from_secs(3600),
            },
            DayStat {
                date: NaiveDate::from_ymd_opt(2024, 5, 2).expect("date"),
                elapsed: Duration::from_millis(1_500),
            },
        ];
        let mut out = Vec::new();
        write_week(&mut out, &stats).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "2024-05-01 Wed\t1:00:00.000\n2024-05-02 Thu\t0:00:01.500\ntotal\t1:00:01.500\n"
        );
    }

    #[test]
    fn config_command_prints_defaults_without_network() {
        let mut out = Vec::new();
        run_with_output(CliCommand::Config, &Config::default(), &mut out).expect("run");
        let parsed: Config = serde_json::from_slice(&out).expect("json");
        assert_eq!(parsed, Config::default());
        assert!(CliCommand::Config.is_offline());
    }
}
