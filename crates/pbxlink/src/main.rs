mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pbxlink", version, about = "Asterisk AGI/AMI protocol CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{AgiCommand, AmiCommand};

    #[test]
    fn parses_agi_serve_with_menus() {
        let cli = Cli::try_parse_from([
            "pbxlink",
            "agi",
            "serve",
            "--port",
            "4573",
            "--menu",
            "a.json",
            "--menu",
            "b.json",
        ])
        .expect("agi serve args should parse");

        match cli.command {
            Command::Agi(AgiCommand::Serve(args)) => {
                assert_eq!(args.port, Some(4573));
                assert_eq!(args.host, "0.0.0.0");
                assert_eq!(args.menus.len(), 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_ami_action_fields() {
        let cli = Cli::try_parse_from([
            "pbxlink",
            "--format",
            "json",
            "ami",
            "action",
            "Originate",
            "--username",
            "admin",
            "--field",
            "Channel=SIP/100",
            "-f",
            "Exten=200",
        ])
        .expect("ami action args should parse");

        match cli.command {
            Command::Ami(AmiCommand::Action(args)) => {
                assert_eq!(args.name, "Originate");
                assert_eq!(args.connect.username.as_deref(), Some("admin"));
                assert_eq!(
                    args.fields,
                    [
                        ("Channel".to_string(), "SIP/100".to_string()),
                        ("Exten".to_string(), "200".to_string())
                    ]
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_field() {
        let err = Cli::try_parse_from(["pbxlink", "ami", "action", "Ping", "--field", "oops"])
            .expect_err("field without '=' should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_ami_events_filter() {
        let cli = Cli::try_parse_from([
            "pbxlink", "ami", "events", "--name", "Shutdown", "--count", "1",
        ])
        .expect("ami events args should parse");
        match cli.command {
            Command::Ami(AmiCommand::Events(args)) => {
                assert_eq!(args.name.as_deref(), Some("Shutdown"));
                assert_eq!(args.count, Some(1));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
