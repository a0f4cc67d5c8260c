use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod agi_serve;
pub mod ami_action;
pub mod ami_events;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Gateway interface (server role).
    #[command(subcommand)]
    Agi(AgiCommand),
    /// Manager interface (client role).
    #[command(subcommand)]
    Ami(AmiCommand),
    /// Show version information.
    Version(VersionArgs),
}

#[derive(Subcommand, Debug)]
pub enum AgiCommand {
    /// Listen for AGI connections and run menu trees.
    Serve(AgiServeArgs),
}

#[derive(Subcommand, Debug)]
pub enum AmiCommand {
    /// Log in, send one action and print its response.
    Action(AmiActionArgs),
    /// Log in and print events.
    Events(AmiEventsArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Agi(AgiCommand::Serve(args)) => block_on(agi_serve::run(args)),
        Command::Ami(AmiCommand::Action(args)) => block_on(ami_action::run(args, format)),
        Command::Ami(AmiCommand::Events(args)) => block_on(ami_events::run(args, format)),
        Command::Version(args) => version::run(args),
    }
}

fn block_on<F>(future: F) -> CliResult<i32>
where
    F: std::future::Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;
    runtime.block_on(future)
}

#[derive(Args, Debug)]
pub struct AgiServeArgs {
    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// Port to listen on.
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
    /// Menu tree documents (JSON). May be repeated.
    #[arg(long = "menu", value_name = "FILE")]
    pub menus: Vec<PathBuf>,
}

/// Manager connection settings shared by the `ami` commands.
#[derive(Args, Debug, Clone)]
pub struct AmiConnectArgs {
    #[arg(long, env = "PBXLINK_AMI_HOST", default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, env = "PBXLINK_AMI_PORT", default_value_t = pbxlink_ami::DEFAULT_PORT)]
    pub port: u16,
    #[arg(long, short = 'u', env = "PBXLINK_AMI_USERNAME")]
    pub username: Option<String>,
    #[arg(long, env = "PBXLINK_AMI_SECRET", hide_env_values = true)]
    pub secret: Option<String>,
}

impl AmiConnectArgs {
    pub fn to_config(&self, events: bool) -> pbxlink_ami::AmiConfig {
        pbxlink_ami::AmiConfig::new(
            self.host.as_str(),
            self.port,
            self.username.clone().unwrap_or_default(),
            self.secret.clone().unwrap_or_default(),
        )
        .with_events(events)
    }
}

#[derive(Args, Debug)]
pub struct AmiActionArgs {
    #[command(flatten)]
    pub connect: AmiConnectArgs,
    /// Action name, e.g. `CoreSettings`.
    pub name: String,
    /// Action field as KEY=VALUE. May be repeated.
    #[arg(long = "field", short = 'f', value_name = "KEY=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct AmiEventsArgs {
    #[command(flatten)]
    pub connect: AmiConnectArgs,
    /// Only print events with this name.
    #[arg(long)]
    pub name: Option<String>,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {raw:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_parser_splits_on_first_equals() {
        assert_eq!(
            parse_field("Variable=FOO=bar"),
            Ok(("Variable".to_string(), "FOO=bar".to_string()))
        );
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }
}
