use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pbxlink_ami::AmiEvent;
use pbxlink_frame::HeaderBlock;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    fields: &'a HeaderBlock,
    timestamp: String,
}

/// Print an action response.
pub fn print_response(message: &HeaderBlock, format: OutputFormat) {
    print_message("response", None, message, format);
}

/// Print an event together with its topic.
pub fn print_event(event: &AmiEvent, format: OutputFormat) {
    print_message("event", Some(event.topic()), event.message(), format);
}

fn print_message(kind: &str, topic: Option<String>, message: &HeaderBlock, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind,
                topic,
                fields: message,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"]);
            for (key, value) in message.iter() {
                table.add_row(vec![key, value]);
            }
            if let Some(topic) = topic {
                println!("{kind} {topic}");
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            print!("{}", render_pretty(kind, topic.as_deref(), message));
        }
    }
}

fn render_pretty(kind: &str, topic: Option<&str>, message: &HeaderBlock) -> String {
    let mut out = match topic {
        Some(topic) => format!("# {kind} {topic}\n"),
        None => format!("# {kind}\n"),
    };
    for (key, value) in message.iter() {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
