use pbxlink_ami::{AmiClient, AmiError};

use crate::cmd::AmiEventsArgs;
use crate::exit::{ami_error, CliResult, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub async fn run(args: AmiEventsArgs, format: OutputFormat) -> CliResult<i32> {
    let client = AmiClient::connect(&args.connect.to_config(true))
        .await
        .map_err(|err| ami_error("login failed", err))?;
    let mut events = match &args.name {
        Some(name) => client.subscribe(name.as_str()),
        None => client.events(),
    };
    tracing::info!(topic = %events.topic(), "waiting for events");

    let mut printed = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        break;
                    }
                }
                Err(AmiError::ConnectionClosed) => {
                    return Err(ami_error("event stream ended", AmiError::ConnectionClosed));
                }
                Err(err) => return Err(ami_error("event stream failed", err)),
            },
        }
    }

    if let Err(err) = client.logoff().await {
        tracing::debug!(error = %err, "logoff failed");
    }
    Ok(SUCCESS)
}
