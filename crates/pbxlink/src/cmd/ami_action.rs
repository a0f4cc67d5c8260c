use pbxlink_ami::{Action, AmiClient};

use crate::cmd::AmiActionArgs;
use crate::exit::{ami_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat};

pub async fn run(args: AmiActionArgs, format: OutputFormat) -> CliResult<i32> {
    let action = args
        .fields
        .into_iter()
        .fold(Action::new(args.name), |action, (key, value)| {
            action.field(key, value)
        });
    action
        .validate()
        .map_err(|err| ami_error("invalid action", err))?;

    let client = AmiClient::connect(&args.connect.to_config(false))
        .await
        .map_err(|err| ami_error("login failed", err))?;
    let response = client
        .send(action)
        .await
        .map_err(|err| ami_error("action failed", err))?;
    print_response(&response, format);

    if let Err(err) = client.logoff().await {
        tracing::debug!(error = %err, "logoff failed");
    }
    Ok(SUCCESS)
}
