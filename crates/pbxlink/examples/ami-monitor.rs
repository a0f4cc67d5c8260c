//! Log in to a manager, print its settings, then print events until shutdown.
//!
//! Run with:
//!   cargo run --example ami-monitor -- 127.0.0.1 admin secret

use pbxlink::ami::{Action, AmiClient, AmiConfig, DEFAULT_PORT};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let username = args.next().unwrap_or_default();
    let secret = args.next().unwrap_or_default();

    let client = AmiClient::connect(&AmiConfig::new(host, DEFAULT_PORT, username, secret)).await?;
    eprintln!("Logged in: {:?}", client.login_response().get("Message"));

    let settings = client.send(Action::new("CoreSettings")).await?;
    for (key, value) in settings.iter() {
        println!("{key}: {value}");
    }

    let mut events = client.events();
    let mut shutdown = client.subscribe("Shutdown");
    loop {
        tokio::select! {
            event = events.recv() => {
                let event = event?;
                println!("[{}] {:?}", event.topic(), event.message());
            }
            event = shutdown.recv() => {
                let event = event?;
                eprintln!("Manager shutting down: {:?}", event.get("Shutdown"));
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.logoff().await?;
    Ok(())
}
