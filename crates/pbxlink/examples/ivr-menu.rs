//! Serve the bundled `app300` menu tree.
//!
//! Run with:
//!   cargo run --example ivr-menu -- 4573
//!
//! Then point a dialplan at it:
//!   exten => 300,1,AGI(agi://127.0.0.1:4573/app300)

use pbxlink::agi::{AgiConnection, AgiServer, AgiServerConfig, MenuTree};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

const APP300: &str = include_str!("../menus/app300.json");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::args()
        .nth(1)
        .map(|raw| raw.parse::<u16>())
        .transpose()?
        .unwrap_or(4573);

    let mut server = AgiServer::bind(&AgiServerConfig::with_port(port)).await?;
    server.register_menu(MenuTree::from_json(APP300)?);
    eprintln!("Listening on {}", server.local_addr()?);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        signal.cancel();
    });

    server.serve(shutdown, reject).await?;
    Ok(())
}

async fn reject(mut conn: AgiConnection<TcpStream>) {
    eprintln!(
        "No menu for {:?} from {:?}",
        conn.network_script(),
        conn.peer()
    );
    conn.close().await;
}
