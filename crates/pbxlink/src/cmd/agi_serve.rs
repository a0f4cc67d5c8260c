use std::path::Path;

use pbxlink_agi::{AgiConnection, AgiServer, AgiServerConfig, MenuTree};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::cmd::AgiServeArgs;
use crate::exit::{agi_error, io_error, menu_error, CliResult, SUCCESS};

pub async fn run(args: AgiServeArgs) -> CliResult<i32> {
    let config = AgiServerConfig {
        host: args.host,
        port: args.port,
    };
    config
        .validate()
        .map_err(|err| agi_error("invalid arguments", err))?;

    let trees = args
        .menus
        .iter()
        .map(|path| load_menu(path))
        .collect::<CliResult<Vec<_>>>()?;

    let mut server = AgiServer::bind(&config)
        .await
        .map_err(|err| agi_error("bind failed", err))?;
    for tree in trees {
        tracing::info!(selector = tree.selector(), entry = tree.entry(), "registered menu");
        server.register_menu(tree);
    }
    if server.menus().is_empty() {
        tracing::warn!("no menus registered; every connection will be closed");
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    server
        .serve(shutdown, close_unmatched)
        .await
        .map_err(|err| agi_error("server failed", err))?;
    Ok(SUCCESS)
}

fn load_menu(path: &Path) -> CliResult<MenuTree> {
    let json = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("cannot read {}", path.display()), err))?;
    MenuTree::from_json(&json)
        .map_err(|err| menu_error(&format!("invalid menu {}", path.display()), err))
}

async fn close_unmatched(mut conn: AgiConnection<TcpStream>) {
    tracing::warn!(
        peer = ?conn.peer(),
        script = conn.network_script().unwrap_or(""),
        variables = ?conn.variables(),
        "no menu registered for selector"
    );
    conn.close().await;
}
