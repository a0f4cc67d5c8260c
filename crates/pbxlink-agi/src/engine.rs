use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::connection::AgiConnection;
use crate::error::{AgiError, Result};
use crate::menu::{MenuCursor, MenuTree, Transition};
use crate::reply::Reply;

/// How a menu traversal ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    /// Reached a missing menu, an index past the end, or an item without a command.
    Exhausted { menu: String, index: usize },
    /// A command returned a non-200 or malformed reply.
    Failed {
        menu: String,
        index: usize,
        reply: Reply,
    },
    /// The peer hung up mid-traversal.
    HungUp { menu: String, index: usize },
}

/// Walk `tree` on `conn`, one command at a time, then close the connection.
///
/// Transport errors are returned after the connection is closed.
pub async fn run_menu<T>(conn: &mut AgiConnection<T>, tree: &MenuTree) -> Result<MenuOutcome>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let outcome = walk(conn, tree).await;
    conn.close().await;
    let outcome = outcome?;
    info!(peer = ?conn.peer(), selector = tree.selector(), ?outcome, "menu finished");
    Ok(outcome)
}

async fn walk<T>(conn: &mut AgiConnection<T>, tree: &MenuTree) -> Result<MenuOutcome>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut cursor = MenuCursor::new(tree);
    loop {
        let (menu, index) = cursor.position();
        let Some(command) = cursor.current_command() else {
            return Ok(MenuOutcome::Exhausted {
                menu: menu.to_string(),
                index,
            });
        };

        let reply = match conn.command(command).await {
            Ok(reply) => reply,
            Err(AgiError::Hangup) => {
                return Ok(MenuOutcome::HungUp {
                    menu: menu.to_string(),
                    index,
                })
            }
            Err(err) => return Err(err),
        };

        match cursor.on_reply(&reply) {
            Transition::Branch(target) => {
                debug!(peer = ?conn.peer(), from = menu, index, to = target, "menu branch");
            }
            Transition::Next => {}
            Transition::Stop => {
                return Ok(MenuOutcome::Failed {
                    menu: menu.to_string(),
                    index,
                    reply,
                })
            }
        }
    }
}
