//! `modest` - command-line front end for the Modest email client core.
//!
//! Inspects the account configuration, the protocol and folder registries,
//! and manages the local folders.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modest_core::{
    AccountManager, AuthProtocol, ConfigStore, ConnectionProtocol, LocalFolderType,
    MailOperationQueue, OperationId, OperationStatus, Progress, ProtocolInfo, QueueEvent,
    TransferFolder, TransportStoreProtocol, credentials, ensure_local_folders,
};

/// Command-line front end for the Modest email client core.
#[derive(Parser)]
#[command(name = "modest", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the known store, transport, security and auth protocols.
    Protocols,
    /// List the local folder types.
    Folders,
    /// List the configured accounts.
    Accounts,
    /// Create the local folders.
    Init,
    /// Remove an account, its server accounts and their passwords.
    Remove {
        /// Account name.
        account: String,
    },
    /// Copy a local folder into another folder.
    CopyFolder {
        /// Folder to copy.
        source: PathBuf,
        /// Folder receiving the copy.
        parent: PathBuf,
    },
    /// Move a local folder into another folder.
    MoveFolder {
        /// Folder to move.
        source: PathBuf,
        /// New parent folder.
        parent: PathBuf,
    },
}

/// Locations of the configuration database and local folders.
struct Paths {
    database: PathBuf,
    local_folders: PathBuf,
}

impl Paths {
    fn locate() -> Result<Self> {
        let base = dirs::data_dir()
            .context("No data directory on this platform")?
            .join("modest");
        std::fs::create_dir_all(&base)
            .with_context(|| format!("Cannot create {}", base.display()))?;
        Ok(Self {
            database: base.join("modest.db"),
            local_folders: base.join("local_folders"),
        })
    }

    async fn accounts(&self) -> Result<AccountManager> {
        let path = self
            .database
            .to_str()
            .context("Database path is not UTF-8")?;
        Ok(AccountManager::new(ConfigStore::new(path).await?))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modest=info,modest_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Command::Protocols => print_protocols(),
        Command::Folders => print_folders(),
        Command::Accounts => print_accounts(&Paths::locate()?).await?,
        Command::Init => {
            let paths = Paths::locate()?;
            for path in ensure_local_folders(&paths.local_folders).await? {
                println!("{}", path.display());
            }
        }
        Command::Remove { account } => remove_account(&Paths::locate()?, &account).await?,
        Command::CopyFolder { source, parent } => {
            transfer(TransferFolder::copy(source, parent)).await?;
        }
        Command::MoveFolder { source, parent } => {
            transfer(TransferFolder::r#move(source, parent)).await?;
        }
    }
    Ok(())
}

fn print_table<P: ProtocolInfo>(title: &str) {
    println!("{title}:");
    for proto in P::all() {
        println!("  {:<10} {}", proto.name(), proto.display_name());
    }
}

fn print_protocols() {
    print_table::<TransportStoreProtocol>("Store and transport");
    print_table::<ConnectionProtocol>("Connection security");
    print_table::<AuthProtocol>("Authentication");
}

fn print_folders() {
    for row in LocalFolderType::all() {
        println!("  {:<8} {}", row.name, row.display_name);
    }
}

async fn print_accounts(paths: &Paths) -> Result<()> {
    let mgr = paths.accounts().await?;
    let default = mgr.get_default_account().await?;

    for name in mgr.account_names(false).await? {
        let Some(data) = mgr.account_data(&name).await? else {
            continue;
        };
        let marker = if default.as_deref() == Some(name.as_str()) {
            '*'
        } else {
            ' '
        };
        let state = if data.enabled { "" } else { " (disabled)" };
        println!("{marker} {}{state} <{}>", data.display_name, data.email);
        for server in [&data.store_account, &data.transport_account]
            .into_iter()
            .flatten()
        {
            let port = server
                .effective_port()
                .map_or_else(String::new, |p| format!(":{p}"));
            println!(
                "    {} {}{port} ({}, {})",
                server.protocol.display_name(),
                server.hostname,
                server.security.display_name(),
                server.auth.display_name(),
            );
        }
    }
    Ok(())
}

async fn remove_account(paths: &Paths, name: &str) -> Result<()> {
    let mgr = paths.accounts().await?;
    let servers = mgr.remove_account(name, false).await?;
    for server in &servers {
        credentials::delete_password(server)?;
    }
    info!("Removed {name} and {} server accounts", servers.len());
    Ok(())
}

async fn transfer(task: TransferFolder) -> Result<()> {
    let queue = MailOperationQueue::new();
    let mut events = queue.subscribe();
    let handle = queue.add(task);
    let id = handle.id();

    let progress = tokio::spawn(async move {
        follow_progress(&mut events, id, |progress| {
            eprint!("\r{}/{}", progress.done, progress.total);
        })
        .await;
        eprintln!();
    });

    let outcome = handle.wait().await;
    let _ = progress.await;
    match (outcome.status, outcome.error) {
        (OperationStatus::Success, _) => Ok(()),
        (status, Some(error)) => bail!("{status:?}: {error}"),
        (status, None) => bail!("{status:?}"),
    }
}

/// Feed progress of operation `id` to `report` until it finishes.
///
/// Returns `false` if the queue went away first.
async fn follow_progress(
    events: &mut broadcast::Receiver<QueueEvent>,
    id: OperationId,
    mut report: impl FnMut(Progress),
) -> bool {
    loop {
        match events.recv().await {
            Ok(QueueEvent::Progress { id: op, progress }) if op == id => report(progress),
            Ok(QueueEvent::Finished { id: op, .. }) if op == id => return true,
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return false,
        }
    }
}
