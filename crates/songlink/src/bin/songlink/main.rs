#![deny(rust_2018_idioms)]

use alloy::providers::{DynProvider, Provider};
use anyhow::Context;
use songlink_common::{consts::VERSION, Chain};
use songlink_ethereum::{Confirmation, Wallet};
use songlink_lib::portal::{Portal, PortalConfig, SubmitError};
use songlink_lib::render::{render_entries, render_entry};
use songlink_lib::session::{ConnectOutcome, SessionManager, NO_WALLET_ALERT};
use songlink_link_check::LinkValidator;
use tracing::info;

use crate::config::{Command, Config, NetworkConfig};

mod config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }

    setup_tracing();

    let config = Config::parse();

    info!(version = VERSION, "🏁 Starting songlink.");

    let provider = match &config.wallet {
        Some(wallet) => Some(
            songlink_ethereum::connect_http(wallet.url.clone(), wallet.password.clone())
                .context("Creating wallet transport")?,
        ),
        None => None,
    };

    let chain = resolve_chain(&config.network, provider.as_ref()).await?;
    info!(%chain, contract=%config.contract_address, "Using playlist portal");

    let wallet = match provider {
        Some(provider) => Wallet::new(provider),
        None => Wallet::unavailable(),
    };

    let validator = match config.link_check_live {
        true => LinkValidator::with_live_check().context("Creating link checker")?,
        false => LinkValidator::local(),
    };

    let mut portal = Portal::new(
        SessionManager::new(wallet),
        validator,
        PortalConfig {
            contract: config.contract_address,
            confirmation: Confirmation {
                poll_interval: config.confirmation_poll_interval,
                timeout: config.confirmation_timeout,
            },
            events_poll_interval: config.events_poll_interval,
        },
    );

    let connected = portal.start().await;

    match config.command {
        Command::Connect => {
            if connected {
                print_status(&portal);
                return Ok(());
            }

            match portal.connect().await {
                ConnectOutcome::Connected(_) => print_status(&portal),
                ConnectOutcome::Alert(alert) => anyhow::bail!(alert),
                ConnectOutcome::NotConnected => {
                    anyhow::bail!("Wallet did not authorize an account")
                }
            }
        }
        Command::Submit { url } => {
            require_connection(&portal)?;

            let result = portal.submit(&url).await;
            print_status(&portal);

            match result {
                Ok(hash) => println!("Transaction: {hash}"),
                Err(e @ SubmitError::NotConnected) => return Err(e.into()),
                Err(e) => return Err(e).context("Submitting playlist"),
            }
        }
        Command::List { follow } => {
            require_connection(&portal)?;

            let view = portal.view();
            print!("{}", render_entries(&view.snapshot(), &chain));

            if follow {
                follow_entries(&portal, &chain, config.events_poll_interval).await?;
            }
        }
        Command::Count => {
            require_connection(&portal)?;

            let count = portal.total_count().await?;
            println!("Total Number of Playlist: {count}");
        }
    }

    Ok(())
}

fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Maps the configured network onto a [Chain], checking it against the wallet.
async fn resolve_chain(
    network: &NetworkConfig,
    provider: Option<&DynProvider>,
) -> anyhow::Result<Chain> {
    let wallet_chain_id = match provider {
        Some(provider) => Some(provider.get_chain_id().await.context(
            r"Determine wallet chain.

Hint: Make sure the provided wallet.url and wallet.password are good.",
        )?),
        None => None,
    };

    let chain = match network {
        NetworkConfig::Mainnet => Chain::Mainnet,
        NetworkConfig::Rinkeby => Chain::Rinkeby,
        NetworkConfig::Sepolia => Chain::Sepolia,
        NetworkConfig::Custom { explorer } => Chain::Custom {
            chain_id: wallet_chain_id.context(
                "'--network custom' takes its chain ID from the wallet and requires '--wallet.url'",
            )?,
            explorer: explorer.clone(),
        },
    };

    if let Some(id) = wallet_chain_id {
        if id != chain.chain_id() {
            tracing::warn!(
                wallet_chain_id=%id,
                %chain,
                "Wallet is on a different chain than the configured network"
            );
        }
    }

    Ok(chain)
}

fn require_connection(portal: &Portal) -> anyhow::Result<()> {
    if portal.gateway().is_some() {
        return Ok(());
    }

    let status = portal.session().status();
    match status.is_empty() {
        true => anyhow::bail!(NO_WALLET_ALERT),
        false => anyhow::bail!("{status}"),
    }
}

fn print_status(portal: &Portal) {
    let status = portal.session().status();
    if !status.is_empty() {
        println!("{status}");
    }
}

/// Prints newly submitted playlists until interrupted.
async fn follow_entries(
    portal: &Portal,
    chain: &Chain,
    interval: std::time::Duration,
) -> anyhow::Result<()> {
    let subscription = portal.subscribe().await?;
    let view = portal.view();
    let mut printed = view.len();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let entries = view.snapshot();
                for entry in entries.iter().skip(printed) {
                    print!("\n{}", render_entry(entry, chain));
                }
                printed = entries.len();
            }
        }
    }

    subscription
        .unsubscribe()
        .await
        .context("Unsubscribing from playlist events")?;

    Ok(())
}
