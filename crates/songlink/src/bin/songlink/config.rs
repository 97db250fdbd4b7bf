use std::time::Duration;

use alloy::primitives::Address;
use clap::{CommandFactory, Parser};
use url::Url;

use songlink_common::consts::VERSION;

#[derive(Parser)]
#[command(name = "songlink")]
#[command(version = VERSION)]
#[command(
    about = "Share your favourite Spotify playlists on-chain through the SongLink portal contract."
)]
struct Cli {
    #[arg(
        long = "wallet.url",
        long_help = r"JSON-RPC endpoint of the wallet which holds your account. It must answer eth_accounts, eth_requestAccounts and eth_sendTransaction, e.g. a local node with unlocked accounts or a wallet bridge.

Without it no wallet is available and only the wallet-less commands work.

Examples:
    anvil:  http://localhost:8545
    geth:   http://localhost:8545",
        value_name = "HTTP(s) URL",
        value_hint = clap::ValueHint::Url,
        env = "SONGLINK_WALLET_URL"
    )]
    wallet_url: Option<Url>,

    #[arg(
        long = "wallet.password",
        long_help = "The optional password to use for the wallet endpoint",
        value_name = None,
        env = "SONGLINK_WALLET_PASSWORD"
    )]
    wallet_password: Option<String>,

    #[clap(flatten)]
    network: NetworkCli,

    #[arg(
        long = "contract.address",
        long_help = "Address of the playlist portal contract",
        value_name = "ADDRESS",
        default_value_t = songlink_ethereum::contract::DEFAULT_ADDRESS,
        env = "SONGLINK_CONTRACT_ADDRESS"
    )]
    contract_address: Address,

    #[arg(
        long = "link-check.live",
        long_help = "Confirm that a playlist link is reachable before submitting it",
        action = clap::ArgAction::Set,
        default_value = "false",
        env = "SONGLINK_LINK_CHECK_LIVE"
    )]
    link_check_live: bool,

    #[arg(
        long = "events.poll-interval",
        long_help = "How often to poll the wallet for new playlist events, in seconds",
        value_name = "SECONDS",
        default_value = "4",
        env = "SONGLINK_EVENTS_POLL_INTERVAL"
    )]
    events_poll_interval: std::num::NonZeroU64,

    #[arg(
        long = "confirmation.poll-interval",
        long_help = "How often to poll for the receipt of a submitted transaction, in seconds",
        value_name = "SECONDS",
        default_value = "4",
        env = "SONGLINK_CONFIRMATION_POLL_INTERVAL"
    )]
    confirmation_poll_interval: std::num::NonZeroU64,

    #[arg(
        long = "confirmation.timeout",
        long_help = "How long to wait for a submitted transaction to be mined, in seconds",
        value_name = "SECONDS",
        default_value = "600",
        env = "SONGLINK_CONFIRMATION_TIMEOUT"
    )]
    confirmation_timeout: std::num::NonZeroU64,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct NetworkCli {
    #[arg(
        long = "network",
        long_help = r"The Ethereum network the portal contract lives on. Used to link addresses to the block explorer.

Note that 'custom' requires also setting the --explorer-url option.",
        value_enum,
        default_value = "rinkeby",
        env = "SONGLINK_NETWORK"
    )]
    network: Network,

    #[arg(
        long = "explorer-url",
        value_name = "URL",
        value_hint = clap::ValueHint::Url,
        long_help = "Block explorer of a custom network. Requires '--network custom'.",
        env = "SONGLINK_EXPLORER_URL",
        required_if_eq("network", Network::Custom)
    )]
    explorer_url: Option<Url>,
}

#[derive(clap::ValueEnum, Clone, Copy, PartialEq, Eq)]
enum Network {
    Mainnet,
    Rinkeby,
    Sepolia,
    Custom,
}

impl From<Network> for clap::builder::OsStr {
    fn from(value: Network) -> Self {
        match value {
            Network::Mainnet => "mainnet",
            Network::Rinkeby => "rinkeby",
            Network::Sepolia => "sepolia",
            Network::Custom => "custom",
        }
        .into()
    }
}

#[derive(clap::Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Ask the wallet to authorize an account.
    Connect,
    /// Submit a Spotify playlist link.
    Submit {
        #[arg(value_name = "URL")]
        url: String,
    },
    /// List the submitted playlists, newest first.
    List {
        /// Keep running and print playlists as they are submitted.
        #[arg(long)]
        follow: bool,
    },
    /// Print the number of submitted playlists as counted by the contract.
    Count,
}

pub struct Config {
    pub wallet: Option<WalletConfig>,
    pub network: NetworkConfig,
    pub contract_address: Address,
    pub link_check_live: bool,
    pub events_poll_interval: Duration,
    pub confirmation_poll_interval: Duration,
    pub confirmation_timeout: Duration,
    pub command: Command,
}

pub struct WalletConfig {
    pub url: Url,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkConfig {
    Mainnet,
    Rinkeby,
    Sepolia,
    /// The chain ID is taken from the wallet.
    Custom { explorer: Url },
}

impl NetworkConfig {
    fn from_components(args: NetworkCli) -> Self {
        use Network::*;
        match (args.network, args.explorer_url) {
            (Custom, Some(explorer)) => NetworkConfig::Custom { explorer },
            (Custom, None) => {
                unreachable!("`--network custom` requirements are handled by clap derive")
            }
            (non_custom, None) => match non_custom {
                Mainnet => NetworkConfig::Mainnet,
                Rinkeby => NetworkConfig::Rinkeby,
                Sepolia => NetworkConfig::Sepolia,
                Custom => unreachable!("Network::Custom handled in outer arm already"),
            },
            // clap does not support disallowing args based on an enum value, so we have check for
            // `--network non-custom` + `--explorer-url` manually.
            (_, Some(_)) => {
                use clap::error::ErrorKind;

                Cli::command()
                    .error(
                        ErrorKind::ArgumentConflict,
                        "--explorer-url may only be used with --network custom",
                    )
                    .exit()
            }
        }
    }
}

impl Config {
    pub fn parse() -> Self {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Self {
        let wallet = cli.wallet_url.map(|url| WalletConfig {
            url,
            password: cli.wallet_password,
        });

        Config {
            wallet,
            network: NetworkConfig::from_components(cli.network),
            contract_address: cli.contract_address,
            link_check_live: cli.link_check_live,
            events_poll_interval: Duration::from_secs(cli.events_poll_interval.get()),
            confirmation_poll_interval: Duration::from_secs(cli.confirmation_poll_interval.get()),
            confirmation_timeout: Duration::from_secs(cli.confirmation_timeout.get()),
            command: cli.command,
        }
    }
}
