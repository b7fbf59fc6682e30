//! beao-cli: command-line interface to a local BeaoCoin wallet.
//!
//! Every invocation opens the wallet file, runs one command, and saves.
//! There is no peer connection, so spends are built, signed and then
//! rejected by the offline broadcaster, which leaves the wallet unchanged.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use beao_core::address::Network;
use beao_core::constants::COIN;
use beao_core::types::{Hash256, Transaction};
use beao_wallet::{Broadcaster, FileStore, LockState, Recipient, SendOptions, Wallet, WalletConfig};

/// Unlock window for commands that need the keys.
const COMMAND_UNLOCK_SECS: u64 = 60;

/// BeaoCoin wallet command-line interface.
#[derive(Parser)]
#[command(name = "beao-cli")]
#[command(version, about = "Local BeaoCoin wallet")]
struct Cli {
    /// Data directory (default: platform data dir + /beao, or BEAO_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use testnet.
    #[arg(long, global = true)]
    testnet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new receiving address.
    NewAddress {
        #[arg(default_value = "")]
        label: String,
    },
    /// List the address book.
    Addresses,
    /// Add someone else's address to the address book.
    ImportAddress { address: String, label: String },
    /// Change an address book label.
    SetLabel { address: String, label: String },
    /// Remove a sending address.
    DeleteAddress { address: String },
    /// Show confirmed, unconfirmed and immature balances.
    Balance,
    /// List wallet transactions, newest first.
    History,
    /// Show the status of one transaction.
    Status { txid: String },
    /// Send coins.
    Send(SendArgs),
    /// Sign a message with one of the wallet's addresses.
    SignMessage { address: String, message: String },
    /// Check a signed message.
    VerifyMessage { address: String, signature: String, message: String },
    /// Show which address signed a message.
    RecoverSigner { signature: String, message: String },
    /// Encrypt the wallet with a passphrase.
    Encrypt,
    /// Change the wallet passphrase.
    ChangePassphrase,
    /// Remove wallet encryption.
    Decrypt,
    /// Write a copy of the wallet file.
    Backup { destination: PathBuf },
    /// Set the fee rate per 1000 bytes, in coins.
    SetFee { amount: String },
    /// Show or refill the key pool.
    Keypool {
        #[arg(long)]
        top_up: bool,
    },
    /// Show chain synchronization progress.
    SyncStatus,
    /// Show the mining configuration and status.
    Mining,
}

#[derive(Args)]
struct SendArgs {
    /// Recipients as ADDRESS=AMOUNT; amounts in coins (e.g. 10.5).
    #[arg(required = true)]
    recipients: Vec<String>,

    /// Pay exactly this fee, in coins.
    #[arg(long)]
    fee: Option<String>,

    /// Accept the computed fee for a large transaction.
    #[arg(long)]
    confirm_fee: bool,
}

/// Rejects every broadcast; the CLI has no peer connection.
struct OfflineBroadcaster;

impl Broadcaster for OfflineBroadcaster {
    fn broadcast(&self, tx: &Transaction) -> Result<(), String> {
        debug!(outputs = tx.outputs.len(), "broadcast requested while offline");
        Err("no network connection".into())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = WalletConfig::from_env().context("Invalid BEAO_* configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if cli.testnet {
        config.network = Network::Testnet;
    }

    let path = config.wallet_path();
    let wallet = Wallet::open(config, FileStore::new(path.clone()), OfflineBroadcaster)
        .with_context(|| format!("Failed to open wallet at {}", path.display()))?;

    run(&wallet, cli.command)
}

fn run(wallet: &Wallet, command: Commands) -> Result<()> {
    match command {
        Commands::NewAddress { label } => {
            let address = wallet.generate_address(&label).context("Failed to create address")?;
            println!("{address}");
        }
        Commands::Addresses => {
            let mut entries = wallet.address_book();
            entries.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.address.to_string().cmp(&b.address.to_string())));
            for e in entries {
                println!("{:<10} {}  {}", format!("{:?}", e.kind), e.address, e.label);
            }
        }
        Commands::ImportAddress { address, label } => {
            let address = wallet.parse_address(&address)?;
            wallet.import_sending_address(address, &label)?;
        }
        Commands::SetLabel { address, label } => {
            let address = wallet.parse_address(&address)?;
            wallet.set_label(&address, &label)?;
        }
        Commands::DeleteAddress { address } => {
            let address = wallet.parse_address(&address)?;
            wallet.delete_sending_address(&address)?;
        }
        Commands::Balance => {
            let b = wallet.balance();
            println!("Confirmed:   {}", format_amount(b.confirmed));
            println!("Unconfirmed: {}", format_amount(b.unconfirmed));
            println!("Immature:    {}", format_amount(b.immature));
            println!("Total:       {}", format_amount(b.total()));
        }
        Commands::History => {
            for tx in wallet.transactions() {
                let when = chrono::DateTime::from_timestamp(tx.received_at as i64, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                let sign = if tx.net < 0 { "-" } else { "+" };
                println!(
                    "{when}  {sign}{}  {:?}  {}  {}",
                    format_amount(tx.net.unsigned_abs()),
                    tx.kind,
                    tx.status,
                    tx.txid
                );
            }
        }
        Commands::Status { txid } => {
            let txid = Hash256::from_hex(&txid).ok_or_else(|| anyhow!("Invalid txid: {txid}"))?;
            let status = wallet.transaction_status(&txid)?;
            println!("{status}");
            if let Some(warning) = status.warning() {
                println!("Warning: {warning}");
            }
        }
        Commands::Send(args) => send(wallet, args)?,
        Commands::SignMessage { address, message } => {
            let address = wallet.parse_address(&address)?;
            unlock_for_command(wallet)?;
            println!("{}", wallet.sign_message(&address, &message)?);
        }
        Commands::VerifyMessage { address, signature, message } => {
            let address = wallet.parse_address(&address)?;
            if wallet.verify_message(&address, &message, &signature)? {
                println!("Signature OK");
            } else {
                bail!("Signature does not match {address}");
            }
        }
        Commands::RecoverSigner { signature, message } => match wallet.recover_signer(&message, &signature)? {
            Some((address, Some(label))) => println!("{address} ({label})"),
            Some((address, None)) => println!("{address}"),
            None => bail!("Signature is not valid for this message"),
        },
        Commands::Encrypt => {
            let passphrase = prompt_password("New passphrase")?;
            if passphrase != prompt_password("Confirm passphrase")? {
                bail!("Passphrases do not match");
            }
            wallet.encrypt(&passphrase).context("Failed to encrypt wallet")?;
            println!("Wallet encrypted. Back it up again: older backups hold the plain keys.");
        }
        Commands::ChangePassphrase => {
            let old = prompt_password("Current passphrase")?;
            let new = prompt_password("New passphrase")?;
            if new != prompt_password("Confirm passphrase")? {
                bail!("Passphrases do not match");
            }
            wallet.change_passphrase(&old, &new)?;
        }
        Commands::Decrypt => {
            let passphrase = prompt_password("Passphrase")?;
            wallet.decrypt(&passphrase)?;
        }
        Commands::Backup { destination } => {
            wallet
                .backup(&destination)
                .with_context(|| format!("Failed to back up to {}", destination.display()))?;
            println!("Backup written to {}", destination.display());
        }
        Commands::SetFee { amount } => {
            wallet.set_pay_tx_fee(parse_amount(&amount)?)?;
            println!("Fee rate: {} per kB", format_amount(wallet.pay_tx_fee()));
        }
        Commands::Keypool { top_up } => {
            if top_up {
                unlock_for_command(wallet)?;
                let added = wallet.top_up_keypool()?;
                println!("Added {added} keys");
            }
            println!("Key pool: {}", wallet.keypool_size());
        }
        Commands::SyncStatus => {
            wallet.refresh_sync();
            let p = wallet.sync_progress();
            println!("Phase:     {}", p.phase);
            println!("Height:    {} of ~{}", p.height, p.estimated_total);
            println!("Remaining: {} blocks ({:.1}%)", p.blocks_remaining, p.progress * 100.0);
            match p.last_block_age {
                Some(age) => println!("Last block: {age}"),
                None => println!("Last block: none"),
            }
        }
        Commands::Mining => println!("{}", wallet.mining_status()),
    }
    Ok(())
}

fn send(wallet: &Wallet, args: SendArgs) -> Result<()> {
    let recipients = args
        .recipients
        .iter()
        .map(|spec| {
            let (address, amount) =
                spec.split_once('=').ok_or_else(|| anyhow!("Expected ADDRESS=AMOUNT, got {spec}"))?;
            Ok(Recipient::new(wallet.parse_address(address)?, parse_amount(amount)?))
        })
        .collect::<Result<Vec<_>>>()?;
    let options = SendOptions {
        fee_override: args.fee.as_deref().map(parse_amount).transpose()?,
        confirm_fee: args.confirm_fee,
        ..SendOptions::default()
    };

    unlock_for_command(wallet)?;
    let txid = wallet.send(recipients, options)?;
    println!("Sent: {txid}");
    Ok(())
}

/// Prompt for the passphrase if the keys are locked.
fn unlock_for_command(wallet: &Wallet) -> Result<()> {
    if wallet.lock_state() == LockState::Locked {
        let passphrase = prompt_password("Wallet passphrase")?;
        wallet.unlock(&passphrase, Some(Duration::from_secs(COMMAND_UNLOCK_SECS)))?;
    }
    Ok(())
}

/// Prompt for a password securely (no echo).
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{prompt}: ")).context("Failed to read password")
}

/// Coins with up to 8 decimals to beos, without going through floats.
fn parse_amount(s: &str) -> Result<u64> {
    let s = s.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        bail!("Invalid amount: {s:?}");
    }
    if frac.len() > 8 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        bail!("Invalid amount: {s:?}");
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().context("Invalid amount")? };
    let frac: u64 = format!("{frac:0<8}").parse().context("Invalid amount")?;
    whole
        .checked_mul(COIN)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| anyhow!("Amount too large: {s}"))
}

fn format_amount(beos: u64) -> String {
    format!("{}.{:08} BEAO", beos / COIN, beos % COIN)
}
