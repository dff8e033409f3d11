use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use cardsmith_card::MockCard;
use cardsmith_init::{InputRequestFn, Personalizer, PinRole, ops_by_name};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod options;
mod profile;

#[derive(Parser)]
#[command(version, about = "PKCS#15 card personalization tool")]
struct Cli {
    /// Increase log verbosity (repeatable)
    #[arg(short = 'd', long = "debug", action = ArgAction::Count, global = true)]
    debug: u8,

    /// Card driver to personalize with
    #[arg(long, default_value = "soft", global = true)]
    driver: String,

    /// File with additional long options, one per line
    #[arg(long, global = true)]
    options_file: Option<PathBuf>,

    /// User PIN value (prompted when omitted)
    #[arg(long, global = true)]
    pin1: Option<String>,

    /// User PIN unblocking value
    #[arg(long, global = true)]
    puk1: Option<String>,

    /// Security officer PIN value
    #[arg(long, global = true)]
    pin2: Option<String>,

    /// Security officer PIN unblocking value
    #[arg(long, global = true)]
    puk2: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove the PKCS#15 application from the card
    EraseCard,

    /// Create the PKCS#15 application skeleton
    CreatePkcs15 {
        /// Token label stored in the token information file
        #[arg(long)]
        label: Option<String>,
    },

    /// Generate a key pair and store both halves
    GenerateKey {
        /// Key specification, e.g. `rsa/2048` or `dsa-1024`
        spec: String,

        /// Object identifier in hex
        #[arg(long)]
        id: Option<String>,

        /// Object label
        #[arg(long)]
        label: Option<String>,

        /// Ask the card to generate the key itself
        #[arg(long)]
        native: bool,

        /// Write the public key to this PEM file
        #[arg(long)]
        public_key_file: Option<PathBuf>,
    },

    /// Store an existing private key from a PEM file
    StoreKey {
        /// PEM file holding the private key
        file: PathBuf,

        /// Object identifier in hex
        #[arg(long)]
        id: Option<String>,

        /// Object label
        #[arg(long)]
        label: Option<String>,

        /// Write the matching public key to this PEM file
        #[arg(long)]
        public_key_file: Option<PathBuf>,
    },
}

fn setup_logging(debug: u8) {
    let filter = match debug {
        0 => "info",
        1 => "cardsmith_init=debug,cardsmith_card=debug,info",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

fn stdin_input() -> InputRequestFn {
    Box::new(|prompt| {
        eprint!("{prompt} ");
        let _ = io::stderr().flush();
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        line.trim_end_matches(['\r', '\n']).to_string()
    })
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    if let Some(path) = &cli.options_file {
        let args = options::merge_options_file(std::env::args(), path)
            .with_context(|| format!("reading options from {}", path.display()))?;
        cli = Cli::parse_from(args);
    }
    setup_logging(cli.debug);

    let ops = ops_by_name(&cli.driver)?;
    let mut session = Personalizer::new(MockCard::new(), ops, profile::builtin_profile())
        .with_input(stdin_input());

    for (ident, role, value) in [
        ("CHV1", PinRole::Pin, &cli.pin1),
        ("CHV1", PinRole::Puk, &cli.puk1),
        ("CHV2", PinRole::Pin, &cli.pin2),
        ("CHV2", PinRole::Puk, &cli.puk2),
    ] {
        if let (Some(value), Some(policy)) =
            (value, session.profile_mut().find_pin_by_ident(ident))
        {
            policy.set_secret(role, value.clone());
        }
    }

    match &cli.command {
        Commands::EraseCard => commands::erase_command(&mut session)?,
        Commands::CreatePkcs15 { label } => {
            commands::create_command(&mut session, label.as_deref())?
        }
        Commands::GenerateKey {
            spec,
            id,
            label,
            native,
            public_key_file,
        } => commands::generate_command(
            &mut session,
            spec,
            id.as_deref(),
            label.as_deref(),
            *native,
            public_key_file.as_deref(),
        )?,
        Commands::StoreKey {
            file,
            id,
            label,
            public_key_file,
        } => commands::store_command(
            &mut session,
            file,
            id.as_deref(),
            label.as_deref(),
            public_key_file.as_deref(),
        )?,
    }
    Ok(())
}
