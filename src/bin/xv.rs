//! xv CLI - encrypt and decrypt piped data
//!
//! Reads input from stdin when it is piped, or from the TEXT argument
//! otherwise, and writes the result to stdout. Status lines and logs go to
//! stderr.

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use xv::commands::{self, DecryptReport, EncryptReport, InitReport};
use xv::encoding::Encoding;
use xv::error::Result;
use xv::key::{self, FileKeyStore, Key};
use xv::pipeline::CipherConfig;

#[derive(Parser)]
#[command(name = "xv")]
#[command(version)]
#[command(about = "Encrypt and decrypt data with AES-256-GCM, with standard command piping support.", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    encrypt: EncryptArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt data (default command if none is given)
    #[command(alias = "e")]
    Enc(EncryptArgs),

    /// Decrypt data
    #[command(alias = "d")]
    Dec(DecryptArgs),

    /// Create the key file (eg. xv init <encryption key>)
    Init(InitArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the key file [default: ~/.xv]
    #[arg(long, value_name = "FILE", env = "XV_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Log filter to use when RUST_LOG is not set
    #[arg(long, value_name = "FILTER", default_value = "warn")]
    log_level: String,
}

#[derive(Args)]
struct EncryptArgs {
    /// How the encrypted data is encoded. The same decoder must be used for decryption
    #[arg(short, long, value_enum, default_value_t = Encoding::Base64)]
    encoder: Encoding,

    /// Do not verify the encrypted data or print its checksum
    #[arg(long)]
    no_verify: bool,

    /// Key to use instead of the key file. It must be at least 32 bytes
    #[arg(short, long, env = "XV_KEY", hide_env_values = true)]
    key: Option<String>,

    /// The text to encrypt (ignored when stdin is piped)
    text: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct DecryptArgs {
    /// How the encrypted data is encoded. It must match the encoder used for encryption
    #[arg(short, long, value_enum, default_value_t = Encoding::Base64)]
    decoder: Encoding,

    /// Do not print the checksum of the decoded data
    #[arg(long)]
    no_checksum: bool,

    /// Key to use instead of the key file. It must be at least 32 bytes
    #[arg(short, long, env = "XV_KEY", hide_env_values = true)]
    key: Option<String>,

    /// The encrypted text to decrypt (ignored when stdin is piped)
    text: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct InitArgs {
    /// Encryption key (minimum length: 32 bytes)
    key: String,

    /// Overwrite an existing key file without asking
    #[arg(short, long)]
    force: bool,

    #[command(flatten)]
    common: CommonArgs,
}

impl Commands {
    fn common(&self) -> &CommonArgs {
        match self {
            Commands::Enc(args) => &args.common,
            Commands::Dec(args) => &args.common,
            Commands::Init(args) => &args.common,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Enc(cli.encrypt));
    init_tracing(&command.common().log_level);

    let result = match command {
        Commands::Enc(args) => run_encrypt(args),
        Commands::Dec(args) => run_decrypt(args),
        Commands::Init(args) => run_init(args),
    };

    if let Err(e) = result {
        tracing::debug!(category = ?e.category, kind = ?e.kind, "command failed");
        eprintln!("Error: {}", e.chain_message());
        process::exit(1);
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_ansi(io::stderr().is_terminal()),
        )
        .init();
}

fn run_encrypt(args: EncryptArgs) -> Result<()> {
    let key = resolve_key(args.key.as_deref(), &args.common)?;
    let mut input = open_input(args.text);
    let report = commands::encrypt(
        &mut *input,
        &mut io::stdout().lock(),
        &key,
        CipherConfig::new(args.encoder),
        !args.no_verify,
    )?;

    match report {
        EncryptReport::Skipped => tracing::debug!("empty input, nothing to encrypt"),
        EncryptReport::Encrypted { checksum } => tracing::debug!(%checksum, "encrypted"),
        EncryptReport::Verified { checksum } => print_status(&checksum.to_string()),
        EncryptReport::VerificationFailed => print_status("VERIFICATION FAILED"),
    }
    Ok(())
}

fn run_decrypt(args: DecryptArgs) -> Result<()> {
    let key = resolve_key(args.key.as_deref(), &args.common)?;
    let mut input = open_input(args.text);
    let report = commands::decrypt(
        &mut *input,
        &mut io::stdout().lock(),
        &key,
        CipherConfig::new(args.decoder),
    )?;

    match report {
        DecryptReport::Skipped => tracing::debug!("empty input, nothing to decrypt"),
        DecryptReport::Decrypted { checksum } if !args.no_checksum => {
            print_status(&checksum.to_string())
        }
        DecryptReport::Decrypted { .. } => {}
    }
    Ok(())
}

fn run_init(args: InitArgs) -> Result<()> {
    let store = key_store(&args.common)?;
    let mut confirm = |path: &Path| {
        args.force
            || ask_for_confirmation(&format!(
                "The key file '{}' already exists. Overwrite",
                path.display()
            ))
    };

    match commands::init_key(&store, &args.key, &mut confirm)? {
        InitReport::Created | InitReport::Overwritten => {
            println!(
                "The key file {} has been created successfully",
                store.path().display()
            );
        }
        InitReport::Kept => {}
    }
    Ok(())
}

fn key_store(common: &CommonArgs) -> Result<FileKeyStore> {
    match &common.key_file {
        Some(path) => Ok(FileKeyStore::new(path)),
        None => FileKeyStore::default_location(),
    }
}

fn resolve_key(explicit: Option<&str>, common: &CommonArgs) -> Result<Key> {
    let store = key_store(common)?;
    key::resolve(explicit, &store)
}

/// Piped stdin wins; otherwise the TEXT argument, if any, is the input.
fn open_input(text: Option<String>) -> Box<dyn Read> {
    if stdin_is_piped() {
        if text.is_some() {
            tracing::debug!("stdin is piped, ignoring the TEXT argument");
        }
        return Box::new(io::stdin());
    }
    match text {
        Some(text) => Box::new(io::Cursor::new(text.into_bytes())),
        None => Box::new(io::empty()),
    }
}

/// Whether stdin is a pipe or a file. Character devices (a terminal or
/// /dev/null) do not count.
#[cfg(unix)]
fn stdin_is_piped() -> bool {
    use std::os::fd::AsFd;
    use std::os::unix::fs::FileTypeExt;

    let Ok(fd) = io::stdin().as_fd().try_clone_to_owned() else {
        return false;
    };
    match std::fs::File::from(fd).metadata() {
        Ok(metadata) => !metadata.file_type().is_char_device(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn stdin_is_piped() -> bool {
    !io::stdin().is_terminal()
}

fn print_status(msg: &str) {
    // Keep the status off the same line as output shown on a terminal.
    if io::stdout().is_terminal() {
        eprintln!();
    }
    eprintln!("{}", msg);
}

fn ask_for_confirmation(question: &str) -> bool {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        eprint!("{} [y/n]?: ", question);
        let _ = io::stderr().flush();
        let Some(Ok(line)) = lines.next() else {
            return false;
        };
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return true,
            "n" | "no" | "q" | "quit" | "exit" => return false,
            _ => {}
        }
    }
}
