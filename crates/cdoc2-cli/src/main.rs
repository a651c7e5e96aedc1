//! cdoc2: container command-line interface
//!
//! Commands:
//!   keygen   - generate an EC key pair (PKCS#8 private, SPKI public PEM)
//!   create   - encrypt a file for one or more recipient public keys
//!   decrypt  - decrypt a container with a recipient private key
//!   info     - list a container's recipients without decrypting

use anyhow::{bail, Context, Result};
use cdoc2_crypto::{
    ec_keys, generate_fmk, EcKeyPair, EcPublicKey, EllipticCurve, EncryptionKeyMaterial, Envelope,
    ParseOptions, PublicKey, Recipient,
};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cdoc2",
    version,
    about = "cdoc2 encrypted container tool",
    long_about = "cdoc2: create, inspect and decrypt CDOC2 containers with EC recipient keys"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CDOC2_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an EC key pair
    Keygen {
        /// Curve name (secp384r1, secp256r1 or an alias such as P-384)
        #[arg(long, default_value = "secp384r1")]
        curve: String,
        /// Output file for the PKCS#8 private key
        #[arg(long)]
        private: PathBuf,
        /// Output file for the SPKI public key
        #[arg(long)]
        public: PathBuf,
    },

    /// Encrypt a file into a container
    ///
    /// A fresh file master key and sender key pair are generated for every
    /// container; all recipients must use the same curve.
    Create {
        /// Output container path
        #[arg(long, short = 'f')]
        file: PathBuf,
        /// Recipient public key PEM (repeatable)
        #[arg(long = "pubkey", required = true)]
        pubkeys: Vec<PathBuf>,
        /// Plaintext input
        input: PathBuf,
    },

    /// Decrypt a container
    Decrypt {
        /// Input container path
        #[arg(long, short = 'f')]
        file: PathBuf,
        /// Recipient private key PEM (PKCS#8 or SEC1)
        #[arg(long, short = 'k')]
        key: PathBuf,
        /// Plaintext output path
        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Show the recipients of a container
    Info {
        /// Input container path
        #[arg(long, short = 'f')]
        file: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    match cli.command {
        Commands::Keygen {
            curve,
            private,
            public,
        } => cmd_keygen(&curve, &private, &public),
        Commands::Create {
            file,
            pubkeys,
            input,
        } => cmd_create(&file, &pubkeys, &input),
        Commands::Decrypt { file, key, output } => cmd_decrypt(&file, &key, &output),
        Commands::Info { file } => {
            let stdout = std::io::stdout();
            cmd_info(&file, &mut stdout.lock())
        }
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── `cdoc2 keygen` ────────────────────────────────────────────────────────────

fn cmd_keygen(curve: &str, private: &Path, public: &Path) -> Result<()> {
    let curve = EllipticCurve::for_name(curve)?;
    let pair = EcKeyPair::generate(curve)?;

    let private_pem = pair.to_pkcs8_pem()?;
    write_private(private, private_pem.as_bytes())
        .with_context(|| format!("writing private key: {}", private.display()))?;
    std::fs::write(public, pair.public_key().to_pem()?)
        .with_context(|| format!("writing public key: {}", public.display()))?;

    info!(%curve, private = %private.display(), public = %public.display(), "key pair generated");
    println!("Generated {curve} key pair");
    println!("  private: {}", private.display());
    println!("  public:  {}", public.display());
    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

// ── `cdoc2 create` ────────────────────────────────────────────────────────────

fn cmd_create(output: &Path, pubkeys: &[PathBuf], input: &Path) -> Result<()> {
    let materials = pubkeys
        .iter()
        .map(|path| load_recipient(path))
        .collect::<Result<Vec<_>>>()?;

    let curve = match materials.first().and_then(|m| m.public_key()) {
        Some(PublicKey::Ec(key)) => key.curve(),
        Some(PublicKey::Rsa(_)) => bail!("RSA recipients are not supported by this container version"),
        None => bail!("at least one --pubkey is required"),
    };

    let sender = EcKeyPair::generate(curve)?;
    let fmk = generate_fmk()?;
    let envelope = Envelope::prepare_for_materials(fmk.as_bytes(), &sender, &materials)?;

    let reader = BufReader::new(
        File::open(input).with_context(|| format!("opening input: {}", input.display()))?,
    );
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("creating container: {}", output.display()))?,
    );
    envelope.encrypt(reader, &mut writer)?;
    writer
        .flush()
        .with_context(|| format!("writing container: {}", output.display()))?;

    println!(
        "Encrypted {} → {} ({} recipient(s), {curve})",
        input.display(),
        output.display(),
        materials.len()
    );
    Ok(())
}

fn load_recipient(path: &Path) -> Result<EncryptionKeyMaterial> {
    let pem = std::fs::read_to_string(path)
        .with_context(|| format!("reading public key: {}", path.display()))?;
    let key = PublicKey::from_pem(&pem)
        .with_context(|| format!("parsing public key: {}", path.display()))?;
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(%label, algorithm = key.algorithm(), "recipient loaded");
    Ok(EncryptionKeyMaterial::from_public_key(key, label))
}

// ── `cdoc2 decrypt` ───────────────────────────────────────────────────────────

fn cmd_decrypt(container: &Path, key: &Path, output: &Path) -> Result<()> {
    let pem = std::fs::read_to_string(key)
        .with_context(|| format!("reading private key: {}", key.display()))?;
    let pair = EcKeyPair::from_pem(&pem)
        .with_context(|| format!("parsing private key: {}", key.display()))?;

    let reader = BufReader::new(
        File::open(container).with_context(|| format!("opening container: {}", container.display()))?,
    );
    let plaintext = Envelope::decrypt(reader, &pair)
        .with_context(|| format!("decrypting {}", container.display()))?;

    std::fs::write(output, &plaintext)
        .with_context(|| format!("writing output: {}", output.display()))?;
    println!(
        "Decrypted {} → {} ({} bytes)",
        container.display(),
        output.display(),
        plaintext.len()
    );
    Ok(())
}

// ── `cdoc2 info` ──────────────────────────────────────────────────────────────

fn cmd_info(container: &Path, out: &mut impl Write) -> Result<()> {
    let mut reader = BufReader::new(
        File::open(container).with_context(|| format!("opening container: {}", container.display()))?,
    );
    let header = Envelope::parse_header(&mut reader, &ParseOptions::default())
        .with_context(|| format!("parsing {}", container.display()))?;

    writeln!(out, "{}", container.display())?;
    writeln!(out, "  header:     {} bytes", header.header.len())?;
    writeln!(out, "  recipients: {}", header.recipients.len())?;
    for (i, recipient) in header.recipients.iter().enumerate() {
        match recipient {
            Recipient::Ecc(r) => writeln!(
                out,
                "  [{i}] ecc_public_key  {}  {}",
                r.curve,
                fingerprint(&r.recipient_public_key)?
            )?,
            Recipient::KeyServer(r) => writeln!(
                out,
                "  [{i}] key_server      {}  server={} transaction={}",
                r.curve, r.key_server_id, r.transaction_id
            )?,
        }
    }
    Ok(())
}

/// First 8 bytes of the X coordinate, hex
fn fingerprint(key: &EcPublicKey) -> Result<String> {
    let tls = ec_keys::encode_tls(key.curve(), key)?;
    Ok(hex::encode(&tls[1..9]))
}
