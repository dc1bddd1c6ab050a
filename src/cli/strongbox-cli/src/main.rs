//! Strongbox CLI - Command line interface.

mod config;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strongbox_crypto::keys::{generate_key_pair, generate_symmetric_key_of};
use strongbox_crypto::{asymmetric, random, symmetric, AesKeySize, CipherMode};
use strongbox_otp::{CounterEncoding, HmacAlgorithm, OtpConfig, OtpGenerator, OtpSettings};

use crate::config::Config;

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "strongbox")]
#[command(about = "Strongbox CLI - AES, RSA and one-time password tools")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "STRONGBOX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// AES symmetric encryption
    Aes {
        #[command(subcommand)]
        command: AesCommands,
    },
    /// RSA block-chunked encryption
    Rsa {
        #[command(subcommand)]
        command: RsaCommands,
    },
    /// Time-based one-time passwords
    Otp {
        #[command(subcommand)]
        command: OtpCommands,
    },
}

#[derive(Subcommand)]
enum AesCommands {
    /// Generate a random AES key (printed as Base64)
    Keygen {
        /// Key size in bits (128, 192 or 256)
        #[arg(long)]
        bits: Option<usize>,
    },
    /// Encrypt text, printing Base64 ciphertext
    Encrypt {
        /// Base64-encoded AES key
        #[arg(long, env = "STRONGBOX_AES_KEY")]
        key: String,
        /// Cipher mode (cbc, gcm, ecb)
        #[arg(long)]
        mode: Option<CipherMode>,
        /// Plaintext
        text: String,
    },
    /// Decrypt Base64 ciphertext
    Decrypt {
        /// Base64-encoded AES key
        #[arg(long, env = "STRONGBOX_AES_KEY")]
        key: String,
        /// Cipher mode (cbc, gcm, ecb)
        #[arg(long)]
        mode: Option<CipherMode>,
        /// Base64 ciphertext
        ciphertext: String,
    },
}

#[derive(Subcommand)]
enum RsaCommands {
    /// Generate an RSA key pair
    Keygen {
        /// Modulus size in bits (multiple of 64)
        #[arg(long)]
        bits: Option<usize>,
        /// Write public.der and private.der here instead of printing JSON
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Encrypt text, printing Base64 ciphertext
    Encrypt {
        #[command(flatten)]
        key: KeyFile,
        /// Plaintext
        text: String,
    },
    /// Decrypt Base64 ciphertext
    Decrypt {
        #[command(flatten)]
        key: KeyFile,
        /// Base64 ciphertext
        ciphertext: String,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct KeyFile {
    /// X.509 DER public key file
    #[arg(long)]
    public_key: Option<PathBuf>,
    /// PKCS#8 DER private key file
    #[arg(long)]
    private_key: Option<PathBuf>,
}

#[derive(Subcommand)]
enum OtpCommands {
    /// Generate a random shared secret (hex)
    Secret {
        /// Number of random bytes
        #[arg(long, default_value = "20")]
        bytes: usize,
    },
    /// Print the code for the current time step
    Generate {
        /// Shared secret
        #[arg(long, env = "STRONGBOX_OTP_SECRET")]
        secret: String,
        /// Print the code from `skew` milliseconds ago instead
        #[arg(long)]
        flexible: bool,
        #[command(flatten)]
        overrides: OtpOverrides,
    },
    /// Verify a code for an identity (exit status 1 when rejected)
    Verify {
        /// Base shared secret
        #[arg(long, env = "STRONGBOX_OTP_SECRET")]
        secret: String,
        /// Identity appended to the secret
        #[arg(long)]
        identity: String,
        /// Suffix appended after the identity
        #[arg(long, default_value = "")]
        suffix: String,
        /// Code to check
        #[arg(long)]
        code: String,
        #[command(flatten)]
        overrides: OtpOverrides,
    },
}

#[derive(Args)]
struct OtpOverrides {
    /// Time step in milliseconds
    #[arg(long)]
    step_ms: Option<u64>,
    /// Code length (1-9)
    #[arg(long)]
    digits: Option<u32>,
    /// Backward tolerance in milliseconds
    #[arg(long)]
    skew_ms: Option<u64>,
    /// Reference timestamp in Unix milliseconds
    #[arg(long)]
    epoch0_ms: Option<i64>,
    /// HMAC algorithm (sha1, sha256, sha512)
    #[arg(long)]
    algorithm: Option<HmacAlgorithm>,
    /// Counter encoding (decimal, big-endian)
    #[arg(long)]
    encoding: Option<CounterEncoding>,
}

impl OtpOverrides {
    fn apply(&self, base: &OtpSettings) -> OtpSettings {
        OtpSettings {
            step_ms: self.step_ms.unwrap_or(base.step_ms),
            digits: self.digits.unwrap_or(base.digits),
            skew_ms: self.skew_ms.unwrap_or(base.skew_ms),
            epoch0_ms: self.epoch0_ms.unwrap_or(base.epoch0_ms),
            algorithm: self.algorithm.unwrap_or(base.algorithm),
            encoding: self.encoding.unwrap_or(base.encoding),
        }
    }
}

#[derive(Serialize)]
struct KeyPairOutput {
    bits: usize,
    public_key: String,
    private_key: String,
}

// ============================================================================
// Commands
// ============================================================================

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Aes { command } => aes_command(command, &config)?,
        Commands::Rsa { command } => rsa_command(command, &config)?,
        Commands::Otp { command } => return otp_command(command, &config),
    }

    Ok(ExitCode::SUCCESS)
}

fn aes_command(command: AesCommands, config: &Config) -> Result<()> {
    match command {
        AesCommands::Keygen { bits } => {
            let size = AesKeySize::from_bits(bits.unwrap_or(config.aes.bits))?;
            let key = generate_symmetric_key_of(size);
            println!("{}", BASE64.encode(key.as_bytes()));
        }
        AesCommands::Encrypt { key, mode, text } => {
            let key = decode_key(&key)?;
            let mode = resolve_mode(mode, config)?;
            println!("{}", symmetric::encode_with(mode, &key, &text)?);
        }
        AesCommands::Decrypt {
            key,
            mode,
            ciphertext,
        } => {
            let key = decode_key(&key)?;
            let mode = resolve_mode(mode, config)?;
            let text = symmetric::decode_with(mode, &key, &ciphertext)
                .context("Decryption failed")?;
            println!("{}", text);
        }
    }
    Ok(())
}

fn rsa_command(command: RsaCommands, config: &Config) -> Result<()> {
    match command {
        RsaCommands::Keygen { bits, out_dir } => {
            let pair = generate_key_pair(bits.unwrap_or(config.rsa.bits))?;

            match out_dir {
                Some(dir) => {
                    fs::create_dir_all(&dir)
                        .with_context(|| format!("Failed to create {}", dir.display()))?;
                    let public_path = dir.join("public.der");
                    let private_path = dir.join("private.der");
                    write_file(&public_path, &pair.public_key)?;
                    write_private_file(&private_path, &pair.private_key)?;
                    println!("{}", public_path.display());
                    println!("{}", private_path.display());
                }
                None => {
                    let output = KeyPairOutput {
                        bits: pair.key_bits(),
                        public_key: BASE64.encode(&pair.public_key),
                        private_key: BASE64.encode(&*pair.private_key),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
        }
        RsaCommands::Encrypt { key, text } => {
            let ciphertext = match (&key.public_key, &key.private_key) {
                (Some(path), _) => {
                    asymmetric::encrypt_by_public_key(text.as_bytes(), &read_file(path)?)?
                }
                (None, Some(path)) => {
                    asymmetric::encrypt_by_private_key(text.as_bytes(), &read_file(path)?)?
                }
                (None, None) => bail!("Either --public-key or --private-key is required"),
            };
            println!("{}", BASE64.encode(ciphertext));
        }
        RsaCommands::Decrypt { key, ciphertext } => {
            let data = BASE64
                .decode(ciphertext.trim())
                .context("Ciphertext is not valid Base64")?;
            let plaintext = match (&key.public_key, &key.private_key) {
                (Some(path), _) => asymmetric::decrypt_by_public_key(&data, &read_file(path)?)?,
                (None, Some(path)) => {
                    asymmetric::decrypt_by_private_key(&data, &read_file(path)?)?
                }
                (None, None) => bail!("Either --public-key or --private-key is required"),
            };
            let text = std::str::from_utf8(&plaintext).context("Plaintext is not UTF-8")?;
            println!("{}", text);
        }
    }
    Ok(())
}

fn otp_command(command: OtpCommands, config: &Config) -> Result<ExitCode> {
    match command {
        OtpCommands::Secret { bytes } => {
            if bytes == 0 {
                bail!("--bytes must be greater than 0");
            }
            println!("{}", random::generate_token(bytes));
        }
        OtpCommands::Generate {
            secret,
            flexible,
            overrides,
        } => {
            let otp = OtpGenerator::new(OtpConfig::new(&secret, overrides.apply(&config.otp))?);
            let code = if flexible {
                otp.generate_flexibly()?
            } else {
                otp.generate()?
            };
            println!("{}", code);
        }
        OtpCommands::Verify {
            secret,
            identity,
            suffix,
            code,
            overrides,
        } => {
            let otp = OtpGenerator::new(OtpConfig::new(&secret, overrides.apply(&config.otp))?);
            if otp.verify_flexibly(&identity, &suffix, &code)? {
                println!("valid");
            } else {
                println!("invalid");
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve_mode(flag: Option<CipherMode>, config: &Config) -> Result<CipherMode> {
    match flag {
        Some(mode) => Ok(mode),
        None => config.aes.cipher_mode(),
    }
}

fn decode_key(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded.trim())
        .context("AES key is not valid Base64")
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Writes key material readable by the owner only.
fn write_private_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    // Owner read/write only from the moment of creation.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    // open() keeps the mode of an existing file.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict {}", path.display()))?;
    }

    file.write_all(contents)
        .with_context(|| format!("Failed to write {}", path.display()))
}
