//! sdfu-encrypter: encrypt or decrypt firmware images for the secure DFU bootloader
//!
//!   sdfu-encrypter -e -i firmware.bin -o firmware.dfu
//!   sdfu-encrypter -d -i firmware.dfu -o firmware.bin

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use sdfu_encrypter::{process_file, Direction, Settings};
use usbd_secure_dfu::{ChainMode, ChecksumKind, CipherKind};

#[derive(Parser, Debug)]
#[command(
    name = "sdfu-encrypter",
    version,
    about = "Encrypt firmware images for the secure DFU bootloader",
    group(ArgGroup::new("direction").required(true).args(["encrypt", "decrypt"]))
)]
struct Cli {
    /// Encrypt the input file
    #[arg(short = 'e', long)]
    encrypt: bool,

    /// Decrypt the input file
    #[arg(short = 'd', long)]
    decrypt: bool,

    /// Do not append or verify the checksum
    #[arg(short = 'c', long = "no-checksum")]
    no_checksum: bool,

    /// Input file
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output file
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Cipher, by id or name (default: the compiled-in one)
    #[arg(long, value_parser = parse_cipher)]
    cipher: Option<CipherKind>,

    /// Chaining mode for block ciphers (default: the compiled-in one)
    #[arg(long, value_parser = parse_mode)]
    mode: Option<ChainMode>,

    /// Checksum algorithm or "none" (default: the compiled-in one)
    #[arg(long, value_parser = parse_checksum)]
    checksum: Option<ChecksumArg>,
}

#[derive(Clone, Copy, Debug)]
struct ChecksumArg(Option<ChecksumKind>);

fn parse_cipher(s: &str) -> Result<CipherKind, String> {
    s.parse().map_err(|_| format!("unknown cipher '{s}'"))
}

fn parse_mode(s: &str) -> Result<ChainMode, String> {
    s.parse().map_err(|_| format!("unknown chaining mode '{s}'"))
}

fn parse_checksum(s: &str) -> Result<ChecksumArg, String> {
    if s.eq_ignore_ascii_case("none") {
        return Ok(ChecksumArg(None));
    }
    s.parse()
        .map(|kind| ChecksumArg(Some(kind)))
        .map_err(|_| format!("unknown checksum '{s}'"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let defaults = Settings::default();
    let mut settings = Settings {
        cipher: cli.cipher.unwrap_or(defaults.cipher),
        mode: cli.mode.unwrap_or(defaults.mode),
        checksum: cli.checksum.map_or(defaults.checksum, |c| c.0),
    };
    if cli.no_checksum {
        settings.checksum = None;
    }

    let direction = if cli.encrypt {
        Direction::Encrypt
    } else {
        Direction::Decrypt
    };

    let name = settings.name()?;
    let bytes = process_file(&settings, direction, &cli.input, &cli.output)?;

    println!("Processed {bytes} bytes use {name}");
    Ok(())
}
