use crate::keyfile;
use anyhow::{bail, Context, Result};
use chaindrive_client::signer::InstructionSigner;
use chaindrive_client::{ClientConfig, DriveClient};
use chaindrive_types::address::{file_record_address, shared_access_address};
use chaindrive_types::{AccessLevel, Address};
use chrono::{TimeZone, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Chaindrive file publishing CLI
#[derive(Parser, Debug)]
#[command(name = "chaindrive")]
#[command(about = "Publish, share, and manage ledger-registered files")]
#[command(version)]
pub struct Cli {
    /// TOML config file; overrides the individual connection flags
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger RPC base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080/api")]
    pub rpc_url: String,

    /// Address of the on-ledger file program
    #[arg(long, global = true)]
    pub program: Option<Address>,

    /// Content store upload endpoint
    #[arg(long, global = true, default_value = "http://127.0.0.1:8081/upload")]
    pub store_endpoint: String,

    /// Content store API credential
    #[arg(long, global = true, default_value = "")]
    pub store_api_key: String,

    /// Public gateway base URL for content retrieval
    #[arg(long, global = true, default_value = "http://127.0.0.1:8081/content")]
    pub gateway: String,

    /// Key file used to sign operations
    #[arg(long, global = true, default_value = "./keys/chaindrive.key")]
    pub keyfile: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new key file and print the derived address
    GenerateKey(GenerateKeyArgs),
    /// Publish a file: store the bytes, then register and finalize on the ledger
    Upload(UploadArgs),
    /// List files owned by this key, newest first
    List,
    /// Grant another identity access to one of your files
    Share(ShareArgs),
    /// Revoke a previously granted access
    Revoke(RevokeArgs),
    /// List the grants issued against one of your files
    Grants(GrantsArgs),
    /// Make a file public or private
    Visibility(VisibilityArgs),
    /// Print the public gateway URL for a published file
    Url(UrlArgs),
}

#[derive(Args, Debug)]
pub struct GenerateKeyArgs {
    /// Output path for the key file
    #[arg(long, default_value = "./keys/chaindrive.key")]
    pub out: PathBuf,

    /// Overwrite the key file if it already exists
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// File to publish
    pub path: PathBuf,

    /// Ledger-visible file name (defaults to the file's own name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShareArgs {
    /// Name of one of your published files
    pub file: String,

    /// Identity to share with
    pub grantee: Address,

    /// Access level to grant
    #[arg(long, value_enum, default_value = "read")]
    pub level: LevelArg,

    /// Grant lifetime in seconds from now (unbounded when omitted)
    #[arg(long)]
    pub expires_in: Option<u64>,
}

#[derive(Args, Debug)]
pub struct RevokeArgs {
    /// Name of one of your published files
    pub file: String,

    /// Identity whose access to revoke
    pub grantee: Address,
}

#[derive(Args, Debug)]
pub struct GrantsArgs {
    /// Name of one of your published files
    pub file: String,
}

#[derive(Args, Debug)]
pub struct VisibilityArgs {
    /// Name of one of your published files
    pub file: String,

    /// New visibility
    #[arg(value_enum)]
    pub visibility: VisibilityArg,
}

#[derive(Args, Debug)]
pub struct UrlArgs {
    /// Name of one of your published files
    pub file: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LevelArg {
    Read,
    Write,
    Admin,
}

impl From<LevelArg> for AccessLevel {
    fn from(value: LevelArg) -> Self {
        match value {
            LevelArg::Read => AccessLevel::Read,
            LevelArg::Write => AccessLevel::Write,
            LevelArg::Admin => AccessLevel::Admin,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum VisibilityArg {
    Public,
    Private,
}

/// Parse arguments and dispatch.
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::GenerateKey(args) = &cli.command {
        return generate_key(args);
    }

    let config = resolve_config(&cli)?;
    let keypair = keyfile::load(&cli.keyfile)
        .with_context(|| format!("failed to load key file {}", cli.keyfile.display()))?;
    let client = DriveClient::connect(&config)?;

    match cli.command {
        Commands::GenerateKey(_) => unreachable!("handled above"),
        Commands::Upload(args) => upload(&client, &keypair, args).await,
        Commands::List => list(&client, &keypair).await,
        Commands::Share(args) => share(&client, &keypair, args).await,
        Commands::Revoke(args) => revoke(&client, &keypair, args).await,
        Commands::Grants(args) => grants(&client, &keypair, args).await,
        Commands::Visibility(args) => visibility(&client, &keypair, args).await,
        Commands::Url(args) => url(&client, &keypair, args).await,
    }
}

fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    if let Some(path) = &cli.config {
        return ClientConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    let program = cli
        .program
        .context("--program is required unless --config is given")?;
    Ok(ClientConfig {
        rpc_url: cli.rpc_url.clone(),
        program,
        store_endpoint: cli.store_endpoint.clone(),
        store_api_key: cli.store_api_key.clone(),
        gateway_base: cli.gateway.clone(),
    })
}

fn generate_key(args: &GenerateKeyArgs) -> Result<()> {
    let keypair = keyfile::generate(&args.out, args.force)?;
    println!("Key file written to {}", args.out.display());
    println!("Address: {}", keypair.address());
    Ok(())
}

async fn upload(
    client: &DriveClient,
    keypair: &chaindrive_client::Keypair,
    args: UploadArgs,
) -> Result<()> {
    let content = tokio::fs::read(&args.path)
        .await
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let name = match args.name {
        Some(name) => name,
        None => args
            .path
            .file_name()
            .context("path has no file name; pass --name")?
            .to_string_lossy()
            .into_owned(),
    };

    println!(
        "Publishing {} ({})...",
        name,
        format_bytes(content.len() as u64)
    );
    let receipt = client.publish(keypair, &name, content).await?;

    println!("Published {name}");
    println!("  record:   {}", receipt.file_record);
    println!("  content:  {}", receipt.content_id);
    println!("  chunks:   {}", receipt.chunk_count);
    println!("  hash:     {}", hex::encode(receipt.file_hash));
    println!("  url:      {}", receipt.gateway_url);
    Ok(())
}

async fn list(client: &DriveClient, keypair: &chaindrive_client::Keypair) -> Result<()> {
    let owner = keypair.address();
    let files = client.list_files_owned_by(&owner).await?;
    if files.is_empty() {
        println!("No files published yet");
        return Ok(());
    }

    for file in files {
        let record = &file.record;
        let visibility = if record.is_public { "public" } else { "private" };
        println!(
            "{}  [{}] [{}]  {}  {}",
            record.file_name,
            record.status,
            visibility,
            format_bytes(record.file_size),
            format_timestamp(record.created_at),
        );
        println!("    record: {}", file.address);
        if record.has_storage() {
            println!("    url:    {}", client.gateway_url(&record.primary_storage));
        }
    }
    Ok(())
}

async fn share(
    client: &DriveClient,
    keypair: &chaindrive_client::Keypair,
    args: ShareArgs,
) -> Result<()> {
    let record = owned_record_address(client, keypair, &args.file)?;
    let expires_at = args
        .expires_in
        .map(|seconds| Utc::now().timestamp() + seconds as i64);

    let grant = client
        .grant_access(
            keypair,
            &record,
            &args.grantee,
            args.level.into(),
            expires_at,
        )
        .await?;
    println!("Granted {} access to {}", args.level.as_str(), args.grantee);
    println!("  grant: {grant}");
    Ok(())
}

async fn revoke(
    client: &DriveClient,
    keypair: &chaindrive_client::Keypair,
    args: RevokeArgs,
) -> Result<()> {
    let record = owned_record_address(client, keypair, &args.file)?;
    let grant = shared_access_address(client.program(), &record, &args.grantee);
    client.revoke_access(keypair, &grant).await?;
    println!("Revoked access for {}", args.grantee);
    Ok(())
}

async fn grants(
    client: &DriveClient,
    keypair: &chaindrive_client::Keypair,
    args: GrantsArgs,
) -> Result<()> {
    let record = owned_record_address(client, keypair, &args.file)?;
    let grants = client.shared_access_for_file(&record).await?;
    if grants.is_empty() {
        println!("No grants for {}", args.file);
        return Ok(());
    }

    let now = Utc::now().timestamp();
    for entry in grants {
        let grant = &entry.grant;
        let state = if !grant.is_active {
            "revoked"
        } else if grant.is_usable_at(now) {
            "active"
        } else {
            "expired"
        };
        let expiry = grant
            .expires_at
            .map(format_timestamp)
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}  [{}] [{}]  expires {}",
            Address::from_bytes(grant.shared_with),
            grant.access_level,
            state,
            expiry,
        );
    }
    Ok(())
}

async fn visibility(
    client: &DriveClient,
    keypair: &chaindrive_client::Keypair,
    args: VisibilityArgs,
) -> Result<()> {
    let record = owned_record_address(client, keypair, &args.file)?;
    let make_public = matches!(args.visibility, VisibilityArg::Public);
    client.set_visibility(keypair, &record, make_public).await?;
    println!(
        "{} is now {}",
        args.file,
        if make_public { "public" } else { "private" }
    );
    Ok(())
}

async fn url(
    client: &DriveClient,
    keypair: &chaindrive_client::Keypair,
    args: UrlArgs,
) -> Result<()> {
    let record_address = owned_record_address(client, keypair, &args.file)?;
    let record = client.read_file_record(&record_address).await?;
    if !record.has_storage() {
        bail!("{} has no storage location registered yet", args.file);
    }
    println!("{}", client.gateway_url(&record.primary_storage));
    Ok(())
}

fn owned_record_address(
    client: &DriveClient,
    keypair: &chaindrive_client::Keypair,
    file_name: &str,
) -> Result<Address> {
    let owner = keypair.address();
    Ok(file_record_address(client.program(), &owner, file_name)?)
}

impl LevelArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelArg::Read => "read",
            LevelArg::Write => "write",
            LevelArg::Admin => "admin",
        }
    }
}

/// Human-readable byte counts for listings.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let exponent = (bytes as f64).log(1024.0).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    if exponent == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[exponent])
    }
}

fn format_timestamp(timestamp: i64) -> String {
    match Utc.timestamp_opt(timestamp, 0).single() {
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M").to_string(),
        None => timestamp.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_share_with_expiry() {
        let program = Address::from_bytes([9u8; 32]).to_string();
        let grantee = Address::from_bytes([5u8; 32]).to_string();
        let cli = Cli::parse_from([
            "chaindrive",
            "--program",
            program.as_str(),
            "share",
            "report.pdf",
            grantee.as_str(),
            "--level",
            "write",
            "--expires-in",
            "3600",
        ]);
        match cli.command {
            Commands::Share(args) => {
                assert_eq!(args.file, "report.pdf");
                assert_eq!(args.grantee.to_string(), grantee);
                assert!(matches!(args.level, LevelArg::Write));
                assert_eq!(args.expires_in, Some(3600));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn formats_byte_sizes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }
}
