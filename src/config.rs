use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt, str::FromStr};

/// Multipart field name the upload form sends its files under.
pub const FILE_FIELD: &str = "profilePhotos";

/// Maximum number of files accepted per upload request.
pub const MAX_FILES: usize = 5;

/// Which image provider backs the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Cloudinary REST API.
    Cloudinary,
    /// In-process store, for local development without credentials.
    Memory,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cloudinary" => Ok(Self::Cloudinary),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown provider `{}` (expected cloudinary or memory)", other),
        }
    }
}

/// Cloudinary account credentials.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
}

impl fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub provider: ProviderKind,
    pub namespace: String,
    pub tag: String,
    pub max_file_size: u64,
    pub provider_timeout_secs: u64,
    pub cloudinary: Option<CloudinaryConfig>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Image upload gateway")]
pub struct Args {
    /// Host to bind to (overrides IMAGE_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides IMAGE_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploads are staged before forwarding (overrides IMAGE_GATEWAY_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Image provider backend (overrides IMAGE_GATEWAY_PROVIDER)
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Folder images are stored under (overrides IMAGE_GATEWAY_NAMESPACE)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Tag attached to every upload (overrides IMAGE_GATEWAY_TAG)
    #[arg(long)]
    pub tag: Option<String>,

    /// Per-file size limit in bytes (overrides IMAGE_GATEWAY_MAX_FILE_SIZE)
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Provider request timeout (overrides IMAGE_GATEWAY_PROVIDER_TIMEOUT_SECS)
    #[arg(long)]
    pub provider_timeout_secs: Option<u64>,

    /// Cloudinary cloud name (overrides CLOUDINARY_CLOUD_NAME)
    #[arg(long)]
    pub cloud_name: Option<String>,

    /// Cloudinary API key (overrides CLOUDINARY_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Cloudinary API base URL (overrides CLOUDINARY_API_BASE)
    #[arg(long)]
    pub api_base: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();
        Self::resolve(args, |key| env::var(key).ok())
    }

    /// Merge parsed args over values looked up through `var`, then defaults.
    pub fn resolve(args: Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = var("IMAGE_GATEWAY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var(&var, "IMAGE_GATEWAY_PORT", 3000u16)?;
        let env_upload = var("IMAGE_GATEWAY_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into());
        let env_provider = parse_var(&var, "IMAGE_GATEWAY_PROVIDER", ProviderKind::Cloudinary)?;
        let env_namespace = var("IMAGE_GATEWAY_NAMESPACE").unwrap_or_else(|| "users".into());
        let env_tag = var("IMAGE_GATEWAY_TAG").unwrap_or_else(|| "profileImages".into());
        let env_max_size = parse_var(&var, "IMAGE_GATEWAY_MAX_FILE_SIZE", 10 * 1024 * 1024u64)?;
        let env_timeout = parse_var(&var, "IMAGE_GATEWAY_PROVIDER_TIMEOUT_SECS", 60u64)?;

        // --- Merge ---
        let provider = args.provider.unwrap_or(env_provider);
        let namespace = args
            .namespace
            .unwrap_or(env_namespace)
            .trim_matches('/')
            .to_string();
        if namespace.is_empty() {
            bail!("namespace must not be empty");
        }

        let cloudinary = match provider {
            ProviderKind::Cloudinary => Some(CloudinaryConfig {
                cloud_name: args
                    .cloud_name
                    .or_else(|| var("CLOUDINARY_CLOUD_NAME"))
                    .context("CLOUDINARY_CLOUD_NAME is required for the cloudinary provider")?,
                api_key: args
                    .api_key
                    .or_else(|| var("CLOUDINARY_API_KEY"))
                    .context("CLOUDINARY_API_KEY is required for the cloudinary provider")?,
                api_secret: var("CLOUDINARY_API_SECRET")
                    .context("CLOUDINARY_API_SECRET is required for the cloudinary provider")?,
                api_base: args
                    .api_base
                    .or_else(|| var("CLOUDINARY_API_BASE"))
                    .unwrap_or_else(|| "https://api.cloudinary.com".into()),
            }),
            ProviderKind::Memory => None,
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.unwrap_or(env_upload),
            provider,
            namespace,
            tag: args.tag.unwrap_or(env_tag),
            max_file_size: args.max_file_size.unwrap_or(env_max_size),
            provider_timeout_secs: args.provider_timeout_secs.unwrap_or(env_timeout),
            cloudinary,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match var(key) {
        Some(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("parsing {} value `{}`: {}", key, value, err)),
        None => Ok(default),
    }
}
