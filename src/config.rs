//! Configuration for the video paygate server.
//!
//! Every option is a CLI flag backed by an environment variable (`.env` is loaded first),
//! read once at startup. Payment terms end up in an immutable [`PaymentConfig`].

use clap::Parser;
use clap::builder::BoolishValueParser;
use paygate_axum::PriceTag;
use paygate_types::network::Network;
use paygate_types::util::MoneyAmountParseError;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use url::Url;

/// Recipient used when `WALLET_ADDRESS` is unset and the fallback is not disabled.
pub const DEFAULT_WALLET_ADDRESS: &str = "0x60e7daf8b14fe9eb379837ea13522ef7dac6e233";
pub const DEFAULT_PRICE: &str = "$0.10";
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";
pub const DEFAULT_PORT: u16 = 4021;

#[derive(Parser, Debug, Clone)]
#[command(name = "video-paygate")]
#[command(about = "Pay-per-view video gateway charging x402 micropayments")]
pub struct Config {
    /// Wallet address receiving payments
    #[arg(long, env = "WALLET_ADDRESS")]
    wallet_address: Option<String>,
    /// Leave the recipient unset instead of using the built-in address
    #[arg(long, env = "DISABLE_DEFAULT_ADDRESS", value_parser = BoolishValueParser::new())]
    disable_default_address: bool,
    /// Network payments are accepted on
    #[arg(long, env = "NETWORK", default_value_t = Network::BaseSepolia)]
    network: Network,
    /// Price of access, in dollars
    #[arg(long, env = "PRICE", default_value = DEFAULT_PRICE)]
    price: String,
    #[arg(long, env = "FACILITATOR_URL", default_value = DEFAULT_FACILITATOR_URL)]
    facilitator_url: Url,
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Directory of static documents
    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    public_dir: PathBuf,
    /// File served as the gated video content; defaults to `video-content.html` in the public directory
    #[arg(long, env = "VIDEO_FILE")]
    video_file: Option<PathBuf>,
    /// Externally visible base URL, used in payment requirements
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<Url>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid price {price:?} for USDC on {network}: {source}")]
    InvalidPrice {
        price: String,
        network: Network,
        #[source]
        source: MoneyAmountParseError,
    },
    #[error("Failed to build public URL: {0}")]
    PublicUrl(#[from] url::ParseError),
}

/// Payment terms of the server, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentConfig {
    /// `None` leaves the gate unable to accept payments.
    pub recipient_address: Option<String>,
    pub network: Network,
    pub price: String,
    pub facilitator_url: Url,
    /// Whether the recipient is the built-in fallback address.
    pub is_default_address: bool,
}

impl Config {
    /// Parses flags and environment, then checks the price against the network's token.
    pub fn load() -> Result<Self, ConfigError> {
        Self::parse().validated()
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        PriceTag::usdc(self.network, None, &self.price).map_err(|source| {
            ConfigError::InvalidPrice {
                price: self.price.clone(),
                network: self.network,
                source,
            }
        })?;
        Ok(self)
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn public_dir(&self) -> &PathBuf {
        &self.public_dir
    }

    pub fn video_file(&self) -> PathBuf {
        self.video_file
            .clone()
            .unwrap_or_else(|| self.public_dir.join("video-content.html"))
    }

    /// Base URL for resource links, `http://localhost:<port>/` unless configured.
    pub fn public_url(&self) -> Result<Url, ConfigError> {
        match &self.public_url {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(&format!("http://localhost:{}/", self.port))?),
        }
    }

    /// Resolves the recipient: explicit address, else the fallback unless disabled.
    pub fn payment(&self) -> PaymentConfig {
        let configured = self
            .wallet_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty());
        let (recipient_address, is_default_address) = match configured {
            Some(address) => (Some(address.to_string()), false),
            None if self.disable_default_address => (None, false),
            None => (Some(DEFAULT_WALLET_ADDRESS.to_string()), true),
        };
        PaymentConfig {
            recipient_address,
            network: self.network,
            price: self.price.clone(),
            facilitator_url: self.facilitator_url.clone(),
            is_default_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let argv = std::iter::once("video-paygate").chain(args.iter().copied());
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--port", "4021"]);
        assert_eq!(config.port(), 4021);
        assert_eq!(config.video_file(), PathBuf::from("public/video-content.html"));
        assert_eq!(
            config.public_url().unwrap().as_str(),
            "http://localhost:4021/"
        );
    }

    #[test]
    fn test_explicit_wallet_address() {
        let config = parse(&["--wallet-address", "0xabc", "--network", "base"]);
        let payment = config.payment();
        assert_eq!(payment.recipient_address.as_deref(), Some("0xabc"));
        assert_eq!(payment.network, Network::Base);
        assert!(!payment.is_default_address);
    }

    #[test]
    fn test_fallback_address_policy() {
        let config = parse(&["--wallet-address", ""]);
        let payment = config.payment();
        assert_eq!(
            payment.recipient_address.as_deref(),
            Some(DEFAULT_WALLET_ADDRESS)
        );
        assert!(payment.is_default_address);

        let config = parse(&["--wallet-address", "", "--disable-default-address"]);
        let payment = config.payment();
        assert_eq!(payment.recipient_address, None);
        assert!(!payment.is_default_address);
    }

    #[test]
    fn test_unknown_network_is_rejected() {
        let argv = ["video-paygate", "--network", "ethereum"];
        assert!(Config::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_invalid_price_is_rejected() {
        let config = parse(&["--price", "$0.0000001"]);
        let err = config.validated().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrice { .. }));
    }

    #[test]
    fn test_video_file_override() {
        let config = parse(&["--public-dir", "static", "--video-file", "media/movie.mp4"]);
        assert_eq!(config.video_file(), PathBuf::from("media/movie.mp4"));
        assert_eq!(config.public_dir(), &PathBuf::from("static"));
    }
}
