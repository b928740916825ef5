use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
pub struct Args {
    /// Whether heal's clients connect to it over https.
    /// If so, the session cookie is sent as a secure cookie.
    #[arg(short, long)]
    secure: bool,

    /// The address heal should listen on. By default
    /// heal will listen just on the IPv4 loopback.
    #[arg(short, long)]
    address: Option<String>,

    /// The port heal listens on.
    #[arg(short, long, default_value_t = 5001)]
    port: u16,

    /// Directory holding the sqlite database and the static
    /// sound assets (served under /sounds).
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Origin allowed to make credentialed cross-site requests.
    #[arg(long, default_value = "http://localhost:5173")]
    frontend_url: String,

    /// Secret used to sign session tokens. Changing it
    /// invalidates every outstanding session.
    #[arg(long, env = "HEAL_TOKEN_SECRET")]
    token_secret: String,
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.data_dir.join("sounds")
    }

    pub fn frontend_url(&self) -> String {
        self.frontend_url.clone()
    }

    pub fn token_secret(&self) -> &str {
        &self.token_secret
    }
}
