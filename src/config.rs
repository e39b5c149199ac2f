use clap::Parser;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

/// Server settings. Every flag can also come from the environment.
#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Movie catalog server", long_about = None)]
pub struct ServerConfig {
    #[clap(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[clap(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// JSON file holding the whole collection
    #[clap(long, env = "MARQUEE_DATA_FILE", default_value = "data/movies.json")]
    pub data_file: PathBuf,
}

impl ServerConfig {
    /// Resolves `host:port`; hostnames such as `localhost` are looked up.
    pub fn socket_addr(&self) -> io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no address for {}", self.host)))
    }
}
