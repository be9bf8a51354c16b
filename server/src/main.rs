use clap::Parser;
use log::info;
use server::dictionary::Dictionary;
use server::error::ServerError;
use server::network::{Server, ServerConfig};
use shared::{DEFAULT_PORT, MAX_GUESSES};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn-based word guessing game server", long_about = None)]
struct Args {
    /// Word list, one word per line
    dictionary: PathBuf,

    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Wrong guesses allowed per word
    #[arg(
        short = 'g',
        long,
        default_value_t = MAX_GUESSES,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_guesses: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    serve(&args)?;

    Ok(())
}

/// Loads the word list and runs the server until it stops.
fn serve(args: &Args) -> Result<(), ServerError> {
    let words = Dictionary::load(&args.dictionary)?;
    let config = ServerConfig {
        addr: SocketAddr::new(args.host, args.port),
        max_guesses: args.max_guesses,
        ..ServerConfig::default()
    };

    info!("Starting word game server...");
    let mut server = Server::bind(config, words)?;
    server.run()
}
