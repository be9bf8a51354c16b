//! Minimal terminal client: relays stdin lines to the server with CR LF
//! terminators and prints whatever the server sends back.

use clap::Parser;
use log::info;
use shared::{DEFAULT_PORT, LINE_TERMINATOR};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about = "Play the word game from a terminal", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let stream = TcpStream::connect(&args.server).await?;
    let (mut reader, mut writer) = stream.into_split();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut buf = [0u8; 1024];

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    info!("End of input, leaving the game");
                    break;
                };
                writer.write_all(line.trim_end().as_bytes()).await?;
                writer.write_all(LINE_TERMINATOR).await?;
            }
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    info!("Server closed the connection");
                    break;
                }
                stdout.write_all(&buf[..n]).await?;
                stdout.flush().await?;
            }
        }
    }

    Ok(())
}
