use std::path::PathBuf;

use clap::Parser;

/// Syncsound backend
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// address the HTTP/WebSocket server binds to
    #[arg(short, long, default_value = "0.0.0.0:3000", env = "SYNCSOUND_LISTEN_ADDR")]
    pub listen_addr: String,

    /// directory uploaded media is stored in and served from
    #[arg(short, long, default_value = "uploads", env = "SYNCSOUND_UPLOADS_DIR")]
    pub uploads_dir: PathBuf,
}
