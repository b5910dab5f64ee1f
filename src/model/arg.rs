use clap::Parser;

/// Install a Linear webhook for one of your teams
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Key-value store file path (overrides storagePath)
    #[arg(long)]
    pub storage: Option<String>,

    /// Reuse an existing access token instead of running the OAuth flow
    #[arg(long)]
    pub access_token: Option<String>,
}
