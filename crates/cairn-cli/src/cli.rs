use std::net::SocketAddr;
use std::path::PathBuf;

use cairn_client::DEFAULT_SERVER;
use cairn_types::HashAlgorithm;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cairn",
    about = "Cairn: a content-addressed blob server",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum AlgorithmArg {
    Sha1,
    Sha256,
    Blake3,
}

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(a: AlgorithmArg) -> Self {
        match a {
            AlgorithmArg::Sha1 => HashAlgorithm::Sha1,
            AlgorithmArg::Sha256 => HashAlgorithm::Sha256,
            AlgorithmArg::Blake3 => HashAlgorithm::Blake3,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the blob server
    Serve(ServeArgs),
    /// Compute the blob ref of a file
    Ref(RefArgs),
    /// Store a file in a local blob root
    Put(PutArgs),
    /// Write a stored blob to stdout or a file
    Get(GetArgs),
    /// Report whether a blob is stored
    Check(CheckArgs),
    /// List stored blobs in ref order
    List(ListArgs),
    /// Send files to a remote server, skipping blobs it already has
    Upload(UploadArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Filesystem storage root (created if missing)
    #[arg(long, conflicts_with = "memory")]
    pub root: Option<PathBuf>,
    /// Keep blobs in memory only
    #[arg(long)]
    pub memory: bool,
}

#[derive(Args)]
pub struct RefArgs {
    pub file: PathBuf,
    #[arg(short, long, default_value = "sha1")]
    pub algorithm: AlgorithmArg,
}

#[derive(Args)]
pub struct PutArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub root: PathBuf,
    #[arg(short, long, default_value = "sha1")]
    pub algorithm: AlgorithmArg,
}

#[derive(Args)]
pub struct GetArgs {
    pub blob_ref: String,
    #[arg(long)]
    pub root: PathBuf,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct CheckArgs {
    pub blob_ref: String,
    #[arg(long)]
    pub root: PathBuf,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub root: PathBuf,
    /// Only list refs sorting after this one
    #[arg(long)]
    pub after: Option<String>,
    #[arg(short = 'n', long, default_value = "1000")]
    pub limit: usize,
}

#[derive(Args, Clone)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    #[arg(long, default_value = DEFAULT_SERVER)]
    pub server: String,
    #[arg(long, env = "CAIRN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(short, long, default_value = "sha1")]
    pub algorithm: AlgorithmArg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::try_parse_from(["cairn", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(args.config.is_none());
            assert!(args.bind.is_none());
            assert!(!args.memory);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_flags() {
        let cli = Cli::try_parse_from([
            "cairn", "serve", "--bind", "127.0.0.1:8080", "--root", "/srv/blobs",
        ])
        .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("127.0.0.1:8080".parse().unwrap()));
            assert_eq!(args.root, Some(PathBuf::from("/srv/blobs")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn serve_root_conflicts_with_memory() {
        assert!(Cli::try_parse_from(["cairn", "serve", "--memory", "--root", "/x"]).is_err());
    }

    #[test]
    fn serve_rejects_bad_bind() {
        assert!(Cli::try_parse_from(["cairn", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn parse_ref_algorithm() {
        let cli = Cli::try_parse_from(["cairn", "ref", "a.txt"]).unwrap();
        if let Command::Ref(args) = cli.command {
            assert_eq!(args.algorithm, AlgorithmArg::Sha1);
        } else { panic!("wrong command"); }

        let cli = Cli::try_parse_from(["cairn", "ref", "a.txt", "-a", "blake3"]).unwrap();
        if let Command::Ref(args) = cli.command {
            assert_eq!(HashAlgorithm::from(args.algorithm), HashAlgorithm::Blake3);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn put_requires_root() {
        assert!(Cli::try_parse_from(["cairn", "put", "a.txt"]).is_err());
    }

    #[test]
    fn parse_list() {
        let cli = Cli::try_parse_from([
            "cairn", "list", "--root", "/r", "--after", "sha1-abc", "-n", "5",
        ])
        .unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.after.as_deref(), Some("sha1-abc"));
            assert_eq!(args.limit, 5);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_upload() {
        let cli = Cli::try_parse_from([
            "cairn", "upload", "a.txt", "b.txt", "--server", "http://blobs:3179",
            "--password", "pw", "-a", "sha256",
        ])
        .unwrap();
        if let Command::Upload(args) = cli.command {
            assert_eq!(args.files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
            assert_eq!(args.server, "http://blobs:3179");
            assert_eq!(args.password.as_deref(), Some("pw"));
            assert_eq!(args.algorithm, AlgorithmArg::Sha256);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn upload_needs_a_file() {
        assert!(Cli::try_parse_from(["cairn", "upload"]).is_err());
        let cli = Cli::try_parse_from(["cairn", "upload", "a.txt"]).unwrap();
        if let Command::Upload(args) = cli.command {
            assert_eq!(args.server, DEFAULT_SERVER);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["cairn", "--format", "json", "check", "x", "--root", "/r"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["cairn", "--verbose", "list", "--root", "/r"]).unwrap();
        assert!(cli.verbose);
    }
}
