//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Mirror a provider's vault documents to local disk.
///
/// Searches the provider's folder, then downloads each document's latest
/// revision, skipping files that already exist with the declared size.
#[derive(Parser, Debug)]
#[command(name = "vaultfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Provider id whose folder is mirrored (e.g. PROV-001670)
    #[arg(value_parser = parse_provider_id)]
    pub provider_id: String,

    /// Config file (default: $XDG_CONFIG_HOME/vaultfetch/config.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Local root directory (default: config `output_dir`, else the system temp dir)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Directory + filename length that triggers path shortening (20-4096)
    #[arg(long, value_parser = clap::value_parser!(u16).range(20..=4096))]
    pub max_path_len: Option<u16>,

    /// Maximum retry attempts for transient API failures (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Continue with the next document when one fails
    #[arg(long)]
    pub keep_going: bool,

    /// Print document metadata without downloading anything
    #[arg(long)]
    pub list_only: bool,

    /// Emit one JSON object per document on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_provider_id(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("provider id must not be empty".to_string());
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err("provider id must not contain path separators".to_string());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_minimal_args() {
        let args = Args::try_parse_from(["vaultfetch", "PROV-001670"]).unwrap();
        assert_eq!(args.provider_id, "PROV-001670");
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.keep_going);
        assert!(!args.list_only);
        assert!(args.max_retries.is_none());
        assert!(args.output_dir.is_none());
    }

    #[test]
    fn test_cli_provider_id_required() {
        let err = Args::try_parse_from(["vaultfetch"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_provider_id_rejects_separators() {
        let err = Args::try_parse_from(["vaultfetch", "../etc"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_all_flags() {
        let args = Args::try_parse_from([
            "vaultfetch",
            "-c",
            "/etc/vaultfetch.toml",
            "-o",
            "/srv/mirror",
            "--max-path-len",
            "180",
            "-r",
            "5",
            "--keep-going",
            "--json",
            "-vv",
            "PROV-1",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/vaultfetch.toml")));
        assert_eq!(args.output_dir, Some(PathBuf::from("/srv/mirror")));
        assert_eq!(args.max_path_len, Some(180));
        assert_eq!(args.max_retries, Some(5));
        assert!(args.keep_going);
        assert!(args.json);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_max_path_len_range() {
        assert!(Args::try_parse_from(["vaultfetch", "--max-path-len", "19", "P"]).is_err());
        assert!(Args::try_parse_from(["vaultfetch", "--max-path-len", "4097", "P"]).is_err());
    }

    #[test]
    fn test_cli_max_retries_over_max_rejected() {
        let err = Args::try_parse_from(["vaultfetch", "-r", "11", "P"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["vaultfetch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
