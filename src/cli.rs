use clap::Parser;
use std::path::PathBuf;

use uploadflow::utils::version;

#[derive(Parser, Debug)]
#[command(author, version = version(), about)]
pub struct Cli {
    /// Files to upload
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Leave failed uploads failed instead of retrying them once
    #[arg(long)]
    pub no_auto_retry: bool,

    /// Retry only the step that failed instead of the whole upload
    #[arg(long, conflicts_with = "no_auto_retry")]
    pub retry_step: bool,

    /// Save the final state of every upload to the history file
    #[arg(long)]
    pub history: bool,

    /// Configuration file, defaults to config.toml in the config directory
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from(["uploadflow", "--retry-step", "--history", "a.txt", "b.txt"]);
        assert_eq!(cli.files, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        assert!(cli.retry_step);
        assert!(cli.history);
        assert!(!cli.no_auto_retry);
    }

    #[test]
    fn test_files_are_required() {
        assert!(Cli::try_parse_from(["uploadflow"]).is_err());
    }
}
