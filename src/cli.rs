use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tvrename")]
#[command(about = "Identify TV episodes by their subtitles and rename them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Rename files whose names don't carry an episode number yet
    Rename {
        #[command(flatten)]
        target: TargetArgs,

        /// Log the renames instead of performing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Check that already named files hold the episodes their names say
    Verify {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Season folder to process
    pub folder: PathBuf,

    /// IMDb id of the show, used to fetch reference subtitles
    #[arg(long)]
    pub imdb: Option<String>,

    /// Show title; detected from the parent folder when omitted
    #[arg(long)]
    pub title: Option<String>,

    /// Season number; detected from the folder name when omitted
    #[arg(long)]
    pub season: Option<u32>,

    /// Minimum match confidence in percent
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub confidence: Option<u8>,

    /// Only use reference subtitles already in the folder
    #[arg(long)]
    pub offline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rename() {
        let cli = Cli::parse_from([
            "tvrename",
            "rename",
            "--imdb",
            "tt0303461",
            "--season",
            "1",
            "--dry-run",
            "/tv/Firefly/Season 1",
        ]);
        match cli.command {
            Command::Rename { target, dry_run } => {
                assert!(dry_run);
                assert_eq!(target.imdb.as_deref(), Some("tt0303461"));
                assert_eq!(target.season, Some(1));
                assert_eq!(target.folder, PathBuf::from("/tv/Firefly/Season 1"));
                assert!(!target.offline);
            }
            Command::Verify { .. } => panic!("expected rename"),
        }
    }

    #[test]
    fn test_verify_has_no_dry_run() {
        assert!(Cli::try_parse_from(["tvrename", "verify", "--dry-run", "."]).is_err());
        assert!(Cli::try_parse_from(["tvrename", "verify", "--offline", "--confidence", "60", "."]).is_ok());
        assert!(Cli::try_parse_from(["tvrename", "verify", "--confidence", "101", "."]).is_err());
    }
}
