//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// marksite static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Site root directory (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name (default: marksite.toml)
    #[arg(short = 'C', long, default_value = "marksite.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Build arguments, overriding `[build]`
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Clean output directory completely before building
    #[arg(long)]
    pub clean: bool,

    /// Output directory path (relative to site root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Content directories (relative to site root)
    pub content: Vec<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Init a template site
    Init {
        /// the name(path) of site directory, related to `root`
        name: Option<PathBuf>,
    },

    /// Render every document and copy every other file into the output directory
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },
}

impl Cli {
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Commands::Init { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::parse_from(["marksite", "-C", "site.toml", "build", "--clean", "notes"]);
        assert_eq!(cli.config, PathBuf::from("site.toml"));
        let Commands::Build { build_args } = cli.command else {
            panic!("expected build");
        };
        assert!(build_args.clean);
        assert!(build_args.output.is_none());
        assert_eq!(build_args.content, vec![PathBuf::from("notes")]);
    }

    #[test]
    fn test_parse_init() {
        let cli = Cli::parse_from(["marksite", "init", "blog"]);
        assert!(cli.is_init());
        assert_eq!(cli.config, PathBuf::from("marksite.toml"));
        assert!(matches!(cli.command, Commands::Init { name: Some(ref name) } if name == "blog"));
    }
}
