//! Command-line argument parsing for trickshelf
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// trickshelf - client for a trick-sharing site with a slim progress indicator
#[derive(Parser, Debug)]
#[command(name = "trickshelf")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Browse and share tricks from the terminal", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Site root, overriding the configured server
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Anti-forgery token sent with form posts
    #[arg(long, global = true)]
    pub csrf: Option<String>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Drive an indicator with simulated operations and print the final markup
    Demo {
        /// Number of simulated operations to track
        #[arg(long, default_value_t = 3)]
        operations: usize,

        /// Transition speed in milliseconds
        #[arg(long)]
        speed: Option<u64>,

        /// Trickle while operations are pending
        #[arg(long)]
        trickle: bool,

        /// Seed for reproducible increments
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the tricks of one user
    Tricks {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        username: String,
    },

    /// List every trick on the site
    AllTricks,

    /// Upload a browser bookmark export as tricks
    ImportBookmarks {
        /// Exported bookmarks file (HTML)
        file: PathBuf,
    },

    /// Show the signed-in user
    Session,

    /// Request a password reset e-mail
    ForgotPassword {
        #[arg(long)]
        email: String,
    },

    /// Set a new password with a reset token
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Log filter used when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "trickshelf=info",
            Verbosity::VeryVerbose => "trickshelf=debug",
        }
    }

    /// Check if should show the terminal progress mirror
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should print intermediate markup
    pub fn show_markup(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_verbosity_quiet() {
        assert_eq!(parse(&["trickshelf", "-q", "config"]).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_normal() {
        assert_eq!(parse(&["trickshelf", "config"]).verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_verbosity_verbose() {
        assert_eq!(parse(&["trickshelf", "config", "-v"]).verbosity(), Verbosity::Verbose);
    }

    #[test]
    fn test_verbosity_very_verbose() {
        assert_eq!(
            parse(&["trickshelf", "-vv", "all-tricks"]).verbosity(),
            Verbosity::VeryVerbose
        );
    }

    #[test]
    fn test_demo_defaults() {
        let args = parse(&["trickshelf", "demo"]);
        assert_eq!(
            args.command,
            Commands::Demo {
                operations: 3,
                speed: None,
                trickle: false,
                seed: None
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&[
            "trickshelf",
            "forgot-password",
            "--email",
            "rin@example.com",
            "--csrf",
            "tok",
            "--base-url",
            "http://localhost:4001",
        ]);
        assert_eq!(args.csrf.as_deref(), Some("tok"));
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:4001"));
        assert_eq!(
            args.command,
            Commands::ForgotPassword {
                email: "rin@example.com".to_string()
            }
        );
    }

    #[test]
    fn test_tricks_requires_user() {
        assert!(Args::try_parse_from(["trickshelf", "tricks", "--username", "rin"]).is_err());
    }

    #[test]
    fn test_import_bookmarks_takes_file() {
        let args =
            Args::try_parse_from(["trickshelf", "import-bookmarks", "bookmarks.html"]).unwrap();
        assert_eq!(
            args.command,
            Commands::ImportBookmarks {
                file: PathBuf::from("bookmarks.html")
            }
        );
        assert!(Args::try_parse_from(["trickshelf", "import-bookmarks"]).is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["trickshelf"]).is_err());
    }

    #[test]
    fn test_verbosity_methods() {
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Normal.show_progress());

        assert!(!Verbosity::Normal.show_markup());
        assert!(Verbosity::Verbose.show_markup());

        assert_eq!(Verbosity::Quiet.filter_directive(), "error");
        assert_eq!(Verbosity::VeryVerbose.filter_directive(), "trickshelf=debug");
    }
}
