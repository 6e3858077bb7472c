//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::categorizer::ConsentChoice;

/// Check command arguments.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Host being navigated to
    pub host: String,

    /// Search query carried by the navigation
    #[arg(short = 'Q', long)]
    pub query: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Whitelist commands.
#[derive(Debug, Subcommand)]
pub enum WhitelistCommand {
    /// Stop asking about a host
    Host {
        /// Host to whitelist
        host: String,
    },

    /// Stop asking about a search query
    Query {
        /// Query to whitelist
        query: String,
    },
}

/// Blush command arguments.
#[derive(Debug, Args)]
pub struct BlushCommand {
    /// Host to add to the blushlist
    pub host: String,
}

/// Forget command arguments.
#[derive(Debug, Args)]
pub struct ForgetCommand {
    /// Host to forget
    pub host: String,
}

/// Consent command arguments.
#[derive(Debug, Args)]
pub struct ConsentCommand {
    /// Host the prompt was shown for
    pub host: String,

    /// Search query the prompt was shown for
    #[arg(short = 'Q', long)]
    pub query: Option<String>,

    /// The user's answer
    #[arg(value_enum)]
    pub choice: ConsentArg,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Make-list command arguments.
#[derive(Debug, Args)]
pub struct MakeListCommand {
    /// Version string for the new list
    #[arg(long = "list-version", value_name = "VERSION")]
    pub list_version: String,

    /// Where to write the list
    #[arg(short, long)]
    pub output: PathBuf,

    /// Input files, each followed by its category
    #[arg(required = true, num_args = 2.., value_names = ["FILE", "CATEGORY"])]
    pub inputs: Vec<String>,
}

impl MakeListCommand {
    /// Pair up the positional inputs as `(file, category)`.
    ///
    /// # Errors
    ///
    /// Returns an error message if a file has no category after it.
    pub fn pairs(&self) -> Result<Vec<(PathBuf, String)>, String> {
        if self.inputs.len() % 2 != 0 {
            return Err(format!(
                "expected <FILE> <CATEGORY> pairs, got {} arguments",
                self.inputs.len()
            ));
        }
        Ok(self
            .inputs
            .chunks_exact(2)
            .map(|pair| (PathBuf::from(&pair[0]), pair[1].clone()))
            .collect())
    }
}

/// Bloom filter commands.
#[derive(Debug, Subcommand)]
pub enum BloomCommand {
    /// Build a filter from a newline-separated file
    Build {
        /// Filter size in bits
        #[arg(short, long, default_value = "8192")]
        bits: u32,

        /// Items to insert, one per line
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the filter
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check items against a filter
    Probe {
        /// Filter file
        #[arg(short, long)]
        filter: PathBuf,

        /// Items to check
        #[arg(required = true)]
        items: Vec<String>,
    },
}

/// Answer to the consent prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConsentArg {
    /// Continue in a normal window
    Normal,
    /// Continue in a private window
    Private,
}

impl From<ConsentArg> for ConsentChoice {
    fn from(arg: ConsentArg) -> Self {
        match arg {
            ConsentArg::Normal => Self::OpenNormal,
            ConsentArg::Private => Self::OpenPrivate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_list(inputs: &[&str]) -> MakeListCommand {
        MakeListCommand {
            list_version: "1".to_string(),
            output: PathBuf::from("out.json"),
            inputs: inputs.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn test_consent_arg_conversion() {
        assert_eq!(ConsentChoice::from(ConsentArg::Normal), ConsentChoice::OpenNormal);
        assert_eq!(ConsentChoice::from(ConsentArg::Private), ConsentChoice::OpenPrivate);
    }

    #[test]
    fn test_make_list_pairs() {
        let cmd = make_list(&["adult.txt", "adult", "social.txt", "social"]);
        let pairs = cmd.pairs().unwrap();
        assert_eq!(
            pairs,
            vec![
                (PathBuf::from("adult.txt"), "adult".to_string()),
                (PathBuf::from("social.txt"), "social".to_string()),
            ]
        );
    }

    #[test]
    fn test_make_list_odd_inputs() {
        let cmd = make_list(&["adult.txt", "adult", "social.txt"]);
        let err = cmd.pairs().unwrap_err();
        assert!(err.contains("3 arguments"));
    }

    #[test]
    fn test_check_command_debug() {
        let cmd = CheckCommand {
            host: "example.com".to_string(),
            query: None,
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("example.com"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }

    #[test]
    fn test_bloom_command_debug() {
        let cmd = BloomCommand::Probe {
            filter: PathBuf::from("f.json"),
            items: vec!["asdf".to_string()],
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Probe"));
        assert!(debug_str.contains("asdf"));
    }
}
