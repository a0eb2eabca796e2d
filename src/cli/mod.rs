// CLI module for scopecache
// Author: kelexine (https://github.com/kelexine)

use clap::{Parser, Subcommand};

/// scopecache - Per-user persistent key/value cache with provenance metadata
#[derive(Parser, Debug)]
#[command(name = "scopecache", version, about, long_about = None)]
pub struct Args {
    /// Config file to read instead of ~/.scopecache/config.toml
    #[arg(long, env = "SCOPECACHE_CONFIG")]
    pub config: Option<String>,

    /// Print cache metrics in Prometheus text format after the command runs
    #[arg(long, global = true)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the cached value for KEY in the current namespace
    Get {
        key: String,
        /// JSON printed when the key is not cached
        #[arg(long, default_value = "null")]
        default: String,
    },
    /// Cache a JSON VALUE under KEY in the current namespace
    Set {
        key: String,
        value: String,
        /// URL the value was fetched from, recorded as metadata
        #[arg(long)]
        url: Option<String>,
    },
    /// Remove KEY from the current namespace
    Remove { key: String },
    /// Remove every cached entry for every user
    Clear,
    /// Print the metadata recorded for KEY in the current namespace
    Meta { key: String },
    /// Print every metadata record
    ListMeta,
    /// Print the current namespace prefix
    Prefix,
    /// Sign in as the user described by a JSON object
    Identity { identity: String },
    /// Drop the session and clear the cache
    SignOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_metrics_follows_any_command() {
        let args =
            Args::try_parse_from(["scopecache", "set", "orders", "[1]", "--print-metrics"])
                .unwrap();
        assert!(args.print_metrics);
        assert!(matches!(args.command, Command::Set { .. }));

        let args = Args::try_parse_from(["scopecache", "prefix"]).unwrap();
        assert!(!args.print_metrics);
    }

    #[test]
    fn test_metrics_is_not_a_command() {
        assert!(Args::try_parse_from(["scopecache", "metrics"]).is_err());
    }
}
