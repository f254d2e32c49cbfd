use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the cloud-auditor tool.
///
/// Global options select the configuration file and log verbosity; the
/// work itself is chosen by a subcommand.
#[derive(Parser, Debug)]
#[clap(name = "cloud-auditor", about = "Cloud account configuration collector and auditor")]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration YAML file
    #[clap(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect account state and write the snapshot as JSON
    Collect {
        /// Output file for the snapshot (default: stdout)
        #[clap(short, long)]
        output: Option<PathBuf>,

        /// Call catalog YAML file, overriding the configuration
        #[clap(long)]
        catalog: Option<PathBuf>,

        /// Only collect these services (comma-separated, e.g. ec2,iam)
        #[clap(long, value_delimiter = ',')]
        services: Option<Vec<String>>,
    },

    /// Evaluate security rules over a collected snapshot
    Scan {
        /// Snapshot JSON file produced by `collect`
        #[clap(long)]
        source: PathBuf,

        /// Print a per-category pass/fail report instead of every finding
        #[clap(long)]
        security_report: bool,

        /// Print each rule's findings with the snapshot data it read, as JSON
        #[clap(long)]
        include_source: bool,
    },

    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "cloud_auditor.yaml")]
        path: PathBuf,
    },

    /// Write the built-in call catalog as YAML
    InitCatalog {
        /// Path to output catalog file
        #[clap(default_value = "catalog.yaml")]
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_with_services() {
        let args = Args::parse_from(["cloud-auditor", "-v", "collect", "--services", "ec2,iam", "-o", "out.json"]);
        assert!(args.verbose);
        match args.command {
            Commands::Collect { output, services, catalog } => {
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert_eq!(services, Some(vec!["ec2".to_string(), "iam".to_string()]));
                assert!(catalog.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_scan_flags() {
        let args = Args::parse_from(["cloud-auditor", "scan", "--source", "snap.json", "--security-report", "-c", "a.yaml"]);
        assert_eq!(args.config, Some(PathBuf::from("a.yaml")));
        match args.command {
            Commands::Scan { source, security_report, include_source } => {
                assert_eq!(source, PathBuf::from("snap.json"));
                assert!(security_report);
                assert!(!include_source);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_scan_requires_source() {
        assert!(Args::try_parse_from(["cloud-auditor", "scan"]).is_err());
    }
}
