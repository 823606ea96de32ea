//! Command line arguments

use crate::manifest::LauncherSettings;
use clap::Parser;
use std::path::PathBuf;

/// Starts the services of an application manifest in dependency order
#[derive(Debug, Clone, Parser)]
#[command(name = "apphost", version)]
pub struct Cli {
    /// TOML manifest; the built-in products/store topology when omitted
    #[arg(short = 'm', long = "manifest", value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Time a started service has to report ready
    #[arg(long = "readiness-timeout-ms", value_name = "MS")]
    pub readiness_timeout_ms: Option<u64>,

    /// Time a start action may run
    #[arg(long = "start-timeout-ms", value_name = "MS")]
    pub start_timeout_ms: Option<u64>,

    /// Pause between readiness probes
    #[arg(long = "probe-interval-ms", value_name = "MS")]
    pub probe_interval_ms: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Log filter; RUST_LOG takes precedence when set
    #[arg(long = "log-level", env = "APPHOST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Launcher settings given on the command line
    pub fn launcher_overrides(&self) -> LauncherSettings {
        LauncherSettings {
            readiness_timeout_ms: self.readiness_timeout_ms,
            start_timeout_ms: self.start_timeout_ms,
            probe_interval_ms: self.probe_interval_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["apphost"]).unwrap();
        assert_eq!(cli.manifest, None);
        assert!(!cli.json);
        assert_eq!(cli.launcher_overrides(), LauncherSettings::default());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "apphost",
            "--manifest",
            "app.toml",
            "--readiness-timeout-ms",
            "750",
            "--probe-interval-ms",
            "25",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.manifest, Some(PathBuf::from("app.toml")));
        assert!(cli.json);
        assert_eq!(
            cli.launcher_overrides(),
            LauncherSettings {
                readiness_timeout_ms: Some(750),
                start_timeout_ms: None,
                probe_interval_ms: Some(25),
            }
        );
    }

    #[test]
    fn test_invalid_number_rejected() {
        assert!(Cli::try_parse_from(["apphost", "--start-timeout-ms", "soon"]).is_err());
    }
}
