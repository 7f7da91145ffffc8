// src/cli.rs
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rustrecon",
    about = "Terminal OSINT investigation tool",
    long_about = "RustRecon runs single-target OSINT investigations from the terminal.\nA target (domain, email, username, phone, IP or crypto address) is expanded\nagainst configurable templates and dispatched to pluggable lookup backends."
)]
pub struct Args {
    /// Target(s) to investigate
    #[arg(short = 't', long = "target", value_name = "TARGET")]
    pub target: Vec<String>,

    /// Investigation module (whois, dns, subdomains, username, emails, breach, ports, crypto, dorks)
    #[arg(short = 'm', long = "module")]
    pub module: Option<String>,

    /// Force the target kind instead of inferring it
    #[arg(long = "kind", value_name = "KIND")]
    pub kind: Option<String>,

    /// First name, for email pattern generation
    #[arg(long = "first")]
    pub first: Option<String>,

    /// Last name, for email pattern generation
    #[arg(long = "last")]
    pub last: Option<String>,

    /// Ports to probe (comma-separated), overriding the configured set
    #[arg(long = "ports", value_name = "PORTS")]
    pub ports: Option<String>,

    /// Directory for persisted results
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Persist results to the output directory
    #[arg(long = "save")]
    pub save: bool,

    /// Output in JSON format
    #[arg(long = "json")]
    pub json: bool,

    /// Output in CSV format
    #[arg(long = "csv")]
    pub csv: bool,

    /// Silent mode (suppress banner and live output)
    #[arg(long = "silent")]
    pub silent: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// List all available backends
    #[arg(long = "list-backends")]
    pub list_backends: bool,

    /// Maximum concurrent backend dispatches
    #[arg(long = "max-threads")]
    pub max_threads: Option<usize>,

    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    /// Credentials file path
    #[arg(long = "credentials")]
    pub credentials_path: Option<String>,
}

impl Args {
    /// Targets may also arrive on a pipe when none were given as flags.
    pub fn use_stdin(&self) -> bool {
        self.target.is_empty() && !atty::is(atty::Stream::Stdin)
    }

    /// Parse --ports into a port list; silently drops non-numeric entries.
    pub fn port_list(&self) -> Option<Vec<u16>> {
        self.ports.as_ref().map(|spec| {
            spec.split(',')
                .filter_map(|p| p.trim().parse::<u16>().ok())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_list_parsing() {
        let args = Args::parse_from(["rustrecon", "-t", "example.com", "--ports", "22, 80,443,x"]);
        assert_eq!(args.port_list(), Some(vec![22, 80, 443]));

        let args = Args::parse_from(["rustrecon", "-t", "example.com"]);
        assert_eq!(args.port_list(), None);
    }

    #[test]
    fn test_multiple_targets() {
        let args = Args::parse_from(["rustrecon", "-t", "a.com", "-t", "b.com"]);
        assert_eq!(args.target.len(), 2);
    }
}
