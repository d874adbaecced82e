use clap::{Parser, Subcommand};

/// Scribe blogging backend.
#[derive(Parser, Debug)]
#[command(name = "scribe", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Create or repair the fixed roles; safe to run repeatedly
    BootstrapRoles,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["scribe"]).unwrap();
        assert_eq!(cli.command(), Command::Serve);
    }

    #[test]
    fn parses_bootstrap_roles() {
        let cli = Cli::try_parse_from(["scribe", "bootstrap-roles"]).unwrap();
        assert_eq!(cli.command(), Command::BootstrapRoles);
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["scribe", "drop-tables"]).is_err());
    }
}
