//! Options shared by the command-line tools

use tracing::Level;

/// `-v` / `-q` flags controlling the log level on stderr
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct Verbosity {
    /// Log debug detail (dropped events, skipped chunks)
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Verbosity {
    pub fn level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::WARN
        } else {
            Level::INFO
        }
    }

    /// Install the stderr subscriber for a binary
    pub fn init(&self) {
        tracing_subscriber::fmt()
            .with_max_level(self.level())
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(Verbosity::default().level(), Level::INFO);
        let v = Verbosity {
            verbose: true,
            quiet: false,
        };
        assert_eq!(v.level(), Level::DEBUG);
        let q = Verbosity {
            verbose: false,
            quiet: true,
        };
        assert_eq!(q.level(), Level::WARN);
    }
}
