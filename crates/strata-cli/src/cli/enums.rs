use clap::ValueEnum;
use strata_bundler::BuildMode;

/// Build mode
#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum Mode {
    /// Readable output with full identities, kept in memory
    #[value(name = "development", alias = "dev")]
    Development,

    /// Minified output with short identities, published to the output directory
    #[value(name = "production", alias = "prod")]
    Production,
}

impl From<Mode> for BuildMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Development => BuildMode::Development,
            Mode::Production => BuildMode::Production,
        }
    }
}
