use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[clap(
    name = clap::crate_name!(),
    version = clap::crate_version!(),
    about = clap::crate_description!()
)]
pub struct Cli {
    /// Override the log level from the configuration
    #[clap(long, arg_enum, global = true)]
    pub logging: Option<LoggingSpec>,

    #[clap(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum CliCommand {
    /// Run the exporter
    #[clap(name = "run")]
    Run {
        config: PathBuf,

        /// Do not check that the configured probe and marker directories exist
        #[clap(long)]
        skip_path_validation: bool,
    },

    /// Only load and validate the configuration
    #[clap(name = "validate-config")]
    ValidateConfig { config: PathBuf },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ArgEnum)]
pub enum LoggingSpec {
    Off,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}
