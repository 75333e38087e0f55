use thiserror::Error;

#[derive(Debug, Clone, Default)]
pub struct CliOptions;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    #[error("help requested")]
    HelpRequested,
}

impl CliOptions {
    pub fn parse<I>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        match args.into_iter().next() {
            None => Ok(Self),
            Some(arg) if arg == "--help" || arg == "-h" => Err(CliError::HelpRequested),
            Some(arg) => Err(CliError::UnknownArgument(arg)),
        }
    }
}
