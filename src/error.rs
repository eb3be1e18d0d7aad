use std::io;

#[allow(clippy::enum_variant_names)]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    // from
    #[error("failed io {0}")]
    Io(#[from] io::Error),
    #[error("failed to decode toml {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("failed to parse url {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build http client {0}")]
    Client(#[from] reqwest::Error),
    #[error("failed to build glob {0}")]
    Glob(#[from] globset::Error),
    #[error("failed to watch config {0}")]
    Notify(#[from] notify::Error),

    // config
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // lifecycle
    #[error("no generation is waiting to activate")]
    NothingWaiting,
    #[error("generation {0} was superseded before it finished installing")]
    Superseded(String),
}

pub type Result<T, E = Error> = anyhow::Result<T, E>;
