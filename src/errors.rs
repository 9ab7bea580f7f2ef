use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Forecast error: {0}")]
    Forecast(String),

    #[error("Cannot read settings file '{path}'")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error deserializing settings")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to spawn worker thread '{name}'")]
    WorkerSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by a flight observer. Logged by the dispatcher, never
/// propagated to the simulation loop.
#[derive(Debug, Error)]
#[error("Observer failed: {0}")]
pub struct ObserverError(pub String);
