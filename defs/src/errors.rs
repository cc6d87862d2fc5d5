use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Request to {0} failed: {1}")]
    Transport(String, String),

    #[error("The database rejected the request with status {status}: {message}")]
    Database { status: u16, message: String },

    #[error("The response is missing a payload")]
    MissingPayload(),

    #[error("Could not decode the response: {0}")]
    Decode(String),

    #[error("Cold storage returned status {0} for {1}")]
    ColdStorage(u16, String),
}
