use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid gateway URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Unsupported gateway URL scheme: {0}")]
    Scheme(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
