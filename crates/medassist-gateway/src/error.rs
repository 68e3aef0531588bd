/// Fatal gateway failures; request-level problems become HTTP statuses instead.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("cannot listen on {0}: {1}")]
    Bind(String, #[source] std::io::Error),

    #[error("gateway stopped unexpectedly: {0}")]
    Server(String),
}
