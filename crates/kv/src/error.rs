/// Errors raised while talking to the remote key-value store.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KvError {
    /// The connection to the remote store was closed
    #[error("connection to the remote key-value store closed")]
    ConnectionClosed,
    /// The transaction was already closed
    #[error("remote transaction {0} already closed")]
    TransactionClosed(u64),
    /// The remote store answered with an unexpected reply
    #[error("malformed remote response: {0}")]
    MalformedResponse(String),
    /// The remote store reported a failure
    #[error("remote key-value store error: {0}")]
    Remote(String),
}
