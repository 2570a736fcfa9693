use std::{future::Future, ops::Deref, sync::Arc};

use crate::{Database, KvError, Transaction};

/// A read transaction that is closed when it leaves scope.
///
/// Prefer closing explicitly with [`ScopedTransaction::close`]. A transaction
/// dropped while still open, e.g. because the request future was cancelled,
/// is closed in the background on the current runtime.
pub struct ScopedTransaction {
    transaction: Arc<dyn Transaction>,
    closed: bool,
}

impl ScopedTransaction {
    /// Opens a new transaction on the provided database.
    pub async fn begin<DatabaseT: Database + ?Sized>(
        database: &DatabaseT,
    ) -> Result<Self, KvError> {
        let transaction = database.begin().await?;
        Ok(Self {
            transaction,
            closed: false,
        })
    }

    /// Returns a shared handle to the transaction.
    pub fn handle(&self) -> Arc<dyn Transaction> {
        Arc::clone(&self.transaction)
    }

    /// Closes the transaction.
    pub async fn close(mut self) -> Result<(), KvError> {
        self.closed = true;
        self.transaction.close().await
    }
}

impl Deref for ScopedTransaction {
    type Target = dyn Transaction;

    fn deref(&self) -> &Self::Target {
        self.transaction.as_ref()
    }
}

impl Drop for ScopedTransaction {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        log::warn!("read transaction dropped without being closed");
        let transaction = Arc::clone(&self.transaction);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(error) = transaction.close().await {
                        log::warn!("failed to close dropped read transaction: {error}");
                    }
                });
            }
            Err(_) => log::error!("no runtime available to close dropped read transaction"),
        }
    }
}

/// Runs `body` inside a fresh read transaction and closes the transaction on
/// every exit path.
///
/// A failure to close is reported only when `body` succeeded; otherwise the
/// error of `body` wins.
pub async fn with_transaction<DatabaseT, BodyT, FutureT, T, E>(
    database: &DatabaseT,
    body: BodyT,
) -> Result<T, E>
where
    DatabaseT: Database + ?Sized,
    BodyT: FnOnce(Arc<dyn Transaction>) -> FutureT,
    FutureT: Future<Output = Result<T, E>>,
    E: From<KvError>,
{
    let transaction = ScopedTransaction::begin(database).await?;
    let result = body(transaction.handle()).await;
    let closed = transaction.close().await;

    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(error)) => Err(error.into()),
        (Err(error), closed) => {
            if let Err(close_error) = closed {
                log::warn!("failed to close read transaction: {close_error}");
            }
            Err(error)
        }
    }
}
