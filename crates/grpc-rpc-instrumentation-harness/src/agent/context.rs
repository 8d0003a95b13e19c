use std::future::Future;

use super::TransactionHandle;

tokio::task_local! {
    static CURRENT_TRANSACTION: TransactionHandle;
}

/// The transaction active on the current task, if any and not yet finished
pub fn current_transaction() -> Option<TransactionHandle> {
    CURRENT_TRANSACTION
        .try_with(TransactionHandle::clone)
        .ok()
        .filter(|handle| !handle.is_finished())
}

/// Run `fut` with `handle` as the current transaction
pub(crate) async fn scope<F: Future>(handle: TransactionHandle, fut: F) -> F::Output {
    CURRENT_TRANSACTION.scope(handle, fut).await
}
