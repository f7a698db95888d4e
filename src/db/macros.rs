//! Gateway scaffolding macros.
//!
//! Every gateway operation has the same outer shape: take a connection
//! lease, run one procedure sequence on it, release the lease on every exit
//! path and log the failure at the boundary. The macro expands that shape
//! in place so each operation reads linearly.

/// Run `$body` on a leased connection and release it afterwards.
///
/// `$body` is an expression producing a future of `DbResult<T>` that may
/// borrow `$conn`. The whole sequence runs inside a `gateway` span carrying
/// the operation name and a fresh operation id.
///
/// # Example
///
/// ```ignore
/// let result = leased!(&self.pool, "retrieve_salt", |conn| retrieve_salt(conn, user_name));
/// ```
#[macro_export]
macro_rules! leased {
    ($pool:expr, $operation:expr, |$conn:ident| $body:expr) => {{
        use ::tracing::Instrument as _;

        let span = ::tracing::debug_span!(
            "gateway",
            operation = $operation,
            operation_id = %::uuid::Uuid::new_v4()
        );
        async {
            let result = match $crate::db::lease::ConnectionLease::acquire($pool).await {
                Ok(mut lease) => {
                    let result = match lease.connection() {
                        Ok($conn) => $body.await,
                        Err(e) => Err(e),
                    };
                    lease.release().await;
                    result
                }
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                ::tracing::error!(
                    operation = $operation,
                    error = %e,
                    suggestion = ?e.suggestion(),
                    "Gateway operation failed"
                );
            }
            result
        }
        .instrument(span)
        .await
    }};
}

pub use leased;
