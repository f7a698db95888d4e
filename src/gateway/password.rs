//! Password management.
//!
//! Both procedures report through a single TINYINT output flag and return no
//! cursor. A zero flag means the procedure found no matching user, which is
//! reported as `NotFound`.

use crate::db::connection::{ConnectionPool, ProcedureConnection};
use crate::db::invoker::PreparedCall;
use crate::error::DbResult;
use crate::leased;
use crate::models::{Outcome, ProcedureCall, SqlType};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct PasswordGateway {
    pool: Arc<dyn ConnectionPool>,
}

impl PasswordGateway {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Store a new password hash and salt for `user_name`.
    pub async fn change_password(&self, user_name: &str, hash: &str, salt: &str) -> Outcome<()> {
        let call = ProcedureCall::new("changeUserPassword")
            .arg(user_name)
            .arg(hash)
            .arg(salt)
            .out(4, SqlType::TinyInt);
        let result = leased!(&self.pool, "change_password", |conn| {
            run_flagged(conn, call, 4)
        });
        Outcome::from_lookup(result)
    }

    /// Flag `user_name` for a password reset if `email` matches the account.
    pub async fn request_password_reset(&self, user_name: &str, email: &str) -> Outcome<()> {
        let call = ProcedureCall::new("requestPasswordReset")
            .arg(user_name)
            .arg(email)
            .out(3, SqlType::TinyInt);
        let result = leased!(&self.pool, "request_password_reset", |conn| {
            run_flagged(conn, call, 3)
        });
        Outcome::from_lookup(result)
    }
}

/// Execute `call` and read its success flag at `flag_position`.
async fn run_flagged(
    conn: &mut dyn ProcedureConnection,
    call: ProcedureCall,
    flag_position: usize,
) -> DbResult<Option<()>> {
    let mut prepared = PreparedCall::prepare(conn, call)?;
    prepared.execute().await?;
    let flag = prepared.output_flag(flag_position).await?;
    debug!(procedure = %prepared.call().name(), flag, "Password procedure completed");
    prepared.close().await?;
    Ok((flag != 0).then_some(()))
}
