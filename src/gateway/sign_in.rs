//! Sign-in and user lookup.

use crate::db::connection::{ConnectionPool, ProcedureConnection};
use crate::db::invoker::PreparedCall;
use crate::db::mapper::{drain_first, drain_next, skip_cursor};
use crate::db::types::ResultRow;
use crate::error::DbResult;
use crate::leased;
use crate::models::{Clinic, Outcome, ProcedureCall, SignInStatus, SqlType, UserProfile};
use std::sync::Arc;

/// Output positions of `authenticateUser`.
const AUTHENTICATED_FLAG: usize = 3;
const PASSWORD_CHANGE_FLAG: usize = 4;
const SUCCEEDED_FLAG: usize = 5;

#[derive(Clone)]
pub struct SignInGateway {
    pool: Arc<dyn ConnectionPool>,
}

impl SignInGateway {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Password salt stored for `user_name`.
    pub async fn retrieve_salt(&self, user_name: &str) -> Outcome<String> {
        let result = leased!(&self.pool, "retrieve_salt", |conn| {
            retrieve_salt(conn, user_name)
        });
        Outcome::from_lookup(result)
    }

    /// Whether the `authentic` column of the first row is exactly 1.
    ///
    /// A call without a cursor is `NotFound`; a cursor without rows is
    /// `Success(false)`.
    pub async fn validate_user(&self, user_name: &str, password: &str) -> Outcome<bool> {
        let result = leased!(&self.pool, "validate_user", |conn| {
            validate_user(conn, user_name, password)
        });
        Outcome::from_lookup(result)
    }

    /// Sign-in status decided from the output flags of `authenticateUser`.
    pub async fn authenticate_user(&self, user_name: &str, password: &str) -> Outcome<SignInStatus> {
        let result = leased!(&self.pool, "authenticate_user", |conn| {
            authenticate_user(conn, user_name, password)
        });
        Outcome::from_lookup(result).map(|(authenticated, change, succeeded)| {
            SignInStatus::from_flags(authenticated, change, succeeded)
        })
    }

    /// Profile of `user_name` with the clinics they belong to.
    ///
    /// The clinics list is kept even when empty.
    pub async fn get_user(&self, user_name: &str) -> Outcome<UserProfile> {
        let result = leased!(&self.pool, "get_user", |conn| get_user(conn, user_name));
        Outcome::from_lookup(result)
    }
}

/// `retrieveSalt` takes a second slot the gateway never reads.
fn salt_call(user_name: &str) -> ProcedureCall {
    ProcedureCall::new("retrieveSalt")
        .arg(user_name)
        .out(2, SqlType::Integer)
}

fn authentication_call(user_name: &str, password: &str) -> ProcedureCall {
    ProcedureCall::new("authenticateUser")
        .arg(user_name)
        .arg(password)
        .out(AUTHENTICATED_FLAG, SqlType::Integer)
        .out(PASSWORD_CHANGE_FLAG, SqlType::Integer)
        .out(SUCCEEDED_FLAG, SqlType::Integer)
}

async fn retrieve_salt(
    conn: &mut dyn ProcedureConnection,
    user_name: &str,
) -> DbResult<Option<String>> {
    let mut prepared = PreparedCall::prepare(conn, salt_call(user_name))?;
    prepared.execute().await?;

    let salts = drain_first(&mut prepared, |row| row.get_string("salt")).await?;
    prepared.close().await?;
    // First row wins; a NULL salt is no salt
    Ok(salts.and_then(|s| s.into_iter().next().flatten()))
}

async fn validate_user(
    conn: &mut dyn ProcedureConnection,
    user_name: &str,
    password: &str,
) -> DbResult<Option<bool>> {
    let mut prepared = PreparedCall::prepare(conn, authentication_call(user_name, password))?;
    prepared.execute().await?;

    let Some(mut cursor) = prepared.result_set() else {
        return Ok(None);
    };
    let authentic = match cursor.next_row().await? {
        Some(row) => row.get_i32("authentic")?,
        None => 0,
    };
    cursor.close().await?;
    prepared.close().await?;
    Ok(Some(authentic == 1))
}

async fn authenticate_user(
    conn: &mut dyn ProcedureConnection,
    user_name: &str,
    password: &str,
) -> DbResult<Option<(bool, bool, bool)>> {
    let mut prepared = PreparedCall::prepare(conn, authentication_call(user_name, password))?;
    prepared.execute().await?;
    skip_cursor(&mut prepared).await?;

    let authenticated = prepared.output_flag(AUTHENTICATED_FLAG).await? != 0;
    let password_change = prepared.output_flag(PASSWORD_CHANGE_FLAG).await? != 0;
    let succeeded = prepared.output_flag(SUCCEEDED_FLAG).await? != 0;
    prepared.close().await?;
    Ok(Some((authenticated, password_change, succeeded)))
}

async fn get_user(
    conn: &mut dyn ProcedureConnection,
    user_name: &str,
) -> DbResult<Option<UserProfile>> {
    let call = ProcedureCall::new("getUser")
        .arg(user_name)
        .out(2, SqlType::Integer);
    let mut prepared = PreparedCall::prepare(conn, call)?;
    prepared.execute().await?;

    let Some(rows) = drain_first(&mut prepared, |row| user_profile(row, user_name)).await? else {
        return Ok(None);
    };
    // Several rows may come back; the last one describes the user
    let Some(mut user) = rows.into_iter().last() else {
        return Ok(None);
    };
    let Some(clinics) = drain_next(&mut prepared, clinic).await? else {
        return Ok(None);
    };
    prepared.close().await?;

    user.clinics = clinics;
    Ok(Some(user))
}

fn user_profile(row: &ResultRow, user_name: &str) -> DbResult<UserProfile> {
    Ok(UserProfile {
        user_name: user_name.to_string(),
        first_name: row.get_string("first name")?,
        last_name: row.get_string("last name")?,
        job_title: row.get_string("job title")?,
        administrator: row.get_bool("administrator")?,
        clinics: Vec::new(),
    })
}

fn clinic(row: &ResultRow) -> DbResult<Clinic> {
    Ok(Clinic {
        clinic_id: row.get_i32("clinic id")?,
        clinic_name: row.get_string("clinic name")?,
    })
}
