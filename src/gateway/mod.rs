//! Operation gateways.
//!
//! Each gateway composes the procedure core around one or two named stored
//! procedures. Every operation takes its own connection lease, never returns
//! `Err`, and reports `Success`, `NotFound` or `Failure` through [`Outcome`].
//!
//! [`Outcome`]: crate::models::Outcome

pub mod call_list;
pub mod password;
pub mod sign_in;
pub mod treatment;

pub use call_list::CallListGateway;
pub use password::PasswordGateway;
pub use sign_in::SignInGateway;
pub use treatment::TreatmentGateway;

use crate::db::ConnectionPool;
use std::sync::Arc;

/// All gateways over one shared pool.
#[derive(Clone)]
pub struct Registry {
    pub call_list: CallListGateway,
    pub password: PasswordGateway,
    pub treatment: TreatmentGateway,
    pub sign_in: SignInGateway,
}

impl Registry {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        Self {
            call_list: CallListGateway::new(Arc::clone(&pool)),
            password: PasswordGateway::new(Arc::clone(&pool)),
            treatment: TreatmentGateway::new(Arc::clone(&pool)),
            sign_in: SignInGateway::new(pool),
        }
    }
}
