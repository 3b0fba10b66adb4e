use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use schoolseed_core::{NewUser, PersonalData, Role};

use crate::factory::FixtureCredential;
use crate::store::{Store, StoreError};

/// Account the registration service creates for manual testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestingAccount {
    pub email: &'static str,
    pub role: Role,
}

pub const ADMIN_ACCOUNT: TestingAccount = TestingAccount {
    email: "admin",
    role: Role::Admin,
};
pub const STUDENT_ACCOUNT: TestingAccount = TestingAccount {
    email: "student",
    role: Role::Student,
};
pub const PRECEPTOR_ACCOUNT: TestingAccount = TestingAccount {
    email: "preceptor",
    role: Role::Preceptor,
};
pub const FATHER_ACCOUNT: TestingAccount = TestingAccount {
    email: "father",
    role: Role::Father,
};
pub const TEACHER_ACCOUNT: TestingAccount = TestingAccount {
    email: "teacher",
    role: Role::Teacher,
};
pub const SECOND_STUDENT_ACCOUNT: TestingAccount = TestingAccount {
    email: "valentinogrande972@gmail.com",
    role: Role::Student,
};

/// Registration order of the testing accounts.
pub const TESTING_ACCOUNTS: [TestingAccount; 6] = [
    ADMIN_ACCOUNT,
    STUDENT_ACCOUNT,
    PRECEPTOR_ACCOUNT,
    FATHER_ACCOUNT,
    TEACHER_ACCOUNT,
    SECOND_STUDENT_ACCOUNT,
];

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("registration endpoint answered {status}, expected 201")]
    Status { status: u16 },
    #[error("registration request failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registers the testing accounts before fixture wiring runs.
///
/// Implementations either call the external registration service or write the
/// accounts themselves through `store`, inside the open phase.
#[async_trait]
pub trait Bootstrap: Send + Sync {
    async fn register_testing_users(&self, store: &mut dyn Store) -> Result<(), BootstrapError>;
}

/// Writes the testing accounts straight through the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectBootstrap;

impl DirectBootstrap {
    /// Personal data the registration service stores for every account.
    pub fn placeholder_person() -> PersonalData {
        PersonalData {
            full_name: "valentino grande".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2024, 7, 18).unwrap_or_default(),
            address: "santa coloma 9282".to_string(),
            phone_number: "543412115831".to_string(),
        }
    }
}

#[async_trait]
impl Bootstrap for DirectBootstrap {
    async fn register_testing_users(&self, store: &mut dyn Store) -> Result<(), BootstrapError> {
        let person = Self::placeholder_person();
        for account in TESTING_ACCOUNTS {
            let user = NewUser {
                email: account.email.to_string(),
                password_hash: FixtureCredential::PASSWORD_HASH.to_string(),
                role: account.role,
            };
            let user_id = store.insert_user(&user).await?;
            store.upsert_personal_data(user_id, &person).await?;
            tracing::debug!(email = account.email, user_id, "testing account registered");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use schoolseed_core::Phase;

    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn direct_bootstrap_registers_six_accounts() {
        let mut store = MemoryStore::new();
        store.begin_phase(Phase::FixtureUsers).await.unwrap();
        DirectBootstrap.register_testing_users(&mut store).await.unwrap();
        store.commit_phase().await.unwrap();

        let data = store.dataset();
        assert_eq!(data.users.len(), 6);
        assert_eq!(data.personal_data.len(), 6);
        assert_eq!(data.user_by_email("father").unwrap().role, Role::Father);
        assert_eq!(data.users_with_role(Role::Student).count(), 2);
    }

    #[tokio::test]
    async fn registering_twice_hits_the_unique_email_key() {
        let mut store = MemoryStore::new();
        store.begin_phase(Phase::FixtureUsers).await.unwrap();
        DirectBootstrap.register_testing_users(&mut store).await.unwrap();
        let err = DirectBootstrap.register_testing_users(&mut store).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Store(StoreError::ConstraintViolation { entity: "users", .. })
        ));
    }
}
