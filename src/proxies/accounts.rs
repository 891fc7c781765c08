use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::json;
use tracing::info;

use super::{Shared, assign_id, check_filters, translate};
use crate::db::{Filter, InsertReq, QueryDesc};
use crate::error::{Result, ValidationError};
use crate::models::Account;

static MAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("mail pattern"));

pub struct Accounts {
    shared: Arc<Shared>,
}

impl Accounts {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn list(&self, filters: &[Filter]) -> Result<Vec<Account>> {
        check_filters(filters, &["id", "mail"])?;
        self.shared
            .fetch(
                QueryDesc::new("accounts", &["id", "mail"])
                    .filtered(filters.iter().cloned())
                    .ordered_by("mail", false),
            )?
            .iter()
            .map(|row| {
                Ok(Account {
                    id: row.str("id")?,
                    mail: row.str("mail")?,
                })
            })
            .collect()
    }

    pub fn create(&self, mut account: Account) -> Result<String> {
        assign_id(&mut account.id)?;
        if !MAIL.is_match(&account.mail) {
            return Err(ValidationError::InvalidField(format!("invalid mail \"{}\"", account.mail)).into());
        }

        self.shared
            .store
            .insert_to_db(&InsertReq::new("create_account", vec![json!(account)]))
            .map_err(|err| {
                translate(err, |err| {
                    err.is_duplicate_on("mail")
                        .then(|| format!("mail \"{}\" is already registered", account.mail))
                })
            })?;

        info!(account = %account.id, "account.created");
        Ok(account.id)
    }
}
