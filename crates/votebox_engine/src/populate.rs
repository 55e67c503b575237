/* 📖 # How does question data get into the store?

Questions are described in a JSON file: a list of records, each with a text,
an optional title and flags, and the option texts in display order. The whole
file is inserted in one transaction, so a duplicate option or an overlong
title leaves the store as it was.

Accounts listed in the configuration are seeded the same way. Usernames that
already exist are left untouched, which makes seeding safe to repeat.
*/

use serde::Deserialize;
use tracing::info;

use votebox_base::{FilePath, Pal, ResultExt, VoteboxResult};

use crate::auth::PasswordHash;
use crate::config::UserConfig;
use crate::model::{NewAccount, NewQuestion};
use crate::store::StoreHandle;

/// One question of a data file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionRecord {
    #[serde(default)]
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub multivote: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_show_count")]
    pub show_count: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_show_count() -> bool {
    true
}

/// Parse the question records of a data file.
pub fn parse_questions(text: &str) -> VoteboxResult<Vec<QuestionRecord>> {
    serde_json::from_str(text).map_err(|e| votebox_base::err!("Invalid question data: {}", e))
}

pub fn load_questions(pal: &dyn Pal, path: &FilePath) -> VoteboxResult<Vec<QuestionRecord>> {
    let text = pal
        .read_file_to_string(path)
        .with_context(|| format!("Failed to read question data {}", path))?;
    parse_questions(&text).with_context(|| format!("In {}", path))
}

/// Insert the questions and their options in one transaction.
///
/// Returns the number of questions inserted.
pub fn populate(store: &StoreHandle, records: &[QuestionRecord]) -> VoteboxResult<usize> {
    store.transaction(|store| {
        for record in records {
            let question = store
                .insert_question(
                    NewQuestion::new(record.text.clone())
                        .with_title(record.title.clone())
                        .with_multivote(record.multivote)
                        .with_locked(record.locked)
                        .with_show_count(record.show_count),
                )
                .with_context(|| format!("Loading question '{}'", record.text))?;
            for option in &record.options {
                store
                    .insert_option(question, option)
                    .with_context(|| format!("Loading question '{}'", record.text))?;
            }
        }
        Ok(())
    })?;
    info!(questions = records.len(), "populated questions");
    Ok(records.len())
}

/// Create the configured accounts, skipping usernames that exist.
///
/// Returns the number of accounts created.
pub fn seed_users(store: &StoreHandle, users: &[UserConfig]) -> VoteboxResult<usize> {
    let created = store.transaction(|store| {
        let mut created = 0;
        for user in users {
            if store.account_by_username(&user.username)?.is_some() {
                continue;
            }
            store.insert_account(NewAccount {
                username: user.username.clone(),
                password: PasswordHash::create(&user.password),
                is_active: user.active,
            })?;
            created += 1;
        }
        Ok(created)
    })?;
    info!(accounts = created, "seeded accounts");
    Ok(created)
}
