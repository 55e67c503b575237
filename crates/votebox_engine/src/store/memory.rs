/* 📖 # How does InMemoryStore implement transactions?

All tables live in one `Tables` value. `begin` clones it, `rollback` puts the
clone back and `commit` drops it. The store only exists to run the API and its
tests, so copying a few small maps per mutating request is acceptable.

Uniqueness is kept in side indexes: (user, option) → choice,
(question, text) → option and username → account. Lookups that a relational
store would answer with an index use these maps instead of scanning.
*/

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument};
use votebox_base::{VoteboxError, VoteboxResult};

use crate::model::{
    Account, Choice, ChoiceId, MAX_OPTION_TEXT_LEN, MAX_TITLE_LEN, NewAccount, NewQuestion,
    OptionId, PollOption, Question, QuestionId, UserId,
};
use crate::store::traits::PollStore;

#[derive(Debug, Clone, Default)]
struct Tables {
    questions: BTreeMap<QuestionId, Question>,
    options: BTreeMap<OptionId, PollOption>,
    choices: BTreeMap<ChoiceId, Choice>,
    accounts: BTreeMap<UserId, Account>,
    choice_index: BTreeMap<(UserId, OptionId), ChoiceId>,
    option_text_index: BTreeMap<(QuestionId, String), OptionId>,
    username_index: BTreeMap<String, UserId>,
    last_question_id: u64,
    last_option_id: u64,
    last_choice_id: u64,
    last_user_id: u64,
}

/// An in-memory poll store.
///
/// ```
/// use votebox_engine::model::NewQuestion;
/// use votebox_engine::store::{InMemoryStore, PollStore};
///
/// let mut store = InMemoryStore::new();
/// let question = store
///     .insert_question(NewQuestion::new("Favorite OS?").with_title("OS"))
///     .unwrap();
/// let linux = store.insert_option(question, "Linux").unwrap();
/// assert_eq!(store.options_of(question).unwrap()[0].id, linux);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Tables,
    saved: Option<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_user(&self, user: UserId) -> VoteboxResult<()> {
        if self.tables.accounts.contains_key(&user) {
            Ok(())
        } else {
            Err(Box::new(VoteboxError::not_found(format!("User {}", user))))
        }
    }
}

impl PollStore for InMemoryStore {
    #[instrument(skip(self, question), fields(text = %question.text))]
    fn insert_question(&mut self, question: NewQuestion) -> VoteboxResult<QuestionId> {
        if question.text.is_empty() {
            return Err(Box::new(VoteboxError::constraint(
                "question text must not be empty",
            )));
        }
        if question.title.chars().count() > MAX_TITLE_LEN {
            return Err(Box::new(VoteboxError::constraint(format!(
                "question title '{}' is longer than {} characters",
                question.title, MAX_TITLE_LEN
            ))));
        }
        self.tables.last_question_id += 1;
        let id = QuestionId::new(self.tables.last_question_id);
        self.tables.questions.insert(
            id,
            Question {
                id,
                title: question.title,
                text: question.text,
                multivote: question.multivote,
                locked: question.locked,
                show_count: question.show_count,
            },
        );
        debug!(question = %id, "inserted question");
        Ok(id)
    }

    #[instrument(skip(self))]
    fn insert_option(&mut self, question: QuestionId, text: &str) -> VoteboxResult<OptionId> {
        if !self.tables.questions.contains_key(&question) {
            return Err(Box::new(VoteboxError::not_found(format!(
                "Question {}",
                question
            ))));
        }
        if text.is_empty() {
            return Err(Box::new(VoteboxError::constraint(
                "option text must not be empty",
            )));
        }
        if text.chars().count() > MAX_OPTION_TEXT_LEN {
            return Err(Box::new(VoteboxError::constraint(format!(
                "option text '{}' is longer than {} characters",
                text, MAX_OPTION_TEXT_LEN
            ))));
        }
        let key = (question, text.to_string());
        if self.tables.option_text_index.contains_key(&key) {
            return Err(Box::new(VoteboxError::constraint(format!(
                "duplicate option text '{}' in question {}",
                text, question
            ))));
        }
        self.tables.last_option_id += 1;
        let id = OptionId::new(self.tables.last_option_id);
        self.tables.options.insert(
            id,
            PollOption {
                id,
                question,
                text: text.to_string(),
            },
        );
        self.tables.option_text_index.insert(key, id);
        debug!(option = %id, "inserted option");
        Ok(id)
    }

    #[instrument(skip(self))]
    fn set_locked(&mut self, question: QuestionId, locked: bool) -> VoteboxResult<()> {
        let entry = self
            .tables
            .questions
            .get_mut(&question)
            .ok_or_else(|| Box::new(VoteboxError::not_found(format!("Question {}", question))))?;
        entry.locked = locked;
        Ok(())
    }

    fn question(&self, id: QuestionId) -> VoteboxResult<Option<Question>> {
        Ok(self.tables.questions.get(&id).cloned())
    }

    fn questions(&self) -> VoteboxResult<Vec<Question>> {
        Ok(self.tables.questions.values().cloned().collect())
    }

    fn option(&self, id: OptionId) -> VoteboxResult<Option<PollOption>> {
        Ok(self.tables.options.get(&id).cloned())
    }

    fn options(&self) -> VoteboxResult<Vec<PollOption>> {
        Ok(self.tables.options.values().cloned().collect())
    }

    fn options_of(&self, question: QuestionId) -> VoteboxResult<Vec<PollOption>> {
        Ok(self
            .tables
            .options
            .values()
            .filter(|option| option.question == question)
            .cloned()
            .collect())
    }

    fn option_ids(&self) -> VoteboxResult<BTreeSet<OptionId>> {
        Ok(self.tables.options.keys().copied().collect())
    }

    fn find_choice(&self, user: UserId, option: OptionId) -> VoteboxResult<Option<Choice>> {
        Ok(self
            .tables
            .choice_index
            .get(&(user, option))
            .and_then(|id| self.tables.choices.get(id))
            .copied())
    }

    #[instrument(skip(self))]
    fn insert_choice(&mut self, user: UserId, option: OptionId) -> VoteboxResult<ChoiceId> {
        self.check_user(user)?;
        if !self.tables.options.contains_key(&option) {
            return Err(Box::new(VoteboxError::not_found(format!("Option {}", option))));
        }
        if self.tables.choice_index.contains_key(&(user, option)) {
            return Err(Box::new(VoteboxError::constraint(format!(
                "user {} already chose option {}",
                user, option
            ))));
        }
        self.tables.last_choice_id += 1;
        let id = ChoiceId::new(self.tables.last_choice_id);
        self.tables
            .choices
            .insert(id, Choice { id, user, option });
        self.tables.choice_index.insert((user, option), id);
        Ok(id)
    }

    #[instrument(skip(self))]
    fn delete_choice(&mut self, id: ChoiceId) -> VoteboxResult<bool> {
        match self.tables.choices.remove(&id) {
            Some(choice) => {
                self.tables
                    .choice_index
                    .remove(&(choice.user, choice.option));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn choices_of_user(&self, user: UserId) -> VoteboxResult<Vec<Choice>> {
        Ok(self
            .tables
            .choice_index
            .range((user, OptionId::new(0))..=(user, OptionId::new(u64::MAX)))
            .filter_map(|(_, id)| self.tables.choices.get(id))
            .copied()
            .collect())
    }

    fn vote_count(&self, option: OptionId) -> VoteboxResult<usize> {
        Ok(self
            .tables
            .choices
            .values()
            .filter(|choice| choice.option == option)
            .count())
    }

    #[instrument(skip(self, account), fields(username = %account.username))]
    fn insert_account(&mut self, account: NewAccount) -> VoteboxResult<UserId> {
        if self.tables.username_index.contains_key(&account.username) {
            return Err(Box::new(VoteboxError::constraint(format!(
                "username '{}' is taken",
                account.username
            ))));
        }
        self.tables.last_user_id += 1;
        let id = UserId::new(self.tables.last_user_id);
        self.tables
            .username_index
            .insert(account.username.clone(), id);
        self.tables.accounts.insert(
            id,
            Account {
                id,
                username: account.username,
                password: account.password,
                is_active: account.is_active,
            },
        );
        debug!(user = %id, "inserted account");
        Ok(id)
    }

    fn account(&self, id: UserId) -> VoteboxResult<Option<Account>> {
        Ok(self.tables.accounts.get(&id).cloned())
    }

    fn account_by_username(&self, username: &str) -> VoteboxResult<Option<Account>> {
        Ok(self
            .tables
            .username_index
            .get(username)
            .and_then(|id| self.tables.accounts.get(id))
            .cloned())
    }

    fn begin(&mut self) -> VoteboxResult<()> {
        if self.saved.is_some() {
            votebox_base::bail!("a transaction is already open");
        }
        self.saved = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> VoteboxResult<()> {
        if self.saved.take().is_none() {
            votebox_base::bail!("commit without an open transaction");
        }
        Ok(())
    }

    fn rollback(&mut self) -> VoteboxResult<()> {
        match self.saved.take() {
            Some(tables) => {
                debug!("rolling back transaction");
                self.tables = tables;
                Ok(())
            }
            None => votebox_base::bail!("rollback without an open transaction"),
        }
    }
}
