/* 📖 # Why create a PollStore trait?

The PollStore trait is the persistence boundary of the poll engine. It owns
the four entity kinds (questions, options, choices, accounts) and enforces the
constraints a relational schema would: unique option text per question, one
choice per (user, option), unique usernames, and valid references.

Everything above it (choice engine, vote application, queries) is written
against `&dyn PollStore` / `&mut dyn PollStore`, so a database backed store
can replace InMemoryStore without touching that logic.
*/

/* 📖 # Why does StoreHandle expose transactions instead of single operations?

A vote request validates option ids and then applies several choose/unchoose
calls; choose itself inserts a choice and then prunes siblings. Both must be
atomic with respect to other requests. `transaction` holds the write lock for
the whole closure and asks the store to roll back when the closure fails, so
callers never see half of a vote or half of a data load.
*/

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;

use votebox_base::VoteboxResult;

use crate::model::{
    Account, Choice, ChoiceId, NewAccount, NewQuestion, OptionId, PollOption, Question,
    QuestionId, UserId,
};

/// Storage for questions, options, choices and accounts.
///
/// Listing operations return entities ordered by id.
pub trait PollStore: Send + Sync + 'static {
    /// Store a new question. Fails with a constraint error when the title is
    /// longer than [`crate::model::MAX_TITLE_LEN`] or the text is empty.
    fn insert_question(&mut self, question: NewQuestion) -> VoteboxResult<QuestionId>;

    /// Add an option to a question.
    ///
    /// Fails with `NotFound` for an unknown question and with a constraint
    /// error when the text is empty, too long, or already used by another
    /// option of the same question.
    fn insert_option(&mut self, question: QuestionId, text: &str) -> VoteboxResult<OptionId>;

    /// Lock or unlock a question.
    fn set_locked(&mut self, question: QuestionId, locked: bool) -> VoteboxResult<()>;

    fn question(&self, id: QuestionId) -> VoteboxResult<Option<Question>>;

    fn questions(&self) -> VoteboxResult<Vec<Question>>;

    fn option(&self, id: OptionId) -> VoteboxResult<Option<PollOption>>;

    fn options(&self) -> VoteboxResult<Vec<PollOption>>;

    /// Options belonging to one question.
    fn options_of(&self, question: QuestionId) -> VoteboxResult<Vec<PollOption>>;

    /// Ids of every stored option.
    fn option_ids(&self) -> VoteboxResult<BTreeSet<OptionId>>;

    fn find_choice(&self, user: UserId, option: OptionId) -> VoteboxResult<Option<Choice>>;

    /// Record that `user` selected `option`.
    ///
    /// Fails with a constraint error if that choice already exists and with
    /// `NotFound` if the user or option does not exist.
    fn insert_choice(&mut self, user: UserId, option: OptionId) -> VoteboxResult<ChoiceId>;

    /// Delete a choice. Returns whether it existed.
    fn delete_choice(&mut self, id: ChoiceId) -> VoteboxResult<bool>;

    /// Choices of one user, ordered by option id.
    fn choices_of_user(&self, user: UserId) -> VoteboxResult<Vec<Choice>>;

    /// Number of choices referencing an option.
    fn vote_count(&self, option: OptionId) -> VoteboxResult<usize>;

    /// Store a new account. Fails with a constraint error if the username is
    /// taken.
    fn insert_account(&mut self, account: NewAccount) -> VoteboxResult<UserId>;

    fn account(&self, id: UserId) -> VoteboxResult<Option<Account>>;

    fn account_by_username(&self, username: &str) -> VoteboxResult<Option<Account>>;

    /// Start a transaction. Changes made until `commit` or `rollback` form
    /// one unit.
    fn begin(&mut self) -> VoteboxResult<()>;

    fn commit(&mut self) -> VoteboxResult<()>;

    /// Undo every change since the matching `begin`.
    fn rollback(&mut self) -> VoteboxResult<()>;
}

/// A thread-safe, cheaply cloneable handle to a poll store.
///
/// This follows the same pattern as `PalHandle` in votebox_base.
#[derive(Clone)]
pub struct StoreHandle(Arc<RwLock<dyn PollStore>>);

impl StoreHandle {
    pub fn new<S: PollStore>(store: S) -> Self {
        Self(Arc::new(RwLock::new(store)))
    }

    /// Run a read-only closure under the shared lock.
    pub fn read<T>(&self, f: impl FnOnce(&dyn PollStore) -> VoteboxResult<T>) -> VoteboxResult<T> {
        let guard = self.0.read();
        f(&*guard)
    }

    /// Run a closure under the exclusive lock as one transaction.
    ///
    /// The transaction is committed when the closure returns `Ok` and rolled
    /// back when it returns `Err`.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut dyn PollStore) -> VoteboxResult<T>,
    ) -> VoteboxResult<T> {
        let mut guard = self.0.write();
        guard.begin()?;
        match f(&mut *guard) {
            Ok(value) => {
                guard.commit()?;
                Ok(value)
            }
            Err(e) => {
                guard.rollback()?;
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle").finish_non_exhaustive()
    }
}
