/* 📖 # How does choose keep single-vote questions exclusive?

choose first makes sure the (user, option) choice exists and only then, if
the question is not multivote, deletes the user's choices on the sibling
options. The sibling scan skips the option that was just chosen, so the new
choice survives. Running both steps under one store transaction means two
concurrent choose calls on the same question cannot both leave a choice
behind.

A locked question short-circuits both operations before anything is looked
up or written.
*/

use votebox_base::{VoteboxError, VoteboxResult};

use crate::model::{OptionId, Question, UserId};
use crate::store::{PollStore, StoreHandle};
use tracing::debug;

/// Outcome of [`choose`] and [`unchoose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChooseResult {
    /// The requested state was reached by changing the store.
    Changed,
    /// The store was already in the requested state.
    Unchanged,
    /// The option's question is locked.
    Disabled,
}

fn question_of(store: &dyn PollStore, option: OptionId) -> VoteboxResult<Question> {
    let option = store
        .option(option)?
        .ok_or_else(|| Box::new(VoteboxError::not_found(format!("Option {}", option))))?;
    store.question(option.question)?.ok_or_else(|| {
        Box::new(VoteboxError::not_found(format!(
            "Question {}",
            option.question
        )))
    })
}

/// Select `option` for `user`.
///
/// For a question without multivote this also removes the user's choices on
/// the other options of the same question.
pub fn choose(store: &mut dyn PollStore, user: UserId, option: OptionId) -> VoteboxResult<ChooseResult> {
    let question = question_of(store, option)?;
    if question.locked {
        debug!(user = %user, option = %option, "question locked, choose disabled");
        return Ok(ChooseResult::Disabled);
    }
    if store.find_choice(user, option)?.is_some() {
        return Ok(ChooseResult::Unchanged);
    }
    store.insert_choice(user, option)?;
    debug!(user = %user, option = %option, "chose option");

    if !question.multivote {
        for sibling in store.options_of(question.id)? {
            if sibling.id == option {
                continue;
            }
            if let Some(choice) = store.find_choice(user, sibling.id)? {
                store.delete_choice(choice.id)?;
                debug!(user = %user, option = %sibling.id, "pruned sibling choice");
            }
        }
    }
    Ok(ChooseResult::Changed)
}

/// Remove the choice of `option` by `user`.
pub fn unchoose(store: &mut dyn PollStore, user: UserId, option: OptionId) -> VoteboxResult<ChooseResult> {
    let question = question_of(store, option)?;
    if question.locked {
        debug!(user = %user, option = %option, "question locked, unchoose disabled");
        return Ok(ChooseResult::Disabled);
    }
    match store.find_choice(user, option)? {
        Some(choice) => {
            store.delete_choice(choice.id)?;
            debug!(user = %user, option = %option, "unchose option");
            Ok(ChooseResult::Changed)
        }
        None => Ok(ChooseResult::Unchanged),
    }
}

impl StoreHandle {
    /// [`choose`] as its own transaction.
    pub fn choose(&self, user: UserId, option: OptionId) -> VoteboxResult<ChooseResult> {
        self.transaction(|store| choose(store, user, option))
    }

    /// [`unchoose`] as its own transaction.
    pub fn unchoose(&self, user: UserId, option: OptionId) -> VoteboxResult<ChooseResult> {
        self.transaction(|store| unchoose(store, user, option))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordHash;
    use crate::model::{NewAccount, NewQuestion};
    use crate::store::InMemoryStore;

    struct Fixture {
        store: StoreHandle,
        user: UserId,
        vim: OptionId,
        atom: OptionId,
        linux: OptionId,
        windows: OptionId,
        mac: OptionId,
    }

    fn fixture() -> Fixture {
        let mut store = InMemoryStore::new();
        let editor = store
            .insert_question(
                NewQuestion::new("Which editors do you use?")
                    .with_title("Text Editor")
                    .with_multivote(true),
            )
            .unwrap();
        let vim = store.insert_option(editor, "Vim").unwrap();
        let atom = store.insert_option(editor, "Atom").unwrap();
        let os = store
            .insert_question(NewQuestion::new("Which OS do you use?").with_title("Operating System"))
            .unwrap();
        let linux = store.insert_option(os, "Linux").unwrap();
        let windows = store.insert_option(os, "Windows").unwrap();
        let mac = store.insert_option(os, "Mac").unwrap();
        let user = store
            .insert_account(NewAccount {
                username: "user1".to_string(),
                password: PasswordHash::with_salt("salt", "secret"),
                is_active: true,
            })
            .unwrap();
        Fixture {
            store: StoreHandle::new(store),
            user,
            vim,
            atom,
            linux,
            windows,
            mac,
        }
    }

    fn chosen(f: &Fixture) -> Vec<OptionId> {
        f.store
            .read(|store| store.choices_of_user(f.user))
            .unwrap()
            .into_iter()
            .map(|choice| choice.option)
            .collect()
    }

    #[test]
    fn test_choose_is_idempotent() {
        let f = fixture();
        assert_eq!(f.store.choose(f.user, f.linux).unwrap(), ChooseResult::Changed);
        assert_eq!(f.store.choose(f.user, f.linux).unwrap(), ChooseResult::Unchanged);
        assert_eq!(chosen(&f), vec![f.linux]);
    }

    #[test]
    fn test_single_vote_replaces_previous_choice() {
        let f = fixture();
        f.store.choose(f.user, f.linux).unwrap();
        f.store.choose(f.user, f.windows).unwrap();
        assert_eq!(chosen(&f), vec![f.windows]);

        f.store.choose(f.user, f.mac).unwrap();
        assert_eq!(chosen(&f), vec![f.mac]);
    }

    #[test]
    fn test_multivote_keeps_all_choices() {
        let f = fixture();
        f.store.choose(f.user, f.vim).unwrap();
        f.store.choose(f.user, f.atom).unwrap();
        f.store.choose(f.user, f.linux).unwrap();
        assert_eq!(chosen(&f), vec![f.vim, f.atom, f.linux]);
    }

    #[test]
    fn test_single_vote_prune_leaves_other_questions_alone() {
        let f = fixture();
        f.store.choose(f.user, f.vim).unwrap();
        f.store.choose(f.user, f.linux).unwrap();
        f.store.choose(f.user, f.mac).unwrap();
        assert_eq!(chosen(&f), vec![f.vim, f.mac]);
    }

    #[test]
    fn test_unchoose() {
        let f = fixture();
        assert_eq!(f.store.unchoose(f.user, f.vim).unwrap(), ChooseResult::Unchanged);
        f.store.choose(f.user, f.vim).unwrap();
        assert_eq!(f.store.unchoose(f.user, f.vim).unwrap(), ChooseResult::Changed);
        assert_eq!(f.store.unchoose(f.user, f.vim).unwrap(), ChooseResult::Unchanged);
        assert!(chosen(&f).is_empty());
    }

    #[test]
    fn test_locked_question_is_disabled() {
        let f = fixture();
        f.store.choose(f.user, f.linux).unwrap();
        let os = f
            .store
            .read(|store| store.option(f.linux))
            .unwrap()
            .unwrap()
            .question;
        f.store.transaction(|store| store.set_locked(os, true)).unwrap();

        assert_eq!(f.store.choose(f.user, f.windows).unwrap(), ChooseResult::Disabled);
        assert_eq!(f.store.choose(f.user, f.linux).unwrap(), ChooseResult::Disabled);
        assert_eq!(f.store.unchoose(f.user, f.linux).unwrap(), ChooseResult::Disabled);
        assert_eq!(chosen(&f), vec![f.linux]);
    }

    #[test]
    fn test_unknown_option_is_not_found() {
        let f = fixture();
        let err = f.store.choose(f.user, OptionId::new(99)).unwrap_err();
        assert_eq!(err.to_string(), "Option 99 not found");
        let err = f.store.unchoose(f.user, OptionId::new(99)).unwrap_err();
        assert_eq!(err.to_string(), "Option 99 not found");
    }

    #[test]
    fn test_concurrent_duplicate_choose_keeps_one_row() {
        let f = fixture();
        let mut results: Vec<ChooseResult> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let store = f.store.clone();
                    scope.spawn(move || store.choose(f.user, f.vim).unwrap())
                })
                .collect();
            workers.into_iter().map(|worker| worker.join().unwrap()).collect()
        });

        results.sort_by_key(|result| *result != ChooseResult::Changed);
        assert_eq!(results[0], ChooseResult::Changed, "{results:?}");
        assert!(
            results[1..]
                .iter()
                .all(|result| *result == ChooseResult::Unchanged),
            "{results:?}"
        );
        assert_eq!(chosen(&f), vec![f.vim]);
    }

    #[test]
    fn test_concurrent_single_vote_choose_keeps_one_row() {
        let f = fixture();
        let options = [f.linux, f.windows, f.mac];
        std::thread::scope(|scope| {
            for round in 0..4 {
                for option in options {
                    let store = f.store.clone();
                    let user = f.user;
                    scope.spawn(move || {
                        assert_ne!(
                            store.choose(user, option).unwrap(),
                            ChooseResult::Disabled,
                            "round {round}"
                        );
                    });
                }
            }
        });

        let chosen = chosen(&f);
        assert_eq!(chosen.len(), 1, "{chosen:?}");
        assert!(options.contains(&chosen[0]));
    }
}
