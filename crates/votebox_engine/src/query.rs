//! Read-only projections of the store, shaped the way the API returns them.

use std::collections::BTreeMap;

use serde::Serialize;

use votebox_base::VoteboxResult;

use crate::model::{OptionId, Question, QuestionId, UserId};
use crate::store::PollStore;

/// A question with the texts of its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub title: String,
    pub text: String,
    pub multivote: bool,
    pub locked: bool,
    pub show_count: bool,
    pub options: Vec<String>,
}

/// A question without its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSummary {
    pub title: String,
    pub text: String,
    pub multivote: bool,
    pub locked: bool,
    pub show_count: bool,
}

impl From<&Question> for QuestionSummary {
    fn from(question: &Question) -> Self {
        Self {
            title: question.title.clone(),
            text: question.text.clone(),
            multivote: question.multivote,
            locked: question.locked,
            show_count: question.show_count,
        }
    }
}

/// An option with its vote count, if the question publishes counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub question: QuestionId,
    pub text: String,
    pub count: Option<usize>,
}

/// Every question with its option texts, ordered by id.
pub fn all_questions(store: &dyn PollStore) -> VoteboxResult<Vec<QuestionView>> {
    store
        .questions()?
        .into_iter()
        .map(|question| -> VoteboxResult<QuestionView> {
            let options = store
                .options_of(question.id)?
                .into_iter()
                .map(|option| option.text)
                .collect();
            Ok(QuestionView {
                title: question.title,
                text: question.text,
                multivote: question.multivote,
                locked: question.locked,
                show_count: question.show_count,
                options,
            })
        })
        .collect()
}

pub fn question_summaries(
    store: &dyn PollStore,
) -> VoteboxResult<BTreeMap<QuestionId, QuestionSummary>> {
    Ok(store
        .questions()?
        .iter()
        .map(|question| (question.id, QuestionSummary::from(question)))
        .collect())
}

/// Every option keyed by id. `count` is `None` when the owning question
/// hides its counts.
pub fn option_views(store: &dyn PollStore) -> VoteboxResult<BTreeMap<OptionId, OptionView>> {
    let show_count: BTreeMap<QuestionId, bool> = store
        .questions()?
        .iter()
        .map(|question| (question.id, question.show_count))
        .collect();
    let mut views = BTreeMap::new();
    for option in store.options()? {
        let count = if show_count.get(&option.question).copied().unwrap_or(false) {
            Some(store.vote_count(option.id)?)
        } else {
            None
        };
        views.insert(
            option.id,
            OptionView {
                question: option.question,
                text: option.text,
                count,
            },
        );
    }
    Ok(views)
}

/// Ids of the options chosen by `user`, ascending.
pub fn my_choices(store: &dyn PollStore, user: UserId) -> VoteboxResult<Vec<OptionId>> {
    let mut ids: Vec<OptionId> = store
        .choices_of_user(user)?
        .into_iter()
        .map(|choice| choice.option)
        .collect();
    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordHash;
    use crate::choice::choose;
    use crate::model::{NewAccount, NewQuestion};
    use crate::store::InMemoryStore;
    use expect_test::expect;

    fn store() -> (InMemoryStore, UserId) {
        let mut store = InMemoryStore::new();
        let editor = store
            .insert_question(
                NewQuestion::new("Which editors do you use?")
                    .with_title("Text Editor")
                    .with_multivote(true),
            )
            .unwrap();
        for text in ["Vim", "Atom"] {
            store.insert_option(editor, text).unwrap();
        }
        let secret = store
            .insert_question(NewQuestion::new("Tabs or spaces?").with_show_count(false))
            .unwrap();
        store.insert_option(secret, "Tabs").unwrap();
        let user = store
            .insert_account(NewAccount {
                username: "user1".to_string(),
                password: PasswordHash::with_salt("salt", "secret"),
                is_active: true,
            })
            .unwrap();
        (store, user)
    }

    #[test]
    fn test_all_questions() {
        let (store, _) = store();
        let json = serde_json::to_string_pretty(&all_questions(&store).unwrap()).unwrap();
        expect![[r#"
            [
              {
                "title": "Text Editor",
                "text": "Which editors do you use?",
                "multivote": true,
                "locked": false,
                "show_count": true,
                "options": [
                  "Vim",
                  "Atom"
                ]
              },
              {
                "title": "",
                "text": "Tabs or spaces?",
                "multivote": false,
                "locked": false,
                "show_count": false,
                "options": [
                  "Tabs"
                ]
              }
            ]"#]]
        .assert_eq(&json);
    }

    #[test]
    fn test_question_summaries() {
        let (store, _) = store();
        let json = serde_json::to_string(&question_summaries(&store).unwrap()).unwrap();
        expect![[r#"{"1":{"title":"Text Editor","text":"Which editors do you use?","multivote":true,"locked":false,"show_count":true},"2":{"title":"","text":"Tabs or spaces?","multivote":false,"locked":false,"show_count":false}}"#]]
        .assert_eq(&json);
    }

    #[test]
    fn test_option_views_hide_counts() {
        let (mut store, user) = store();
        choose(&mut store, user, OptionId::new(1)).unwrap();
        choose(&mut store, user, OptionId::new(3)).unwrap();

        let json = serde_json::to_string(&option_views(&store).unwrap()).unwrap();
        expect![[r#"{"1":{"question":1,"text":"Vim","count":1},"2":{"question":1,"text":"Atom","count":0},"3":{"question":2,"text":"Tabs","count":null}}"#]]
        .assert_eq(&json);
    }

    #[test]
    fn test_my_choices_sorted() {
        let (mut store, user) = store();
        assert!(my_choices(&store, user).unwrap().is_empty());
        for id in [3, 1, 2] {
            choose(&mut store, user, OptionId::new(id)).unwrap();
        }
        assert_eq!(
            my_choices(&store, user).unwrap(),
            vec![OptionId::new(1), OptionId::new(2), OptionId::new(3)]
        );
    }
}
