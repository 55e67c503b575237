use serde::{Deserialize, Serialize};

use crate::auth::PasswordHash;

/// Maximum length of a question title, in characters.
pub const MAX_TITLE_LEN: usize = 30;
/// Maximum length of an option text, in characters.
pub const MAX_OPTION_TEXT_LEN: usize = 100;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`Question`].
    QuestionId
);
entity_id!(
    /// Identifier of a [`PollOption`].
    OptionId
);
entity_id!(
    /// Identifier of a [`Choice`].
    ChoiceId
);
entity_id!(
    /// Identifier of an [`Account`].
    UserId
);

/// A poll prompt together with its voting rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub text: String,
    /// Users may hold choices on several options of this question at once.
    pub multivote: bool,
    /// Choices on this question can neither be added nor removed.
    pub locked: bool,
    /// Vote counts of this question's options are published.
    pub show_count: bool,
}

impl Question {
    /// The title, or the question text when there is no title.
    pub fn display_name(&self) -> &str {
        if self.title.is_empty() {
            &self.text
        } else {
            &self.title
        }
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Field values for creating a [`Question`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub title: String,
    pub text: String,
    pub multivote: bool,
    pub locked: bool,
    pub show_count: bool,
}

impl NewQuestion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            text: text.into(),
            multivote: false,
            locked: false,
            show_count: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_multivote(mut self, multivote: bool) -> Self {
        self.multivote = multivote;
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_show_count(mut self, show_count: bool) -> Self {
        self.show_count = show_count;
        self
    }
}

/// One selectable answer of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOption {
    pub id: OptionId,
    pub question: QuestionId,
    pub text: String,
}

impl std::fmt::Display for PollOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// A user's selection of one option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub id: ChoiceId,
    pub user: UserId,
    pub option: OptionId,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: UserId,
    pub username: String,
    pub password: PasswordHash,
    pub is_active: bool,
}

/// Field values for creating an [`Account`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub password: PasswordHash,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(title: &str, text: &str) -> Question {
        Question {
            id: QuestionId::new(1),
            title: title.to_string(),
            text: text.to_string(),
            multivote: false,
            locked: false,
            show_count: true,
        }
    }

    #[test]
    fn test_question_display_prefers_title() {
        assert_eq!(question("OS", "Favorite OS?").to_string(), "OS");
        assert_eq!(question("", "Favorite food?").to_string(), "Favorite food?");
        assert_eq!(question("", "मनपसंद फल?").display_name(), "मनपसंद फल?");
    }

    #[test]
    fn test_new_question_defaults() {
        let new = NewQuestion::new("Favorite OS?");
        assert_eq!(new.title, "");
        assert!(!new.multivote);
        assert!(!new.locked);
        assert!(new.show_count);

        let new = new
            .with_title("OS")
            .with_multivote(true)
            .with_locked(true)
            .with_show_count(false);
        assert_eq!(new.title, "OS");
        assert!(new.multivote && new.locked && !new.show_count);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&OptionId::new(7)).unwrap(), "7");
        assert_eq!(QuestionId::new(3).to_string(), "3");
        assert_eq!(UserId::new(5).get(), 5);
        assert!(ChoiceId::new(1) < ChoiceId::new(2));
    }
}
