/* 📖 # How is a vote request validated?

A vote names option ids to choose and option ids to unchoose. The body is
first normalized into two sets of raw values, whatever the encoding:

- form fields `choose` and `unchoose`, each repeated once per id;
- a JSON array where positive ids are chosen and negative ids unchosen;
- a JSON object with optional `choose` and `unchoose` arrays.

The sets are then checked in a fixed order and the first failing check is
reported: overlap between the two sets, a zero, a value that is not an
integer, a negative value, and finally an id that names no option. Only the
last check needs the store, so it runs inside the same transaction that
applies the vote.

A JSON array rejects zero while it is being read, and a malformed form value
or array element ends parsing at once with `invalid_format`.

Integers too large for an option id are still integers. They pass the first
four checks and fail the last one, since no option carries such an id.
*/

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use votebox_base::VoteboxResult;

use crate::choice::{ChooseResult, choose, unchoose};
use crate::model::{OptionId, UserId};
use crate::request::RequestBody;
use crate::store::{PollStore, StoreHandle};

/// Why a vote payload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteError {
    InvalidFormat,
    ZeroValue,
    NegativeValue,
    InvalidValue,
    NonEmptyIntersection,
}

impl VoteError {
    /// The text sent to the client.
    pub fn code(self) -> &'static str {
        match self {
            VoteError::InvalidFormat => "invalid_format",
            VoteError::ZeroValue => "has_zero_values",
            VoteError::NegativeValue => "has_negative_values",
            VoteError::InvalidValue => "has_invalid_values",
            VoteError::NonEmptyIntersection => "nonempty_intersection",
        }
    }
}

impl std::fmt::Display for VoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::error::Error for VoteError {}

/// A raw element of a `choose` or `unchoose` list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum VoteValue {
    Int(i128),
    Other(String),
}

impl VoteValue {
    fn from_json(value: &Value) -> Self {
        match json_integer(value) {
            Some(n) => VoteValue::Int(n),
            None => VoteValue::Other(value.to_string()),
        }
    }
}

/// Smallest magnitude serde_json reads as a float rather than an `i64`.
const FLOAT_INTEGER_MIN: f64 = 9_223_372_036_854_775_808.0;

/// The integer a JSON number stands for.
///
/// Integer literals beyond 64 bits arrive as floats; they are kept as
/// integers, saturating at the `i128` bounds. A float zero is zero. Any other
/// float is not an integer.
fn json_integer(value: &Value) -> Option<i128> {
    if let Some(n) = value.as_i64() {
        return Some(n.into());
    }
    if let Some(n) = value.as_u64() {
        return Some(n.into());
    }
    let x = value.as_f64()?;
    if x == 0.0 {
        Some(0)
    } else if x.fract() == 0.0 && x.abs() >= FLOAT_INTEGER_MIN {
        Some(x as i128)
    } else {
        None
    }
}

/// A form value as an integer: optional sign, then ASCII digits.
/// Out-of-range values saturate at the `i128` bounds.
fn form_integer(text: &str) -> Option<i128> {
    let text = text.trim();
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(text.parse::<i128>().unwrap_or(if text.starts_with('-') {
        i128::MIN
    } else {
        i128::MAX
    }))
}

/// A validated vote: the option ids to choose and to unchoose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteRequest {
    pub choose: BTreeSet<OptionId>,
    pub unchoose: BTreeSet<OptionId>,
    /// Some value was a positive integer too large to be an option id.
    out_of_range: bool,
}

impl VoteRequest {
    /// Normalize and check a vote body without looking at the store.
    ///
    /// ```
    /// use votebox_engine::request::RequestBody;
    /// use votebox_engine::vote::{VoteError, VoteRequest};
    ///
    /// let body = RequestBody::Json(serde_json::json!([1, -2]));
    /// let vote = VoteRequest::parse(&body).unwrap();
    /// assert_eq!(vote.choose.len(), 1);
    /// assert_eq!(vote.unchoose.len(), 1);
    ///
    /// let body = RequestBody::Json(serde_json::json!({"choose": [1, 2], "unchoose": [2]}));
    /// assert_eq!(VoteRequest::parse(&body), Err(VoteError::NonEmptyIntersection));
    /// ```
    pub fn parse(body: &RequestBody) -> Result<Self, VoteError> {
        let (choose, unchoose) = collect_values(body)?;

        if choose.intersection(&unchoose).next().is_some() {
            return Err(VoteError::NonEmptyIntersection);
        }
        let all = || choose.iter().chain(unchoose.iter());
        if all().any(|value| *value == VoteValue::Int(0)) {
            return Err(VoteError::ZeroValue);
        }
        if all().any(|value| matches!(value, VoteValue::Other(_))) {
            return Err(VoteError::InvalidFormat);
        }
        if all().any(|value| matches!(value, VoteValue::Int(n) if *n < 0)) {
            return Err(VoteError::NegativeValue);
        }

        let out_of_range = all().any(|value| match value {
            VoteValue::Int(n) => u64::try_from(*n).is_err(),
            VoteValue::Other(_) => false,
        });
        Ok(VoteRequest {
            choose: to_option_ids(&choose),
            unchoose: to_option_ids(&unchoose),
            out_of_range,
        })
    }

    /// Check that every referenced id is one of `valid`.
    pub fn validate_against(&self, valid: &BTreeSet<OptionId>) -> Result<(), VoteError> {
        let known = self
            .choose
            .iter()
            .chain(self.unchoose.iter())
            .all(|id| valid.contains(id));
        if known && !self.out_of_range {
            Ok(())
        } else {
            Err(VoteError::InvalidValue)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.choose.is_empty() && self.unchoose.is_empty() && !self.out_of_range
    }
}

type ValueSets = (BTreeSet<VoteValue>, BTreeSet<VoteValue>);

fn collect_values(body: &RequestBody) -> Result<ValueSets, VoteError> {
    let mut choose = BTreeSet::new();
    let mut unchoose = BTreeSet::new();
    match body {
        RequestBody::Empty => {}
        RequestBody::Form(form) => {
            for (field, target) in [("choose", &mut choose), ("unchoose", &mut unchoose)] {
                for value in form.get_all(field) {
                    let n = form_integer(value).ok_or(VoteError::InvalidFormat)?;
                    target.insert(VoteValue::Int(n));
                }
            }
        }
        RequestBody::Json(Value::Array(items)) => {
            for item in items {
                let n = json_integer(item).ok_or(VoteError::InvalidFormat)?;
                if n == 0 {
                    return Err(VoteError::ZeroValue);
                }
                if n > 0 {
                    choose.insert(VoteValue::Int(n));
                } else {
                    unchoose.insert(VoteValue::Int(n.saturating_neg()));
                }
            }
        }
        RequestBody::Json(Value::Object(map)) => {
            for (field, target) in [("choose", &mut choose), ("unchoose", &mut unchoose)] {
                match map.get(field) {
                    None => {}
                    Some(Value::Array(items)) => {
                        target.extend(items.iter().map(VoteValue::from_json));
                    }
                    Some(_) => return Err(VoteError::InvalidFormat),
                }
            }
        }
        RequestBody::Json(_) => return Err(VoteError::InvalidFormat),
    }
    Ok((choose, unchoose))
}

fn to_option_ids(values: &BTreeSet<VoteValue>) -> BTreeSet<OptionId> {
    values
        .iter()
        .filter_map(|value| match value {
            VoteValue::Int(n) => u64::try_from(*n).ok().map(OptionId::new),
            VoteValue::Other(_) => None,
        })
        .collect()
}

/// What applying a vote did, counted per option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteSummary {
    pub changed: usize,
    pub unchanged: usize,
    pub disabled: usize,
}

impl VoteSummary {
    fn record(&mut self, result: ChooseResult) {
        match result {
            ChooseResult::Changed => self.changed += 1,
            ChooseResult::Unchanged => self.unchanged += 1,
            ChooseResult::Disabled => self.disabled += 1,
        }
    }
}

/// Check the vote against the stored options and apply it.
///
/// Ids are chosen in ascending order, then unchosen in ascending order.
/// Options of locked questions are skipped without failing the vote.
pub fn apply_vote(
    store: &mut dyn PollStore,
    user: UserId,
    vote: &VoteRequest,
) -> VoteboxResult<Result<VoteSummary, VoteError>> {
    if let Err(error) = vote.validate_against(&store.option_ids()?) {
        return Ok(Err(error));
    }
    let mut summary = VoteSummary::default();
    for option in &vote.choose {
        summary.record(choose(store, user, *option)?);
    }
    for option in &vote.unchoose {
        summary.record(unchoose(store, user, *option)?);
    }
    debug!(
        user = %user,
        changed = summary.changed,
        unchanged = summary.unchanged,
        disabled = summary.disabled,
        "applied vote"
    );
    Ok(Ok(summary))
}

impl StoreHandle {
    /// [`apply_vote`] as one transaction.
    pub fn vote(
        &self,
        user: UserId,
        vote: &VoteRequest,
    ) -> VoteboxResult<Result<VoteSummary, VoteError>> {
        self.transaction(|store| apply_vote(store, user, vote))
    }
}
