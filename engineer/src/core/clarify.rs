//! Decision rules for the clarification dialogue.

/// Reply the `qa` preprompt asks the model to give once nothing is unclear.
pub const NOTHING_MORE_TO_CLARIFY: &str = "Nothing more to clarify.";

/// Why the model's latest reply ended the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClarifyEnd {
    /// The reply is exactly the agreed sentinel.
    Sentinel,
    /// The reply opens with "no" in any casing.
    Declined,
}

/// Returns `Some` when the assistant reply means there is nothing left to ask.
///
/// Note that any reply starting with "no" counts, including "Not sure...".
pub fn clarification_end(reply: &str) -> Option<ClarifyEnd> {
    let reply = reply.trim();
    if reply == NOTHING_MORE_TO_CLARIFY {
        return Some(ClarifyEnd::Sentinel);
    }
    let opens_with_no = reply
        .get(..2)
        .is_some_and(|head| head.eq_ignore_ascii_case("no"));
    opens_with_no.then_some(ClarifyEnd::Declined)
}

/// What the operator typed in response to a clarifying question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorAnswer<'a> {
    /// Empty input or `c`: let the model assume the rest.
    MoveOn,
    Answer(&'a str),
}

pub fn classify_answer(input: &str) -> OperatorAnswer<'_> {
    if input.is_empty() || input == "c" {
        OperatorAnswer::MoveOn
    } else {
        OperatorAnswer::Answer(input)
    }
}
