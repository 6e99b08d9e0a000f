//! History budgeting: trims a conversation to a token ceiling.
//!
//! Messages are visited newest-first and kept whole while they fit. Text
//! that does not fit is cut to exactly the tokens still available, decoded
//! back to text, and spends the rest of the budget. An image that does not
//! fit is dropped whole and ends its own message; older messages are still
//! visited while budget remains.
//!
//! Parts of a multi-part message are visited newest-first too, and a message
//! left with no parts is omitted.

use memochat_core::message::{Content, ContentPart, Message};
use tracing::debug;

use crate::tokens::TokenCounter;

/// Trims conversation history newest-first to fit a token ceiling.
#[derive(Clone)]
pub struct HistoryBudgeter {
    counter: TokenCounter,
}

/// What happened to one piece of text at the budget check.
enum TextFit {
    Whole,
    Truncated(String),
    Dropped,
}

impl HistoryBudgeter {
    pub fn new(counter: TokenCounter) -> Self {
        Self { counter }
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// Keep the newest content of `messages` that fits in `max_tokens`.
    ///
    /// The retained messages and parts keep their original relative order,
    /// and their summed cost never exceeds `max_tokens`.
    pub fn reduce(&self, messages: &[Message], max_tokens: usize) -> Vec<Message> {
        let mut remaining = max_tokens;
        let mut kept = Vec::new();

        for message in messages.iter().rev() {
            if remaining == 0 {
                break;
            }

            let content = match &message.content {
                Content::Text(text) => match self.fit_text(text, &mut remaining) {
                    TextFit::Whole => Some(message.content.clone()),
                    TextFit::Truncated(partial) => Some(Content::Text(partial)),
                    TextFit::Dropped => None,
                },
                Content::Parts(parts) => {
                    let parts = self.fit_parts(parts, &mut remaining);
                    (!parts.is_empty()).then_some(Content::Parts(parts))
                }
            };

            if let Some(content) = content {
                kept.push(Message {
                    role: message.role,
                    content,
                });
            }
        }

        kept.reverse();

        debug!(
            input_messages = messages.len(),
            kept_messages = kept.len(),
            tokens_used = max_tokens - remaining,
            max_tokens,
            "History reduced"
        );
        kept
    }

    /// Visit `parts` newest-first and return the retained parts in original
    /// order. Stops at the first part that does not fit whole.
    fn fit_parts(&self, parts: &[ContentPart], remaining: &mut usize) -> Vec<ContentPart> {
        let mut kept = Vec::new();

        for part in parts.iter().rev() {
            match part {
                ContentPart::Text { text } => match self.fit_text(text, remaining) {
                    TextFit::Whole => kept.push(part.clone()),
                    TextFit::Truncated(partial) => {
                        kept.push(ContentPart::Text { text: partial });
                        break;
                    }
                    TextFit::Dropped => break,
                },
                ContentPart::ImageUrl { .. } => {
                    let weight = self.counter.image_weight();
                    if weight <= *remaining {
                        kept.push(part.clone());
                        *remaining -= weight;
                    } else {
                        // images are never cut
                        break;
                    }
                }
            }
        }

        kept.reverse();
        kept
    }

    fn fit_text(&self, text: &str, remaining: &mut usize) -> TextFit {
        let tokenizer = self.counter.tokenizer();
        let tokens = tokenizer.encode(text);

        if tokens.len() <= *remaining {
            *remaining -= tokens.len();
            return TextFit::Whole;
        }
        if *remaining == 0 {
            return TextFit::Dropped;
        }

        let available = *remaining;
        let partial = tokenizer.decode(&tokens[..available]);
        *remaining = 0;
        debug!(
            tokens_available = available,
            tokens_in_text = tokens.len(),
            "Partial tokens added"
        );

        if partial.is_empty() {
            TextFit::Dropped
        } else {
            TextFit::Truncated(partial)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::CharTokenizer;
    use memochat_core::message::Role;
    use std::sync::Arc;

    const IMAGE: usize = 10;

    fn budgeter() -> HistoryBudgeter {
        HistoryBudgeter::new(TokenCounter::new(Arc::new(CharTokenizer), IMAGE))
    }

    fn texts(messages: &[Message]) -> Vec<String> {
        messages.iter().map(|m| m.content.as_text()).collect()
    }

    fn conversation() -> Vec<Message> {
        vec![
            Message::user("aaaa"),
            Message::assistant("bbbb"),
            Message::user("cc"),
        ]
    }

    #[test]
    fn everything_fits() {
        let input = conversation();
        assert_eq!(budgeter().reduce(&input, 100), input);
        assert_eq!(budgeter().reduce(&input, 10), input);
    }

    #[test]
    fn zero_budget_is_empty() {
        assert!(budgeter().reduce(&conversation(), 0).is_empty());
        assert!(budgeter().reduce(&[], 50).is_empty());
    }

    #[test]
    fn oldest_message_is_truncated_first() {
        let out = budgeter().reduce(&conversation(), 7);
        assert_eq!(texts(&out), vec!["a", "bbbb", "cc"]);
        assert_eq!(out[0].role, Role::User);
    }

    #[test]
    fn older_messages_are_dropped_after_boundary() {
        let out = budgeter().reduce(&conversation(), 5);
        assert_eq!(texts(&out), vec!["bbb", "cc"]);
        assert_eq!(out[0].role, Role::Assistant);
    }

    #[test]
    fn exact_fit_drops_older_messages_whole() {
        let out = budgeter().reduce(&conversation(), 6);
        assert_eq!(texts(&out), vec!["bbbb", "cc"]);
    }

    #[test]
    fn image_is_kept_whole_and_text_before_it_truncated() {
        let input = vec![Message::user(vec![
            ContentPart::text("hello"),
            ContentPart::image("https://img/1.png"),
        ])];
        let out = budgeter().reduce(&input, IMAGE + 2);
        assert_eq!(
            out,
            vec![Message::user(vec![
                ContentPart::text("he"),
                ContentPart::image("https://img/1.png"),
            ])]
        );
    }

    #[test]
    fn image_that_does_not_fit_is_never_partial() {
        let input = vec![
            Message::user("older"),
            Message::user(vec![
                ContentPart::text("caption"),
                ContentPart::image("https://img/2.png"),
            ]),
        ];
        // the image is the newest part; without room for it the message keeps
        // no parts, but the budget is untouched for older messages
        let out = budgeter().reduce(&input, IMAGE - 1);
        assert_eq!(out, vec![Message::user("older")]);
    }

    #[test]
    fn dropped_image_does_not_stop_the_walk() {
        let b = HistoryBudgeter::new(TokenCounter::new(Arc::new(CharTokenizer), 800));
        let input = vec![
            Message::user("hi"),
            Message::user(vec![ContentPart::image("https://img/big.png")]),
        ];
        assert_eq!(b.reduce(&input, 100), vec![Message::user("hi")]);
    }

    #[test]
    fn older_text_is_truncated_after_a_dropped_image() {
        let input = vec![
            Message::assistant("0123456789"),
            Message::user(vec![ContentPart::text("look"), ContentPart::image("u")]),
            Message::user("ok?"),
        ];
        // "ok?" 3, image 10 > 4 ends its message, then 4 chars of the answer
        let out = budgeter().reduce(&input, 7);
        assert_eq!(
            out,
            vec![Message::assistant("0123"), Message::user("ok?")]
        );
    }

    #[test]
    fn text_after_image_survives_when_image_does_not() {
        let input = vec![Message::user(vec![
            ContentPart::image("https://img/3.png"),
            ContentPart::text("what is this?"),
        ])];
        let out = budgeter().reduce(&input, 15);
        assert_eq!(out, vec![Message::user(vec![ContentPart::text("what is this?")])]);
    }

    #[test]
    fn empty_parts_message_is_omitted() {
        let input = vec![Message::user("keep"), Message::user(Vec::<ContentPart>::new())];
        let out = budgeter().reduce(&input, 50);
        assert_eq!(texts(&out), vec!["keep"]);
    }

    #[test]
    fn budget_sweep_keeps_ordering_properties() {
        let input = vec![
            Message::system("system preamble"),
            Message::user(vec![ContentPart::text("first question"), ContentPart::image("u1")]),
            Message::assistant("a fairly long first answer"),
            Message::user(vec![
                ContentPart::image("u2"),
                ContentPart::text("second"),
                ContentPart::image("u3"),
            ]),
            Message::assistant("ok"),
            Message::user("last"),
        ];
        let b = budgeter();
        let total = b.counter().count_total_tokens(&input);
        let mut previous = 0;

        for max in 0..=total + 5 {
            let out = b.reduce(&input, max);
            let used = b.counter().count_total_tokens(&out);
            assert!(used <= max, "max {max}: used {used}");
            assert!(used >= previous, "max {max}: used {used} after {previous}");
            previous = used;

            // retained roles appear in input order
            let mut roles = input.iter().map(|m| m.role);
            for message in &out {
                assert!(roles.any(|r| r == message.role), "max {max}");
            }

            // removing the oldest message leaves the rest of the output alone
            let without_oldest = b.reduce(&input[1..], max);
            assert!(out.ends_with(&without_oldest), "max {max}");
            assert!(out.len() - without_oldest.len() <= 1, "max {max}");
        }
        assert_eq!(b.reduce(&input, total), input);

        // "last" and "ok" leave 9, too little for u3, so the whole third-from-
        // newest message goes and the long answer takes the rest
        assert_eq!(
            b.reduce(&input, 15),
            vec![
                Message::assistant("a fairly "),
                Message::assistant("ok"),
                Message::user("last"),
            ]
        );
    }
}
