//! Symbolic rendering of the messages exchanged at each step.
//!
//! No cryptography happens here: encryption, masking and shuffling are projected onto the plaintext
//! values of the trace, so that a viewer can see which parts of a message would be protected.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    permutation::Permutation,
    replay::{Chapter, ReplayState, Step},
    trace::Trace,
    Error,
};

/// The security layers that can be shown on top of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityOptions {
    /// AES-like encryption between data owners, Controller and Comp.
    pub aes: bool,
    /// Additively homomorphic (Paillier-like) encryption of the cumulative rewards.
    pub paillier: bool,
    /// Masking of the scores by the data owners.
    pub mask: bool,
    /// Shuffling of the per-arm vectors by the Controller.
    pub permutation: bool,
}

impl SecurityOptions {
    /// Every layer enabled.
    pub const fn all() -> Self {
        Self {
            aes: true,
            paillier: true,
            mask: true,
            permutation: true,
        }
    }

    /// Every layer disabled.
    pub const fn none() -> Self {
        Self {
            aes: false,
            paillier: false,
            mask: false,
            permutation: false,
        }
    }
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self::all()
    }
}

/// The role of a token inside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// The opening part of an encryption annotation, e.g. `AES(`.
    Open,
    /// A plaintext value.
    Value,
    /// The closing part of an encryption annotation.
    Close,
}

/// A piece of a rendered message, with the protections that apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The displayed text.
    pub text: String,
    /// Whether the token is an annotation or a value.
    pub kind: TokenKind,
    /// Part of an AES annotation.
    pub aes: bool,
    /// The value has been masked.
    pub mask: bool,
    /// Part of a Paillier annotation.
    pub paillier: bool,
    /// The value was moved by the Controller's permutation.
    pub permuted: bool,
}

impl Token {
    fn value(text: String) -> Token {
        Token {
            text,
            kind: TokenKind::Value,
            aes: false,
            mask: false,
            paillier: false,
            permuted: false,
        }
    }

    fn annotation(text: &str, kind: TokenKind) -> Token {
        Token {
            text: text.to_string(),
            kind,
            ..Token::value(String::new())
        }
    }
}

/// The symbolic content of one message on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    /// The tokens in display order.
    pub tokens: Vec<Token>,
}

impl EncryptedMessage {
    /// Returns `true` if no message is shown.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The plaintext values, without annotations.
    pub fn values(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Value)
            .map(|t| t.text.as_str())
            .collect()
    }

    fn push_aes(&mut self, value: Token, encrypted: bool) {
        if encrypted {
            let permuted = value.permuted;
            let wrap = |text, kind| Token {
                aes: true,
                permuted,
                ..Token::annotation(text, kind)
            };
            self.tokens.push(wrap("AES(", TokenKind::Open));
            self.tokens.push(value);
            self.tokens.push(wrap(")", TokenKind::Close));
        } else {
            self.tokens.push(value);
        }
    }

    fn push_paillier(&mut self, value: Token, encrypted: bool) {
        if encrypted {
            let wrap = |text, kind| Token {
                paillier: true,
                ..Token::annotation(text, kind)
            };
            self.tokens.push(wrap("Paillier(", TokenKind::Open));
            self.tokens.push(value);
            self.tokens.push(wrap(")", TokenKind::Close));
        } else {
            self.tokens.push(value);
        }
    }
}

impl fmt::Display for EncryptedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut previous: Option<TokenKind> = None;
        for token in &self.tokens {
            let separated = matches!(
                (previous, token.kind),
                (Some(TokenKind::Value | TokenKind::Close), TokenKind::Open | TokenKind::Value)
            );
            if separated {
                f.write_str(" ")?;
            }
            f.write_str(&token.text)?;
            previous = Some(token.kind);
        }
        Ok(())
    }
}

/// The multiplier applied to masked scores at a given turn.
pub fn mask(turn_index: usize) -> f64 {
    1.0 / ((turn_index % 3) + 1) as f64
}

/// The shuffle applied by the Controller at a given turn.
pub fn turn_permutation(arm_count: usize, turn_index: usize) -> Permutation {
    Permutation::from_seed(arm_count, turn_index as i64)
}

/// Renders the message sent at `step` as seen from the state `state`.
///
/// The message is empty if it has not been sent yet, if the replay is still in the warm-up, or if
/// the replay has moved on to the aggregation and `step` belongs to the main loop.
pub fn render_message(
    state: &ReplayState,
    trace: &Trace,
    step: Step,
    focused_arm: usize,
    secure: bool,
    options: SecurityOptions,
) -> Result<EncryptedMessage, Error> {
    if focused_arm >= trace.arm_count {
        return Err(Error::UnknownArm {
            arm: focused_arm,
            arm_count: trace.arm_count,
        });
    }
    let current_step = match state.step() {
        Some(current_step) => current_step,
        None => return Ok(EncryptedMessage::default()),
    };
    if current_step < step {
        return Ok(EncryptedMessage::default());
    }
    if state.chapter() == Chapter::CumulativeRewardComputation
        && step.chapter() == Chapter::CoreOfProtocol
    {
        return Ok(EncryptedMessage::default());
    }

    let turn_index = state.turn_index(trace).ok_or(Error::InvalidNavigation)?;
    let turn = trace
        .turn(turn_index)
        .ok_or(Error::MissingTurn { turn_index })?;
    let aes = secure && options.aes;
    let masked = secure && options.mask;
    let shuffled = secure && options.permutation;
    let paillier = secure && options.paillier;

    let mut message = EncryptedMessage::default();
    match step {
        Step::Step2 => {
            let mut score = turn.scores[focused_arm];
            if masked {
                score *= mask(turn_index);
            }
            let value = Token {
                mask: masked,
                ..Token::value(format!("{score:.2}"))
            };
            message.push_aes(value, aes);
        }
        Step::Step3 => {
            let permutation = turn_permutation(trace.arm_count, turn_index);
            let scores = if shuffled {
                permutation.apply(&turn.scores)?
            } else {
                turn.scores.clone()
            };
            for (index, score) in scores.into_iter().enumerate() {
                let score = if masked { score * mask(turn_index) } else { score };
                let value = Token {
                    mask: masked,
                    permuted: shuffled && permutation.moves(index),
                    ..Token::value(format!("{score:.2}"))
                };
                message.push_aes(value, aes);
            }
        }
        Step::Step4 => {
            let permutation = turn_permutation(trace.arm_count, turn_index);
            let bits: Vec<u8> = (0..trace.arm_count)
                .map(|arm| u8::from(arm == turn.selected_arm))
                .collect();
            let bits = if shuffled {
                permutation.apply(&bits)?
            } else {
                bits
            };
            for (index, bit) in bits.into_iter().enumerate() {
                let value = Token {
                    permuted: shuffled && permutation.moves(index),
                    ..Token::value(bit.to_string())
                };
                message.push_aes(value, aes);
            }
        }
        Step::Step5 => {
            let bit = u8::from(focused_arm == turn.selected_arm);
            message.push_aes(Token::value(bit.to_string()), aes);
        }
        Step::Step6 => {
            let reward = state.display().rewards[focused_arm];
            message.push_paillier(Token::value(format_grouped(reward)), paillier);
        }
        Step::Step7 => {
            let total = state.display().total_reward();
            message.push_paillier(Token::value(format_grouped(total)), paillier);
        }
    }
    Ok(message)
}

/// Formats a number with thousands separators and at most three fraction digits, e.g. `12,345.5`.
pub fn format_grouped(value: f64) -> String {
    let rounded = format!("{:.3}", value.abs());
    let (integer, fraction) = rounded
        .split_once('.')
        .unwrap_or((rounded.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut out = String::with_capacity(rounded.len() + integer.len() / 3 + 1);
    if value < 0.0 && (integer != "0" || !fraction.is_empty()) {
        out.push('-');
    }
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

#[test]
fn test_format_grouped() {
    assert_eq!(format_grouped(0.0), "0");
    assert_eq!(format_grouped(42.0), "42");
    assert_eq!(format_grouped(1234.0), "1,234");
    assert_eq!(format_grouped(1234567.0), "1,234,567");
    assert_eq!(format_grouped(12.5), "12.5");
    assert_eq!(format_grouped(-1000.25), "-1,000.25");
    assert_eq!(format_grouped(-0.0001), "0");
}

#[test]
fn test_mask() {
    assert_eq!(mask(3), 1.0);
    assert_eq!(mask(4), 0.5);
    assert_eq!(mask(5), 1.0 / 3.0);
}

#[test]
fn test_display_separates_elements() {
    let mut message = EncryptedMessage::default();
    message.push_aes(Token::value("1.00".to_string()), true);
    message.push_aes(Token::value("2.00".to_string()), true);
    message.push_aes(Token::value("3.00".to_string()), false);
    assert_eq!(message.to_string(), "AES(1.00) AES(2.00) 3.00");
    assert_eq!(message.values(), vec!["1.00", "2.00", "3.00"]);
}
