//! Character-by-character reveal timing.
//!
//! Pure timing only: a front-end drives the frames and decides how to draw
//! them. Pauses are longer after punctuation so sentences breathe.

use std::time::Duration;

/// Delay before the first character.
pub const START_DELAY: Duration = Duration::from_millis(150);
/// Delay after sentence or clause punctuation.
pub const PUNCTUATION_DELAY: Duration = Duration::from_millis(130);
/// Delay after a CJK ideograph.
pub const IDEOGRAPH_DELAY: Duration = Duration::from_millis(40);
/// Delay after anything else.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(30);

const PAUSE_CHARS: &str = "。！？…，、；：";

fn is_ideograph(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// How long to wait after showing `c`.
pub fn char_delay(c: char) -> Duration {
    if PAUSE_CHARS.contains(c) {
        PUNCTUATION_DELAY
    } else if is_ideograph(c) {
        IDEOGRAPH_DELAY
    } else {
        DEFAULT_DELAY
    }
}

/// One step of the reveal: the visible prefix and how long it stays up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub visible: &'a str,
    pub hold: Duration,
}

/// Iterator over reveal frames of `text`.
///
/// The first frame is empty and held for [`START_DELAY`]; each following
/// frame shows one more character.
#[derive(Debug, Clone)]
pub struct Typewriter<'a> {
    text: &'a str,
    /// Byte length of the visible prefix; `None` before the first frame.
    shown: Option<usize>,
}

impl<'a> Typewriter<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, shown: None }
    }

    /// Jump to the end; the caller shows the full text and no more frames follow.
    pub fn skip(&mut self) {
        self.shown = Some(self.text.len());
    }

    pub fn is_finished(&self) -> bool {
        self.shown == Some(self.text.len())
    }
}

impl<'a> Iterator for Typewriter<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Frame<'a>> {
        match self.shown {
            None => {
                self.shown = Some(0);
                Some(Frame {
                    visible: "",
                    hold: START_DELAY,
                })
            }
            Some(end) => {
                let c = self.text[end..].chars().next()?;
                let end = end + c.len_utf8();
                self.shown = Some(end);
                Some(Frame {
                    visible: &self.text[..end],
                    hold: char_delay(c),
                })
            }
        }
    }
}

/// Total time a full reveal of `text` takes.
pub fn total_duration(text: &str) -> Duration {
    Typewriter::new(text).map(|frame| frame.hold).sum()
}
