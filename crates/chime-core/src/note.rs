//! Musical note identity and equal-temperament conversions.
//!
//! Notes are identified by their MIDI number: C4 (middle C) is 60 and A4 is
//! 69, tuned to 440 Hz.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// A4 reference pitch in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// MIDI number of A4.
pub const A4_IDENTIFIER: i32 = 69;

/// Natural note letters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Letter {
    /// C.
    C,
    /// D.
    D,
    /// E.
    E,
    /// F.
    F,
    /// G.
    G,
    /// A.
    A,
    /// B.
    B,
}

impl Letter {
    /// Semitones above C.
    pub fn semitone(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    fn symbol(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }
}

/// Pitch modifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Accidental {
    /// No modifier.
    #[default]
    Natural,
    /// One semitone up.
    Sharp,
    /// One semitone down.
    Flat,
}

impl Accidental {
    /// Semitone offset.
    pub fn offset(self) -> i32 {
        match self {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        }
    }
}

/// A note in scientific pitch notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Note {
    /// Letter name.
    pub letter: Letter,
    /// Sharp, flat or natural.
    pub accidental: Accidental,
    /// Octave number; C4 is middle C.
    pub octave: i8,
}

impl Note {
    /// Build a note.
    pub const fn new(letter: Letter, accidental: Accidental, octave: i8) -> Self {
        Self {
            letter,
            accidental,
            octave,
        }
    }

    /// MIDI note number.
    pub fn identifier(self) -> i32 {
        note_identifier(self)
    }

    /// Frequency in Hz.
    pub fn frequency(self) -> f32 {
        note_frequency(self)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accidental = match self.accidental {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        };
        write!(f, "{}{}{}", self.letter.symbol(), accidental, self.octave)
    }
}

/// Error parsing a note name such as `"C#4"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid note name '{0}': expected a letter A-G, optional # or b, and an octave")]
pub struct ParseNoteError(pub String);

impl FromStr for Note {
    type Err = ParseNoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNoteError(s.to_string());
        let mut chars = s.trim().chars();
        let letter = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => Letter::C,
            Some('D') => Letter::D,
            Some('E') => Letter::E,
            Some('F') => Letter::F,
            Some('G') => Letter::G,
            Some('A') => Letter::A,
            Some('B') => Letter::B,
            _ => return Err(err()),
        };
        let rest = chars.as_str();
        let (accidental, octave) = if let Some(octave) = rest.strip_prefix('#') {
            (Accidental::Sharp, octave)
        } else if let Some(octave) = rest.strip_prefix('b') {
            (Accidental::Flat, octave)
        } else {
            (Accidental::Natural, rest)
        };
        let octave = octave.parse::<i8>().map_err(|_| err())?;
        Ok(Note::new(letter, accidental, octave))
    }
}

/// MIDI note number of `note`.
pub fn note_identifier(note: Note) -> i32 {
    (i32::from(note.octave) + 1) * 12 + note.letter.semitone() + note.accidental.offset()
}

/// Equal-temperament frequency of `note` in Hz.
#[inline]
pub fn note_frequency(note: Note) -> f32 {
    identifier_frequency(note_identifier(note))
}

/// Frequency of a MIDI note number in Hz.
#[inline]
pub fn identifier_frequency(identifier: i32) -> f32 {
    A4_FREQUENCY * libm::powf(2.0, (identifier - A4_IDENTIFIER) as f32 / 12.0)
}

/// Note for a MIDI number, spelled with sharps.
pub fn note_from_identifier(identifier: i32) -> Note {
    const SPELLING: [(Letter, Accidental); 12] = [
        (Letter::C, Accidental::Natural),
        (Letter::C, Accidental::Sharp),
        (Letter::D, Accidental::Natural),
        (Letter::D, Accidental::Sharp),
        (Letter::E, Accidental::Natural),
        (Letter::F, Accidental::Natural),
        (Letter::F, Accidental::Sharp),
        (Letter::G, Accidental::Natural),
        (Letter::G, Accidental::Sharp),
        (Letter::A, Accidental::Natural),
        (Letter::A, Accidental::Sharp),
        (Letter::B, Accidental::Natural),
    ];
    let (letter, accidental) = SPELLING[identifier.rem_euclid(12) as usize];
    let octave = identifier.div_euclid(12) - 1;
    Note::new(letter, accidental, octave.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8)
}

/// Closest note to `frequency`, or `None` for non-positive or non-finite input.
pub fn nearest_note(frequency: f32) -> Option<Note> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }
    let identifier = A4_IDENTIFIER as f32 + 12.0 * libm::log2f(frequency / A4_FREQUENCY);
    Some(note_from_identifier(libm::roundf(identifier) as i32))
}
