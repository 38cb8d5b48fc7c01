//! Verhoeff check-digit algorithm.
//!
//! The Verhoeff scheme detects every single-digit substitution and every
//! adjacent transposition, which a plain mod-10 sum does not. Identifiers
//! issued here are hand-transcribed between institutions, so that class of
//! error is the one that matters.

/// Multiplication table of the dihedral group d5 (symmetries of the
/// regular pentagon).
const D5: [[u8; 10]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 2, 3, 4, 0, 6, 7, 8, 9, 5],
    [2, 3, 4, 0, 1, 7, 8, 9, 5, 6],
    [3, 4, 0, 1, 2, 8, 9, 5, 6, 7],
    [4, 0, 1, 2, 3, 9, 5, 6, 7, 8],
    [5, 9, 8, 7, 6, 0, 4, 3, 2, 1],
    [6, 5, 9, 8, 7, 1, 0, 4, 3, 2],
    [7, 6, 5, 9, 8, 2, 1, 0, 4, 3],
    [8, 7, 6, 5, 9, 3, 2, 1, 0, 4],
    [9, 8, 7, 6, 5, 4, 3, 2, 1, 0],
];

/// Position-dependent permutation table. Row 0 is the identity, row 1 is
/// the Verhoeff base permutation, and row i is row i-1 composed with
/// row 1; positions cycle modulo 8 from the rightmost digit.
const PERM: [[u8; 10]; 8] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
    [1, 5, 7, 6, 2, 8, 3, 0, 9, 4],
    [5, 8, 0, 3, 7, 9, 6, 1, 4, 2],
    [8, 9, 1, 6, 0, 4, 3, 5, 2, 7],
    [9, 4, 5, 3, 1, 2, 6, 8, 7, 0],
    [4, 2, 8, 6, 5, 7, 3, 9, 0, 1],
    [2, 7, 9, 3, 8, 0, 6, 4, 1, 5],
    [7, 0, 4, 6, 9, 1, 3, 2, 5, 8],
];

/// Group inverses: `INV[i] = j` such that `D5[i][j] == 0`.
const INV: [u8; 10] = [0, 4, 3, 2, 1, 5, 6, 7, 8, 9];

/// Errors from digit conversion.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("expected an alphanumeric character, found {0:?}")]
    NonAlphanumeric(char),
}

/// Fold a digit sequence through the group tables.
///
/// Digits are consumed rightmost first; the fold starts at the group
/// identity. A sequence carrying a valid check digit folds to 0.
pub fn checksum(digits: &[u8]) -> u8 {
    let mut c = 0u8;
    for (pos, &d) in digits.iter().rev().enumerate() {
        c = D5[c as usize][PERM[pos % 8][d as usize] as usize];
    }
    c
}

/// True iff the trailing digit of `digits` is a valid check digit for the
/// rest of the sequence.
pub fn verify(digits: &[u8]) -> bool {
    checksum(digits) == 0
}

/// Compute the check digit for `digits` (which carry no check digit yet).
pub fn compute(digits: &[u8]) -> u8 {
    let mut with_placeholder = digits.to_vec();
    with_placeholder.push(0);
    INV[checksum(&with_placeholder) as usize]
}

/// Map one alphanumeric character to a digit 0-9.
///
/// Digits pass through; letters map case-insensitively to their alphabet
/// index modulo 10. The mapping is lossy by design: the checksum is a
/// transcription aid, not a hash, so collisions between letters are fine.
pub fn digit_of(c: char) -> Result<u8, ChecksumError> {
    match c {
        '0'..='9' => Ok(c as u8 - b'0'),
        'a'..='z' => Ok((c as u8 - b'a') % 10),
        'A'..='Z' => Ok((c as u8 - b'A') % 10),
        other => Err(ChecksumError::NonAlphanumeric(other)),
    }
}

/// Map an alphanumeric string to its digit sequence.
pub fn digits_of(value: &str) -> Result<Vec<u8>, ChecksumError> {
    value.chars().map(digit_of).collect()
}
