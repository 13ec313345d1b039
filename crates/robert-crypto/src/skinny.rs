//! SKINNY-64/192 block cipher.
//!
//! 64-bit block held as sixteen 4-bit cells (row-major, high nibble first),
//! 192-bit tweakey split into TK1 ‖ TK2 ‖ TK3, 40 rounds. The whole tweakey
//! is used as key material; there is no public tweak.
//!
//! Round: SubCells, AddConstants, AddRoundTweakey, ShiftRows, MixColumns.
//! Round tweakeys are expanded once at construction.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::types::SERVER_KEY_LENGTH;

/// Block length in bytes.
pub const SKINNY_BLOCK_LENGTH: usize = 8;

const ROUNDS: usize = 40;

const SBOX: [u8; 16] = [
    0xc, 0x6, 0x9, 0x0, 0x1, 0xa, 0x2, 0xb, 0x3, 0x8, 0x5, 0xd, 0x4, 0xe, 0x7, 0xf,
];

const SBOX_INV: [u8; 16] = [
    0x3, 0x4, 0x6, 0x8, 0xc, 0xa, 0x1, 0xe, 0x9, 0x2, 0x5, 0x7, 0x0, 0xb, 0xd, 0xf,
];

/// Cell `i` of the shifted state is taken from cell `SHIFT_ROWS[i]`.
/// Rows 1..3 rotate right by 1, 2 and 3 cells.
const SHIFT_ROWS: [usize; 16] = [0, 1, 2, 3, 7, 4, 5, 6, 10, 11, 8, 9, 13, 14, 15, 12];

const SHIFT_ROWS_INV: [usize; 16] = [0, 1, 2, 3, 5, 6, 7, 4, 10, 11, 8, 9, 15, 12, 13, 14];

const TWEAKEY_PERMUTATION: [usize; 16] = [9, 15, 8, 13, 10, 14, 12, 11, 0, 1, 2, 3, 4, 5, 6, 7];

const ROUND_CONSTANTS: [u8; ROUNDS] = round_constants();

/// 6-bit affine LFSR: (rc5..rc0) <- (rc4..rc0, rc5 ^ rc4 ^ 1), seeded with 0.
const fn round_constants() -> [u8; ROUNDS] {
    let mut out = [0u8; ROUNDS];
    let mut rc: u8 = 0;
    let mut i = 0;
    while i < ROUNDS {
        rc = ((rc << 1) & 0x3f) | (((rc >> 5) ^ (rc >> 4) ^ 1) & 1);
        out[i] = rc;
        i += 1;
    }
    out
}

type Cells = [u8; 16];

fn load_cells(bytes: &[u8]) -> Cells {
    let mut cells = [0u8; 16];
    for (i, byte) in bytes.iter().take(SKINNY_BLOCK_LENGTH).enumerate() {
        cells[2 * i] = byte >> 4;
        cells[2 * i + 1] = byte & 0x0f;
    }
    cells
}

fn store_cells(cells: &Cells) -> [u8; SKINNY_BLOCK_LENGTH] {
    let mut out = [0u8; SKINNY_BLOCK_LENGTH];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (cells[2 * i] << 4) | cells[2 * i + 1];
    }
    out
}

fn permute(cells: &Cells, table: &[usize; 16]) -> Cells {
    let mut out = [0u8; 16];
    for (dst, &src) in out.iter_mut().zip(table.iter()) {
        *dst = cells[src];
    }
    out
}

/// TK2 cell LFSR: (x3, x2, x1, x0) -> (x2, x1, x0, x3 ^ x2).
fn lfsr_tk2(x: u8) -> u8 {
    ((x << 1) & 0x0e) | (((x >> 3) ^ (x >> 2)) & 0x01)
}

/// TK3 cell LFSR: (x3, x2, x1, x0) -> (x0 ^ x3, x3, x2, x1).
fn lfsr_tk3(x: u8) -> u8 {
    (x >> 1) | (((x << 3) ^ x) & 0x08)
}

fn mix_columns(state: &mut Cells) {
    for c in 0..4 {
        let (r0, r1, r2, r3) = (state[c], state[4 + c], state[8 + c], state[12 + c]);
        state[c] = r0 ^ r2 ^ r3;
        state[4 + c] = r0;
        state[8 + c] = r1 ^ r2;
        state[12 + c] = r0 ^ r2;
    }
}

fn mix_columns_inv(state: &mut Cells) {
    for c in 0..4 {
        let (n0, n1, n2, n3) = (state[c], state[4 + c], state[8 + c], state[12 + c]);
        let r2 = n1 ^ n3;
        state[c] = n1;
        state[4 + c] = n2 ^ r2;
        state[8 + c] = r2;
        state[12 + c] = n0 ^ n3;
    }
}

fn add_constants(state: &mut Cells, round: usize) {
    let rc = ROUND_CONSTANTS[round];
    state[0] ^= rc & 0x0f;
    state[4] ^= rc >> 4;
    state[8] ^= 0x2;
}

/// SKINNY-64/192 with its round tweakeys expanded.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Skinny64 {
    /// XOR of TK1, TK2 and TK3 over the first two rows, per round.
    round_tweakeys: [[u8; 8]; ROUNDS],
}

impl Skinny64 {
    /// Expand a 24-byte tweakey.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != SERVER_KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: SERVER_KEY_LENGTH,
                got: key.len(),
            });
        }

        let mut tk1 = load_cells(&key[0..8]);
        let mut tk2 = load_cells(&key[8..16]);
        let mut tk3 = load_cells(&key[16..24]);

        let mut round_tweakeys = [[0u8; 8]; ROUNDS];
        for round_key in round_tweakeys.iter_mut() {
            for (i, cell) in round_key.iter_mut().enumerate() {
                *cell = tk1[i] ^ tk2[i] ^ tk3[i];
            }

            tk1 = permute(&tk1, &TWEAKEY_PERMUTATION);
            tk2 = permute(&tk2, &TWEAKEY_PERMUTATION);
            tk3 = permute(&tk3, &TWEAKEY_PERMUTATION);
            for i in 0..8 {
                tk2[i] = lfsr_tk2(tk2[i]);
                tk3[i] = lfsr_tk3(tk3[i]);
            }
        }

        tk1.zeroize();
        tk2.zeroize();
        tk3.zeroize();
        Ok(Self { round_tweakeys })
    }

    /// Encrypt one block in place.
    pub fn encrypt_block(&self, block: &mut [u8; SKINNY_BLOCK_LENGTH]) {
        let mut state = load_cells(block);
        for (round, round_key) in self.round_tweakeys.iter().enumerate() {
            for cell in state.iter_mut() {
                *cell = SBOX[*cell as usize];
            }
            add_constants(&mut state, round);
            for (cell, k) in state.iter_mut().zip(round_key.iter()) {
                *cell ^= k;
            }
            state = permute(&state, &SHIFT_ROWS);
            mix_columns(&mut state);
        }
        *block = store_cells(&state);
        state.zeroize();
    }

    /// Decrypt one block in place.
    pub fn decrypt_block(&self, block: &mut [u8; SKINNY_BLOCK_LENGTH]) {
        let mut state = load_cells(block);
        for (round, round_key) in self.round_tweakeys.iter().enumerate().rev() {
            mix_columns_inv(&mut state);
            state = permute(&state, &SHIFT_ROWS_INV);
            for (cell, k) in state.iter_mut().zip(round_key.iter()) {
                *cell ^= k;
            }
            add_constants(&mut state, round);
            for cell in state.iter_mut() {
                *cell = SBOX_INV[*cell as usize];
            }
        }
        *block = store_cells(&state);
        state.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(hex_str: &str) -> [u8; 8] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    #[test]
    fn sbox_inverse_is_consistent() {
        for x in 0..16u8 {
            assert_eq!(SBOX_INV[SBOX[x as usize] as usize], x);
        }
    }

    #[test]
    fn shift_rows_inverse_is_consistent() {
        let cells: Cells = core::array::from_fn(|i| i as u8);
        let shifted = permute(&cells, &SHIFT_ROWS);
        assert_eq!(permute(&shifted, &SHIFT_ROWS_INV), cells);
    }

    #[test]
    fn mix_columns_inverse_is_consistent() {
        let original: Cells = core::array::from_fn(|i| (i as u8 * 7 + 3) & 0x0f);
        let mut state = original;
        mix_columns(&mut state);
        mix_columns_inv(&mut state);
        assert_eq!(state, original);
    }

    #[test]
    fn round_constants_follow_lfsr() {
        assert_eq!(
            &ROUND_CONSTANTS[..8],
            &[0x01, 0x03, 0x07, 0x0f, 0x1f, 0x3e, 0x3d, 0x3b]
        );
    }

    #[test]
    fn known_answer_vector() {
        let key = hex::decode("ed00c85b120d68618753e24bfd908f60b2dbb41b422dfcd0").unwrap();
        let cipher = Skinny64::new(&key).unwrap();

        let mut data = block("530c61d35e8663c3");
        cipher.encrypt_block(&mut data);
        assert_eq!(data, block("dd2cf1a8f330303c"));

        cipher.decrypt_block(&mut data);
        assert_eq!(data, block("530c61d35e8663c3"));
    }

    #[test]
    fn different_keys_different_ciphertexts() {
        let a = Skinny64::new(&[0x11u8; 24]).unwrap();
        let b = Skinny64::new(&[0x22u8; 24]).unwrap();
        let mut x = [0u8; 8];
        let mut y = [0u8; 8];
        a.encrypt_block(&mut x);
        b.encrypt_block(&mut y);
        assert_ne!(x, y);
    }

    #[test]
    fn rejects_invalid_key_length() {
        assert!(Skinny64::new(&[0u8; 16]).is_err());
        assert!(Skinny64::new(&[0u8; 32]).is_err());
    }
}
