//! OBEX Authentication
//!
//! MD5 challenge/response used to authenticate client and server while
//! the OBEX session is being connected. Every function here is a pure byte
//! transform; the session keeps the nonce it issued.
//!
//! ## Wire format
//!
//! - nonce: 16 bytes, sent in the challenge header under tag `0x00`
//! - request digest: `MD5(nonce || ':' || password)`, sent in the response
//!   header under tag `0x00`

use crate::constants::{AUTH_DIGEST_LENGTH, PASSWORD_MAX_LENGTH};
use md5::{Digest, Md5};
use rand_core::{CryptoRng, RngCore};

/// 16-byte authentication nonce
pub type Nonce = [u8; AUTH_DIGEST_LENGTH];

/// 16-byte request digest
pub type RequestDigest = [u8; AUTH_DIGEST_LENGTH];

/// Challenge issued to the peer together with the answer it must return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AuthChallenge {
    /// Random nonce sent to the peer
    pub nonce: Nonce,
    /// Digest a peer knowing the password will answer with
    pub expected: RequestDigest,
}

/// Generate a fresh challenge for `password`
///
/// The nonce is drawn from `rng`, so two challenges never share a nonce in
/// practice.
pub fn generate_challenge<R>(rng: &mut R, password: &[u8]) -> AuthChallenge
where
    R: RngCore + CryptoRng,
{
    let mut nonce = [0u8; AUTH_DIGEST_LENGTH];
    rng.fill_bytes(&mut nonce);
    trace!("[AUTH] Generated challenge nonce");

    AuthChallenge {
        nonce,
        expected: generate_response(password, &nonce),
    }
}

/// Compute the digest answering `nonce`
#[must_use]
pub fn generate_response(password: &[u8], nonce: &Nonce) -> RequestDigest {
    debug_assert!(password.len() <= PASSWORD_MAX_LENGTH);

    let mut hasher = Md5::new();
    hasher.update(nonce);
    hasher.update(b":");
    hasher.update(password);

    let mut digest = [0u8; AUTH_DIGEST_LENGTH];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Check that `response` answers `nonce` for `password`
///
/// Responses of the wrong length never verify. The comparison does not
/// stop at the first differing byte.
#[must_use]
pub fn verify(nonce: &Nonce, response: &[u8], password: &[u8]) -> bool {
    if response.len() != AUTH_DIGEST_LENGTH {
        return false;
    }

    let expected = generate_response(password, nonce);
    expected
        .iter()
        .zip(response)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingRng;

    const fn hex_digest(hex: &[u8; 32]) -> [u8; 16] {
        const fn nibble(c: u8) -> u8 {
            match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                _ => 0,
            }
        }
        let mut out = [0u8; 16];
        let mut i = 0;
        while i < 16 {
            out[i] = (nibble(hex[i * 2]) << 4) | nibble(hex[i * 2 + 1]);
            i += 1;
        }
        out
    }

    #[test]
    fn test_response_known_vector() {
        let digest = generate_response(b"1234", &[0u8; 16]);
        assert_eq!(digest, hex_digest(b"fbe61475ff487940420e7e621a7c51db"));
    }

    #[test]
    fn test_challenge_uses_rng_nonce() {
        let mut rng = CountingRng(0);
        let challenge = generate_challenge(&mut rng, b"0000");

        let mut nonce = [0u8; 16];
        for (i, byte) in nonce.iter_mut().enumerate() {
            *byte = i as u8;
        }
        assert_eq!(challenge.nonce, nonce);
        assert_eq!(
            challenge.expected,
            hex_digest(b"cf60bbfec0481c1a0b5e33930865620c")
        );

        let next = generate_challenge(&mut rng, b"0000");
        assert_ne!(next.nonce, challenge.nonce);
    }

    #[test]
    fn test_verify_accepts_generated_response() {
        let mut rng = CountingRng(0x5A);
        let passwords: [&[u8]; 3] = [b"a", b"0000", &[b'x'; PASSWORD_MAX_LENGTH]];

        for password in passwords {
            let challenge = generate_challenge(&mut rng, password);
            let response = generate_response(password, &challenge.nonce);
            assert_eq!(response, challenge.expected);
            assert!(verify(&challenge.nonce, &response, password));
        }
    }

    #[test]
    fn test_verify_rejects_any_bit_flip() {
        let nonce = [0x42u8; 16];
        let response = generate_response(b"secret", &nonce);

        for byte in 0..AUTH_DIGEST_LENGTH {
            for bit in 0..8 {
                let mut flipped = response;
                flipped[byte] ^= 1 << bit;
                assert!(!verify(&nonce, &flipped, b"secret"));
            }
        }
    }

    #[test]
    fn test_verify_rejects_wrong_password_and_length() {
        let nonce = [0x11u8; 16];
        let response = generate_response(b"secret", &nonce);

        assert!(!verify(&nonce, &response, b"Secret"));
        assert!(!verify(&nonce, &response[..15], b"secret"));
        assert!(!verify(&nonce, &[], b"secret"));
    }
}
