use sha2::{Digest, Sha256};

use crate::uint256::FixedUint256;

/// SHA-256 applied twice, read as a big-endian 256-bit integer.
pub fn double_hash(bytes: &[u8]) -> FixedUint256 {
    let first = Sha256::digest(bytes);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second[..]);
    FixedUint256::from_be_array(out)
}

#[cfg(test)]
mod tests {
    use super::double_hash;
    use crate::uint256::FixedUint256;

    #[test]
    fn matches_known_sha256d_vector() {
        // sha256d("hello")
        let expected = FixedUint256::from_hex(
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50",
        )
        .unwrap();
        assert_eq!(double_hash(b"hello"), expected);
    }

    #[test]
    fn is_deterministic_and_input_sensitive() {
        assert_eq!(double_hash(b"block"), double_hash(b"block"));
        assert_ne!(double_hash(b"block"), double_hash(b"blocl"));
    }
}
