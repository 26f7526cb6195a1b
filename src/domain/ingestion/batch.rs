//! Import batch identifiers

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// Number of random bytes behind a batch id
const BATCH_ID_BYTES: usize = 24;

/// Mint a new batch id: random bytes, base64-encoded
///
/// Every row written during one import cycle carries this id, and cleanup
/// removes rows carrying any other.
pub fn mint_batch_id() -> String {
    let mut random_bytes = [0u8; BATCH_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut random_bytes);

    STANDARD.encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_id_decodes_to_expected_length() {
        let id = mint_batch_id();
        let decoded = STANDARD.decode(&id).unwrap();
        assert_eq!(decoded.len(), BATCH_ID_BYTES);
    }

    #[test]
    fn test_batch_ids_are_unique() {
        let a = mint_batch_id();
        let b = mint_batch_id();
        assert_ne!(a, b);
    }
}
