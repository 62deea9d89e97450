use rand::Rng;

use crate::models::match_record::MATCH_CODE_LENGTH;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of candidate match codes. Uniqueness is checked by the caller.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..MATCH_CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }
}
