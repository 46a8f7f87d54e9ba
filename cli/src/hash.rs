use anyhow::Result;

use crate::Hash;

pub fn hash(h: Hash) -> Result<()> {
    println!("{}", h.algorithm.hash_hex(&h.plaintext));
    Ok(())
}
