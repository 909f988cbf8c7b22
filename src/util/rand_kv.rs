use bytes::Bytes;
use rand::{distr::Alphanumeric, Rng};

pub fn get_test_key(i: usize) -> Bytes {
  Bytes::from(format!("cask-kv-key-{:09}", i))
}

pub fn get_test_value(i: usize) -> Bytes {
  let suffix: String = rand::rng()
    .sample_iter(&Alphanumeric)
    .take(16)
    .map(char::from)
    .collect();
  Bytes::from(format!("cask-kv-value-{:09}-{}", i, suffix))
}
