// Key/value hints attached to files

use crate::error::{Error, Result};

const BUCKETS: usize = 101;

/// Longest accepted key, in bytes.
pub const MAX_INFO_KEY: usize = 255;
/// Longest accepted value, in bytes.
pub const MAX_INFO_VAL: usize = 255;

/// Small hash-bucketed string map.
///
/// Enumeration by index walks the buckets in order and each bucket in
/// insertion order, so `nth_key` is stable while the map is unchanged.
#[derive(Debug, Clone)]
pub struct Info {
    buckets: Vec<Vec<(String, String)>>,
    len: usize,
}

impl Default for Info {
    fn default() -> Self {
        Self::new()
    }
}

fn bucket_of(key: &str) -> usize {
    key.bytes().map(|b| b as usize).sum::<usize>() % BUCKETS
}

impl Info {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BUCKETS],
            len: 0,
        }
    }

    /// Insert or replace `key`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() || key.len() > MAX_INFO_KEY {
            return Err(Error::InvalidArgument(format!(
                "info key must be 1..={} bytes, got {}",
                MAX_INFO_KEY,
                key.len()
            )));
        }
        if value.len() > MAX_INFO_VAL {
            return Err(Error::InvalidArgument(format!(
                "info value must be at most {} bytes, got {}",
                MAX_INFO_VAL,
                value.len()
            )));
        }

        let bucket = &mut self.buckets[bucket_of(key)];
        match bucket.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => {
                bucket.push((key.to_string(), value.to_string()));
                self.len += 1;
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.buckets[bucket_of(key)]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove `key`, returning its value.
    pub fn delete(&mut self, key: &str) -> Option<String> {
        let bucket = &mut self.buckets[bucket_of(key)];
        let index = bucket.iter().position(|(k, _)| k == key)?;
        self.len -= 1;
        Some(bucket.remove(index).1)
    }

    pub fn nkeys(&self) -> usize {
        self.len
    }

    pub fn nth_key(&self, n: usize) -> Result<&str> {
        self.iter().nth(n).map(|(k, _)| k).ok_or_else(|| {
            Error::InvalidArgument(format!("info has {} key(s), asked for #{}", self.len, n))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.buckets
            .iter()
            .flatten()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
