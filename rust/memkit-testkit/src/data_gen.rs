//! Seeded data generators.

use std::{collections::HashSet, io::Write};

use crate::records::Employee;

/// Returns `count` distinct keys in random order, drawn from
/// `-(4 * count)..(4 * count)`.
pub fn distinct_keys(count: usize, seed: u64) -> Vec<i64> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let bound = (count as i64).max(1) * 4;
    let mut seen = HashSet::with_capacity(count);
    let mut keys = Vec::with_capacity(count);
    while keys.len() < count {
        let key = rng.i64(-bound..bound);
        if seen.insert(key) {
            keys.push(key);
        }
    }
    keys
}

/// Returns `count` distinct lowercase words of 1 to `max_len` letters.
pub fn distinct_words(count: usize, max_len: usize, seed: u64) -> Vec<String> {
    assert!(max_len > 0);
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut seen = HashSet::with_capacity(count);
    let mut words = Vec::with_capacity(count);
    while words.len() < count {
        let len = rng.usize(1..=max_len);
        let word: String = (0..len).map(|_| rng.lowercase()).collect();
        if seen.insert(word.clone()) {
            words.push(word);
        }
    }
    words
}

/// Returns one [`Employee`] per key in `distinct_keys(count, seed)`.
pub fn employees(count: usize, seed: u64) -> Vec<Employee> {
    let mut rng = fastrand::Rng::with_seed(seed ^ 0xe4b1);
    distinct_keys(count, seed)
        .into_iter()
        .map(|id| {
            let name: String = (0..rng.usize(3..12)).map(|_| rng.lowercase()).collect();
            Employee::new(id, &name)
        })
        .collect()
}

/// Writes `count` numbered text lines to a new temporary file and returns
/// it.
pub fn write_sample_lines(count: usize) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    for i in 0..count {
        writeln!(file, "line {i}")?;
    }
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_keys() {
        let keys = distinct_keys(500, 1);
        assert_eq!(keys.len(), 500);
        assert_eq!(keys.iter().collect::<HashSet<_>>().len(), 500);
        assert_eq!(keys, distinct_keys(500, 1));
        assert!(keys.iter().all(|k| (-2000..2000).contains(k)));
    }

    #[test]
    fn test_distinct_words() {
        let words = distinct_words(100, 8, 3);
        assert_eq!(words.iter().collect::<HashSet<_>>().len(), 100);
        assert!(words.iter().all(|w| (1..=8).contains(&w.len())));
    }

    #[test]
    fn test_employees() {
        let list = employees(20, 9);
        assert_eq!(list.len(), 20);
        assert!(list.iter().all(|e| (3..12).contains(&e.name().len())));
    }

    #[test]
    fn test_sample_lines() {
        let file = write_sample_lines(3).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, "line 0\nline 1\nline 2\n");
    }
}
