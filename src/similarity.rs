//! Text similarity for snippet matching
//!
//! Ratcliff/Obershelp "gestalt" similarity: find the longest common
//! contiguous block, recurse on both sides, and score
//! `2 * matched / (len(a) + len(b))`. Operates on Unicode scalar values.
//!
//! With `autojunk` on (the default) and `b` at least 200 elements long,
//! elements of `b` occurring in more than 1% of its positions cannot seed a
//! match. Code snippets are full of spaces and braces, so this changes
//! scores noticeably; it is kept switchable for that reason.

use std::collections::{HashMap, HashSet};

/// Collapse every run of whitespace to a single space
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity ratio in `[0, 1]` with the default settings
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    SequenceRatio::new().ratio(a, b)
}

/// Configurable ratio calculator
#[derive(Debug, Clone, Copy)]
pub struct SequenceRatio {
    autojunk: bool,
}

impl Default for SequenceRatio {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum length of `b` before popular elements are ignored
const AUTOJUNK_MIN_LEN: usize = 200;

impl SequenceRatio {
    pub fn new() -> Self {
        Self { autojunk: true }
    }

    /// Enable or disable the popular-element heuristic
    pub fn autojunk(mut self, on: bool) -> Self {
        self.autojunk = on;
        self
    }

    pub fn ratio(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let total = a.len() + b.len();
        if total == 0 {
            return 1.0;
        }
        let matched = Matcher::new(&a, &b, self.autojunk).matched_len();
        2.0 * matched as f64 / total as f64
    }
}

/// Longest-matching-block search state over two char sequences
struct Matcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each element in `b`, ascending (popular elements removed)
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char], autojunk: bool) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }

        let n = b.len();
        if autojunk && n >= AUTOJUNK_MIN_LEN {
            let ntest = n / 100 + 1;
            let popular: HashSet<char> = b2j
                .iter()
                .filter(|(_, idxs)| idxs.len() > ntest)
                .map(|(&c, _)| c)
                .collect();
            for c in popular {
                b2j.remove(&c);
            }
        }

        Self { a, b, b2j }
    }

    /// Longest block `a[i..i+k] == b[j..j+k]` within the given bounds.
    ///
    /// Ties resolve to the earliest `i`, then the earliest `j`. The block is
    /// extended over elements excluded from `b2j`, so popular elements can
    /// still grow a match they could not start.
    fn find_longest_match(
        &self,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0usize);
        // j2len[j] = length of the longest match ending at a[i-1], b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut newj2len: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let prev = if j > 0 {
                        j2len.get(&(j - 1)).copied().unwrap_or(0)
                    } else {
                        0
                    };
                    let k = prev + 1;
                    newj2len.insert(j, k);
                    if k > bestsize {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestsize = k;
                    }
                }
            }
            j2len = newj2len;
        }

        while besti > alo && bestj > blo && self.a[besti - 1] == self.b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            bestsize += 1;
        }
        while besti + bestsize < ahi
            && bestj + bestsize < bhi
            && self.a[besti + bestsize] == self.b[bestj + bestsize]
        {
            bestsize += 1;
        }

        (besti, bestj, bestsize)
    }

    /// Total length of all matching blocks
    fn matched_len(&self) -> usize {
        let mut total = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\tb   c "), "a b c");
        assert_eq!(normalize_whitespace(""), "");
    }

    #[test]
    fn test_ratio_identical() {
        assert_eq!(sequence_ratio("class Foo {}", "class Foo {}"), 1.0);
    }

    #[test]
    fn test_ratio_both_empty() {
        assert_eq!(sequence_ratio("", ""), 1.0);
    }

    #[test]
    fn test_ratio_one_empty() {
        assert_eq!(sequence_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_ratio_disjoint() {
        assert_eq!(sequence_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_ratio_known_values() {
        // Classic gestalt examples
        assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-12);
        // "abxcd" vs "abcd": blocks "ab" + "cd" = 4 of 9
        assert!((sequence_ratio("abxcd", "abcd") - 8.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_exactly_point_nine() {
        // 9 of 10 chars shared on each side: 18 / 20
        let r = sequence_ratio("xxxxxxxxxa", "xxxxxxxxxb");
        assert_eq!(r, 0.9);
    }

    #[test]
    fn test_ratio_order_sensitive() {
        // "ab" is taken first; nothing in a[2..] lines up with b[5..]
        let r = sequence_ratio("ab_cd", "cd_ab");
        assert!((r - 0.4).abs() < 1e-12, "got {}", r);
    }

    #[test]
    fn test_ratio_unicode_chars() {
        assert_eq!(sequence_ratio("héllo", "héllo"), 1.0);
        assert!((sequence_ratio("é", "e") - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_autojunk_changes_long_inputs() {
        // Long b where ' ' is popular: with autojunk the spaces cannot seed a block
        let a = "a ".repeat(150);
        let b = " b".repeat(150);
        let with = SequenceRatio::new().ratio(&a, &b);
        let without = SequenceRatio::new().autojunk(false).ratio(&a, &b);
        assert!(without > with, "without={} with={}", without, with);
    }

    #[test]
    fn test_autojunk_irrelevant_for_short_inputs() {
        let a = "public class Foo { void bar() {} }";
        let b = "public class Foo { void baz() {} }";
        assert_eq!(
            SequenceRatio::new().ratio(a, b),
            SequenceRatio::new().autojunk(false).ratio(a, b)
        );
    }

    mod fuzz {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fuzz_ratio_in_unit_range(a in "\\PC{0,120}", b in "\\PC{0,120}") {
                let r = sequence_ratio(&a, &b);
                prop_assert!((0.0..=1.0).contains(&r));
            }

            #[test]
            fn fuzz_ratio_identity(a in "\\PC{0,199}") {
                prop_assert_eq!(sequence_ratio(&a, &a), 1.0);
            }
        }
    }
}
