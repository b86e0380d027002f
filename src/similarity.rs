//! Case-insensitive similarity ratio based on longest matching blocks.
//!
//! The ratio is `2 * M / T` where `M` is the total length of the matching
//! blocks and `T` the combined length of both inputs. Blocks are found by
//! taking the longest common contiguous run (earliest in `a`, then earliest in
//! `b` on ties) and recursing on the unmatched left and right remainders.
//! Lengths are counted in chars, not bytes.

use std::collections::HashMap;

/// A run `a[a_start..a_start+len] == b[b_start..b_start+len]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchBlock {
  pub a_start: usize,
  pub b_start: usize,
  pub len: usize,
}

/// Similarity of `a` and `b` in `[0, 1]` after lowercasing both.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
  let a: Vec<char> = a.to_lowercase().chars().collect();
  let b: Vec<char> = b.to_lowercase().chars().collect();
  let total = a.len() + b.len();
  if total == 0 {
    return 1.0;
  }
  let matched: usize = matching_blocks(&a, &b).iter().map(|m| m.len).sum();
  2.0 * matched as f64 / total as f64
}

/// All matching blocks of `a` and `b`, ordered by position.
pub fn matching_blocks(a: &[char], b: &[char]) -> Vec<MatchBlock> {
  let mut b_index: HashMap<char, Vec<usize>> = HashMap::new();
  for (j, ch) in b.iter().enumerate() {
    b_index.entry(*ch).or_default().push(j);
  }

  let mut pending = vec![(0, a.len(), 0, b.len())];
  let mut blocks = Vec::new();
  while let Some((alo, ahi, blo, bhi)) = pending.pop() {
    let m = longest_match(a, &b_index, alo, ahi, blo, bhi);
    if m.len == 0 {
      continue;
    }
    blocks.push(m);
    if alo < m.a_start && blo < m.b_start {
      pending.push((alo, m.a_start, blo, m.b_start));
    }
    if m.a_start + m.len < ahi && m.b_start + m.len < bhi {
      pending.push((m.a_start + m.len, ahi, m.b_start + m.len, bhi));
    }
  }
  blocks.sort_by_key(|m| (m.a_start, m.b_start));
  blocks
}

/// Longest common run within `a[alo..ahi]` and `b[blo..bhi]`.
/// Ties resolve to the smallest `a_start`, then the smallest `b_start`.
fn longest_match(
  a: &[char],
  b_index: &HashMap<char, Vec<usize>>,
  alo: usize,
  ahi: usize,
  blo: usize,
  bhi: usize,
) -> MatchBlock {
  let mut best = MatchBlock { a_start: alo, b_start: blo, len: 0 };
  // run length of the match ending at (i-1, j), keyed by j
  let mut run_ending: HashMap<usize, usize> = HashMap::new();

  for (i, ch) in a.iter().enumerate().take(ahi).skip(alo) {
    let mut next_run: HashMap<usize, usize> = HashMap::new();
    if let Some(positions) = b_index.get(ch) {
      for &j in positions {
        if j < blo {
          continue;
        }
        if j >= bhi {
          break;
        }
        let k = j.checked_sub(1).and_then(|p| run_ending.get(&p)).copied().unwrap_or(0) + 1;
        next_run.insert(j, k);
        if k > best.len {
          best = MatchBlock { a_start: i + 1 - k, b_start: j + 1 - k, len: k };
        }
      }
    }
    run_ending = next_run;
  }
  best
}
