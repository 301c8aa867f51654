//! Line-prefixed renderings of entity changes.

/// Prefix every line of `text` with `prefix`.
pub(crate) fn prefix_lines(text: &str, prefix: char) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line diff of `from` against `to` based on their longest common
/// subsequence. Within a changed region removals come before additions.
pub(crate) fn line_diff(from: &str, to: &str) -> String {
    let old: Vec<&str> = from.lines().collect();
    let new: Vec<&str> = to.lines().collect();

    // lcs[i][j] = length of the LCS of old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; new.len() + 1]; old.len() + 1];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            out.push(format!(" {}", old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push(format!("-{}", old[i]));
            i += 1;
        } else {
            out.push(format!("+{}", new[j]));
            j += 1;
        }
    }
    out.extend(old[i..].iter().map(|line| format!("-{line}")));
    out.extend(new[j..].iter().map(|line| format!("+{line}")));
    out.join("\n")
}
