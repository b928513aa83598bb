//! Vote counts over a consolidated table of responses.

use std::collections::HashMap;
use std::ops::AddAssign;

use log::{debug, info};

use crate::config::ReviewErrors;
use crate::table::Table;

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
    const ONE: VoteCount = VoteCount(1);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

/// Share of one vote category among all the counted rows.
#[derive(PartialEq, Debug, Clone)]
pub struct VoteShare {
    pub vote: String,
    pub count: u64,
    /// Percentage of the counted rows, rounded to 2 decimals.
    pub percent: f64,
}

/// Number of rows with a given vote inside one group (a theme or an item).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GroupCount {
    pub key: String,
    pub vote: String,
    pub count: u64,
}

/// The names of the columns the summaries read.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SummaryColumns {
    pub vote: String,
    pub theme: String,
    pub item: String,
}

impl SummaryColumns {
    pub fn with_vote(vote: &str) -> SummaryColumns {
        SummaryColumns {
            vote: vote.to_string(),
            theme: "tematica".to_string(),
            item: "codigo".to_string(),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Summary {
    pub votes: Vec<VoteShare>,
    pub themes: Vec<GroupCount>,
    pub items: Vec<GroupCount>,
}

/// Rounds to 2 decimals, halves going to the even neighbour as pandas does.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

fn count_by<I>(keys: I) -> HashMap<I::Item, VoteCount>
where
    I: Iterator,
    I::Item: Eq + std::hash::Hash,
{
    let mut counts: HashMap<I::Item, VoteCount> = HashMap::new();
    for k in keys {
        *counts.entry(k).or_insert(VoteCount::EMPTY) += VoteCount::ONE;
    }
    counts
}

/// Counts the rows per vote category, most frequent first.
///
/// Rows with a blank vote are not counted. Categories with the same count
/// are ordered by name.
pub fn vote_distribution(table: &Table, vote_col: &str) -> Result<Vec<VoteShare>, ReviewErrors> {
    let votes = table.column(vote_col)?;
    let counts = count_by(
        votes
            .into_iter()
            .map(str::trim)
            .filter(|v| !v.is_empty()),
    );
    let total: VoteCount = counts.values().cloned().sum();
    debug!(
        "vote_distribution: {} counted rows out of {}",
        total.0,
        table.len()
    );

    let mut res: Vec<VoteShare> = counts
        .into_iter()
        .map(|(vote, count)| VoteShare {
            vote: vote.to_string(),
            count: count.0,
            percent: round2(count.0 as f64 / total.0 as f64 * 100.0),
        })
        .collect();
    res.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.vote.cmp(&b.vote)));
    Ok(res)
}

/// Counts the rows per (group, vote) pair.
///
/// Sorted by group ascending, then by count descending and vote name.
/// Rows where the group or the vote is blank are not counted.
pub fn grouped_distribution(
    table: &Table,
    key_col: &str,
    vote_col: &str,
) -> Result<Vec<GroupCount>, ReviewErrors> {
    let keys = table.column(key_col)?;
    let votes = table.column(vote_col)?;
    let counts = count_by(
        keys.into_iter()
            .map(str::trim)
            .zip(votes.into_iter().map(str::trim))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty()),
    );
    let mut res: Vec<GroupCount> = counts
        .into_iter()
        .map(|((key, vote), count)| GroupCount {
            key: key.to_string(),
            vote: vote.to_string(),
            count: count.0,
        })
        .collect();
    res.sort_by(|a, b| {
        a.key
            .cmp(&b.key)
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.vote.cmp(&b.vote))
    });
    Ok(res)
}

/// Computes the three views: overall, per theme and per item.
pub fn summarize(table: &Table, columns: &SummaryColumns) -> Result<Summary, ReviewErrors> {
    info!(
        "Summarizing {} responses on column {:?}",
        table.len(),
        columns.vote
    );
    let summary = Summary {
        votes: vote_distribution(table, &columns.vote)?,
        themes: grouped_distribution(table, &columns.theme, &columns.vote)?,
        items: grouped_distribution(table, &columns.item, &columns.vote)?,
    };
    for share in summary.votes.iter() {
        info!("{:>8} {:>7.2}% {}", share.count, share.percent, share.vote);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(rows: &[(&str, &str, &str)]) -> Table {
        let mut t = Table::new(vec![
            "codigo".to_string(),
            "tematica".to_string(),
            "voto_delphi".to_string(),
        ]);
        for (code, theme, vote) in rows {
            t.push_row(vec![code.to_string(), theme.to_string(), vote.to_string()])
                .unwrap();
        }
        t
    }

    #[test]
    fn two_submissions_eighty_twenty() {
        let first = responses(&[
            ("A1", "Renda", "Manter"),
            ("A2", "Renda", "Manter"),
            ("A3", "Saude", "Manter"),
            ("A4", "Saude", "Ajustar"),
            ("A5", "Saude", "Ajustar"),
        ]);
        let second = responses(&[
            ("A1", "Renda", "Manter"),
            ("A2", "Renda", "Manter"),
            ("A3", "Saude", "Manter"),
            ("A4", "Saude", "Manter"),
            ("A5", "Saude", "Manter"),
        ]);
        let all = Table::concat(&[first, second]);
        let votes = vote_distribution(&all, "voto_delphi").unwrap();
        assert_eq!(
            votes,
            vec![
                VoteShare {
                    vote: "Manter".to_string(),
                    count: 8,
                    percent: 80.0
                },
                VoteShare {
                    vote: "Ajustar".to_string(),
                    count: 2,
                    percent: 20.0
                },
            ]
        );
    }

    #[test]
    fn percentages_add_up() {
        let t = responses(&[
            ("A1", "T", "Manter"),
            ("A2", "T", "Ajustar"),
            ("A3", "T", "Retirar"),
            ("A4", "T", "Manter"),
            ("A5", "T", "Coletivo"),
            ("A6", "T", "Ajustar"),
            ("A7", "T", "Manter"),
        ]);
        let votes = vote_distribution(&t, "voto_delphi").unwrap();
        let total: f64 = votes.iter().map(|v| v.percent).sum();
        assert!((total - 100.0).abs() <= 0.01 * votes.len() as f64);
        assert_eq!(votes[0].percent, 42.86);
    }

    #[test]
    fn halves_round_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        let mut rows = vec![("A1", "T", "Retirar")];
        rows.extend(std::iter::repeat(("A1", "T", "Manter")).take(799));
        let votes = vote_distribution(&responses(&rows), "voto_delphi").unwrap();
        assert_eq!(votes[0].percent, 99.88);
        assert_eq!(votes[1].vote, "Retirar");
        assert_eq!(votes[1].percent, 0.12);
    }

    #[test]
    fn ties_are_ordered_by_vote() {
        let t = responses(&[
            ("A1", "T", "Retirar"),
            ("A2", "T", "Ajustar"),
            ("A3", "T", "Manter"),
        ]);
        let votes: Vec<String> = vote_distribution(&t, "voto_delphi")
            .unwrap()
            .into_iter()
            .map(|v| v.vote)
            .collect();
        assert_eq!(votes, vec!["Ajustar", "Manter", "Retirar"]);
    }

    #[test]
    fn blank_votes_are_not_counted() {
        let t = responses(&[("A1", "T", "Manter"), ("A2", "T", " "), ("", "T", "Ajustar")]);
        let votes = vote_distribution(&t, "voto_delphi").unwrap();
        assert_eq!(votes.iter().map(|v| v.count).sum::<u64>(), 2);
        assert_eq!(votes[0].percent, 50.0);
        let items = grouped_distribution(&t, "codigo", "voto_delphi").unwrap();
        assert_eq!(
            items,
            vec![GroupCount {
                key: "A1".to_string(),
                vote: "Manter".to_string(),
                count: 1
            }]
        );
    }

    #[test]
    fn themes_sorted_then_counts_descending() {
        let t = responses(&[
            ("B1", "Saude", "Ajustar"),
            ("B2", "Renda", "Manter"),
            ("B3", "Saude", "Manter"),
            ("B4", "Saude", "Manter"),
            ("B5", "Renda", "Retirar"),
        ]);
        let themes = grouped_distribution(&t, "tematica", "voto_delphi").unwrap();
        let flat: Vec<(&str, &str, u64)> = themes
            .iter()
            .map(|g| (g.key.as_str(), g.vote.as_str(), g.count))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("Renda", "Manter", 1),
                ("Renda", "Retirar", 1),
                ("Saude", "Manter", 2),
                ("Saude", "Ajustar", 1),
            ]
        );
    }

    #[test]
    fn summarize_is_repeatable() {
        let t = responses(&[
            ("A2", "X", "Manter"),
            ("A1", "Y", "Ajustar"),
            ("A1", "Y", "Manter"),
            ("A2", "X", "Retirar"),
        ]);
        let cols = SummaryColumns::with_vote("voto_delphi");
        assert_eq!(summarize(&t, &cols).unwrap(), summarize(&t, &cols).unwrap());
    }

    #[test]
    fn missing_vote_column() {
        let t = responses(&[]);
        assert_eq!(
            vote_distribution(&t, "voto"),
            Err(ReviewErrors::MissingColumn("voto".to_string()))
        );
    }
}
