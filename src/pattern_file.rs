// Copyright 2018 Chris Pearce
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! JSON-lines files of transactions and mined patterns, plus per-length
//! ranking of results.

use crate::error::{Error, Result};
use crate::hmine::mine_hlink;
use crate::item::Item;
use crate::itemizer::Itemizer;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct TransactionRecord {
    items: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PatternRecord {
    pub items: Vec<String>,
    pub count: u32,
}

fn write_lines<P: AsRef<Path>, T: Serialize>(path: P, records: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn read_lines<R: BufRead, T: for<'de> Deserialize<'de>>(reader: R) -> Result<Vec<T>> {
    let mut records = vec![];
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

pub fn write_transactions<P: AsRef<Path>>(path: P, transactions: &[Vec<String>]) -> Result<()> {
    let records: Vec<TransactionRecord> = transactions
        .iter()
        .map(|items| TransactionRecord {
            items: items.clone(),
        })
        .collect();
    write_lines(path, &records)
}

pub fn read_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<String>>> {
    let file = File::open(path)?;
    let records: Vec<TransactionRecord> = read_lines(BufReader::new(file))?;
    Ok(records.into_iter().map(|record| record.items).collect())
}

pub fn write_patterns<P: AsRef<Path>>(path: P, patterns: &[PatternRecord]) -> Result<()> {
    info!(patterns = patterns.len(), "writing results");
    write_lines(path, patterns)
}

/// Reads a results file. A file that does not exist yet holds no results.
pub fn read_patterns<P: AsRef<Path>>(path: P) -> Result<Vec<PatternRecord>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(err) => return Err(err.into()),
    };
    read_lines(BufReader::new(file))
}

/// The absolute count matching a support fraction: `floor(fraction * n)`,
/// but never below 1.
pub fn support_count(fraction: f64, num_transactions: usize) -> Result<u32> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(Error::InvalidSupport(fraction));
    }
    let count = (fraction * num_transactions as f64).floor() as u32;
    Ok(count.max(1))
}

/// Keeps the `quotas[len - 1]` highest-count patterns of each length.
pub fn top_patterns_per_length(
    mut patterns: Vec<PatternRecord>,
    quotas: &[usize],
) -> Result<Vec<PatternRecord>> {
    patterns.retain(|pattern| !pattern.items.is_empty());
    let longest = patterns.iter().map(|p| p.items.len()).max().unwrap_or(0);
    if quotas.len() < longest {
        return Err(Error::QuotaLengthMismatch {
            quotas: quotas.len(),
            longest,
        });
    }
    patterns.sort_by(|a, b| {
        a.items
            .len()
            .cmp(&b.items.len())
            .then(b.count.cmp(&a.count))
            .then_with(|| a.items.cmp(&b.items))
    });

    let mut kept = vec![];
    let mut current_len = 0;
    let mut taken = 0;
    for pattern in patterns {
        let len = pattern.items.len();
        if len != current_len {
            current_len = len;
            taken = 0;
        }
        if taken < quotas[len - 1] {
            taken += 1;
            kept.push(pattern);
        }
    }
    Ok(kept)
}

/// Mines a transactions file with H-Mine and writes the results file.
/// Returns the number of transactions read, the number of results written
/// and the results themselves.
pub fn count_and_write_results<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    support_fraction: f64,
    max_pattern_length: usize,
    quotas: Option<&[usize]>,
) -> Result<(usize, usize, Vec<PatternRecord>)> {
    let raw = read_transactions(input)?;
    let mut itemizer = Itemizer::new();
    let transactions: Vec<Vec<Item>> = raw
        .iter()
        .map(|items| itemizer.to_id_vec(items))
        .collect();
    let support = support_count(support_fraction, transactions.len())?;
    info!(
        transactions = transactions.len(),
        support, "mining transactions file"
    );

    let itemsets = mine_hlink(&transactions, support, max_pattern_length)?;
    let mut results: Vec<PatternRecord> = itemsets
        .iter()
        .map(|itemset| PatternRecord {
            items: itemset.labels(&itemizer),
            count: itemset.count,
        })
        .collect();
    if let Some(quotas) = quotas {
        results = top_patterns_per_length(results, quotas)?;
    }
    write_patterns(output, &results)?;
    Ok((transactions.len(), results.len(), results))
}
