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

use crate::error::Result;
use crate::item::Item;
use crate::itemizer::Itemizer;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

/// Reads comma separated transactions, one per line, interning labels as
/// it goes. Blank lines are skipped.
pub struct TransactionReader<'a, R: BufRead> {
    reader: R,
    itemizer: &'a mut Itemizer,
}

impl<'a> TransactionReader<'a, BufReader<File>> {
    pub fn open<P: AsRef<Path>>(
        path: P,
        itemizer: &'a mut Itemizer,
    ) -> Result<TransactionReader<'a, BufReader<File>>> {
        let file = File::open(path)?;
        Ok(TransactionReader::new(BufReader::new(file), itemizer))
    }
}

impl<'a, R: BufRead> TransactionReader<'a, R> {
    pub fn new(reader: R, itemizer: &'a mut Itemizer) -> TransactionReader<'a, R> {
        TransactionReader { reader, itemizer }
    }
}

impl<'a, R: BufRead> Iterator for TransactionReader<'a, R> {
    type Item = Result<Vec<Item>>;
    fn next(&mut self) -> Option<Result<Vec<Item>>> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(err.into())),
            }
            let mut splits = line
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| self.itemizer.id_of(s))
                .collect::<Vec<Item>>();

            // Some input files have transactions with duplicates items.
            // Remove any duplicates here.
            splits.sort();
            dedupe_sorted(&mut splits);

            if !splits.is_empty() {
                return Some(Ok(splits));
            }
        }
    }
}

fn dedupe_sorted(v: &mut Vec<Item>) {
    let mut i = 0;
    let mut k = 0;
    while i < v.len() {
        v[k] = v[i];
        while i < v.len() && v[k] == v[i] {
            i += 1;
        }
        k += 1;
    }
    v.truncate(k);
}

#[cfg(test)]
mod tests {
    use super::TransactionReader;
    use crate::item::Item;
    use crate::itemizer::Itemizer;
    use std::io::{Cursor, Write};

    fn to_item_vec(nums: &[u32]) -> Vec<Item> {
        nums.iter().map(|&i| Item::with_id(i)).collect()
    }

    #[test]
    fn test_dedupe_sorted() {
        let cases = [
            (vec![], vec![]),
            (vec![1], vec![1]),
            (vec![1, 2], vec![1, 2]),
            (vec![1, 1], vec![1]),
            (vec![1, 1, 1], vec![1]),
            (vec![1, 1, 2, 2], vec![1, 2]),
            (vec![1, 2, 3], vec![1, 2, 3]),
            (vec![1, 2, 2, 3], vec![1, 2, 3]),
        ];
        for (mut v, e) in cases
            .iter()
            .map(|(a, b)| (to_item_vec(a), to_item_vec(b)))
        {
            super::dedupe_sorted(&mut v);
            assert_eq!(v, e);
        }
    }

    #[test]
    fn test_reader_skips_blank_lines() {
        let mut itemizer = Itemizer::new();
        let input = Cursor::new("a, b ,a\n\n , \nc\n");
        let transactions: Vec<Vec<Item>> = TransactionReader::new(input, &mut itemizer)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(transactions, vec![to_item_vec(&[1, 2]), to_item_vec(&[3])]);
        assert_eq!(itemizer.str_of(Item::with_id(3)), "c");
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x,y").unwrap();
        writeln!(file, "y").unwrap();
        let mut itemizer = Itemizer::new();
        let reader = TransactionReader::open(file.path(), &mut itemizer).unwrap();
        assert_eq!(reader.count(), 2);

        let mut itemizer = Itemizer::new();
        assert!(TransactionReader::open("/nonexistent/transactions.csv", &mut itemizer).is_err());
    }
}
