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

mod command_line_args;

use command_line_args::{parse_args_or_exit, Arguments};
use fpstream::fpgrowth::{mine_with, ItemSet, MiningConfig};
use fpstream::pattern_file::support_count;
use fpstream::spill::{restore_from_file, spill_to_file};
use fpstream::transaction_reader::TransactionReader;
use fpstream::{FPTree, Index, Item, Itemizer, Strategy};

use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn build_tree(
    transactions: &[Vec<Item>],
    args: &Arguments,
    itemizer: &mut Itemizer,
) -> Result<FPTree, Box<dyn Error>> {
    println!("Building FPTree incrementally...");
    let timer = Instant::now();
    let mut fptree = FPTree::new();
    for transaction in transactions {
        fptree.insert(transaction)?;
    }
    println!(
        "Building FPTree took {} seconds, {} nodes, {} item insertions.",
        timer.elapsed().as_secs(),
        fptree.num_nodes(),
        fptree.num_insertions()
    );

    if let Some(ref spill_path) = args.spill_path {
        let timer = Instant::now();
        spill_to_file(&fptree, itemizer, spill_path)?;
        fptree = restore_from_file(spill_path, itemizer)?;
        println!(
            "Spilled and restored FPTree via {} in {} seconds.",
            spill_path,
            timer.elapsed().as_secs()
        );
    }
    Ok(fptree)
}

fn verify(itemsets: &[ItemSet], index: &Index, itemizer: &Itemizer) -> Result<(), Box<dyn Error>> {
    println!("Verifying itemset counts...");
    let timer = Instant::now();
    for itemset in itemsets {
        let expected = index.count(&itemset.items);
        if expected != itemset.count {
            return Err(format!(
                "itemset {} reported with count {} but occurs {} times",
                Item::item_vec_to_string(&itemset.items, itemizer),
                itemset.count,
                expected
            )
            .into());
        }
    }
    println!(
        "Verified {} itemsets in {} seconds.",
        itemsets.len(),
        timer.elapsed().as_secs()
    );
    Ok(())
}

fn mine_itemsets(args: &Arguments) -> Result<(), Box<dyn Error>> {
    println!("Mining data set: {}", args.input_file_path);
    let start = Instant::now();
    let timer = Instant::now();
    let mut itemizer: Itemizer = Itemizer::new();
    let mut index = Index::new();
    let mut transactions: Vec<Vec<Item>> = vec![];
    for transaction in TransactionReader::open(&args.input_file_path, &mut itemizer)? {
        let transaction = transaction?;
        if args.verify {
            index.insert(&transaction);
        }
        transactions.push(transaction);
    }
    println!(
        "Read {} transactions in {} seconds.",
        transactions.len(),
        timer.elapsed().as_secs()
    );

    let config = MiningConfig {
        top_k: args.top_k.unwrap_or(usize::MAX),
        min_count: support_count(args.min_support, transactions.len())?,
        max_pattern_length: args.max_length.unwrap_or(usize::MAX),
    };

    let itemsets = match args.strategy {
        Strategy::FpGrowth => {
            let fptree = build_tree(&transactions, args, &mut itemizer)?;
            println!("Starting recursive FPGrowth...");
            let timer = Instant::now();
            let itemsets = mine_with(&fptree, &config)?;
            println!(
                "FPGrowth generated {} frequent itemsets in {} seconds.",
                itemsets.len(),
                timer.elapsed().as_secs()
            );
            itemsets
        }
        Strategy::HMine => {
            println!("Starting H-Mine...");
            let timer = Instant::now();
            let itemsets = args.strategy.mine_transactions(&transactions, &config)?;
            println!(
                "H-Mine generated {} frequent itemsets in {} seconds.",
                itemsets.len(),
                timer.elapsed().as_secs()
            );
            itemsets
        }
    };

    if args.verify {
        verify(&itemsets, &index, &itemizer)?;
    }

    {
        let mut output = BufWriter::new(File::create(&args.output_itemsets_path)?);
        writeln!(output, "Itemset,Count")?;
        for itemset in &itemsets {
            writeln!(
                output,
                "{},{}",
                Item::item_vec_to_string(&itemset.items, &itemizer),
                itemset.count
            )?;
        }
        output.flush()?;
    }

    println!("Total runtime: {} seconds", start.elapsed().as_secs());

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let arguments = parse_args_or_exit();

    if let Err(err) = mine_itemsets(&arguments) {
        println!("Error: {}", err);
        process::exit(1);
    }
}
