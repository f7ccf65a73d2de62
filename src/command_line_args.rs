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

use std::env;
use std::io::{self, Write};
use std::process;

use argparse::{ArgumentParser, Store, StoreOption, StoreTrue};
use fpstream::Strategy;

pub struct Arguments {
    pub input_file_path: String,
    pub output_itemsets_path: String,
    pub min_support: f64,
    pub top_k: Option<usize>,
    pub max_length: Option<usize>,
    pub algorithm: String,
    pub strategy: Strategy,
    pub spill_path: Option<String>,
    pub verify: bool,
}

fn print_usage(parser: &ArgumentParser, out: &mut dyn Write) {
    if let Err(err) = parser.print_help("Usage:", out) {
        eprintln!("Unable to print usage: {}", err);
    }
}

pub fn parse_args_or_exit() -> Arguments {
    let mut args: Arguments = Arguments {
        input_file_path: String::new(),
        output_itemsets_path: String::new(),
        min_support: 0.0,
        top_k: None,
        max_length: None,
        algorithm: String::from("fpgrowth"),
        strategy: Strategy::FpGrowth,
        spill_path: None,
        verify: false,
    };

    {
        let mut parser = ArgumentParser::new();
        parser.set_description("Incremental FP-tree frequent itemset miner.");

        parser
            .refer(&mut args.input_file_path)
            .add_option(&["--input"], Store, "Input dataset in CSV format.")
            .metavar("file_path")
            .required();

        parser
            .refer(&mut args.output_itemsets_path)
            .add_option(
                &["--output"],
                Store,
                "File path in which to store frequent itemsets. \
                 Format: itemset, count.",
            )
            .metavar("file_path")
            .required();

        parser
            .refer(&mut args.min_support)
            .add_option(
                &["--min-support"],
                Store,
                "Minimum itemset support threshold, in range [0,1].",
            )
            .metavar("threshold")
            .required();

        parser
            .refer(&mut args.top_k)
            .add_option(
                &["--top-k"],
                StoreOption,
                "Only start mining from the N most frequent items.",
            )
            .metavar("N");

        parser
            .refer(&mut args.max_length)
            .add_option(
                &["--max-length"],
                StoreOption,
                "Maximum number of items in a reported itemset.",
            )
            .metavar("N");

        parser
            .refer(&mut args.algorithm)
            .add_option(
                &["--algorithm"],
                Store,
                "Mining algorithm, fpgrowth or hmine. Defaults to fpgrowth.",
            )
            .metavar("name");

        parser
            .refer(&mut args.spill_path)
            .add_option(
                &["--spill"],
                StoreOption,
                "Spill the built tree to this file and mine the restored copy.",
            )
            .metavar("file_path");

        parser.refer(&mut args.verify).add_option(
            &["--verify"],
            StoreTrue,
            "Check every reported count against a brute force index.",
        );

        if env::args().count() == 1 {
            print_usage(&parser, &mut io::stderr());
            process::exit(1);
        }

        match parser.parse_args() {
            Ok(()) => {}
            Err(err) => {
                process::exit(err);
            }
        }
    }

    if args.min_support < 0.0 || args.min_support > 1.0 {
        eprintln!("Minimum itemset support must be in range [0,1]");
        process::exit(1);
    }

    if args.max_length == Some(0) {
        eprintln!("Maximum itemset length must be at least 1");
        process::exit(1);
    }

    args.strategy = match args.algorithm.parse() {
        Ok(strategy) => strategy,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };

    if args.spill_path.is_some() && args.strategy != Strategy::FpGrowth {
        eprintln!("--spill only applies to the fpgrowth algorithm");
        process::exit(1);
    }

    args
}
