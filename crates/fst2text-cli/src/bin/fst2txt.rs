// fst2txt: apply a compiled .fst2 grammar to a text.
//
// Reads a text file, rewrites it with the grammar and writes the result
// to stdout or a file, optionally together with the offset alignment
// table.
//
// Usage:
//   fst2txt [OPTIONS] GRAMMAR.fst2 TEXT [ALPHABET]
//
// Options:
//   --merge                       Merge mode (default)
//   --replace                     Replace mode
//   --char-by-char                Character-by-character parsing
//   --char-by-char-with-space     Same, and spaces are matchable too
//   -o, --output FILE             Write the rewritten text to FILE
//   --offsets FILE                Write the offset table as text to FILE
//   --offsets-json FILE           Write the offset table as JSON to FILE
//   -h, --help                    Print help

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};

use fst2text_core::Alphabet;
use fst2text_engine::{
    Automaton, OutputMode, ParsingMode, RewriteOutcome, RewriteSettings, Rewriter,
};

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    if fst2text_cli::wants_help(&args) {
        print_help();
        return;
    }

    let (output_path, args) = fst2text_cli::take_value(&args, &["-o", "--output"]);
    let (offsets_path, args) = fst2text_cli::take_value(&args, &["--offsets"]);
    let (offsets_json_path, args) = fst2text_cli::take_value(&args, &["--offsets-json"]);
    let (merge, args) = fst2text_cli::take_flag(&args, "--merge");
    let (replace, args) = fst2text_cli::take_flag(&args, "--replace");
    let (char_by_char, args) = fst2text_cli::take_flag(&args, "--char-by-char");
    let (with_space, args) = fst2text_cli::take_flag(&args, "--char-by-char-with-space");

    if merge && replace {
        fst2text_cli::fatal("--merge and --replace are mutually exclusive");
    }
    if let Some(unknown) = args.iter().find(|a| a.starts_with('-')) {
        fst2text_cli::fatal(&format!("unknown option '{unknown}' (see --help)"));
    }
    let (grammar_path, text_path, alphabet_path) = match args.as_slice() {
        [g, t] => (g, t, None),
        [g, t, a] => (g, t, Some(a)),
        _ => fst2text_cli::fatal("expected GRAMMAR.fst2 TEXT [ALPHABET] (see --help)"),
    };

    let settings = RewriteSettings {
        mode: if replace { OutputMode::Replace } else { OutputMode::Merge },
        parsing: if with_space {
            ParsingMode::CharByCharWithSpace
        } else if char_by_char {
            ParsingMode::CharByChar
        } else {
            ParsingMode::WordByWord
        },
        ..Default::default()
    };

    let automaton = Automaton::load(grammar_path)
        .unwrap_or_else(|e| fst2text_cli::fatal(&format!("{grammar_path}: {e}")));
    let alphabet = match alphabet_path {
        Some(path) => Alphabet::load(path)
            .unwrap_or_else(|e| fst2text_cli::fatal(&format!("{path}: {e}"))),
        None => Alphabet::ascii(),
    };

    let input = File::open(text_path)
        .unwrap_or_else(|e| fst2text_cli::fatal(&format!("{text_path}: {e}")));
    let reader = io::BufReader::new(input);
    let rewriter = Rewriter::with_settings(&automaton, &alphabet, settings);

    let outcome = match &output_path {
        Some(path) => {
            let file = File::create(path)
                .unwrap_or_else(|e| fst2text_cli::fatal(&format!("{path}: {e}")));
            rewrite_to(&rewriter, reader, BufWriter::new(file))
        }
        None => {
            let stdout = io::stdout();
            rewrite_to(&rewriter, reader, BufWriter::new(stdout.lock()))
        }
    };

    log::info!(
        "{} matches, {} offset records, {} lines, {} attempts dropped by the depth limit",
        outcome.stats.matches,
        outcome.offsets.len(),
        outcome.stats.newlines,
        outcome.stats.depth_aborts
    );

    if let Some(path) = offsets_path {
        let file = File::create(&path)
            .unwrap_or_else(|e| fst2text_cli::fatal(&format!("{path}: {e}")));
        outcome
            .offsets
            .write_text(BufWriter::new(file))
            .unwrap_or_else(|e| fst2text_cli::fatal(&format!("{path}: {e}")));
    }
    if let Some(path) = offsets_json_path {
        let file = File::create(&path)
            .unwrap_or_else(|e| fst2text_cli::fatal(&format!("{path}: {e}")));
        serde_json::to_writer(BufWriter::new(file), &outcome.offsets)
            .unwrap_or_else(|e| fst2text_cli::fatal(&format!("{path}: {e}")));
    }
}

fn rewrite_to<R: Read, W: Write>(
    rewriter: &Rewriter,
    reader: R,
    mut writer: W,
) -> RewriteOutcome {
    let outcome = rewriter
        .rewrite(reader, &mut writer)
        .unwrap_or_else(|e| fst2text_cli::fatal(&e.to_string()));
    writer
        .flush()
        .unwrap_or_else(|e| fst2text_cli::fatal(&format!("cannot flush output: {e}")));
    outcome
}

fn print_help() {
    println!("fst2txt: apply a compiled .fst2 grammar to a text.");
    println!();
    println!("Usage: fst2txt [OPTIONS] GRAMMAR.fst2 TEXT [ALPHABET]");
    println!();
    println!("Scans TEXT with the grammar, rewriting each longest match with");
    println!("its tag outputs. Without ALPHABET an ASCII Latin alphabet is");
    println!("assumed. The rewritten text goes to stdout unless -o is given.");
    println!();
    println!("Options:");
    println!("  --merge                     Record every match in the offset table (default)");
    println!("  --replace                   Record only matches whose output differs");
    println!("  --char-by-char              Drop the word-boundary constraint on matches");
    println!("  --char-by-char-with-space   Same, and match attempts may start on a space");
    println!("  -o, --output FILE           Write the rewritten text to FILE");
    println!("  --offsets FILE              Write the offset table as text (4 integers per line)");
    println!("  --offsets-json FILE         Write the offset table as JSON");
    println!("  -h, --help                  Print this help");
}
