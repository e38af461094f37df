// fst2text-cli: shared utilities for command-line tools.

use std::process;

/// Print an error message and exit with code 1.
pub fn fatal(msg: &str) -> ! {
    eprintln!("error: {msg}");
    process::exit(1);
}

/// Check if `--help` or `-h` is in the args.
pub fn wants_help(args: &[String]) -> bool {
    args.iter().any(|a| a == "--help" || a == "-h")
}

/// Extract a flag such as `--replace`.
///
/// Returns `(present, remaining_args)`.
pub fn take_flag(args: &[String], name: &str) -> (bool, Vec<String>) {
    let present = args.iter().any(|a| a == name);
    let remaining = args.iter().filter(|a| *a != name).cloned().collect();
    (present, remaining)
}

/// Extract a valued option given under any of `names`, written either as
/// `--name VALUE` or `--name=VALUE`.
///
/// Returns `(value, remaining_args)`.
pub fn take_value(args: &[String], names: &[&str]) -> (Option<String>, Vec<String>) {
    let mut value = None;
    let mut remaining = Vec::new();
    let mut skip_next = false;

    for (i, arg) in args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        let eq_form = names
            .iter()
            .find_map(|n| arg.strip_prefix(&format!("{n}=")));
        if let Some(v) = eq_form {
            value = Some(v.to_string());
        } else if names.contains(&arg.as_str()) {
            if i + 1 < args.len() {
                value = Some(args[i + 1].clone());
                skip_next = true;
            } else {
                eprintln!("error: {arg} requires a value");
                process::exit(1);
            }
        } else {
            remaining.push(arg.clone());
        }
    }

    (value, remaining)
}
