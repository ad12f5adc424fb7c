//! Command-line argument parsing.
//!
//! Usage:
//!   ponzu [-dB] [-b<bindings.json>] -e<script>
//!   ponzu [-dB] [-b<bindings.json>] <script-file>
//!   ponzu [-d] -t<config.json> [-c<context.json>] [<source.json>]

use std::path::PathBuf;

pub const USAGE: &str = "\
Usage: ponzu [-dB] [-b<bindings.json>] -e<script>
       ponzu [-dB] [-b<bindings.json>] <script-file>
       ponzu [-d] -t<config.json> [-c<context.json>] [<source.json>]";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug)]
pub struct CliArgs {
    /// Debug logging (`-d`).
    pub debug: bool,
    pub mode: Mode,
}

/// What the binary runs.
#[derive(Debug)]
pub enum Mode {
    Eval {
        script: Script,
        /// Initial bindings (`-b<file>`), a JSON object.
        bindings: Option<PathBuf>,
        /// Print the final bindings after the result (`-B`).
        print_bindings: bool,
    },
    Transform {
        /// Transformer config (`-t<file>`).
        config: PathBuf,
        /// Call-site context (`-c<file>`), a JSON object.
        context: Option<PathBuf>,
        /// Source document; JSON lines on stdin when absent.
        source: Option<PathBuf>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum Script {
    /// `-e<script>`
    Inline(String),
    File(PathBuf),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Value of a flag that takes an argument: the rest of this word, or the
/// next word.
fn flag_value(
    flag: char,
    chars: &[char],
    j: &mut usize,
    argv: &[String],
    i: &mut usize,
) -> Result<String, String> {
    if *j + 1 < chars.len() {
        let s: String = chars[*j + 1..].iter().collect();
        *j = chars.len();
        Ok(s)
    } else if *i + 1 < argv.len() {
        *i += 1;
        Ok(argv[*i].clone())
    } else {
        Err(format!("-{flag} requires an argument"))
    }
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut debug = false;
    let mut print_bindings = false;
    let mut bindings: Option<PathBuf> = None;
    let mut inline: Option<String> = None;
    let mut config: Option<PathBuf> = None;
    let mut context: Option<PathBuf> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            i += 1;
            positional.extend(argv[i..].iter().cloned());
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => debug = true,
                'B' => print_bindings = true,
                'b' => bindings = Some(flag_value('b', &chars, &mut j, argv, &mut i)?.into()),
                'e' => inline = Some(flag_value('e', &chars, &mut j, argv, &mut i)?),
                't' => config = Some(flag_value('t', &chars, &mut j, argv, &mut i)?.into()),
                'c' => context = Some(flag_value('c', &chars, &mut j, argv, &mut i)?.into()),
                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    if positional.len() > 1 {
        return Err(format!("too many arguments ({})", positional.len()));
    }
    let positional = positional.pop();

    let mode = match (config, inline) {
        (Some(_), Some(_)) => return Err("-e and -t cannot be combined".to_owned()),
        (Some(config), None) => {
            if bindings.is_some() || print_bindings {
                return Err("-b and -B only apply to script evaluation".to_owned());
            }
            Mode::Transform {
                config,
                context,
                source: positional.map(PathBuf::from),
            }
        }
        (None, inline) => {
            if context.is_some() {
                return Err("-c requires -t".to_owned());
            }
            let script = match (inline, positional) {
                (Some(_), Some(extra)) => return Err(format!("unexpected argument: {extra}")),
                (Some(src), None) => Script::Inline(src),
                (None, Some(file)) => Script::File(PathBuf::from(file)),
                (None, None) => return Err("no script given".to_owned()),
            };
            Mode::Eval {
                script,
                bindings,
                print_bindings,
            }
        }
    };

    Ok(CliArgs { debug, mode })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        assert!(parse_argv(&argv(&[])).is_err());
    }

    #[test]
    fn script_file_positional() {
        let a = parse_argv(&argv(&["calc.js"])).unwrap();
        assert!(!a.debug);
        assert!(matches!(
            &a.mode,
            Mode::Eval { script: Script::File(p), bindings: None, print_bindings: false }
                if p == &PathBuf::from("calc.js")
        ));
    }

    #[test]
    fn inline_embedded() {
        let a = parse_argv(&argv(&["-e1 + 2"])).unwrap();
        assert!(matches!(&a.mode, Mode::Eval { script: Script::Inline(s), .. } if s == "1 + 2"));
    }

    #[test]
    fn inline_separate() {
        let a = parse_argv(&argv(&["-e", "x * 2", "-b", "b.json"])).unwrap();
        let Mode::Eval { script, bindings, .. } = a.mode else {
            panic!("expected eval mode")
        };
        assert_eq!(script, Script::Inline("x * 2".into()));
        assert_eq!(bindings, Some(PathBuf::from("b.json")));
    }

    #[test]
    fn combined_bool_flags() {
        let a = parse_argv(&argv(&["-dB", "s.js"])).unwrap();
        assert!(a.debug);
        assert!(matches!(a.mode, Mode::Eval { print_bindings: true, .. }));
    }

    #[test]
    fn flag_value_after_bool_flags() {
        let a = parse_argv(&argv(&["-dbvars.json", "s.js"])).unwrap();
        assert!(a.debug);
        assert!(
            matches!(&a.mode, Mode::Eval { bindings: Some(p), .. } if p == &PathBuf::from("vars.json"))
        );
    }

    #[test]
    fn transform_mode() {
        let a = parse_argv(&argv(&["-tcfg.json", "-c", "ctx.json", "in.json"])).unwrap();
        let Mode::Transform { config, context, source } = a.mode else {
            panic!("expected transform mode")
        };
        assert_eq!(config, PathBuf::from("cfg.json"));
        assert_eq!(context, Some(PathBuf::from("ctx.json")));
        assert_eq!(source, Some(PathBuf::from("in.json")));
    }

    #[test]
    fn transform_reads_stdin_without_source() {
        let a = parse_argv(&argv(&["-t", "cfg.json"])).unwrap();
        assert!(matches!(a.mode, Mode::Transform { source: None, .. }));
    }

    #[test]
    fn missing_flag_value() {
        assert_eq!(
            parse_argv(&argv(&["-e"])).unwrap_err(),
            "-e requires an argument"
        );
    }

    #[test]
    fn conflicting_modes() {
        assert!(parse_argv(&argv(&["-e1", "-tcfg.json"])).is_err());
        assert!(parse_argv(&argv(&["-cctx.json", "s.js"])).is_err());
        assert!(parse_argv(&argv(&["-B", "-tcfg.json"])).is_err());
        assert!(parse_argv(&argv(&["-e1", "s.js"])).is_err());
    }

    #[test]
    fn double_dash_ends_flags() {
        let a = parse_argv(&argv(&["--", "-odd.js"])).unwrap();
        assert!(matches!(&a.mode, Mode::Eval { script: Script::File(p), .. } if p == &PathBuf::from("-odd.js")));
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["a", "b"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }
}
