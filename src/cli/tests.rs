use super::*;
use std::path::PathBuf;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }
}

use test_helpers::parse_args;

#[test]
fn test_no_subcommand_defaults_to_tui() {
    let args = parse_args(&["juggler"]);
    assert!(args.command.is_none());
    assert!(args.model.is_none());
    assert!(args.log.is_none());
}

#[test]
fn test_global_flags_parse_before_and_after_subcommand() {
    let cases: [&[&str]; 3] = [
        &["juggler", "-m", "gpt-4o", "list"],
        &["juggler", "list", "--model", "gpt-4o"],
        &["juggler", "--model=gpt-4o", "list"],
    ];

    for argv in cases {
        let args = parse_args(argv);
        assert_eq!(args.model.as_deref(), Some("gpt-4o"), "argv={argv:?}");
        assert!(matches!(args.command, Some(Commands::List)), "argv={argv:?}");
    }
}

#[test]
fn test_run_parses_template_context_and_files() {
    let args = parse_args(&[
        "juggler",
        "run",
        "--context-dir",
        "src/**/*.rs",
        "review",
        "a.diff",
        "b.diff",
    ]);

    match args.command {
        Some(Commands::Run {
            template,
            context_dir,
            files,
        }) => {
            assert_eq!(template, "review");
            assert_eq!(context_dir.as_deref(), Some("src/**/*.rs"));
            assert_eq!(files, vec![PathBuf::from("a.diff"), PathBuf::from("b.diff")]);
        }
        _ => panic!("expected run subcommand"),
    }
}

#[test]
fn test_run_requires_template_name() {
    assert!(Args::try_parse_from(["juggler", "run"]).is_err());
}

#[test]
fn test_complete_and_shell_subcommands() {
    match parse_args(&["juggler", "complete", "notes.md"]).command {
        Some(Commands::Complete { filename }) => assert_eq!(filename, PathBuf::from("notes.md")),
        _ => panic!("expected complete subcommand"),
    }
    assert!(matches!(
        parse_args(&["juggler", "-l", "shell.log", "shell"]).command,
        Some(Commands::Shell)
    ));
}

#[test]
fn test_set_collects_trailing_values() {
    match parse_args(&["juggler", "set", "api-key", "openai", "sk-123"]).command {
        Some(Commands::Set { key, value }) => {
            assert_eq!(key.as_deref(), Some("api-key"));
            assert_eq!(value, vec!["openai".to_string(), "sk-123".to_string()]);
        }
        _ => panic!("expected set subcommand"),
    }

    match parse_args(&["juggler", "set"]).command {
        Some(Commands::Set { key, value }) => {
            assert!(key.is_none());
            assert!(value.is_empty());
        }
        _ => panic!("expected set subcommand"),
    }
}

#[test]
fn test_unset_with_optional_value() {
    match parse_args(&["juggler", "unset", "base-url", "local"]).command {
        Some(Commands::Unset { key, value }) => {
            assert_eq!(key, "base-url");
            assert_eq!(value.as_deref(), Some("local"));
        }
        _ => panic!("expected unset subcommand"),
    }
}

#[test]
fn test_log_flag_takes_a_path() {
    let args = parse_args(&["juggler", "--log", "/tmp/chat.log"]);
    assert_eq!(args.log, Some(PathBuf::from("/tmp/chat.log")));
}
