use clap::Parser;
use std::path::PathBuf;
use tacit::cli::{Cli, Commands};

#[test]
fn test_parse_scan() {
    let cli = Cli::try_parse_from([
        "tacit",
        "scan",
        "--url",
        "https://shop.test/",
        "--site-model",
        "site.yaml",
        "-e",
        "expectations.json",
        "--profile",
        "thorough",
        "--deterministic",
    ])
    .unwrap();

    match cli.command {
        Commands::Scan(args) => {
            assert_eq!(args.url, "https://shop.test/");
            assert_eq!(args.site_model, PathBuf::from("site.yaml"));
            assert_eq!(args.expectations, Some(PathBuf::from("expectations.json")));
            assert_eq!(args.profile.as_deref(), Some("thorough"));
            assert!(args.deterministic);
            assert!(!args.no_artifacts);
            assert!(args.out_dir.is_none());
        }
        _ => panic!("Wrong top-level command"),
    }
    assert!(!cli.json);
}

#[test]
fn test_scan_requires_site_model() {
    let result = Cli::try_parse_from(["tacit", "scan", "--url", "https://shop.test/"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_classify_with_global_flags() {
    let cli = Cli::try_parse_from([
        "tacit",
        "classify",
        "--expectations",
        "e.yaml",
        "--observations",
        "o.json",
        "--infrastructure-failure",
        "--json",
        "--log-level",
        "debug",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    match cli.command {
        Commands::Classify(args) => {
            assert_eq!(args.expectations, PathBuf::from("e.yaml"));
            assert_eq!(args.observations, PathBuf::from("o.json"));
            assert!(args.infrastructure_failure);
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_budget_with_config() {
    let cli = Cli::try_parse_from([
        "tacit",
        "--config",
        "custom.yaml",
        "budget",
        "--routes",
        "routes.yaml",
    ])
    .unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    match cli.command {
        Commands::Budget(args) => {
            assert_eq!(args.routes, PathBuf::from("routes.yaml"));
            assert!(args.expectations.is_none());
            assert!(args.profile.is_none());
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_unknown_command_rejected() {
    assert!(Cli::try_parse_from(["tacit", "swarm", "start"]).is_err());
}
