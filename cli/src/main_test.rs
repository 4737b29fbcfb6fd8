use super::*;

#[test]
fn images_list_parses_sort_and_labels() {
    let cli = Cli::try_parse_from([
        "termipics",
        "--server-url",
        "https://api.example/",
        "images",
        "list",
        "--page",
        "3",
        "--sort-by",
        "title",
        "--sort-order",
        "asc",
        "--labels",
        "cats,sky",
    ])
    .expect("parse");

    assert_eq!(cli.client_config().server_url, "https://api.example");
    let Command::Images(ImagesCommand { command: ImagesSubcommand::List { page, sort_by, sort_order, labels } }) =
        cli.command
    else {
        panic!("expected images list");
    };
    assert_eq!(page, 3);
    assert_eq!(sort_by, SortBy::Title);
    assert_eq!(sort_order, SortOrder::Asc);
    assert_eq!(labels.as_deref(), Some("cats,sky"));
}

#[test]
fn unknown_sort_field_is_rejected() {
    let result = Cli::try_parse_from(["termipics", "images", "list", "--sort-by", "size"]);
    assert!(result.is_err());
}

#[test]
fn images_list_defaults_to_newest_first() {
    let cli = Cli::try_parse_from(["termipics", "images", "list"]).expect("parse");
    let Command::Images(ImagesCommand { command: ImagesSubcommand::List { page, sort_by, sort_order, labels } }) =
        cli.command
    else {
        panic!("expected images list");
    };
    assert_eq!((page, sort_by, sort_order, labels), (1, SortBy::CreatedAt, SortOrder::Desc, None));
}

#[test]
fn oauth_accepts_code_and_state() {
    let cli = Cli::try_parse_from(["termipics", "oauth", "4/0Abc", "--state", "s1"]).expect("parse");
    let Command::Oauth { code, state } = cli.command else {
        panic!("expected oauth");
    };
    assert_eq!(code, "4/0Abc");
    assert_eq!(state.as_deref(), Some("s1"));
}

#[test]
fn clap_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
